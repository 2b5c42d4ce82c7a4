//! Defines the core data structures shared across the toolkit.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A single scalar cell value. Absence is modelled as `Option::None` around it.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
}

impl Value {
    /// Renders the value the way it is written to a delimited file.
    pub fn as_field(&self) -> String {
        match self {
            Value::Number(n) => n.to_string(),
            Value::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_field())
    }
}

// Numbers sort before text; numbers use a total order so NaN is well placed.
impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.total_cmp(b),
            (Value::Number(_), Value::Text(_)) => Ordering::Less,
            (Value::Text(_), Value::Number(_)) => Ordering::Greater,
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Number(n) => {
                0u8.hash(state);
                n.to_bits().hash(state);
            }
            Value::Text(s) => {
                1u8.hash(state);
                s.hash(state);
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

/// Converts a raw field read from a file into a cell. Empty fields are absent.
pub fn cell_from_field(field: &str) -> Option<Value> {
    if field.is_empty() {
        None
    } else {
        Some(Value::Text(field.to_string()))
    }
}

/// An ordered mapping from column name to an optional value.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Option<Value>)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `column`, replacing an existing value in place or appending a new column.
    pub fn set(&mut self, column: impl Into<String>, value: Option<Value>) {
        let column = column.into();
        match self.fields.iter_mut().find(|(name, _)| *name == column) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((column, value)),
        }
    }

    /// Builder-style variant of [`Record::set`].
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, Some(value.into()));
        self
    }

    /// Builder-style insertion of an absent value.
    pub fn with_absent(mut self, column: impl Into<String>) -> Self {
        self.set(column, None);
        self
    }

    /// Looks up a column. `None` covers both "no such column" and "absent value".
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .and_then(|(_, value)| value.as_ref())
    }

    pub fn contains_column(&self, column: &str) -> bool {
        self.fields.iter().any(|(name, _)| name == column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Projects the record onto exactly `schema`: missing columns become absent,
    /// columns outside the schema are dropped.
    pub fn project(&self, schema: &[String]) -> Record {
        let fields = schema
            .iter()
            .map(|column| (column.clone(), self.get(column).cloned()))
            .collect();
        Record { fields }
    }
}

/// An ordered schema plus rows aligned to it.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Option<Value>>>,
}

impl Table {
    /// Creates an empty table with the given schema.
    pub fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Builds a table from records. The schema is the union of every record's
    /// columns in first-seen order; gaps are absent.
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        let mut table = Table::default();
        for record in records {
            table.push_record(&record);
        }
        table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn rows(&self) -> &[Vec<Option<Value>>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Appends a row already aligned to the schema. Short rows are padded with
    /// absent values; long rows are truncated.
    pub fn push_row(&mut self, mut row: Vec<Option<Value>>) {
        row.resize(self.columns.len(), None);
        self.rows.push(row);
    }

    /// Appends a record, widening the schema with any column it has not seen yet.
    pub fn push_record(&mut self, record: &Record) {
        for column in record.columns() {
            self.ensure_column(column);
        }
        let row = self
            .columns
            .iter()
            .map(|column| record.get(column).cloned())
            .collect();
        self.rows.push(row);
    }

    /// Adds `column` to the schema if missing, filling existing rows with absence.
    pub fn ensure_column(&mut self, column: &str) -> usize {
        if let Some(index) = self.column_index(column) {
            return index;
        }
        self.columns.push(column.to_string());
        for row in &mut self.rows {
            row.push(None);
        }
        self.columns.len() - 1
    }

    /// Returns the record at `index` as an ordered column mapping.
    pub fn record(&self, index: usize) -> Option<Record> {
        let row = self.rows.get(index)?;
        let mut record = Record::new();
        for (column, value) in self.columns.iter().zip(row) {
            record.set(column.clone(), value.clone());
        }
        Some(record)
    }

    pub fn records(&self) -> impl Iterator<Item = Record> + '_ {
        (0..self.rows.len()).filter_map(|index| self.record(index))
    }

    /// Reads one cell by row index and column name.
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.get(index)?.as_ref()
    }

    /// Appends every row of `other`, unioning the schemas.
    pub fn extend_from(&mut self, other: &Table) {
        let mapping: HashMap<usize, usize> = other
            .columns
            .iter()
            .enumerate()
            .map(|(src, column)| (src, self.ensure_column(column)))
            .collect();

        for row in &other.rows {
            let mut aligned = vec![None; self.columns.len()];
            for (src, value) in row.iter().enumerate() {
                if let Some(&dst) = mapping.get(&src) {
                    aligned[dst] = value.clone();
                }
            }
            self.rows.push(aligned);
        }
    }

    pub(crate) fn into_rows(self) -> (Vec<String>, Vec<Vec<Option<Value>>>) {
        (self.columns, self.rows)
    }

    pub(crate) fn from_parts(columns: Vec<String>, rows: Vec<Vec<Option<Value>>>) -> Self {
        Self { columns, rows }
    }
}

/// Tagged result for helpers that may find nothing, one item, or several.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Extracted {
    Empty,
    Single(String),
    Many(Vec<String>),
}

impl Extracted {
    /// Builds `Many` from a list, or `Empty` when there is nothing in it.
    pub fn from_list(items: Vec<String>) -> Self {
        if items.is_empty() {
            Extracted::Empty
        } else {
            Extracted::Many(items)
        }
    }

    /// Joins a non-empty list into `Single`, or `Empty` when there is nothing.
    pub fn joined(items: Vec<String>, separator: &str) -> Self {
        if items.is_empty() {
            Extracted::Empty
        } else {
            Extracted::Single(items.join(separator))
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Extracted::Empty)
    }

    /// Flattens back into a list regardless of shape.
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Extracted::Empty => Vec::new(),
            Extracted::Single(s) => vec![s],
            Extracted::Many(v) => v,
        }
    }
}
