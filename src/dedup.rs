//! Duplicate-aware record reconciliation.
//!
//! Records sharing the same identity-key values are collapsed to a single
//! survivor. The survivor is the highest ranked record of its group, ranked by
//! the priority columns when given, otherwise by how many fields it fills.
//! Survivors are whole records; fields are never merged across duplicates.

use crate::error::{AppError, Result};
use crate::logging::LogContext;
use crate::models::{Table, Value};
use crate::table_io::TableIo;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Where the records to deduplicate come from.
#[derive(Debug, Clone)]
pub enum Source {
    Path(PathBuf),
    Table(Table),
}

impl Source {
    /// Resolves the two optional inputs into a source. Exactly one must be set.
    pub fn resolve(path: Option<PathBuf>, table: Option<Table>) -> Result<Self> {
        match (path, table) {
            (Some(path), None) => Ok(Source::Path(path)),
            (None, Some(table)) => Ok(Source::Table(table)),
            (None, None) => Err(AppError::Config(
                "either a source path or an in-memory table is required".to_string(),
            )),
            (Some(_), Some(_)) => Err(AppError::Config(
                "supply a source path or an in-memory table, not both".to_string(),
            )),
        }
    }
}

/// Order in which survivors are emitted.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputOrder {
    /// Highest ranked survivor first.
    #[default]
    Ranked,
    /// Survivors keep their original relative input order.
    Input,
}

/// Parameters of one deduplication run.
#[derive(Debug, Clone, Default)]
pub struct DedupRequest {
    pub path: Option<PathBuf>,
    pub table: Option<Table>,
    pub identity_columns: Vec<String>,
    pub priority_columns: Vec<String>,
    pub in_place: bool,
    pub order: OutputOrder,
}

impl DedupRequest {
    pub fn from_path(path: impl Into<PathBuf>, identity_columns: Vec<String>) -> Self {
        Self {
            path: Some(path.into()),
            identity_columns,
            ..Self::default()
        }
    }

    pub fn from_table(table: Table, identity_columns: Vec<String>) -> Self {
        Self {
            table: Some(table),
            identity_columns,
            ..Self::default()
        }
    }

    pub fn priority(mut self, columns: Vec<String>) -> Self {
        self.priority_columns = columns;
        self
    }

    pub fn in_place(mut self, in_place: bool) -> Self {
        self.in_place = in_place;
        self
    }

    pub fn order(mut self, order: OutputOrder) -> Self {
        self.order = order;
        self
    }
}

/// Outcome of a run: either the survivors, or confirmation they replaced the source file.
#[derive(Debug, Clone, PartialEq)]
pub enum Deduplicated {
    Table(Table),
    Written { path: PathBuf, kept: usize, dropped: usize },
}

impl Deduplicated {
    pub fn into_table(self) -> Option<Table> {
        match self {
            Deduplicated::Table(table) => Some(table),
            Deduplicated::Written { .. } => None,
        }
    }
}

/// Collapses duplicate records, reading and writing through a [`TableIo`].
#[derive(Debug, Clone, Default)]
pub struct Deduplicator {
    io: TableIo,
    log: LogContext,
}

impl Deduplicator {
    pub fn new(io: TableIo, log: LogContext) -> Self {
        Self { io, log }
    }

    /// Runs one deduplication request end to end.
    pub fn deduplicate(&self, request: DedupRequest) -> Result<Deduplicated> {
        let _span = self.log.span("dedup").entered();

        if request.identity_columns.is_empty() {
            return Err(AppError::Config(
                "identity columns must not be empty".to_string(),
            ));
        }
        let source = Source::resolve(request.path, request.table)?;

        let (table, origin) = match source {
            Source::Path(path) => (self.io.load_table(&path)?, Some(path)),
            Source::Table(table) => (table, None),
        };

        let total = table.len();
        let survivors = remove_duplicates(
            table,
            &request.identity_columns,
            &request.priority_columns,
            request.order,
        )?;
        let kept = survivors.len();
        let dropped = total - kept;

        tracing::info!(
            target: "dedup",
            "{}",
            self.log.decorate(&format!(
                "Kept {} of {} records ({} duplicates dropped) on key {:?}",
                kept, total, dropped, request.identity_columns
            ))
        );

        match origin {
            Some(path) if request.in_place => {
                self.io.save_table(&survivors, &path)?;
                Ok(Deduplicated::Written { path, kept, dropped })
            }
            _ => Ok(Deduplicated::Table(survivors)),
        }
    }

    /// Deduplicates `input` and writes the survivors to `output`.
    pub fn deduplicate_to(
        &self,
        input: &Path,
        output: &Path,
        identity_columns: Vec<String>,
        priority_columns: Vec<String>,
        order: OutputOrder,
    ) -> Result<usize> {
        let request = DedupRequest::from_path(input, identity_columns)
            .priority(priority_columns)
            .order(order);
        match self.deduplicate(request)? {
            Deduplicated::Table(table) => {
                self.io.save_table(&table, output)?;
                Ok(table.len())
            }
            Deduplicated::Written { kept, .. } => Ok(kept),
        }
    }
}

/// Pure in-memory deduplication of `table`.
///
/// Fails with [`AppError::Config`] when `identity_columns` is empty and with
/// [`AppError::Schema`] when any identity or priority column is not in the schema.
pub fn remove_duplicates(
    table: Table,
    identity_columns: &[String],
    priority_columns: &[String],
    order: OutputOrder,
) -> Result<Table> {
    if identity_columns.is_empty() {
        return Err(AppError::Config(
            "identity columns must not be empty".to_string(),
        ));
    }
    let identity = resolve_columns(&table, identity_columns, "identity")?;
    let priority = resolve_columns(&table, priority_columns, "priority")?;

    let (columns, rows) = table.into_rows();

    let mut ranked: Vec<usize> = (0..rows.len()).collect();
    if priority.is_empty() {
        // Stable sort, so ties keep input order.
        ranked.sort_by_key(|&i| std::cmp::Reverse(completeness(&rows[i])));
    } else {
        ranked.sort_by(|&a, &b| compare_priority(&rows[a], &rows[b], &priority));
    }

    let mut seen: HashSet<Vec<Option<Value>>> = HashSet::new();
    let mut survivors: Vec<usize> = ranked
        .into_iter()
        .filter(|&i| seen.insert(identity.iter().map(|&c| rows[i][c].clone()).collect()))
        .collect();

    if order == OutputOrder::Input {
        survivors.sort_unstable();
    }

    let mut slots: Vec<Option<Vec<Option<Value>>>> = rows.into_iter().map(Some).collect();
    let kept = survivors
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect();

    Ok(Table::from_parts(columns, kept))
}

fn resolve_columns(table: &Table, names: &[String], role: &str) -> Result<Vec<usize>> {
    names
        .iter()
        .map(|name| {
            table.column_index(name).ok_or_else(|| {
                AppError::Schema(format!(
                    "{} column '{}' is not in the table schema {:?}",
                    role,
                    name,
                    table.columns()
                ))
            })
        })
        .collect()
}

/// Number of non-absent values in a row.
fn completeness(row: &[Option<Value>]) -> usize {
    row.iter().filter(|v| v.is_some()).count()
}

/// Orders two rows so the higher ranked one comes first.
///
/// Presence in each priority column is compared first, in declared order, then
/// the values themselves, larger first. Absent values always sort last.
/// Text that reads as a number compares numerically, so "10" beats "9".
fn compare_priority(a: &[Option<Value>], b: &[Option<Value>], priority: &[usize]) -> Ordering {
    let presence = priority
        .iter()
        .map(|&c| b[c].is_some().cmp(&a[c].is_some()))
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal);
    if presence.is_ne() {
        return presence;
    }

    priority
        .iter()
        .map(|&c| match (&a[c], &b[c]) {
            (Some(x), Some(y)) => compare_values(y, x),
            _ => Ordering::Equal,
        })
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => Some(*n),
        Value::Text(s) => s.trim().parse::<f64>().ok().filter(|n| !n.is_nan()),
    }
}

fn compare_values(x: &Value, y: &Value) -> Ordering {
    match (numeric(x), numeric(y)) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        _ => x.cmp(y),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;
    use std::fs;
    use tempfile::tempdir;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn run(table: Table, identity: &[&str], priority: &[&str]) -> Table {
        remove_duplicates(table, &cols(identity), &cols(priority), OutputOrder::Ranked).unwrap()
    }

    #[test]
    fn test_completeness_picks_fuller_record() {
        let table = Table::from_records(vec![
            Record::new().with("id", 1).with_absent("name").with("email", "a@x.com").with_absent("phone"),
            Record::new().with("id", 1).with("name", "Ann").with_absent("email").with("phone", "555"),
        ]);
        let out = run(table, &["id"], &[]);
        assert_eq!(out.len(), 1);
        assert_eq!(out.value(0, "name"), Some(&Value::from("Ann")));
    }

    #[test]
    fn test_equal_completeness_keeps_first_in_input_order() {
        // id plus one other field each: a tie.
        let table = Table::from_records(vec![
            Record::new().with("id", 1).with_absent("name").with("email", "a@x.com"),
            Record::new().with("id", 1).with("name", "Ann").with_absent("email"),
        ]);
        let out = run(table, &["id"], &[]);
        assert_eq!(out.len(), 1);
        assert_eq!(out.value(0, "email"), Some(&Value::from("a@x.com")));
    }

    #[test]
    fn test_priority_column_beats_completeness() {
        let table = Table::from_records(vec![
            Record::new().with("id", 1).with_absent("email").with("name", "Ann").with("phone", "555"),
            Record::new().with("id", 1).with("email", "a@x.com").with_absent("name").with_absent("phone"),
        ]);
        let out = run(table, &["id"], &["email"]);
        assert_eq!(out.len(), 1);
        assert_eq!(out.value(0, "email"), Some(&Value::from("a@x.com")));
    }

    #[test]
    fn test_priority_columns_in_declared_order() {
        let table = Table::from_records(vec![
            Record::new().with("id", 1).with_absent("email").with("phone", "555"),
            Record::new().with("id", 1).with("email", "a@x.com").with_absent("phone"),
            Record::new().with("id", 2).with("email", "b@x.com").with_absent("phone"),
            Record::new().with("id", 2).with("email", "b@x.com").with("phone", "777"),
        ]);
        let out = run(table, &["id"], &["email", "phone"]);
        assert_eq!(out.len(), 2);
        // Group 2's survivor has both columns, so it ranks first.
        assert_eq!(out.value(0, "phone"), Some(&Value::from("777")));
        assert_eq!(out.value(1, "email"), Some(&Value::from("a@x.com")));
    }

    #[test]
    fn test_priority_values_break_ties_descending() {
        let table = Table::from_records(vec![
            Record::new().with("id", 1).with("score", 3),
            Record::new().with("id", 1).with("score", 9),
            Record::new().with("id", 1).with("score", 5),
        ]);
        let out = run(table, &["id"], &["score"]);
        assert_eq!(out.value(0, "score"), Some(&Value::from(9)));
    }

    #[test]
    fn test_absent_identity_values_group_together() {
        let table = Table::from_records(vec![
            Record::new().with_absent("id").with("name", "a"),
            Record::new().with_absent("id").with("name", "b"),
            Record::new().with("id", 1).with("name", "c"),
        ]);
        let out = run(table, &["id"], &[]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_output_is_rank_order_by_default() {
        let table = Table::from_records(vec![
            Record::new().with("id", 1).with_absent("name"),
            Record::new().with("id", 2).with("name", "Bo"),
        ]);
        let out = run(table.clone(), &["id"], &[]);
        assert_eq!(out.value(0, "id"), Some(&Value::from(2)));

        let out = remove_duplicates(table, &cols(&["id"]), &[], OutputOrder::Input).unwrap();
        assert_eq!(out.value(0, "id"), Some(&Value::from(1)));
    }

    #[test]
    fn test_idempotent_on_unique_table() {
        let table = Table::from_records(vec![
            Record::new().with("id", 1).with("name", "Ann").with("email", "a@x.com"),
            Record::new().with("id", 2).with("name", "Bo").with_absent("email"),
            Record::new().with("id", 3).with_absent("name").with_absent("email"),
        ]);
        let once = run(table, &["id"], &[]);
        let twice = run(once.clone(), &["id"], &[]);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_output_identities_are_unique() {
        let table = Table::from_records(
            (0..20).map(|i| Record::new().with("k", i % 4).with("j", i % 2).with("v", i)),
        );
        let out = run(table, &["k", "j"], &[]);
        let mut seen = HashSet::new();
        for row in 0..out.len() {
            let key = (out.value(row, "k").cloned(), out.value(row, "j").cloned());
            assert!(seen.insert(key));
        }
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn test_empty_identity_is_config_error() {
        let table = Table::from_records(vec![Record::new().with("id", 1)]);
        let err = remove_duplicates(table, &[], &[], OutputOrder::Ranked).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));

        let err = Deduplicator::default()
            .deduplicate(DedupRequest::from_table(Table::default(), vec![]))
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_unknown_columns_are_schema_errors() {
        let table = Table::from_records(vec![Record::new().with("id", 1)]);
        let err = remove_duplicates(table.clone(), &cols(&["nope"]), &[], OutputOrder::Ranked)
            .unwrap_err();
        assert!(matches!(err, AppError::Schema(_)));

        let err = remove_duplicates(table, &cols(&["id"]), &cols(&["nope"]), OutputOrder::Ranked)
            .unwrap_err();
        assert!(matches!(err, AppError::Schema(_)));
    }

    #[test]
    fn test_source_must_be_exactly_one() {
        assert!(matches!(Source::resolve(None, None), Err(AppError::Config(_))));
        assert!(matches!(
            Source::resolve(Some("a.csv".into()), Some(Table::default())),
            Err(AppError::Config(_))
        ));
        assert!(matches!(
            Source::resolve(Some("a.csv".into()), None),
            Ok(Source::Path(_))
        ));
    }

    #[test]
    fn test_in_place_overwrites_source() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("leads.csv");
        fs::write(&path, "id,name,email\n1,,a@x.com\n1,Ann,a@x.com\n2,Bo,\n").unwrap();

        let outcome = Deduplicator::default()
            .deduplicate(DedupRequest::from_path(&path, cols(&["id"])).in_place(true))
            .unwrap();
        assert_eq!(
            outcome,
            Deduplicated::Written {
                path: path.clone(),
                kept: 2,
                dropped: 1
            }
        );
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "id,name,email\n1,Ann,a@x.com\n2,Bo,\n"
        );
    }

    #[test]
    fn test_path_source_without_in_place_returns_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("leads.csv");
        fs::write(&path, "id,email\n1,a@x.com\n1,\n").unwrap();

        let table = Deduplicator::default()
            .deduplicate(DedupRequest::from_path(&path, cols(&["id"])).priority(cols(&["email"])))
            .unwrap()
            .into_table()
            .unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.value(0, "email"), Some(&Value::from("a@x.com")));
        // Source untouched.
        assert_eq!(fs::read_to_string(&path).unwrap(), "id,email\n1,a@x.com\n1,\n");
    }

    #[test]
    fn test_missing_source_file_is_io_error() {
        let dir = tempdir().unwrap();
        let err = Deduplicator::default()
            .deduplicate(DedupRequest::from_path(dir.path().join("gone.csv"), cols(&["id"])))
            .unwrap_err();
        assert!(err.is_io());
    }

    #[test]
    fn test_numeric_text_priority_compares_as_numbers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scores.csv");
        fs::write(&path, "id,score\n1,9\n1,10\n").unwrap();

        let table = Deduplicator::default()
            .deduplicate(DedupRequest::from_path(&path, cols(&["id"])).priority(cols(&["score"])))
            .unwrap()
            .into_table()
            .unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.value(0, "score"), Some(&Value::from("10")));
    }

    #[test]
    fn test_mixed_text_priority_falls_back_to_text_order() {
        let table = Table::from_records(vec![
            Record::new().with("id", 1).with("tag", "10"),
            Record::new().with("id", 1).with("tag", "beta"),
        ]);
        let out = run(table, &["id"], &["tag"]);
        assert_eq!(out.value(0, "tag"), Some(&Value::from("beta")));
    }

    #[test]
    fn test_unwritable_output_is_io_error() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.csv");
        fs::write(&input, "id,name\n1,Ann\n1,\n").unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();
        let output = blocker.join("out.csv");

        let err = Deduplicator::default()
            .deduplicate_to(&input, &output, cols(&["id"]), Vec::new(), OutputOrder::Ranked)
            .unwrap_err();
        assert!(err.is_io(), "unexpected error: {}", err);
        assert_eq!(fs::read_to_string(&input).unwrap(), "id,name\n1,Ann\n1,\n");
    }
}
