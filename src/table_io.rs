//! Thin adapters between delimited files on disk and in-memory [`Table`]s.

use crate::error::{AppError, Result};
use crate::logging::LogContext;
use crate::models::{Record, Table, Value, cell_from_field};
use csv::{ReaderBuilder, WriterBuilder};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Reads and writes tables in one delimited format.
#[derive(Debug, Clone)]
pub struct TableIo {
    delimiter: u8,
    extension: String,
    log: LogContext,
}

impl Default for TableIo {
    fn default() -> Self {
        Self::new(b',', "csv", LogContext::new())
    }
}

impl TableIo {
    pub fn new(delimiter: u8, extension: impl Into<String>, log: LogContext) -> Self {
        Self {
            delimiter,
            extension: extension.into(),
            log,
        }
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Parses a delimited file whose first row is the header.
    ///
    /// An empty file yields a table with no columns; a header-only file yields
    /// the schema and zero records. Short rows are padded with absent values.
    pub fn load_table(&self, path: &Path) -> Result<Table> {
        let _span = self.log.span("table_io").entered();
        if !path.exists() {
            return Err(AppError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("table file not found: {}", path.display()),
            )));
        }

        let file = File::open(path)?;
        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(file);

        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut table = Table::with_columns(columns);
        let width = table.columns().len();

        for (index, result) in reader.records().enumerate() {
            let record = result?;
            if record.len() > width {
                return Err(AppError::Parse(format!(
                    "{}: data row {} has {} fields but the header has {}",
                    path.display(),
                    index + 1,
                    record.len(),
                    width
                )));
            }
            table.push_row(record.iter().map(cell_from_field).collect());
        }

        tracing::debug!(
            "{}",
            self.log.decorate(&format!(
                "Loaded {} records ({} columns) from {}",
                table.len(),
                width,
                path.display()
            ))
        );
        Ok(table)
    }

    /// Writes a header row from the schema followed by one row per record.
    /// Absent values are written as empty fields. Existing content is replaced.
    pub fn save_table(&self, table: &Table, path: &Path) -> Result<()> {
        let _span = self.log.span("table_io").entered();
        ensure_parent(path)?;

        let mut writer = WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_path(path)?;

        if !table.columns().is_empty() {
            writer.write_record(table.columns())?;
        }
        for row in table.rows() {
            writer.write_record(row.iter().map(field_text))?;
        }
        writer.flush()?;

        tracing::debug!(
            "{}",
            self.log
                .decorate(&format!("Wrote {} records to {}", table.len(), path.display()))
        );
        Ok(())
    }

    /// Appends one record to `path`, writing a header first when the file is
    /// new or empty. A last line without a line terminator is closed first.
    ///
    /// With `schema`, the record is projected onto exactly those columns before
    /// it lands, so heterogeneous records fit a fixed-width sink.
    pub fn append_record(
        &self,
        path: &Path,
        record: &Record,
        schema: Option<&[String]>,
    ) -> Result<()> {
        let _span = self.log.span("table_io").entered();
        let record = match schema {
            Some(columns) => record.project(columns),
            None => record.clone(),
        };

        let needs_header = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
        ensure_parent(path)?;

        let needs_newline = !needs_header && !ends_with_newline(path)?;

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        if needs_newline {
            file.write_all(b"\n")?;
        }
        let mut writer = WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(file);

        if needs_header {
            tracing::debug!(
                "{}",
                self.log
                    .decorate(&format!("Starting {} with a header row", path.display()))
            );
            writer.write_record(record.columns())?;
        }
        writer.write_record(record.iter().map(|(_, value)| field_text(&value.cloned())))?;
        writer.flush()?;
        Ok(())
    }

    /// Concatenates every file with this format's extension in `directory`.
    ///
    /// Files are read in name order. The merged schema is the union of all
    /// schemas in first-seen order. Empty or malformed files are skipped with a
    /// warning; filesystem failures still abort.
    pub fn merge_tables(&self, directory: &Path) -> Result<Table> {
        let _span = self.log.span("table_io").entered();
        let sources = self.list_tables(directory)?;
        let mut merged = Table::default();
        let mut used = 0usize;

        for path in &sources {
            match self.load_table(path) {
                Ok(table) if table.columns().is_empty() => {
                    tracing::warn!(
                        "{}",
                        self.log
                            .decorate(&format!("Skipping empty file {}", path.display()))
                    );
                }
                Ok(table) => {
                    merged.extend_from(&table);
                    used += 1;
                }
                Err(e) if !e.is_io() => {
                    tracing::warn!(
                        "{}",
                        self.log.decorate(&format!(
                            "Skipping unparseable file {}: {}",
                            path.display(),
                            e
                        ))
                    );
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            "{}",
            self.log.decorate(&format!(
                "Merged {} of {} files from {} into {} records",
                used,
                sources.len(),
                directory.display(),
                merged.len()
            ))
        );
        Ok(merged)
    }

    /// Lists files in `directory` carrying this format's extension, sorted.
    pub fn list_tables(&self, directory: &Path) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(directory)? {
            let path = entry?.path();
            let matches = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(&self.extension));
            if path.is_file() && matches {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

fn field_text(value: &Option<Value>) -> String {
    value.as_ref().map(Value::as_field).unwrap_or_default()
}

fn ends_with_newline(path: &Path) -> Result<bool> {
    let mut file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
