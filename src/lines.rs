//! Line-oriented text files: one record per line.

use crate::error::Result;
use std::fs;
use std::path::Path;

/// Reads `path` into lines. A missing file reads as an empty list.
pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        tracing::debug!("{} does not exist, returning no lines", path.display());
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)?;
    Ok(content.lines().map(str::to_string).collect())
}

/// Writes `lines` newline-joined, replacing any existing content.
/// Embedded newlines are not escaped.
pub fn write_lines<S: AsRef<str>>(path: &Path, lines: &[S]) -> Result<()> {
    let mut content = lines
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<&str>>()
        .join("\n");
    if !content.is_empty() {
        content.push('\n');
    }
    fs::write(path, content)?;
    Ok(())
}
