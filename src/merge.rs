// Concatenation of semicolon-delimited travel time files into one table

use crate::error::PipelineError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Rows of every merged file, in file order then row order.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl MergedTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Raw cell values of one column, `None` if the column is absent.
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &str> + '_> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| row[idx].as_str()))
    }
}

/// Read one travel time file: a header row followed by data rows, `;`-separated.
pub fn read_table(path: &Path) -> Result<MergedTable, PipelineError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .from_path(path)
        .map_err(|e| PipelineError::merge(format!("opening {}: {e}", path.display())))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| PipelineError::merge(format!("reading header of {}: {e}", path.display())))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(PipelineError::merge(format!("{} has no header row", path.display())));
    }

    let mut rows = Vec::new();
    for (row_no, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            PipelineError::merge(format!("{} row {}: {e}", path.display(), row_no + 1))
        })?;
        rows.push(record.iter().map(|v| v.trim().to_string()).collect());
    }

    Ok(MergedTable::new(headers, rows))
}

/// Concatenate `paths` into one table.
///
/// Every file must share the first file's header exactly; a mismatch fails
/// the merge instead of gap-filling. A list with no paths is an error, while
/// files that only contain a header are accepted and contribute no rows.
#[tracing::instrument(skip_all, fields(files = paths.len()))]
pub fn merge_files(paths: &[PathBuf]) -> Result<MergedTable, PipelineError> {
    let Some((first, rest)) = paths.split_first() else {
        return Err(PipelineError::merge("no files to merge"));
    };

    let mut merged = read_table(first)?;
    debug!(path = %first.display(), rows = merged.len(), "Read travel time file");

    for path in rest {
        let table = read_table(path)?;
        if table.headers != merged.headers {
            return Err(PipelineError::merge(format!(
                "{} has columns [{}] but expected [{}]",
                path.display(),
                table.headers.join(", "),
                merged.headers.join(", ")
            )));
        }
        debug!(path = %path.display(), rows = table.len(), "Read travel time file");
        merged.rows.extend(table.rows);
    }

    info!(rows = merged.len(), columns = merged.headers.len(), "Travel time files merged");
    Ok(merged)
}
