use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Request,
    Grid,
    Search,
    Merge,
    Join,
    Visualize,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Request => "request",
            Stage::Grid => "grid",
            Stage::Search => "search",
            Stage::Merge => "merge",
            Stage::Join => "join",
            Stage::Visualize => "visualize",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("could not load spatial grid from {}: {reason}", path.display())]
    DataLoad { path: PathBuf, reason: String },

    #[error("file search under {} failed: {source}", root.display())]
    Search {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("could not merge travel time files: {reason}")]
    Merge { reason: String },

    #[error("grid has {grid_rows} cells but the merged table has {table_rows} rows")]
    Alignment { grid_rows: usize, table_rows: usize },

    #[error("column '{column}' exists in both the grid and the travel time table")]
    ColumnConflict { column: String },

    #[error("could not write {}: {reason}", path.display())]
    Persistence { path: PathBuf, reason: String },

    #[error("column '{column}' {reason}")]
    Column { column: String, reason: String },

    #[error("invalid map type '{given}': choose between \"static\" or \"interactive\" only")]
    InvalidMode { given: String },

    #[error("rendering failed: {0}")]
    Render(String),
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::InvalidRequest { .. } => Stage::Request,
            PipelineError::DataLoad { .. } => Stage::Grid,
            PipelineError::Search { .. } => Stage::Search,
            PipelineError::Merge { .. } => Stage::Merge,
            PipelineError::Alignment { .. }
            | PipelineError::ColumnConflict { .. }
            | PipelineError::Persistence { .. } => Stage::Join,
            PipelineError::Column { .. }
            | PipelineError::InvalidMode { .. }
            | PipelineError::Render(_) => Stage::Visualize,
        }
    }

    /// Stable name of the failure condition, suitable for mapping to a
    /// transport-level status by the caller.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::InvalidRequest { .. } => "InvalidRequestError",
            PipelineError::DataLoad { .. } => "DataLoadError",
            PipelineError::Search { .. } => "SearchError",
            PipelineError::Merge { .. } => "MergeError",
            PipelineError::Alignment { .. } => "AlignmentError",
            PipelineError::ColumnConflict { .. } => "ColumnConflictError",
            PipelineError::Persistence { .. } => "PersistenceError",
            PipelineError::Column { .. } => "ColumnError",
            PipelineError::InvalidMode { .. } => "InvalidModeError",
            PipelineError::Render(_) => "RenderError",
        }
    }

    pub(crate) fn data_load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        PipelineError::DataLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn merge(reason: impl Into<String>) -> Self {
        PipelineError::Merge {
            reason: reason.into(),
        }
    }

    pub(crate) fn persistence(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        PipelineError::Persistence {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn column(column: &str, reason: impl Into<String>) -> Self {
        PipelineError::Column {
            column: column.to_string(),
            reason: reason.into(),
        }
    }
}

/// Structured failure description returned to the caller layer.
#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    pub stage: Stage,
    pub kind: &'static str,
    pub message: String,
}

impl From<&PipelineError> for Failure {
    fn from(err: &PipelineError) -> Self {
        Failure {
            stage: err.stage(),
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
