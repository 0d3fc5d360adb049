// Library exports for accessviz

pub mod classify;
pub mod config;
pub mod error;
pub mod graph;
pub mod grid;
pub mod join;
pub mod locate;
pub mod merge;
pub mod palette;
pub mod pipeline;
pub mod reproject;
pub mod visualize;
pub mod web_map;

pub use config::{MapOptions, PipelineConfig, StaticMapOptions, WebMapOptions};
pub use error::{Failure, PipelineError, Stage};
pub use pipeline::Pipeline;
pub use visualize::MapType;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const SUCCESS_MESSAGE: &str = "Map saved successfully";

/// One visualization request, as handed over by the caller layer.
#[derive(Debug, Clone, Deserialize)]
pub struct VisualizationRequest {
    /// Substring matched against folder names below the travel time root
    pub folder: String,
    /// Comma separated substrings matched against file names
    pub file: String,
    /// Column to classify and colour
    pub column: String,
    /// `"interactive"` or `"static"`
    pub map_type: String,
    pub output_layer_name: String,
    /// Map path without extension
    pub output_map_name: String,
}

/// Acknowledgement of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub message: String,
    pub output_map_path: PathBuf,
    pub output_layer_path: PathBuf,
    pub matched_files: Vec<PathBuf>,
    pub rows: usize,
}
