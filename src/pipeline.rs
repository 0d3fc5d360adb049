// Coordinator: locate, merge, join, persist and visualize for one request

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::grid::{load_grid, SpatialGrid};
use crate::join::{join, persist};
use crate::locate::{locate, FileQuery};
use crate::merge::merge_files;
use crate::visualize::visualize;
use crate::{PipelineOutcome, VisualizationRequest, SUCCESS_MESSAGE};
use std::path::Path;
use tracing::info;

/// Holds the reference grid for the lifetime of the process and runs requests
/// against it. The grid is never modified after loading.
///
/// Runs writing to the same output paths must be serialised by the caller.
pub struct Pipeline {
    config: PipelineConfig,
    grid: SpatialGrid,
}

impl Pipeline {
    /// Load the grid named by `config`.
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        let grid = load_grid(&config.grid_path, &config.id_field)?;
        Ok(Self::with_grid(config, grid))
    }

    /// A grid that declares no CRS is taken to be in `config.grid_epsg`.
    pub fn with_grid(config: PipelineConfig, grid: SpatialGrid) -> Self {
        let grid = grid.with_default_epsg(config.grid_epsg);
        Pipeline { config, grid }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    /// Run one request end to end, stopping at the first failing stage.
    #[tracing::instrument(skip_all, fields(folder = %request.folder, file = %request.file, map_type = %request.map_type))]
    pub fn run(&self, request: &VisualizationRequest) -> Result<PipelineOutcome, PipelineError> {
        validate(request)?;

        let query = FileQuery::parse(&request.folder, &request.file);
        let matched_files = locate(&self.config.travel_time_root, &query)?.into_paths();

        // An empty match list is not an error until the merge needs a file
        let table = merge_files(&matched_files)?;
        let rows = table.len();

        let layer = join(&self.grid, table)?;
        let output_layer_path = persist(&layer, &request.output_layer_name)?;

        let output_map_path = visualize(
            &layer,
            &request.column,
            &request.map_type,
            Path::new(&request.output_map_name),
            &self.config.map,
        )?;

        info!(map = %output_map_path.display(), "{}", SUCCESS_MESSAGE);
        Ok(PipelineOutcome {
            message: SUCCESS_MESSAGE.to_string(),
            output_map_path,
            output_layer_path,
            matched_files,
            rows,
        })
    }
}

fn validate(request: &VisualizationRequest) -> Result<(), PipelineError> {
    let fields = [
        ("folder", &request.folder),
        ("file", &request.file),
        ("output_layer_name", &request.output_layer_name),
        ("output_map_name", &request.output_map_name),
    ];
    for (name, value) in fields {
        if value.trim().is_empty() {
            return Err(PipelineError::InvalidRequest {
                reason: format!("'{name}' must not be blank"),
            });
        }
    }
    if request.file.split(',').all(|f| f.trim().is_empty()) {
        return Err(PipelineError::InvalidRequest {
            reason: "'file' holds no file name fragment".to_string(),
        });
    }
    Ok(())
}
