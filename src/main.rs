use accessviz::{Failure, Pipeline, PipelineConfig, VisualizationRequest};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "accessviz")]
#[command(about = "Join travel time matrix files to the YKR grid and map one column", long_about = None)]
struct Args {
    /// JSON config file; defaults apply to anything it leaves out
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Grid GeoJSON, overrides the config
    #[arg(long, value_name = "FILE")]
    grid: Option<PathBuf>,

    /// Root of the travel time matrix tree, overrides the config
    #[arg(long, value_name = "DIR")]
    data_root: Option<PathBuf>,

    /// Request as a JSON document instead of the flags below
    #[arg(long, value_name = "FILE", conflicts_with_all = ["folder", "file", "column", "map_type", "output_layer", "output_map"])]
    request: Option<PathBuf>,

    /// Substring of the folder names to search
    #[arg(long, required_unless_present = "request")]
    folder: Option<String>,

    /// Comma separated substrings of the file names to pick up
    #[arg(long, required_unless_present = "request")]
    file: Option<String>,

    /// Column to classify (e.g. car_r_t)
    #[arg(long, required_unless_present = "request")]
    column: Option<String>,

    /// "interactive" or "static"
    #[arg(long, required_unless_present = "request")]
    map_type: Option<String>,

    /// Path of the joined layer; .geojson is appended
    #[arg(long, required_unless_present = "request")]
    output_layer: Option<String>,

    /// Path of the map without extension
    #[arg(long, required_unless_present = "request")]
    output_map: Option<String>,
}

impl Args {
    fn load_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(grid) = &self.grid {
            config.grid_path = grid.clone();
        }
        if let Some(root) = &self.data_root {
            config.travel_time_root = root.clone();
        }
        Ok(config)
    }

    fn into_request(self) -> Result<VisualizationRequest> {
        if let Some(path) = self.request {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read request file {}", path.display()))?;
            return serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse request file {}", path.display()));
        }

        // clap enforces presence when --request is absent
        Ok(VisualizationRequest {
            folder: self.folder.unwrap_or_default(),
            file: self.file.unwrap_or_default(),
            column: self.column.unwrap_or_default(),
            map_type: self.map_type.unwrap_or_default(),
            output_layer_name: self.output_layer.unwrap_or_default(),
            output_map_name: self.output_map.unwrap_or_default(),
        })
    }
}

fn init_logging() {
    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_writer(io::stderr)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));

    tracing_subscriber::registry().with(stderr_layer).init();
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    serde_json::to_writer_pretty(&mut handle, value).context("Failed to write result")?;
    writeln!(handle).context("Failed to write result")?;
    handle.flush().context("Failed to flush stdout")?;
    Ok(())
}

fn main() -> Result<ExitCode> {
    init_logging();

    let args = Args::parse();
    let config = args.load_config()?;
    let request = args.into_request()?;

    let outcome = Pipeline::new(config).and_then(|pipeline| pipeline.run(&request));

    match outcome {
        Ok(outcome) => {
            print_json(&outcome)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!(stage = %e.stage(), kind = e.kind(), "{e}");
            print_json(&Failure::from(&e))?;
            Ok(ExitCode::FAILURE)
        }
    }
}
