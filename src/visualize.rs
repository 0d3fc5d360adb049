// Visualizer: classify one column of the joined layer and render it as a map

use crate::classify::{self, Classification, NATURAL_BREAKS_CLASSES, QUANTILE_CLASSES};
use crate::config::MapOptions;
use crate::error::PipelineError;
use crate::graph::{ClassStyle, MapCanvas};
use crate::join::JoinedLayer;
use crate::palette::Ramp;
use crate::web_map;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapType {
    /// Leaflet web page, natural breaks classes
    Interactive,
    /// PNG raster, quantile classes
    Static,
}

impl MapType {
    pub fn extension(self) -> &'static str {
        match self {
            MapType::Interactive => "html",
            MapType::Static => "png",
        }
    }
}

impl fmt::Display for MapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapType::Interactive => f.write_str("interactive"),
            MapType::Static => f.write_str("static"),
        }
    }
}

impl FromStr for MapType {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "interactive" => Ok(MapType::Interactive),
            "static" => Ok(MapType::Static),
            other => Err(PipelineError::InvalidMode {
                given: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VisualizerState {
    AwaitingMode,
    Interactive,
    Static,
    Done(PathBuf),
    Failed,
}

/// One visualization call over a joined layer.
///
/// Starts in `AwaitingMode`, moves to `Interactive` or `Static` once the mode
/// is accepted, and ends in `Done` or `Failed`. A visualizer runs once.
pub struct Visualizer<'a> {
    layer: &'a JoinedLayer<'a>,
    column: String,
    output: PathBuf,
    options: &'a MapOptions,
    state: VisualizerState,
}

impl<'a> Visualizer<'a> {
    /// `output` is the map path without extension.
    pub fn new(layer: &'a JoinedLayer<'a>, column: &str, output: &Path, options: &'a MapOptions) -> Self {
        Visualizer {
            layer,
            column: column.to_string(),
            output: output.to_path_buf(),
            options,
            state: VisualizerState::AwaitingMode,
        }
    }

    pub fn state(&self) -> &VisualizerState {
        &self.state
    }

    /// Render in `mode` and return the written map path.
    #[tracing::instrument(skip(self), fields(column = %self.column))]
    pub fn run(&mut self, mode: &str) -> Result<PathBuf, PipelineError> {
        if self.state != VisualizerState::AwaitingMode {
            return Err(PipelineError::Render(format!(
                "visualizer already ran and is in state {:?}",
                self.state
            )));
        }

        let map_type = match mode.parse::<MapType>() {
            Ok(map_type) => map_type,
            Err(e) => {
                self.state = VisualizerState::Failed;
                return Err(e);
            }
        };

        self.state = match map_type {
            MapType::Interactive => VisualizerState::Interactive,
            MapType::Static => VisualizerState::Static,
        };

        let result = match map_type {
            MapType::Interactive => self.render_interactive(),
            MapType::Static => self.render_static(),
        };

        self.state = match &result {
            Ok(path) => VisualizerState::Done(path.clone()),
            Err(_) => VisualizerState::Failed,
        };
        result
    }

    fn render_interactive(&self) -> Result<PathBuf, PipelineError> {
        let values = self.layer.numeric_column(&self.column)?;
        let classification = self.classify(&values, classify::natural_breaks, NATURAL_BREAKS_CLASSES)?;

        let html = web_map::render_html(self.layer, &self.column, &values, &classification, &self.options.web)
            .map_err(render_error)?;

        self.write(MapType::Interactive, html.as_bytes())
    }

    fn render_static(&self) -> Result<PathBuf, PipelineError> {
        let values = self.layer.numeric_column(&self.column)?;
        let classification = self.classify(&values, classify::quantiles, QUANTILE_CLASSES)?;

        let raster = &self.options.raster;
        let bounds = self
            .layer
            .grid()
            .bounds()
            .ok_or_else(|| PipelineError::Render("layer has no coordinates to draw".to_string()))?;

        let styles: Vec<ClassStyle> = Ramp::Spectral
            .colors(classification.k())
            .into_iter()
            .zip(classification.legend_labels())
            .map(|(color, label)| ClassStyle {
                color: color.into(),
                alpha: raster.alpha,
                label,
            })
            .collect();
        let shapes: Vec<&geojson::Value> = self
            .layer
            .grid()
            .cells()
            .iter()
            .map(|c| &c.geometry.value)
            .collect();

        let (width, height) = raster.pixel_size();
        let mut canvas =
            MapCanvas::new(width, height, raster.dpi, &raster.title, bounds).map_err(render_error)?;
        canvas
            .draw_choropleth(&shapes, &classification.classes, &styles)
            .map_err(render_error)?;
        let png_bytes = canvas.render().map_err(render_error)?;

        self.write(MapType::Static, &png_bytes)
    }

    fn classify(
        &self,
        values: &[Option<f64>],
        scheme: fn(&[Option<f64>], usize) -> Option<Classification>,
        k: usize,
    ) -> Result<Classification, PipelineError> {
        let classification = scheme(values, k)
            .ok_or_else(|| PipelineError::column(&self.column, "has no numeric values to classify"))?;
        info!(
            scheme = %classification.scheme,
            classes = classification.k(),
            counts = ?classification.counts(),
            "Column classified"
        );
        Ok(classification)
    }

    fn write(&self, map_type: MapType, bytes: &[u8]) -> Result<PathBuf, PipelineError> {
        let path = map_path(&self.output, map_type);
        std::fs::write(&path, bytes).map_err(|e| PipelineError::persistence(&path, e))?;
        info!(path = %path.display(), map_type = %map_type, "Map written");
        Ok(path)
    }
}

fn render_error(e: anyhow::Error) -> PipelineError {
    PipelineError::Render(format!("{e:#}"))
}

/// `<output>.html` or `<output>.png`.
pub fn map_path(output: &Path, map_type: MapType) -> PathBuf {
    let mut name = OsString::from(output.as_os_str());
    name.push(".");
    name.push(map_type.extension());
    PathBuf::from(name)
}

/// Render `column` of `layer` in `mode` to `output` plus the mode's extension.
pub fn visualize(
    layer: &JoinedLayer<'_>,
    column: &str,
    mode: &str,
    output: &Path,
    options: &MapOptions,
) -> Result<PathBuf, PipelineError> {
    Visualizer::new(layer, column, output, options).run(mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{GridCell, SpatialGrid};
    use crate::join::join;
    use crate::merge::MergedTable;
    use geojson::{Geometry, JsonObject, Value};
    use tempfile::TempDir;

    fn make_grid(n: usize) -> SpatialGrid {
        let cells = (0..n)
            .map(|i| {
                let x = (i % 4) as f64;
                let y = (i / 4) as f64;
                GridCell {
                    id: i.to_string(),
                    geometry: Geometry::new(Value::Polygon(vec![vec![
                        vec![x, y],
                        vec![x + 1.0, y],
                        vec![x + 1.0, y + 1.0],
                        vec![x, y + 1.0],
                        vec![x, y],
                    ]])),
                    properties: JsonObject::new(),
                }
            })
            .collect();
        SpatialGrid::from_cells(cells).unwrap()
    }

    fn make_table(values: &[String]) -> MergedTable {
        MergedTable::new(
            vec!["car_r_t".to_string(), "label".to_string()],
            values.iter().map(|v| vec![v.clone(), "x".to_string()]).collect(),
        )
    }

    fn numbers(n: usize) -> Vec<String> {
        (0..n).map(|i| (10 + i * 7).to_string()).collect()
    }

    #[test]
    fn test_map_type_parse() {
        assert_eq!("interactive".parse::<MapType>().unwrap(), MapType::Interactive);
        assert_eq!("static".parse::<MapType>().unwrap(), MapType::Static);
        for bad in ["chart", "Static", "", " interactive"] {
            let err = bad.parse::<MapType>().unwrap_err();
            assert_eq!(err.kind(), "InvalidModeError");
        }
    }

    #[test]
    fn test_map_path() {
        assert_eq!(
            map_path(Path::new("out/helsinki"), MapType::Interactive),
            PathBuf::from("out/helsinki.html")
        );
        assert_eq!(
            map_path(Path::new("out/helsinki"), MapType::Static),
            PathBuf::from("out/helsinki.png")
        );
    }

    #[test]
    fn test_invalid_mode_fails_state() {
        let dir = TempDir::new().unwrap();
        let grid = make_grid(12);
        let layer = join(&grid, make_table(&numbers(12))).unwrap();
        let options = MapOptions::default();
        let mut visualizer = Visualizer::new(&layer, "car_r_t", &dir.path().join("map"), &options);
        assert_eq!(visualizer.state(), &VisualizerState::AwaitingMode);

        let err = visualizer.run("chart").unwrap_err();
        assert!(matches!(err, PipelineError::InvalidMode { ref given } if given == "chart"));
        assert!(err.to_string().contains("static"));
        assert!(err.to_string().contains("interactive"));
        assert_eq!(visualizer.state(), &VisualizerState::Failed);
        assert!(!dir.path().join("map.html").exists());
        assert!(!dir.path().join("map.png").exists());
    }

    #[test]
    fn test_interactive_writes_html() {
        let dir = TempDir::new().unwrap();
        let grid = make_grid(12);
        let layer = join(&grid, make_table(&numbers(12))).unwrap();
        let options = MapOptions::default();
        let mut visualizer = Visualizer::new(&layer, "car_r_t", &dir.path().join("map"), &options);

        let path = visualizer.run("interactive").unwrap();
        assert_eq!(path, dir.path().join("map.html"));
        assert_eq!(visualizer.state(), &VisualizerState::Done(path.clone()));
        let html = std::fs::read_to_string(&path).unwrap();
        assert!(html.contains("class-data"));
    }

    #[test]
    fn test_visualizer_runs_once() {
        let dir = TempDir::new().unwrap();
        let grid = make_grid(12);
        let layer = join(&grid, make_table(&numbers(12))).unwrap();
        let options = MapOptions::default();
        let mut visualizer = Visualizer::new(&layer, "car_r_t", &dir.path().join("map"), &options);
        visualizer.run("interactive").unwrap();
        assert!(matches!(visualizer.run("interactive"), Err(PipelineError::Render(_))));
    }

    #[test]
    fn test_missing_column() {
        let dir = TempDir::new().unwrap();
        let grid = make_grid(4);
        let layer = join(&grid, make_table(&numbers(4))).unwrap();
        let err = visualize(&layer, "walk_t", "interactive", &dir.path().join("map"), &MapOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), "ColumnError");
    }

    #[test]
    fn test_non_numeric_column() {
        let dir = TempDir::new().unwrap();
        let grid = make_grid(4);
        let layer = join(&grid, make_table(&numbers(4))).unwrap();
        let err = visualize(&layer, "label", "static", &dir.path().join("map"), &MapOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), "ColumnError");
    }

    #[test]
    fn test_all_missing_column() {
        let dir = TempDir::new().unwrap();
        let grid = make_grid(3);
        let empty = vec![String::new(); 3];
        let layer = join(&grid, make_table(&empty)).unwrap();
        let err = visualize(&layer, "car_r_t", "interactive", &dir.path().join("map"), &MapOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("no numeric values"));
    }

    #[test]
    fn test_unwritable_output() {
        let dir = TempDir::new().unwrap();
        let grid = make_grid(4);
        let layer = join(&grid, make_table(&numbers(4))).unwrap();
        let output = dir.path().join("missing/map");
        let err = visualize(&layer, "car_r_t", "interactive", &output, &MapOptions::default()).unwrap_err();
        assert_eq!(err.kind(), "PersistenceError");
    }

    #[test]
    fn test_static_writes_png() {
        let dir = TempDir::new().unwrap();
        let grid = make_grid(8);
        let layer = join(&grid, make_table(&numbers(8))).unwrap();
        let mut options = MapOptions::default();
        options.raster.dpi = 50;

        let path = visualize(&layer, "car_r_t", "static", &dir.path().join("map"), &options).unwrap();
        assert_eq!(path, dir.path().join("map.png"));
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[0..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
    }
}
