use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Settings that stay fixed across pipeline runs.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_grid_path")]
    pub grid_path: PathBuf,
    #[serde(default = "default_travel_time_root")]
    pub travel_time_root: PathBuf,
    /// Attribute used as the cell identifier when a feature carries no `id`.
    #[serde(default = "default_id_field")]
    pub id_field: String,
    /// CRS of the grid coordinates when the file does not declare one.
    /// ETRS-TM35FIN by default.
    #[serde(default = "default_grid_epsg")]
    pub grid_epsg: u16,
    #[serde(default)]
    pub map: MapOptions,
}

fn default_grid_path() -> PathBuf {
    PathBuf::from("../data/MetropAccess_YKR_grid_EurefFIN.geojson")
}
fn default_travel_time_root() -> PathBuf {
    PathBuf::from("../data/travel_time_matrix")
}
fn default_id_field() -> String {
    "YKR_ID".to_string()
}
fn default_grid_epsg() -> u16 {
    3067
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            grid_path: default_grid_path(),
            travel_time_root: default_travel_time_root(),
            id_field: default_id_field(),
            grid_epsg: default_grid_epsg(),
            map: MapOptions::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MapOptions {
    #[serde(default)]
    pub web: WebMapOptions,
    #[serde(default)]
    pub raster: StaticMapOptions,
}

/// Options for the interactive (HTML) map.
#[derive(Debug, Clone, Deserialize)]
pub struct WebMapOptions {
    /// Initial view as `[lat, lon]`.
    #[serde(default = "default_center")]
    pub center: [f64; 2],
    #[serde(default = "default_zoom")]
    pub zoom: u8,
    /// Zoom to the overlay's extent once it is loaded.
    #[serde(default = "default_true")]
    pub fit_bounds: bool,
    #[serde(default = "default_fill_opacity")]
    pub fill_opacity: f64,
    #[serde(default = "default_line_opacity")]
    pub line_opacity: f64,
    #[serde(default = "default_title")]
    pub legend_name: String,
}

fn default_center() -> [f64; 2] { [60.2, 25.0] }
fn default_zoom() -> u8 { 12 }
fn default_true() -> bool { true }
fn default_fill_opacity() -> f64 { 0.7 }
fn default_line_opacity() -> f64 { 0.2 }
fn default_title() -> String { "Travel Time Category".to_string() }

impl Default for WebMapOptions {
    fn default() -> Self {
        Self {
            center: default_center(),
            zoom: default_zoom(),
            fit_bounds: true,
            fill_opacity: default_fill_opacity(),
            line_opacity: default_line_opacity(),
            legend_name: default_title(),
        }
    }
}

/// Options for the static (PNG) map. Pixel size is `inches * dpi`.
#[derive(Debug, Clone, Deserialize)]
pub struct StaticMapOptions {
    #[serde(default = "default_width_in")]
    pub width_in: f64,
    #[serde(default = "default_height_in")]
    pub height_in: f64,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default = "default_title")]
    pub title: String,
}

fn default_width_in() -> f64 { 6.4 }
fn default_height_in() -> f64 { 4.8 }
fn default_dpi() -> u32 { 300 }
fn default_alpha() -> f64 { 0.8 }

impl Default for StaticMapOptions {
    fn default() -> Self {
        Self {
            width_in: default_width_in(),
            height_in: default_height_in(),
            dpi: default_dpi(),
            alpha: default_alpha(),
            title: default_title(),
        }
    }
}

impl StaticMapOptions {
    pub fn pixel_size(&self) -> (u32, u32) {
        let dpi = self.dpi as f64;
        (
            (self.width_in * dpi).round().max(1.0) as u32,
            (self.height_in * dpi).round().max(1.0) as u32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config: PipelineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.id_field, "YKR_ID");
        assert_eq!(config.grid_epsg, 3067);
        assert_eq!(config.travel_time_root, PathBuf::from("../data/travel_time_matrix"));
        assert_eq!(config.map.raster.dpi, 300);
        assert_eq!(config.map.web.zoom, 12);
        assert_eq!(config.map.web.legend_name, "Travel Time Category");
    }

    #[test]
    fn test_partial_override() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{"grid_path": "grid.geojson", "map": {"raster": {"dpi": 100}}}"#,
        )
        .unwrap();
        assert_eq!(config.grid_path, PathBuf::from("grid.geojson"));
        assert_eq!(config.map.raster.dpi, 100);
        assert_eq!(config.map.raster.width_in, 6.4);
        assert!(config.map.web.fit_bounds);
    }

    #[test]
    fn test_pixel_size_at_300_dpi() {
        assert_eq!(StaticMapOptions::default().pixel_size(), (1920, 1440));
    }
}
