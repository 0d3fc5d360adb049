// Row-ordinal join of the merged table onto the spatial grid

use crate::error::PipelineError;
use crate::grid::{GridCell, SpatialGrid};
use crate::merge::MergedTable;
use geojson::{feature::Id, Feature, FeatureCollection, JsonObject, JsonValue};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::info;

pub const LAYER_EXTENSION: &str = "geojson";

/// The grid with the merged table's columns attached.
///
/// Row `i` of the table belongs to cell `i` of the grid; there is no key.
/// Reordering either side before the join silently corrupts the pairing.
/// The grid is borrowed read-only, so nothing derived later (such as map
/// classes) can end up in it.
#[derive(Debug, Clone)]
pub struct JoinedLayer<'g> {
    grid: &'g SpatialGrid,
    table: MergedTable,
}

impl<'g> JoinedLayer<'g> {
    pub fn grid(&self) -> &'g SpatialGrid {
        self.grid
    }

    pub fn table(&self) -> &MergedTable {
        &self.table
    }

    pub fn len(&self) -> usize {
        self.grid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grid.is_empty()
    }

    /// Cells paired with their table row.
    pub fn rows(&self) -> impl Iterator<Item = (&GridCell, &[String])> + '_ {
        self.grid
            .cells()
            .iter()
            .zip(self.table.rows.iter().map(Vec::as_slice))
    }

    /// Numeric values of `column`, looked up in the table first and then in
    /// the grid attributes. Empty cells and non-finite numbers are missing.
    pub fn numeric_column(&self, column: &str) -> Result<Vec<Option<f64>>, PipelineError> {
        if let Some(idx) = self.table.column_index(column) {
            return self
                .table
                .rows
                .iter()
                .enumerate()
                .map(|(row_no, row)| parse_number(&row[idx]).map_err(|v| not_numeric(column, row_no, &v)))
                .collect();
        }

        if self.grid.has_attribute(column) {
            return self
                .grid
                .cells()
                .iter()
                .enumerate()
                .map(|(row_no, cell)| match cell.properties.get(column) {
                    None | Some(JsonValue::Null) => Ok(None),
                    Some(JsonValue::Number(n)) => Ok(n.as_f64().filter(|v| v.is_finite())),
                    Some(JsonValue::String(s)) => {
                        parse_number(s).map_err(|v| not_numeric(column, row_no, &v))
                    }
                    Some(other) => Err(not_numeric(column, row_no, &other.to_string())),
                })
                .collect();
        }

        Err(PipelineError::column(column, "was not found in the joined layer"))
    }

    /// The layer as GeoJSON: feature ids are cell ids, properties are the
    /// grid attributes followed by the table columns.
    pub fn to_feature_collection(&self) -> FeatureCollection {
        let features = self
            .rows()
            .map(|(cell, row)| {
                let mut properties: JsonObject = cell.properties.clone();
                for (name, value) in self.table.headers.iter().zip(row) {
                    properties.insert(name.clone(), infer_json_value(value));
                }
                Feature {
                    bbox: None,
                    geometry: Some(cell.geometry.clone()),
                    id: Some(Id::String(cell.id.clone())),
                    properties: Some(properties),
                    foreign_members: None,
                }
            })
            .collect();

        FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }
}

fn parse_number(raw: &str) -> Result<Option<f64>, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(|v| v.is_finite().then_some(v))
        .map_err(|_| raw.to_string())
}

fn not_numeric(column: &str, row_no: usize, value: &str) -> PipelineError {
    PipelineError::column(column, format!("is not numeric: '{value}' at row {row_no}"))
}

/// Type a raw table cell for output: integer, float, null when empty, else text.
fn infer_json_value(raw: &str) -> JsonValue {
    if raw.is_empty() {
        return JsonValue::Null;
    }
    if let Ok(i) = raw.parse::<i64>() {
        return JsonValue::from(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return JsonValue::Number(n);
        }
    }
    JsonValue::String(raw.to_string())
}

/// Pair grid cell `i` with table row `i`. Row counts must match exactly, and
/// table columns may not shadow grid attributes.
#[tracing::instrument(skip_all, fields(cells = grid.len(), rows = table.len()))]
pub fn join(grid: &SpatialGrid, table: MergedTable) -> Result<JoinedLayer<'_>, PipelineError> {
    if grid.len() != table.len() {
        return Err(PipelineError::Alignment {
            grid_rows: grid.len(),
            table_rows: table.len(),
        });
    }

    if let Some(column) = table.headers.iter().find(|h| grid.has_attribute(h)) {
        return Err(PipelineError::ColumnConflict {
            column: column.clone(),
        });
    }

    info!(rows = table.len(), columns = table.headers.len(), "Travel times joined to grid");
    Ok(JoinedLayer { grid, table })
}

/// `<name>.geojson`, unless `name` already carries that extension.
pub fn layer_path(output_layer_name: &str) -> PathBuf {
    let path = Path::new(output_layer_name);
    if path.extension().map_or(false, |e| e.eq_ignore_ascii_case(LAYER_EXTENSION)) {
        return path.to_path_buf();
    }
    let mut name = OsString::from(output_layer_name);
    name.push(".");
    name.push(LAYER_EXTENSION);
    PathBuf::from(name)
}

/// Write the joined layer as a GeoJSON FeatureCollection and return its path.
#[tracing::instrument(skip(layer))]
pub fn persist(layer: &JoinedLayer<'_>, output_layer_name: &str) -> Result<PathBuf, PipelineError> {
    let path = layer_path(output_layer_name);
    let json = serde_json::to_string(&layer.to_feature_collection())
        .map_err(|e| PipelineError::persistence(&path, e))?;
    std::fs::write(&path, json).map_err(|e| PipelineError::persistence(&path, e))?;

    info!(path = %path.display(), features = layer.len(), "Joined layer written");
    Ok(path)
}
