// Spatial grid loading: the fixed reference layer every run attaches data to

use crate::error::PipelineError;
use geojson::{feature::Id, GeoJson, Geometry, JsonObject, JsonValue, Value};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

/// One cell of the reference grid.
#[derive(Debug, Clone)]
pub struct GridCell {
    pub id: String,
    pub geometry: Geometry,
    /// Attributes carried by the source feature.
    pub properties: JsonObject,
}

/// Ordered, immutable set of grid cells loaded once per run.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    cells: Vec<GridCell>,
    attribute_names: Vec<String>,
    epsg: Option<u16>,
}

/// Axis-aligned extent in the grid's coordinate space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    fn empty() -> Self {
        Bounds {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    fn extend(&mut self, pos: &[f64]) {
        if pos.len() < 2 {
            return;
        }
        self.min_x = self.min_x.min(pos[0]);
        self.max_x = self.max_x.max(pos[0]);
        self.min_y = self.min_y.min(pos[1]);
        self.max_y = self.max_y.max(pos[1]);
    }

    fn is_valid(&self) -> bool {
        self.min_x.is_finite() && self.max_x.is_finite() && self.min_y.is_finite() && self.max_y.is_finite()
    }
}

impl SpatialGrid {
    /// Build a grid from already-validated cells. Fails on an empty cell list
    /// or duplicate identifiers.
    pub fn from_cells(cells: Vec<GridCell>) -> Result<Self, String> {
        if cells.is_empty() {
            return Err("grid has zero features".to_string());
        }

        let mut seen = HashSet::new();
        let mut attribute_names: Vec<String> = Vec::new();
        for cell in &cells {
            if !seen.insert(cell.id.as_str()) {
                return Err(format!("duplicate cell identifier '{}'", cell.id));
            }
            for key in cell.properties.keys() {
                if !attribute_names.contains(key) {
                    attribute_names.push(key.clone());
                }
            }
        }

        Ok(SpatialGrid {
            cells,
            attribute_names,
            epsg: None,
        })
    }

    /// EPSG code of the coordinates, if the source declared one or a default
    /// was applied.
    pub fn epsg(&self) -> Option<u16> {
        self.epsg
    }

    pub fn with_epsg(mut self, code: u16) -> Self {
        self.epsg = Some(code);
        self
    }

    /// Apply `code` unless the grid already has a CRS.
    pub fn with_default_epsg(self, code: u16) -> Self {
        match self.epsg {
            Some(_) => self,
            None => self.with_epsg(code),
        }
    }

    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Attribute names across all cells, in first-seen order.
    pub fn attribute_names(&self) -> &[String] {
        &self.attribute_names
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute_names.iter().any(|a| a == name)
    }

    pub fn bounds(&self) -> Option<Bounds> {
        let mut bounds = Bounds::empty();
        for cell in &self.cells {
            for_each_position(&cell.geometry.value, &mut |pos| bounds.extend(pos));
        }
        bounds.is_valid().then_some(bounds)
    }
}

/// Load the reference grid from a GeoJSON file.
///
/// The cell identifier is the feature `id` when present, else the `id_field`
/// attribute, else the feature's position in the file.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn load_grid(path: &Path, id_field: &str) -> Result<SpatialGrid, PipelineError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| PipelineError::data_load(path, format!("reading file: {e}")))?;
    let geojson: GeoJson = text
        .parse()
        .map_err(|e| PipelineError::data_load(path, format!("parsing GeoJSON: {e}")))?;

    let (features, crs) = match geojson {
        GeoJson::FeatureCollection(fc) => {
            let crs = fc.foreign_members.as_ref().and_then(|m| m.get("crs")).cloned();
            (fc.features, crs)
        }
        GeoJson::Feature(f) => {
            let crs = f.foreign_members.as_ref().and_then(|m| m.get("crs")).cloned();
            (vec![f], crs)
        }
        GeoJson::Geometry(_) => {
            return Err(PipelineError::data_load(
                path,
                "expected a Feature or FeatureCollection, found a bare geometry",
            ))
        }
    };

    let mut cells = Vec::with_capacity(features.len());
    for (idx, feature) in features.into_iter().enumerate() {
        let properties = feature.properties.unwrap_or_default();
        let geometry = feature
            .geometry
            .ok_or_else(|| PipelineError::data_load(path, format!("feature {idx} has no geometry")))?;
        check_geometry(&geometry.value)
            .map_err(|reason| PipelineError::data_load(path, format!("feature {idx}: {reason}")))?;

        let id = match feature.id {
            Some(Id::String(s)) => s,
            Some(Id::Number(n)) => n.to_string(),
            None => match properties.get(id_field) {
                Some(JsonValue::String(s)) => s.clone(),
                Some(JsonValue::Number(n)) => n.to_string(),
                _ => idx.to_string(),
            },
        };

        cells.push(GridCell {
            id,
            geometry,
            properties,
        });
    }

    let mut grid = SpatialGrid::from_cells(cells).map_err(|reason| PipelineError::data_load(path, reason))?;
    if let Some(crs) = crs {
        let code = crs_epsg(&crs)
            .ok_or_else(|| PipelineError::data_load(path, format!("unrecognised crs member {crs}")))?;
        grid = grid.with_epsg(code);
    }
    debug!(attributes = grid.attribute_names().len(), epsg = ?grid.epsg(), "Grid attributes indexed");
    info!(cells = grid.len(), "Spatial grid loaded");
    Ok(grid)
}

/// EPSG code of a legacy GeoJSON `crs` member such as
/// `{"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::3067"}}`.
fn crs_epsg(crs: &JsonValue) -> Option<u16> {
    let name = crs.get("properties")?.get("name")?.as_str()?;
    if name.ends_with("CRS84") {
        return Some(4326);
    }
    name.rsplit(':').next()?.trim().parse().ok()
}

fn check_geometry(value: &Value) -> Result<(), String> {
    match value {
        Value::Point(pos) if pos.len() >= 2 => Ok(()),
        Value::Polygon(rings) if rings.first().map_or(false, |r| r.len() >= 3) => Ok(()),
        Value::MultiPolygon(polys)
            if !polys.is_empty() && polys.iter().all(|p| p.first().map_or(false, |r| r.len() >= 3)) =>
        {
            Ok(())
        }
        Value::Point(_) | Value::Polygon(_) | Value::MultiPolygon(_) => {
            Err("degenerate geometry".to_string())
        }
        other => Err(format!("unsupported geometry type {}", geometry_type(other))),
    }
}

pub(crate) fn geometry_type(value: &Value) -> &'static str {
    match value {
        Value::Point(_) => "Point",
        Value::MultiPoint(_) => "MultiPoint",
        Value::LineString(_) => "LineString",
        Value::MultiLineString(_) => "MultiLineString",
        Value::Polygon(_) => "Polygon",
        Value::MultiPolygon(_) => "MultiPolygon",
        Value::GeometryCollection(_) => "GeometryCollection",
    }
}

/// Visit every coordinate of a geometry.
pub(crate) fn for_each_position(value: &Value, f: &mut impl FnMut(&[f64])) {
    match value {
        Value::Point(pos) => f(pos.as_slice()),
        Value::MultiPoint(points) | Value::LineString(points) => {
            points.iter().for_each(|p| f(p.as_slice()))
        }
        Value::Polygon(rings) | Value::MultiLineString(rings) => {
            rings.iter().flatten().for_each(|p| f(p.as_slice()))
        }
        Value::MultiPolygon(polys) => polys.iter().flatten().flatten().for_each(|p| f(p.as_slice())),
        Value::GeometryCollection(geoms) => geoms.iter().for_each(|g| for_each_position(&g.value, f)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_geojson(text: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    fn square_feature(props: &str, x: f64) -> String {
        format!(
            r#"{{"type":"Feature","properties":{props},"geometry":{{"type":"Polygon","coordinates":[[[{x},0],[{x1},0],[{x1},1],[{x},1],[{x},0]]]}}}}"#,
            x1 = x + 1.0
        )
    }

    #[test]
    fn test_load_grid_uses_id_field() {
        let text = format!(
            r#"{{"type":"FeatureCollection","features":[{},{}]}}"#,
            square_feature(r#"{"YKR_ID": 5785640}"#, 0.0),
            square_feature(r#"{"YKR_ID": 5785641}"#, 1.0),
        );
        let file = write_geojson(&text);
        let grid = load_grid(file.path(), "YKR_ID").unwrap();
        assert_eq!(grid.len(), 2);
        assert_eq!(grid.cells()[0].id, "5785640");
        assert_eq!(grid.cells()[1].id, "5785641");
        assert!(grid.has_attribute("YKR_ID"));
    }

    #[test]
    fn test_load_grid_falls_back_to_position() {
        let text = format!(
            r#"{{"type":"FeatureCollection","features":[{},{}]}}"#,
            square_feature("{}", 0.0),
            square_feature("{}", 1.0),
        );
        let file = write_geojson(&text);
        let grid = load_grid(file.path(), "YKR_ID").unwrap();
        assert_eq!(grid.cells()[0].id, "0");
        assert_eq!(grid.cells()[1].id, "1");
    }

    #[test]
    fn test_load_grid_prefers_feature_id() {
        let text = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","id":"a","properties":{"YKR_ID":1},"geometry":{"type":"Point","coordinates":[1,2]}}
        ]}"#;
        let file = write_geojson(text);
        let grid = load_grid(file.path(), "YKR_ID").unwrap();
        assert_eq!(grid.cells()[0].id, "a");
    }

    #[test]
    fn test_load_grid_reads_crs_member() {
        let text = format!(
            r#"{{"type":"FeatureCollection","crs":{{"type":"name","properties":{{"name":"urn:ogc:def:crs:EPSG::3067"}}}},"features":[{}]}}"#,
            square_feature(r#"{"YKR_ID": 5785640}"#, 0.0),
        );
        let file = write_geojson(&text);
        let grid = load_grid(file.path(), "YKR_ID").unwrap();
        assert_eq!(grid.epsg(), Some(3067));
        assert_eq!(grid.with_default_epsg(4326).epsg(), Some(3067));
    }

    #[test]
    fn test_load_grid_without_crs() {
        let text = format!(
            r#"{{"type":"FeatureCollection","features":[{}]}}"#,
            square_feature("{}", 0.0),
        );
        let file = write_geojson(&text);
        let grid = load_grid(file.path(), "YKR_ID").unwrap();
        assert_eq!(grid.epsg(), None);
        assert_eq!(grid.with_default_epsg(3067).epsg(), Some(3067));
    }

    #[test]
    fn test_crs_epsg_names() {
        let named = |name: &str| serde_json::json!({"type": "name", "properties": {"name": name}});
        assert_eq!(crs_epsg(&named("EPSG:3067")), Some(3067));
        assert_eq!(crs_epsg(&named("urn:ogc:def:crs:EPSG::3067")), Some(3067));
        assert_eq!(crs_epsg(&named("urn:ogc:def:crs:OGC:1.3:CRS84")), Some(4326));
        assert_eq!(crs_epsg(&named("ETRS-TM35FIN")), None);
        assert_eq!(crs_epsg(&serde_json::json!({"type": "link"})), None);
    }

    #[test]
    fn test_attribute_names_keep_file_order() {
        let text = format!(
            r#"{{"type":"FeatureCollection","features":[{}]}}"#,
            square_feature(r#"{"YKR_ID": 1, "x": 2, "a": 3}"#, 0.0),
        );
        let file = write_geojson(&text);
        let grid = load_grid(file.path(), "YKR_ID").unwrap();
        assert_eq!(grid.attribute_names(), ["YKR_ID", "x", "a"]);
    }

    #[test]
    fn test_load_grid_missing_file() {
        let result = load_grid(Path::new("/definitely/not/here.geojson"), "YKR_ID");
        assert!(matches!(result, Err(PipelineError::DataLoad { .. })));
    }

    #[test]
    fn test_load_grid_zero_features() {
        let file = write_geojson(r#"{"type":"FeatureCollection","features":[]}"#);
        let err = load_grid(file.path(), "YKR_ID").unwrap_err();
        assert_eq!(err.kind(), "DataLoadError");
        assert!(err.to_string().contains("zero features"));
    }

    #[test]
    fn test_load_grid_malformed() {
        let file = write_geojson("not json at all");
        assert!(matches!(
            load_grid(file.path(), "YKR_ID"),
            Err(PipelineError::DataLoad { .. })
        ));
    }

    #[test]
    fn test_load_grid_duplicate_ids() {
        let text = format!(
            r#"{{"type":"FeatureCollection","features":[{},{}]}}"#,
            square_feature(r#"{"YKR_ID": 7}"#, 0.0),
            square_feature(r#"{"YKR_ID": 7}"#, 1.0),
        );
        let file = write_geojson(&text);
        let err = load_grid(file.path(), "YKR_ID").unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_load_grid_rejects_lines() {
        let text = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{},"geometry":{"type":"LineString","coordinates":[[0,0],[1,1]]}}
        ]}"#;
        let file = write_geojson(text);
        let err = load_grid(file.path(), "YKR_ID").unwrap_err();
        assert!(err.to_string().contains("unsupported geometry"));
    }

    #[test]
    fn test_bounds() {
        let text = format!(
            r#"{{"type":"FeatureCollection","features":[{},{}]}}"#,
            square_feature("{}", 0.0),
            square_feature("{}", 3.0),
        );
        let file = write_geojson(&text);
        let grid = load_grid(file.path(), "YKR_ID").unwrap();
        let b = grid.bounds().unwrap();
        assert_eq!((b.min_x, b.min_y, b.max_x, b.max_y), (0.0, 0.0, 4.0, 1.0));
    }
}
