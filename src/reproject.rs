// Reprojection of grid geometry to WGS84 longitude/latitude for web maps

use crate::grid::geometry_type;
use anyhow::{anyhow, Context, Result};
use geojson::{Geometry, Value};
use proj4rs::proj::Proj;
use proj4rs::transform::transform;

pub const WGS84_EPSG: u16 = 4326;

const WGS84: &str = "+proj=longlat +datum=WGS84 +no_defs";

/// Converts positions from a projected CRS to WGS84 degrees.
pub struct Reprojector {
    from: Proj,
    to: Proj,
    epsg: u16,
}

impl Reprojector {
    /// `None` when `epsg` already is WGS84.
    pub fn to_wgs84(epsg: u16) -> Result<Option<Self>> {
        if epsg == WGS84_EPSG {
            return Ok(None);
        }
        let from = Proj::from_epsg_code(epsg).map_err(|e| anyhow!("Unknown EPSG code {epsg}: {e:?}"))?;
        let to = Proj::from_proj_string(WGS84).map_err(|e| anyhow!("Invalid WGS84 definition: {e:?}"))?;
        Ok(Some(Reprojector { from, to, epsg }))
    }

    /// `[lon, lat]` in degrees.
    pub fn position(&self, pos: &[f64]) -> Result<Vec<f64>> {
        if pos.len() < 2 {
            anyhow::bail!("Position has {} coordinates, expected at least 2", pos.len());
        }
        let mut point = (pos[0], pos[1], 0.0);
        transform(&self.from, &self.to, &mut point)
            .map_err(|e| anyhow!("Cannot reproject ({}, {}) from EPSG:{}: {e:?}", pos[0], pos[1], self.epsg))?;
        Ok(vec![point.0.to_degrees(), point.1.to_degrees()])
    }

    pub fn geometry(&self, geometry: &Geometry) -> Result<Geometry> {
        let value = self
            .value(&geometry.value)
            .with_context(|| format!("Failed to reproject {} geometry", geometry_type(&geometry.value)))?;
        Ok(Geometry::new(value))
    }

    fn value(&self, value: &Value) -> Result<Value> {
        let line = |points: &Vec<Vec<f64>>| -> Result<Vec<Vec<f64>>> {
            points.iter().map(|p| self.position(p)).collect()
        };
        let polygon = |rings: &Vec<Vec<Vec<f64>>>| -> Result<Vec<Vec<Vec<f64>>>> {
            rings.iter().map(line).collect()
        };

        Ok(match value {
            Value::Point(p) => Value::Point(self.position(p)?),
            Value::MultiPoint(points) => Value::MultiPoint(line(points)?),
            Value::LineString(points) => Value::LineString(line(points)?),
            Value::MultiLineString(lines) => Value::MultiLineString(polygon(lines)?),
            Value::Polygon(rings) => Value::Polygon(polygon(rings)?),
            Value::MultiPolygon(polys) => {
                Value::MultiPolygon(polys.iter().map(polygon).collect::<Result<_>>()?)
            }
            Value::GeometryCollection(geoms) => Value::GeometryCollection(
                geoms.iter().map(|g| self.geometry(g)).collect::<Result<_>>()?,
            ),
        })
    }
}
