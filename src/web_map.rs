// Leaflet choropleth page for the interactive map mode

use crate::classify::Classification;
use crate::config::WebMapOptions;
use crate::join::JoinedLayer;
use crate::palette::Ramp;
use crate::reproject::{Reprojector, WGS84_EPSG};
use anyhow::{Context, Result};
use geojson::{feature::Id, Feature, FeatureCollection, JsonObject, JsonValue};
use serde::Serialize;
use std::collections::BTreeMap;

const PAGE_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>__TITLE__</title>
  <link rel="stylesheet" href="https://cdnjs.cloudflare.com/ajax/libs/leaflet/1.9.4/leaflet.css" crossorigin="anonymous"
    referrerpolicy="no-referrer" />
  <script src="https://cdnjs.cloudflare.com/ajax/libs/leaflet/1.9.4/leaflet.js" crossorigin="anonymous"
    referrerpolicy="no-referrer"></script>
  <style>
    html, body, #map { height: 100%; margin: 0; }
    .legend { background: rgba(255, 255, 255, 0.9); padding: 6px 10px; font: 12px sans-serif; border-radius: 4px; }
    .legend h4 { margin: 0 0 4px; font-size: 13px; }
    .legend i { display: inline-block; width: 14px; height: 14px; margin-right: 6px; vertical-align: middle; }
  </style>
</head>
<body>
  <div id="map"></div>
"#;

const PAGE_SCRIPT: &str = r#"  <script>
    const read = (id) => JSON.parse(document.getElementById(id).textContent);
    const layerData = read('layer-data');
    const classes = read('class-data');
    const legend = read('legend-data');

    const map = L.map('map').setView([__LAT__, __LON__], __ZOOM__);
    L.tileLayer('https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png', {
      maxZoom: 19,
      attribution: '&copy; OpenStreetMap contributors'
    }).addTo(map);

    const overlay = L.geoJSON(layerData, {
      style: (feature) => {
        const cls = classes[feature.id];
        const missing = cls === null || cls === undefined;
        return {
          fillColor: missing ? '#000000' : legend.colors[cls],
          fillOpacity: missing ? 0 : __FILL_OPACITY__,
          color: '#000000',
          weight: 1,
          opacity: __LINE_OPACITY__
        };
      },
      pointToLayer: (feature, latlng) => L.circleMarker(latlng, { radius: 5 }),
      onEachFeature: (feature, layer) => {
        const value = feature.properties[legend.column];
        layer.bindTooltip(`${feature.id}: ${value === null ? 'n/a' : value}`);
      }
    }).addTo(map);

    if (__FIT_BOUNDS__ && overlay.getLayers().length > 0) {
      map.fitBounds(overlay.getBounds());
    }

    const control = L.control({ position: 'bottomright' });
    control.onAdd = () => {
      const div = L.DomUtil.create('div', 'legend');
      const title = document.createElement('h4');
      title.textContent = legend.title;
      div.appendChild(title);
      legend.labels.forEach((label, i) => {
        const row = document.createElement('div');
        const swatch = document.createElement('i');
        swatch.style.background = legend.colors[i];
        row.appendChild(swatch);
        row.appendChild(document.createTextNode(label));
        div.appendChild(row);
      });
      return div;
    };
    control.addTo(map);
  </script>
</body>
</html>
"#;

#[derive(Serialize)]
struct Legend<'a> {
    title: &'a str,
    column: &'a str,
    colors: Vec<String>,
    labels: Vec<String>,
}

/// Build a standalone HTML page showing `layer` coloured by `classification`.
///
/// Features are keyed by cell id; the class of each id is embedded as the
/// `class-data` JSON block and looked up by the page's style function.
pub fn render_html(
    layer: &JoinedLayer<'_>,
    column: &str,
    values: &[Option<f64>],
    classification: &Classification,
    options: &WebMapOptions,
) -> Result<String> {
    if values.len() != layer.len() || classification.classes.len() != layer.len() {
        anyhow::bail!(
            "Layer, values and classes must have the same length (layer: {}, values: {}, classes: {})",
            layer.len(),
            values.len(),
            classification.classes.len()
        );
    }

    let cells = layer.grid().cells();

    // Leaflet reads GeoJSON as lon/lat; a grid without a CRS is taken as such
    let reprojector = Reprojector::to_wgs84(layer.grid().epsg().unwrap_or(WGS84_EPSG))?;

    let features = cells
        .iter()
        .zip(values)
        .map(|(cell, value)| -> Result<Feature> {
            let mut properties = JsonObject::new();
            let value = value
                .and_then(serde_json::Number::from_f64)
                .map_or(JsonValue::Null, JsonValue::Number);
            properties.insert(column.to_string(), value);
            let geometry = match &reprojector {
                Some(r) => r
                    .geometry(&cell.geometry)
                    .with_context(|| format!("Cell {}", cell.id))?,
                None => cell.geometry.clone(),
            };
            Ok(Feature {
                bbox: None,
                geometry: Some(geometry),
                id: Some(Id::String(cell.id.clone())),
                properties: Some(properties),
                foreign_members: None,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let overlay = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };

    let classes: BTreeMap<&str, Option<usize>> = cells
        .iter()
        .map(|c| c.id.as_str())
        .zip(classification.classes.iter().copied())
        .collect();

    let legend = Legend {
        title: &options.legend_name,
        column,
        colors: Ramp::YlOrRd
            .colors(classification.k())
            .into_iter()
            .map(|c| c.to_hex())
            .collect(),
        labels: classification.legend_labels(),
    };

    let mut html = PAGE_HEAD.replace("__TITLE__", &escape_html(&options.legend_name));
    push_json_block(&mut html, "layer-data", &overlay).context("Failed to serialize overlay")?;
    push_json_block(&mut html, "class-data", &classes).context("Failed to serialize classes")?;
    push_json_block(&mut html, "legend-data", &legend).context("Failed to serialize legend")?;

    let [lat, lon] = options.center;
    html.push_str(
        &PAGE_SCRIPT
            .replace("__LAT__", &lat.to_string())
            .replace("__LON__", &lon.to_string())
            .replace("__ZOOM__", &options.zoom.to_string())
            .replace("__FILL_OPACITY__", &options.fill_opacity.to_string())
            .replace("__LINE_OPACITY__", &options.line_opacity.to_string())
            .replace("__FIT_BOUNDS__", if options.fit_bounds { "true" } else { "false" }),
    );

    Ok(html)
}

/// Append `<script type="application/json" id=..>` holding `value`
fn push_json_block<T: Serialize>(html: &mut String, id: &str, value: &T) -> Result<()> {
    let json = serde_json::to_string(value)?;
    html.push_str(&format!(r#"  <script type="application/json" id="{id}">"#));
    // "</" would close the script element early
    html.push_str(&json.replace("</", "<\\/"));
    html.push_str("</script>\n");
    Ok(())
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
