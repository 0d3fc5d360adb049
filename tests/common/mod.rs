#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

pub const FIRST_YKR_ID: u64 = 5_785_640;
pub const HEADER: &str = "from_id;to_id;walk_t;walk_d;car_r_t;car_r_d;car_m_t;car_m_d";

/// Write a grid of `n` 250 m squares, four per row, carrying a YKR_ID
/// attribute but no feature id.
pub fn write_grid(dir: &Path, n: usize) -> PathBuf {
    let features: Vec<serde_json::Value> = (0..n)
        .map(|i| {
            let x = 381_875.0 + (i % 4) as f64 * 250.0;
            let y = 6_697_880.0 - (i / 4) as f64 * 250.0;
            serde_json::json!({
                "type": "Feature",
                "properties": { "YKR_ID": FIRST_YKR_ID + i as u64, "x": x, "y": y },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[
                        [x, y], [x + 250.0, y], [x + 250.0, y - 250.0], [x, y - 250.0], [x, y]
                    ]]
                }
            })
        })
        .collect();
    let collection = serde_json::json!({ "type": "FeatureCollection", "features": features });

    let path = dir.join("grid.geojson");
    fs::write(&path, collection.to_string()).unwrap();
    path
}

/// Write a semicolon-delimited travel time file at `root/rel` whose
/// `car_r_t` column holds `car_times`.
pub fn write_times(root: &Path, rel: &str, car_times: &[u32]) -> PathBuf {
    let mut text = format!("{HEADER}\n");
    for (i, t) in car_times.iter().enumerate() {
        let from_id = FIRST_YKR_ID + i as u64;
        text.push_str(&format!("{from_id};5785640;{};{};{t};{};{};{}\n", t * 3, t * 250, t * 900, t + 2, t * 900));
    }

    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, text).unwrap();
    path
}

/// Check if bytes are a valid PNG
pub fn is_valid_png(bytes: &[u8]) -> bool {
    bytes.len() > 8 && bytes[0..8] == [137, 80, 78, 71, 13, 10, 26, 10]
}

/// Width and height from the PNG IHDR chunk
pub fn png_size(bytes: &[u8]) -> (u32, u32) {
    let be = |b: &[u8]| u32::from_be_bytes([b[0], b[1], b[2], b[3]]);
    (be(&bytes[16..20]), be(&bytes[20..24]))
}

/// JSON content of `<script type="application/json" id="{id}">` in a page
pub fn json_block(html: &str, id: &str) -> serde_json::Value {
    let start_tag = format!(r#"id="{id}">"#);
    let start = html.find(&start_tag).unwrap() + start_tag.len();
    let end = start + html[start..].find("</script>").unwrap();
    serde_json::from_str(&html[start..end]).unwrap()
}
