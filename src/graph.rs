use crate::grid::Bounds;
use anyhow::{Context, Result};
use geojson::Value;
use plotters::prelude::*;
use std::ops::Range;

const METRES_PER_INCH: f64 = 0.0254;

/// Fill style for one map class
#[derive(Debug, Clone)]
pub struct ClassStyle {
    pub color: RGBColor,
    pub alpha: f64,
    pub label: String,
}

/// Canvas for a static choropleth map
pub struct MapCanvas {
    buffer: Vec<u8>,
    width: u32,
    height: u32,
    x_range: Range<f64>,
    y_range: Range<f64>,
    title: String,
    font_size: u32,
    dpi: u32,
}

impl MapCanvas {
    /// Create a new canvas covering `bounds`, padded to the canvas aspect ratio
    pub fn new(width: u32, height: u32, dpi: u32, title: &str, bounds: Bounds) -> Result<Self> {
        if width == 0 || height == 0 {
            anyhow::bail!("Cannot create a {}x{} canvas", width, height);
        }

        let (x_range, y_range) = equal_aspect_ranges(bounds, width as f64 / height as f64);
        let buffer = vec![0u8; (width as usize) * (height as usize) * 3];

        Ok(MapCanvas {
            buffer,
            width,
            height,
            x_range,
            y_range,
            title: title.to_string(),
            // 12pt at the target resolution
            font_size: (12 * dpi / 72).max(10),
            dpi,
        })
    }

    /// Draw every shape in its class colour. `shapes[i]` is coloured with
    /// `styles[classes[i]]`; shapes without a class are skipped.
    pub fn draw_choropleth(
        &mut self,
        shapes: &[&Value],
        classes: &[Option<usize>],
        styles: &[ClassStyle],
    ) -> Result<()> {
        if shapes.len() != classes.len() {
            anyhow::bail!(
                "Shapes and classes must have the same length (shapes: {}, classes: {})",
                shapes.len(),
                classes.len()
            );
        }

        let root = BitMapBackend::with_buffer(&mut self.buffer, (self.width, self.height))
            .into_drawing_area();
        root.fill(&WHITE).context("Failed to fill background")?;

        let label_size = (self.font_size * 2 / 3).max(8);
        let mut chart = ChartBuilder::on(&root)
            .margin(self.font_size / 2)
            .caption(&self.title, ("sans-serif", self.font_size as f64))
            .x_label_area_size(label_size * 3)
            .y_label_area_size(label_size * 5)
            .build_cartesian_2d(self.x_range.clone(), self.y_range.clone())
            .context("Failed to build chart")?;

        chart
            .configure_mesh()
            .disable_mesh()
            .label_style(("sans-serif", label_size as f64))
            .draw()
            .context("Failed to draw axes")?;

        let point_radius = (self.font_size / 6).max(2) as i32;

        for (class, style) in styles.iter().enumerate() {
            let fill = style.color.mix(style.alpha).filled();
            let members: Vec<&Value> = shapes
                .iter()
                .zip(classes)
                .filter(|(_, c)| **c == Some(class))
                .map(|(s, _)| *s)
                .collect();

            let mut polygons: Vec<Vec<(f64, f64)>> = Vec::new();
            let mut points: Vec<(f64, f64)> = Vec::new();
            for shape in members {
                collect_outlines(shape, &mut polygons, &mut points);
            }

            chart
                .draw_series(polygons.into_iter().map(|ring| Polygon::new(ring, fill)))
                .context("Failed to draw polygons")?;

            let color = style.color;
            chart
                .draw_series(points.into_iter().map(|p| Circle::new(p, point_radius, fill)))
                .context("Failed to draw points")?
                .label(style.label.clone())
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
        }

        if !styles.is_empty() {
            chart
                .configure_series_labels()
                .label_font(("sans-serif", label_size as f64))
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .position(SeriesLabelPosition::LowerRight)
                .draw()
                .context("Failed to draw legend")?;
        }

        root.present().context("Failed to present drawing")?;

        Ok(())
    }

    /// Finalize and encode the canvas as PNG, recording the resolution in a
    /// pHYs chunk
    pub fn render(self) -> Result<Vec<u8>> {
        let pixels_per_metre = (self.dpi as f64 / METRES_PER_INCH).round() as u32;

        let mut png_bytes = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut png_bytes, self.width, self.height);
            encoder.set_color(png::ColorType::Rgb);
            encoder.set_depth(png::BitDepth::Eight);
            encoder.set_pixel_dims(Some(png::PixelDimensions {
                xppu: pixels_per_metre,
                yppu: pixels_per_metre,
                unit: png::Unit::Meter,
            }));
            let mut writer = encoder.write_header().context("Failed to write PNG header")?;
            writer
                .write_image_data(&self.buffer)
                .context("Failed to encode PNG")?;
            writer.finish().context("Failed to finish PNG")?;
        }

        Ok(png_bytes)
    }
}

/// Exterior rings of polygons and positions of points, as plot coordinates
fn collect_outlines(value: &Value, polygons: &mut Vec<Vec<(f64, f64)>>, points: &mut Vec<(f64, f64)>) {
    let ring = |r: &Vec<Vec<f64>>| -> Vec<(f64, f64)> {
        r.iter().filter(|p| p.len() >= 2).map(|p| (p[0], p[1])).collect()
    };
    match value {
        Value::Point(p) if p.len() >= 2 => points.push((p[0], p[1])),
        Value::Polygon(rings) => polygons.extend(rings.first().map(ring)),
        Value::MultiPolygon(polys) => polygons.extend(polys.iter().filter_map(|p| p.first()).map(ring)),
        _ => {}
    }
}

/// Pad `bounds` so the ranges match the canvas aspect ratio
fn equal_aspect_ranges(bounds: Bounds, aspect: f64) -> (Range<f64>, Range<f64>) {
    let mut dx = bounds.max_x - bounds.min_x;
    let mut dy = bounds.max_y - bounds.min_y;
    if dx <= 0.0 && dy <= 0.0 {
        dx = 1.0;
        dy = 1.0;
    }

    // 5% margin around the data
    dx = dx.max(dy * aspect) * 1.05;
    dy = dy.max(dx / aspect);
    dx = dx.max(dy * aspect);

    let cx = (bounds.min_x + bounds.max_x) / 2.0;
    let cy = (bounds.min_y + bounds.max_y) / 2.0;
    ((cx - dx / 2.0)..(cx + dx / 2.0), (cy - dy / 2.0)..(cy + dy / 2.0))
}
