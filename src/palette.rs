// Sequential and diverging colour ramps for map classes

use plotters::style::RGBColor;

/// An sRGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }

    fn lerp(self, other: Rgb, t: f64) -> Rgb {
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Rgb(mix(self.0, other.0), mix(self.1, other.1), mix(self.2, other.2))
    }
}

impl From<Rgb> for RGBColor {
    fn from(c: Rgb) -> Self {
        RGBColor(c.0, c.1, c.2)
    }
}

// ColorBrewer YlOrRd, 9 classes
const YL_OR_RD: [Rgb; 9] = [
    Rgb(0xff, 0xff, 0xcc),
    Rgb(0xff, 0xed, 0xa0),
    Rgb(0xfe, 0xd9, 0x76),
    Rgb(0xfe, 0xb2, 0x4c),
    Rgb(0xfd, 0x8d, 0x3c),
    Rgb(0xfc, 0x4e, 0x2a),
    Rgb(0xe3, 0x1a, 0x1c),
    Rgb(0xbd, 0x00, 0x26),
    Rgb(0x80, 0x00, 0x26),
];

// ColorBrewer Spectral, 11 classes
const SPECTRAL: [Rgb; 11] = [
    Rgb(0x9e, 0x01, 0x42),
    Rgb(0xd5, 0x3e, 0x4f),
    Rgb(0xf4, 0x6d, 0x43),
    Rgb(0xfd, 0xae, 0x61),
    Rgb(0xfe, 0xe0, 0x8b),
    Rgb(0xff, 0xff, 0xbf),
    Rgb(0xe6, 0xf5, 0x98),
    Rgb(0xab, 0xdd, 0xa4),
    Rgb(0x66, 0xc2, 0xa5),
    Rgb(0x32, 0x88, 0xbd),
    Rgb(0x5e, 0x4f, 0xa2),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ramp {
    YlOrRd,
    Spectral,
}

impl Ramp {
    fn stops(self) -> &'static [Rgb] {
        match self {
            Ramp::YlOrRd => &YL_OR_RD,
            Ramp::Spectral => &SPECTRAL,
        }
    }

    /// Colour at position `t` in `[0, 1]`, interpolated between stops.
    pub fn at(self, t: f64) -> Rgb {
        let stops = self.stops();
        let t = t.clamp(0.0, 1.0) * (stops.len() - 1) as f64;
        let lower = t.floor() as usize;
        let upper = (lower + 1).min(stops.len() - 1);
        stops[lower].lerp(stops[upper], t - lower as f64)
    }

    /// `n` colours evenly spaced along the ramp, first and last stop included.
    pub fn colors(self, n: usize) -> Vec<Rgb> {
        match n {
            0 => Vec::new(),
            1 => vec![self.at(0.5)],
            _ => (0..n).map(|i| self.at(i as f64 / (n - 1) as f64)).collect(),
        }
    }
}
