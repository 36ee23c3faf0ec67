//! Linear color scales, interpolated per channel between evenly spaced stops.

/// ColorBrewer OrRd, 7 classes.
pub const ORRD_07: [&str; 7] = ["#fef0d9", "#fdd49e", "#fdbb84", "#fc8d59", "#ef6548", "#d7301f", "#990000"];

/// RGBA color with channels in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Rgba {
    /// Parse `#rrggbb` or `#rrggbbaa`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#')?;
        if !matches!(digits.len(), 6 | 8) || !digits.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok().map(|c| c as f64 / 255.0);
        let a = if digits.len() == 8 { channel(6)? } else { 1.0 };
        Some(Self { r: channel(0)?, g: channel(2)?, b: channel(4)?, a })
    }

    pub fn to_hex(&self) -> String {
        let c = |x: f64| (x.clamp(0.0, 1.0) * 255.9999) as u8;
        format!("#{:02x}{:02x}{:02x}{:02x}", c(self.r), c(self.g), c(self.b), c(self.a))
    }

    fn lerp(self, other: Rgba, p: f64) -> Rgba {
        let mix = |a: f64, b: f64| (1.0 - p) * a + p * b;
        Rgba {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
            a: mix(self.a, other.a),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinearColormap {
    colors: Vec<Rgba>,
    index: Vec<f64>,
}

impl LinearColormap {
    /// Spread `colors` evenly over `[vmin, vmax]`. Needs at least one color.
    pub fn new(colors: Vec<Rgba>, vmin: f64, vmax: f64) -> Self {
        assert!(!colors.is_empty(), "a colormap needs at least one color");
        let vmax = vmax.max(vmin);
        let span = vmax - vmin;
        let last = (colors.len() - 1).max(1) as f64;
        let index = (0..colors.len()).map(|i| vmin + span * i as f64 / last).collect();
        Self { colors, index }
    }

    pub fn orrd_07() -> Self {
        let colors = ORRD_07.iter().filter_map(|hex| Rgba::from_hex(hex)).collect();
        Self::new(colors, 0.0, 1.0)
    }

    /// Same colors, stretched over a new domain.
    pub fn scale(&self, vmin: f64, vmax: f64) -> Self {
        Self::new(self.colors.clone(), vmin, vmax)
    }

    pub fn vmin(&self) -> f64 {
        self.index[0]
    }

    pub fn vmax(&self) -> f64 {
        self.index[self.index.len() - 1]
    }

    pub fn rgba(&self, x: f64) -> Rgba {
        let last = self.index.len() - 1;
        if x.is_nan() || x <= self.index[0] {
            return self.colors[0];
        }
        if x >= self.index[last] {
            return self.colors[last];
        }
        // 0 < i <= last
        let i = self.index.iter().filter(|&&u| u < x).count();
        let (lo, hi) = (self.index[i - 1], self.index[i]);
        let p = if lo < hi { (x - lo) / (hi - lo) } else { 1.0 };
        self.colors[i - 1].lerp(self.colors[i], p)
    }

    pub fn color(&self, x: f64) -> String {
        self.rgba(x).to_hex()
    }

    /// `(value, color)` at every stop, lowest first.
    pub fn stops(&self) -> Vec<(f64, String)> {
        self.index.iter().zip(&self.colors).map(|(v, c)| (*v, c.to_hex())).collect()
    }
}
