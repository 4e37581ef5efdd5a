use serde::{Deserialize, Serialize};

/// Linear RGBA color, every channel in `[0, 1]`.
///
/// Serialized as `[r, g, b, a]`.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct ColorRgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl ColorRgba {
    pub const WHITE: ColorRgba = ColorRgba::new(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: ColorRgba = ColorRgba::new(0.0, 0.0, 0.0, 1.0);
    pub const RED: ColorRgba = ColorRgba::new(1.0, 0.0, 0.0, 1.0);
    pub const GREEN: ColorRgba = ColorRgba::new(0.0, 1.0, 0.0, 1.0);
    pub const BLUE: ColorRgba = ColorRgba::new(0.0, 0.0, 1.0, 1.0);
    pub const TRANSPARENT: ColorRgba = ColorRgba::new(0.0, 0.0, 0.0, 0.0);

    #[inline]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Builds a color with every channel clamped into `[0, 1]`.
    ///
    /// NaN channels become 0.
    #[inline]
    pub fn clamped(r: f32, g: f32, b: f32, a: f32) -> Self {
        let c = |v: f32| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
        Self::new(c(r), c(g), c(b), c(a))
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.r.is_finite() && self.g.is_finite() && self.b.is_finite() && self.a.is_finite()
    }

    #[inline]
    pub fn rgb(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }

    #[inline]
    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Default for ColorRgba {
    fn default() -> Self {
        Self::WHITE
    }
}

impl From<[f32; 4]> for ColorRgba {
    #[inline]
    fn from(v: [f32; 4]) -> Self {
        ColorRgba::clamped(v[0], v[1], v[2], v[3])
    }
}

impl From<ColorRgba> for [f32; 4] {
    #[inline]
    fn from(c: ColorRgba) -> Self {
        c.to_array()
    }
}
