use serde::Serialize;

/// Normalized device coordinates: both axes span `-1..=1`, y points up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Ndc {
    pub x: f64,
    pub y: f64,
}

/// Pixel size of the drawing area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    width: u32,
    height: u32,
}

impl Viewport {
    /// Zero dimensions are bumped to 1 so the conversions stay finite.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn aspect(&self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }

    pub fn to_ndc(&self, px: f64, py: f64) -> Ndc {
        Ndc {
            x: px / f64::from(self.width) * 2.0 - 1.0,
            y: -(py / f64::from(self.height) * 2.0 - 1.0),
        }
    }

    pub fn to_pixels(&self, ndc: Ndc) -> (f64, f64) {
        (
            (ndc.x + 1.0) / 2.0 * f64::from(self.width),
            (1.0 - ndc.y) / 2.0 * f64::from(self.height),
        )
    }
}
