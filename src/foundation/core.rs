use crate::foundation::error::{MoodboardError, MoodboardResult};

pub use kurbo::{Affine, BezPath, Point, Rect, Size, Vec2};

/// Fixed-aspect canvas in logical pixels. Origin is top-left, x right, y down.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            width: 960,
            height: 540,
        }
    }
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> MoodboardResult<Self> {
        if width == 0 || height == 0 {
            return Err(MoodboardError::validation("canvas width/height must be > 0"));
        }
        Ok(Self { width, height })
    }

    pub fn width_f64(self) -> f64 {
        f64::from(self.width)
    }

    pub fn height_f64(self) -> f64 {
        f64::from(self.height)
    }

    pub fn rect(self) -> Rect {
        Rect::new(0.0, 0.0, self.width_f64(), self.height_f64())
    }

    /// Half-open containment: the right and bottom edges are outside.
    pub fn contains(self, p: Point) -> bool {
        p.x >= 0.0 && p.y >= 0.0 && p.x < self.width_f64() && p.y < self.height_f64()
    }
}
