use kurbo::{Circle, Shape};

use crate::foundation::core::{BezPath, Point};

/// Smallest accepted brush diameter in canvas pixels.
pub const MIN_BRUSH_DIAMETER: f64 = 1.0;

pub const DEFAULT_BRUSH_DIAMETER: f64 = 30.0;

const STAMP_TOLERANCE: f64 = 0.1;

/// Additive accumulation of painted circle stamps.
///
/// Stamps are kept in canvas coordinates. Painting only ever adds coverage; the accumulator is
/// emptied by [`BrushAccumulator::clear`] alone.
#[derive(Clone, Debug)]
pub struct BrushAccumulator {
    diameter: f64,
    stamps: Vec<Circle>,
    last: Option<Point>,
    snapshot: Option<BezPath>,
}

impl Default for BrushAccumulator {
    fn default() -> Self {
        Self {
            diameter: DEFAULT_BRUSH_DIAMETER,
            stamps: Vec::new(),
            last: None,
            snapshot: None,
        }
    }
}

impl BrushAccumulator {
    pub fn diameter(&self) -> f64 {
        self.diameter
    }

    /// Non-finite values are ignored; small values are raised to [`MIN_BRUSH_DIAMETER`].
    pub fn set_diameter(&mut self, diameter: f64) {
        if diameter.is_finite() {
            self.diameter = diameter.max(MIN_BRUSH_DIAMETER);
        }
    }

    pub fn is_stroking(&self) -> bool {
        self.last.is_some()
    }

    pub fn stamps(&self) -> &[Circle] {
        &self.stamps
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    pub fn begin(&mut self, p: Point) {
        self.last = Some(p);
        self.stamp(p);
    }

    /// Stamp along the segment from the previous pointer position so fast moves leave no gaps.
    pub fn extend(&mut self, p: Point) {
        let Some(prev) = self.last else {
            return;
        };
        let radius = self.diameter / 2.0;
        let spacing = (radius / 2.0).max(0.5);
        let dist = prev.distance(p);
        let steps = (dist / spacing).ceil().max(1.0) as usize;
        for i in 1..=steps {
            let t = i as f64 / steps as f64;
            self.stamp(prev.lerp(p, t));
        }
        self.last = Some(p);
    }

    /// Ends the active stroke and refreshes the cached coverage path.
    pub fn end(&mut self) {
        if self.last.take().is_some() {
            self.snapshot = Some(self.build_path());
            tracing::debug!(stamps = self.stamps.len(), "brush snapshot rebuilt");
        }
    }

    pub fn clear(&mut self) {
        self.stamps.clear();
        self.last = None;
        self.snapshot = None;
    }

    /// Union of all stamps as one nonzero-filled path.
    pub fn coverage(&self) -> BezPath {
        match (&self.snapshot, self.is_stroking()) {
            (Some(path), false) => path.clone(),
            _ => self.build_path(),
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        self.stamps
            .iter()
            .any(|c| c.center.distance_squared(p) <= c.radius * c.radius)
    }

    fn stamp(&mut self, p: Point) {
        if !(p.x.is_finite() && p.y.is_finite()) {
            return;
        }
        self.stamps.push(Circle::new(p, self.diameter / 2.0));
        self.snapshot = None;
    }

    fn build_path(&self) -> BezPath {
        let mut path = BezPath::new();
        for c in &self.stamps {
            path.extend(c.path_elements(STAMP_TOLERANCE));
        }
        path
    }
}
