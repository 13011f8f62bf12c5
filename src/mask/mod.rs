//! Mask engine: freehand brush and polygon lasso restricting which composite pixels are visible.
//!
//! Mask state belongs to the editing session and is never serialized with the scene.

pub(crate) mod brush;
pub(crate) mod polygon;

pub use brush::{BrushAccumulator, DEFAULT_BRUSH_DIAMETER, MIN_BRUSH_DIAMETER};
pub use polygon::{MIN_POLYGON_POINTS, PolygonPath};

use std::sync::atomic::{AtomicU64, Ordering};

use crate::foundation::core::{BezPath, Point};

static NEXT_ENGINE_ID: AtomicU64 = AtomicU64::new(1);

fn next_engine_id() -> u64 {
    NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaskMode {
    #[default]
    None,
    Brush,
    Polygon,
}

/// Active masking technique plus its authored data.
///
/// Renderers cache rasterized masks keyed on `(id, revision)`. `revision` changes whenever the
/// effective coverage may have changed; `id` is unique per engine and is not shared by clones.
#[derive(Debug)]
pub struct MaskEngine {
    id: u64,
    mode: MaskMode,
    brush: BrushAccumulator,
    polygon: PolygonPath,
    revision: u64,
}

impl Default for MaskEngine {
    fn default() -> Self {
        Self {
            id: next_engine_id(),
            mode: MaskMode::None,
            brush: BrushAccumulator::default(),
            polygon: PolygonPath::default(),
            revision: 0,
        }
    }
}

impl Clone for MaskEngine {
    fn clone(&self) -> Self {
        Self {
            id: next_engine_id(),
            mode: self.mode,
            brush: self.brush.clone(),
            polygon: self.polygon.clone(),
            revision: self.revision,
        }
    }
}

impl MaskEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity of this engine instance.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn mode(&self) -> MaskMode {
        self.mode
    }

    /// Switch modes. Leaving a mode discards what was authored in it.
    pub fn set_mode(&mut self, mode: MaskMode) {
        if mode == self.mode {
            return;
        }
        tracing::debug!(from = ?self.mode, to = ?mode, "mask mode changed");
        self.mode = mode;
        self.brush.clear();
        self.polygon.clear();
        self.bump();
    }

    pub fn brush_size(&self) -> f64 {
        self.brush.diameter()
    }

    /// Applies to stamps painted from now on.
    pub fn set_brush_size(&mut self, diameter: f64) {
        self.brush.set_diameter(diameter);
    }

    pub fn brush(&self) -> &BrushAccumulator {
        &self.brush
    }

    pub fn polygon(&self) -> &PolygonPath {
        &self.polygon
    }

    pub fn polygon_points(&self) -> &[Point] {
        self.polygon.points()
    }

    pub fn is_painting(&self) -> bool {
        self.brush.is_stroking()
    }

    /// Start a brush stroke. Returns `false` outside brush mode.
    pub fn begin_stroke(&mut self, p: Point) -> bool {
        if self.mode != MaskMode::Brush {
            return false;
        }
        self.brush.begin(p);
        self.bump();
        true
    }

    pub fn extend_stroke(&mut self, p: Point) -> bool {
        if self.mode != MaskMode::Brush || !self.brush.is_stroking() {
            return false;
        }
        self.brush.extend(p);
        self.bump();
        true
    }

    pub fn end_stroke(&mut self) {
        self.brush.end();
    }

    /// Append a lasso point. Returns `false` outside polygon mode.
    pub fn push_polygon_point(&mut self, p: Point) -> bool {
        if self.mode != MaskMode::Polygon {
            return false;
        }
        self.polygon.push(p);
        self.bump();
        true
    }

    /// Replace the lasso points, as supplied by the host.
    pub fn set_polygon_points(&mut self, points: impl IntoIterator<Item = Point>) {
        self.polygon.set(points);
        self.bump();
    }

    /// Forget all authored coverage but keep the mode.
    pub fn clear(&mut self) {
        self.brush.clear();
        self.polygon.clear();
        self.bump();
    }

    /// Whether the active mode currently restricts rendering.
    pub fn is_active(&self) -> bool {
        match self.mode {
            MaskMode::None => false,
            MaskMode::Brush => !self.brush.is_empty(),
            MaskMode::Polygon => self.polygon.is_usable(),
        }
    }

    /// Visible region in canvas coordinates, filled with the nonzero rule.
    pub fn coverage(&self) -> Option<BezPath> {
        if !self.is_active() {
            return None;
        }
        match self.mode {
            MaskMode::None => None,
            MaskMode::Brush => Some(self.brush.coverage()),
            MaskMode::Polygon => self.polygon.clip_path(),
        }
    }

    /// Whether a canvas point stays visible. Everything is visible without an active mask.
    pub fn contains(&self, p: Point) -> bool {
        match self.mode {
            _ if !self.is_active() => true,
            MaskMode::None => true,
            MaskMode::Brush => self.brush.contains(p),
            MaskMode::Polygon => self.polygon.contains(p),
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn bump(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}
