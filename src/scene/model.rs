use std::collections::BTreeSet;

use crate::foundation::core::{Canvas, Point, Size};
use crate::foundation::math::PlacementRng;
use crate::geometry::{self, LayerFrame};

/// Initial size of a freshly added layer.
pub const NEW_LAYER_SIZE: Size = Size::new(120.0, 120.0);

/// Horizontal range for the initial top-left of a freshly added layer.
pub const NEW_LAYER_X_RANGE: (f64, f64) = (50.0, 350.0);

/// Vertical range for the initial top-left of a freshly added layer.
pub const NEW_LAYER_Y_RANGE: (f64, f64) = (50.0, 250.0);

/// Identifier of one placed layer instance. Never reused within a scene.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct LayerId(String);

impl LayerId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Fresh id derived from the source URL plus a random suffix.
    pub fn fresh(source_url: &str) -> Self {
        Self(format!("{source_url}#{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compositing mode applied when a layer is drawn over what is beneath it.
///
/// Serialized with canvas composite-operation names.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlendMode {
    #[default]
    #[serde(rename = "source-over")]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
}

/// One placed, independently transformable image instance.
#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    pub id: LayerId,
    pub source_url: String,
    /// Top-left in canvas pixels.
    pub position: Point,
    pub size: Size,
    /// Degrees about the layer center, unbounded.
    pub rotation: f64,
    pub flip_horizontal: bool,
    pub shadow: bool,
    pub blend_mode: Option<BlendMode>,
}

impl Layer {
    pub fn new(id: LayerId, source_url: impl Into<String>, position: Point, size: Size) -> Self {
        Self {
            id,
            source_url: source_url.into(),
            position,
            size,
            rotation: 0.0,
            flip_horizontal: false,
            shadow: false,
            blend_mode: None,
        }
    }

    pub fn frame(&self) -> LayerFrame {
        LayerFrame::new(self.position, self.size, self.rotation)
    }
}

/// Background draw order relative to the layer stack.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LayerRank {
    #[default]
    Behind,
    /// Same level as the layer stack. Draws exactly like [`LayerRank::Behind`].
    Interleaved,
    Front,
}

impl LayerRank {
    pub fn z_index(self) -> i32 {
        match self {
            LayerRank::Behind => -1,
            LayerRank::Interleaved => 0,
            LayerRank::Front => 1,
        }
    }

    pub fn from_z_index(z: i32) -> Self {
        match z.signum() {
            -1 => LayerRank::Behind,
            0 => LayerRank::Interleaved,
            _ => LayerRank::Front,
        }
    }

    pub fn draws_before_layers(self) -> bool {
        !matches!(self, LayerRank::Front)
    }
}

/// Optional full-canvas backdrop. Its rectangle may extend past the canvas.
#[derive(Clone, Debug, PartialEq)]
pub struct Background {
    pub source_url: String,
    pub position: Point,
    pub size: Size,
    pub rank: LayerRank,
}

impl Background {
    /// Background covering the whole canvas, drawn behind all layers.
    pub fn covering(source_url: impl Into<String>, canvas: Canvas) -> Self {
        Self {
            source_url: source_url.into(),
            position: Point::ZERO,
            size: Size::new(canvas.width_f64(), canvas.height_f64()),
            rank: LayerRank::Behind,
        }
    }

    pub fn frame(&self) -> LayerFrame {
        LayerFrame::new(self.position, self.size, 0.0)
    }
}

/// Full persisted state of one moodboard.
///
/// A scene is a value: every mutation returns a new scene and leaves `self` untouched, so callers
/// can diff before/after. Layer order is z-order, later entries draw on top.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scene {
    pub background: Option<Background>,
    pub layers: Vec<Layer>,
}

impl Scene {
    pub fn new(background: Option<Background>, layers: Vec<Layer>) -> Self {
        Self { background, layers }
    }

    pub fn is_empty(&self) -> bool {
        self.background.is_none() && self.layers.is_empty()
    }

    pub fn layer(&self, id: &LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| &l.id == id)
    }

    pub fn index_of(&self, id: &LayerId) -> Option<usize> {
        self.layers.iter().position(|l| &l.id == id)
    }

    /// Number of layers placed from `source_url`.
    pub fn instance_count(&self, source_url: &str) -> usize {
        self.layers
            .iter()
            .filter(|l| l.source_url == source_url)
            .count()
    }

    /// Distinct source URLs that currently have at least one layer.
    pub fn selected_urls(&self) -> BTreeSet<String> {
        self.layers.iter().map(|l| l.source_url.clone()).collect()
    }

    /// Every URL the renderer needs, background first.
    pub fn referenced_urls(&self) -> BTreeSet<String> {
        let mut out = self.selected_urls();
        if let Some(bg) = &self.background {
            out.insert(bg.source_url.clone());
        }
        out
    }

    /// Topmost layer whose rotated rectangle contains `p`.
    pub fn topmost_layer_at(&self, p: Point) -> Option<&Layer> {
        self.layers.iter().rev().find(|l| l.frame().contains(p))
    }

    /// Move a layer, confining its rectangle to the canvas. Unknown ids are a no-op.
    #[must_use]
    pub fn move_layer(&self, id: &LayerId, x: f64, y: f64, canvas: Canvas) -> Scene {
        self.map_layer(id, |l| {
            l.position = geometry::clamp_position(Point::new(x, y), l.size, canvas);
        })
    }

    /// Scale a layer (floored at the minimum size) and set its rotation from the gesture.
    #[must_use]
    pub fn resize_layer(&self, id: &LayerId, scale_x: f64, scale_y: f64, rotation: f64) -> Scene {
        self.map_layer(id, |l| {
            l.size = geometry::resize_dimensions(l.size, scale_x, scale_y);
            l.rotation = rotation;
        })
    }

    /// Set a layer's top-left as-is. Transform commits use this so the gesture's fixed anchor
    /// stays where the user left it.
    #[must_use]
    pub fn position_layer(&self, id: &LayerId, position: Point) -> Scene {
        self.map_layer(id, |l| l.position = position)
    }

    #[must_use]
    pub fn rotate_layer(&self, id: &LayerId, delta_degrees: f64) -> Scene {
        self.map_layer(id, |l| l.rotation += delta_degrees)
    }

    #[must_use]
    pub fn flip_layer(&self, id: &LayerId) -> Scene {
        self.map_layer(id, |l| l.flip_horizontal = !l.flip_horizontal)
    }

    #[must_use]
    pub fn toggle_shadow(&self, id: &LayerId) -> Scene {
        self.map_layer(id, |l| l.shadow = !l.shadow)
    }

    #[must_use]
    pub fn set_blend_mode(&self, id: &LayerId, mode: Option<BlendMode>) -> Scene {
        self.map_layer(id, |l| l.blend_mode = mode)
    }

    #[must_use]
    pub fn bring_to_front(&self, id: &LayerId) -> Scene {
        let mut out = self.clone();
        if let Some(i) = out.index_of(id) {
            let layer = out.layers.remove(i);
            out.layers.push(layer);
        }
        out
    }

    #[must_use]
    pub fn send_to_back(&self, id: &LayerId) -> Scene {
        let mut out = self.clone();
        if let Some(i) = out.index_of(id) {
            let layer = out.layers.remove(i);
            out.layers.insert(0, layer);
        }
        out
    }

    /// Append a new layer for `source_url` at a random position with the default size.
    #[must_use]
    pub fn add_layer(&self, source_url: &str, rng: &mut PlacementRng) -> (Scene, LayerId) {
        let x = rng.uniform(NEW_LAYER_X_RANGE.0, NEW_LAYER_X_RANGE.1);
        let y = rng.uniform(NEW_LAYER_Y_RANGE.0, NEW_LAYER_Y_RANGE.1);
        let id = LayerId::fresh(source_url);
        let mut out = self.clone();
        out.layers.push(Layer::new(
            id.clone(),
            source_url,
            Point::new(x, y),
            NEW_LAYER_SIZE,
        ));
        (out, id)
    }

    /// Remove exactly one layer instance.
    #[must_use]
    pub fn remove_layer(&self, id: &LayerId) -> Scene {
        let mut out = self.clone();
        out.layers.retain(|l| &l.id != id);
        out
    }

    #[must_use]
    pub fn set_background(&self, background: Background) -> Scene {
        Scene {
            background: Some(background),
            layers: self.layers.clone(),
        }
    }

    #[must_use]
    pub fn clear_background(&self) -> Scene {
        Scene {
            background: None,
            layers: self.layers.clone(),
        }
    }

    /// Move the background. It is not confined to the canvas.
    #[must_use]
    pub fn move_background(&self, x: f64, y: f64) -> Scene {
        let mut out = self.clone();
        if let Some(bg) = &mut out.background {
            bg.position = Point::new(x, y);
        }
        out
    }

    #[must_use]
    pub fn set_background_rank(&self, rank: LayerRank) -> Scene {
        let mut out = self.clone();
        if let Some(bg) = &mut out.background {
            bg.rank = rank;
        }
        out
    }

    #[must_use]
    pub fn clear(&self) -> Scene {
        Scene::default()
    }

    fn map_layer(&self, id: &LayerId, f: impl FnOnce(&mut Layer)) -> Scene {
        let mut out = self.clone();
        if let Some(layer) = out.layers.iter_mut().find(|l| &l.id == id) {
            f(layer);
        }
        out
    }
}
