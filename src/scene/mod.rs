//! Scene model: background plus ordered image layers, and its persisted JSON form.

pub(crate) mod model;
pub(crate) mod wire;

pub use model::{Background, BlendMode, Layer, LayerId, LayerRank, Scene};
pub use wire::{BackgroundDoc, LayerDoc, SceneDoc};
