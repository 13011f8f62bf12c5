//! Moodboard is a CPU compositing engine for layered image moodboards.
//!
//! A [`Scene`] (optional background plus ordered image layers) is edited through pure mutations,
//! drawn by a [`RenderSurface`], manipulated with pointer events via the [`Controller`], masked by
//! the [`MaskEngine`], and exported to PNG/JPEG bytes. [`Editor`] ties these together for a host:
//!
//! - Create an [`Editor`] with a [`Session`] and [`EditorConfig`]
//! - Feed it host inputs and pointer events
//! - Resolve image loads, redraw when dirty, and bump the export token to export
#![forbid(unsafe_code)]

mod foundation;

pub mod assets;
pub mod config;
pub mod editor;
pub mod export;
pub mod geometry;
pub mod interaction;
pub mod mask;
pub mod render;
pub mod scene;

pub use crate::foundation::core::{Affine, BezPath, Canvas, Point, Rect, Size, Vec2};
pub use crate::foundation::error::{MoodboardError, MoodboardResult};
pub use crate::foundation::math::PlacementRng;

pub use crate::assets::{
    DirFetcher, ImageFetcher, LoadRequest, LoadState, MemoryFetcher, ProxyConfig,
};
pub use crate::config::EditorConfig;
pub use crate::editor::{Editor, EditorListener, NoopListener, Session};
pub use crate::export::{ExportOpts, ExportOutput, ExportTrigger, encode_frame, export};
pub use crate::geometry::LayerFrame;
pub use crate::interaction::{Action, Controller, InputState};
pub use crate::mask::{MaskEngine, MaskMode};
pub use crate::render::{FrameRGBA, RenderSurface};
pub use crate::scene::{Background, BlendMode, Layer, LayerId, LayerRank, Scene, SceneDoc};
