//! Render surface: draw order, image layers, shadows, blend modes, masking and overlays.

pub(crate) mod blur;
pub(crate) mod composite;
pub(crate) mod overlay;
pub(crate) mod surface;

pub use blur::blur_alpha;
pub use composite::{PixelRect, PremulRgba8, blend, over};
pub use overlay::{OverlayShape, OverlayState, OverlayStyle};
pub use surface::{FrameRGBA, RenderSurface, SHADOW_ALPHA, SHADOW_BLUR, SHADOW_OFFSET};
