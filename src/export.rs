//! Export pipeline: rasterize the canvas region without overlays and encode PNG + JPEG.

use std::io::Cursor;

use anyhow::Context;
use base64::{Engine as _, engine::general_purpose};

use crate::foundation::error::{MoodboardError, MoodboardResult};
use crate::foundation::math::{
    mul_div255_u8, premultiply_rgba8_in_place, unpremultiply_rgba8_in_place,
};
use crate::mask::MaskEngine;
use crate::render::{FrameRGBA, RenderSurface};
use crate::scene::Scene;

/// Smallest supersampling factor accepted for exports.
pub const MIN_PIXEL_RATIO: u32 = 2;

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ExportOpts {
    /// Output pixels per canvas pixel.
    pub pixel_ratio: u32,
    /// JPEG quality, 1..=100.
    pub jpeg_quality: u8,
    /// Opaque color transparent areas are flattened onto for JPEG.
    pub jpeg_matte: [u8; 3],
}

impl Default for ExportOpts {
    fn default() -> Self {
        Self {
            pixel_ratio: MIN_PIXEL_RATIO,
            jpeg_quality: 95,
            jpeg_matte: [255, 255, 255],
        }
    }
}

impl ExportOpts {
    pub fn validate(&self) -> MoodboardResult<()> {
        if self.pixel_ratio < MIN_PIXEL_RATIO {
            return Err(MoodboardError::validation(format!(
                "export pixel_ratio must be >= {MIN_PIXEL_RATIO}"
            )));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(MoodboardError::validation(
                "export jpeg_quality must be in 1..=100",
            ));
        }
        Ok(())
    }
}

/// Both encodings of one export, plus their pixel size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportOutput {
    pub png: Vec<u8>,
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl ExportOutput {
    /// `data:image/png;base64,...`
    pub fn png_data_url(&self) -> String {
        data_url("image/png", &self.png)
    }

    /// `data:image/jpeg;base64,...`
    pub fn jpeg_data_url(&self) -> String {
        data_url("image/jpeg", &self.jpeg)
    }
}

fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", general_purpose::STANDARD.encode(bytes))
}

/// Hides overlays for its lifetime and restores the previous visibility when dropped.
struct OverlayGuard<'a> {
    surface: &'a mut RenderSurface,
    was_visible: bool,
}

impl<'a> OverlayGuard<'a> {
    fn hide(surface: &'a mut RenderSurface) -> Self {
        let was_visible = surface.overlays_visible();
        surface.set_overlays_visible(false);
        Self {
            surface,
            was_visible,
        }
    }
}

impl Drop for OverlayGuard<'_> {
    fn drop(&mut self) {
        self.surface.set_overlays_visible(self.was_visible);
    }
}

/// Render `scene` through `surface` and encode it.
///
/// Only the canvas region is read back, at `opts.pixel_ratio`. Overlays are hidden for the
/// duration and restored on every exit path, errors included.
#[tracing::instrument(skip_all, fields(layers = scene.layers.len(), pixel_ratio = opts.pixel_ratio))]
pub fn export(
    surface: &mut RenderSurface,
    scene: &Scene,
    mask: &MaskEngine,
    opts: &ExportOpts,
) -> MoodboardResult<ExportOutput> {
    opts.validate()?;
    let guard = OverlayGuard::hide(surface);
    guard.surface.draw(scene, mask)?;
    let frame = guard.surface.render_canvas(scene, mask, opts.pixel_ratio)?;
    drop(guard);

    let out = encode_frame(&frame, opts)?;
    tracing::info!(
        width = out.width,
        height = out.height,
        png_bytes = out.png.len(),
        jpeg_bytes = out.jpeg.len(),
        "export complete"
    );
    Ok(out)
}

pub fn encode_frame(frame: &FrameRGBA, opts: &ExportOpts) -> MoodboardResult<ExportOutput> {
    let expected = frame.width as usize * frame.height as usize * 4;
    if frame.width == 0 || frame.height == 0 || frame.data.len() != expected {
        return Err(MoodboardError::export("frame buffer does not match its size"));
    }

    let mut premul = frame.data.clone();
    if !frame.premultiplied {
        premultiply_rgba8_in_place(&mut premul);
    }

    let mut straight = premul.clone();
    unpremultiply_rgba8_in_place(&mut straight);
    let rgba = image::RgbaImage::from_raw(frame.width, frame.height, straight)
        .ok_or_else(|| MoodboardError::export("rgba buffer size mismatch"))?;
    let mut png = Vec::new();
    image::DynamicImage::ImageRgba8(rgba)
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .context("encode png")
        .map_err(|e| MoodboardError::export(format!("{e:#}")))?;

    let rgb = flatten_on_matte(&premul, opts.jpeg_matte);
    let rgb = image::RgbImage::from_raw(frame.width, frame.height, rgb)
        .ok_or_else(|| MoodboardError::export("rgb buffer size mismatch"))?;
    let mut jpeg = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, opts.jpeg_quality)
        .encode_image(&rgb)
        .context("encode jpeg")
        .map_err(|e| MoodboardError::export(format!("{e:#}")))?;

    Ok(ExportOutput {
        png,
        jpeg,
        width: frame.width,
        height: frame.height,
    })
}

/// Premultiplied RGBA8 composited over an opaque matte, as packed RGB8.
fn flatten_on_matte(premul: &[u8], matte: [u8; 3]) -> Vec<u8> {
    let mut out = Vec::with_capacity(premul.len() / 4 * 3);
    for px in premul.chunks_exact(4) {
        let inv = 255 - u16::from(px[3]);
        for c in 0..3 {
            out.push(px[c].saturating_add(mul_div255_u8(u16::from(matte[c]), inv)));
        }
    }
    out
}

/// Edge detector for the host's export token.
///
/// The first token seen only primes the trigger, so mounting with an initial token does not
/// export an empty scene.
#[derive(Clone, Debug, Default)]
pub struct ExportTrigger {
    last: Option<u64>,
}

impl ExportTrigger {
    /// Record `token`; returns `true` when it differs from the previous one.
    pub fn observe(&mut self, token: u64) -> bool {
        match self.last.replace(token) {
            None => false,
            Some(prev) => prev != token,
        }
    }
}
