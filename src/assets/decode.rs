use std::sync::Arc;

use anyhow::Context;

use crate::foundation::error::{MoodboardError, MoodboardResult};
use crate::foundation::math::premultiply_rgba8_in_place;

/// Decoded image pixels, premultiplied RGBA8, row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct PreparedImage {
    pub width: u32,
    pub height: u32,
    pub rgba8_premul: Arc<Vec<u8>>,
}

pub fn decode_image(bytes: &[u8]) -> MoodboardResult<PreparedImage> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err(MoodboardError::load("decoded image has zero size"));
    }

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    Ok(PreparedImage {
        width,
        height,
        rgba8_premul: Arc::new(rgba8_premul),
    })
}

impl PreparedImage {
    /// Image paint for the rasterizer. Fails for images beyond the `u16` pixmap limit.
    pub fn to_paint(&self) -> MoodboardResult<vello_cpu::Image> {
        let w: u16 = self
            .width
            .try_into()
            .map_err(|_| MoodboardError::load("image width exceeds u16"))?;
        let h: u16 = self
            .height
            .try_into()
            .map_err(|_| MoodboardError::load("image height exceeds u16"))?;
        if self.rgba8_premul.len() != self.width as usize * self.height as usize * 4 {
            return Err(MoodboardError::load("prepared image byte length mismatch"));
        }

        let mut may_have_opacities = false;
        let mut pixels = Vec::with_capacity(self.width as usize * self.height as usize);
        for px in self.rgba8_premul.chunks_exact(4) {
            let a = px[3];
            may_have_opacities |= a != 255;
            pixels.push(vello_cpu::peniko::color::PremulRgba8 {
                r: px[0],
                g: px[1],
                b: px[2],
                a,
            });
        }
        let pixmap = vello_cpu::Pixmap::from_parts_with_opacity(pixels, w, h, may_have_opacities);

        Ok(vello_cpu::Image {
            image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
            sampler: vello_cpu::peniko::ImageSampler::default(),
        })
    }
}
