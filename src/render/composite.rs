use crate::foundation::core::Rect;
use crate::foundation::error::{MoodboardError, MoodboardResult};
use crate::foundation::math::mul_div255_u8 as mul_div255;
use crate::scene::BlendMode;

pub type PremulRgba8 = [u8; 4];

/// Half-open pixel rectangle inside a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl PixelRect {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x0: 0,
            y0: 0,
            x1: width,
            y1: height,
        }
    }

    /// Pixels touched by `rect`, clipped to a `width`×`height` buffer.
    pub fn covering(rect: Rect, width: u32, height: u32) -> Option<Self> {
        if !(rect.x0.is_finite()
            && rect.y0.is_finite()
            && rect.x1.is_finite()
            && rect.y1.is_finite())
        {
            return None;
        }
        let clip = |v: f64, max: u32| -> u32 { v.clamp(0.0, f64::from(max)) as u32 };
        let r = Self {
            x0: clip(rect.x0.floor(), width),
            y0: clip(rect.y0.floor(), height),
            x1: clip(rect.x1.ceil(), width),
            y1: clip(rect.y1.ceil(), height),
        };
        (!r.is_empty()).then_some(r)
    }

    pub fn is_empty(&self) -> bool {
        self.x0 >= self.x1 || self.y0 >= self.y1
    }

    pub fn width(&self) -> u32 {
        self.x1.saturating_sub(self.x0)
    }

    pub fn height(&self) -> u32 {
        self.y1.saturating_sub(self.y0)
    }
}

pub fn over(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }

    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    let sa = mul_div255(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }

    let inv = 255u16 - u16::from(sa);

    let mut out = [0u8; 4];
    out[3] = sa.saturating_add(mul_div255(u16::from(dst[3]), inv));

    for i in 0..3 {
        let sc = mul_div255(u16::from(src[i]), op);
        let dc = mul_div255(u16::from(dst[i]), inv);
        out[i] = sc.saturating_add(dc);
    }
    out
}

/// Separable blend of premultiplied `src` onto `dst`.
pub fn blend(dst: PremulRgba8, src: PremulRgba8, mode: BlendMode) -> PremulRgba8 {
    if mode == BlendMode::Normal || dst[3] == 0 {
        return over(dst, src, 1.0);
    }
    if src[3] == 0 {
        return dst;
    }

    let sa = f32::from(src[3]) / 255.0;
    let da = f32::from(dst[3]) / 255.0;
    let out_a = sa + da - sa * da;

    let mut out = [0u8; 4];
    for i in 0..3 {
        let sc = f32::from(src[i]) / 255.0;
        let dc = f32::from(dst[i]) / 255.0;
        let b = blend_channel(mode, (dc / da).min(1.0), (sc / sa).min(1.0));
        let v = sc * (1.0 - da) + dc * (1.0 - sa) + sa * da * b;
        out[i] = to_u8(v.min(out_a));
    }
    out[3] = to_u8(out_a);
    out
}

fn to_u8(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

fn blend_channel(mode: BlendMode, cb: f32, cs: f32) -> f32 {
    match mode {
        BlendMode::Normal => cs,
        BlendMode::Multiply => cb * cs,
        BlendMode::Screen => screen(cb, cs),
        BlendMode::Overlay => hard_light(cs, cb),
        BlendMode::Darken => cb.min(cs),
        BlendMode::Lighten => cb.max(cs),
        BlendMode::ColorDodge => {
            if cb <= 0.0 {
                0.0
            } else if cs >= 1.0 {
                1.0
            } else {
                (cb / (1.0 - cs)).min(1.0)
            }
        }
        BlendMode::ColorBurn => {
            if cb >= 1.0 {
                1.0
            } else if cs <= 0.0 {
                0.0
            } else {
                1.0 - ((1.0 - cb) / cs).min(1.0)
            }
        }
        BlendMode::HardLight => hard_light(cb, cs),
        BlendMode::SoftLight => {
            if cs <= 0.5 {
                cb - (1.0 - 2.0 * cs) * cb * (1.0 - cb)
            } else {
                let d = if cb <= 0.25 {
                    ((16.0 * cb - 12.0) * cb + 4.0) * cb
                } else {
                    cb.sqrt()
                };
                cb + (2.0 * cs - 1.0) * (d - cb)
            }
        }
        BlendMode::Difference => (cb - cs).abs(),
        BlendMode::Exclusion => cb + cs - 2.0 * cb * cs,
    }
}

fn screen(cb: f32, cs: f32) -> f32 {
    cb + cs - cb * cs
}

fn hard_light(cb: f32, cs: f32) -> f32 {
    if cs <= 0.5 {
        cb * 2.0 * cs
    } else {
        screen(cb, 2.0 * cs - 1.0)
    }
}

fn check_region(len: usize, stride: u32, region: PixelRect, what: &str) -> MoodboardResult<()> {
    if !len.is_multiple_of(4) || stride == 0 {
        return Err(MoodboardError::render(format!(
            "{what} expects rgba8 buffers"
        )));
    }
    let rows = len / 4 / stride as usize;
    if region.x1 > stride || region.y1 as usize > rows {
        return Err(MoodboardError::render(format!(
            "{what} region exceeds buffer bounds"
        )));
    }
    Ok(())
}

/// Blend `src` onto `dst` inside `region`. Both buffers share the same `stride` in pixels.
pub fn blend_region_in_place(
    dst: &mut [u8],
    src: &[u8],
    stride: u32,
    region: PixelRect,
    mode: BlendMode,
) -> MoodboardResult<()> {
    if dst.len() != src.len() {
        return Err(MoodboardError::render(
            "blend_region_in_place expects equal-length rgba8 buffers",
        ));
    }
    check_region(dst.len(), stride, region, "blend_region_in_place")?;
    for y in region.y0..region.y1 {
        let row = (y as usize * stride as usize + region.x0 as usize) * 4;
        let end = row + region.width() as usize * 4;
        for (d, s) in dst[row..end]
            .chunks_exact_mut(4)
            .zip(src[row..end].chunks_exact(4))
        {
            if s[3] == 0 {
                continue;
            }
            let out = blend([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]], mode);
            d.copy_from_slice(&out);
        }
    }
    Ok(())
}

/// Composite a solid `rgb` color, shaped by a region-sized `alpha` plane, over `dst`.
pub fn over_alpha_in_place(
    dst: &mut [u8],
    stride: u32,
    region: PixelRect,
    alpha: &[u8],
    rgb: [u8; 3],
) -> MoodboardResult<()> {
    check_region(dst.len(), stride, region, "over_alpha_in_place")?;
    let rw = region.width() as usize;
    if alpha.len() != rw * region.height() as usize {
        return Err(MoodboardError::render(
            "over_alpha_in_place expects a region-sized alpha plane",
        ));
    }
    for (py, y) in (region.y0..region.y1).enumerate() {
        let row = (y as usize * stride as usize + region.x0 as usize) * 4;
        for (d, &a) in dst[row..row + rw * 4]
            .chunks_exact_mut(4)
            .zip(&alpha[py * rw..(py + 1) * rw])
        {
            if a == 0 {
                continue;
            }
            let a16 = u16::from(a);
            let src = [
                mul_div255(u16::from(rgb[0]), a16),
                mul_div255(u16::from(rgb[1]), a16),
                mul_div255(u16::from(rgb[2]), a16),
                a,
            ];
            let out = over([d[0], d[1], d[2], d[3]], src, 1.0);
            d.copy_from_slice(&out);
        }
    }
    Ok(())
}

pub fn clear_region(buf: &mut [u8], stride: u32, region: PixelRect) -> MoodboardResult<()> {
    check_region(buf.len(), stride, region, "clear_region")?;
    for y in region.y0..region.y1 {
        let row = (y as usize * stride as usize + region.x0 as usize) * 4;
        buf[row..row + region.width() as usize * 4].fill(0);
    }
    Ok(())
}

/// Scale every premultiplied pixel by the matching mask alpha.
pub fn apply_mask_in_place(dst: &mut [u8], mask_alpha: &[u8]) -> MoodboardResult<()> {
    if !dst.len().is_multiple_of(4) || dst.len() / 4 != mask_alpha.len() {
        return Err(MoodboardError::render(
            "apply_mask_in_place expects one mask byte per pixel",
        ));
    }
    for (px, &m) in dst.chunks_exact_mut(4).zip(mask_alpha) {
        match m {
            255 => {}
            0 => px.fill(0),
            _ => {
                for c in px.iter_mut() {
                    *c = mul_div255(u16::from(*c), u16::from(m));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn over_opacity_0_is_noop() {
        let dst = [1, 2, 3, 4];
        let src = [200, 200, 200, 200];
        assert_eq!(over(dst, src, 0.0), dst);
    }

    #[test]
    fn over_src_opaque_replaces_dst() {
        let dst = [0, 0, 0, 255];
        let src = [255, 0, 0, 255];
        assert_eq!(over(dst, src, 1.0), src);
    }

    #[test]
    fn over_dst_transparent_returns_src() {
        let dst = [0, 0, 0, 0];
        let src = [100, 110, 120, 200];
        assert_eq!(over(dst, src, 1.0), src);
    }

    #[test]
    fn normal_blend_is_source_over() {
        let dst = [10, 20, 30, 255];
        let src = [50, 0, 0, 128];
        assert_eq!(blend(dst, src, BlendMode::Normal), over(dst, src, 1.0));
    }

    #[test]
    fn multiply_with_white_keeps_backdrop() {
        let dst = [200, 40, 10, 255];
        assert_eq!(blend(dst, [255, 255, 255, 255], BlendMode::Multiply), dst);
        assert_eq!(
            blend(dst, [0, 0, 0, 255], BlendMode::Multiply),
            [0, 0, 0, 255]
        );
    }

    #[test]
    fn screen_with_black_keeps_backdrop() {
        let dst = [200, 40, 10, 255];
        assert_eq!(blend(dst, [0, 0, 0, 255], BlendMode::Screen), dst);
    }

    #[test]
    fn difference_of_equal_colors_is_black() {
        let c = [90, 120, 30, 255];
        assert_eq!(blend(c, c, BlendMode::Difference), [0, 0, 0, 255]);
    }

    #[test]
    fn blend_onto_transparent_is_plain_copy() {
        let src = [10, 20, 30, 40];
        for mode in [BlendMode::Multiply, BlendMode::ColorBurn, BlendMode::Exclusion] {
            assert_eq!(blend([0, 0, 0, 0], src, mode), src);
        }
    }

    #[test]
    fn premultiplied_invariant_holds_for_every_mode() {
        let modes = [
            BlendMode::Multiply,
            BlendMode::Screen,
            BlendMode::Overlay,
            BlendMode::Darken,
            BlendMode::Lighten,
            BlendMode::ColorDodge,
            BlendMode::ColorBurn,
            BlendMode::HardLight,
            BlendMode::SoftLight,
            BlendMode::Difference,
            BlendMode::Exclusion,
        ];
        let dst = [60, 90, 30, 120];
        let src = [100, 20, 140, 180];
        for mode in modes {
            let out = blend(dst, src, mode);
            assert!(out[..3].iter().all(|&c| c <= out[3]), "{mode:?} {out:?}");
        }
    }

    #[test]
    fn region_blend_leaves_outside_untouched() {
        let stride = 3;
        let mut dst = vec![0u8; 3 * 2 * 4];
        let src = vec![255u8; 3 * 2 * 4];
        let region = PixelRect {
            x0: 1,
            y0: 1,
            x1: 3,
            y1: 2,
        };
        blend_region_in_place(&mut dst, &src, stride, region, BlendMode::Normal).unwrap();
        assert_eq!(&dst[..16], &[0u8; 16]);
        assert_eq!(&dst[16..], &[255u8; 8]);
    }

    #[test]
    fn region_outside_buffer_is_rejected() {
        let mut buf = vec![0u8; 4 * 4];
        let region = PixelRect {
            x0: 0,
            y0: 0,
            x1: 3,
            y1: 1,
        };
        assert!(clear_region(&mut buf, 2, region).is_err());
    }

    #[test]
    fn covering_clips_to_buffer() {
        let r = PixelRect::covering(Rect::new(-5.5, 2.2, 7.1, 100.0), 6, 10).unwrap();
        assert_eq!(r, PixelRect { x0: 0, y0: 2, x1: 6, y1: 10 });
        assert!(PixelRect::covering(Rect::new(20.0, 0.0, 30.0, 5.0), 6, 10).is_none());
    }

    #[test]
    fn alpha_plane_lands_at_region_origin() {
        let mut dst = vec![0u8; 2 * 2 * 4];
        let region = PixelRect {
            x0: 1,
            y0: 1,
            x1: 2,
            y1: 2,
        };
        over_alpha_in_place(&mut dst, 2, region, &[128], [0, 0, 0]).unwrap();
        assert_eq!(&dst[12..], &[0, 0, 0, 128]);
        assert_eq!(&dst[..12], &[0u8; 12]);

        let mut white = vec![0u8; 4];
        over_alpha_in_place(&mut white, 1, PixelRect::full(1, 1), &[128], [255, 255, 255])
            .unwrap();
        assert_eq!(white, [128, 128, 128, 128]);
        assert!(over_alpha_in_place(&mut white, 1, PixelRect::full(1, 1), &[], [0; 3]).is_err());
    }

    #[test]
    fn mask_scales_pixels() {
        let mut px = vec![200u8, 100, 50, 255, 200, 100, 50, 255, 200, 100, 50, 255];
        apply_mask_in_place(&mut px, &[255, 0, 128]).unwrap();
        assert_eq!(&px[..4], &[200, 100, 50, 255]);
        assert_eq!(&px[4..8], &[0, 0, 0, 0]);
        assert_eq!(&px[8..], &[100, 50, 25, 128]);
        assert!(apply_mask_in_place(&mut px, &[0]).is_err());
    }
}
