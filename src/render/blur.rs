//! Gaussian blur of a single alpha plane, used for drop shadows.

use crate::foundation::error::{MoodboardError, MoodboardResult};

/// Kernel radius covering three standard deviations.
pub fn radius_for_sigma(sigma: f32) -> u32 {
    if !sigma.is_finite() || sigma <= 0.0 {
        return 0;
    }
    (sigma * 3.0).ceil() as u32
}

/// Blur a tightly packed `width * height` alpha plane. Samples past the edges read as 0.
///
/// A non-positive or non-finite `sigma` returns the plane unchanged.
pub fn blur_alpha(alpha: &[u8], width: u32, height: u32, sigma: f32) -> MoodboardResult<Vec<u8>> {
    let (w, h) = (width as usize, height as usize);
    let len = w
        .checked_mul(h)
        .ok_or_else(|| MoodboardError::render("alpha plane size overflow"))?;
    if alpha.len() != len {
        return Err(MoodboardError::render(format!(
            "alpha plane is {} bytes, expected {width}x{height}",
            alpha.len()
        )));
    }
    let radius = radius_for_sigma(sigma) as usize;
    if radius == 0 || len == 0 {
        return Ok(alpha.to_vec());
    }

    let kernel = kernel_q16(radius, f64::from(sigma));
    let mut rows = vec![0u8; len];
    for y in 0..h {
        convolve(alpha, &mut rows, y * w, 1, w, &kernel);
    }
    let mut out = vec![0u8; len];
    for x in 0..w {
        convolve(&rows, &mut out, x, w, h, &kernel);
    }
    Ok(out)
}

/// Normalized weights in 16.16 fixed point; rounding drift lands on the center tap.
fn kernel_q16(radius: usize, sigma: f64) -> Vec<u32> {
    let two_s2 = 2.0 * sigma * sigma;
    let raw: Vec<f64> = (0..=2 * radius)
        .map(|i| {
            let d = i as f64 - radius as f64;
            (-d * d / two_s2).exp()
        })
        .collect();
    let total: f64 = raw.iter().sum();
    let mut q: Vec<u32> = raw
        .iter()
        .map(|v| (v / total * 65536.0).round() as u32)
        .collect();
    let sum: u32 = q.iter().sum();
    q[radius] = (q[radius] + 65536).saturating_sub(sum);
    q
}

/// One line of `n` samples starting at `start`, `step` apart.
fn convolve(src: &[u8], dst: &mut [u8], start: usize, step: usize, n: usize, kernel: &[u32]) {
    let r = kernel.len() / 2;
    for i in 0..n {
        let lo = i.saturating_sub(r);
        let hi = (i + r).min(n - 1);
        let acc: u64 = (lo..=hi)
            .map(|j| u64::from(kernel[j + r - i]) * u64::from(src[start + j * step]))
            .sum();
        dst[start + i * step] = ((acc + 0x8000) >> 16).min(255) as u8;
    }
}
