use rayon::prelude::*;

use crate::foundation::core::frame_len;
use crate::foundation::error::{MovingImagesError, MovingImagesResult};

/// Separable gaussian blur of a premultiplied RGBA8 buffer, edges clamped.
///
/// The kernel radius is `ceil(3 * sigma)`. A non-positive sigma returns the input unchanged.
pub(crate) fn blur_premul(
    src: &[u8],
    width: u32,
    height: u32,
    sigma: f64,
) -> MovingImagesResult<Vec<u8>> {
    let len = frame_len(width, height)?;
    if src.len() != len {
        return Err(MovingImagesError::invalid_parameter(
            "blur expects a buffer of width*height*4 bytes",
        ));
    }
    if !sigma.is_finite() || sigma <= 0.0 || width == 0 || height == 0 {
        return Ok(src.to_vec());
    }

    let radius = (sigma * 3.0).ceil() as u32;
    let kernel = gaussian_kernel_q16(radius, sigma);
    let mut tmp = vec![0u8; len];
    let mut out = vec![0u8; len];
    horizontal_pass(src, &mut tmp, width, &kernel);
    vertical_pass(&tmp, &mut out, width, height, &kernel);
    Ok(out)
}

/// Weights in Q16 that sum to exactly `1 << 16`.
fn gaussian_kernel_q16(radius: u32, sigma: f64) -> Vec<u32> {
    let r = radius as i32;
    let denom = 2.0 * sigma * sigma;
    let weights_f: Vec<f64> = (-r..=r)
        .map(|i| (-f64::from(i * i) / denom).exp())
        .collect();
    let sum: f64 = weights_f.iter().sum();

    let mut weights: Vec<u32> = weights_f
        .iter()
        .map(|w| ((w / sum) * 65536.0).round().clamp(0.0, 65536.0) as u32)
        .collect();
    let acc: i64 = weights.iter().map(|&w| i64::from(w)).sum();
    let mid = weights.len() / 2;
    weights[mid] = (i64::from(weights[mid]) + 65536 - acc).clamp(0, 65536) as u32;
    weights
}

fn horizontal_pass(src: &[u8], dst: &mut [u8], width: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i64;
    let w = i64::from(width);
    let row_bytes = width as usize * 4;
    dst.par_chunks_mut(row_bytes)
        .zip(src.par_chunks(row_bytes))
        .for_each(|(out_row, row)| {
            for x in 0..w {
                let mut acc = [0u64; 4];
                for (ki, &kw) in k.iter().enumerate() {
                    let sx = (x + ki as i64 - radius).clamp(0, w - 1) as usize * 4;
                    for (c, a) in acc.iter_mut().enumerate() {
                        *a += u64::from(kw) * u64::from(row[sx + c]);
                    }
                }
                let o = x as usize * 4;
                for (c, a) in acc.into_iter().enumerate() {
                    out_row[o + c] = q16_to_u8(a);
                }
            }
        });
}

fn vertical_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i64;
    let h = i64::from(height);
    let row_bytes = width as usize * 4;
    dst.par_chunks_mut(row_bytes)
        .enumerate()
        .for_each(|(y, out_row)| {
            for x in 0..width as usize {
                let mut acc = [0u64; 4];
                for (ki, &kw) in k.iter().enumerate() {
                    let sy = (y as i64 + ki as i64 - radius).clamp(0, h - 1) as usize;
                    let idx = sy * row_bytes + x * 4;
                    for (c, a) in acc.iter_mut().enumerate() {
                        *a += u64::from(kw) * u64::from(src[idx + c]);
                    }
                }
                for (c, a) in acc.into_iter().enumerate() {
                    out_row[x * 4 + c] = q16_to_u8(a);
                }
            }
        });
}

fn q16_to_u8(acc: u64) -> u8 {
    ((acc + 32768) >> 16).min(255) as u8
}

#[cfg(test)]
#[path = "../../tests/unit/graphics/blur.rs"]
mod tests;
