//! Premultiplied RGBA8 pixel compositing used by bitmap contexts and the movie compositor.

use std::str::FromStr;

use rayon::prelude::*;

use crate::foundation::core::Color;
use crate::foundation::error::{MovingImagesError, MovingImagesResult};
use crate::foundation::math::{mul_div255_u16, mul_div255_u8, unit_to_u8};

pub(crate) type PremulRgba8 = [u8; 4];

/// Blend modes accepted in the `blendmode` key of draw elements.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    /// Source replaces destination wherever the source has coverage.
    Copy,
}

impl FromStr for BlendMode {
    type Err = MovingImagesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accept both the short names and the `kCGBlendModeX` spelling.
        let short = s.strip_prefix("kCGBlendMode").unwrap_or(s).to_ascii_lowercase();
        Ok(match short.as_str() {
            "normal" => Self::Normal,
            "multiply" => Self::Multiply,
            "screen" => Self::Screen,
            "overlay" => Self::Overlay,
            "darken" => Self::Darken,
            "lighten" => Self::Lighten,
            "copy" => Self::Copy,
            _ => {
                return Err(MovingImagesError::invalid_parameter(format!(
                    "unknown blendmode '{s}'"
                )));
            }
        })
    }
}

/// Source-over with an extra opacity byte.
pub(crate) fn over(dst: PremulRgba8, src: PremulRgba8, opacity: u8) -> PremulRgba8 {
    let op = u16::from(opacity);
    let sa = mul_div255_u16(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }
    let inv = 255 - sa;
    let mut out = [0u8; 4];
    out[3] = (sa + mul_div255_u16(u16::from(dst[3]), inv)).min(255) as u8;
    for i in 0..3 {
        let sc = mul_div255_u16(u16::from(src[i]), op);
        let dc = mul_div255_u16(u16::from(dst[i]), inv);
        out[i] = (sc + dc).min(255) as u8;
    }
    out
}

fn blend_channel(mode: BlendMode, cb: f32, cs: f32) -> f32 {
    match mode {
        BlendMode::Normal | BlendMode::Copy => cs,
        BlendMode::Multiply => cb * cs,
        BlendMode::Screen => cb + cs - cb * cs,
        BlendMode::Overlay => {
            if cb <= 0.5 {
                2.0 * cb * cs
            } else {
                1.0 - 2.0 * (1.0 - cb) * (1.0 - cs)
            }
        }
        BlendMode::Darken => cb.min(cs),
        BlendMode::Lighten => cb.max(cs),
    }
}

/// One pixel of a separable blend followed by source-over.
pub(crate) fn blend(
    dst: PremulRgba8,
    src: PremulRgba8,
    mode: BlendMode,
    opacity: u8,
) -> PremulRgba8 {
    match mode {
        BlendMode::Normal => over(dst, src, opacity),
        BlendMode::Copy => {
            if src[3] == 0 {
                dst
            } else {
                src.map(|c| mul_div255_u8(u16::from(c), u16::from(opacity)))
            }
        }
        _ => {
            let sa = f32::from(src[3]) / 255.0 * f32::from(opacity) / 255.0;
            if sa <= 0.0 {
                return dst;
            }
            let da = f32::from(dst[3]) / 255.0;
            let op = f32::from(opacity) / 255.0;
            let mut out = [0u8; 4];
            for i in 0..3 {
                let sc = f32::from(src[i]) / 255.0 * op;
                let dc = f32::from(dst[i]) / 255.0;
                let cs = sc / sa;
                let cb = if da > 0.0 { dc / da } else { 0.0 };
                let v = sc * (1.0 - da) + dc * (1.0 - sa) + sa * da * blend_channel(mode, cb, cs);
                out[i] = (v * 255.0 + 0.5).clamp(0.0, 255.0) as u8;
            }
            out[3] = ((sa + da - sa * da) * 255.0 + 0.5).clamp(0.0, 255.0) as u8;
            out
        }
    }
}

fn check_same_len(a: usize, b: usize) -> MovingImagesResult<()> {
    if a != b || !a.is_multiple_of(4) {
        return Err(MovingImagesError::operation_failed(
            "compositing expects equal-length rgba8 buffers",
        ));
    }
    Ok(())
}

/// Composite `src` onto `dst` with `mode` and an overall `alpha` in `0..=1`.
pub(crate) fn composite_in_place(
    dst: &mut [u8],
    src: &[u8],
    mode: BlendMode,
    alpha: f64,
) -> MovingImagesResult<()> {
    check_same_len(dst.len(), src.len())?;
    let opacity = unit_to_u8(alpha);
    if opacity == 0 {
        return Ok(());
    }
    dst.par_chunks_mut(4 * 256)
        .zip(src.par_chunks(4 * 256))
        .for_each(|(d, s)| {
            for (d, s) in d.chunks_exact_mut(4).zip(s.chunks_exact(4)) {
                let out = blend([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]], mode, opacity);
                d.copy_from_slice(&out);
            }
        });
    Ok(())
}

/// Scale every channel of `layer` by the alpha of `mask`.
pub(crate) fn apply_mask(layer: &mut [u8], mask: &[u8]) -> MovingImagesResult<()> {
    check_same_len(layer.len(), mask.len())?;
    layer
        .par_chunks_mut(4)
        .zip(mask.par_chunks(4))
        .for_each(|(px, m)| {
            let a = u16::from(m[3]);
            if a != 255 {
                for c in px.iter_mut() {
                    *c = mul_div255_u8(u16::from(*c), a);
                }
            }
        });
    Ok(())
}

/// Replace colour with `color`, keeping the coverage of `layer`.
pub(crate) fn tint(layer: &[u8], color: Color) -> Vec<u8> {
    let p = color.to_premul().to_array();
    let mut out = vec![0u8; layer.len()];
    out.par_chunks_mut(4)
        .zip(layer.par_chunks(4))
        .for_each(|(o, px)| {
            let a = u16::from(px[3]);
            for i in 0..4 {
                o[i] = mul_div255_u8(u16::from(p[i]), a);
            }
        });
    out
}

/// Alpha-only complement: opaque where `layer` is empty.
pub(crate) fn inverse_coverage(layer: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; layer.len()];
    out.par_chunks_mut(4)
        .zip(layer.par_chunks(4))
        .for_each(|(o, px)| {
            let a = 255 - px[3];
            o.copy_from_slice(&[a, a, a, a]);
        });
    out
}

/// Translate by whole device pixels (`dy` positive moves rows down); uncovered pixels are clear.
pub(crate) fn offset(src: &[u8], width: u32, height: u32, dx: i64, dy: i64) -> Vec<u8> {
    let (w, h) = (i64::from(width), i64::from(height));
    let row_bytes = width as usize * 4;
    let mut out = vec![0u8; src.len()];
    out.par_chunks_mut(row_bytes.max(4))
        .enumerate()
        .for_each(|(y, row)| {
            let sy = y as i64 - dy;
            if sy < 0 || sy >= h {
                return;
            }
            for x in 0..w {
                let sx = x - dx;
                if sx < 0 || sx >= w {
                    continue;
                }
                let si = sy as usize * row_bytes + sx as usize * 4;
                let di = x as usize * 4;
                row[di..di + 4].copy_from_slice(&src[si..si + 4]);
            }
        });
    out
}

#[cfg(test)]
#[path = "../../tests/unit/graphics/composite.rs"]
mod tests;
