use crate::foundation::error::{MovingImagesError, MovingImagesResult};

pub use kurbo::{Affine, Point, Rect, Size};

/// Straight-alpha colour with float components in `0..=1`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Color {
    /// Red component.
    pub red: f64,
    /// Green component.
    pub green: f64,
    /// Blue component.
    pub blue: f64,
    /// Alpha component.
    #[serde(default = "Color::opaque_alpha")]
    pub alpha: f64,
}

impl Color {
    fn opaque_alpha() -> f64 {
        1.0
    }

    /// Opaque black.
    pub const BLACK: Self = Self {
        red: 0.0,
        green: 0.0,
        blue: 0.0,
        alpha: 1.0,
    };

    /// Fully transparent black.
    pub const CLEAR: Self = Self {
        red: 0.0,
        green: 0.0,
        blue: 0.0,
        alpha: 0.0,
    };

    /// Build a colour from straight components.
    pub fn new(red: f64, green: f64, blue: f64, alpha: f64) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    /// Quantize to straight RGBA8: `floor(c * 255 + 0.5)`, clamped.
    pub fn to_rgba8(self) -> [u8; 4] {
        fn q(c: f64) -> u8 {
            (c.clamp(0.0, 1.0) * 255.0 + 0.5).floor() as u8
        }
        [q(self.red), q(self.green), q(self.blue), q(self.alpha)]
    }

    /// Quantize, then premultiply.
    pub fn to_premul(self) -> Rgba8Premul {
        let [r, g, b, a] = self.to_rgba8();
        Rgba8Premul::from_straight_rgba(r, g, b, a)
    }

    /// Same colour with alpha scaled by `factor`.
    pub fn with_alpha_scaled(self, factor: f64) -> Self {
        Self {
            alpha: (self.alpha * factor).clamp(0.0, 1.0),
            ..self
        }
    }
}

/// Premultiplied RGBA8 (r,g,b already multiplied by a).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8Premul {
    /// Red channel premultiplied by alpha.
    pub r: u8,
    /// Green channel premultiplied by alpha.
    pub g: u8,
    /// Blue channel premultiplied by alpha.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Rgba8Premul {
    /// Fully transparent black.
    pub fn transparent() -> Self {
        Self {
            r: 0,
            g: 0,
            b: 0,
            a: 0,
        }
    }

    /// Convert straight-alpha RGBA8 into premultiplied RGBA8.
    pub fn from_straight_rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        fn premul(c: u8, a: u8) -> u8 {
            let c = u16::from(c);
            let a = u16::from(a);
            (((c * a) + 127) / 255) as u8
        }

        Self {
            r: premul(r, a),
            g: premul(g, a),
            b: premul(b, a),
            a,
        }
    }

    /// Channels in RGBA order.
    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// A premultiplied RGBA8 raster, rows top to bottom.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRGBA {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Premultiplied RGBA8 bytes, tightly packed, row-major, top row first.
    pub data: Vec<u8>,
}

impl FrameRGBA {
    /// A fully transparent frame.
    pub fn new(width: u32, height: u32) -> MovingImagesResult<Self> {
        let len = frame_len(width, height)?;
        Ok(Self {
            width,
            height,
            data: vec![0u8; len],
        })
    }

    /// Wrap existing premultiplied bytes, checking the length.
    pub fn from_premul(width: u32, height: u32, data: Vec<u8>) -> MovingImagesResult<Self> {
        if data.len() != frame_len(width, height)? {
            return Err(MovingImagesError::invalid_parameter(format!(
                "pixel buffer has {} bytes, expected {width}x{height}x4",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Premultiply straight RGBA8 bytes.
    pub fn from_straight(width: u32, height: u32, mut data: Vec<u8>) -> MovingImagesResult<Self> {
        for px in data.chunks_exact_mut(4) {
            let p = Rgba8Premul::from_straight_rgba(px[0], px[1], px[2], px[3]);
            px.copy_from_slice(&p.to_array());
        }
        Self::from_premul(width, height, data)
    }

    /// Premultiplied pixel at (x, y) counted from the top-left.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        Some([
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ])
    }

    /// Convert back to straight alpha, for encoders.
    pub fn to_straight(&self) -> Vec<u8> {
        let mut out = self.data.clone();
        for px in out.chunks_exact_mut(4) {
            let a = u16::from(px[3]);
            if a == 0 || a == 255 {
                continue;
            }
            for c in &mut px[..3] {
                *c = (((u16::from(*c) * 255) + a / 2) / a).min(255) as u8;
            }
        }
        out
    }
}

pub(crate) fn frame_len(width: u32, height: u32) -> MovingImagesResult<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| MovingImagesError::invalid_parameter("image size overflow"))
}

/// JSON shape for an affine transform: `{m11, m12, m21, m22, tX, tY}`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[allow(missing_docs)]
pub struct AffineJson {
    pub m11: f64,
    pub m12: f64,
    pub m21: f64,
    pub m22: f64,
    #[serde(rename = "tX")]
    pub tx: f64,
    #[serde(rename = "tY")]
    pub ty: f64,
}

impl From<Affine> for AffineJson {
    fn from(a: Affine) -> Self {
        let [m11, m12, m21, m22, tx, ty] = a.as_coeffs();
        Self {
            m11,
            m12,
            m21,
            m22,
            tx,
            ty,
        }
    }
}

impl From<AffineJson> for Affine {
    fn from(a: AffineJson) -> Self {
        Affine::new([a.m11, a.m12, a.m21, a.m22, a.tx, a.ty])
    }
}

/// JSON shape for a size: `{width, height}`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SizeJson {
    /// Horizontal extent.
    pub width: f64,
    /// Vertical extent.
    pub height: f64,
}

impl From<Size> for SizeJson {
    fn from(s: Size) -> Self {
        Self {
            width: s.width,
            height: s.height,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
