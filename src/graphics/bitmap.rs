use std::path::Path;
use std::str::FromStr;

use serde_json::{Map, Value, json};

use crate::foundation::core::{FrameRGBA, Rect};
use crate::foundation::error::{MovingImagesError, MovingImagesResult};
use crate::graphics::codec::{self, ImageFileType};
use crate::graphics::draw::DrawElement;
use crate::graphics::render::{self, ImageMap};
use crate::protocol::property::PropertyValue;

/// Pixel layout a bitmap context reports through `getpixeldata` and `contextinfo`.
///
/// Storage is premultiplied RGBA8 regardless of the preset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BitmapPreset {
    AlphaPreMulFirstRgb,
    AlphaPreMulLastRgb,
    AlphaPreMulBgra,
    AlphaSkipFirstRgb,
    AlphaSkipLastRgb,
}

impl BitmapPreset {
    pub(crate) const ALL: [BitmapPreset; 5] = [
        BitmapPreset::AlphaPreMulFirstRgb,
        BitmapPreset::AlphaPreMulLastRgb,
        BitmapPreset::AlphaPreMulBgra,
        BitmapPreset::AlphaSkipFirstRgb,
        BitmapPreset::AlphaSkipLastRgb,
    ];

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::AlphaPreMulFirstRgb => "AlphaPreMulFirstRGB8bpcInt",
            Self::AlphaPreMulLastRgb => "AlphaPreMulLastRGB8bpcInt",
            Self::AlphaPreMulBgra => "AlphaPreMulBGRA8bpc32bppInteger",
            Self::AlphaSkipFirstRgb => "AlphaSkipFirstRGB8bpcInt",
            Self::AlphaSkipLastRgb => "AlphaSkipLastRGB8bpcInt",
        }
    }

    /// `CGBitmapInfo` value: alpha placement plus byte order.
    pub(crate) fn alpha_info(self) -> u32 {
        match self {
            Self::AlphaPreMulFirstRgb => 2,
            Self::AlphaPreMulLastRgb => 1,
            Self::AlphaPreMulBgra => 2 | 8192,
            Self::AlphaSkipFirstRgb => 6,
            Self::AlphaSkipLastRgb => 5,
        }
    }

    fn skips_alpha(self) -> bool {
        matches!(self, Self::AlphaSkipFirstRgb | Self::AlphaSkipLastRgb)
    }

    /// Channel names in memory order.
    pub(crate) fn channels(self) -> [&'static str; 4] {
        match self {
            Self::AlphaPreMulFirstRgb => ["Alpha", "Red", "Green", "Blue"],
            Self::AlphaPreMulLastRgb => ["Red", "Green", "Blue", "Alpha"],
            Self::AlphaPreMulBgra => ["Blue", "Green", "Red", "Alpha"],
            Self::AlphaSkipFirstRgb => ["Skip", "Red", "Green", "Blue"],
            Self::AlphaSkipLastRgb => ["Red", "Green", "Blue", "Skip"],
        }
    }

    /// Reorder a premultiplied RGBA pixel into memory order.
    fn arrange(self, [r, g, b, a]: [u8; 4]) -> [u8; 4] {
        match self {
            Self::AlphaPreMulFirstRgb => [a, r, g, b],
            Self::AlphaPreMulLastRgb => [r, g, b, a],
            Self::AlphaPreMulBgra => [b, g, r, a],
            Self::AlphaSkipFirstRgb => [255, r, g, b],
            Self::AlphaSkipLastRgb => [r, g, b, 255],
        }
    }

    pub(crate) fn list() -> String {
        Self::ALL.map(Self::as_str).join(" ")
    }
}

impl FromStr for BitmapPreset {
    type Err = MovingImagesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "PlatformDefaultBitmapContext" {
            return Ok(Self::AlphaPreMulFirstRgb);
        }
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| MovingImagesError::invalid_parameter(format!("unknown preset '{s}'")))
    }
}

/// CPU drawing surface owned by the registry.
#[derive(Debug)]
pub(crate) struct BitmapContext {
    preset: BitmapPreset,
    frame: FrameRGBA,
}

impl BitmapContext {
    pub(crate) fn new(
        width: u32,
        height: u32,
        preset: BitmapPreset,
        max_dimension: u32,
    ) -> MovingImagesResult<Self> {
        if width == 0 || height == 0 {
            return Err(MovingImagesError::invalid_parameter(
                "bitmap width and height must be greater than zero",
            ));
        }
        let limit = max_dimension.min(u32::from(u16::MAX));
        if width > limit || height > limit {
            return Err(MovingImagesError::invalid_parameter(format!(
                "bitmap {width}x{height} exceeds the {limit} pixel limit"
            )));
        }
        Ok(Self {
            preset,
            frame: FrameRGBA::new(width, height)?,
        })
    }

    pub(crate) fn width(&self) -> u32 {
        self.frame.width
    }

    pub(crate) fn height(&self) -> u32 {
        self.frame.height
    }

    /// Copy of the pixels; alpha-skipping presets read as opaque.
    pub(crate) fn snapshot(&self) -> FrameRGBA {
        let mut out = self.frame.clone();
        if self.preset.skips_alpha() {
            for px in out.data.chunks_exact_mut(4) {
                px[3] = 255;
            }
        }
        out
    }

    pub(crate) fn draw(&mut self, element: &DrawElement, images: &ImageMap) -> MovingImagesResult<()> {
        render::draw(&mut self.frame, element, images)
    }

    pub(crate) fn context_info(&self) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("alphainfo".into(), json!(self.preset.alpha_info()));
        m.insert("bitspercomponent".into(), json!(8));
        m.insert("bitsperpixel".into(), json!(32));
        m.insert("colorspace".into(), json!("kCGColorSpaceSRGB"));
        m
    }

    /// Pixels inside a y-up rectangle, rows `[x, y, c0, c1, c2, c3]` in preset order.
    pub(crate) fn pixel_data(&self, rect: Rect) -> MovingImagesResult<Map<String, Value>> {
        let (w, h) = (f64::from(self.width()), f64::from(self.height()));
        let r = rect.round().intersect(Rect::new(0.0, 0.0, w, h));
        if r.width() <= 0.0 || r.height() <= 0.0 {
            return Err(MovingImagesError::invalid_parameter(
                "pixel data rectangle lies outside the bitmap",
            ));
        }
        let mut rows = Vec::with_capacity((r.width() * r.height()) as usize);
        for y in r.y0 as u32..r.y1 as u32 {
            let device_y = self.height() - 1 - y;
            for x in r.x0 as u32..r.x1 as u32 {
                let px = self
                    .frame
                    .pixel(x, device_y)
                    .ok_or_else(|| MovingImagesError::operation_failed("pixel out of range"))?;
                let [c0, c1, c2, c3] = self.preset.arrange(px);
                rows.push(json!([x, y, c0, c1, c2, c3]));
            }
        }
        let [n0, n1, n2, n3] = self.preset.channels();
        let mut m = Map::new();
        m.insert("pixeldata".into(), Value::Array(rows));
        m.insert("contextinfo".into(), Value::Object(self.context_info()));
        m.insert("columnnames".into(), json!(["x", "y", n0, n1, n2, n3]));
        Ok(m)
    }

    pub(crate) fn export(
        &self,
        path: &Path,
        file_type: ImageFileType,
        quality: Option<f64>,
    ) -> MovingImagesResult<()> {
        codec::encode_image(&self.snapshot(), path, file_type, quality)
    }

    pub(crate) fn property(&self, key: &str) -> MovingImagesResult<PropertyValue> {
        Ok(match key {
            "width" => PropertyValue::int(self.width()),
            "height" => PropertyValue::int(self.height()),
            "preset" => PropertyValue::str(self.preset.as_str()),
            "bitspercomponent" => PropertyValue::int(8),
            "bitsperpixel" => PropertyValue::int(32),
            "colorspace" => PropertyValue::str("kCGColorSpaceSRGB"),
            "alphainfo" => PropertyValue::int(self.preset.alpha_info()),
            _ => {
                return Err(MovingImagesError::invalid_property(format!(
                    "bitmapcontext has no property '{key}'"
                )));
            }
        })
    }

    pub(crate) const PROPERTY_KEYS: [&'static str; 7] = [
        "width",
        "height",
        "preset",
        "bitspercomponent",
        "bitsperpixel",
        "colorspace",
        "alphainfo",
    ];
}

#[cfg(test)]
#[path = "../../tests/unit/graphics/bitmap.rs"]
mod tests;
