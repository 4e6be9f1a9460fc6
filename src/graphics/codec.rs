//! Still-image import and export through the `image` crate.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::Context;

use crate::foundation::core::FrameRGBA;
use crate::foundation::error::{MovingImagesError, MovingImagesResult};

/// File types addressed by uniform type identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ImageFileType {
    Png,
    Jpeg,
    Tiff,
    Bmp,
    Gif,
}

impl ImageFileType {
    pub(crate) const ALL: [ImageFileType; 5] = [
        ImageFileType::Png,
        ImageFileType::Jpeg,
        ImageFileType::Tiff,
        ImageFileType::Bmp,
        ImageFileType::Gif,
    ];

    pub(crate) fn uti(self) -> &'static str {
        match self {
            Self::Png => "public.png",
            Self::Jpeg => "public.jpeg",
            Self::Tiff => "public.tiff",
            Self::Bmp => "com.microsoft.bmp",
            Self::Gif => "com.compuserve.gif",
        }
    }

    pub(crate) fn from_uti(uti: &str) -> MovingImagesResult<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.uti() == uti)
            .ok_or_else(|| {
                MovingImagesError::invalid_parameter(format!("unsupported image file type '{uti}'"))
            })
    }

    fn format(self) -> image::ImageFormat {
        match self {
            Self::Png => image::ImageFormat::Png,
            Self::Jpeg => image::ImageFormat::Jpeg,
            Self::Tiff => image::ImageFormat::Tiff,
            Self::Bmp => image::ImageFormat::Bmp,
            Self::Gif => image::ImageFormat::Gif,
        }
    }

    /// Space separated identifiers, as replied by the global type properties.
    pub(crate) fn list() -> String {
        Self::ALL.map(Self::uti).join(" ")
    }
}

/// Decode an image file into premultiplied RGBA8.
pub(crate) fn decode_image(path: &Path) -> MovingImagesResult<FrameRGBA> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("read image file '{}'", path.display()))
        .map_err(|e| MovingImagesError::operation_failed(format!("{e:#}")))?;
    decode_bytes(&bytes)
}

pub(crate) fn decode_bytes(bytes: &[u8]) -> MovingImagesResult<FrameRGBA> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| MovingImagesError::operation_failed(format!("decode image: {e}")))?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    FrameRGBA::from_straight(width, height, rgba.into_raw())
}

/// Write `frame` as `file_type`. `quality` in `0..=1` applies to JPEG only.
#[tracing::instrument(level = "debug", skip(frame), fields(width = frame.width, height = frame.height))]
pub(crate) fn encode_image(
    frame: &FrameRGBA,
    path: &Path,
    file_type: ImageFileType,
    quality: Option<f64>,
) -> MovingImagesResult<()> {
    let straight = frame.to_straight();
    let result = match file_type {
        ImageFileType::Jpeg => {
            let rgb: Vec<u8> = straight
                .chunks_exact(4)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect();
            let q = quality.map_or(85, |q| (q.clamp(0.0, 1.0) * 100.0).round() as u8).max(1);
            File::create(path)
                .map_err(image::ImageError::IoError)
                .and_then(|f| {
                    image::codecs::jpeg::JpegEncoder::new_with_quality(BufWriter::new(f), q)
                        .encode(&rgb, frame.width, frame.height, image::ExtendedColorType::Rgb8)
                })
        }
        other => image::save_buffer_with_format(
            path,
            &straight,
            frame.width,
            frame.height,
            image::ColorType::Rgba8,
            other.format(),
        ),
    };
    result
        .with_context(|| format!("write {} to '{}'", file_type.uti(), path.display()))
        .map_err(|e| MovingImagesError::operation_failed(format!("{e:#}")))
}

/// Bilinear resize of premultiplied pixels.
pub(crate) fn resize(frame: &FrameRGBA, width: u32, height: u32) -> MovingImagesResult<FrameRGBA> {
    if frame.width == width && frame.height == height {
        return Ok(frame.clone());
    }
    let src = image::RgbaImage::from_raw(frame.width, frame.height, frame.data.clone())
        .ok_or_else(|| MovingImagesError::operation_failed("frame buffer has the wrong length"))?;
    let out = image::imageops::resize(&src, width, height, image::imageops::FilterType::Triangle);
    FrameRGBA::from_premul(width, height, out.into_raw())
}

#[cfg(test)]
#[path = "../../tests/unit/graphics/codec.rs"]
mod tests;
