//! Format-specific encoders.
//!
//! | Variant | Crate / function | Size hint |
//! |---|---|---|
//! | [`JpegEncoder`] | `image::codecs::jpeg::JpegEncoder` | picks quality from the tier table |
//! | [`PngEncoder`] | `image::codecs::png::PngEncoder` (adaptive filter) | ignored |
//! | [`WebPEncoder`] | `image::codecs::webp::WebPEncoder` (lossless) | ignored |
//! | [`NoOpEncoder`] | none, always fails | ignored |
//!
//! Encoders hold only their fixed options, so one instance of each is shared
//! by every request without synchronization.

use super::params::{CompressionLevel, CompressionTiers, Quality};
use image::codecs::png::FilterType;
use image::{DynamicImage, ImageEncoder};
use std::io::Cursor;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("unknown format: failed to encode image")]
    UnsupportedFormat,
    #[error("{format} encode failed: {source}")]
    Codec {
        format: EncoderKind,
        #[source]
        source: image::ImageError,
    },
}

/// Identifies an encoder variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderKind {
    Jpeg,
    Png,
    WebP,
    NoOp,
}

impl std::fmt::Display for EncoderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EncoderKind::Jpeg => "jpeg",
            EncoderKind::Png => "png",
            EncoderKind::WebP => "webp",
            EncoderKind::NoOp => "noop",
        };
        f.write_str(name)
    }
}

/// Converts a decoded image into a compressed byte sequence.
pub trait Encoder: Send + Sync {
    fn kind(&self) -> EncoderKind;

    fn encode(&self, img: &DynamicImage) -> Result<Vec<u8>, EncodeError>;

    /// Encode with a hint of the expected payload size in bytes. Only
    /// size-adaptive encoders look at the hint.
    fn encode_with_size(&self, img: &DynamicImage, _size_hint: u64) -> Result<Vec<u8>, EncodeError> {
        self.encode(img)
    }
}

#[derive(Debug, Clone)]
pub struct JpegEncoder {
    quality: Quality,
    tiers: CompressionTiers,
}

impl JpegEncoder {
    pub fn new(quality: Quality) -> Self {
        Self {
            quality,
            tiers: CompressionTiers::default(),
        }
    }

    pub fn with_tiers(mut self, tiers: CompressionTiers) -> Self {
        self.tiers = tiers;
        self
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    pub fn tiers(&self) -> &CompressionTiers {
        &self.tiers
    }

    /// Quality used for an input of `size_hint` bytes.
    pub fn quality_for(&self, size_hint: u64) -> Quality {
        self.tiers.quality_for(size_hint).unwrap_or(self.quality)
    }

    fn encode_at(&self, img: &DynamicImage, quality: Quality) -> Result<Vec<u8>, EncodeError> {
        // JPEG has no alpha channel; flatten everything to 8-bit RGB first.
        let rgb = img.to_rgb8();
        let mut buf = Cursor::new(Vec::new());
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality.value())
            .write_image(
                rgb.as_raw(),
                rgb.width(),
                rgb.height(),
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|source| EncodeError::Codec {
                format: EncoderKind::Jpeg,
                source,
            })?;
        Ok(buf.into_inner())
    }
}

impl Default for JpegEncoder {
    fn default() -> Self {
        Self::new(Quality::default())
    }
}

impl Encoder for JpegEncoder {
    fn kind(&self) -> EncoderKind {
        EncoderKind::Jpeg
    }

    fn encode(&self, img: &DynamicImage) -> Result<Vec<u8>, EncodeError> {
        self.encode_at(img, self.quality)
    }

    fn encode_with_size(&self, img: &DynamicImage, size_hint: u64) -> Result<Vec<u8>, EncodeError> {
        let quality = self.quality_for(size_hint);
        tracing::debug!(size_hint, quality = quality.value(), "size-adaptive jpeg encode");
        self.encode_at(img, quality)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PngEncoder {
    compression: CompressionLevel,
}

impl PngEncoder {
    pub fn new(compression: CompressionLevel) -> Self {
        Self { compression }
    }

    pub fn compression(&self) -> CompressionLevel {
        self.compression
    }
}

impl Encoder for PngEncoder {
    fn kind(&self) -> EncoderKind {
        EncoderKind::Png
    }

    fn encode(&self, img: &DynamicImage) -> Result<Vec<u8>, EncodeError> {
        let mut buf = Cursor::new(Vec::new());
        let encoder = image::codecs::png::PngEncoder::new_with_quality(
            &mut buf,
            self.compression.into(),
            FilterType::Adaptive,
        );
        img.write_with_encoder(encoder)
            .map_err(|source| EncodeError::Codec {
                format: EncoderKind::Png,
                source,
            })?;
        Ok(buf.into_inner())
    }
}

/// Lossless WebP; the pure-Rust encoder has no lossy mode.
#[derive(Debug, Clone, Default)]
pub struct WebPEncoder;

impl Encoder for WebPEncoder {
    fn kind(&self) -> EncoderKind {
        EncoderKind::WebP
    }

    fn encode(&self, img: &DynamicImage) -> Result<Vec<u8>, EncodeError> {
        let rgba = img.to_rgba8();
        let mut buf = Cursor::new(Vec::new());
        image::codecs::webp::WebPEncoder::new_lossless(&mut buf)
            .write_image(
                rgba.as_raw(),
                rgba.width(),
                rgba.height(),
                image::ExtendedColorType::Rgba8,
            )
            .map_err(|source| EncodeError::Codec {
                format: EncoderKind::WebP,
                source,
            })?;
        Ok(buf.into_inner())
    }
}

/// Stand-in for formats without an encoder. Never touches the image.
#[derive(Debug, Clone, Default)]
pub struct NoOpEncoder;

impl Encoder for NoOpEncoder {
    fn kind(&self) -> EncoderKind {
        EncoderKind::NoOp
    }

    fn encode(&self, _img: &DynamicImage) -> Result<Vec<u8>, EncodeError> {
        Err(EncodeError::UnsupportedFormat)
    }

    fn encode_with_size(&self, _img: &DynamicImage, _size_hint: u64) -> Result<Vec<u8>, EncodeError> {
        Err(EncodeError::UnsupportedFormat)
    }
}
