//! The encoder registry: one immutable encoder per output format.
//!
//! Built once at startup and injected wherever encoding happens. Nothing in
//! it is mutated afterwards, so request workers read it concurrently without
//! locks.
//!
//! ## Selection rules
//!
//! | Extension | Encoder |
//! |---|---|
//! | `jpg`, `jpeg` | JPEG |
//! | `png` | JPEG when the JPEG quality is below 100 and the image is fully opaque, otherwise PNG |
//! | `webp` | WebP |
//! | anything else | NoOp (always fails) |

use super::codecs::{Encoder, EncoderKind, JpegEncoder, NoOpEncoder, PngEncoder, WebPEncoder};
use image::DynamicImage;
use serde::Serialize;

pub struct Encoders {
    jpeg: JpegEncoder,
    png: PngEncoder,
    webp: WebPEncoder,
    noop: NoOpEncoder,
}

impl Encoders {
    pub fn new() -> Self {
        Self {
            jpeg: JpegEncoder::default(),
            png: PngEncoder::default(),
            webp: WebPEncoder,
            noop: NoOpEncoder,
        }
    }

    pub fn with_jpeg(mut self, jpeg: JpegEncoder) -> Self {
        self.jpeg = jpeg;
        self
    }

    pub fn with_png(mut self, png: PngEncoder) -> Self {
        self.png = png;
        self
    }

    pub fn with_webp(mut self, webp: WebPEncoder) -> Self {
        self.webp = webp;
        self
    }

    /// Choose the encoder for a decoded image whose source had extension `ext`.
    ///
    /// The opacity scan only runs for `png`.
    pub fn select(&self, img: &DynamicImage, ext: &str) -> &dyn Encoder {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => &self.jpeg,
            "png" => {
                if !self.jpeg.quality().is_max() && is_opaque(img) {
                    &self.jpeg
                } else {
                    &self.png
                }
            }
            "webp" => &self.webp,
            _ => &self.noop,
        }
    }

    pub fn jpeg(&self) -> &JpegEncoder {
        &self.jpeg
    }

    /// Serializable snapshot of the configured options.
    pub fn describe(&self) -> EncodersInfo {
        EncodersInfo {
            jpeg_quality: self.jpeg.quality().value(),
            jpeg_tiers: self
                .jpeg
                .tiers()
                .as_slice()
                .iter()
                .map(|t| (t.threshold, t.quality.value()))
                .collect(),
            png_compression: format!("{:?}", self.png.compression()).to_lowercase(),
            formats: vec![EncoderKind::Jpeg, EncoderKind::Png, EncoderKind::WebP],
        }
    }
}

impl Default for Encoders {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EncodersInfo {
    pub jpeg_quality: u8,
    pub jpeg_tiers: Vec<(u64, u8)>,
    pub png_compression: String,
    pub formats: Vec<EncoderKind>,
}

/// True when every pixel carries the fully-opaque alpha value.
///
/// Images without an alpha channel are opaque by construction; the others
/// need a full scan.
pub fn is_opaque(img: &DynamicImage) -> bool {
    match img {
        DynamicImage::ImageLumaA8(buf) => buf.pixels().all(|p| p.0[1] == u8::MAX),
        DynamicImage::ImageRgba8(buf) => buf.pixels().all(|p| p.0[3] == u8::MAX),
        DynamicImage::ImageLumaA16(buf) => buf.pixels().all(|p| p.0[1] == u16::MAX),
        DynamicImage::ImageRgba16(buf) => buf.pixels().all(|p| p.0[3] == u16::MAX),
        DynamicImage::ImageRgba32F(buf) => buf.pixels().all(|p| p.0[3] >= 1.0),
        other if other.color().has_alpha() => other.to_rgba8().pixels().all(|p| p.0[3] == u8::MAX),
        _ => true,
    }
}
