//! Pure Rust manipulator built on the `image` crate.
//!
//! ## Parameters
//!
//! | Name | Values | Effect |
//! |---|---|---|
//! | `w`, `h` | positive integers | target size; one side alone keeps the aspect ratio |
//! | `fit` | `crop`, `scale` | `crop` fills then center-crops, `scale` stretches; absent fits within `w`×`h` |
//! | `rot` | `90`, `180`, `270` | clockwise rotation, applied after resizing |
//! | `flip` | `h`, `v`, `hv` | mirror horizontally and/or vertically |
//! | `auto` | `compress` | size-adaptive encoding, hinted with the source byte length |
//!
//! Unrecognised parameters are ignored. Resampling uses Lanczos3.
//!
//! Every resize is checked against [`OutputLimits`] first, both the
//! requested size and the intermediate fill size used by `crop`. A request
//! over the limits fails with [`ManipulateError::InvalidParam`] before any
//! pixel buffer is allocated.
//!
//! The output format follows the source format: the registry picks the
//! encoder from the detected format's extension, so e.g. GIF input decodes
//! fine but fails to encode.

use super::calculations::{calculate_fill_dimensions, calculate_fit_dimensions, resolve_target};
use super::{ManipulateError, ManipulationRequest, Manipulator, ParameterMap};
use crate::encoder::Encoders;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fit {
    Within,
    Crop,
    Scale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rotation {
    Deg90,
    Deg180,
    Deg270,
}

/// Parsed and validated transform instructions.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Transform {
    width: Option<u32>,
    height: Option<u32>,
    fit: Fit,
    rotation: Option<Rotation>,
    flip_h: bool,
    flip_v: bool,
    auto_compress: bool,
}

fn invalid(name: &str, value: &str) -> ManipulateError {
    ManipulateError::InvalidParam {
        name: name.to_string(),
        value: value.to_string(),
    }
}

fn parse_dimension(params: &ParameterMap, name: &str) -> Result<Option<u32>, ManipulateError> {
    params
        .get(name)
        .map(|v| match v.parse::<u32>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(invalid(name, v)),
        })
        .transpose()
}

/// Upper bounds on the size of a resized image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputLimits {
    /// Longest allowed side, in pixels.
    pub max_dimension: u32,
    /// Largest allowed `width * height`.
    pub max_pixels: u64,
}

impl Default for OutputLimits {
    fn default() -> Self {
        Self {
            max_dimension: 8192,
            max_pixels: 40_000_000,
        }
    }
}

impl OutputLimits {
    fn check(&self, (w, h): (u32, u32)) -> Result<(u32, u32), ManipulateError> {
        let pixels = u64::from(w) * u64::from(h);
        if w > self.max_dimension || h > self.max_dimension || pixels > self.max_pixels {
            return Err(invalid("size", &format!("{w}x{h}")));
        }
        Ok((w, h))
    }
}

impl Transform {
    fn from_params(params: &ParameterMap) -> Result<Self, ManipulateError> {
        let fit = match params.get("fit") {
            None => Fit::Within,
            Some("crop") => Fit::Crop,
            Some("scale") => Fit::Scale,
            Some(other) => return Err(invalid("fit", other)),
        };
        let rotation = match params.get("rot") {
            None | Some("0") => None,
            Some("90") => Some(Rotation::Deg90),
            Some("180") => Some(Rotation::Deg180),
            Some("270") => Some(Rotation::Deg270),
            Some(other) => return Err(invalid("rot", other)),
        };
        let (flip_h, flip_v) = match params.get("flip") {
            None => (false, false),
            Some("h") => (true, false),
            Some("v") => (false, true),
            Some("hv") | Some("vh") => (true, true),
            Some(other) => return Err(invalid("flip", other)),
        };
        let auto_compress = match params.get("auto") {
            None => false,
            Some("compress") => true,
            Some(other) => return Err(invalid("auto", other)),
        };
        Ok(Self {
            width: parse_dimension(params, "w")?,
            height: parse_dimension(params, "h")?,
            fit,
            rotation,
            flip_h,
            flip_v,
            auto_compress,
        })
    }

    fn apply(
        &self,
        img: DynamicImage,
        limits: &OutputLimits,
    ) -> Result<DynamicImage, ManipulateError> {
        let mut img = self.resize(img, limits)?;
        img = match self.rotation {
            Some(Rotation::Deg90) => img.rotate90(),
            Some(Rotation::Deg180) => img.rotate180(),
            Some(Rotation::Deg270) => img.rotate270(),
            None => img,
        };
        if self.flip_h {
            img = img.fliph();
        }
        if self.flip_v {
            img = img.flipv();
        }
        Ok(img)
    }

    fn resize(
        &self,
        img: DynamicImage,
        limits: &OutputLimits,
    ) -> Result<DynamicImage, ManipulateError> {
        let source = (img.width(), img.height());
        let Some(target) = resolve_target(source, self.width, self.height) else {
            return Ok(img);
        };
        let target = limits.check(target)?;
        let resized = match self.fit {
            Fit::Scale => img.resize_exact(target.0, target.1, FilterType::Lanczos3),
            Fit::Within => {
                let (w, h) = limits.check(calculate_fit_dimensions(source, target))?;
                img.resize_exact(w, h, FilterType::Lanczos3)
            }
            Fit::Crop => {
                // Fill-resize then center-crop to exact dimensions
                let (fill_w, fill_h) = limits.check(calculate_fill_dimensions(source, target))?;
                let filled = img.resize_exact(fill_w, fill_h, FilterType::Lanczos3);
                let x = fill_w.saturating_sub(target.0) / 2;
                let y = fill_h.saturating_sub(target.1) / 2;
                filled.crop_imm(x, y, target.0, target.1)
            }
        };
        Ok(resized)
    }
}

/// Extension the registry keys on for a detected source format.
fn extension_of(format: ImageFormat) -> &'static str {
    format.extensions_str().first().copied().unwrap_or("")
}

pub struct NativeManipulator {
    encoders: Arc<Encoders>,
    defaults: ParameterMap,
    limits: OutputLimits,
}

impl NativeManipulator {
    pub fn new(encoders: Arc<Encoders>) -> Self {
        Self {
            encoders,
            defaults: ParameterMap::new(),
            limits: OutputLimits::default(),
        }
    }

    pub fn with_defaults(mut self, defaults: ParameterMap) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_limits(mut self, limits: OutputLimits) -> Self {
        self.limits = limits;
        self
    }
}

impl Manipulator for NativeManipulator {
    fn has_default_params(&self) -> bool {
        !self.defaults.is_empty()
    }

    fn process(&self, request: ManipulationRequest) -> Result<Vec<u8>, ManipulateError> {
        let data = request.image_data();
        let format = image::guess_format(data).map_err(|_| ManipulateError::UnsupportedFormat)?;
        let params = request.params().clone().with_defaults(&self.defaults);
        let transform = Transform::from_params(&params)?;

        let img = image::load_from_memory_with_format(data, format).map_err(|e| match e {
            image::ImageError::Unsupported(_) => ManipulateError::UnsupportedFormat,
            other => ManipulateError::Decode(other),
        })?;
        let img = transform.apply(img, &self.limits)?;

        let encoder = self.encoders.select(&img, extension_of(format));
        let encoded = if transform.auto_compress {
            encoder.encode_with_size(&img, data.len() as u64)?
        } else {
            encoder.encode(&img)?
        };
        tracing::debug!(
            source_format = ?format,
            encoder = %encoder.kind(),
            input_bytes = data.len(),
            output_bytes = encoded.len(),
            "image processed"
        );
        Ok(encoded)
    }
}
