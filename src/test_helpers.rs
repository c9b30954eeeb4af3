//! Shared test utilities for the pixgate test suite.
//!
//! Provides synthetic images, in-memory encodings of them, and scripted
//! stand-ins for the three seams the image handler talks through
//! (`Storage`, `Manipulator`, `MetricsSink`).
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let storage = ScriptedStorage::new().with_object("/a.png", encoded(&gradient_rgb(8, 8), ImageFormat::Png));
//! let metrics = RecordingMetrics::default();
//! let manipulator = StubManipulator::returning(b"out".to_vec());
//! ```

use crate::manipulator::{ManipulateError, ManipulationRequest, Manipulator, ParameterMap};
use crate::metrics::{HandlerError, MetricsSink};
use crate::storage::{FetchResult, Storage, StorageError};
use async_trait::async_trait;
use axum::http::StatusCode;
use bytes::Bytes;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Mutex;

// =========================================================================
// Synthetic images
// =========================================================================

/// RGB image with a smooth two-axis gradient.
pub fn gradient_rgb(width: u32, height: u32) -> DynamicImage {
    let img = RgbImage::from_fn(width, height, |x, y| {
        let r = (x * 255 / width.max(1)) as u8;
        let g = (y * 255 / height.max(1)) as u8;
        Rgb([r, g, 128])
    });
    DynamicImage::ImageRgb8(img)
}

/// RGBA image whose alpha channel is fully opaque everywhere.
pub fn opaque_rgba(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(gradient_rgb(width, height).to_rgba8())
}

/// RGBA image with varying translucency.
pub fn translucent_rgba(width: u32, height: u32) -> DynamicImage {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        let a = ((x + y) * 255 / (width + height).max(1)) as u8;
        Rgba([200, 50, 50, a])
    });
    DynamicImage::ImageRgba8(img)
}

/// Encode `img` in `format` with the stock `image` encoders.
pub fn encoded(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let img = match format {
        ImageFormat::Gif => DynamicImage::ImageRgba8(img.to_rgba8()),
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8()),
        _ => img.clone(),
    };
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

// =========================================================================
// Storage
// =========================================================================

/// In-memory storage. Paths without an object fail with their scripted
/// status, or 404.
#[derive(Default)]
pub struct ScriptedStorage {
    objects: HashMap<String, Bytes>,
    failures: HashMap<String, StatusCode>,
    fetched: Mutex<Vec<String>>,
}

impl ScriptedStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(mut self, path: &str, data: impl Into<Bytes>) -> Self {
        self.objects.insert(path.to_string(), data.into());
        self
    }

    pub fn with_failure(mut self, path: &str, status: StatusCode) -> Self {
        self.failures.insert(path.to_string(), status);
        self
    }

    /// Every path passed to `fetch`, in call order.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl Storage for ScriptedStorage {
    async fn fetch(&self, path: &str) -> FetchResult {
        self.fetched.lock().unwrap().push(path.to_string());
        if let Some(status) = self.failures.get(path) {
            return Err(StorageError::Upstream { status: *status });
        }
        self.objects
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }
}

// =========================================================================
// Manipulator
// =========================================================================

type Script = Box<dyn Fn(&ManipulationRequest) -> Result<Vec<u8>, ManipulateError> + Send + Sync>;

/// Manipulator driven by a closure. Records the parameters of every call.
pub struct StubManipulator {
    script: Script,
    default_params: bool,
    calls: Mutex<Vec<ParameterMap>>,
}

impl StubManipulator {
    pub fn new(
        script: impl Fn(&ManipulationRequest) -> Result<Vec<u8>, ManipulateError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            default_params: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn returning(output: Vec<u8>) -> Self {
        Self::new(move |_| Ok(output.clone()))
    }

    pub fn failing(make: fn() -> ManipulateError) -> Self {
        Self::new(move |_| Err(make()))
    }

    pub fn panicking(message: &'static str) -> Self {
        Self::new(move |_| -> Result<Vec<u8>, ManipulateError> { panic!("{message}") })
    }

    pub fn with_default_params(mut self) -> Self {
        self.default_params = true;
        self
    }

    pub fn calls(&self) -> Vec<ParameterMap> {
        self.calls.lock().unwrap().clone()
    }
}

impl Manipulator for StubManipulator {
    fn has_default_params(&self) -> bool {
        self.default_params
    }

    fn process(&self, request: ManipulationRequest) -> Result<Vec<u8>, ManipulateError> {
        self.calls.lock().unwrap().push(request.params().clone());
        (self.script)(&request)
    }
}

// =========================================================================
// Metrics
// =========================================================================

#[derive(Default)]
pub struct RecordingMetrics {
    events: Mutex<Vec<HandlerError>>,
}

impl RecordingMetrics {
    pub fn events(&self) -> Vec<HandlerError> {
        self.events.lock().unwrap().clone()
    }
}

impl MetricsSink for RecordingMetrics {
    fn increment(&self, error: HandlerError) {
        self.events.lock().unwrap().push(error);
    }
}
