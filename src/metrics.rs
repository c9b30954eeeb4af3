//! Error counters for the image handler.
//!
//! The handler reports through the [`MetricsSink`] trait so tests can record
//! increments; production uses [`PrometheusMetrics`], whose registry backs
//! the `/metrics` endpoint.

use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
    #[error("metrics output is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Failure classes counted by the image handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerError {
    StorageFetch,
    Processor,
}

impl HandlerError {
    pub fn as_str(self) -> &'static str {
        match self {
            HandlerError::StorageFetch => "storage_fetch_error",
            HandlerError::Processor => "processor_error",
        }
    }
}

/// Counter sink shared by all request workers. Increments must be safe
/// under concurrent use.
pub trait MetricsSink: Send + Sync {
    fn increment(&self, error: HandlerError);
}

pub struct PrometheusMetrics {
    registry: Registry,
    handler_errors: IntCounterVec,
}

impl PrometheusMetrics {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();
        let handler_errors = IntCounterVec::new(
            Opts::new(
                "pixgate_image_handler_errors_total",
                "Image handler failures by kind",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(handler_errors.clone()))?;
        Ok(Self {
            registry,
            handler_errors,
        })
    }

    pub fn count(&self, error: HandlerError) -> u64 {
        self.handler_errors.with_label_values(&[error.as_str()]).get()
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn render(&self) -> Result<String, MetricsError> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}

impl MetricsSink for PrometheusMetrics {
    fn increment(&self, error: HandlerError) {
        self.handler_errors
            .with_label_values(&[error.as_str()])
            .inc();
    }
}
