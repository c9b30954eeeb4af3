//! Gateway configuration module.
//!
//! Handles loading, validating, and merging a `pixgate.toml` file. Stock
//! defaults are the base layer; a user file only needs the keys it wants to
//! override.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! port = 3000               # TCP port to listen on
//! debug = false             # Register /debug/* routes
//! cache_time = 31536000     # Cache-Control max-age in seconds
//!
//! [source]
//! kind = "webfolder"        # s3 | cloudfront | webfolder | local
//! path_prefix = ""          # Scope s3/cloudfront gateways to this prefix
//! base_url = "http://127.0.0.1:8080"  # Origin for HTTP kinds
//! # root = "/srv/images"    # Directory for the local kind
//! timeout_ms = 10000
//!
//! [encoders]
//! jpeg_quality = 75         # 1-100; 100 disables PNG → JPEG substitution
//! png_compression = "best"  # fast | default | best
//!
//! [[encoders.tiers]]        # size-adaptive JPEG quality, ascending
//! threshold = 512000
//! quality = 75
//!
//! [processor]
//! max_dimension = 8192      # longest side of a resized image
//! max_pixels = 40000000     # largest width * height of a resized image
//!
//! [processor.defaults]      # parameters applied to every request
//! # auto = "compress"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::encoder::{
    CompressionLevel, CompressionTier, CompressionTiers, Encoders, JpegEncoder, PngEncoder,
    Quality, default_tiers,
};
use crate::manipulator::{OutputLimits, ParameterMap};
use crate::storage::BackendKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Gateway configuration loaded from `pixgate.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    /// TCP port to listen on.
    pub port: u16,
    /// Enables the `/debug/*` routes.
    pub debug: bool,
    /// `max-age` in seconds for the `Cache-Control` response header.
    pub cache_time: u64,
    /// Storage backend selection.
    pub source: SourceConfig,
    /// Encoder options.
    pub encoders: EncodersConfig,
    /// Manipulator options.
    pub processor: ProcessorConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            debug: false,
            cache_time: 31_536_000,
            source: SourceConfig::default(),
            encoders: EncodersConfig::default(),
            processor: ProcessorConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let kind = BackendKind::parse(&self.source.kind).ok_or_else(|| {
            ConfigError::Validation(format!("source.kind {:?} is not supported", self.source.kind))
        })?;
        if kind.is_http() && self.source.base_url.as_deref().is_none_or(str::is_empty) {
            return Err(ConfigError::Validation(
                "source.base_url is required for HTTP backends".into(),
            ));
        }
        if !kind.is_http() && self.source.root.as_deref().is_none_or(str::is_empty) {
            return Err(ConfigError::Validation(
                "source.root is required for the local backend".into(),
            ));
        }
        if !self.source.path_prefix.is_empty() && !self.source.path_prefix.starts_with('/') {
            return Err(ConfigError::Validation(
                "source.path_prefix must start with '/'".into(),
            ));
        }
        if self.source.path_prefix.contains(['{', '}', '*']) {
            return Err(ConfigError::Validation(
                "source.path_prefix must not contain '{', '}' or '*'".into(),
            ));
        }
        if !(1..=100).contains(&self.encoders.jpeg_quality) {
            return Err(ConfigError::Validation(
                "encoders.jpeg_quality must be 1-100".into(),
            ));
        }
        let mut previous: Option<&CompressionTier> = None;
        for tier in &self.encoders.tiers {
            if !(1..=100).contains(&tier.quality.value()) {
                return Err(ConfigError::Validation(
                    "encoders.tiers quality must be 1-100".into(),
                ));
            }
            if let Some(prev) = previous {
                if tier.threshold <= prev.threshold {
                    return Err(ConfigError::Validation(
                        "encoders.tiers thresholds must be strictly ascending".into(),
                    ));
                }
                if tier.quality > prev.quality {
                    return Err(ConfigError::Validation(
                        "encoders.tiers quality must not increase with threshold".into(),
                    ));
                }
            }
            previous = Some(tier);
        }
        if self.processor.max_dimension == 0 || self.processor.max_pixels == 0 {
            return Err(ConfigError::Validation(
                "processor.max_dimension and processor.max_pixels must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Build the encoder registry described by the `[encoders]` section.
    pub fn build_encoders(&self) -> Encoders {
        let jpeg = JpegEncoder::new(Quality::new(self.encoders.jpeg_quality))
            .with_tiers(CompressionTiers::new(self.encoders.tiers.clone()));
        Encoders::new()
            .with_jpeg(jpeg)
            .with_png(PngEncoder::new(self.encoders.png_compression))
    }

    /// Output size limits for the manipulator.
    pub fn output_limits(&self) -> OutputLimits {
        OutputLimits {
            max_dimension: self.processor.max_dimension,
            max_pixels: self.processor.max_pixels,
        }
    }

    /// Default manipulator parameters, with empty values dropped.
    pub fn default_params(&self) -> ParameterMap {
        ParameterMap::from_query_pairs(
            self.processor
                .defaults
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        )
    }
}

/// Storage backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    /// Backend kind: `s3`, `cloudfront`, `webfolder` or `local`.
    pub kind: String,
    /// Path prefix the gateway is scoped to (object store and CDN kinds only).
    pub path_prefix: String,
    /// Origin base URL for HTTP kinds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Root directory for the local kind.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
    /// Per-fetch timeout for HTTP kinds.
    pub timeout_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: "webfolder".to_string(),
            path_prefix: String::new(),
            base_url: Some("http://127.0.0.1:8080".to_string()),
            root: None,
            timeout_ms: 10_000,
        }
    }
}

/// Encoder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncodersConfig {
    /// Default JPEG quality (1 = worst, 100 = best).
    pub jpeg_quality: u8,
    /// PNG deflate effort.
    pub png_compression: CompressionLevel,
    /// Size-adaptive JPEG tiers, ascending by threshold.
    pub tiers: Vec<CompressionTier>,
}

impl Default for EncodersConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: Quality::default().value(),
            png_compression: CompressionLevel::default(),
            tiers: default_tiers(),
        }
    }
}

/// Manipulator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessorConfig {
    /// Longest side a resize may produce, in pixels.
    pub max_dimension: u32,
    /// Largest `width * height` a resize may produce.
    pub max_pixels: u64,
    /// Parameters applied to every request unless the request overrides them.
    pub defaults: std::collections::BTreeMap<String, String>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        let limits = OutputLimits::default();
        Self {
            max_dimension: limits.max_dimension,
            max_pixels: limits.max_pixels,
            defaults: Default::default(),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(GatewayConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto the stock defaults, then deserialize and
/// validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<GatewayConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: GatewayConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from a TOML file, or the stock defaults when `path` is `None`.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let overlay = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            Some(toml::from_str::<toml::Value>(&content)?)
        }
        None => None,
    };
    resolve_config(overlay)
}

/// Returns a fully-commented stock `pixgate.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# pixgate configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# TCP port to listen on.
port = 3000

# Register the /debug/config and /debug/encoders routes.
debug = false

# max-age (seconds) sent in Cache-Control on every image response.
cache_time = 31536000

# ---------------------------------------------------------------------------
# Storage backend
# ---------------------------------------------------------------------------
[source]
# s3 | cloudfront | webfolder | local
kind = "webfolder"

# For s3 and cloudfront, a non-empty prefix scopes the image handler to
# paths below it; everything else answers 404. Other kinds serve every path.
path_prefix = ""

# Origin base URL (s3, cloudfront, webfolder).
base_url = "http://127.0.0.1:8080"

# Root directory (local).
# root = "/srv/images"

# Per-fetch timeout in milliseconds.
timeout_ms = 10000

# ---------------------------------------------------------------------------
# Encoders
# ---------------------------------------------------------------------------
[encoders]
# JPEG quality (1 = worst, 100 = best). Below 100, fully opaque PNGs are
# re-encoded as JPEG.
jpeg_quality = 75

# PNG compression effort: fast | default | best
png_compression = "best"

# Size-adaptive JPEG quality, used with auto=compress. The first tier whose
# threshold (bytes) is not exceeded wins; above the last tier jpeg_quality
# applies. Thresholds must ascend and qualities must not increase.
[[encoders.tiers]]
threshold = 512000
quality = 75

[[encoders.tiers]]
threshold = 1048576
quality = 75

[[encoders.tiers]]
threshold = 5242880
quality = 75

[[encoders.tiers]]
threshold = 10485760
quality = 75

[[encoders.tiers]]
threshold = 104857600
quality = 75

[[encoders.tiers]]
threshold = 1048576000
quality = 75

# ---------------------------------------------------------------------------
# Processor
# ---------------------------------------------------------------------------
[processor]
# Largest image a resize may produce. Requests over either limit, including
# the intermediate size used by fit=crop, answer 422.
max_dimension = 8192
max_pixels = 40000000

[processor.defaults]
# Parameters applied to every request unless the query overrides them.
# Setting any default also disables the untouched pass-through path.
# auto = "compress"
"##
}
