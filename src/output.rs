//! CLI output formatting for the `check` command.
//!
//! # Output Format
//!
//! ```text
//! Listen
//!     port 3000
//!     cache max-age 31536000s
//! Source
//!     s3 (object store) → https://bucket.example.com
//!     Routes: /img/* only
//! Encoders
//!     jpeg quality 75
//!     ≤ 500 KiB → 75
//!     png compression best
//! Limits
//!     max side 8192 px
//!     max pixels 40000000
//! Processor defaults
//!     auto=compress
//! ```
//!
//! [`format_check_output`] is pure and returns the lines;
//! [`print_check_output`] writes them to stdout.

use crate::config::GatewayConfig;
use crate::encoder::{KIB, MIB};
use crate::server::RouteDecision;
use crate::storage::BackendKind;

fn indent(line: impl AsRef<str>) -> String {
    format!("    {}", line.as_ref())
}

fn human_bytes(bytes: u64) -> String {
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{} MiB", bytes / MIB)
    } else if bytes >= KIB && bytes % KIB == 0 {
        format!("{} KiB", bytes / KIB)
    } else {
        format!("{bytes} B")
    }
}

fn kind_label(kind: Option<BackendKind>) -> &'static str {
    match kind {
        Some(BackendKind::ObjectStore) => "object store",
        Some(BackendKind::CdnOrigin) => "CDN origin",
        Some(BackendKind::WebFolder) => "web folder",
        Some(BackendKind::Local) => "local directory",
        None => "unknown",
    }
}

pub fn format_check_output(config: &GatewayConfig) -> Vec<String> {
    let mut lines = vec!["Listen".to_string()];
    lines.push(indent(format!("port {}", config.port)));
    lines.push(indent(format!("cache max-age {}s", config.cache_time)));
    if config.debug {
        lines.push(indent("debug routes enabled"));
    }

    let source = &config.source;
    let kind = BackendKind::parse(&source.kind);
    let location = match kind {
        Some(BackendKind::Local) => source.root.clone().unwrap_or_default(),
        _ => source.base_url.clone().unwrap_or_default(),
    };
    lines.push("Source".to_string());
    lines.push(indent(format!(
        "{} ({}) → {}",
        source.kind,
        kind_label(kind),
        location
    )));
    match RouteDecision::from_source(source) {
        RouteDecision::Scoped(prefix) => lines.push(indent(format!("Routes: {prefix}/* only"))),
        RouteDecision::CatchAll => lines.push(indent("Routes: catch-all")),
    }

    let encoders = config.build_encoders().describe();
    lines.push("Encoders".to_string());
    lines.push(indent(format!("jpeg quality {}", encoders.jpeg_quality)));
    for (threshold, quality) in &encoders.jpeg_tiers {
        lines.push(indent(format!("≤ {} → {quality}", human_bytes(*threshold))));
    }
    lines.push(indent(format!("png compression {}", encoders.png_compression)));

    let limits = config.output_limits();
    lines.push("Limits".to_string());
    lines.push(indent(format!("max side {} px", limits.max_dimension)));
    lines.push(indent(format!("max pixels {}", limits.max_pixels)));

    let defaults = config.default_params();
    if !defaults.is_empty() {
        lines.push("Processor defaults".to_string());
        for (key, value) in defaults.iter() {
            lines.push(indent(format!("{key}={value}")));
        }
    }
    lines
}

pub fn print_check_output(config: &GatewayConfig) {
    for line in format_check_output(config) {
        println!("{line}");
    }
}
