//! # pixgate
//!
//! An on-the-fly image delivery gateway. Every GET names an image in a
//! storage backend; the gateway fetches it, optionally transforms it
//! according to the query string, re-encodes it and answers with
//! CDN-friendly caching headers.
//!
//! # Request Pipeline
//!
//! ```text
//! GET /albums/a.jpg?w=300&fit=crop
//!   1. Fetch      storage backend   →  source bytes     (error: backend status)
//!   2. Transform  manipulator       →  decoded + edited (skipped without params)
//!   3. Encode     encoder registry  →  output bytes     (format-preserving)
//!   4. Respond    Cache-Control, Vary: Accept, Content-Length
//! ```
//!
//! A source the manipulator cannot decode is served untouched. Any other
//! transform failure is a 422. A panic anywhere in the pipeline becomes a 500
//! for that request only.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `pixgate.toml` loading, merging over stock defaults, and validation |
//! | [`storage`] | The `Storage` trait plus HTTP-origin and local-directory backends |
//! | [`manipulator`] | The `Manipulator` trait, `ParameterMap`, and the `image`-based engine |
//! | [`encoder`] | Encoder variants, the registry that picks one, and size-adaptive JPEG quality |
//! | [`metrics`] | Handler error counters exported in Prometheus format |
//! | [`server`] | Routing, the image handler, panic recovery, and debug routes |
//! | [`output`] | CLI output for the `check` command |
//!
//! # Design Decisions
//!
//! ## Injected, Immutable Encoders
//!
//! The encoder registry is built once from configuration and shared behind an
//! `Arc`. Nothing mutates it after startup, so request workers use it
//! concurrently without locks, and tests can substitute their own.
//!
//! ## Ordered Compression Tiers
//!
//! Size-adaptive JPEG quality walks an ascending tier table and takes the
//! first tier whose threshold the size hint does not exceed. The same input
//! size always yields the same quality.
//!
//! ## Buffered Responses
//!
//! Bodies are fully in memory before the response starts, so
//! `Content-Length` is always the exact number of bytes sent.
//!
//! ## CPU Work Off the Reactor
//!
//! Decoding, resizing and encoding run on Tokio's blocking pool. A panic
//! there is re-raised on the request task, where the recovery middleware
//! turns it into a 500.

pub mod config;
pub mod encoder;
pub mod manipulator;
pub mod metrics;
pub mod output;
pub mod server;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_helpers;
