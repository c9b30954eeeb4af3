//! Storage facade: fetch source bytes by request path.
//!
//! | Backend kind | Implementation |
//! |---|---|
//! | `s3` (object store) | [`HttpStorage`] against the bucket endpoint |
//! | `cloudfront` (CDN origin) | [`HttpStorage`] against the distribution |
//! | `webfolder` | [`HttpStorage`] against any HTTP origin |
//! | `local` | [`LocalStorage`] under a root directory |
//!
//! A fetch either yields the bytes or a [`StorageError`] carrying the HTTP
//! status the gateway forwards to the client. Retries, if any, belong to the
//! backend; the gateway never retries.
//!
//! Cancellation follows the future: when the client goes away the handler
//! future is dropped, and with it any in-flight backend I/O.

pub mod http;
pub mod local;

use crate::config::SourceConfig;
use async_trait::async_trait;
use axum::http::StatusCode;
use bytes::Bytes;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use thiserror::Error;

pub use http::HttpStorage;
pub use local::LocalStorage;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("access denied: {0}")]
    Forbidden(String),
    #[error("invalid object path: {0}")]
    InvalidPath(String),
    #[error("origin responded with {status}")]
    Upstream { status: StatusCode },
    #[error("origin timed out: {0}")]
    Timeout(String),
    #[error("origin request failed: {0}")]
    Transport(String),
    #[error("unknown backend kind {0:?}")]
    UnknownBackend(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Status code forwarded to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            StorageError::NotFound(_) | StorageError::InvalidPath(_) => StatusCode::NOT_FOUND,
            StorageError::Forbidden(_) => StatusCode::FORBIDDEN,
            StorageError::Upstream { status } => *status,
            StorageError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            StorageError::Transport(_) => StatusCode::BAD_GATEWAY,
            StorageError::UnknownBackend(_) | StorageError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Outcome of one fetch. The bytes exist only on success.
pub type FetchResult = Result<Bytes, StorageError>;

#[async_trait]
pub trait Storage: Send + Sync {
    async fn fetch(&self, path: &str) -> FetchResult;
}

static OBJECT_STORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^s3$").expect("static pattern"));
static CDN_ORIGIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^cloudfront$").expect("static pattern"));
static WEB_FOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^web_?folder$").expect("static pattern"));
static LOCAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(local|fs)$").expect("static pattern"));

/// Which backend family a configured `source.kind` names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    ObjectStore,
    CdnOrigin,
    WebFolder,
    Local,
}

impl BackendKind {
    pub fn parse(kind: &str) -> Option<Self> {
        if OBJECT_STORE.is_match(kind) {
            Some(BackendKind::ObjectStore)
        } else if CDN_ORIGIN.is_match(kind) {
            Some(BackendKind::CdnOrigin)
        } else if WEB_FOLDER.is_match(kind) {
            Some(BackendKind::WebFolder)
        } else if LOCAL.is_match(kind) {
            Some(BackendKind::Local)
        } else {
            None
        }
    }

    /// Object-store and CDN-origin backends may scope the gateway to a path
    /// prefix.
    pub fn supports_prefix_scope(self) -> bool {
        matches!(self, BackendKind::ObjectStore | BackendKind::CdnOrigin)
    }

    pub fn is_http(self) -> bool {
        !matches!(self, BackendKind::Local)
    }
}

/// Strip the configured prefix from a request path, keeping a leading `/`.
pub(crate) fn backend_path<'a>(path: &'a str, prefix: &str) -> &'a str {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.is_empty() {
        return path;
    }
    match path.strip_prefix(trimmed) {
        Some(rest) if rest.starts_with('/') => rest,
        _ => path,
    }
}

/// Build the storage backend for a validated source section.
pub fn from_config(source: &SourceConfig) -> Result<Arc<dyn Storage>, StorageError> {
    let kind = BackendKind::parse(&source.kind)
        .ok_or_else(|| StorageError::UnknownBackend(source.kind.clone()))?;
    let storage: Arc<dyn Storage> = if kind.is_http() {
        Arc::new(HttpStorage::new(
            source.base_url.clone().unwrap_or_default(),
            source.path_prefix.clone(),
            Duration::from_millis(source.timeout_ms),
        )?)
    } else {
        Arc::new(LocalStorage::new(
            source.root.clone().unwrap_or_default(),
            source.path_prefix.clone(),
        ))
    };
    tracing::info!(kind = ?kind, "storage backend ready");
    Ok(storage)
}
