//! Axum-based HTTP surface of the gateway.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/ping` | Liveness check, always `200 OK`. |
//! | `GET`  | `/metrics` | Prometheus text exposition. |
//! | `GET`  | `/debug/config`, `/debug/encoders` | Effective settings as JSON, only with `debug = true`. |
//! | `GET`  | everything else, or `<prefix>/*` when scoped | The image handler. |
//!
//! Every request passes through the tracing layer and the panic
//! [`recovery`] wrapper.

mod debug;
mod handler;
pub mod recovery;

use crate::config::{GatewayConfig, SourceConfig};
use crate::manipulator::{Manipulator, NativeManipulator};
use crate::metrics::{MetricsError, MetricsSink, PrometheusMetrics};
use crate::storage::{self, BackendKind, Storage, StorageError};
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Router, middleware};
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use handler::serve_image;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("storage setup failed: {0}")]
    Storage(#[from] StorageError),
    #[error("metrics setup failed: {0}")]
    Metrics(#[from] MetricsError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared application state
// ─────────────────────────────────────────────────────────────────────────────

/// Dependencies injected into the image handler.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub manipulator: Arc<dyn Manipulator>,
    pub metrics: Arc<dyn MetricsSink>,
    /// `max-age` for the `Cache-Control` header.
    pub cache_time: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Routing
// ─────────────────────────────────────────────────────────────────────────────

/// Which paths the image handler owns. Decided once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Only paths below this prefix (no trailing slash).
    Scoped(String),
    /// Every GET path not claimed by another route.
    CatchAll,
}

impl RouteDecision {
    pub fn from_source(source: &SourceConfig) -> Self {
        let scoped_kind =
            BackendKind::parse(&source.kind).is_some_and(BackendKind::supports_prefix_scope);
        let prefix = source.path_prefix.trim_end_matches('/');
        if scoped_kind && !prefix.is_empty() {
            RouteDecision::Scoped(prefix.to_string())
        } else {
            RouteDecision::CatchAll
        }
    }
}

/// Router holding only the image handler routes.
pub fn image_routes(state: AppState, decision: &RouteDecision) -> Router {
    let router = match decision {
        RouteDecision::Scoped(prefix) => {
            Router::new().route(&format!("{prefix}/{{*path}}"), get(serve_image))
        }
        RouteDecision::CatchAll => Router::new()
            .route("/", get(serve_image))
            .route("/{*path}", get(serve_image)),
    };
    router.with_state(state)
}

/// Assemble the full application: image routes, `/ping`, `/metrics`, the
/// optional debug routes, tracing and panic recovery.
pub fn build_router(
    state: AppState,
    decision: &RouteDecision,
    exporter: Arc<PrometheusMetrics>,
    debug_routes: Option<Router>,
) -> Router {
    let mut router = image_routes(state, decision)
        .route("/ping", get(ping))
        .merge(
            Router::new()
                .route("/metrics", get(render_metrics))
                .with_state(exporter),
        );
    if let Some(debug_routes) = debug_routes {
        router = router.merge(debug_routes);
    }
    router
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(recovery::recover))
}

/// Wire every component described by `config` into a ready router.
pub fn from_config(config: &GatewayConfig) -> Result<Router, ServerError> {
    let storage = storage::from_config(&config.source)?;
    let encoders = Arc::new(config.build_encoders());
    let manipulator = NativeManipulator::new(encoders.clone())
        .with_defaults(config.default_params())
        .with_limits(config.output_limits());
    let metrics = Arc::new(PrometheusMetrics::new()?);

    let state = AppState {
        storage,
        manipulator: Arc::new(manipulator),
        metrics: metrics.clone(),
        cache_time: config.cache_time,
    };
    let decision = RouteDecision::from_source(&config.source);
    info!(routing = ?decision, "image routes decided");

    let debug_routes = config
        .debug
        .then(|| debug::routes(config, encoders.as_ref()));
    Ok(build_router(state, &decision, metrics, debug_routes))
}

/// Bind to `0.0.0.0:{port}` and serve until interrupted.
pub async fn serve(config: GatewayConfig) -> Result<(), ServerError> {
    let app = from_config(&config)?;
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "pixgate listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("pixgate stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// `GET /ping`: liveness probe.
async fn ping() -> &'static str {
    "pong"
}

/// `GET /metrics`: Prometheus text format.
async fn render_metrics(State(exporter): State<Arc<PrometheusMetrics>>) -> Response {
    match exporter.render() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            text,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
