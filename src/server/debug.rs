//! Introspection routes, registered only when `debug = true`.
//!
//! Both payloads are rendered once at startup; the settings they describe
//! never change while the server runs.

use crate::config::GatewayConfig;
use crate::encoder::Encoders;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

pub(super) fn routes(config: &GatewayConfig, encoders: &Encoders) -> Router {
    let config_json = serde_json::to_value(config)
        .unwrap_or_else(|e| json!({ "error": format!("config not serializable: {e}") }));
    let encoders_json = serde_json::to_value(encoders.describe())
        .unwrap_or_else(|e| json!({ "error": format!("encoders not serializable: {e}") }));

    Router::new()
        .route("/debug/config", get(move || respond(config_json.clone())))
        .route("/debug/encoders", get(move || respond(encoders_json.clone())))
}

async fn respond(payload: Value) -> Json<Value> {
    Json(payload)
}
