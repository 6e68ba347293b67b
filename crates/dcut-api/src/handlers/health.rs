//! Health check handlers.

use axum::Json;
use serde_json::{json, Value};

/// Liveness probe.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "dcut-api",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness probe.
pub async fn ready() -> Json<Value> {
    Json(json!({ "status": "ready" }))
}
