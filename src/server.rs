//! Operational HTTP surface.

use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

/// Routes served next to the poll loops.
pub fn health_routes() -> Router {
    Router::new().route("/health", get(health))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "direct-reply",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
