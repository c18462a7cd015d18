//! Liveness and build information.

use axum::{http::StatusCode, response::IntoResponse, Json};

/// Liveness check: the process is running.
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "alive" })))
}

pub async fn version() -> impl IntoResponse {
    Json(serde_json::json!({ "buildVersion": env!("CARGO_PKG_VERSION") }))
}
