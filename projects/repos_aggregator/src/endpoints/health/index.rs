use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

/// Axum handler: GET /health
pub async fn handler() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}
