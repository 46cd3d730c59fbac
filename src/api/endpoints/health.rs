//! Liveness endpoint.

use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub version: &'static str,
}

/// `GET /health`
pub async fn check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "UP",
        message: "API is running",
        version: crate::config::APP_VERSION,
    })
}
