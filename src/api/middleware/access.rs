//! Access logging middleware.
//!
//! Tags every request with an id (`x-request-id`, generated when absent)
//! and logs method, path, status and latency once the handler answers.

use std::time::Instant;

use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

use crate::api::types::RequestId;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub async fn log_access(mut req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    req.extensions_mut().insert(RequestId(request_id.clone()));

    let started = Instant::now();
    let mut response = next.run(req).await;
    let status = response.status().as_u16();
    let latency_ms = started.elapsed().as_millis() as u64;

    if response.status().is_server_error() {
        tracing::error!(%method, %path, status, latency_ms, %request_id, "request failed");
    } else {
        tracing::info!(%method, %path, status, latency_ms, %request_id, "request");
    }

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
