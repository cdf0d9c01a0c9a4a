//! Request logging middleware.
//!
//! Logs every API request with method, path, status code, latency and client IP.

use super::client_ip;
use axum::{body::Body, http::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{info, warn, Instrument};

/// Path excluded from logging so health checks stay quiet
pub const HEALTH_PATH: &str = "/api/health";

/// INFO for anything below 500, WARN for 5xx.
pub async fn request_logging(request: Request<Body>, next: Next) -> Response {
    let path = request.uri().path().to_string();
    if path == HEALTH_PATH {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let ip = client_ip(&request);
    let start = Instant::now();

    let span = tracing::info_span!(
        "http_request",
        method = %method,
        path = %path,
        client_ip = %ip,
    );

    let response = next.run(request).instrument(span).await;

    let status = response.status().as_u16();
    let latency_ms = start.elapsed().as_millis() as u64;

    if response.status().is_server_error() {
        warn!(
            method = %method,
            path = %path,
            status,
            latency_ms,
            client_ip = %ip,
            "Request failed (5xx)"
        );
    } else {
        info!(
            method = %method,
            path = %path,
            status,
            latency_ms,
            client_ip = %ip,
            "Request completed"
        );
    }

    response
}
