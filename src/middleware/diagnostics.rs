//! Error diagnostics middleware.
//!
//! Outside production, error envelopes gain a `stack` field with the debug
//! rendering of the failure.

use crate::config::Environment;
use crate::errors::ErrorReport;
use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub async fn error_diagnostics(
    State(environment): State<Environment>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let response = next.run(request).await;

    if environment.is_production() {
        return response;
    }

    let Some(report) = response.extensions().get::<ErrorReport>().cloned() else {
        return response;
    };

    let (mut parts, _) = response.into_parts();
    parts.headers.remove(axum::http::header::CONTENT_LENGTH);

    let body = Json(json!({
        "success": false,
        "error": report.message,
        "stack": report.diagnostic,
    }))
    .into_response()
    .into_body();

    Response::from_parts(parts, body)
}
