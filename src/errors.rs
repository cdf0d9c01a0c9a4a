//! API Errors
//! Mission: Translate every failure into one status code and one JSON envelope

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use rusqlite::ErrorCode;
use serde_json::json;
use std::time::Duration;
use tracing::{error, warn};

/// Errors surfaced to HTTP clients
#[derive(Debug)]
pub enum ApiError {
    /// One or more field-level validation messages
    Validation(Vec<String>),
    BadRequest(String),
    /// Unique index violation, with a field-specific message
    DuplicateKey(String),
    Conflict(String),
    InvalidCredentials(String),
    Unauthorized(String),
    InvalidOrExpiredToken,
    Forbidden(String),
    NotFound(String),
    RateLimited { retry_after: Duration },
    ServiceUnavailable(String),
    Internal(anyhow::Error),
}

/// Carried in response extensions so the diagnostics layer can re-render
/// the envelope with a trace outside production.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub message: String,
    pub diagnostic: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) | ApiError::DuplicateKey(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InvalidCredentials(_) | ApiError::Unauthorized(_) => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::InvalidOrExpiredToken => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiError::Validation(messages) => messages.join(", "),
            ApiError::BadRequest(m)
            | ApiError::DuplicateKey(m)
            | ApiError::Conflict(m)
            | ApiError::InvalidCredentials(m)
            | ApiError::Unauthorized(m)
            | ApiError::Forbidden(m)
            | ApiError::NotFound(m)
            | ApiError::ServiceUnavailable(m) => m.clone(),
            ApiError::InvalidOrExpiredToken => "Invalid token".to_string(),
            ApiError::RateLimited { .. } => {
                "Too many requests from this IP, please try again later.".to_string()
            }
            ApiError::Internal(_) => "Server Error".to_string(),
        }
    }

    pub fn unauthorized() -> Self {
        ApiError::Unauthorized("Not authorized to access this route".to_string())
    }

    pub fn invalid_credentials() -> Self {
        ApiError::InvalidCredentials("Invalid credentials".to_string())
    }

    /// Malformed ids behave like missing documents
    pub fn resource_not_found() -> Self {
        ApiError::NotFound("Resource not found".to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();

        let diagnostic = match &self {
            ApiError::Internal(e) => {
                error!("Unhandled error: {:?}", e);
                format!("{:?}", e)
            }
            other => format!("{:?}", other),
        };

        let mut response = (
            status,
            Json(json!({
                "success": false,
                "error": message,
            })),
        )
            .into_response();

        if let ApiError::RateLimited { retry_after } = &self {
            if let Ok(value) = HeaderValue::from_str(&retry_after.as_secs().to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
            .extensions_mut()
            .insert(ErrorReport { message, diagnostic });
        response
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match duplicate_field(&err) {
            Some(field) => {
                warn!("Duplicate value rejected for field {}", field);
                ApiError::DuplicateKey(format!("{} already exists", capitalize(&field)))
            }
            None => ApiError::Internal(err),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// Name of the column behind a SQLite UNIQUE violation, if that is what `err` is
pub fn duplicate_field(err: &anyhow::Error) -> Option<String> {
    let sqlite = err.chain().find_map(|e| e.downcast_ref::<rusqlite::Error>())?;

    match sqlite {
        rusqlite::Error::SqliteFailure(code, Some(msg))
            if code.code == ErrorCode::ConstraintViolation =>
        {
            // "UNIQUE constraint failed: users.email"
            msg.strip_prefix("UNIQUE constraint failed: ")
                .and_then(|cols| cols.split(',').next())
                .and_then(|col| col.trim().rsplit('.').next())
                .map(|col| col.to_string())
        }
        _ => None,
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
