//! Error handling for the cover HTTP layer

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use cover_upstream::UpstreamError;

/// Application error types that map to HTTP responses
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed caller input, caught before any backend is called.
    #[error("validation error: {message}")]
    Validation {
        details: Vec<serde_json::Value>,
        code: String,
        message: String,
    },

    #[error("not found: {message}")]
    NotFound { message: String, code: String },

    /// A backend call failed; the category decides the client-facing status.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// A secondary lookup failed while composing a response. Its 4xx says
    /// nothing about the caller's request, so it is never relayed.
    #[error("lookup failed: {0}")]
    Lookup(UpstreamError),

    /// The request as a whole outlived its deadline.
    #[error("request did not complete within {timeout_ms} ms")]
    DeadlineExceeded { timeout_ms: u64 },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Create a validation error
    pub fn validation(details: Vec<serde_json::Value>, message: impl Into<String>) -> Self {
        Self::Validation {
            details,
            code: "validation_error".to_string(),
            message: message.into(),
        }
    }

    /// Validation error about a single field
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::validation(vec![json!({"field": field, "error": message})], message)
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            code: "not_found".to_string(),
        }
    }

    /// HTTP status and error code this error is reported with
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Validation { .. } => (StatusCode::BAD_REQUEST, "validation_error"),
            AppError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Upstream(err) => upstream_status(err),
            AppError::Lookup(UpstreamError::Status { .. }) => {
                (StatusCode::BAD_GATEWAY, "upstream_error")
            }
            AppError::Lookup(err) => upstream_status(err),
            AppError::DeadlineExceeded { .. } => (StatusCode::GATEWAY_TIMEOUT, "deadline_exceeded"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

/// Backend rejections (4xx) keep their status; failures on the backend side
/// surface as 502, a backend that never answered as 504.
fn upstream_status(err: &UpstreamError) -> (StatusCode, &'static str) {
    match err {
        UpstreamError::Status { status, .. } if status.is_client_error() => {
            (*status, "upstream_rejected")
        }
        UpstreamError::Status { .. } => (StatusCode::BAD_GATEWAY, "upstream_error"),
        UpstreamError::Unreachable { .. } => (StatusCode::BAD_GATEWAY, "upstream_unavailable"),
        UpstreamError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "upstream_timeout"),
        UpstreamError::Decode { .. } => (StatusCode::BAD_GATEWAY, "upstream_invalid_response"),
        UpstreamError::Encode { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation(
            vec![json!({"field": "body", "error": rejection.body_text()})],
            "request body is not valid JSON for this route",
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let error_id = Uuid::new_v4();
        let timestamp = OffsetDateTime::now_utc().to_string();
        let (status, error_code) = self.status_and_code();

        let (message, details) = match self {
            AppError::Validation {
                details, message, ..
            } => (message, details),
            AppError::NotFound { message, .. } => (message, Vec::new()),
            AppError::Upstream(err) | AppError::Lookup(err) => {
                let details = vec![json!({
                    "service": err.service(),
                    "path": err.path(),
                    "status": err.status().map(|s| s.as_u16()),
                    "body": err.body(),
                })];
                (err.to_string(), details)
            }
            deadline @ AppError::DeadlineExceeded { .. } => (deadline.to_string(), Vec::new()),
            AppError::Internal(e) => (e.to_string(), Vec::new()),
        };

        if status.is_server_error() {
            tracing::error!(
                error_id = %error_id,
                error_code = %error_code,
                status_code = %status.as_u16(),
                message = %message,
                "Request error"
            );
        } else {
            tracing::warn!(
                error_id = %error_id,
                error_code = %error_code,
                status_code = %status.as_u16(),
                "Request rejected"
            );
        }

        // In production, we might want to hide internal error details
        let message = if cfg!(not(debug_assertions)) && status == StatusCode::INTERNAL_SERVER_ERROR
        {
            "An internal server error occurred".to_string()
        } else {
            message
        };

        let error_response = json!({
            "error": {
                "code": error_code,
                "message": message,
                "details": details,
                "trace_id": error_id.to_string(),
                "timestamp": timestamp
            }
        });

        (status, Json(error_response)).into_response()
    }
}
