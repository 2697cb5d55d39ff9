//! Uniform failure type for backend calls.

use std::fmt;

use axum::http::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Identity of a backend service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// System of record: users, auth, ownership, borrows, appointments.
    Core,
    /// Book catalogue.
    Index,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Index => "index",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single call to a backend.
///
/// Every variant names the backend and the path that was called, so a
/// failed fan-out lookup can be traced back to the item that caused it.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The backend answered with a non-2xx status.
    #[error("{service} answered {path} with status {status}")]
    Status {
        service: Backend,
        path: String,
        status: StatusCode,
        /// Decoded response body; raw text becomes a JSON string.
        body: serde_json::Value,
    },

    /// Connection refused, DNS failure, reset, or any other transport error.
    #[error("{service} is unreachable at {path}: {message}")]
    Unreachable {
        service: Backend,
        path: String,
        message: String,
    },

    /// The per-call deadline elapsed before the backend answered.
    #[error("{service} did not answer {path} in time")]
    Timeout { service: Backend, path: String },

    /// A 2xx answer whose body is not the expected JSON.
    #[error("{service} sent an undecodable body for {path}: {message}")]
    Decode {
        service: Backend,
        path: String,
        message: String,
    },

    /// The outbound request could not be built.
    #[error("request to {service} at {path} could not be encoded: {message}")]
    Encode {
        service: Backend,
        path: String,
        message: String,
    },
}

impl UpstreamError {
    /// Backend the failed call was addressed to.
    pub fn service(&self) -> Backend {
        match self {
            Self::Status { service, .. }
            | Self::Unreachable { service, .. }
            | Self::Timeout { service, .. }
            | Self::Decode { service, .. }
            | Self::Encode { service, .. } => *service,
        }
    }

    /// Path of the failed call, relative to the backend base URL.
    pub fn path(&self) -> &str {
        match self {
            Self::Status { path, .. }
            | Self::Unreachable { path, .. }
            | Self::Timeout { path, .. }
            | Self::Decode { path, .. }
            | Self::Encode { path, .. } => path,
        }
    }

    /// Status the backend answered with, if it answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Payload describing the failure: the backend's own body when it
    /// answered, the error message otherwise.
    pub fn body(&self) -> serde_json::Value {
        match self {
            Self::Status { body, .. } => body.clone(),
            other => serde_json::Value::String(other.to_string()),
        }
    }

    /// Whether the backend could not be reached or did not answer.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unreachable { .. } | Self::Timeout { .. })
    }
}

/// Result type for backend calls.
pub type UpstreamResult<T> = Result<T, UpstreamError>;
