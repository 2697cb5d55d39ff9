//! Session credential relayed from the inbound request to the backends.
//!
//! The gateway never decodes or validates the cookie: Core owns
//! authentication and decides what an absent or stale session means.

use std::convert::Infallible;
use std::fmt;

use axum::extract::FromRequestParts;
use axum::http::header::{HeaderMap, HeaderValue, COOKIE};
use axum::http::request::Parts;

/// Opaque credential scoped to one inbound request.
#[derive(Clone, Default, PartialEq, Eq)]
pub enum SessionCredential {
    /// The caller sent no cookie; no header is added upstream.
    #[default]
    Anonymous,
    /// Raw `Cookie` header value, forwarded byte for byte.
    Cookie(HeaderValue),
}

impl SessionCredential {
    /// Capture the credential from inbound request headers.
    ///
    /// Several `Cookie` fields (as HTTP/2 clients may send) are folded into
    /// one value joined by `"; "`, the form HTTP/1.1 backends expect.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut values = headers.get_all(COOKIE).iter();
        let Some(first) = values.next() else {
            return Self::Anonymous;
        };

        let rest: Vec<&HeaderValue> = values.collect();
        if rest.is_empty() {
            return Self::Cookie(first.clone());
        }

        let mut joined = first.as_bytes().to_vec();
        for value in rest {
            joined.extend_from_slice(b"; ");
            joined.extend_from_slice(value.as_bytes());
        }
        // Joining valid header values with "; " keeps the value valid.
        match HeaderValue::from_bytes(&joined) {
            Ok(value) => Self::Cookie(value),
            Err(_) => Self::Cookie(first.clone()),
        }
    }

    /// Whether the caller presented a cookie.
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Cookie(_))
    }

    /// Headers to attach to every upstream call: `{Cookie: value}` when a
    /// credential is present, nothing otherwise.
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Self::Cookie(value) = self {
            headers.insert(COOKIE, value.clone());
        }
        headers
    }
}

impl fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => f.write_str("Anonymous"),
            Self::Cookie(_) => f.write_str("Cookie(<redacted>)"),
        }
    }
}

impl<S> FromRequestParts<S> for SessionCredential
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}
