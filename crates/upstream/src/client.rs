//! HTTP client for one backend service.

use std::time::Duration;

use anyhow::Context;
use axum::body::Bytes;
use axum::http::{header::SET_COOKIE, HeaderMap, HeaderValue, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use cover_kernel::settings::UpstreamSettings;

use crate::error::{Backend, UpstreamError, UpstreamResult};
use crate::session::SessionCredential;

/// JSON client bound to one backend.
///
/// One attempt per call, no retries. The underlying `reqwest` client keeps
/// no cookie jar: the only credential on the wire is the
/// [`SessionCredential`] passed into each call.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    /// Backend identity reported in errors and logs.
    backend: Backend,
    /// Base URL without trailing slash.
    base_url: String,
    /// Pooled HTTP client, shared by every request to this backend.
    http: reqwest::Client,
    /// Per-call deadline.
    timeout: Duration,
}

impl UpstreamClient {
    /// Create a client for `backend` from its configured location.
    pub fn new(backend: Backend, settings: &UpstreamSettings) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout())
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .with_context(|| format!("failed to create HTTP client for {backend}"))?;

        Ok(Self {
            backend,
            base_url: settings.base_url().trim_end_matches('/').to_string(),
            http,
            timeout: settings.timeout(),
        })
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `GET path` and decode the JSON answer.
    pub async fn get<T>(&self, path: &str, session: &SessionCredential) -> UpstreamResult<T>
    where
        T: DeserializeOwned,
    {
        self.exchange::<(), T>(Method::GET, path, None, session)
            .await
            .map(|response| response.body)
    }

    /// `POST path` with a JSON body and decode the JSON answer.
    pub async fn post<B, T>(&self, path: &str, body: &B, session: &SessionCredential) -> UpstreamResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.exchange(Method::POST, path, Some(body), session)
            .await
            .map(|response| response.body)
    }

    /// `PUT path` with a JSON body and decode the JSON answer.
    pub async fn put<B, T>(&self, path: &str, body: &B, session: &SessionCredential) -> UpstreamResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.exchange(Method::PUT, path, Some(body), session)
            .await
            .map(|response| response.body)
    }

    /// `GET path` and keep whatever 2xx body comes back: JSON when it
    /// parses, the text as a JSON string otherwise.
    pub async fn get_lenient(
        &self,
        path: &str,
        session: &SessionCredential,
    ) -> UpstreamResult<serde_json::Value> {
        let (_, _, bytes) = self
            .send::<()>(Method::GET, path, None, session)
            .await?;
        Ok(lenient_body(&bytes))
    }

    /// Issue one call and keep the status and headers of a 2xx answer.
    ///
    /// A non-2xx answer becomes [`UpstreamError::Status`] carrying the real
    /// status and decoded body; transport failures become
    /// [`UpstreamError::Unreachable`] or [`UpstreamError::Timeout`].
    pub async fn exchange<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        session: &SessionCredential,
    ) -> UpstreamResult<UpstreamResponse<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let (status, headers, bytes) = self.send(method, path, body, session).await?;

        let body = success_body(&bytes).map_err(|e| UpstreamError::Decode {
            service: self.backend,
            path: path.to_string(),
            message: e.to_string(),
        })?;

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }

    /// One round trip; anything but a 2xx answer is an error.
    async fn send<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        session: &SessionCredential,
    ) -> UpstreamResult<(StatusCode, HeaderMap, Bytes)>
    where
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .http
            .request(method.clone(), &url)
            .headers(session.headers());
        if let Some(body) = body {
            request = request.json(body);
        }

        tracing::debug!(
            service = %self.backend,
            method = %method,
            path,
            authenticated = session.is_present(),
            "calling upstream"
        );

        let response = request
            .send()
            .await
            .map_err(|e| self.transport_error(path, e))?;

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(path, e))?;

        if !status.is_success() {
            tracing::warn!(
                service = %self.backend,
                method = %method,
                path,
                status = status.as_u16(),
                "upstream rejected call"
            );
            return Err(UpstreamError::Status {
                service: self.backend,
                path: path.to_string(),
                status,
                body: lenient_body(&bytes),
            });
        }

        tracing::debug!(service = %self.backend, path, status = status.as_u16(), "upstream answered");

        Ok((status, headers, bytes))
    }

    fn transport_error(&self, path: &str, error: reqwest::Error) -> UpstreamError {
        let path = path.to_string();
        if error.is_timeout() {
            tracing::warn!(service = %self.backend, path = %path, "upstream call timed out");
            UpstreamError::Timeout {
                service: self.backend,
                path,
            }
        } else if error.is_builder() {
            UpstreamError::Encode {
                service: self.backend,
                path,
                message: error.to_string(),
            }
        } else {
            tracing::warn!(service = %self.backend, path = %path, error = %error, "upstream unreachable");
            UpstreamError::Unreachable {
                service: self.backend,
                path,
                message: error.to_string(),
            }
        }
    }
}

/// Successful answer from a backend.
#[derive(Debug)]
pub struct UpstreamResponse<T> {
    /// Real 2xx status, relayed by passthrough routes.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Decoded body.
    pub body: T,
}

impl<T> UpstreamResponse<T> {
    /// `Set-Cookie` values issued by the backend, in order.
    pub fn set_cookies(&self) -> impl Iterator<Item = &HeaderValue> {
        self.headers.get_all(SET_COOKIE).iter()
    }
}

/// An empty 2xx body decodes as JSON `null`.
fn success_body<T: DeserializeOwned>(bytes: &[u8]) -> serde_json::Result<T> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        serde_json::from_value(serde_json::Value::Null)
    } else {
        serde_json::from_slice(bytes)
    }
}

/// Bodies kept even when they are not JSON: error answers and probes.
fn lenient_body(bytes: &[u8]) -> serde_json::Value {
    if bytes.is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned()))
}
