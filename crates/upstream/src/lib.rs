//! Upstream plumbing for the cover gateway.
//!
//! - [`SessionCredential`] carries the inbound cookie, untouched, to every
//!   backend call made while serving one request.
//! - [`UpstreamClient`] performs a single JSON call against one backend and
//!   folds every failure into [`UpstreamError`].

pub mod client;
pub mod error;
pub mod id;
pub mod session;

pub use client::{UpstreamClient, UpstreamResponse};
pub use error::{Backend, UpstreamError, UpstreamResult};
pub use id::Id;
pub use session::SessionCredential;
