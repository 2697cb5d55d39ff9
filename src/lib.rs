//! cover gateway application library
//!
//! Wires the endpoint modules to the shared [`Gateway`] state and exposes
//! the composition services for embedding and tests.

use std::sync::Arc;

use axum::Router;

use cover_kernel::{settings::Settings, ModuleRegistry};

pub mod gateway;
pub mod modules;
pub mod services;

pub use gateway::Gateway;

/// Registry holding every endpoint module, bound to `gateway`
pub fn build_registry(gateway: Arc<Gateway>) -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, gateway);
    registry
}

/// Fully layered application router, as served by the binary
pub fn build_app(registry: &ModuleRegistry, settings: &Settings) -> Router {
    cover_http::build_router(registry, settings)
}
