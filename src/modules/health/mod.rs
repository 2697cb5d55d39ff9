use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{OriginalUri, State},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use cover_kernel::{InitCtx, Module};
use cover_upstream::SessionCredential;

use super::operation;
use crate::gateway::Gateway;

/// Composite reachability of Core and Index at `GET /test`
pub struct HealthModule {
    gateway: Arc<Gateway>,
}

impl HealthModule {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Module for HealthModule {
    fn name(&self) -> &'static str {
        "health"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "health module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/test", get(service_status))
            .with_state(self.gateway.clone())
    }

    fn openapi(&self) -> Option<Value> {
        Some(json!({
            "paths": {
                "/test": {
                    "get": operation(
                        "Health",
                        "Gateway status with one entry per backend",
                        "200",
                        "Always answered, backends up or not"
                    )
                }
            },
            "components": {
                "schemas": {
                    "HealthStatus": {
                        "type": "object",
                        "properties": {
                            "serviceName": { "type": "string", "enum": ["core", "index"] },
                            "reachable": { "type": "boolean" },
                            "detail": { "oneOf": [{ "type": "object" }, { "type": "string" }] }
                        },
                        "required": ["serviceName", "reachable", "detail"]
                    }
                }
            }
        }))
    }
}

/// Never fails: unreachable backends are reported, not raised.
async fn service_status(
    State(gateway): State<Arc<Gateway>>,
    OriginalUri(uri): OriginalUri,
    session: SessionCredential,
) -> Json<Value> {
    let services = gateway.health(&session).await;
    Json(json!({
        "url": uri.to_string(),
        "status": 200,
        "comment": "it's working!",
        "services": services
    }))
}

/// Create a new instance of the health module
pub fn create_module(gateway: Arc<Gateway>) -> Arc<dyn Module> {
    Arc::new(HealthModule::new(gateway))
}
