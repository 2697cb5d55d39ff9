use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::Method,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Number, Value};

use cover_http::AppError;
use cover_kernel::{InitCtx, Module};
use cover_upstream::SessionCredential;

use super::{operation, relay};
use crate::gateway::Gateway;

/// The current user's profile, score and appointments, straight from Core
pub struct UsersModule {
    gateway: Arc<Gateway>,
}

impl UsersModule {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }
}

#[derive(Debug, Deserialize)]
struct ScoreRequest {
    n: Number,
}

#[async_trait]
impl Module for UsersModule {
    fn name(&self) -> &'static str {
        "users"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            core = %ctx.settings.upstreams.core.base_url(),
            "users module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/user/me", get(me))
            .route("/user/me/score", post(score))
            .route("/user/me/appointments/for", get(appointments_for))
            .route("/user/me/appointments/with", get(appointments_with))
            .with_state(self.gateway.clone())
    }

    fn openapi(&self) -> Option<Value> {
        Some(json!({
            "paths": {
                "/user/me": {
                    "get": operation("Users", "Current user", "200", "User record")
                },
                "/user/me/score": {
                    "post": operation("Users", "Add `n` to the current user's score", "200", "User state before the change")
                },
                "/user/me/appointments/for": {
                    "get": operation("Users", "Appointments where the current user hands a book over", "200", "Appointment list")
                },
                "/user/me/appointments/with": {
                    "get": operation("Users", "Appointments where the current user receives a book", "200", "Appointment list")
                }
            }
        }))
    }
}

async fn me(
    State(gateway): State<Arc<Gateway>>,
    session: SessionCredential,
) -> Result<Response, AppError> {
    passthrough_get(&gateway, "/user/me", &session).await
}

async fn score(
    State(gateway): State<Arc<Gateway>>,
    session: SessionCredential,
    payload: Result<Json<ScoreRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(ScoreRequest { n }) = payload?;
    let response = gateway
        .core()
        .exchange::<_, Value>(Method::POST, "/user/me/score", Some(&json!({ "n": n })), &session)
        .await?;
    Ok(relay(response))
}

async fn appointments_for(
    State(gateway): State<Arc<Gateway>>,
    session: SessionCredential,
) -> Result<Response, AppError> {
    passthrough_get(&gateway, "/user/me/appointments/for", &session).await
}

async fn appointments_with(
    State(gateway): State<Arc<Gateway>>,
    session: SessionCredential,
) -> Result<Response, AppError> {
    passthrough_get(&gateway, "/user/me/appointments/with", &session).await
}

async fn passthrough_get(
    gateway: &Gateway,
    path: &str,
    session: &SessionCredential,
) -> Result<Response, AppError> {
    let response = gateway
        .core()
        .exchange::<(), Value>(Method::GET, path, None, session)
        .await?;
    Ok(relay(response))
}

/// Create a new instance of the users module
pub fn create_module(gateway: Arc<Gateway>) -> Arc<dyn Module> {
    Arc::new(UsersModule::new(gateway))
}
