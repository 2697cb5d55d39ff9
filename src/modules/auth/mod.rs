use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::Method,
    response::Response,
    routing::{post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use cover_http::AppError;
use cover_kernel::Module;
use cover_upstream::SessionCredential;

use super::{authenticated, operation, relay};
use crate::gateway::Gateway;

/// Login, logout and signup, all delegated to Core
pub struct AuthModule {
    gateway: Arc<Gateway>,
}

impl AuthModule {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }
}

/// `{user: {...}}`, the shape both login and signup take.
#[derive(Debug, Deserialize)]
struct UserEnvelope {
    user: Map<String, Value>,
}

#[async_trait]
impl Module for AuthModule {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/login", post(login))
            .route("/logout", post(logout))
            .route("/signup", put(signup))
            .with_state(self.gateway.clone())
    }

    fn openapi(&self) -> Option<Value> {
        Some(json!({
            "paths": {
                "/login": {
                    "post": operation("Auth", "Log in through Core", "200", "Authenticated, session cookie set")
                },
                "/logout": {
                    "post": operation("Auth", "Log out through Core", "200", "Session cookie cleared")
                },
                "/signup": {
                    "put": operation("Auth", "Register a user in Core", "201", "Created user")
                }
            }
        }))
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "auth module stopped");
        Ok(())
    }
}

async fn login(
    State(gateway): State<Arc<Gateway>>,
    session: SessionCredential,
    payload: Result<Json<UserEnvelope>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(UserEnvelope { user }) = payload?;
    let response = gateway
        .core()
        .exchange::<_, Value>(Method::POST, "/auth/login", Some(&user), &session)
        .await?;
    Ok(authenticated(response))
}

async fn logout(
    State(gateway): State<Arc<Gateway>>,
    session: SessionCredential,
) -> Result<Response, AppError> {
    let response = gateway
        .core()
        .exchange::<(), Value>(Method::POST, "/auth/logout", None, &session)
        .await?;
    Ok(authenticated(response))
}

async fn signup(
    State(gateway): State<Arc<Gateway>>,
    session: SessionCredential,
    payload: Result<Json<UserEnvelope>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(UserEnvelope { user }) = payload?;
    let response = gateway
        .core()
        .exchange::<_, Value>(Method::PUT, "/user/add", Some(&json!({ "user": user })), &session)
        .await?;
    Ok(relay(response))
}

/// Create a new instance of the auth module
pub fn create_module(gateway: Arc<Gateway>) -> Arc<dyn Module> {
    Arc::new(AuthModule::new(gateway))
}
