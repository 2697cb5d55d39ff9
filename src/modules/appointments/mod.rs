use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{rejection::JsonRejection, State},
    routing::put,
    Json, Router,
};
use serde_json::{json, Value};

use cover_http::AppError;
use cover_kernel::{InitCtx, Module};
use cover_upstream::SessionCredential;

use super::operation;
use crate::gateway::Gateway;
use crate::services::models::AppointmentRequest;
use crate::services::SagaError;

/// Borrow a book and schedule its hand-over in one call
pub struct AppointmentsModule {
    gateway: Arc<Gateway>,
}

impl AppointmentsModule {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Module for AppointmentsModule {
    fn name(&self) -> &'static str {
        "appointments"
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/user/me/appointments", put(create_appointment))
            .with_state(self.gateway.clone())
    }

    fn openapi(&self) -> Option<Value> {
        Some(json!({
            "paths": {
                "/user/me/appointments": {
                    "put": operation(
                        "Appointments",
                        "Borrow `meeting.bookId` and create the hand-over appointment",
                        "200",
                        "Appointment as created by Core"
                    )
                }
            },
            "components": {
                "schemas": {
                    "MeetingDraft": {
                        "type": "object",
                        "properties": {
                            "bookId": { "oneOf": [{ "type": "integer" }, { "type": "string" }] },
                            "depositLocation": {
                                "oneOf": [
                                    {
                                        "type": "object",
                                        "properties": {
                                            "type": { "type": "string" },
                                            "address": { "type": "string" }
                                        },
                                        "required": ["type", "address"],
                                        "additionalProperties": false
                                    },
                                    {
                                        "type": "object",
                                        "properties": {
                                            "locationId": { "oneOf": [{ "type": "integer" }, { "type": "string" }] }
                                        },
                                        "required": ["locationId"],
                                        "additionalProperties": false
                                    }
                                ]
                            }
                        },
                        "required": ["bookId", "depositLocation"]
                    }
                }
            }
        }))
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "appointments module started");
        Ok(())
    }
}

async fn create_appointment(
    State(gateway): State<Arc<Gateway>>,
    session: SessionCredential,
    payload: Result<Json<AppointmentRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(AppointmentRequest { meeting }) = payload?;
    let appointment = gateway
        .saga()
        .create_borrow_appointment(&meeting, &session)
        .await?;
    Ok(Json(appointment))
}

impl From<SagaError> for AppError {
    fn from(err: SagaError) -> Self {
        match err {
            SagaError::Step { source, .. } => AppError::Upstream(source),
            invalid @ SagaError::InvalidTransition { .. } => AppError::Internal(invalid.into()),
        }
    }
}

/// Create a new instance of the appointments module
pub fn create_module(gateway: Arc<Gateway>) -> Arc<dyn Module> {
    Arc::new(AppointmentsModule::new(gateway))
}
