pub mod appointments;
pub mod auth;
pub mod books;
pub mod health;
pub mod users;

use std::sync::Arc;

use axum::{
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use cover_kernel::ModuleRegistry;
use cover_upstream::UpstreamResponse;

use crate::gateway::Gateway;

/// Register every endpoint module with the registry
pub fn register_all(registry: &mut ModuleRegistry, gateway: Arc<Gateway>) {
    registry.register(health::create_module(gateway.clone()));
    registry.register(auth::create_module(gateway.clone()));
    registry.register(users::create_module(gateway.clone()));
    registry.register(books::create_module(gateway.clone()));
    registry.register(appointments::create_module(gateway));
}

/// Relay a passthrough answer with the backend's own status.
pub(crate) fn relay(response: UpstreamResponse<Value>) -> Response {
    (response.status, Json(response.body)).into_response()
}

/// `{authenticated: true}` carrying every `Set-Cookie` Core issued.
pub(crate) fn authenticated(response: UpstreamResponse<Value>) -> Response {
    let mut headers = HeaderMap::new();
    for cookie in response.set_cookies() {
        headers.append(SET_COOKIE, cookie.clone());
    }
    (
        StatusCode::OK,
        headers,
        Json(json!({ "authenticated": true })),
    )
        .into_response()
}

/// OpenAPI operation with one success response and the error envelope.
pub(crate) fn operation(tag: &str, summary: &str, status: &str, description: &str) -> Value {
    let mut responses = serde_json::Map::new();
    responses.insert(
        status.to_string(),
        json!({
            "description": description,
            "content": { "application/json": { "schema": { "type": "object" } } }
        }),
    );
    responses.insert(
        "default".to_string(),
        json!({
            "description": "Validation or upstream error",
            "content": {
                "application/json": {
                    "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                }
            }
        }),
    );

    json!({
        "summary": summary,
        "tags": [tag],
        "responses": responses
    })
}
