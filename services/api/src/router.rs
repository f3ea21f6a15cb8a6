//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the session endpoints and OpenAPI documentation.

use crate::{
    handlers,
    models::{ConnectPayload, ConnectResponse, ErrorResponse, StatusResponse},
    registry::SessionStatus,
    state::AppState,
};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::start_agent,
        handlers::connect,
        handlers::get_status,
    ),
    components(
        schemas(ConnectPayload, ConnectResponse, StatusResponse, ErrorResponse, SessionStatus)
    ),
    tags(
        (name = "Parley API", description = "Room and worker management for practice conversations")
    )
)]
pub struct ApiDoc;

/// Renders the OpenAPI document served at `/api-docs/openapi.json`.
pub fn openapi_json() -> Result<String, serde_json::Error> {
    ApiDoc::openapi().to_pretty_json()
}

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/", get(handlers::start_agent))
        .route("/connect", post(handlers::connect))
        .route("/status/{session_id}", get(handlers::get_status))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
