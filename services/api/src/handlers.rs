//! Axum Handlers for the REST API
//!
//! This module contains the logic for handling HTTP requests that start practice
//! sessions and report on their worker processes.
//! It uses `utoipa` doc comments to generate OpenAPI documentation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Redirect, Response},
};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    launcher::LaunchError,
    models::{ConnectPayload, ConnectResponse, ErrorResponse, StatusResponse},
    registry::{RegistryError, SessionId},
    state::AppState,
};

pub enum ApiError {
    NotFound(String),
    TooManyRequests(String),
    BadGateway(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
            ApiError::TooManyRequests(message) => {
                (StatusCode::TOO_MANY_REQUESTS, Json(ErrorResponse { message })).into_response()
            }
            ApiError::BadGateway(message) => {
                (StatusCode::BAD_GATEWAY, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = format!("{}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(_) => Self::NotFound(err.to_string()),
            RegistryError::CapacityExceeded { .. } => Self::TooManyRequests(err.to_string()),
            RegistryError::ProcessGone | RegistryError::NoTransport(_) => {
                Self::InternalServerError(err.into())
            }
        }
    }
}

impl From<LaunchError> for ApiError {
    fn from(err: LaunchError) -> Self {
        match err {
            LaunchError::RoomService(e) => {
                warn!(error = %e, "Room service failure");
                Self::BadGateway(e.to_string())
            }
            LaunchError::CapacityExceeded { .. } => Self::TooManyRequests(err.to_string()),
            LaunchError::Registry(e) => e.into(),
            LaunchError::LaunchFailed(_) => Self::InternalServerError(err.into()),
        }
    }
}

/// Create a room, start a worker with the default persona, and redirect to the room.
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 307, description = "Redirect to the newly created room"),
        (status = 429, description = "Room already has its maximum number of workers", body = ErrorResponse),
        (status = 502, description = "Room service failure", body = ErrorResponse),
        (status = 500, description = "Worker could not be started", body = ErrorResponse)
    )
)]
pub async fn start_agent(State(state): State<Arc<AppState>>) -> Result<Redirect, ApiError> {
    let session = state.launcher.start_session(state.rooms.as_ref(), "").await?;
    info!(room_url = %session.room_url, bot_id = session.session_id, "Redirecting to room");
    Ok(Redirect::temporary(&session.room_url))
}

/// Create a room and start a worker, returning the credentials a client needs to join.
#[utoipa::path(
    post,
    path = "/connect",
    request_body = ConnectPayload,
    responses(
        (status = 200, description = "Room created and worker started", body = ConnectResponse),
        (status = 429, description = "Room already has its maximum number of workers", body = ErrorResponse),
        (status = 502, description = "Room service failure", body = ErrorResponse),
        (status = 500, description = "Worker could not be started", body = ErrorResponse)
    )
)]
pub async fn connect(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ConnectPayload>,
) -> Result<Json<ConnectResponse>, ApiError> {
    info!(session_id = ?payload.session_id, "Creating room for client connection...");
    let session = state
        .launcher
        .start_session(state.rooms.as_ref(), &payload.system_prompt)
        .await?;

    Ok(Json(ConnectResponse {
        room_url: session.room_url,
        token: session.token,
        session_id: payload.session_id,
        bot_id: session.session_id,
    }))
}

/// Get the status of a specific worker process.
#[utoipa::path(
    get,
    path = "/status/{session_id}",
    responses(
        (status = 200, description = "Worker status", body = StatusResponse),
        (status = 404, description = "Worker not found", body = ErrorResponse)
    ),
    params(
        ("session_id" = u32, Path, description = "Worker process ID")
    )
)]
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<StatusResponse>, ApiError> {
    let status = state.registry().status(session_id)?;
    Ok(Json(StatusResponse { session_id, status }))
}
