#![cfg(unix)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use parley_api::{
    launcher::{SessionLauncher, WorkerCommand},
    models::{ConnectResponse, StatusResponse},
    registry::{SessionRegistry, SessionStatus},
    room::{RoomService, RoomServiceError},
    router::create_router,
    state::AppState,
};
use serde_json::{Value, json};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use tower::ServiceExt;

/// Hands out rooms according to its mode and counts how many it created.
struct FakeRooms {
    mode: Mode,
    created: AtomicUsize,
}

enum Mode {
    /// A new room for every request.
    Fresh,
    /// The same room every time.
    Fixed(&'static str),
    /// Room creation always fails.
    Broken,
}

#[async_trait]
impl RoomService for FakeRooms {
    async fn create_room(&self) -> Result<String, RoomServiceError> {
        let n = self.created.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            Mode::Fresh => Ok(format!("https://test.daily.co/room-{n}")),
            Mode::Fixed(url) => Ok(url.to_string()),
            Mode::Broken => Err(RoomServiceError::Status {
                status: 401,
                body: "unauthorized".to_string(),
            }),
        }
    }

    async fn get_token(&self, room_url: &str) -> Result<String, RoomServiceError> {
        Ok(format!("token-for-{room_url}"))
    }
}

fn sleeper() -> WorkerCommand {
    WorkerCommand::new("sh").with_args(["-c", "sleep 30", "parley-bot"])
}

fn app(mode: Mode, worker: WorkerCommand) -> (Router, SessionRegistry) {
    let registry = SessionRegistry::new(1);
    let state = Arc::new(AppState {
        launcher: SessionLauncher::new(registry.clone(), worker),
        rooms: Arc::new(FakeRooms {
            mode,
            created: AtomicUsize::new(0),
        }),
    });
    (create_router(state), registry)
}

async fn post_connect(app: &Router, body: Value) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/connect")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn get(app: &Router, uri: &str) -> axum::response::Response {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn json_body<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_connect_then_status_running() {
    let (app, registry) = app(Mode::Fresh, sleeper());

    let response = post_connect(
        &app,
        json!({"sessionId": "client-7", "systemPrompt": "You are my coworker."}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let connected: ConnectResponse = json_body(response).await;
    assert_eq!(connected.room_url, "https://test.daily.co/room-0");
    assert_eq!(connected.token, "token-for-https://test.daily.co/room-0");
    assert_eq!(connected.session_id.as_deref(), Some("client-7"));

    let response = get(&app, &format!("/status/{}", connected.bot_id)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let status: StatusResponse = json_body(response).await;
    assert_eq!(status.session_id, connected.bot_id);
    assert_eq!(status.status, SessionStatus::Running);

    registry.shutdown_all().await;
}

#[tokio::test]
async fn test_status_reports_finished_after_exit() {
    let worker = WorkerCommand::new("sh").with_args(["-c", "exit 0", "parley-bot"]);
    let (app, registry) = app(Mode::Fresh, worker);

    let connected: ConnectResponse = json_body(post_connect(&app, json!({})).await).await;
    registry.wait_for_exit(connected.bot_id).await.unwrap();

    let status: StatusResponse =
        json_body(get(&app, &format!("/status/{}", connected.bot_id)).await).await;
    assert_eq!(status.status, SessionStatus::Finished);
}

#[tokio::test]
async fn test_status_for_unknown_session_is_404() {
    let (app, _registry) = app(Mode::Fresh, sleeper());

    let response = get(&app, "/status/4000000000").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body: Value = json_body(response).await;
    assert_eq!(body["message"], "Bot with process ID: 4000000000 not found");
}

#[tokio::test]
async fn test_second_worker_for_same_room_is_rejected() {
    let (app, registry) = app(Mode::Fixed("https://test.daily.co/shared"), sleeper());

    let first = post_connect(&app, json!({})).await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = post_connect(&app, json!({})).await;
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: Value = json_body(second).await;
    assert_eq!(
        body["message"],
        "Max bot limit (1) reached for room: https://test.daily.co/shared"
    );
    assert_eq!(registry.count_for_room("https://test.daily.co/shared"), 1);

    registry.shutdown_all().await;
}

#[tokio::test]
async fn test_room_service_failure_is_502() {
    let (app, registry) = app(Mode::Broken, sleeper());

    let response = post_connect(&app, json!({})).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(registry.count_for_room(""), 0);
}

#[tokio::test]
async fn test_spawn_failure_is_500() {
    let (app, registry) = app(Mode::Fresh, WorkerCommand::new("/nonexistent/parley-bot"));

    let response = post_connect(&app, json!({})).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body: Value = json_body(response).await;
    assert!(
        body["message"]
            .as_str()
            .unwrap()
            .starts_with("Failed to start subprocess")
    );
    assert_eq!(registry.count_for_room("https://test.daily.co/room-0"), 0);
}

#[tokio::test]
async fn test_root_redirects_to_new_room() {
    let (app, registry) = app(Mode::Fresh, sleeper());

    let response = get(&app, "/").await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "https://test.daily.co/room-0"
    );
    assert_eq!(registry.count_for_room("https://test.daily.co/room-0"), 1);

    registry.shutdown_all().await;
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let (app, _registry) = app(Mode::Fresh, sleeper());

    let response = get(&app, "/api-docs/openapi.json").await;
    assert_eq!(response.status(), StatusCode::OK);

    let doc: Value = json_body(response).await;
    assert!(doc["paths"]["/connect"]["post"].is_object());
    assert!(doc["paths"]["/status/{session_id}"]["get"].is_object());
}
