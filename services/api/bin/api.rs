//! Main Entrypoint for the Parley API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing the room service client, process registry and session launcher.
//! 3. Constructing the Axum router and applying middleware.
//! 4. Starting the web server and, on shutdown, terminating every worker process.

use anyhow::Context;
use parley_api::{
    config::Config,
    launcher::{SessionLauncher, WorkerCommand},
    registry::SessionRegistry,
    room::DailyRoomService,
    router::create_router,
    state::AppState,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Shared Services ---
    let rooms = Arc::new(DailyRoomService::new(
        config.daily_api_url.clone(),
        config.daily_api_key.clone(),
        config.room_expiry_secs,
    ));
    let registry = SessionRegistry::new(config.max_bots_per_room)
        .with_retention(Duration::from_secs(config.finished_retention_secs));
    let worker = WorkerCommand::new(config.worker_program.clone())
        .with_working_dir(config.worker_dir.clone());
    let launcher = SessionLauncher::new(registry.clone(), worker);

    let app_state = Arc::new(AppState { launcher, rooms });

    // --- 4. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 5. Start Server ---
    info!(
        max_bots_per_room = config.max_bots_per_room,
        worker = %config.worker_program.display(),
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // --- 6. Stop Workers ---
    registry.shutdown_all().await;
    info!("Server has shut down.");
    Ok(())
}
