//! Parley Worker
//!
//! One worker is spawned per room by the API service. It resolves the persona
//! instruction, starts a fresh analytics session and serves the practice tools to
//! the conversational agent over MCP on stdin/stdout. Logs go to stderr.

use anyhow::{Context, Result};
use clap::Parser;
use parley_core::{
    analytics::{AnalyticsStore, FeedbackSummary, Timestamped},
    persona::system_instruction,
    service::PracticeToolService,
};
use rmcp::ServiceExt;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tokio::sync::{Mutex, mpsc};
use tracing::{Level, error, info, warn};

/// Start parameters passed by the session launcher.
#[derive(Parser, Debug)]
#[command(name = "parley-bot")]
#[command(about = "Practice conversation worker for a single room")]
#[command(version)]
struct Args {
    /// Room the conversation takes place in
    #[arg(short = 'u', long, env = "DAILY_ROOM_URL")]
    room_url: String,

    /// Access token for the room, forwarded to the media pipeline that joins it
    #[arg(short = 't', long, env = "DAILY_ROOM_TOKEN")]
    token: String,

    /// Persona instruction; empty selects the default persona
    #[arg(short = 'p', long, default_value = "")]
    prompt: String,

    /// Directory feedback reports are written to
    #[arg(long, env = "PARLEY_REPORTS_DIR")]
    reports_dir: Option<PathBuf>,

    #[arg(long, env = "RUST_LOG", default_value = "INFO")]
    log_level: Level,
}

/// Rejects blank room credentials before anything is served.
fn check_room_credentials(args: &Args) -> Result<()> {
    anyhow::ensure!(!args.room_url.trim().is_empty(), "Room URL must not be empty");
    anyhow::ensure!(
        !args.token.trim().is_empty(),
        "Room token must not be empty for room: {}",
        args.room_url
    );
    Ok(())
}

/// Writes one report as `feedback-<unix-millis>.json` and returns its path.
async fn write_report(dir: &Path, report: &Timestamped<FeedbackSummary>) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create reports directory {}", dir.display()))?;

    let path = dir.join(format!(
        "feedback-{}.json",
        report.timestamp.timestamp_millis()
    ));
    let json = serde_json::to_string_pretty(report)?;
    tokio::fs::write(&path, json)
        .await
        .with_context(|| format!("Failed to write report {}", path.display()))?;
    Ok(path)
}

/// Drains the feedback channel until every sender is gone.
async fn persist_reports(
    mut feedback_rx: mpsc::Receiver<Timestamped<FeedbackSummary>>,
    reports_dir: Option<PathBuf>,
) {
    while let Some(report) = feedback_rx.recv().await {
        let score = report.record.notes.overall_score;
        match &reports_dir {
            Some(dir) => match write_report(dir, &report).await {
                Ok(path) => info!(path = %path.display(), score, "Feedback report saved"),
                Err(e) => error!(error = ?e, "Failed to save feedback report"),
            },
            None => match serde_json::to_string(&report) {
                Ok(json) => info!(score, report = %json, "Feedback report ready"),
                Err(e) => error!(error = %e, "Failed to serialize feedback report"),
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // stdout carries the MCP transport.
    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_writer(std::io::stderr)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();

    check_room_credentials(&args)?;

    let instruction = system_instruction(&args.prompt, chrono::Local::now().date_naive());
    info!(
        room_url = %args.room_url,
        custom_prompt = !args.prompt.trim().is_empty(),
        "Worker starting"
    );

    let store = Arc::new(Mutex::new(AnalyticsStore::new()));
    store.lock().await.reset();

    let (feedback_tx, feedback_rx) = mpsc::channel(8);
    let writer = tokio::spawn(persist_reports(feedback_rx, args.reports_dir.clone()));

    let service = PracticeToolService::new(store.clone(), Some(feedback_tx), instruction)
        .serve(rmcp::transport::stdio())
        .await
        .context("Failed to start MCP server on stdio")?;
    info!("Practice tools ready");

    tokio::select! {
        result = service.waiting() => match result {
            Ok(reason) => info!(?reason, "Agent transport closed"),
            Err(e) => error!(error = %e, "MCP service task failed"),
        },
        _ = tokio::signal::ctrl_c() => info!("Received shutdown signal"),
    }

    // The service held the only sender, so the writer finishes once it has drained.
    if tokio::time::timeout(Duration::from_secs(5), writer).await.is_err() {
        warn!("Timed out waiting for pending feedback reports");
    }

    let snapshot = store.lock().await.snapshot();
    let counts = snapshot.events.counts();
    info!(
        milestones = counts.total_milestones,
        quality_checks = counts.quality_checks,
        goal_assessments = counts.goal_assessments,
        emotional_shifts = counts.emotional_shifts,
        technique_suggestions = counts.technique_suggestions,
        ending_evaluated = snapshot.events.ending_evaluation.is_some(),
        feedback_generated = snapshot.final_feedback.is_some(),
        "Session finished"
    );
    Ok(())
}
