//! Practice Tool Service
//!
//! Exposes the tool-call adapter to a conversational agent over the Model Context
//! Protocol (MCP). The agent calls these tools mid-conversation to report what it
//! observes about the user; the results accumulate in the session's
//! [`AnalyticsStore`].

use crate::analytics::{AnalyticsStore, FeedbackNotes, FeedbackSummary, Timestamped};
use crate::tools::{
    self, AssessGoalArgs, DetectEmotionArgs, EvaluateEndingArgs, LogMilestoneArgs,
    SuggestTechniqueArgs, TrackQualityArgs,
};
use rmcp::{
    ServerHandler,
    handler::server::{router::tool::ToolRouter, tool::Parameters},
    model::{ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::warn;

/// A shared handle to one session's analytics.
pub type SharedStore = Arc<Mutex<AnalyticsStore>>;

fn to_json<T: Serialize>(ack: &T) -> Result<String, String> {
    serde_json::to_string(ack).map_err(|e| format!("Failed to serialize tool result: {}", e))
}

/// The MCP server a worker runs for the duration of one practice conversation.
pub struct PracticeToolService {
    /// The session's analytics, guarded so that concurrent calls keep sequence order.
    pub store: SharedStore,
    /// Receives every report flagged for external persistence.
    pub feedback_tx: Option<mpsc::Sender<Timestamped<FeedbackSummary>>>,
    /// System instruction advertised to the attaching agent.
    instructions: String,
    tool_router: ToolRouter<Self>,
}

#[tool_handler]
impl ServerHandler for PracticeToolService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(self.instructions.clone()),
            ..Default::default()
        }
    }
}

#[tool_router]
impl PracticeToolService {
    pub fn new(
        store: SharedStore,
        feedback_tx: Option<mpsc::Sender<Timestamped<FeedbackSummary>>>,
        instructions: String,
    ) -> Self {
        Self {
            store,
            feedback_tx,
            instructions,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Track the quality of user's communication approach during practice")]
    pub async fn track_communication_quality(
        &self,
        args: Parameters<TrackQualityArgs>,
    ) -> Result<String, String> {
        let mut store = self.store.lock().await;
        to_json(&tools::track_communication_quality(&mut store, args.0))
    }

    #[tool(description = "Log important moments in the practice conversation")]
    pub async fn log_conversation_milestone(
        &self,
        args: Parameters<LogMilestoneArgs>,
    ) -> Result<String, String> {
        let mut store = self.store.lock().await;
        to_json(&tools::log_conversation_milestone(&mut store, args.0))
    }

    #[tool(description = "Assess progress toward user's stated conversation goal")]
    pub async fn assess_goal_progress(
        &self,
        args: Parameters<AssessGoalArgs>,
    ) -> Result<String, String> {
        let mut store = self.store.lock().await;
        to_json(&tools::assess_goal_progress(&mut store, args.0))
    }

    #[tool(description = "Detect and log emotional states during conversation")]
    pub async fn detect_emotional_state(
        &self,
        args: Parameters<DetectEmotionArgs>,
    ) -> Result<String, String> {
        let mut store = self.store.lock().await;
        to_json(&tools::detect_emotional_state(&mut store, args.0))
    }

    #[tool(description = "Internally note when user could benefit from specific technique")]
    pub async fn suggest_conversation_technique(
        &self,
        args: Parameters<SuggestTechniqueArgs>,
    ) -> Result<String, String> {
        let mut store = self.store.lock().await;
        to_json(&tools::suggest_conversation_technique(&mut store, args.0))
    }

    #[tool(description = "Evaluate if conversation reached natural conclusion")]
    pub async fn evaluate_conversation_ending(
        &self,
        args: Parameters<EvaluateEndingArgs>,
    ) -> Result<String, String> {
        let mut store = self.store.lock().await;
        to_json(&tools::evaluate_conversation_ending(&mut store, args.0))
    }

    /// Compiles the final report and hands it to the persistence channel, if any.
    #[tool(description = "Generate comprehensive feedback at conversation end")]
    pub async fn generate_feedback_summary(
        &self,
        args: Parameters<FeedbackNotes>,
    ) -> Result<String, String> {
        let ack = {
            let mut store = self.store.lock().await;
            tools::generate_feedback_summary(&mut store, args.0)
        };

        if ack.save_to_database {
            if let Some(tx) = &self.feedback_tx {
                if tx.send(ack.feedback.clone()).await.is_err() {
                    warn!("Failed to hand off feedback report: receiver dropped.");
                }
            }
        }

        to_json(&ack)
    }
}
