//! Tool-Call Adapter
//!
//! The seven operations a conversational agent invokes while a practice conversation
//! is running. Each one fills in defaults, derives its value, writes to the
//! [`AnalyticsStore`] and returns an acknowledgment of the shape
//! `{ status, <record>, message }`.
//!
//! Numeric ratings are documented as `1-10` but are stored exactly as given. A value
//! outside that range is logged as a warning and otherwise accepted.

use crate::analytics::{
    AnalyticsEvent, AnalyticsStore, EmotionalRecord, EndingEvaluation, FeedbackNotes,
    FeedbackSummary, GoalAssessment, Milestone, QualityRecord, Singleton, TechniqueSuggestion,
    Timestamped,
};
use crate::scoring;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Goal alignment at or above this value counts as on track.
pub const ON_TRACK_THRESHOLD: f64 = 6.0;

/// User emotions that count as emotionally aligned with a constructive conversation.
pub const ALIGNED_EMOTIONS: [&str; 3] = ["calm", "confident", "empathetic"];

const RATING_RANGE: std::ops::RangeInclusive<f64> = 1.0..=10.0;

fn check_rating(tool: &str, field: &str, value: f64) {
    if !RATING_RANGE.contains(&value) {
        warn!(tool, field, value, "Rating outside the 1-10 scale; storing as given");
    }
}

fn default_response_quality() -> String {
    "good".to_string()
}

fn default_priority() -> String {
    "medium".to_string()
}

// --- Arguments ---

#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone)]
pub struct TrackQualityArgs {
    #[schemars(description = "User's tone: calm, defensive, aggressive, empathetic, unclear")]
    pub tone: String,
    #[schemars(description = "Message clarity score 1-10")]
    pub clarity: f64,
    #[schemars(description = "Whether user showed empathy")]
    pub empathy_shown: bool,
    #[schemars(description = "How well user listened 1-10")]
    pub listening_quality: f64,
}

#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone)]
pub struct LogMilestoneArgs {
    #[schemars(description = "Type: breakthrough, conflict, resolution, deflection, avoidance")]
    pub milestone_type: String,
    #[schemars(description = "What happened")]
    #[serde(default)]
    pub description: String,
    #[schemars(description = "good, needs_improvement, excellent")]
    #[serde(default = "default_response_quality")]
    pub user_response_quality: String,
}

#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone)]
pub struct AssessGoalArgs {
    #[schemars(description = "How aligned with goal 1-10")]
    pub goal_alignment: f64,
    #[schemars(description = "Notes on progress")]
    #[serde(default)]
    pub progress_notes: String,
    #[schemars(description = "Challenges faced")]
    #[serde(default)]
    pub obstacles_encountered: String,
}

#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone)]
pub struct DetectEmotionArgs {
    #[schemars(description = "Detected emotion: anxious, confident, frustrated, calm, defensive")]
    pub user_emotion: String,
    #[schemars(description = "Character's emotional response")]
    pub persona_emotion: String,
    #[schemars(description = "Whether emotions shifted")]
    pub emotional_shift: bool,
}

#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone)]
pub struct SuggestTechniqueArgs {
    #[schemars(
        description = "Technique: active_listening, i_statements, validation, boundary_setting, pause_and_breathe"
    )]
    pub technique: String,
    #[schemars(description = "When this would help")]
    pub situation: String,
    #[schemars(description = "low, medium, high")]
    #[serde(default = "default_priority")]
    pub priority: String,
}

#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone)]
pub struct EvaluateEndingArgs {
    #[schemars(description = "positive, neutral, negative, unresolved")]
    pub ending_quality: String,
    #[schemars(description = "Whether user achieved their goal")]
    pub goal_achieved: bool,
    #[schemars(description = "strengthened, maintained, weakened")]
    pub relationship_impact: String,
    #[schemars(description = "Main lessons from practice")]
    pub key_takeaways: String,
}

// --- Acknowledgments ---

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct QualityAck {
    pub status: String,
    pub data: Timestamped<QualityRecord>,
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MilestoneAck {
    pub status: String,
    pub milestone: Timestamped<Milestone>,
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GoalAck {
    pub status: String,
    pub assessment: Timestamped<GoalAssessment>,
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EmotionAck {
    pub status: String,
    pub emotions: Timestamped<EmotionalRecord>,
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TechniqueAck {
    pub status: String,
    pub suggestion: Timestamped<TechniqueSuggestion>,
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EndingAck {
    pub status: String,
    pub evaluation: Timestamped<EndingEvaluation>,
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FeedbackAck {
    pub status: String,
    pub feedback: Timestamped<FeedbackSummary>,
    pub message: String,
    /// Tells the caller this report should be persisted outside the worker.
    pub save_to_database: bool,
}

// --- Operations ---

pub fn track_communication_quality(store: &mut AnalyticsStore, args: TrackQualityArgs) -> QualityAck {
    check_rating("track_communication_quality", "clarity", args.clarity);
    check_rating("track_communication_quality", "listening_quality", args.listening_quality);

    let record = QualityRecord {
        overall_score: (args.clarity + args.listening_quality) / 2.0,
        tone: args.tone,
        clarity: args.clarity,
        empathy_shown: args.empathy_shown,
        listening_quality: args.listening_quality,
    };
    let timestamp = store.append(AnalyticsEvent::Quality(record.clone()));

    info!(
        tone = %record.tone,
        clarity = record.clarity,
        empathy = record.empathy_shown,
        listening = record.listening_quality,
        "Communication quality tracked"
    );

    QualityAck {
        status: "tracked".to_string(),
        message: format!(
            "Communication quality logged: {} tone with {}/10 clarity",
            record.tone, record.clarity
        ),
        data: Timestamped::new(timestamp, record),
    }
}

pub fn log_conversation_milestone(store: &mut AnalyticsStore, args: LogMilestoneArgs) -> MilestoneAck {
    let record = Milestone {
        milestone_type: args.milestone_type,
        description: args.description,
        user_response_quality: args.user_response_quality,
    };
    let timestamp = store.append(AnalyticsEvent::Milestone(record.clone()));

    info!(
        milestone = %record.milestone_type,
        description = %record.description,
        quality = %record.user_response_quality,
        "Conversation milestone logged"
    );

    MilestoneAck {
        status: "logged".to_string(),
        message: format!("Milestone logged: {}", record.milestone_type),
        milestone: Timestamped::new(timestamp, record),
    }
}

pub fn assess_goal_progress(store: &mut AnalyticsStore, args: AssessGoalArgs) -> GoalAck {
    check_rating("assess_goal_progress", "goal_alignment", args.goal_alignment);

    let record = GoalAssessment {
        on_track: args.goal_alignment >= ON_TRACK_THRESHOLD,
        goal_alignment: args.goal_alignment,
        progress_notes: args.progress_notes,
        obstacles_encountered: args.obstacles_encountered,
    };
    let timestamp = store.append(AnalyticsEvent::GoalProgress(record.clone()));

    info!(alignment = record.goal_alignment, notes = %record.progress_notes, "Goal progress assessed");

    GoalAck {
        status: "assessed".to_string(),
        message: format!("Goal progress: {}/10 alignment", record.goal_alignment),
        assessment: Timestamped::new(timestamp, record),
    }
}

pub fn detect_emotional_state(store: &mut AnalyticsStore, args: DetectEmotionArgs) -> EmotionAck {
    let record = EmotionalRecord {
        emotional_alignment: ALIGNED_EMOTIONS.contains(&args.user_emotion.as_str()),
        user_emotion: args.user_emotion,
        persona_emotion: args.persona_emotion,
        emotional_shift: args.emotional_shift,
    };
    let timestamp = store.append(AnalyticsEvent::Emotion(record.clone()));

    info!(
        user = %record.user_emotion,
        persona = %record.persona_emotion,
        shift = record.emotional_shift,
        "Emotional state detected"
    );

    EmotionAck {
        status: "detected".to_string(),
        message: "Emotional states logged".to_string(),
        emotions: Timestamped::new(timestamp, record),
    }
}

pub fn suggest_conversation_technique(
    store: &mut AnalyticsStore,
    args: SuggestTechniqueArgs,
) -> TechniqueAck {
    let record = TechniqueSuggestion {
        technique: args.technique,
        situation: args.situation,
        priority: args.priority,
    };
    let timestamp = store.append(AnalyticsEvent::Technique(record.clone()));

    info!(
        technique = %record.technique,
        priority = %record.priority,
        situation = %record.situation,
        "Technique suggestion noted"
    );

    TechniqueAck {
        status: "noted".to_string(),
        message: format!("Technique suggestion noted: {}", record.technique),
        suggestion: Timestamped::new(timestamp, record),
    }
}

pub fn evaluate_conversation_ending(store: &mut AnalyticsStore, args: EvaluateEndingArgs) -> EndingAck {
    let success_score =
        scoring::success_score(&args.ending_quality, args.goal_achieved, &args.relationship_impact);
    let record = EndingEvaluation {
        ending_quality: args.ending_quality,
        goal_achieved: args.goal_achieved,
        relationship_impact: args.relationship_impact,
        key_takeaways: args.key_takeaways,
        success_score,
    };
    let timestamp = store.set_singleton(Singleton::EndingEvaluation(record.clone()));

    info!(
        quality = %record.ending_quality,
        goal_achieved = record.goal_achieved,
        impact = %record.relationship_impact,
        success_score,
        "Conversation ending evaluated"
    );

    EndingAck {
        status: "evaluated".to_string(),
        message: format!("Conversation ending evaluated: {}", record.ending_quality),
        evaluation: Timestamped::new(timestamp, record),
    }
}

pub fn generate_feedback_summary(store: &mut AnalyticsStore, notes: FeedbackNotes) -> FeedbackAck {
    check_rating("generate_feedback_summary", "overall_score", notes.overall_score);

    let summary = scoring::compile_feedback(notes, store);
    let timestamp = store.set_singleton(Singleton::FinalFeedback(summary.clone()));

    info!(
        overall_score = summary.notes.overall_score,
        strengths = %summary.notes.strengths,
        improvements = %summary.notes.areas_for_improvement,
        "Feedback summary generated"
    );

    FeedbackAck {
        status: "generated".to_string(),
        feedback: Timestamped::new(timestamp, summary),
        message: "Comprehensive feedback generated".to_string(),
        save_to_database: true,
    }
}
