//! Conversation Analytics Store
//!
//! This module holds the in-memory event log a worker accumulates while a practice
//! conversation is running. Events are partitioned by category into independently
//! growing sequences whose insertion order is the chronological order of the tool
//! calls that produced them. Two singleton slots hold the ending evaluation and the
//! final feedback report; writing either one replaces the previous value.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A record stamped with the moment it entered the store.
///
/// Serializes as the record's own fields plus a `timestamp` key (RFC 3339).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Timestamped<T> {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub record: T,
}

impl<T> Timestamped<T> {
    pub fn new(timestamp: DateTime<Utc>, record: T) -> Self {
        Self { timestamp, record }
    }
}

// --- Event Records ---

/// How the user communicated during one stretch of the conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QualityRecord {
    pub tone: String,
    pub clarity: f64,
    pub empathy_shown: bool,
    pub listening_quality: f64,
    /// Mean of `clarity` and `listening_quality`.
    pub overall_score: f64,
}

/// A notable moment such as a breakthrough, a conflict or a deflection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Milestone {
    #[serde(rename = "type")]
    pub milestone_type: String,
    pub description: String,
    pub user_response_quality: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GoalAssessment {
    pub goal_alignment: f64,
    pub progress_notes: String,
    pub obstacles_encountered: String,
    pub on_track: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmotionalRecord {
    pub user_emotion: String,
    pub persona_emotion: String,
    pub emotional_shift: bool,
    /// Whether the user's emotion is one of the constructive ones.
    pub emotional_alignment: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TechniqueSuggestion {
    pub technique: String,
    pub situation: String,
    pub priority: String,
}

/// How the conversation concluded, with the derived success score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EndingEvaluation {
    pub ending_quality: String,
    pub goal_achieved: bool,
    pub relationship_impact: String,
    pub key_takeaways: String,
    /// Always within `1..=10`.
    pub success_score: u8,
}

/// The agent's free-text verdict on the whole conversation.
///
/// This is also the argument shape of the `generate_feedback_summary` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct FeedbackNotes {
    #[schemars(description = "What user did well")]
    pub strengths: String,
    #[schemars(description = "What to work on")]
    pub areas_for_improvement: String,
    #[schemars(description = "Concrete examples from conversation")]
    pub specific_examples: String,
    #[schemars(description = "What to practice next")]
    pub recommended_practice: String,
    #[schemars(description = "Overall performance 1-10")]
    pub overall_score: f64,
}

/// Sequence lengths at the moment a feedback report was compiled.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalyticsCounts {
    pub total_milestones: usize,
    pub quality_checks: usize,
    pub goal_assessments: usize,
    pub emotional_shifts: usize,
    pub technique_suggestions: usize,
}

/// The compiled end-of-session report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedbackSummary {
    #[serde(flatten)]
    pub notes: FeedbackNotes,
    pub conversation_analytics: AnalyticsCounts,
    pub detailed_tracking: EventLog,
}

// --- Store ---

/// One observation reported by the agent, tagged by category.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalyticsEvent {
    Quality(QualityRecord),
    Milestone(Milestone),
    GoalProgress(GoalAssessment),
    Emotion(EmotionalRecord),
    Technique(TechniqueSuggestion),
}

/// A value for one of the store's last-write-wins slots.
#[derive(Debug, Clone, PartialEq)]
pub enum Singleton {
    EndingEvaluation(EndingEvaluation),
    FinalFeedback(FeedbackSummary),
}

/// The category-partitioned event sequences plus the ending evaluation.
///
/// Field names match the keys of the serialized analytics document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EventLog {
    pub quality_tracking: Vec<Timestamped<QualityRecord>>,
    pub milestones: Vec<Timestamped<Milestone>>,
    pub goal_progress: Vec<Timestamped<GoalAssessment>>,
    pub emotional_tracking: Vec<Timestamped<EmotionalRecord>>,
    pub technique_suggestions: Vec<Timestamped<TechniqueSuggestion>>,
    pub ending_evaluation: Option<Timestamped<EndingEvaluation>>,
}

impl EventLog {
    pub fn counts(&self) -> AnalyticsCounts {
        AnalyticsCounts {
            total_milestones: self.milestones.len(),
            quality_checks: self.quality_tracking.len(),
            goal_assessments: self.goal_progress.len(),
            emotional_shifts: self.emotional_tracking.len(),
            technique_suggestions: self.technique_suggestions.len(),
        }
    }
}

/// A full copy of the store at one instant.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AnalyticsSnapshot {
    #[serde(flatten)]
    pub events: EventLog,
    pub final_feedback: Option<Timestamped<FeedbackSummary>>,
}

impl AnalyticsSnapshot {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// The per-session analytics store, owned by the worker's session context.
///
/// All operations are infallible and amortized O(1) except `snapshot`, which clones.
/// Callers that share a store across tasks wrap it in a mutex so that each
/// sequence keeps its chronological order.
#[derive(Debug, Default)]
pub struct AnalyticsStore {
    events: EventLog,
    final_feedback: Option<Timestamped<FeedbackSummary>>,
}

impl AnalyticsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamps `event` with the current time and appends it to its category.
    pub fn append(&mut self, event: AnalyticsEvent) -> DateTime<Utc> {
        let now = Utc::now();
        match event {
            AnalyticsEvent::Quality(r) => self.events.quality_tracking.push(Timestamped::new(now, r)),
            AnalyticsEvent::Milestone(r) => self.events.milestones.push(Timestamped::new(now, r)),
            AnalyticsEvent::GoalProgress(r) => self.events.goal_progress.push(Timestamped::new(now, r)),
            AnalyticsEvent::Emotion(r) => self.events.emotional_tracking.push(Timestamped::new(now, r)),
            AnalyticsEvent::Technique(r) => {
                self.events.technique_suggestions.push(Timestamped::new(now, r))
            }
        }
        now
    }

    /// Stamps `value` with the current time and overwrites its slot.
    pub fn set_singleton(&mut self, value: Singleton) -> DateTime<Utc> {
        let now = Utc::now();
        match value {
            Singleton::EndingEvaluation(e) => {
                self.events.ending_evaluation = Some(Timestamped::new(now, e))
            }
            Singleton::FinalFeedback(f) => self.final_feedback = Some(Timestamped::new(now, f)),
        }
        now
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn final_feedback(&self) -> Option<&Timestamped<FeedbackSummary>> {
        self.final_feedback.as_ref()
    }

    pub fn counts(&self) -> AnalyticsCounts {
        self.events.counts()
    }

    pub fn snapshot(&self) -> AnalyticsSnapshot {
        AnalyticsSnapshot {
            events: self.events.clone(),
            final_feedback: self.final_feedback.clone(),
        }
    }

    /// Clears every sequence and both singleton slots.
    pub fn reset(&mut self) {
        self.events = EventLog::default();
        self.final_feedback = None;
    }
}
