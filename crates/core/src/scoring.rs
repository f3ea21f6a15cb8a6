//! Scoring Engine
//!
//! Pure functions that turn analytics into scores and the final feedback report.

use crate::analytics::{AnalyticsStore, FeedbackNotes, FeedbackSummary};

const BASE_SCORE: i32 = 5;
const MIN_SCORE: i32 = 1;
const MAX_SCORE: i32 = 10;

/// Scores how well a conversation ended, on a `1..=10` scale.
///
/// Unrecognised `ending_quality` or `relationship_impact` values contribute nothing,
/// so the function is defined for every input.
pub fn success_score(ending_quality: &str, goal_achieved: bool, relationship_impact: &str) -> u8 {
    let mut score = BASE_SCORE;

    score += match ending_quality {
        "positive" => 3,
        "neutral" => 1,
        "negative" => -2,
        _ => 0,
    };

    if goal_achieved {
        score += 3;
    }

    score += match relationship_impact {
        "strengthened" => 2,
        "weakened" => -2,
        _ => 0,
    };

    score.clamp(MIN_SCORE, MAX_SCORE) as u8
}

/// Compiles the end-of-session report from the agent's notes and the store's contents.
///
/// The embedded counts and tracking copy reflect the store at call time. A previous
/// report held by the store is not embedded.
pub fn compile_feedback(notes: FeedbackNotes, store: &AnalyticsStore) -> FeedbackSummary {
    FeedbackSummary {
        notes,
        conversation_analytics: store.counts(),
        detailed_tracking: store.events().clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{AnalyticsEvent, TechniqueSuggestion};

    #[test]
    fn test_success_score_best_case_is_clamped_to_ten() {
        assert_eq!(success_score("positive", true, "strengthened"), 10);
    }

    #[test]
    fn test_success_score_worst_case() {
        assert_eq!(success_score("negative", false, "weakened"), 1);
    }

    #[test]
    fn test_success_score_components() {
        assert_eq!(success_score("neutral", false, "maintained"), 6);
        assert_eq!(success_score("unresolved", false, "maintained"), 5);
        assert_eq!(success_score("positive", false, "maintained"), 8);
        assert_eq!(success_score("negative", true, "strengthened"), 8);
        assert_eq!(success_score("neutral", true, "weakened"), 7);
    }

    #[test]
    fn test_success_score_is_case_sensitive() {
        // Only the exact lowercase tags carry weight.
        assert_eq!(success_score("Positive", false, "Strengthened"), 5);
    }

    #[test]
    fn test_success_score_is_always_bounded() {
        let qualities = ["positive", "neutral", "negative", "unresolved", ""];
        let impacts = ["strengthened", "maintained", "weakened", "unknown"];
        for quality in qualities {
            for impact in impacts {
                for achieved in [true, false] {
                    let score = success_score(quality, achieved, impact);
                    assert!((1..=10).contains(&score), "{quality}/{achieved}/{impact} -> {score}");
                }
            }
        }
    }

    #[test]
    fn test_compile_feedback_counts_current_sequences() {
        let mut store = AnalyticsStore::new();
        for _ in 0..3 {
            store.append(AnalyticsEvent::Technique(TechniqueSuggestion {
                technique: "i_statements".to_string(),
                situation: "blaming language".to_string(),
                priority: "medium".to_string(),
            }));
        }

        let notes = FeedbackNotes {
            strengths: "Stayed calm".to_string(),
            areas_for_improvement: "Ask more questions".to_string(),
            specific_examples: "Paused before answering".to_string(),
            recommended_practice: "Active listening".to_string(),
            overall_score: 7.0,
        };
        let summary = compile_feedback(notes.clone(), &store);

        assert_eq!(summary.notes, notes);
        assert_eq!(summary.conversation_analytics.technique_suggestions, 3);
        assert_eq!(summary.conversation_analytics.total_milestones, 0);
        assert_eq!(summary.detailed_tracking.technique_suggestions.len(), 3);
    }
}
