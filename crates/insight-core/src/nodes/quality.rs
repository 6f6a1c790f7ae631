//! Quality gate
//!
//! Table-driven scoring of the accumulated insights and the ordered
//! three-way routing decision. Scores are summed in integer hundredths.

use crate::state::{StateUpdate, StepKind};
use crate::types::{Confidence, RoutingLabel};
use serde::{Deserialize, Serialize};

/// Base score of a non-empty insight set
pub const BASE_POINTS: u32 = 50;
/// Bonus when the average insight is longer than [`LENGTH_THRESHOLD`]
pub const LENGTH_POINTS: u32 = 20;
/// Bonus when any insight contains a digit
pub const NUMBER_POINTS: u32 = 10;
/// Bonus when any insight contains an action word
pub const ACTION_POINTS: u32 = 20;
/// Average length (in characters) that must be exceeded
pub const LENGTH_THRESHOLD: f64 = 50.0;

/// Accept at or above this score
pub const ACCEPT_POINTS: u32 = 70;
/// Regenerate below this score
pub const REGENERATE_BELOW_POINTS: u32 = 50;

/// Words that mark an insight as actionable
pub const ACTION_WORDS: &[&str] = &[
    "increase",
    "reduce",
    "investigate",
    "optimize",
    "recommend",
    "should",
    "consider",
    "suggest",
];

/// Breakdown of a score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Number of insights scored
    pub insight_count: usize,
    /// Mean length in characters
    pub average_length: f64,
    /// Any insight contains a digit
    pub has_numbers: bool,
    /// Any insight contains an action word
    pub has_action_words: bool,
    /// Resulting score
    pub confidence: Confidence,
}

/// Score an insight sequence
#[must_use]
pub fn assess(insights: &[String]) -> QualityReport {
    if insights.is_empty() {
        return QualityReport {
            insight_count: 0,
            average_length: 0.0,
            has_numbers: false,
            has_action_words: false,
            confidence: Confidence::ZERO,
        };
    }

    let total_chars: usize = insights.iter().map(|i| i.chars().count()).sum();
    let average_length = total_chars as f64 / insights.len() as f64;
    let has_numbers = insights
        .iter()
        .any(|i| i.chars().any(|c| c.is_ascii_digit()));
    let has_action_words = insights.iter().any(|i| contains_action_word(i));

    let mut points = BASE_POINTS;
    if average_length > LENGTH_THRESHOLD {
        points += LENGTH_POINTS;
    }
    if has_numbers {
        points += NUMBER_POINTS;
    }
    if has_action_words {
        points += ACTION_POINTS;
    }

    QualityReport {
        insight_count: insights.len(),
        average_length,
        has_numbers,
        has_action_words,
        confidence: Confidence::from_points(points),
    }
}

/// Confidence of an insight sequence
#[inline]
#[must_use]
pub fn score(insights: &[String]) -> Confidence {
    assess(insights).confidence
}

/// Ordered decision rule; first match wins
#[must_use]
pub fn decide(confidence: Confidence) -> RoutingLabel {
    let points = confidence.points();
    if points >= ACCEPT_POINTS {
        RoutingLabel::End
    } else if points < REGENERATE_BELOW_POINTS {
        RoutingLabel::Regenerate
    } else {
        // Acceptable but not strong; accepted to bound cost.
        RoutingLabel::End
    }
}

/// Quality gate step: replaces `confidence` and `routing_label`
pub fn run(insights: &[String]) -> (StateUpdate, QualityReport) {
    let report = assess(insights);
    let label = decide(report.confidence);
    tracing::debug!(
        insights = report.insight_count,
        confidence = report.confidence.value(),
        label = %label,
        "quality gate"
    );
    let update = StateUpdate::new(StepKind::QualityGate)
        .replace_confidence(report.confidence)
        .replace_routing_label(label);
    (update, report)
}

fn contains_action_word(insight: &str) -> bool {
    let lower = insight.to_lowercase();
    ACTION_WORDS.iter().any(|word| lower.contains(word))
}
