//! Format step
//!
//! Ordered keyword classification; the first vocabulary that matches wins.

use crate::types::{Confidence, InsightRecord, InsightType};

/// Classification vocabularies in match order
pub const VOCABULARIES: &[(InsightType, &[&str])] = &[
    (
        InsightType::Trend,
        &["trend", "increasing", "decreasing", "growth"],
    ),
    (InsightType::Risk, &["risk", "warning", "concern", "issue"]),
    (
        InsightType::Opportunity,
        &["opportunity", "potential", "growth", "improve"],
    ),
    (
        InsightType::Recommendation,
        &["recommend", "should", "consider", "suggest"],
    ),
];

/// Classify a single insight
#[must_use]
pub fn classify(insight: &str) -> InsightType {
    let lower = insight.to_lowercase();
    VOCABULARIES
        .iter()
        .find(|(_, words)| words.iter().any(|word| lower.contains(word)))
        .map_or(InsightType::Observation, |(kind, _)| *kind)
}

/// Shape accumulated insights into output records, preserving order
#[must_use]
pub fn format_insights(insights: &[String], confidence: Confidence) -> Vec<InsightRecord> {
    insights
        .iter()
        .map(|text| InsightRecord {
            text: text.clone(),
            kind: classify(text),
            confidence,
        })
        .collect()
}
