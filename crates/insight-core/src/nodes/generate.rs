//! Generate step
//!
//! Builds the request from the analysis and history, calls the text
//! generator, and splits the response into discrete insights.

use crate::error::LlmError;
use crate::generator::{call_with_retry, RetryPolicy, TextGenerator};
use crate::nodes::analyze::Analysis;
use crate::state::{StateUpdate, StepKind};
use crate::types::{Message, MetricRecord, Role, WorkflowConfig};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Write as _;

static MARKED_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[-*•]|\d{1,2}[.)])\s+(.+)$").expect("bullet pattern is valid"));

/// Build the natural-language request
#[must_use]
pub fn build_prompt(
    analysis: &Analysis,
    records: &[MetricRecord],
    history: &[Message],
    config: &WorkflowConfig,
) -> String {
    let categories: Vec<&str> = analysis.categories.iter().map(String::as_str).collect();
    let patterns = if analysis.patterns.is_empty() {
        "none".to_string()
    } else {
        analysis
            .patterns
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut prompt = String::new();
    prompt.push_str(
        "As a business analyst, analyze the following metrics and generate actionable insights.\n\n",
    );
    prompt.push_str("Metrics summary:\n");
    let _ = writeln!(prompt, "- Total metrics: {}", analysis.count);
    let _ = writeln!(prompt, "- Categories: {}", categories.join(", "));
    let _ = writeln!(
        prompt,
        "- Value range: {:.2} to {:.2}",
        analysis.min, analysis.max
    );
    let _ = writeln!(prompt, "- Average value: {:.2}", analysis.mean);
    let _ = writeln!(prompt, "- Patterns identified: {patterns}");

    let samples = records.iter().take(config.sample_metrics);
    if config.sample_metrics > 0 {
        prompt.push_str("\nSample metrics:\n");
        for record in samples {
            let _ = writeln!(
                prompt,
                "- {}: {} ({})",
                record.name, record.value, record.category
            );
        }
    }

    prompt.push_str(
        "\nGenerate 3-5 actionable business insights. Focus on:\n\
         1. Trends and patterns\n\
         2. Anomalies or outliers\n\
         3. Business recommendations\n\
         4. Risk indicators\n\
         5. Growth opportunities\n\n\
         Format each insight as a bulleted line with a clear, actionable statement.\n",
    );

    let previous_attempts = history.iter().filter(|m| m.role == Role::Human).count();
    if previous_attempts > 0 {
        let _ = write!(
            prompt,
            "\nThis is attempt {} of this request. Earlier insights were judged too weak: \
             be more specific, cite figures from the data, and state concrete actions.\n",
            previous_attempts + 1
        );
    }

    prompt
}

/// Split a response into discrete insights
///
/// Bulleted or numbered lines are taken with their marker removed. A response
/// without any marked line is read one insight per non-empty line. At most
/// `limit` insights are returned.
#[must_use]
pub fn extract_insights(response: &str, limit: usize) -> Vec<String> {
    let lines: Vec<&str> = response
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let marked: Vec<String> = lines
        .iter()
        .filter_map(|line| MARKED_LINE.captures(line))
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|text| !text.is_empty())
        .collect();

    let insights = if marked.is_empty() {
        lines.into_iter().map(str::to_string).collect()
    } else {
        marked
    };

    insights.into_iter().take(limit).collect()
}

/// Generate step: produces an update appending insights and one
/// request/response pair to history
///
/// # Errors
/// `LlmError` when the generator's transient retry budget is exhausted.
pub async fn run(
    generator: &dyn TextGenerator,
    analysis: &Analysis,
    records: &[MetricRecord],
    history: &[Message],
    config: &WorkflowConfig,
) -> Result<StateUpdate, LlmError> {
    let prompt = build_prompt(analysis, records, history, config);
    let policy = RetryPolicy::from_config(config);
    let response = call_with_retry(generator, &prompt, &policy).await?;

    let insights = extract_insights(&response, config.max_insights_per_response);
    tracing::debug!(
        extracted = insights.len(),
        response_chars = response.chars().count(),
        "generated insights"
    );

    Ok(StateUpdate::new(StepKind::Generate)
        .append_insights(insights)
        .append_history([Message::human(prompt), Message::assistant(response)]))
}
