//! Subcommand implementations

use crate::config::{AgentConfig, LlmConfig};
use insight_core::nodes::{format, quality};
use insight_core::{
    BatchId, Confidence, InMemoryInsightStore, InsightRecord, InsightWorkflow, MetricRecord,
    QualityBand, QualityReport, RoutingLabel, StoredInsight, TextGenerator, WorkflowError,
};
use insight_llm::OpenAiGenerator;
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

/// Exit code for a failed run
pub const EXIT_FAILURE: i32 = 1;
/// Exit code for unusable input
pub const EXIT_INPUT_ERROR: i32 = 2;

/// Result of `run`
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Batch the insights were committed under
    pub batch_id: BatchId,
    /// Final confidence
    pub confidence: Confidence,
    /// Quality band of `confidence`
    pub band: QualityBand,
    /// Accepted only because the regeneration budget ran out
    pub forced_acceptance: bool,
    /// Generate step invocations
    pub generate_calls: u32,
    /// Regenerations taken
    pub retry_count: u32,
    /// Committed insights, in output order
    pub insights: Vec<StoredInsight>,
}

/// Result of `score`
#[derive(Debug, Clone, Serialize)]
pub struct ScoreReport {
    /// Heuristic breakdown
    pub quality: QualityReport,
    /// Quality band of the confidence
    pub band: QualityBand,
    /// What the quality gate would decide
    pub decision: RoutingLabel,
    /// Classified lines
    pub records: Vec<InsightRecord>,
}

/// Build the HTTP generator described by `llm`
///
/// An empty `api_key_env` means the endpoint needs no authentication.
pub fn build_generator(llm: &LlmConfig) -> anyhow::Result<OpenAiGenerator> {
    let generator = if llm.api_key_env.trim().is_empty() {
        OpenAiGenerator::new(&llm.model, &llm.base_url, llm.request_timeout())?
    } else {
        OpenAiGenerator::from_env(
            &llm.model,
            &llm.base_url,
            &llm.api_key_env,
            llm.request_timeout(),
        )?
    };
    Ok(generator.with_temperature(llm.temperature))
}

/// Run the workflow over one batch and commit it to an in-memory store
///
/// A `deadline` too far out to represent runs without one.
pub async fn run_batch(
    config: &AgentConfig,
    generator: Arc<dyn TextGenerator>,
    records: Vec<MetricRecord>,
    deadline: Option<Duration>,
) -> Result<RunReport, WorkflowError> {
    let workflow = InsightWorkflow::new(config.workflow.clone(), generator);
    let store = InMemoryInsightStore::new();
    let deadline = deadline.and_then(|limit| tokio::time::Instant::now().checked_add(limit));

    let persisted = workflow
        .run_and_persist(BatchId::new(), records, deadline, &store)
        .await?;
    let outcome = persisted.outcome;
    Ok(RunReport {
        batch_id: outcome.batch_id,
        confidence: outcome.confidence,
        band: outcome.band,
        forced_acceptance: outcome.forced_acceptance,
        generate_calls: outcome.generate_calls,
        retry_count: outcome.retry_count,
        insights: persisted.stored,
    })
}

/// Score and classify insight lines offline
#[must_use]
pub fn score_lines(lines: &[String]) -> ScoreReport {
    let insights: Vec<String> = lines
        .iter()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();
    let report = quality::assess(&insights);
    ScoreReport {
        band: report.confidence.band(),
        decision: quality::decide(report.confidence),
        records: format::format_insights(&insights, report.confidence),
        quality: report,
    }
}

/// Plain-text rendering of a run
#[must_use]
pub fn render_run(report: &RunReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Batch {}", report.batch_id);
    let _ = writeln!(
        out,
        "Confidence: {} ({:?}){}",
        report.confidence,
        report.band,
        if report.forced_acceptance {
            ", accepted after exhausting retries"
        } else {
            ""
        }
    );
    let _ = writeln!(
        out,
        "Generate calls: {}  Retries: {}",
        report.generate_calls, report.retry_count
    );
    let _ = writeln!(out);
    if report.insights.is_empty() {
        let _ = writeln!(out, "No insights produced.");
    }
    for insight in &report.insights {
        let _ = writeln!(
            out,
            "{:>4}  {:<14} {}",
            insight.id.0,
            insight.record.kind.as_str(),
            insight.record.text
        );
    }
    out
}

/// Plain-text rendering of a score
#[must_use]
pub fn render_score(report: &ScoreReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Confidence: {} ({:?}) -> {}",
        report.quality.confidence, report.band, report.decision
    );
    let _ = writeln!(
        out,
        "Insights: {}  Avg length: {:.1}  Numbers: {}  Action words: {}",
        report.quality.insight_count,
        report.quality.average_length,
        report.quality.has_numbers,
        report.quality.has_action_words
    );
    for record in &report.records {
        let _ = writeln!(out, "  {:<14} {}", record.kind.as_str(), record.text);
    }
    out
}

/// Process exit code for a run failure
#[must_use]
pub fn exit_code(err: &WorkflowError) -> i32 {
    if err.is_input_error() {
        EXIT_INPUT_ERROR
    } else {
        EXIT_FAILURE
    }
}
