//! Insight workflow engine
//!
//! Owns the control loop of one run:
//!
//! ```text
//! Analyze → Generate → Quality gate → Router ─┬─► Generate (retry_count < max_retries)
//!                                             └─► Format → Done
//! ```
//!
//! The regenerate cycle is an explicit loop bounded by `max_retries`, so a
//! run makes at most `max_retries + 1` generate calls. Each run owns its
//! state exclusively; concurrent runs share nothing but the generator.

use crate::error::WorkflowError;
use crate::generator::TextGenerator;
use crate::nodes::analyze::{self, Analysis};
use crate::nodes::router::{self, Route};
use crate::nodes::{format, generate, quality};
use crate::state::WorkflowState;
use crate::state_machine::{PhaseTracker, WorkflowPhase};
use crate::store::{InsightStore, StoredInsight};
use crate::types::{
    BatchId, BatchRef, Confidence, InsightRecord, Message, MetricRecord, QualityBand,
    WorkflowConfig,
};
use futures::future::join_all;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::Instrument;

/// Successful result of a run
#[derive(Debug, Clone)]
pub struct WorkflowOutcome {
    /// Batch the run was invoked for
    pub batch_id: BatchId,
    /// Formatted insights
    pub records: Vec<InsightRecord>,
    /// Final confidence
    pub confidence: Confidence,
    /// Band of the final confidence
    pub band: QualityBand,
    /// Regeneration budget ran out while quality was still low
    pub forced_acceptance: bool,
    /// Generate invocations made
    pub generate_calls: u32,
    /// Regenerations performed
    pub retry_count: u32,
    /// Summary statistics of the batch
    pub analysis: Analysis,
    /// Request/response history
    pub history: Vec<Message>,
    /// Phase trail
    pub phases: Vec<WorkflowPhase>,
}

impl WorkflowOutcome {
    /// Check if the result is low-confidence
    #[inline]
    #[must_use]
    pub fn is_low_confidence(&self) -> bool {
        self.forced_acceptance || self.band == QualityBand::Weak
    }
}

/// Run result together with the committed records
#[derive(Debug, Clone)]
pub struct PersistedOutcome {
    /// Workflow result
    pub outcome: WorkflowOutcome,
    /// Records as stored
    pub stored: Vec<StoredInsight>,
}

/// The insight-generation workflow
pub struct InsightWorkflow {
    /// Configuration
    config: WorkflowConfig,
    /// Text-generation collaborator
    generator: Arc<dyn TextGenerator>,
}

impl std::fmt::Debug for InsightWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InsightWorkflow")
            .field("config", &self.config)
            .field("generator", &self.generator.name())
            .finish()
    }
}

impl InsightWorkflow {
    /// Create new workflow
    #[inline]
    #[must_use]
    pub fn new(config: WorkflowConfig, generator: Arc<dyn TextGenerator>) -> Self {
        Self { config, generator }
    }

    /// Run the workflow over a metric batch
    ///
    /// # Arguments
    /// * `records` - Metric batch, treated as a read-only snapshot
    /// * `deadline` - Deadline for the whole run; falls back to
    ///   `config.run_deadline_ms`
    ///
    /// # Errors
    /// - `WorkflowError::Input` for an empty or malformed batch
    /// - `WorkflowError::Llm` when text generation exhausted its retries
    /// - `WorkflowError::Timeout` when the deadline passed
    pub async fn run(
        &self,
        records: Vec<MetricRecord>,
        deadline: Option<Instant>,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        self.run_batch(BatchId::new(), records, deadline).await
    }

    /// Run the workflow and commit its records
    ///
    /// Records are committed only after formatting succeeded; a failed run
    /// persists nothing. Persistence failures are returned unchanged.
    pub async fn run_and_persist(
        &self,
        batch_id: BatchId,
        records: Vec<MetricRecord>,
        deadline: Option<Instant>,
        store: &dyn InsightStore,
    ) -> Result<PersistedOutcome, WorkflowError> {
        let batch = BatchRef::from_records(batch_id, &records);
        let outcome = self.run_batch(batch_id, records, deadline).await?;
        let stored = store.store(&batch, &outcome.records).await?;
        tracing::info!(batch = %batch_id, stored = stored.len(), "insights persisted");
        Ok(PersistedOutcome { outcome, stored })
    }

    /// Run independent batches concurrently
    pub async fn run_concurrent(
        &self,
        batches: Vec<Vec<MetricRecord>>,
        deadline: Option<Instant>,
    ) -> Vec<Result<WorkflowOutcome, WorkflowError>> {
        join_all(
            batches
                .into_iter()
                .map(|records| self.run(records, deadline)),
        )
        .await
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    async fn run_batch(
        &self,
        batch_id: BatchId,
        records: Vec<MetricRecord>,
        deadline: Option<Instant>,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        let span = tracing::info_span!("insight_workflow", batch = %batch_id, records = records.len());
        async move {
            self.config.validate()?;
            let started = Instant::now();
            // An unrepresentable deadline means no deadline
            let deadline = deadline.or_else(|| {
                self.config
                    .run_deadline()
                    .and_then(|limit| started.checked_add(limit))
            });

            let result = match deadline {
                Some(deadline) => {
                    match tokio::time::timeout_at(deadline, self.execute(batch_id, records)).await
                    {
                        Ok(result) => result,
                        Err(_) => Err(WorkflowError::Timeout {
                            elapsed_ms: started.elapsed().as_millis() as u64,
                        }),
                    }
                }
                None => self.execute(batch_id, records).await,
            };

            match &result {
                Ok(outcome) => tracing::info!(
                    insights = outcome.records.len(),
                    confidence = outcome.confidence.value(),
                    generate_calls = outcome.generate_calls,
                    forced = outcome.forced_acceptance,
                    "workflow completed"
                ),
                Err(e) => tracing::error!(error = %e, "workflow failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        batch_id: BatchId,
        records: Vec<MetricRecord>,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        let mut phases = PhaseTracker::new();
        match self.drive(batch_id, records, &mut phases).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                let failed_at = phases.current();
                if phases.advance(WorkflowPhase::Failed).is_err() {
                    tracing::warn!(phase = ?failed_at, "failure after terminal phase");
                }
                tracing::debug!(phases = ?phases.trail(), "run failed at {:?}", failed_at);
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        batch_id: BatchId,
        records: Vec<MetricRecord>,
        phases: &mut PhaseTracker,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        analyze::validate_records(&records)?;
        let mut state = WorkflowState::new(records);

        let update = analyze::run(state.input_records())?;
        state.apply(update)?;
        phases.advance(WorkflowPhase::Analyzed)?;

        let mut generate_calls = 0u32;
        let forced_acceptance = loop {
            let update = generate::run(
                self.generator.as_ref(),
                state.analysis(),
                state.input_records(),
                state.history(),
                &self.config,
            )
            .await?;
            generate_calls += 1;
            state.apply(update)?;
            phases.advance(WorkflowPhase::Generated)?;

            let (update, _report) = quality::run(state.insights());
            state.apply(update)?;
            phases.advance(WorkflowPhase::Gated)?;

            let (next, update) = router::run(
                state.routing_label(),
                state.retry_count(),
                self.config.max_retries,
            );
            if let Some(update) = update {
                state.apply(update)?;
            }
            match next {
                Route::Generate { retry_count } => {
                    tracing::info!(
                        retry_count,
                        confidence = state.confidence().value(),
                        "low confidence, regenerating"
                    );
                    phases.advance(WorkflowPhase::Regenerating)?;
                }
                Route::Format { forced } => break forced,
            }
        };

        let confidence = state.confidence();
        if forced_acceptance {
            tracing::warn!(
                confidence = confidence.value(),
                retries = state.retry_count(),
                "regeneration budget exhausted, accepting low-confidence insights"
            );
        }

        let records = format::format_insights(state.insights(), confidence);
        phases.advance(WorkflowPhase::Formatted)?;
        phases.advance(WorkflowPhase::Done)?;

        let retry_count = state.retry_count();
        let (history, _insights, analysis) = state.into_parts();
        Ok(WorkflowOutcome {
            batch_id,
            records,
            confidence,
            band: confidence.band(),
            forced_acceptance,
            generate_calls,
            retry_count,
            analysis,
            history,
            phases: std::mem::take(phases).into_trail(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{GenerationError, InputError};
    use crate::generator::MockTextGenerator;
    use crate::types::InsightType;
    use async_trait::async_trait;
    use std::time::Duration;

    const STRONG: &str = "- Increase the paid search budget by 15% because conversion outperformed every channel\n\
                          - Revenue growth is concentrated in the sales category at 30 units";

    fn records() -> Vec<MetricRecord> {
        vec![
            MetricRecord::new(1, "revenue", 10.0, "sales"),
            MetricRecord::new(2, "deals", 20.0, "sales"),
            MetricRecord::new(3, "leads", 30.0, "marketing"),
        ]
    }

    fn fast_config() -> WorkflowConfig {
        WorkflowConfig::default().with_backoff(
            Duration::from_millis(10),
            2.0,
            Duration::from_millis(40),
        )
    }

    fn mock_returning(times: usize, response: &'static str) -> MockTextGenerator {
        let mut generator = MockTextGenerator::new();
        generator
            .expect_generate()
            .times(times)
            .returning(move |_| Ok(response.to_string()));
        generator.expect_name().return_const("mock".to_string());
        generator
    }

    #[tokio::test]
    async fn strong_insights_finish_in_one_pass() {
        let workflow = InsightWorkflow::new(fast_config(), Arc::new(mock_returning(1, STRONG)));
        let outcome = workflow.run(records(), None).await.unwrap();

        assert_eq!(outcome.generate_calls, 1);
        assert_eq!(outcome.retry_count, 0);
        assert_eq!(outcome.confidence.value(), 1.0);
        assert_eq!(outcome.band, QualityBand::Strong);
        assert!(!outcome.forced_acceptance);
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.records[0].kind, InsightType::Observation);
        assert_eq!(outcome.records[1].kind, InsightType::Trend);
        assert_eq!(outcome.history.len(), 2);
        assert_eq!(
            outcome.phases,
            vec![
                WorkflowPhase::Start,
                WorkflowPhase::Analyzed,
                WorkflowPhase::Generated,
                WorkflowPhase::Gated,
                WorkflowPhase::Formatted,
                WorkflowPhase::Done,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn weak_output_regenerates_exactly_max_retries_plus_one_times() {
        let workflow = InsightWorkflow::new(
            fast_config().with_max_retries(2),
            Arc::new(mock_returning(3, "   \n")),
        );
        let outcome = workflow.run(records(), None).await.unwrap();

        assert_eq!(outcome.generate_calls, 3);
        assert_eq!(outcome.retry_count, 2);
        assert!(outcome.forced_acceptance);
        assert!(outcome.is_low_confidence());
        assert_eq!(outcome.confidence, Confidence::ZERO);
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.history.len(), 6);
    }

    #[tokio::test]
    async fn mid_range_confidence_is_accepted_without_retry() {
        let workflow = InsightWorkflow::new(
            fast_config(),
            Arc::new(mock_returning(1, "Revenue looks stable")),
        );
        let outcome = workflow.run(records(), None).await.unwrap();

        assert_eq!(outcome.confidence.value(), 0.5);
        assert_eq!(outcome.band, QualityBand::Acceptable);
        assert_eq!(outcome.generate_calls, 1);
        assert!(!outcome.forced_acceptance);
        assert_eq!(outcome.records[0].kind, InsightType::Observation);
    }

    #[tokio::test]
    async fn empty_batch_never_calls_generator() {
        let mut generator = MockTextGenerator::new();
        generator.expect_generate().never();
        generator.expect_name().return_const("mock".to_string());
        let workflow = InsightWorkflow::new(fast_config(), Arc::new(generator));

        let err = workflow.run(Vec::new(), None).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Input(InputError::EmptyBatch)));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_transient_failures_surface_llm_error() {
        let mut generator = MockTextGenerator::new();
        generator
            .expect_generate()
            .times(3)
            .returning(|_| Err(GenerationError::Timeout));
        generator.expect_name().return_const("mock".to_string());
        let workflow = InsightWorkflow::new(fast_config(), Arc::new(generator));

        let err = workflow.run(records(), None).await.unwrap_err();
        match err {
            WorkflowError::Llm(e) => {
                assert_eq!(e.attempts, 3);
                assert_eq!(e.last, GenerationError::Timeout);
            }
            other => panic!("expected LLM error, got {other:?}"),
        }
    }

    struct Stalling;

    #[async_trait]
    impl TextGenerator for Stalling {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(String::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_cancels_in_flight_generation() {
        let workflow = InsightWorkflow::new(fast_config(), Arc::new(Stalling));
        let deadline = Instant::now() + Duration::from_secs(5);

        let err = workflow.run(records(), Some(deadline)).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Timeout { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn configured_deadline_applies_when_caller_gives_none() {
        let config = fast_config().with_run_deadline(Duration::from_secs(2));
        let workflow = InsightWorkflow::new(config, Arc::new(Stalling));

        let err = workflow.run(records(), None).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Timeout { .. }));
    }

    #[tokio::test]
    async fn huge_configured_deadline_runs_without_one() {
        let mut config = fast_config();
        config.run_deadline_ms = Some(u64::MAX);
        let workflow = InsightWorkflow::new(config, Arc::new(mock_returning(1, STRONG)));

        let outcome = workflow.run(records(), None).await.unwrap();
        assert_eq!(outcome.generate_calls, 1);
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_before_running() {
        let mut generator = MockTextGenerator::new();
        generator.expect_generate().never();
        generator.expect_name().return_const("mock".to_string());
        let workflow = InsightWorkflow::new(
            fast_config().with_generate_attempts(0),
            Arc::new(generator),
        );

        let err = workflow.run(records(), None).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Config(_)));
    }
}
