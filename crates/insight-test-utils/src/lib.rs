//! Testing utilities for the insight workflow workspace
//!
//! Shared fakes and fixtures: scripted text generators, a failing store, and
//! metric batches used across integration tests.

#![allow(missing_docs)]

use async_trait::async_trait;
use insight_core::{
    BatchRef, GenerationError, InsightRecord, InsightStore, InsightWorkflow, MetricRecord,
    PersistenceError, StoredInsight, TextGenerator, WorkflowConfig,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Response with high-quality insights (scores 1.0)
pub const STRONG_RESPONSE: &str = "\
- Increase the paid search budget by 15% since conversion outperformed every other channel
- Revenue growth is concentrated in the sales category, which reached 30 units this period
- Investigate the marketing funnel: leads fell 12% while spend stayed flat";

/// Response with a single short insight (scores exactly 0.5)
pub const MID_RESPONSE: &str = "Revenue looks stable";

/// Response from which no insight can be extracted (scores 0.0)
pub const EMPTY_RESPONSE: &str = "  \n\n  ";

/// Generator replaying a fixed script of results
///
/// When the script runs out the last entry is repeated.
#[derive(Debug)]
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<String, GenerationError>>>,
    last: Mutex<Option<Result<String, GenerationError>>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicU32,
}

impl ScriptedGenerator {
    pub fn new(script: impl IntoIterator<Item = Result<String, GenerationError>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            last: Mutex::new(None),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicU32::new(0),
        }
    }

    /// Generator that always answers with `response`
    pub fn always(response: &str) -> Self {
        Self::new([Ok(response.to_string())])
    }

    /// Generator answering with each response in turn
    pub fn responses<'a>(responses: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(responses.into_iter().map(|r| Ok(r.to_string())))
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received, in call order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        let mut last = self.last.lock().expect("script lock poisoned");
        let next = self
            .script
            .lock()
            .expect("script lock poisoned")
            .pop_front();
        match next {
            Some(result) => {
                *last = Some(result.clone());
                result
            }
            None => last
                .clone()
                .unwrap_or_else(|| Err(GenerationError::Unavailable("empty script".into()))),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Generator that never answers within any realistic deadline
#[derive(Debug, Default)]
pub struct StallingGenerator {
    calls: AtomicU32,
}

impl StallingGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for StallingGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
        Ok(String::new())
    }

    fn name(&self) -> &str {
        "stalling"
    }
}

/// Store that rejects every commit
#[derive(Debug, Clone)]
pub struct FailingStore {
    error: PersistenceError,
    attempts: Arc<AtomicU32>,
}

impl FailingStore {
    pub fn new(error: PersistenceError) -> Self {
        Self {
            error,
            attempts: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn unavailable() -> Self {
        Self::new(PersistenceError::Unavailable("store offline".into()))
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InsightStore for FailingStore {
    async fn store(
        &self,
        _batch: &BatchRef,
        _records: &[InsightRecord],
    ) -> Result<Vec<StoredInsight>, PersistenceError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}

/// Three records over two categories with increasing values
pub fn mixed_batch_records() -> Vec<MetricRecord> {
    vec![
        MetricRecord::new(1, "revenue", 10.0, "sales"),
        MetricRecord::new(2, "deals_closed", 20.0, "sales"),
        MetricRecord::new(3, "leads", 30.0, "marketing"),
    ]
}

/// Batch of `n` records cycling through four categories
pub fn metric_batch(n: usize) -> Vec<MetricRecord> {
    const CATEGORIES: [&str; 4] = ["sales", "marketing", "ops", "finance"];
    (0..n)
        .map(|i| {
            MetricRecord::new(
                i as i64 + 1,
                format!("metric_{i}"),
                (i as f64) * 1.5 + 3.0,
                CATEGORIES[i % CATEGORIES.len()],
            )
        })
        .collect()
}

/// Config with millisecond backoff for fast tests
pub fn fast_config() -> WorkflowConfig {
    WorkflowConfig::new().with_backoff(Duration::from_millis(5), 2.0, Duration::from_millis(20))
}

/// Workflow over `generator` with [`fast_config`]
pub fn setup_workflow(generator: Arc<dyn TextGenerator>) -> InsightWorkflow {
    InsightWorkflow::new(fast_config(), generator)
}
