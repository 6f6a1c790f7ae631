//! Insight Core - bounded insight-generation workflow
//!
//! Turns a batch of business metrics into classified, scored insights:
//! - Summarizes the batch (count, categories, range, patterns)
//! - Asks a text generator for insights, retrying transient failures
//! - Scores the insights and regenerates weak output within a fixed budget
//! - Classifies and formats the accepted insights
//! - Commits them all-or-nothing to an insight store
//!
//! # Example
//!
//! ```rust,ignore
//! use insight_core::{InsightWorkflow, MetricRecord, WorkflowConfig};
//! use std::sync::Arc;
//!
//! # async fn example(generator: Arc<dyn insight_core::TextGenerator>) -> Result<(), Box<dyn std::error::Error>> {
//! let workflow = InsightWorkflow::new(WorkflowConfig::new(), generator);
//!
//! let records = vec![MetricRecord::new(1, "revenue", 120.0, "sales")];
//! let outcome = workflow.run(records, None).await?;
//!
//! println!("{} insights at {}", outcome.records.len(), outcome.confidence);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod engine;
pub mod error;
pub mod generator;
pub mod nodes;
pub mod state;
pub mod state_machine;
pub mod store;
pub mod types;

pub use engine::{InsightWorkflow, PersistedOutcome, WorkflowOutcome};
pub use error::{
    ConfigError, GenerationError, InputError, LlmError, PersistenceError, StateMachineError,
    WorkflowError,
};
pub use generator::{call_with_retry, RetryPolicy, TextGenerator};
pub use nodes::{Analysis, Pattern, QualityReport, Route};
pub use state::{StateField, StateUpdate, StepKind, WorkflowState};
pub use state_machine::{PhaseTracker, WorkflowPhase};
pub use store::{InMemoryInsightStore, InsightId, InsightStore, StoredInsight};
pub use types::{
    BatchId, BatchRef, Confidence, InsightRecord, InsightType, Message, MetricId, MetricRecord,
    QualityBand, Role, RoutingLabel, WorkflowConfig,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running the workflow
    pub use crate::{
        BatchId, Confidence, InMemoryInsightStore, InsightRecord, InsightStore, InsightType,
        InsightWorkflow, MetricRecord, TextGenerator, WorkflowConfig, WorkflowError,
        WorkflowOutcome,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
