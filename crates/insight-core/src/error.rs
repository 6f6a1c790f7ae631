//! Error types for the insight workflow
//!
//! Provides the typed failure taxonomy of a run:
//! - Bad metric input (fatal, never retried)
//! - Text-generation failures that exhausted their retry budget
//! - Whole-run deadline expiry
//! - Persistence failures, surfaced unchanged
//!
//! Low-confidence acceptance is not an error; see `WorkflowOutcome::forced_acceptance`.

use crate::state::{StateField, StepKind};
use crate::state_machine::WorkflowPhase;
use crate::types::MetricId;
use std::time::Duration;

/// Main workflow error type
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// Empty or malformed metric input
    #[error("invalid input: {0}")]
    Input(#[from] InputError),

    /// Text generation failed after exhausting its retry budget
    #[error("text generation failed: {0}")]
    Llm(#[from] LlmError),

    /// Overall deadline exceeded
    #[error("workflow timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// Persistence collaborator failure
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// A step produced an update for a field it does not own
    #[error("{step} step may not write {field}")]
    FieldOwnership { step: StepKind, field: StateField },

    /// Illegal phase transition
    #[error("state machine error: {0}")]
    StateMachine(#[from] StateMachineError),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl WorkflowError {
    /// Check if a caller may reasonably retry the whole run
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Llm(e) => e.last.is_transient(),
            Self::Timeout { .. } | Self::Persistence(PersistenceError::Unavailable(_)) => true,
            _ => false,
        }
    }

    /// Check if the failure was caused by the input batch
    #[inline]
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::Input(_))
    }
}

/// Metric input errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InputError {
    /// No records supplied
    #[error("metric batch is empty")]
    EmptyBatch,

    /// Value is NaN or infinite
    #[error("metric {id} has a non-finite value")]
    NonFiniteValue { id: MetricId },

    /// Category is empty
    #[error("metric {id} has no category")]
    MissingCategory { id: MetricId },
}

/// Failure reported by the text-generation collaborator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// Attempt timed out
    #[error("generation timed out")]
    Timeout,

    /// Collaborator is throttling requests
    #[error("rate limited")]
    RateLimited {
        /// Server-suggested wait before retrying
        retry_after: Option<Duration>,
    },

    /// Response could not be interpreted
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Collaborator unreachable or failing server-side
    #[error("generator unavailable: {0}")]
    Unavailable(String),

    /// Request refused; retrying will not help
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl GenerationError {
    /// Check if the failure is worth another attempt
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }
}

/// Generation failure after the transient retry budget was spent
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{last} (after {attempts} attempt(s))")]
pub struct LlmError {
    /// Attempts made
    pub attempts: u32,
    /// Failure of the final attempt
    pub last: GenerationError,
}

/// Persistence collaborator errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PersistenceError {
    /// Store unreachable
    #[error("insight store unavailable: {0}")]
    Unavailable(String),

    /// Records refused by the store
    #[error("insight store rejected records: {0}")]
    Rejected(String),

    /// Conflicting write
    #[error("insight store conflict: {0}")]
    Conflict(String),
}

/// Phase transition errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StateMachineError {
    /// Transition not in the workflow graph
    #[error("illegal transition {from:?} -> {to:?}")]
    IllegalTransition {
        from: WorkflowPhase,
        to: WorkflowPhase,
    },
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Invalid value
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
