//! Phase tracking for a workflow run

use crate::error::StateMachineError;
use serde::{Deserialize, Serialize};

/// Phase of a workflow run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    Start,
    Analyzed,
    Generated,
    Gated,
    Regenerating,
    Formatted,
    Done,
    Failed,
}

impl WorkflowPhase {
    /// Terminal phases have no outgoing transitions
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkflowPhase::Done | WorkflowPhase::Failed)
    }
}

/// Validates a phase transition.
pub fn validate_transition(
    from: WorkflowPhase,
    to: WorkflowPhase,
) -> Result<(), StateMachineError> {
    if allowed(from, to) {
        Ok(())
    } else {
        Err(StateMachineError::IllegalTransition { from, to })
    }
}

pub fn allowed_transitions(from: WorkflowPhase) -> Vec<WorkflowPhase> {
    use WorkflowPhase::*;
    match from {
        Start => vec![Analyzed, Failed],
        Analyzed => vec![Generated, Failed],
        Generated => vec![Gated, Failed],
        Gated => vec![Regenerating, Formatted, Failed],
        Regenerating => vec![Generated, Failed],
        Formatted => vec![Done, Failed],
        Done => vec![],
        Failed => vec![],
    }
}

fn allowed(from: WorkflowPhase, to: WorkflowPhase) -> bool {
    allowed_transitions(from).into_iter().any(|s| s == to)
}

/// Phase trail of a single run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseTracker {
    trail: Vec<WorkflowPhase>,
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self {
            trail: vec![WorkflowPhase::Start],
        }
    }

    pub fn current(&self) -> WorkflowPhase {
        self.trail
            .last()
            .copied()
            .unwrap_or(WorkflowPhase::Start)
    }

    pub fn advance(&mut self, to: WorkflowPhase) -> Result<(), StateMachineError> {
        validate_transition(self.current(), to)?;
        self.trail.push(to);
        Ok(())
    }

    pub fn trail(&self) -> &[WorkflowPhase] {
        &self.trail
    }

    pub fn into_trail(self) -> Vec<WorkflowPhase> {
        self.trail
    }
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}
