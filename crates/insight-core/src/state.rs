//! Workflow state and its merge rules
//!
//! A [`WorkflowState`] is created once per run and owned exclusively by the
//! engine. Steps read it through accessors and describe their effect as a
//! [`StateUpdate`]; only [`WorkflowState::apply`] writes fields, using one
//! merge rule per field:
//!
//! | Field | Merge | Owner |
//! |---|---|---|
//! | `history` | append | Generate |
//! | `insights` | append | Generate |
//! | `analysis` | replace | Analyze |
//! | `confidence` | replace | Quality gate |
//! | `routing_label` | replace | Quality gate |
//! | `retry_count` | replace | Router |

use crate::error::WorkflowError;
use crate::nodes::analyze::Analysis;
use crate::types::{Confidence, Message, MetricRecord, RoutingLabel};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Workflow step identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Summary statistics
    Analyze,
    /// Text generation
    Generate,
    /// Scoring and routing label
    QualityGate,
    /// Retry accounting
    Router,
    /// Output shaping
    Format,
}

impl StepKind {
    /// Check if this step may write `field`
    #[must_use]
    pub fn owns(self, field: StateField) -> bool {
        matches!(
            (self, field),
            (StepKind::Analyze, StateField::Analysis)
                | (StepKind::Generate, StateField::History | StateField::Insights)
                | (
                    StepKind::QualityGate,
                    StateField::Confidence | StateField::RoutingLabel
                )
                | (StepKind::Router, StateField::RetryCount)
        )
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepKind::Analyze => "analyze",
            StepKind::Generate => "generate",
            StepKind::QualityGate => "quality_gate",
            StepKind::Router => "router",
            StepKind::Format => "format",
        };
        f.write_str(name)
    }
}

/// Writable state fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateField {
    /// Request/response transcript
    History,
    /// Raw insight strings
    Insights,
    /// Summary statistics
    Analysis,
    /// Quality score
    Confidence,
    /// Gate decision
    RoutingLabel,
    /// Regenerations performed
    RetryCount,
}

impl fmt::Display for StateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StateField::History => "history",
            StateField::Insights => "insights",
            StateField::Analysis => "analysis",
            StateField::Confidence => "confidence",
            StateField::RoutingLabel => "routing_label",
            StateField::RetryCount => "retry_count",
        };
        f.write_str(name)
    }
}

/// Partial state produced by a step
#[derive(Debug, Clone)]
pub struct StateUpdate {
    owner: StepKind,
    history: Vec<Message>,
    insights: Vec<String>,
    analysis: Option<Analysis>,
    confidence: Option<Confidence>,
    routing_label: Option<RoutingLabel>,
    retry_count: Option<u32>,
}

impl StateUpdate {
    /// Empty update attributed to `owner`
    #[inline]
    #[must_use]
    pub fn new(owner: StepKind) -> Self {
        Self {
            owner,
            history: Vec::new(),
            insights: Vec::new(),
            analysis: None,
            confidence: None,
            routing_label: None,
            retry_count: None,
        }
    }

    /// Append history messages
    #[must_use]
    pub fn append_history(mut self, messages: impl IntoIterator<Item = Message>) -> Self {
        self.history.extend(messages);
        self
    }

    /// Append insights
    #[must_use]
    pub fn append_insights(mut self, insights: impl IntoIterator<Item = String>) -> Self {
        self.insights.extend(insights);
        self
    }

    /// Replace analysis
    #[inline]
    #[must_use]
    pub fn replace_analysis(mut self, analysis: Analysis) -> Self {
        self.analysis = Some(analysis);
        self
    }

    /// Replace confidence
    #[inline]
    #[must_use]
    pub fn replace_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Replace routing label
    #[inline]
    #[must_use]
    pub fn replace_routing_label(mut self, label: RoutingLabel) -> Self {
        self.routing_label = Some(label);
        self
    }

    /// Replace retry count
    #[inline]
    #[must_use]
    pub fn replace_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = Some(retry_count);
        self
    }

    /// Step the update is attributed to
    #[inline]
    #[must_use]
    pub fn owner(&self) -> StepKind {
        self.owner
    }

    /// Fields this update writes
    #[must_use]
    pub fn touched_fields(&self) -> Vec<StateField> {
        let mut fields = Vec::new();
        if !self.history.is_empty() {
            fields.push(StateField::History);
        }
        if !self.insights.is_empty() {
            fields.push(StateField::Insights);
        }
        if self.analysis.is_some() {
            fields.push(StateField::Analysis);
        }
        if self.confidence.is_some() {
            fields.push(StateField::Confidence);
        }
        if self.routing_label.is_some() {
            fields.push(StateField::RoutingLabel);
        }
        if self.retry_count.is_some() {
            fields.push(StateField::RetryCount);
        }
        fields
    }
}

/// State threaded through one workflow run
#[derive(Debug, Clone)]
pub struct WorkflowState {
    history: Vec<Message>,
    input_records: Arc<[MetricRecord]>,
    insights: Vec<String>,
    analysis: Analysis,
    confidence: Confidence,
    retry_count: u32,
    routing_label: RoutingLabel,
}

impl WorkflowState {
    /// Fresh state for a batch; every other field at its empty default
    #[must_use]
    pub fn new(input_records: impl Into<Arc<[MetricRecord]>>) -> Self {
        Self {
            history: Vec::new(),
            input_records: input_records.into(),
            insights: Vec::new(),
            analysis: Analysis::default(),
            confidence: Confidence::ZERO,
            retry_count: 0,
            routing_label: RoutingLabel::default(),
        }
    }

    /// Merge a step's update into the state
    ///
    /// # Errors
    /// `WorkflowError::FieldOwnership` if the update writes a field its step
    /// does not own; the state is left untouched in that case.
    pub fn apply(&mut self, update: StateUpdate) -> Result<(), WorkflowError> {
        if let Some(field) = update
            .touched_fields()
            .into_iter()
            .find(|field| !update.owner.owns(*field))
        {
            return Err(WorkflowError::FieldOwnership {
                step: update.owner,
                field,
            });
        }

        let StateUpdate {
            owner: _,
            history,
            insights,
            analysis,
            confidence,
            routing_label,
            retry_count,
        } = update;

        self.history.extend(history);
        self.insights.extend(insights);
        if let Some(analysis) = analysis {
            self.analysis = analysis;
        }
        if let Some(confidence) = confidence {
            self.confidence = confidence;
        }
        if let Some(label) = routing_label {
            self.routing_label = label;
        }
        if let Some(retry_count) = retry_count {
            self.retry_count = retry_count;
        }
        Ok(())
    }

    /// Conversation history
    #[inline]
    #[must_use]
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Input batch
    #[inline]
    #[must_use]
    pub fn input_records(&self) -> &[MetricRecord] {
        &self.input_records
    }

    /// Accumulated insights
    #[inline]
    #[must_use]
    pub fn insights(&self) -> &[String] {
        &self.insights
    }

    /// Latest analysis; empty until the analyze step has run
    #[inline]
    #[must_use]
    pub fn analysis(&self) -> &Analysis {
        &self.analysis
    }

    /// Current confidence
    #[inline]
    #[must_use]
    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    /// Regenerations performed so far
    #[inline]
    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Current routing label
    #[inline]
    #[must_use]
    pub fn routing_label(&self) -> RoutingLabel {
        self.routing_label
    }

    /// Consume the state, keeping the parts reported to callers
    pub(crate) fn into_parts(self) -> (Vec<Message>, Vec<String>, Analysis) {
        (self.history, self.insights, self.analysis)
    }
}
