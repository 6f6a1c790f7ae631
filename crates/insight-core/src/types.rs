//! Core types for the insight workflow
//!
//! Defines the fundamental types shared by every step:
//! - Metric records and batch references
//! - History messages
//! - Confidence scores and routing labels
//! - Insight records produced by the format step
//! - Workflow configuration

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use ulid::Ulid;

/// Identifier of a metric as assigned by the metrics source
pub type MetricId = i64;

/// A single business metric supplied by the metrics collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    /// Metric identifier
    pub id: MetricId,
    /// Metric name
    pub name: String,
    /// Numeric value
    pub value: f64,
    /// Metric category
    pub category: String,
    /// Optional free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl MetricRecord {
    /// Create new metric record without description
    #[inline]
    #[must_use]
    pub fn new(
        id: MetricId,
        name: impl Into<String>,
        value: f64,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            value,
            category: category.into(),
            description: None,
        }
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Unique metric batch identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BatchId(pub Ulid);

impl BatchId {
    /// Generate new batch ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to the metric batch an insight set was derived from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRef {
    /// Batch identifier
    pub batch_id: BatchId,
    /// Metrics contained in the batch, in input order
    pub metric_ids: Vec<MetricId>,
}

impl BatchRef {
    /// Build a reference from the records of a batch
    #[must_use]
    pub fn from_records(batch_id: BatchId, records: &[MetricRecord]) -> Self {
        Self {
            batch_id,
            metric_ids: records.iter().map(|r| r.id).collect(),
        }
    }
}

/// Author of a history message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Request sent to the text generator
    Human,
    /// Response returned by the text generator
    Assistant,
}

/// History entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Author
    pub role: Role,
    /// Text content
    pub content: String,
}

impl Message {
    /// Human (request) message
    #[inline]
    #[must_use]
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            content: content.into(),
        }
    }

    /// Assistant (response) message
    #[inline]
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Heuristic quality score in `[0.0, 1.0]`
///
/// Always clamped on construction. Scores computed by the quality gate are
/// built from integer hundredths so that threshold comparisons are exact.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Confidence(f64);

impl Confidence {
    /// Lowest score
    pub const ZERO: Self = Self(0.0);

    /// Create a confidence, clamping into range. NaN maps to zero.
    #[inline]
    #[must_use]
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            Self::ZERO
        } else {
            Self(value.clamp(0.0, 1.0))
        }
    }

    /// Create from integer hundredths (clamped to 100)
    #[inline]
    #[must_use]
    pub fn from_points(points: u32) -> Self {
        Self(f64::from(points.min(100)) / 100.0)
    }

    /// Score as integer hundredths
    #[inline]
    #[must_use]
    pub fn points(self) -> u32 {
        (self.0 * 100.0).round() as u32
    }

    /// Raw value
    #[inline]
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }

    /// Quality band of this score
    #[inline]
    #[must_use]
    pub fn band(self) -> QualityBand {
        QualityBand::of(self)
    }
}

impl From<f64> for Confidence {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<Confidence> for f64 {
    fn from(confidence: Confidence) -> Self {
        confidence.0
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Label computed by the quality gate and consumed by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingLabel {
    /// Proceed to formatting (initial value)
    #[default]
    Continue,
    /// Loop back to the generate step
    Regenerate,
    /// Accept current insights
    End,
}

impl RoutingLabel {
    /// Stable lowercase name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RoutingLabel::Continue => "continue",
            RoutingLabel::Regenerate => "regenerate",
            RoutingLabel::End => "end",
        }
    }
}

impl fmt::Display for RoutingLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Informational classification of a final confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityBand {
    /// `confidence >= 0.7`
    Strong,
    /// `0.5 <= confidence < 0.7`
    Acceptable,
    /// `confidence < 0.5`
    Weak,
}

impl QualityBand {
    /// Band of a confidence score
    #[must_use]
    pub fn of(confidence: Confidence) -> Self {
        let points = confidence.points();
        if points >= 70 {
            QualityBand::Strong
        } else if points >= 50 {
            QualityBand::Acceptable
        } else {
            QualityBand::Weak
        }
    }
}

/// Insight classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightType {
    /// Directional movement in the data
    Trend,
    /// Warning or concern
    Risk,
    /// Potential upside
    Opportunity,
    /// Suggested action
    Recommendation,
    /// Anything else
    Observation,
}

impl InsightType {
    /// Stable lowercase name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            InsightType::Trend => "trend",
            InsightType::Risk => "risk",
            InsightType::Opportunity => "opportunity",
            InsightType::Recommendation => "recommendation",
            InsightType::Observation => "observation",
        }
    }
}

impl fmt::Display for InsightType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final output record of a workflow run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightRecord {
    /// Insight text
    pub text: String,
    /// Classification
    #[serde(rename = "type")]
    pub kind: InsightType,
    /// Final confidence of the run that produced it
    pub confidence: Confidence,
}

/// Workflow configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Regeneration budget
    pub max_retries: u32,
    /// Attempts per generate invocation for transient collaborator failures
    pub generate_attempts: u32,
    /// Per-attempt collaborator timeout in milliseconds
    pub generate_timeout_ms: u64,
    /// Backoff before the second attempt, in milliseconds
    pub initial_backoff_ms: u64,
    /// Backoff growth factor per attempt
    pub backoff_multiplier: f64,
    /// Backoff ceiling in milliseconds
    pub max_backoff_ms: u64,
    /// Whole-run deadline used when the caller supplies none
    pub run_deadline_ms: Option<u64>,
    /// Maximum insights taken from a single response
    pub max_insights_per_response: usize,
    /// Number of sample metrics quoted in the request
    pub sample_metrics: usize,
}

impl WorkflowConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With regeneration budget
    #[inline]
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// With transient-failure attempts
    #[inline]
    #[must_use]
    pub fn with_generate_attempts(mut self, attempts: u32) -> Self {
        self.generate_attempts = attempts;
        self
    }

    /// With per-attempt timeout
    #[inline]
    #[must_use]
    pub fn with_generate_timeout(mut self, timeout: Duration) -> Self {
        self.generate_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// With backoff parameters
    #[inline]
    #[must_use]
    pub fn with_backoff(mut self, initial: Duration, multiplier: f64, max: Duration) -> Self {
        self.initial_backoff_ms = initial.as_millis() as u64;
        self.backoff_multiplier = multiplier;
        self.max_backoff_ms = max.as_millis() as u64;
        self
    }

    /// With default run deadline
    #[inline]
    #[must_use]
    pub fn with_run_deadline(mut self, deadline: Duration) -> Self {
        self.run_deadline_ms = Some(deadline.as_millis() as u64);
        self
    }

    /// Per-attempt timeout
    #[inline]
    #[must_use]
    pub fn generate_timeout(&self) -> Duration {
        Duration::from_millis(self.generate_timeout_ms)
    }

    /// Default run deadline, if any
    #[inline]
    #[must_use]
    pub fn run_deadline(&self) -> Option<Duration> {
        self.run_deadline_ms.map(Duration::from_millis)
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.generate_attempts == 0 {
            return Err(ConfigError::Invalid(
                "generate_attempts must be at least 1".to_string(),
            ));
        }
        if self.generate_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "generate_timeout_ms must be positive".to_string(),
            ));
        }
        if !(self.backoff_multiplier >= 1.0) {
            return Err(ConfigError::Invalid(
                "backoff_multiplier must be >= 1.0".to_string(),
            ));
        }
        if self.max_insights_per_response == 0 {
            return Err(ConfigError::Invalid(
                "max_insights_per_response must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            generate_attempts: 3,
            generate_timeout_ms: 30_000,
            initial_backoff_ms: 250,
            backoff_multiplier: 2.0,
            max_backoff_ms: 4_000,
            run_deadline_ms: None,
            max_insights_per_response: 5,
            sample_metrics: 5,
        }
    }
}
