//! Analyze step
//!
//! Pure, deterministic summary statistics over the input batch.

use crate::error::InputError;
use crate::state::{StateUpdate, StepKind};
use crate::types::MetricRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Shape detected in the input batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    /// Values never decrease in input order
    IncreasingTrend,
    /// Values never increase in input order
    DecreasingTrend,
    /// All records share one category
    SingleCategoryFocus,
    /// More than three categories
    DiverseCategories,
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Pattern::IncreasingTrend => "increasing trend",
            Pattern::DecreasingTrend => "decreasing trend",
            Pattern::SingleCategoryFocus => "single category focus",
            Pattern::DiverseCategories => "diverse categories",
        };
        f.write_str(text)
    }
}

/// Summary statistics of a metric batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    /// Number of records
    pub count: usize,
    /// Distinct categories
    pub categories: BTreeSet<String>,
    /// Smallest value
    pub min: f64,
    /// Largest value
    pub max: f64,
    /// Arithmetic mean
    pub mean: f64,
    /// Detected patterns
    pub patterns: Vec<Pattern>,
}

/// Check a batch is usable before any statistics are computed
pub fn validate_records(records: &[MetricRecord]) -> Result<(), InputError> {
    if records.is_empty() {
        return Err(InputError::EmptyBatch);
    }
    for record in records {
        if !record.value.is_finite() {
            return Err(InputError::NonFiniteValue { id: record.id });
        }
        if record.category.trim().is_empty() {
            return Err(InputError::MissingCategory { id: record.id });
        }
    }
    Ok(())
}

/// Compute summary statistics
///
/// # Errors
/// `InputError` for an empty batch or malformed records.
pub fn analyze(records: &[MetricRecord]) -> Result<Analysis, InputError> {
    validate_records(records)?;

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    for record in records {
        min = min.min(record.value);
        max = max.max(record.value);
        sum += record.value;
    }

    let categories: BTreeSet<String> = records.iter().map(|r| r.category.clone()).collect();
    let patterns = identify_patterns(records, &categories);

    Ok(Analysis {
        count: records.len(),
        categories,
        min,
        max,
        mean: sum / records.len() as f64,
        patterns,
    })
}

/// Analyze step: produces an update replacing `analysis`
pub fn run(records: &[MetricRecord]) -> Result<StateUpdate, InputError> {
    let analysis = analyze(records)?;
    tracing::debug!(
        count = analysis.count,
        categories = analysis.categories.len(),
        min = analysis.min,
        max = analysis.max,
        "analyzed metric batch"
    );
    Ok(StateUpdate::new(StepKind::Analyze).replace_analysis(analysis))
}

fn identify_patterns(records: &[MetricRecord], categories: &BTreeSet<String>) -> Vec<Pattern> {
    let mut patterns = Vec::new();

    let values: Vec<f64> = records.iter().map(|r| r.value).collect();
    let all_equal = values.windows(2).all(|w| w[0] == w[1]);
    if values.len() > 1 && !all_equal {
        if values.windows(2).all(|w| w[0] <= w[1]) {
            patterns.push(Pattern::IncreasingTrend);
        } else if values.windows(2).all(|w| w[0] >= w[1]) {
            patterns.push(Pattern::DecreasingTrend);
        }
    }

    if categories.len() == 1 {
        patterns.push(Pattern::SingleCategoryFocus);
    } else if categories.len() > 3 {
        patterns.push(Pattern::DiverseCategories);
    }

    patterns
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, value: f64, category: &str) -> MetricRecord {
        MetricRecord::new(id, format!("metric-{id}"), value, category)
    }

    #[test]
    fn computes_count_categories_and_range() {
        let records = vec![
            record(1, 10.0, "sales"),
            record(2, 20.0, "sales"),
            record(3, 30.0, "marketing"),
        ];
        let analysis = analyze(&records).unwrap();

        assert_eq!(analysis.count, 3);
        assert_eq!(
            analysis.categories,
            BTreeSet::from(["sales".to_string(), "marketing".to_string()])
        );
        assert_eq!(analysis.min, 10.0);
        assert_eq!(analysis.max, 30.0);
        assert_eq!(analysis.mean, 20.0);
        assert_eq!(analysis.patterns, vec![Pattern::IncreasingTrend]);
    }

    #[test]
    fn empty_batch_is_input_error() {
        assert_eq!(analyze(&[]), Err(InputError::EmptyBatch));
    }

    #[test]
    fn non_finite_value_is_input_error() {
        let records = vec![record(1, 1.0, "sales"), record(7, f64::NAN, "sales")];
        assert_eq!(analyze(&records), Err(InputError::NonFiniteValue { id: 7 }));
    }

    #[test]
    fn blank_category_is_input_error() {
        let records = vec![record(4, 1.0, "  ")];
        assert_eq!(analyze(&records), Err(InputError::MissingCategory { id: 4 }));
    }

    #[test]
    fn single_record_has_no_trend() {
        let analysis = analyze(&[record(1, 5.0, "ops")]).unwrap();
        assert_eq!(analysis.min, 5.0);
        assert_eq!(analysis.max, 5.0);
        assert_eq!(analysis.patterns, vec![Pattern::SingleCategoryFocus]);
    }

    #[test]
    fn decreasing_and_diverse_patterns() {
        let records = vec![
            record(1, 40.0, "a"),
            record(2, 30.0, "b"),
            record(3, 20.0, "c"),
            record(4, 10.0, "d"),
        ];
        let analysis = analyze(&records).unwrap();
        assert_eq!(
            analysis.patterns,
            vec![Pattern::DecreasingTrend, Pattern::DiverseCategories]
        );
    }

    #[test]
    fn flat_values_are_not_a_trend() {
        let records = vec![record(1, 3.0, "a"), record(2, 3.0, "b")];
        assert!(analyze(&records).unwrap().patterns.is_empty());
    }

    #[test]
    fn run_produces_analyze_owned_update() {
        let update = run(&[record(1, 1.0, "sales")]).unwrap();
        assert_eq!(update.owner(), StepKind::Analyze);
    }
}
