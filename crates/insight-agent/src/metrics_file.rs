//! Metric batch files
//!
//! A batch file is a JSON array of metric records:
//!
//! ```json
//! [{"id": 1, "name": "revenue", "value": 120.5, "category": "sales"}]
//! ```

use anyhow::Context;
use insight_core::MetricRecord;
use std::path::Path;

/// Parse a batch from JSON text
pub fn parse(text: &str) -> anyhow::Result<Vec<MetricRecord>> {
    serde_json::from_str(text).context("metrics must be a JSON array of metric records")
}

/// Load a batch file
pub fn load(path: &Path) -> anyhow::Result<Vec<MetricRecord>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read metrics file {}", path.display()))?;
    parse(&text).with_context(|| format!("in metrics file {}", path.display()))
}
