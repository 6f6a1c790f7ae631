//! Insight Agent - command-line runner for the insight workflow
//!
//! Wires the workflow to its surroundings:
//! - TOML configuration with defaults for every field
//! - Tracing subscriber setup
//! - Metric batch files
//! - `run`, `score` and `check-config` subcommands

#![warn(unreachable_pub)]

pub mod commands;
pub mod config;
pub mod metrics_file;
pub mod telemetry;

pub use commands::{run_batch, score_lines, RunReport, ScoreReport};
pub use config::{AgentConfig, LlmConfig};
