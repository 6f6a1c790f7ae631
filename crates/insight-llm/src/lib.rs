//! Insight LLM - OpenAI-compatible text generator
//!
//! Implements [`insight_core::TextGenerator`] over the chat completions API
//! and maps HTTP outcomes onto [`insight_core::GenerationError`]:
//! - `429` → rate limited, honouring `retry-after`
//! - `408`, `504` and client timeouts → timeout
//! - `5xx` and connection failures → unavailable
//! - other `4xx` → rejected (not retried)
//! - undecodable or empty completions → malformed response

#![warn(unreachable_pub)]

pub mod openai;

pub use openai::{ClientError, OpenAiGenerator, DEFAULT_BASE_URL};
