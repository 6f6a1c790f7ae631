//! Agent configuration
//!
//! Loaded from a TOML file; every field is optional. The API key itself is
//! never read from the file, only the name of the environment variable that
//! holds it.

use anyhow::{bail, Context};
use insight_core::WorkflowConfig;
use insight_llm::DEFAULT_BASE_URL;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Language model endpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API base URL
    pub base_url: String,
    /// Model identifier
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Environment variable holding the API key; empty disables auth
    pub api_key_env: String,
    /// HTTP request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.7,
            api_key_env: "OPENAI_API_KEY".to_string(),
            request_timeout_ms: 60_000,
        }
    }
}

impl LlmConfig {
    /// HTTP request timeout
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Complete agent configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Workflow tuning
    pub workflow: WorkflowConfig,
    /// Model endpoint
    pub llm: LlmConfig,
}

impl AgentConfig {
    /// Parse from TOML text
    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(text).context("invalid configuration TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("in config file {}", path.display()))
    }

    /// Check value ranges
    pub fn validate(&self) -> anyhow::Result<()> {
        self.workflow.validate()?;
        if self.llm.base_url.trim().is_empty() {
            bail!("llm.base_url must not be empty");
        }
        if self.llm.model.trim().is_empty() {
            bail!("llm.model must not be empty");
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            bail!("llm.temperature must be within 0.0..=2.0");
        }
        if self.llm.request_timeout_ms == 0 {
            bail!("llm.request_timeout_ms must be positive");
        }
        Ok(())
    }
}
