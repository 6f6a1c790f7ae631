//! Text-generation collaborator
//!
//! The engine only depends on `generate(prompt) -> text | GenerationError`.
//! Transient failures are retried here, with a per-attempt timeout and
//! exponential backoff, before they escalate to an [`LlmError`].

use crate::error::{GenerationError, LlmError};
use crate::types::WorkflowConfig;
use async_trait::async_trait;
use std::time::Duration;

/// External text generator (language model)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Produce a response for `prompt`
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;

    /// Name used in logs
    fn name(&self) -> &str {
        "text-generator"
    }
}

/// Transient-failure retry policy for a single generate invocation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, at least 1
    pub attempts: u32,
    /// Per-attempt timeout
    pub attempt_timeout: Duration,
    /// Delay before the second attempt
    pub initial_backoff: Duration,
    /// Growth factor per attempt
    pub multiplier: f64,
    /// Delay ceiling
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Derive from workflow configuration
    #[must_use]
    pub fn from_config(config: &WorkflowConfig) -> Self {
        Self {
            attempts: config.generate_attempts.max(1),
            attempt_timeout: config.generate_timeout(),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            multiplier: config.backoff_multiplier.max(1.0),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Delay after failed attempt number `attempt` (1-based)
    ///
    /// A rate-limit hint longer than the computed backoff wins; the ceiling
    /// still applies.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, error: &GenerationError) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31) as i32;
        let scaled = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        let mut delay = Duration::from_secs_f64(scaled.min(self.max_backoff.as_secs_f64()));
        if let GenerationError::RateLimited {
            retry_after: Some(hint),
        } = error
        {
            delay = delay.max(*hint);
        }
        delay.min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&WorkflowConfig::default())
    }
}

/// Call the generator, retrying transient failures
///
/// # Errors
/// `LlmError` once attempts are exhausted, or immediately for a
/// non-transient failure.
pub async fn call_with_retry(
    generator: &dyn TextGenerator,
    prompt: &str,
    policy: &RetryPolicy,
) -> Result<String, LlmError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let result = match tokio::time::timeout(policy.attempt_timeout, generator.generate(prompt))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout),
        };

        match result {
            Ok(text) => {
                tracing::debug!(generator = generator.name(), attempt, "generation succeeded");
                return Ok(text);
            }
            Err(error) if error.is_transient() && attempt < policy.attempts => {
                let delay = policy.delay_for(attempt, &error);
                tracing::warn!(
                    generator = generator.name(),
                    attempt,
                    error = %error,
                    delay_ms = delay.as_millis() as u64,
                    "transient generation failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(error) => {
                tracing::error!(
                    generator = generator.name(),
                    attempt,
                    error = %error,
                    "generation failed"
                );
                return Err(LlmError {
                    attempts: attempt,
                    last: error,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::Sequence;

    fn policy(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            attempt_timeout: Duration::from_secs(1),
            initial_backoff: Duration::from_millis(100),
            multiplier: 2.0,
            max_backoff: Duration::from_millis(350),
        }
    }

    #[test]
    fn backoff_grows_and_caps() {
        let p = policy(5);
        let err = GenerationError::Timeout;
        assert_eq!(p.delay_for(1, &err), Duration::from_millis(100));
        assert_eq!(p.delay_for(2, &err), Duration::from_millis(200));
        assert_eq!(p.delay_for(3, &err), Duration::from_millis(350));
        assert_eq!(p.delay_for(30, &err), Duration::from_millis(350));
    }

    #[test]
    fn rate_limit_hint_extends_delay() {
        let p = policy(5);
        let err = GenerationError::RateLimited {
            retry_after: Some(Duration::from_millis(300)),
        };
        assert_eq!(p.delay_for(1, &err), Duration::from_millis(300));

        let long = GenerationError::RateLimited {
            retry_after: Some(Duration::from_secs(60)),
        };
        assert_eq!(p.delay_for(1, &long), Duration::from_millis(350));
    }

    #[test]
    fn policy_from_config_enforces_minimums() {
        let config = WorkflowConfig::default().with_generate_attempts(0);
        assert_eq!(RetryPolicy::from_config(&config).attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_then_succeeds() {
        let mut generator = MockTextGenerator::new();
        let mut seq = Sequence::new();
        generator
            .expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(GenerationError::RateLimited { retry_after: None }));
        generator
            .expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("- ok".to_string()));
        generator.expect_name().return_const("mock".to_string());

        let text = call_with_retry(&generator, "prompt", &policy(3)).await.unwrap();
        assert_eq!(text, "- ok");
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_budget() {
        let mut generator = MockTextGenerator::new();
        generator
            .expect_generate()
            .times(3)
            .returning(|_| Err(GenerationError::MalformedResponse("no choices".into())));
        generator.expect_name().return_const("mock".to_string());

        let err = call_with_retry(&generator, "prompt", &policy(3))
            .await
            .unwrap_err();
        assert_eq!(err.attempts, 3);
        assert!(matches!(err.last, GenerationError::MalformedResponse(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_is_not_retried() {
        let mut generator = MockTextGenerator::new();
        generator
            .expect_generate()
            .times(1)
            .returning(|_| Err(GenerationError::Rejected("invalid api key".into())));
        generator.expect_name().return_const("mock".to_string());

        let err = call_with_retry(&generator, "prompt", &policy(3))
            .await
            .unwrap_err();
        assert_eq!(err.attempts, 1);
    }
}
