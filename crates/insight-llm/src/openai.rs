//! Chat completions client

use async_trait::async_trait;
use insight_core::{GenerationError, TextGenerator};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

/// Default API endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Client construction errors
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// API key environment variable not set
    #[error("environment variable {0} is not set")]
    MissingApiKey(String),

    /// HTTP client could not be built
    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// OpenAI-compatible text generator
#[derive(Debug, Clone)]
pub struct OpenAiGenerator {
    /// HTTP client
    client: Client,
    /// API base URL, without trailing slash
    base_url: String,
    /// Model identifier
    model: String,
    /// Sampling temperature
    temperature: f32,
    /// Bearer token; omitted for local endpoints
    api_key: Option<String>,
}

impl OpenAiGenerator {
    /// Create generator without authentication
    ///
    /// # Errors
    /// `ClientError::Build` if the HTTP client cannot be constructed.
    pub fn new(
        model: impl Into<String>,
        base_url: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            temperature: 0.7,
            api_key: None,
        })
    }

    /// Create generator reading its API key from `api_key_env`
    ///
    /// # Errors
    /// `ClientError::MissingApiKey` if the variable is unset or empty.
    pub fn from_env(
        model: impl Into<String>,
        base_url: impl Into<String>,
        api_key_env: &str,
        request_timeout: Duration,
    ) -> Result<Self, ClientError> {
        let api_key = std::env::var(api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ClientError::MissingApiKey(api_key_env.to_string()))?;
        Ok(Self::new(model, base_url, request_timeout)?.with_api_key(api_key))
    }

    /// Set API key
    #[inline]
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set sampling temperature
    #[inline]
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Model identifier
    #[inline]
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Endpoint requests are posted to
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        debug!(model = %self.model, prompt_len = prompt.len(), "requesting completion");

        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: self.temperature,
        };

        let mut request = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            error!(error = %e, "completion request failed");
            classify_transport(&e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after(response.headers());
            let text = response.text().await.unwrap_or_default();
            error!(status = %status, error = %text, "completion endpoint returned error status");
            return Err(classify_status(status, retry_after, &text));
        }

        let text = response.text().await.map_err(|e| classify_transport(&e))?;
        extract_content(&text)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// Map a non-success status to a generation failure
#[must_use]
pub fn classify_status(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> GenerationError {
    let detail = format!("{status}: {}", truncate(body, 200));
    match status {
        StatusCode::TOO_MANY_REQUESTS => GenerationError::RateLimited { retry_after },
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => GenerationError::Timeout,
        s if s.is_server_error() => GenerationError::Unavailable(detail),
        _ => GenerationError::Rejected(detail),
    }
}

fn classify_transport(err: &reqwest::Error) -> GenerationError {
    if err.is_timeout() {
        GenerationError::Timeout
    } else if err.is_decode() {
        GenerationError::MalformedResponse(err.to_string())
    } else {
        GenerationError::Unavailable(err.to_string())
    }
}

/// `retry-after` in whole seconds
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Pull the first choice's content out of a completion body
pub fn extract_content(body: &str) -> Result<String, GenerationError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| GenerationError::MalformedResponse(format!("invalid completion body: {e}")))?;

    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| GenerationError::MalformedResponse("no choices in response".into()))?;

    if content.trim().is_empty() {
        return Err(GenerationError::MalformedResponse("empty completion".into()));
    }
    Ok(content)
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}
