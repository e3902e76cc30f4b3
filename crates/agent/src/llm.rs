//! OpenAI-compatible chat completions client.
//!
//! The same wire format serves OpenAI and a local Ollama endpoint, so one
//! client covers both configured providers.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};
use wayfarer_core::config::LlmConfig;

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("language model is not configured: {0}")]
    NotConfigured(String),
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },
    #[error("api error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Network(_) => true,
            Self::Api { status, .. } => is_retryable_status(*status),
            Self::NotConfigured(_) | Self::InvalidResponse(_) => false,
        }
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: MessageRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: MessageRole::Assistant, content: content.into() }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask the provider for a JSON object response.
    pub json_mode: bool,
}

impl CompletionRequest {
    pub fn new(system_prompt: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            messages,
            temperature: 0.7,
            max_tokens: 800,
            json_mode: false,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;
}

pub struct OpenAiChatClient {
    http: Client,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
    missing_credential: Option<String>,
    max_retries: u32,
    initial_backoff: Duration,
}

impl OpenAiChatClient {
    /// Builds the client without requiring credentials; a missing key is
    /// reported by [`LlmClient::complete`].
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let http = Client::builder().timeout(config.timeout()).build()?;
        let (api_key, missing_credential) = match config.credential() {
            Ok(key) => (key.cloned(), None),
            Err(error) => (None, Some(error.to_string())),
        };

        Ok(Self {
            http,
            base_url: config.effective_base_url().trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            missing_credential,
            max_retries: config.max_retries,
            initial_backoff: INITIAL_BACKOFF,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }
}

/// Exponential backoff before retry `attempt` (1-based), saturating instead of overflowing.
fn retry_backoff(initial: Duration, attempt: u32) -> Duration {
    let factor = 2u32.checked_pow(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
    initial.saturating_mul(factor)
}

pub fn build_request_body(model: &str, request: &CompletionRequest) -> serde_json::Value {
    let mut messages = vec![serde_json::json!({
        "role": "system",
        "content": request.system_prompt,
    })];
    messages.extend(request.messages.iter().map(|message| {
        serde_json::json!({
            "role": message.role.as_str(),
            "content": message.content,
        })
    }));

    let mut body = serde_json::json!({
        "model": model,
        "messages": messages,
        "temperature": request.temperature,
        "max_tokens": request.max_tokens,
    });
    if request.json_mode {
        body["response_format"] = serde_json::json!({ "type": "json_object" });
    }
    body
}

pub fn parse_completion(raw: &str) -> Result<String, LlmError> {
    let response: ChatCompletionResponse = serde_json::from_str(raw)
        .map_err(|error| LlmError::InvalidResponse(format!("undecodable completion: {error}")))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| LlmError::InvalidResponse("completion had no content".to_string()))
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl LlmClient for OpenAiChatClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        if let Some(reason) = &self.missing_credential {
            return Err(LlmError::NotConfigured(reason.clone()));
        }

        let url = self.endpoint();
        let body = build_request_body(&self.model, &request);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = retry_backoff(self.initial_backoff, attempt);
                warn!(
                    event_name = "llm.retry",
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "retrying completion after transient error"
                );
                tokio::time::sleep(backoff).await;
            }

            let mut builder = self.http.post(&url).json(&body);
            if let Some(key) = &self.api_key {
                builder = builder.bearer_auth(key.expose_secret());
            }

            let response = match builder.send().await {
                Ok(response) => response,
                Err(error) => {
                    debug!(attempt, error = %error, "completion request failed to send");
                    last_error = Some(LlmError::Network(error));
                    continue;
                }
            };

            let status = response.status().as_u16();
            if status == 429 {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.parse::<u64>().ok())
                    .map(Duration::from_secs)
                    .unwrap_or(self.initial_backoff);
                last_error = Some(LlmError::RateLimited { retry_after });
                continue;
            }

            let text = response.text().await?;
            if !(200..300).contains(&status) {
                let error = LlmError::Api { status, message: text };
                if error.is_retryable() {
                    last_error = Some(error);
                    continue;
                }
                return Err(error);
            }

            return parse_completion(&text);
        }

        Err(last_error.unwrap_or_else(|| LlmError::InvalidResponse("retries exhausted".to_string())))
    }
}

/// Strips a surrounding markdown code fence (```json ... ```) if present.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest
        .get(..4)
        .filter(|tag| tag.eq_ignore_ascii_case("json"))
        .map_or(rest, |_| &rest[4..]);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
