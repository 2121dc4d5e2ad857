//! OpenAI-compatible chat completion client.
//!
//! Shared by the LLM reasoner, generator, and judge through the
//! [`ChatModel`] trait. Each caller owns its own [`ChatClient`] so models
//! and temperatures can differ per role while sharing one configuration
//! section.
//!
//! # Retry Strategy
//!
//! Same policy as the embedding provider:
//! - HTTP 429 and 5xx → retry with exponential backoff
//! - HTTP 4xx (not 429) → fail immediately
//! - Network errors and timeouts → retry

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::LlmConfig;

/// A chat message for the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Assistant text plus the token usage the API reported.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: String,
    pub total_tokens: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {status}: {body}")]
    ApiError { status: u16, body: String },
    #[error("failed to parse response: {0}")]
    ParseError(String),
    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

impl LlmError {
    fn is_retryable(&self) -> bool {
        match self {
            LlmError::HttpError(_) => true,
            LlmError::ApiError { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// A chat model the reasoner, generator and judge talk to.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model(&self) -> &str;

    /// One completion. Implementations handle their own transport retries.
    async fn complete(&self, messages: &[Message]) -> Result<Completion, LlmError>;
}

pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
}

impl ChatClient {
    /// Build a client for `model`, reading the key from `OPENAI_API_KEY`.
    pub fn from_config(config: &LlmConfig, model: &str, temperature: f32) -> Result<Self, LlmError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| LlmError::NotConfigured("OPENAI_API_KEY not set".to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
            temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
        })
    }

    async fn send_once(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<Completion, LlmError> {
        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError { status, body });
        }

        let resp: serde_json::Value = response.json().await?;
        parse_completion(&resp)
    }
}

#[async_trait]
impl ChatModel for ChatClient {
    fn model(&self) -> &str {
        &self.model
    }

    /// Send a chat completion request, retrying transient failures.
    async fn complete(&self, messages: &[Message]) -> Result<Completion, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        let mut last_err = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            debug!(model = %self.model, attempt, "chat completion request");
            match self.send_once(&url, &body).await {
                Ok(completion) => return Ok(completion),
                Err(e) if e.is_retryable() => {
                    warn!(model = %self.model, attempt, error = %e, "chat completion failed, retrying");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err
            .unwrap_or_else(|| LlmError::ParseError("completion failed after retries".to_string())))
    }
}

/// Pull the assistant text and `usage.total_tokens` out of a response body.
pub fn parse_completion(resp: &serde_json::Value) -> Result<Completion, LlmError> {
    let content = resp["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| LlmError::ParseError("missing choices[0].message.content".into()))?
        .to_string();
    let total_tokens = resp["usage"]["total_tokens"].as_u64().unwrap_or(0);
    Ok(Completion {
        content,
        total_tokens,
    })
}

/// Slice out the outermost `{...}` of a model reply.
///
/// Models often wrap JSON in prose or code fences.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
