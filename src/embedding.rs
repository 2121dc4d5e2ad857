//! Embedding provider implementations for dense-vector indexing.
//!
//! The [`EmbeddingProvider`] trait lives in `ragbench-core`; this module
//! supplies the concrete backends and picks one from configuration:
//! - **[`DisabledProvider`]**: returns errors; used when embeddings are not configured.
//! - **[`OpenAIProvider`]**: calls the OpenAI embeddings API with retry and backoff.
//! - **[`HashingEmbedder`]**: deterministic offline feature hashing, no network.
//!
//! # Retry Strategy
//!
//! The OpenAI provider uses exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Result};
use async_trait::async_trait;
use ragbench_core::embedding::{EmbeddingProvider, HashingEmbedder};
use std::sync::Arc;
use std::time::Duration;

use crate::config::EmbeddingConfig;

// ============ Disabled Provider ============

/// A no-op embedding provider that always returns errors.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        bail!("Embedding provider is disabled")
    }
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI API.
///
/// Calls `POST /v1/embeddings` with the configured model, sending up to
/// `embedding.batch_size` texts per request. Requires the
/// `OPENAI_API_KEY` environment variable.
pub struct OpenAIProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dims: usize,
    max_retries: u32,
    batch_size: usize,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `model` or `dims` is not set in config,
    /// or if `OPENAI_API_KEY` is not in the environment.
    pub fn new(config: &EmbeddingConfig, base_url: &str) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            dims,
            max_retries: config.max_retries,
            batch_size: config.batch_size.max(1),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
            "dimensions": self.dims,
        });
        let url = format!("{}/v1/embeddings", self.base_url);

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        let vectors = parse_openai_response(&json)?;
                        if vectors.len() != texts.len() {
                            bail!(
                                "OpenAI returned {} embeddings for {} inputs",
                                vectors.len(),
                                texts.len()
                            );
                        }
                        return Ok(vectors);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!(
                            "OpenAI API error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("OpenAI API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Embedding failed after retries")))
    }
}

/// Parse the OpenAI embeddings API response JSON.
///
/// Extracts the `data[].embedding` arrays, ordered by their `index` field.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for item in data {
        let index = item.get("index").and_then(|i| i.as_u64()).unwrap_or(0);
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing embedding"))?
            .iter()
            .map(|v| v.as_f64().map(|f| f as f32))
            .collect::<Option<Vec<f32>>>()
            .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: non-numeric embedding"))?;
        indexed.push((index, embedding));
    }

    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, e)| e).collect())
}

/// Create the appropriate [`EmbeddingProvider`] based on configuration.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledProvider`] |
/// | `"openai"` | [`OpenAIProvider`] |
/// | `"hash"` | [`HashingEmbedder`] |
pub fn create_provider(
    config: &EmbeddingConfig,
    base_url: &str,
) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledProvider)),
        "openai" => Ok(Arc::new(OpenAIProvider::new(config, base_url)?)),
        "hash" => Ok(Arc::new(HashingEmbedder::new(config.dims.unwrap_or(256)))),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_openai_response_orders_by_index() {
        let json = serde_json::json!({
            "data": [
                {"index": 1, "embedding": [0.5, 0.5]},
                {"index": 0, "embedding": [1.0, 0.0]}
            ]
        });
        let parsed = parse_openai_response(&json).unwrap();
        assert_eq!(parsed, vec![vec![1.0, 0.0], vec![0.5, 0.5]]);
    }

    #[test]
    fn test_openai_provider_takes_batch_size_from_config() {
        std::env::set_var("OPENAI_API_KEY", "test-key");
        let config = EmbeddingConfig {
            provider: "openai".to_string(),
            model: Some("text-embedding-3-small".to_string()),
            dims: Some(8),
            batch_size: 16,
            ..EmbeddingConfig::default()
        };
        let p = OpenAIProvider::new(&config, "https://api.openai.com/").unwrap();
        assert_eq!(p.batch_size(), 16);
        assert_eq!(p.dims(), 8);
        assert_eq!(p.base_url, "https://api.openai.com");
    }

    #[test]
    fn test_parse_openai_response_missing_data() {
        assert!(parse_openai_response(&serde_json::json!({"error": "x"})).is_err());
    }

    #[tokio::test]
    async fn test_disabled_provider_errors() {
        let p = create_provider(&EmbeddingConfig::default(), "https://api.openai.com").unwrap();
        assert_eq!(p.model_name(), "disabled");
        assert!(p.embed("hello").await.is_err());
    }

    #[tokio::test]
    async fn test_hash_provider_from_config() {
        let config = EmbeddingConfig {
            provider: "hash".to_string(),
            dims: Some(32),
            ..EmbeddingConfig::default()
        };
        let p = create_provider(&config, "").unwrap();
        assert_eq!(p.dims(), 32);
        assert_eq!(p.embed("capybara").await.unwrap().len(), 32);
    }
}
