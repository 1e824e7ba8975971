//! Embedding provider implementations.
//!
//! Implements the [`EmbeddingProvider`] trait from `snippy-core` for:
//! - **[`DisabledProvider`]**: returns errors; used when embeddings are not configured.
//! - **[`OpenAIProvider`]**: calls the OpenAI `/embeddings` API.
//! - **[`AzureOpenAIProvider`]**: calls an Azure OpenAI embedding deployment.
//!
//! # Retry Strategy
//!
//! Both HTTP providers share the same transport retry:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::EmbeddingConfig;

pub use snippy_core::embedding::{embed_one, EmbeddingProvider};

const OPENAI_DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";

// ============ Disabled Provider ============

/// A no-op embedding provider that always returns errors.
///
/// Used when `embedding.provider = "disabled"`. Saving and searching
/// snippets both fail with a descriptive message.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("Embedding provider is disabled; set [embedding] provider in config")
    }
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI API.
///
/// Calls `POST {endpoint}/embeddings` with bearer-token auth. The key is
/// read from the environment variable named by
/// [`EmbeddingConfig::key_env`] (default `OPENAI_API_KEY`).
pub struct OpenAIProvider {
    client: reqwest::Client,
    url: String,
    /// Variable holding the API key, read per request.
    key_env: String,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl OpenAIProvider {
    /// # Errors
    ///
    /// Returns an error if `model` is not set. The API key is read when
    /// embedding, so a missing key only fails the calls that need it.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;
        let endpoint = config
            .endpoint
            .as_deref()
            .unwrap_or(OPENAI_DEFAULT_ENDPOINT)
            .trim_end_matches('/');

        Ok(Self {
            client: build_client(config.timeout_secs)?,
            url: format!("{}/embeddings", endpoint),
            key_env: config.key_env().to_string(),
            model,
            dims: config.dims,
            max_retries: config.max_retries,
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
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
            "dimensions": self.dims,
        });
        let request = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", read_key(&self.key_env)?))
            .json(&body);
        post_with_retry(request, self.max_retries, "OpenAI").await
    }
}

// ============ Azure OpenAI Provider ============

/// Embedding provider using an Azure OpenAI deployment.
///
/// Calls
/// `POST {endpoint}/openai/deployments/{deployment}/embeddings?api-version=…`
/// with an `api-key` header read from `AZURE_OPENAI_API_KEY` (or
/// `embedding.api_key_env`).
pub struct AzureOpenAIProvider {
    client: reqwest::Client,
    url: String,
    /// Variable holding the API key, read per request.
    key_env: String,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl AzureOpenAIProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for Azure OpenAI provider"))?;
        let endpoint = config
            .endpoint
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("embedding.endpoint required for Azure OpenAI provider"))?
            .trim_end_matches('/');
        let deployment = config.deployment.clone().unwrap_or_else(|| model.clone());

        Ok(Self {
            client: build_client(config.timeout_secs)?,
            url: format!(
                "{}/openai/deployments/{}/embeddings?api-version={}",
                endpoint, deployment, config.api_version
            ),
            key_env: config.key_env().to_string(),
            model,
            dims: config.dims,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for AzureOpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "input": texts,
            "dimensions": self.dims,
        });
        let request = self
            .client
            .post(&self.url)
            .header("api-key", read_key(&self.key_env)?)
            .json(&body);
        post_with_retry(request, self.max_retries, "Azure OpenAI").await
    }
}

// ============ Shared HTTP plumbing ============

fn read_key(var: &str) -> Result<String> {
    std::env::var(var).map_err(|_| anyhow::anyhow!("{} environment variable not set", var))
}

fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Send an embeddings request with retry/backoff and parse the response.
async fn post_with_retry(
    request: reqwest::RequestBuilder,
    max_retries: u32,
    label: &str,
) -> Result<Vec<Vec<f32>>> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            // Exponential backoff: 1s, 2s, 4s, 8s, ...
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tracing::warn!(provider = label, attempt, delay_secs = delay.as_secs(), "retrying embedding request");
            tokio::time::sleep(delay).await;
        }

        let attempt_request = request
            .try_clone()
            .ok_or_else(|| anyhow::anyhow!("embedding request body is not cloneable"))?;

        match attempt_request.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    let json: serde_json::Value = response.json().await?;
                    return parse_embeddings_response(&json);
                }

                let body_text = response.text().await.unwrap_or_default();

                // Rate limited or server error, retry
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(anyhow::anyhow!("{} API error {}: {}", label, status, body_text));
                    continue;
                }

                // Client error (not 429): no retry
                bail!("{} API error {}: {}", label, status, body_text);
            }
            Err(e) => {
                last_err = Some(e.into());
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Embedding failed after retries")))
}

/// Parse an OpenAI-shaped embeddings response.
///
/// Extracts `data[].embedding` and orders the vectors by `data[].index`.
pub fn parse_embeddings_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid embeddings response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());

    for (position, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid embeddings response: missing embedding"))?;

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        indexed.push((index, vec));
    }

    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

/// Create the configured [`EmbeddingProvider`].
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledProvider`] |
/// | `"openai"` | [`OpenAIProvider`] |
/// | `"azure-openai"` | [`AzureOpenAIProvider`] |
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledProvider)),
        "openai" => Ok(Arc::new(OpenAIProvider::new(config)?)),
        "azure-openai" => Ok(Arc::new(AzureOpenAIProvider::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_orders_by_index() {
        let json = serde_json::json!({
            "data": [
                { "index": 1, "embedding": [0.0, 1.0] },
                { "index": 0, "embedding": [1.0, 0.0] }
            ]
        });
        let vecs = parse_embeddings_response(&json).unwrap();
        assert_eq!(vecs, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_parse_rejects_missing_data() {
        let err = parse_embeddings_response(&serde_json::json!({"error": "x"})).unwrap_err();
        assert!(err.to_string().contains("missing data"));
    }

    #[tokio::test]
    async fn test_disabled_provider_errors() {
        let provider = create_provider(&EmbeddingConfig::default()).unwrap();
        assert_eq!(provider.model_name(), "disabled");
        assert!(provider.embed(&["x".to_string()]).await.is_err());
    }

    #[test]
    fn test_azure_url_uses_deployment() {
        let config = EmbeddingConfig {
            provider: "azure-openai".into(),
            model: Some("text-embedding-3-small".into()),
            endpoint: Some("https://res.openai.azure.com/".into()),
            deployment: Some("embed".into()),
            api_key_env: Some("SNIPPY_TEST_AZURE_KEY".into()),
            ..EmbeddingConfig::default()
        };
        let provider = AzureOpenAIProvider::new(&config).unwrap();
        assert_eq!(
            provider.url,
            "https://res.openai.azure.com/openai/deployments/embed/embeddings?api-version=2024-10-21"
        );
    }

    #[tokio::test]
    async fn test_missing_key_fails_only_when_embedding() {
        let config = EmbeddingConfig {
            provider: "openai".into(),
            model: Some("text-embedding-3-small".into()),
            api_key_env: Some("SNIPPY_UNSET_EMBEDDING_KEY".into()),
            ..EmbeddingConfig::default()
        };
        let provider = create_provider(&config).unwrap();
        let err = provider.embed(&["x".to_string()]).await.unwrap_err();
        assert!(err.to_string().contains("SNIPPY_UNSET_EMBEDDING_KEY"));
    }
}
