//! Embedding provider abstraction and the Cohere implementation.
//!
//! [`EmbeddingProvider`] turns a batch of texts into fixed-dimension
//! vectors, one per input in input order. Embedding is all-or-nothing
//! per call: a transport failure or a mismatched vector count surfaces
//! as [`RagError::EmbeddingFailed`] and no partial results are kept.
//!
//! # Retry Strategy
//!
//! The Cohere provider retries transient errors with exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::anyhow;
use async_trait::async_trait;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::{RagError, Result};

/// Cohere distinguishes document and query embeddings via the
/// `input_type` request field; mixing them degrades retrieval quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputType {
    Document,
    Query,
}

impl InputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::Document => "search_document",
            InputType::Query => "search_query",
        }
    }
}

/// Trait for embedding providers.
///
/// Implementations must return exactly one vector per input text, in
/// input order, and must not make a network call for empty input.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"embed-english-v3.0"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `1024`).
    fn dims(&self) -> usize;
    /// Embed a batch of texts.
    async fn embed(&self, texts: &[String], input_type: InputType) -> Result<Vec<Vec<f32>>>;
}

/// Embedding provider using the Cohere API.
///
/// Calls `POST /v1/embed` with the configured model. Requires the
/// `COHERE_API_KEY` environment variable at construction time.
pub struct CohereEmbedder {
    model: String,
    dims: usize,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl CohereEmbedder {
    /// Create a new Cohere embedder from configuration.
    ///
    /// Fails with [`RagError::MissingCredential`] if `COHERE_API_KEY`
    /// is not set — provider clients are constructed once at process
    /// start, never lazily.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var("COHERE_API_KEY").map_err(|_| RagError::MissingCredential {
            provider: "cohere".to_string(),
            env_var: "COHERE_API_KEY".to_string(),
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RagError::EmbeddingFailed(e.into()))?;

        Ok(Self {
            model: config.model.clone(),
            dims: config.dims,
            api_key,
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for CohereEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String], input_type: InputType) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = serde_json::json!({
            "model": self.model,
            "texts": texts,
            "input_type": input_type.as_str(),
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post("https://api.cohere.ai/v1/embed")
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response
                            .json()
                            .await
                            .map_err(|e| RagError::EmbeddingFailed(e.into()))?;
                        return parse_embed_response(&json, texts.len());
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow!("Cohere API error {}: {}", status, body_text));
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    return Err(RagError::EmbeddingFailed(anyhow!(
                        "Cohere API error {}: {}",
                        status,
                        body_text
                    )));
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(RagError::EmbeddingFailed(
            last_err.unwrap_or_else(|| anyhow!("Embedding failed after retries")),
        ))
    }
}

/// Parse the Cohere `/v1/embed` response, enforcing one vector per
/// input. A count mismatch is a hard failure.
fn parse_embed_response(json: &serde_json::Value, expected: usize) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("embeddings")
        .and_then(|d| d.as_array())
        .ok_or_else(|| {
            RagError::EmbeddingFailed(anyhow!("Invalid Cohere response: missing embeddings array"))
        })?;

    let mut embeddings = Vec::with_capacity(data.len());
    for item in data {
        let values = item.as_array().ok_or_else(|| {
            RagError::EmbeddingFailed(anyhow!("Invalid Cohere response: embedding not an array"))
        })?;
        let vec: Vec<f32> = values
            .iter()
            .map(|v| {
                v.as_f64().map(|f| f as f32).ok_or_else(|| {
                    RagError::EmbeddingFailed(anyhow!(
                        "Invalid Cohere response: non-numeric embedding value {}",
                        v
                    ))
                })
            })
            .collect::<Result<_>>()?;
        embeddings.push(vec);
    }

    if embeddings.len() != expected {
        return Err(RagError::EmbeddingFailed(anyhow!(
            "Cohere returned {} embeddings for {} inputs",
            embeddings.len(),
            expected
        )));
    }

    Ok(embeddings)
}

/// Create the configured [`EmbeddingProvider`].
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "cohere" => Ok(Box::new(CohereEmbedder::new(config)?)),
        other => Err(RagError::UnknownProvider(other.to_string())),
    }
}
