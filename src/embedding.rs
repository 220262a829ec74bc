//! Embedding client abstraction and implementations.
//!
//! Defines the [`EmbeddingClient`] trait and two concrete backends:
//! - **[`OpenAiEmbeddings`]**: calls the OpenAI embeddings API.
//! - **[`OllamaEmbeddings`]**: calls a local Ollama `/api/embed` endpoint.
//!
//! Clients are constructed once at startup and passed into the indexer
//! and retriever as `Arc<dyn EmbeddingClient>`. Construction validates
//! configuration (model, dims, credentials) without touching the network;
//! service failures surface on the first call.
//!
//! Also provides vector utilities shared with the store backends:
//! [`vec_to_blob`], [`blob_to_vec`], and [`cosine_similarity`].
//!
//! # Retry Strategy
//!
//! Transient errors use exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::EmbeddingConfig;
use crate::error::{PipelineError, Result};

/// A fixed-dimensionality text embedding capability.
///
/// `embed_batch` must be order-preserving and element-count-preserving;
/// both implementations verify the count and fail rather than silently
/// misaligning texts and vectors.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;
    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed a single query text.
pub async fn embed_query(client: &dyn EmbeddingClient, text: &str) -> Result<Vec<f32>> {
    let vectors = client.embed_batch(&[text.to_string()]).await?;
    vectors
        .into_iter()
        .next()
        .ok_or_else(|| PipelineError::EmbeddingService("empty embedding response".into()))
}

/// Build the configured embedding client.
pub fn create_client(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingClient>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiEmbeddings::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaEmbeddings::new(config)?)),
        other => Err(PipelineError::Config(format!(
            "unknown embedding provider: {}",
            other
        ))),
    }
}

// ============ OpenAI ============

/// Embedding client for the OpenAI `POST /v1/embeddings` endpoint.
///
/// Requires `OPENAI_API_KEY` in the environment; the key is checked at
/// construction so a missing credential fails before any network call.
pub struct OpenAiEmbeddings {
    api_key: String,
    model: String,
    dims: usize,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAiEmbeddings {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| PipelineError::Config("embedding.model required".into()))?;
        let dims = config
            .dims
            .ok_or_else(|| PipelineError::Config("embedding.dims required".into()))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| PipelineError::Config("OPENAI_API_KEY environment variable not set".into()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PipelineError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            model,
            dims,
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddings {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post("https://api.openai.com/v1/embeddings")
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await.map_err(|e| {
                            PipelineError::EmbeddingService(format!("invalid response body: {}", e))
                        })?;
                        let vectors = parse_openai_embeddings(&json)?;
                        return check_batch_shape(vectors, texts.len(), self.dims);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(PipelineError::EmbeddingService(format!(
                            "OpenAI API error {}: {}",
                            status, body_text
                        )));
                        continue;
                    }

                    return Err(PipelineError::EmbeddingService(format!(
                        "OpenAI API error {}: {}",
                        status, body_text
                    )));
                }
                Err(e) => {
                    last_err = Some(PipelineError::EmbeddingService(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| PipelineError::EmbeddingService("embedding failed after retries".into())))
    }
}

fn parse_openai_embeddings(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| PipelineError::EmbeddingService("missing data array in response".into()))?;

    let mut embeddings = Vec::with_capacity(data.len());

    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| PipelineError::EmbeddingService("missing embedding in response".into()))?;

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        embeddings.push(vec);
    }

    Ok(embeddings)
}

// ============ Ollama ============

/// Embedding client for a local Ollama instance (`POST /api/embed`).
pub struct OllamaEmbeddings {
    model: String,
    dims: usize,
    url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaEmbeddings {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| PipelineError::Config("embedding.model required".into()))?;
        let dims = config
            .dims
            .ok_or_else(|| PipelineError::Config("embedding.dims required".into()))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PipelineError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            model,
            dims,
            url,
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl EmbeddingClient for OllamaEmbeddings {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(format!("{}/api/embed", self.url))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await.map_err(|e| {
                            PipelineError::EmbeddingService(format!("invalid response body: {}", e))
                        })?;
                        let vectors = parse_ollama_embeddings(&json)?;
                        return check_batch_shape(vectors, texts.len(), self.dims);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(PipelineError::EmbeddingService(format!(
                            "Ollama API error {}: {}",
                            status, body_text
                        )));
                        continue;
                    }

                    return Err(PipelineError::EmbeddingService(format!(
                        "Ollama API error {}: {}",
                        status, body_text
                    )));
                }
                Err(e) => {
                    last_err = Some(PipelineError::EmbeddingService(format!(
                        "Ollama connection error (is Ollama running at {}?): {}",
                        self.url, e
                    )));
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| PipelineError::EmbeddingService("embedding failed after retries".into())))
    }
}

fn parse_ollama_embeddings(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| PipelineError::EmbeddingService("missing embeddings array in response".into()))?;

    let mut result = Vec::with_capacity(embeddings.len());

    for embedding in embeddings {
        let vec: Vec<f32> = embedding
            .as_array()
            .ok_or_else(|| PipelineError::EmbeddingService("embedding is not an array".into()))?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        result.push(vec);
    }

    Ok(result)
}

/// Enforce the order/count/dimensionality contract on a provider response.
fn check_batch_shape(
    vectors: Vec<Vec<f32>>,
    expected_count: usize,
    expected_dims: usize,
) -> Result<Vec<Vec<f32>>> {
    if vectors.len() != expected_count {
        return Err(PipelineError::EmbeddingService(format!(
            "provider returned {} vectors for {} texts",
            vectors.len(),
            expected_count
        )));
    }
    if let Some(v) = vectors.iter().find(|v| v.len() != expected_dims) {
        return Err(PipelineError::Config(format!(
            "embedding dimensionality mismatch: got {} expected {}",
            v.len(),
            expected_dims
        )));
    }
    Ok(vectors)
}

// ============ Vector utilities ============

/// Encode a float vector as a BLOB (little-endian f32 bytes).
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
