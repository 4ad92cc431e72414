//! Embedding client for generating text embeddings.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::EmbeddingError;
use crate::models::EmbeddingConfig;
use crate::utils::retry::{RetryConfig, with_retry};

/// Turns fragment text into a fixed-length vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single non-empty text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Length of every vector this embedder returns.
    fn dimension(&self) -> usize;

    fn model(&self) -> &str;
}

/// Request body for the `/embeddings` endpoint.
#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Client for OpenAI-compatible embedding endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimension: usize,
    retry: RetryConfig,
}

impl OpenAiEmbedder {
    /// Create a new embedding client with the given configuration.
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let base_url = config.base_url.trim_end_matches('/');

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        match config.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => {
                let value = HeaderValue::from_str(&format!("Bearer {key}"))
                    .map_err(|_| EmbeddingError::Authentication("invalid API key".to_string()))?;
                headers.insert(AUTHORIZATION, value);
            }
            _ if base_url.contains("api.openai.com") => {
                return Err(EmbeddingError::Authentication(
                    "missing API key (set OPENAI_API_KEY)".to_string(),
                ));
            }
            _ => {}
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| EmbeddingError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{base_url}/embeddings"),
            model: config.model.clone(),
            dimension: config.dimension as usize,
            retry: RetryConfig::new(config.max_retries.saturating_add(1)),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    // Only the text-embedding-3 family accepts a `dimensions` override.
    fn requested_dimensions(&self) -> Option<usize> {
        self.model
            .starts_with("text-embedding-3")
            .then_some(self.dimension)
    }

    async fn request_embedding(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: text,
            dimensions: self.requested_dimensions(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EmbeddingError::Timeout
                } else if e.is_connect() {
                    EmbeddingError::ConnectionError(e.to_string())
                } else {
                    EmbeddingError::RequestError(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = body.trim().to_string();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    EmbeddingError::Authentication(format!("status {status}: {message}"))
                }
                _ => EmbeddingError::ServerError {
                    status: status.as_u16(),
                    message,
                },
            });
        }

        let parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                EmbeddingError::Timeout
            } else {
                EmbeddingError::InvalidResponse(e.to_string())
            }
        })?;

        extract_vector(parsed, self.dimension)
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        let vector = with_retry(&self.retry, "embed", || self.request_embedding(text)).await?;
        debug!(model = %self.model, chars = text.len(), "embedded text");
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// The response must carry exactly one vector of the expected length.
fn extract_vector(response: EmbeddingResponse, expected: usize) -> Result<Vec<f32>, EmbeddingError> {
    let mut data = response.data;
    if data.len() != 1 {
        return Err(EmbeddingError::InvalidResponse(format!(
            "expected 1 embedding, got {}",
            data.len()
        )));
    }

    let vector = data.remove(0).embedding;
    if vector.len() != expected {
        return Err(EmbeddingError::InvalidResponse(format!(
            "expected {} dimensions, got {}",
            expected,
            vector.len()
        )));
    }
    Ok(vector)
}
