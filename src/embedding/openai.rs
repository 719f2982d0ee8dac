//! OpenAI embedding provider implementation.
//!
//! This module provides an implementation of the `EmbeddingProvider` trait
//! using OpenAI's text embedding API over HTTPS.

use super::{EmbeddingError, EmbeddingProvider, EmbeddingResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

/// Request payload for the OpenAI embeddings endpoint.
#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

/// Response payload from the OpenAI embeddings endpoint.
#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

/// A single embedding entry in the response.
#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// OpenAI embedding provider.
///
/// Generates embeddings by calling OpenAI's embeddings API. Requests are
/// batched where possible; the API returns entries tagged with their input
/// index, which are re-ordered before being handed back to the caller.
#[derive(Debug, Clone)]
pub struct OpenAIEmbedding {
    /// HTTP client (connection pooling across calls)
    client: Client,

    /// OpenAI API key for authentication
    api_key: String,

    /// Model identifier (e.g., "text-embedding-3-small")
    model: String,

    /// Expected dimension of the embedding vectors
    embedding_dimension: usize,
}

impl OpenAIEmbedding {
    /// Create a new OpenAI embedding provider.
    ///
    /// # Arguments
    /// * `api_key` - OpenAI API key
    /// * `model` - Model name (defaults to "text-embedding-3-small" if None)
    pub fn new(api_key: String, model: Option<String>) -> Self {
        let model = model.unwrap_or_else(|| "text-embedding-3-small".to_string());
        let embedding_dimension = match model.as_str() {
            "text-embedding-3-small" => 1536,
            "text-embedding-3-large" => 3072,
            _ => 1536, // default fallback
        };

        Self {
            client: Client::new(),
            api_key,
            model,
            embedding_dimension,
        }
    }

    /// Issue one embeddings request for a batch of inputs.
    ///
    /// Returns vectors in input order regardless of response ordering.
    async fn request_embeddings(&self, inputs: Vec<&str>) -> EmbeddingResult<Vec<Vec<f32>>> {
        let expected = inputs.len();
        let body = EmbeddingsRequest {
            model: &self.model,
            input: inputs,
        };

        let response = self
            .client
            .post(EMBEDDINGS_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EmbeddingError::ApiError(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ApiError(format!(
                "OpenAI API returned {}: {}",
                status, detail
            )));
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::ApiError(format!("Invalid response body: {}", e)))?;

        if parsed.data.len() != expected {
            return Err(EmbeddingError::ApiError(format!(
                "Expected {} embeddings, got {}",
                expected,
                parsed.data.len()
            )));
        }

        let mut entries = parsed.data;
        entries.sort_by_key(|d| d.index);

        for entry in &entries {
            if entry.embedding.len() != self.embedding_dimension {
                return Err(EmbeddingError::ApiError(format!(
                    "Model returned dimension {} but {} was expected",
                    entry.embedding.len(),
                    self.embedding_dimension
                )));
            }
        }

        Ok(entries.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbedding {
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput(
                "Text cannot be empty".to_string(),
            ));
        }

        let mut embeddings = self.request_embeddings(vec![text]).await?;
        embeddings
            .pop()
            .ok_or_else(|| EmbeddingError::Other("No embedding generated".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        for text in texts {
            if text.trim().is_empty() {
                return Err(EmbeddingError::InvalidInput(
                    "All texts must be non-empty".to_string(),
                ));
            }
        }

        self.request_embeddings(texts.to_vec()).await
    }

    fn dimension(&self) -> usize {
        self.embedding_dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
