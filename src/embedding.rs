//! Embedding provider abstraction.
//!
//! The [`Embedder`] trait is the seam between the indexes and the model
//! backend. Production use goes through [`OllamaEmbedder`]; tests plug in
//! deterministic stubs.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{EmbeddingConfig, LlmConfig};
use crate::error::{Error, Result};

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed one text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts, preserving input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    /// Vector dimensionality produced by this embedder.
    fn dims(&self) -> usize;
}

/// Embedder backed by the Ollama `/api/embeddings` endpoint.
pub struct OllamaEmbedder {
    client: Client,
    base_url: String,
    model: String,
    dims: usize,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedder {
    pub fn new(llm: &LlmConfig, embedding: &EmbeddingConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(llm.timeout_secs))
                .build()
                .unwrap_or_default(),
            base_url: llm.base_url.clone(),
            model: embedding.model.clone(),
            dims: embedding.dims,
        }
    }

    /// Same endpoint, different model: used by the reranker to score with a
    /// relevance model independent of the retrieval embeddings.
    pub fn with_model(llm: &LlmConfig, model: impl Into<String>, dims: usize) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(llm.timeout_secs))
                .build()
                .unwrap_or_default(),
            base_url: llm.base_url.clone(),
            model: model.into(),
            dims,
        }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let request = EmbedRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::model(format!("embedding request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::model(format!(
                "embedding failed: HTTP {}",
                response.status()
            )));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::model(format!("invalid embedding response: {}", e)))?;

        Ok(parsed.embedding)
    }

    fn dims(&self) -> usize {
        self.dims
    }
}

/// Cosine similarity between two vectors. Returns 0.0 for empty or
/// mismatched inputs.
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
