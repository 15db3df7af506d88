// /////////////////////////////////////////////////////////////////////////////
// codesync
// /////////////////////////////////////////////////////////////////////////////

//! # Embedding Provider Adapters
//!
//! [`HttpEmbeddingProvider`] calls an external embedding API over HTTP,
//! exposing a single batch `embed` operation. [`FakeEmbeddingProvider`] is a
//! deterministic in-process stand-in used by tests and local development.

use async_trait::async_trait;
use codesync_domain::{Embedding, EmbeddingProvider, SyncError};
use serde::{Deserialize, Serialize};

use crate::infrastructure::sync::error_classifier::classify_reqwest_error;

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedItem>,
}

#[derive(Debug, Deserialize)]
struct EmbedItem {
    embedding: Embedding,
}

/// Calls an OpenAI-compatible embeddings endpoint (`POST {base_url}/embeddings`).
/// `max_tokens_per_request` is supplied at construction because it is a
/// property of the provider's pricing tier, not something discoverable from
/// a single response.
pub struct HttpEmbeddingProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens_per_request: usize,
}

impl HttpEmbeddingProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens_per_request: 8_191,
        }
    }

    pub fn with_max_tokens_per_request(mut self, max_tokens: usize) -> Self {
        self.max_tokens_per_request = max_tokens;
        self
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Option<Embedding>>, SyncError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .http
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&EmbedRequest { input: texts, model: &self.model })
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SyncError::Embedding("rate limit: 429 too many requests".to_string()));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Embedding(format!("embedding provider returned {status}: {body}")));
        }

        let parsed: EmbedResponse = response.json().await.map_err(classify_reqwest_error)?;
        Ok(parsed.data.into_iter().map(|item| Some(item.embedding)).collect())
    }

    fn max_tokens_per_request(&self) -> usize {
        self.max_tokens_per_request
    }
}

/// Deterministic fake producing a fixed-dimension vector derived from each
/// text's byte length, so repeated calls for the same text are stable
/// without depending on network access.
pub struct FakeEmbeddingProvider {
    dimension: usize,
    max_tokens_per_request: usize,
}

impl FakeEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self { dimension, max_tokens_per_request: 8_191 }
    }
}

impl Default for FakeEmbeddingProvider {
    fn default() -> Self {
        Self::new(8)
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbeddingProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Option<Embedding>>, SyncError> {
        Ok(texts
            .iter()
            .map(|text| {
                let seed = text.len() as f32 + 1.0;
                Some((0..self.dimension).map(|i| (seed + i as f32) / 100.0).collect())
            })
            .collect())
    }

    fn max_tokens_per_request(&self) -> usize {
        self.max_tokens_per_request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_provider_is_deterministic_for_the_same_text() {
        let provider = FakeEmbeddingProvider::new(4);
        let a = provider.embed(&["hello".to_string()]).await.unwrap();
        let b = provider.embed(&["hello".to_string()]).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].as_ref().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn fake_provider_embeds_every_input_in_order() {
        let provider = FakeEmbeddingProvider::default();
        let texts = vec!["a".to_string(), "bb".to_string(), "ccc".to_string()];
        let result = provider.embed(&texts).await.unwrap();
        assert_eq!(result.len(), 3);
        assert!(result.iter().all(Option::is_some));
    }

    #[tokio::test]
    async fn empty_input_to_http_provider_returns_empty_without_a_request() {
        let provider = HttpEmbeddingProvider::new("http://localhost:0", "key", "test-model");
        let result = provider.embed(&[]).await.unwrap();
        assert!(result.is_empty());
    }
}
