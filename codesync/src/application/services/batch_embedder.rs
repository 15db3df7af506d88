// /////////////////////////////////////////////////////////////////////////////
// codesync
// /////////////////////////////////////////////////////////////////////////////

//! # Batch Embedder
//!
//! Turns N single-text embedding calls into N/`batch_size` calls against an
//! [`EmbeddingProvider`], admitting each batch through a [`RateLimiter`] and
//! falling back to per-text embedding when a whole batch fails after retry.

use crate::infrastructure::runtime::rate_limiter::RateLimiter;
use codesync_domain::{Embedding, EmbeddingProvider, ErrorCategory, SyncError};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy)]
pub struct BatchEmbedderConfig {
    pub batch_size: usize,
    pub max_retries: u32,
}

impl Default for BatchEmbedderConfig {
    fn default() -> Self {
        Self { batch_size: 50, max_retries: 3 }
    }
}

pub struct BatchEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
    rate_limiter: RateLimiter,
    config: BatchEmbedderConfig,
}

impl BatchEmbedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, rate_limiter: RateLimiter, config: BatchEmbedderConfig) -> Self {
        Self { provider, rate_limiter, config }
    }

    /// Embeds every text in `texts`, returning one entry per input in input
    /// order. A text that could not be embedded even individually is `None`
    /// at that index rather than failing the whole call.
    pub async fn embed_batch(&self, texts: &[String]) -> Vec<Option<Embedding>> {
        if texts.is_empty() {
            return Vec::new();
        }

        let num_batches = texts.len().div_ceil(self.config.batch_size);
        info!(texts = texts.len(), num_batches, batch_size = self.config.batch_size, "batch embedding");

        let mut embeddings = Vec::with_capacity(texts.len());
        for (batch_num, chunk) in texts.chunks(self.config.batch_size).enumerate() {
            match self.embed_with_retry(chunk).await {
                Ok(batch_embeddings) => embeddings.extend(batch_embeddings),
                Err(err) => {
                    warn!(batch_num, total_batches = num_batches, %err, "batch failed after retries, falling back to per-text embedding");
                    embeddings.extend(self.embed_individually(chunk).await);
                }
            }
        }

        let successful = embeddings.iter().filter(|e| e.is_some()).count();
        info!(successful, total = texts.len(), "batch embedding complete");
        embeddings
    }

    async fn embed_with_retry(&self, batch: &[String]) -> Result<Vec<Option<Embedding>>, SyncError> {
        let mut attempt = 0u32;
        loop {
            self.rate_limiter.acquire().await;
            match self.provider.embed(batch).await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    attempt += 1;
                    let category = err.category();
                    let retryable = matches!(
                        category,
                        ErrorCategory::Network | ErrorCategory::Embedding | ErrorCategory::Database
                    );
                    if attempt > self.config.max_retries || !retryable {
                        return Err(err);
                    }
                    let wait = std::time::Duration::from_secs(2u64.pow(attempt));
                    warn!(attempt, max_retries = self.config.max_retries, ?wait, %err, "retrying batch embed call");
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    async fn embed_individually(&self, texts: &[String]) -> Vec<Option<Embedding>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            self.rate_limiter.acquire().await;
            match self.provider.embed(std::slice::from_ref(text)).await {
                Ok(mut result) => out.push(result.pop().flatten()),
                Err(err) => {
                    warn!(%err, "individual embedding failed");
                    out.push(None);
                }
            }
        }
        out
    }
}

/// Batches texts so that neither `max_items_per_batch` nor
/// `max_tokens_per_batch` is exceeded, estimating tokens as `len(text) / 4`.
#[derive(Debug, Clone, Copy)]
pub struct TokenAwareBatcher {
    pub max_tokens_per_batch: usize,
    pub max_items_per_batch: usize,
}

impl Default for TokenAwareBatcher {
    fn default() -> Self {
        Self { max_tokens_per_batch: 8000, max_items_per_batch: 50 }
    }
}

impl TokenAwareBatcher {
    pub fn create_batches(&self, texts: &[String]) -> Vec<Vec<String>> {
        let mut batches = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut current_tokens = 0usize;

        for text in texts {
            let estimated_tokens = text.len() / 4;
            let would_exceed_tokens = current_tokens + estimated_tokens > self.max_tokens_per_batch;
            let would_exceed_items = current.len() >= self.max_items_per_batch;

            if (would_exceed_tokens || would_exceed_items) && !current.is_empty() {
                batches.push(std::mem::take(&mut current));
                current_tokens = 0;
            }
            current_tokens += estimated_tokens;
            current.push(text.clone());
        }

        if !current.is_empty() {
            batches.push(current);
        }
        batches
    }
}
