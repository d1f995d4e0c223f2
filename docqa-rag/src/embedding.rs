//! Embedding providers and the order-preserving [`Embedder`].

use std::sync::Arc;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use tracing::debug;

use crate::config::{DEFAULT_MAX_INPUT_CHARS, RagConfig};
use crate::error::{RagError, Result};

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends (Gemini, OpenAI, etc.)
/// behind a unified async interface. The default [`embed_batch`](EmbeddingProvider::embed_batch)
/// implementation calls [`embed`](EmbeddingProvider::embed) sequentially;
/// backends that support native batching should override it.
///
/// An unreachable backend must surface as [`RagError::BackendUnavailable`],
/// never as placeholder vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single document text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of document texts, in input order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Generate an embedding for a search query.
    ///
    /// Backends that distinguish query and document embeddings override this.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(text).await
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// Provider name used in logs and errors.
    fn name(&self) -> &str;
}

/// Truncate `text` to at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Maps texts to vectors through an [`EmbeddingProvider`].
///
/// One vector per input, in input order, all of the provider's dimension.
/// Inputs are truncated to `max_input_chars`, sent in batches of
/// `batch_size`, with at most `max_concurrency` batches in flight.
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    max_input_chars: usize,
    batch_size: usize,
    max_concurrency: usize,
}

impl Embedder {
    /// Wrap a provider using the default limits.
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self::from_config(provider, &RagConfig::default())
    }

    /// Wrap a provider using the limits from a validated [`RagConfig`].
    pub fn from_config(provider: Arc<dyn EmbeddingProvider>, config: &RagConfig) -> Self {
        Self {
            provider,
            max_input_chars: config.max_input_chars.max(1),
            batch_size: config.embed_batch_size.max(1),
            max_concurrency: config.max_concurrency.max(1),
        }
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    /// Dimensionality of every vector this embedder returns.
    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    /// Embed document texts.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::BackendUnavailable`] if the backend cannot be reached
    /// and [`RagError::InvalidEmbedding`] if it answers with the wrong number of
    /// vectors or the wrong dimension.
    pub async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let truncated: Vec<&str> =
            texts.iter().map(|t| truncate_chars(t, self.max_input_chars)).collect();

        debug!(
            provider = self.provider.name(),
            texts = texts.len(),
            batch_size = self.batch_size,
            max_concurrency = self.max_concurrency,
            "embedding texts"
        );

        let batches: Vec<Vec<Vec<f32>>> = futures::stream::iter(truncated.chunks(self.batch_size))
            .map(|batch| async move {
                let vectors = self.provider.embed_batch(batch).await?;
                self.check_vectors(batch.len(), &vectors)?;
                Ok::<_, RagError>(vectors)
            })
            .buffered(self.max_concurrency)
            .try_collect()
            .await?;

        Ok(batches.into_iter().flatten().collect())
    }

    /// Embed a search query.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Embedder::embed`].
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let text = truncate_chars(text, self.max_input_chars);
        let vector = self.provider.embed_query(text).await?;
        self.check_vectors(1, std::slice::from_ref(&vector))?;
        Ok(vector)
    }

    fn check_vectors(&self, expected: usize, vectors: &[Vec<f32>]) -> Result<()> {
        if vectors.len() != expected {
            return Err(RagError::InvalidEmbedding {
                provider: self.provider.name().to_string(),
                message: format!("expected {expected} vectors, got {}", vectors.len()),
            });
        }
        let dimensions = self.provider.dimensions();
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimensions) {
            return Err(RagError::InvalidEmbedding {
                provider: self.provider.name().to_string(),
                message: format!("expected dimension {dimensions}, got {}", bad.len()),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for Embedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Embedder")
            .field("provider", &self.provider.name())
            .field("max_input_chars", &self.max_input_chars)
            .field("batch_size", &self.batch_size)
            .field("max_concurrency", &self.max_concurrency)
            .finish()
    }
}
