//! Configuration for chunking, embedding, and retrieval.

use serde::{Deserialize, Serialize};

use crate::chunking::DEFAULT_SEPARATOR;
use crate::error::{RagError, Result};
use crate::index::DistanceMetric;

/// Texts longer than this many characters are truncated before they are sent
/// to an embedding or language model backend.
pub const DEFAULT_MAX_INPUT_CHARS: usize = 50_000;

/// Configuration parameters for ingestion and retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Preferred chunk boundary; `None` always cuts at `chunk_size`.
    pub separator: Option<String>,
    /// Number of top results to return from vector search.
    pub top_k: usize,
    /// Inputs longer than this are truncated before embedding.
    pub max_input_chars: usize,
    /// Number of texts sent to the embedding backend per request.
    pub embed_batch_size: usize,
    /// Maximum number of embedding requests in flight during ingestion.
    pub max_concurrency: usize,
    /// Similarity metric used for both index construction and queries.
    pub metric: DistanceMetric,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            separator: Some(DEFAULT_SEPARATOR.to_string()),
            top_k: 4,
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            embed_batch_size: 32,
            max_concurrency: 4,
            metric: DistanceMetric::Cosine,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the preferred chunk boundary separator.
    pub fn separator(mut self, separator: Option<impl Into<String>>) -> Self {
        self.config.separator = separator.map(Into::into);
        self
    }

    /// Set the number of top results to return from vector search.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the truncation length applied to embedding inputs.
    pub fn max_input_chars(mut self, chars: usize) -> Self {
        self.config.max_input_chars = chars;
        self
    }

    /// Set the number of texts per embedding request.
    pub fn embed_batch_size(mut self, size: usize) -> Self {
        self.config.embed_batch_size = size;
        self
    }

    /// Set the maximum number of concurrent embedding requests.
    pub fn max_concurrency(mut self, limit: usize) -> Self {
        self.config.max_concurrency = limit;
        self
    }

    /// Set the similarity metric.
    pub fn metric(mut self, metric: DistanceMetric) -> Self {
        self.config.metric = metric;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k`, `max_input_chars`, `embed_batch_size` or `max_concurrency` is zero
    pub fn build(self) -> Result<RagConfig> {
        let config = self.config;
        if config.chunk_overlap >= config.chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        for (name, value) in [
            ("top_k", config.top_k),
            ("max_input_chars", config.max_input_chars),
            ("embed_batch_size", config.embed_batch_size),
            ("max_concurrency", config.max_concurrency),
        ] {
            if value == 0 {
                return Err(RagError::ConfigError(format!("{name} must be greater than zero")));
            }
        }
        Ok(config)
    }
}
