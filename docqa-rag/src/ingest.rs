//! Ingestion orchestrator.
//!
//! The [`IngestionPipeline`] turns a set of documents into a [`VectorIndex`]:
//! chunk every document, embed every chunk, then build the index in one step.
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::{IngestionPipeline, RagConfig};
//!
//! let pipeline = IngestionPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .build()?;
//!
//! let index = pipeline.build_index(&documents).await?;
//! let results = pipeline.query(&index, "search query").await?;
//! ```

use std::sync::Arc;

use tracing::{error, info};

use crate::chunking::{Chunker, TextChunker};
use crate::config::RagConfig;
use crate::document::{Chunk, Document, SearchResult};
use crate::embedding::{Embedder, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::index::VectorIndex;

/// Chunks, embeds, and indexes documents; embeds and searches queries.
///
/// Construct one via [`IngestionPipeline::builder()`].
#[derive(Clone)]
pub struct IngestionPipeline {
    config: RagConfig,
    embedder: Embedder,
    chunker: Arc<dyn Chunker>,
}

impl IngestionPipeline {
    /// Create a new [`IngestionPipelineBuilder`].
    pub fn builder() -> IngestionPipelineBuilder {
        IngestionPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the embedder.
    pub fn embedder(&self) -> &Embedder {
        &self.embedder
    }

    /// Split every document into chunks, in document order.
    pub fn chunk_all(&self, documents: &[Document]) -> Vec<Chunk> {
        documents.iter().flat_map(|d| self.chunker.chunk(d)).collect()
    }

    /// Build an index over all chunks of `documents`.
    ///
    /// All embeddings complete before the index is built; a failure anywhere
    /// produces no index at all.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::BackendUnavailable`] or [`RagError::InvalidEmbedding`]
    /// if embedding fails, and [`RagError::DimensionMismatch`] if the embeddings
    /// cannot form an index.
    pub async fn build_index(&self, documents: &[Document]) -> Result<VectorIndex> {
        let chunks = self.chunk_all(documents);
        if chunks.is_empty() {
            info!(documents = documents.len(), chunk_count = 0, "built empty index");
            return Ok(VectorIndex::empty());
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self.embedder.embed(&texts).await.inspect_err(|e| {
            error!(documents = documents.len(), error = %e, "embedding failed during ingestion");
        })?;

        let chunk_count = chunks.len();
        let index = VectorIndex::build_with_metric(chunks, embeddings, self.config.metric)?;
        info!(
            documents = documents.len(),
            chunk_count,
            dimensions = index.dimensions(),
            "built index"
        );
        Ok(index)
    }

    /// Embed `query` and return the configured `top_k` most similar chunks.
    ///
    /// # Errors
    ///
    /// Returns the embedder's error if the query cannot be embedded.
    pub async fn query(&self, index: &VectorIndex, query: &str) -> Result<Vec<SearchResult>> {
        self.query_top_k(index, query, self.config.top_k).await
    }

    /// Like [`IngestionPipeline::query`] with an explicit `k`.
    ///
    /// # Errors
    ///
    /// Returns the embedder's error if the query cannot be embedded.
    pub async fn query_top_k(
        &self,
        index: &VectorIndex,
        query: &str,
        k: usize,
    ) -> Result<Vec<SearchResult>> {
        if index.is_empty() {
            return Ok(Vec::new());
        }
        let embedding = self.embedder.embed_query(query).await.inspect_err(|e| {
            error!(error = %e, "embedding failed during query");
        })?;
        let results = index.search(&embedding, k)?;
        info!(result_count = results.len(), "query completed");
        Ok(results)
    }
}

impl std::fmt::Debug for IngestionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionPipeline")
            .field("config", &self.config)
            .field("embedder", &self.embedder)
            .finish_non_exhaustive()
    }
}

/// Builder for constructing an [`IngestionPipeline`].
///
/// The embedding provider is required. Without an explicit chunker, a
/// [`TextChunker`] is derived from the config.
#[derive(Default)]
pub struct IngestionPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    chunker: Option<Arc<dyn Chunker>>,
}

impl IngestionPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Override the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Build the [`IngestionPipeline`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the embedding provider is missing
    /// or the chunk window is invalid.
    pub fn build(self) -> Result<IngestionPipeline> {
        let config = self.config.unwrap_or_default();
        let provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let chunker = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(
                TextChunker::new(config.chunk_size, config.chunk_overlap)?
                    .with_separator(config.separator.clone()),
            ),
        };

        let embedder = Embedder::from_config(provider, &config);
        Ok(IngestionPipeline { embedder, config, chunker })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::HashEmbeddingProvider;

    fn pipeline(provider: HashEmbeddingProvider) -> IngestionPipeline {
        let config = RagConfig::builder().chunk_size(40).chunk_overlap(5).build().unwrap();
        IngestionPipeline::builder()
            .config(config)
            .embedding_provider(Arc::new(provider))
            .build()
            .unwrap()
    }

    #[test]
    fn builder_requires_provider() {
        assert!(matches!(
            IngestionPipeline::builder().build(),
            Err(RagError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn builds_index_over_all_documents() {
        let pipeline = pipeline(HashEmbeddingProvider::new(32));
        let docs = vec![
            Document::new("a.pdf", "The reported accuracy was 92%.\nTraining took two days."),
            Document::new("b.pdf", "The dataset contains ten thousand images."),
        ];

        let index = pipeline.build_index(&docs).await.unwrap();
        assert_eq!(index.len(), pipeline.chunk_all(&docs).len());
        assert_eq!(index.document_ids(), vec!["a.pdf", "b.pdf"]);

        let results = pipeline.query(&index, "What was the reported accuracy?").await.unwrap();
        assert!(results[0].chunk.text.contains("92%"));
    }

    #[tokio::test]
    async fn empty_documents_build_empty_index_without_embedding() {
        let provider = HashEmbeddingProvider::new(8);
        let pipeline = pipeline(provider.clone());
        let index = pipeline.build_index(&[Document::new("empty.pdf", "")]).await.unwrap();
        assert!(index.is_empty());
        assert!(pipeline.query(&index, "anything").await.unwrap().is_empty());
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn embedding_failure_yields_no_index() {
        let pipeline = pipeline(HashEmbeddingProvider::unavailable(8));
        let err = pipeline.build_index(&[Document::new("a", "text")]).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
