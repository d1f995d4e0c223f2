//! # docqa-rag
//!
//! Retrieval building blocks for document question answering.
//!
//! ## Overview
//!
//! - [`TextChunker`] / [`split_text`] - overlapping, separator-aware chunking
//! - [`Embedder`] - order-preserving, batched, bounded-concurrency embedding
//!   over any [`EmbeddingProvider`]
//! - [`VectorIndex`] - immutable in-memory index with top-k similarity search
//! - [`IngestionPipeline`] - documents in, index out
//!
//! Providers:
//!
//! - [`gemini::GeminiEmbeddingProvider`] (`gemini` feature)
//! - [`openai::OpenAIEmbeddingProvider`] (`openai` feature)
//! - [`mock::HashEmbeddingProvider`] - deterministic, offline
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docqa_rag::{Document, IngestionPipeline, RagConfig};
//! use docqa_rag::mock::HashEmbeddingProvider;
//!
//! let pipeline = IngestionPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(HashEmbeddingProvider::new(64)))
//!     .build()?;
//!
//! let index = pipeline.build_index(&[Document::new("paper.pdf", text)]).await?;
//! let hits = pipeline.query(&index, "What was the reported accuracy?").await?;
//! ```

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
#[cfg(feature = "gemini")]
pub mod gemini;
pub mod index;
pub mod ingest;
pub mod mock;
#[cfg(feature = "openai")]
pub mod openai;

pub use chunking::{Chunker, DEFAULT_SEPARATOR, TextChunker, TextSpan, split_text};
pub use config::{DEFAULT_MAX_INPUT_CHARS, RagConfig, RagConfigBuilder};
pub use document::{Chunk, Document, SearchResult};
pub use embedding::{Embedder, EmbeddingProvider, truncate_chars};
pub use error::{RagError, Result};
pub use index::{DistanceMetric, IndexEntry, VectorIndex};
pub use ingest::{IngestionPipeline, IngestionPipelineBuilder};
