//! In-memory vector index.
//!
//! [`VectorIndex`] is an immutable collection of chunks paired with their
//! embeddings. It is built once per ingestion and searched by brute force,
//! which is plenty for a handful of papers.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::{Chunk, SearchResult};
use crate::error::{RagError, Result};

/// Similarity metric used to score a query against stored embeddings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Cosine similarity in `[-1, 1]`. Zero-magnitude vectors score 0.
    #[default]
    Cosine,
    /// Raw dot product, for providers that return normalized vectors.
    DotProduct,
}

impl DistanceMetric {
    /// Score `a` against `b`. Both slices must have the same length.
    pub fn score(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Cosine => cosine_similarity(a, b),
            Self::DotProduct => dot(a, b),
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot(a, b) / (norm_a * norm_b)
}

/// A stored chunk and its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// The chunk.
    pub chunk: Chunk,
    /// Embedding of the chunk text.
    pub embedding: Vec<f32>,
}

/// An immutable set of `(chunk, embedding)` entries supporting top-k search.
///
/// Every embedding has the same dimension. Entries keep insertion order, which
/// also breaks ties between equal scores.
///
/// The index serializes to JSON for snapshots; loading a snapshot re-checks
/// that every embedding has the recorded dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "IndexSnapshot")]
pub struct VectorIndex {
    entries: Vec<IndexEntry>,
    dimensions: usize,
    metric: DistanceMetric,
}

#[derive(Deserialize)]
struct IndexSnapshot {
    entries: Vec<IndexEntry>,
    dimensions: usize,
    #[serde(default)]
    metric: DistanceMetric,
}

impl TryFrom<IndexSnapshot> for VectorIndex {
    type Error = RagError;

    fn try_from(snapshot: IndexSnapshot) -> Result<Self> {
        check_dimensions(&snapshot.entries, snapshot.dimensions)?;
        Ok(Self {
            entries: snapshot.entries,
            dimensions: snapshot.dimensions,
            metric: snapshot.metric,
        })
    }
}

fn check_dimensions(entries: &[IndexEntry], dimensions: usize) -> Result<()> {
    match entries.iter().find(|e| e.embedding.len() != dimensions) {
        Some(bad) => Err(RagError::DimensionMismatch(format!(
            "chunk '{}' has dimension {}, expected {dimensions}",
            bad.chunk.id,
            bad.embedding.len()
        ))),
        None => Ok(()),
    }
}

impl VectorIndex {
    /// Build a cosine-similarity index from parallel lists of chunks and embeddings.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if the lists differ in length or
    /// the embeddings do not all share one dimension.
    pub fn build(chunks: Vec<Chunk>, embeddings: Vec<Vec<f32>>) -> Result<Self> {
        Self::build_with_metric(chunks, embeddings, DistanceMetric::Cosine)
    }

    /// Build an index scored with the given metric.
    ///
    /// # Errors
    ///
    /// Same as [`VectorIndex::build`].
    pub fn build_with_metric(
        chunks: Vec<Chunk>,
        embeddings: Vec<Vec<f32>>,
        metric: DistanceMetric,
    ) -> Result<Self> {
        if chunks.len() != embeddings.len() {
            return Err(RagError::DimensionMismatch(format!(
                "{} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }

        let dimensions = embeddings.first().map_or(0, Vec::len);
        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry { chunk, embedding })
            .collect();
        check_dimensions(&entries, dimensions)?;

        debug!(entries = entries.len(), dimensions, ?metric, "built vector index");
        Ok(Self { entries, dimensions, metric })
    }

    /// An index with no entries. Every search on it returns nothing.
    pub fn empty() -> Self {
        Self { entries: Vec::new(), dimensions: 0, metric: DistanceMetric::Cosine }
    }

    /// Return the `k` entries most similar to `query`, best first.
    ///
    /// `k` is clamped to the number of entries. Equal scores keep insertion
    /// order. A NaN score counts as negative infinity and ranks last.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if the index is non-empty and
    /// `query` has a different dimension.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dimensions {
            return Err(RagError::DimensionMismatch(format!(
                "query has dimension {}, index has {}",
                query.len(),
                self.dimensions
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let score = self.metric.score(&entry.embedding, query);
                (i, if score.is_nan() { f32::NEG_INFINITY } else { score })
            })
            .collect();

        // sort_by is stable, so ties stay in insertion order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k.min(self.entries.len()));

        Ok(scored
            .into_iter()
            .map(|(i, score)| SearchResult { chunk: self.entries[i].chunk.clone(), score })
            .collect())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Embedding dimension shared by all entries (0 for an empty index).
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// The metric used for scoring.
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Distinct document IDs in order of first appearance.
    pub fn document_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for entry in &self.entries {
            let id = entry.chunk.document_id.as_str();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    /// Serialize the index as a JSON snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Snapshot`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Load an index from a JSON snapshot produced by [`VectorIndex::to_json`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Snapshot`] if the JSON is malformed or an entry's
    /// embedding does not match the recorded dimension.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for VectorIndex {
    fn default() -> Self {
        Self::empty()
    }
}
