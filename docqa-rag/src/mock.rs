//! Deterministic embedding provider for tests, demos, and offline runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// How [`HashEmbeddingProvider`] turns text into a vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashMode {
    /// Hashed bag of lowercase words: texts sharing words score higher.
    Lexical,
    /// A single hash of the whole text: only identical texts match exactly.
    WholeText,
}

/// Deterministic, hash-based embeddings with no network access.
///
/// Vectors are L2-normalized, so cosine similarity reduces to a dot product.
/// Counts every call so tests can assert the backend was (not) used.
#[derive(Debug, Clone)]
pub struct HashEmbeddingProvider {
    dimensions: usize,
    mode: HashMode,
    unavailable: bool,
    calls: Arc<AtomicUsize>,
}

impl Default for HashEmbeddingProvider {
    fn default() -> Self {
        Self::new(64)
    }
}

impl HashEmbeddingProvider {
    /// Lexical provider with the given dimension.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
            mode: HashMode::Lexical,
            unavailable: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Whole-text provider with the given dimension.
    pub fn whole_text(dimensions: usize) -> Self {
        Self { mode: HashMode::WholeText, ..Self::new(dimensions) }
    }

    /// A provider whose every call fails with [`RagError::BackendUnavailable`].
    pub fn unavailable(dimensions: usize) -> Self {
        Self { unavailable: true, ..Self::new(dimensions) }
    }

    /// Number of `embed*` calls made so far (a batch counts once).
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimensions];
        match self.mode {
            HashMode::Lexical => {
                for word in words(text) {
                    let h = fnv1a(word.as_bytes());
                    let idx = (h % self.dimensions as u64) as usize;
                    let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
                    v[idx] += sign;
                }
            }
            HashMode::WholeText => {
                let mut state = fnv1a(text.as_bytes());
                for x in &mut v {
                    state = state
                        .wrapping_mul(6_364_136_223_846_793_005)
                        .wrapping_add(1_442_695_040_888_963_407);
                    *x = ((state >> 40) as f32 / (1u64 << 24) as f32) * 2.0 - 1.0;
                }
            }
        }
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }

    fn check_available(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(RagError::unavailable("hash", "backend configured as unavailable"));
        }
        Ok(())
    }
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '%'))
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325u64, |acc, b| {
        (acc ^ u64::from(*b)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.check_available()?;
        Ok(self.vector_for(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.check_available()?;
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "hash"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn identical_text_gives_identical_vectors() {
        let provider = HashEmbeddingProvider::new(32);
        let a = provider.embed("The reported accuracy was 92%.").await.unwrap();
        let b = provider.embed("The reported accuracy was 92%.").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn lexical_mode_is_case_insensitive() {
        let provider = HashEmbeddingProvider::new(32);
        let a = provider.embed("Accuracy").await.unwrap();
        let b = provider.embed("accuracy!").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn unavailable_provider_fails_every_call() {
        let provider = HashEmbeddingProvider::unavailable(8);
        assert!(provider.embed("x").await.is_err());
        assert!(provider.embed_batch(&["x", "y"]).await.is_err());
        assert_eq!(provider.calls(), 2);
    }
}
