//! Gemini embedding provider using the Generative Language REST API.
//!
//! This module is only available when the `gemini` feature is enabled.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

const PROVIDER: &str = "Gemini";

/// The default Generative Language API base URL.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// The default embedding model.
pub const DEFAULT_MODEL: &str = "text-embedding-004";

/// Output dimensionality of `text-embedding-004`.
const DEFAULT_DIMENSIONS: usize = 768;

/// An [`EmbeddingProvider`] backed by the Gemini embedding API.
///
/// Documents are embedded with the `RETRIEVAL_DOCUMENT` task type and queries
/// with `RETRIEVAL_QUERY`, in a single `batchEmbedContents` call per batch.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::gemini::GeminiEmbeddingProvider;
///
/// let provider = GeminiEmbeddingProvider::new("your-api-key")?;
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct GeminiEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
}

impl GeminiEmbeddingProvider {
    /// Create a new provider with the given API key and the default model.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the key is empty.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::ConfigError("Gemini API key must not be empty".into()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.into(),
            model: DEFAULT_MODEL.into(),
            dimensions: DEFAULT_DIMENSIONS,
        })
    }

    /// Set the model name and the dimension it produces.
    pub fn with_model(mut self, model: impl Into<String>, dimensions: usize) -> Self {
        self.model = model.into();
        self.dimensions = dimensions;
        self
    }

    /// Point the provider at a different API root (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Apply a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the HTTP client cannot be built.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RagError::ConfigError(format!("failed to build HTTP client: {e}")))?;
        Ok(self)
    }

    fn model_path(&self) -> String {
        if self.model.starts_with("models/") {
            self.model.clone()
        } else {
            format!("models/{}", self.model)
        }
    }

    async fn batch_embed(&self, texts: &[&str], task_type: &'static str) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = self.model_path();
        debug!(provider = PROVIDER, batch_size = texts.len(), %model, task_type, "embedding batch");

        let body = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedRequest {
                    model: &model,
                    content: Content { parts: vec![Part { text: *text }] },
                    task_type,
                })
                .collect(),
        };

        let response = self
            .client
            .post(format!("{}/{model}:batchEmbedContents", self.base_url))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "request failed");
                RagError::unavailable(PROVIDER, format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            error!(provider = PROVIDER, %status, "API error");
            return Err(RagError::from_status(PROVIDER, status, detail));
        }

        let parsed: BatchEmbedResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            RagError::InvalidEmbedding {
                provider: PROVIDER.into(),
                message: format!("failed to parse response: {e}"),
            }
        })?;

        Ok(parsed.embeddings.into_iter().map(|e| e.values).collect())
    }
}

// ── Gemini API request/response types ──────────────────────────────

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: &'static str,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

// ── EmbeddingProvider implementation ───────────────────────────────

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.batch_embed(&[text], "RETRIEVAL_DOCUMENT").await?.into_iter().next().ok_or_else(
            || RagError::InvalidEmbedding {
                provider: PROVIDER.into(),
                message: "API returned empty response".into(),
            },
        )
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.batch_embed(texts, "RETRIEVAL_DOCUMENT").await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.batch_embed(&[text], "RETRIEVAL_QUERY").await?.into_iter().next().ok_or_else(|| {
            RagError::InvalidEmbedding {
                provider: PROVIDER.into(),
                message: "API returned empty response".into(),
            }
        })
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_key() {
        assert!(GeminiEmbeddingProvider::new("").is_err());
    }

    #[test]
    fn model_path_is_prefixed_once() {
        let provider = GeminiEmbeddingProvider::new("k").unwrap();
        assert_eq!(provider.model_path(), "models/text-embedding-004");
        let provider = provider.with_model("models/custom", 256);
        assert_eq!(provider.model_path(), "models/custom");
        assert_eq!(provider.dimensions(), 256);
    }

    #[test]
    fn request_uses_camel_case_task_type() {
        let body = BatchEmbedRequest {
            requests: vec![EmbedRequest {
                model: "models/m",
                content: Content { parts: vec![Part { text: "hi" }] },
                task_type: "RETRIEVAL_QUERY",
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["requests"][0]["taskType"], "RETRIEVAL_QUERY");
        assert_eq!(json["requests"][0]["content"]["parts"][0]["text"], "hi");
    }

    #[tokio::test]
    async fn unreachable_backend_is_unavailable() {
        let provider =
            GeminiEmbeddingProvider::new("k").unwrap().with_base_url("http://127.0.0.1:1");
        let err = provider.embed("text").await.unwrap_err();
        assert!(matches!(err, RagError::BackendUnavailable { .. }));
    }
}
