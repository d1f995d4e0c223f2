//! Error types for the `docqa-rag` crate.

use thiserror::Error;

/// Errors that can occur while chunking, embedding, or indexing documents.
#[derive(Debug, Error)]
pub enum RagError {
    /// The embedding backend could not be reached or is overloaded.
    #[error("Embedding backend unavailable ({provider}): {message}")]
    BackendUnavailable {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The embedding backend rejected the request itself, e.g. a bad API key.
    ///
    /// Sending the same request again will not help.
    #[error("Embedding request rejected ({provider}, HTTP {status}): {message}")]
    RequestRejected {
        /// The embedding provider that rejected the request.
        provider: String,
        /// HTTP status code.
        status: u16,
        /// Response body or description.
        message: String,
    },

    /// The embedding backend answered, but with vectors of the wrong shape.
    #[error("Invalid embedding response ({provider}): {message}")]
    InvalidEmbedding {
        /// The embedding provider that produced the response.
        provider: String,
        /// A description of the mismatch.
        message: String,
    },

    /// Chunks and embeddings (or query and index) disagree in count or dimension.
    ///
    /// This is an internal invariant violation and aborts the current index build.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An error in ingestion orchestration.
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// A vector index snapshot could not be encoded or decoded.
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

impl RagError {
    /// Shorthand for [`RagError::BackendUnavailable`].
    pub fn unavailable(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BackendUnavailable { provider: provider.into(), message: message.into() }
    }

    /// Classify a non-success HTTP status: throttling and server faults are
    /// transient, anything else is a rejected request.
    #[cfg(any(feature = "gemini", feature = "openai"))]
    pub(crate) fn from_status(provider: &str, status: reqwest::StatusCode, detail: String) -> Self {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            Self::unavailable(provider, format!("API returned {status}: {detail}"))
        } else {
            Self::RequestRejected {
                provider: provider.to_string(),
                status: status.as_u16(),
                message: detail,
            }
        }
    }

    /// Returns `true` for failures a caller may reasonably retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BackendUnavailable { .. })
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
