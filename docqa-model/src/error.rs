//! Error types for the `docqa-model` crate.

use std::time::Duration;

use thiserror::Error;

/// Errors returned by language model clients.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    /// The backend could not be reached, or answered with a transient failure
    /// (rate limiting, 5xx).
    #[error("Model backend unavailable ({provider}): {message}")]
    Unavailable {
        /// The provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The backend rejected the request.
    #[error("Model API error ({provider}, status {status}): {message}")]
    Api {
        /// The provider that produced the error.
        provider: String,
        /// HTTP status code.
        status: u16,
        /// Error detail returned by the backend.
        message: String,
    },

    /// The backend answered without any text.
    #[error("Empty response from {provider}")]
    EmptyResponse {
        /// The provider that produced the response.
        provider: String,
    },

    /// The backend answered with a body that could not be decoded.
    #[error("Invalid response from {provider}: {message}")]
    InvalidResponse {
        /// The provider that produced the response.
        provider: String,
        /// A description of the decoding failure.
        message: String,
    },

    /// The call did not complete within the allotted time.
    #[error("Model call timed out after {0:?}")]
    Timeout(Duration),

    /// Client construction failed.
    #[error("Model configuration error: {0}")]
    Config(String),
}

impl ModelError {
    /// Shorthand for [`ModelError::Unavailable`].
    pub fn unavailable(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unavailable { provider: provider.into(), message: message.into() }
    }

    /// Returns `true` for failures a caller may reasonably retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout(_))
    }
}

/// A convenience result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;

#[cfg(any(feature = "gemini", feature = "openai"))]
impl ModelError {
    /// Map a non-success HTTP status: throttling and server errors are
    /// transient, everything else is a rejected request.
    pub(crate) fn from_status(provider: &str, status: reqwest::StatusCode, detail: String) -> Self {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            Self::unavailable(provider, format!("API returned {status}: {detail}"))
        } else {
            Self::Api { provider: provider.to_string(), status: status.as_u16(), message: detail }
        }
    }

    pub(crate) fn from_transport(provider: &str, error: &reqwest::Error) -> Self {
        let kind = if error.is_timeout() { "request timed out" } else { "request failed" };
        Self::unavailable(provider, format!("{kind}: {error}"))
    }
}
