//! Error types for the `docqa-chat` crate.

use docqa_model::ModelError;
use docqa_rag::RagError;
use thiserror::Error;

/// Errors from answering a question.
///
/// On every variant the conversation history is left exactly as it was.
#[derive(Debug, Error)]
pub enum ChatError {
    /// No document content has been indexed.
    #[error("No documents have been indexed")]
    NoDocuments,

    /// The embedding backend could not be reached.
    #[error("Embedding backend unavailable: {0}")]
    BackendUnavailable(#[source] RagError),

    /// The language model failed or timed out.
    #[error("Answer generation failed: {0}")]
    GenerationFailed(#[source] ModelError),

    /// Retrieval failed for a reason other than backend availability.
    #[error("Retrieval failed: {0}")]
    Retrieval(#[source] RagError),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ChatError {
    /// Returns `true` if repeating the same question may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::BackendUnavailable(_) => true,
            Self::GenerationFailed(e) => {
                !matches!(e, ModelError::Api { .. } | ModelError::Config(_))
            }
            Self::NoDocuments | Self::Retrieval(_) | Self::Config(_) => false,
        }
    }
}

impl From<RagError> for ChatError {
    fn from(error: RagError) -> Self {
        if error.is_retryable() { Self::BackendUnavailable(error) } else { Self::Retrieval(error) }
    }
}

impl From<ModelError> for ChatError {
    fn from(error: ModelError) -> Self {
        Self::GenerationFailed(error)
    }
}

/// Errors from turning uploaded bytes into text.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The document parsed but contained no text.
    #[error("No extractable text in '{0}'")]
    ExtractionEmpty(String),

    /// The PDF could not be parsed.
    #[error("PDF error in '{name}': {message}")]
    Pdf {
        /// The document name.
        name: String,
        /// Parser message.
        message: String,
    },

    /// The file type is not supported.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from session lifecycle operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session was reset or re-uploaded while this ingestion was running.
    #[error("Ingestion superseded: started at generation {started}, session is at {current}")]
    Stale {
        /// Generation the ingestion was started under.
        started: u64,
        /// Generation of the session at commit time.
        current: u64,
    },

    /// Building the index failed.
    #[error("Ingestion failed: {0}")]
    Ingestion(#[from] RagError),

    /// Answering a question failed.
    #[error(transparent)]
    Chat(#[from] ChatError),

    /// No session with this id exists.
    #[error("Unknown session '{0}'")]
    NotFound(String),
}

impl SessionError {
    /// Returns `true` if repeating the operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Ingestion(e) => e.is_retryable(),
            Self::Chat(e) => e.is_retryable(),
            Self::Stale { .. } | Self::NotFound(_) => false,
        }
    }
}

/// A convenience result type for chat operations.
pub type Result<T> = std::result::Result<T, ChatError>;
