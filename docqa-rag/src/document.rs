//! Data types for documents, chunks, and search results.

use serde::{Deserialize, Serialize};

/// A source document: an identifier plus its extracted text.
///
/// The text is only needed until the document has been chunked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    /// Unique identifier for the document, usually the uploaded file name.
    pub id: String,
    /// The extracted text content of the document.
    pub text: String,
}

impl Document {
    /// Create a document from an identifier and its text.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into() }
    }
}

/// An immutable segment of a [`Document`].
///
/// `document_id` refers back to the source document by name only; a chunk never
/// owns its document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// Unique identifier for the chunk (`{document_id}_{index}`).
    pub id: String,
    /// The ID of the parent [`Document`].
    pub document_id: String,
    /// Position of this chunk within its document, starting at zero.
    pub index: usize,
    /// Character offset of the first character of this chunk in the document.
    pub offset: usize,
    /// The text content of the chunk.
    pub text: String,
}

/// A retrieved [`Chunk`] paired with its similarity score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The similarity score (higher is more relevant).
    pub score: f32,
}
