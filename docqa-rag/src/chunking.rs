//! Document chunking.
//!
//! This module provides the [`Chunker`] trait and [`TextChunker`], which splits
//! text into overlapping windows of a fixed maximum size, preferring to end a
//! window at a separator (a newline by default).
//!
//! Sizes and offsets are measured in characters, never bytes, so a multi-byte
//! character is never split.

use serde::{Deserialize, Serialize};

use crate::document::{Chunk, Document};
use crate::error::{RagError, Result};

/// The separator [`TextChunker`] prefers to end chunks at.
pub const DEFAULT_SEPARATOR: &str = "\n";

/// A strategy for splitting documents into chunks.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has empty text.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// A contiguous window of a text produced by [`split_text`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSpan {
    /// Character offset of the first character of the span.
    pub offset: usize,
    /// The span text.
    pub text: String,
}

/// Splits text into overlapping windows of at most `chunk_size` characters.
///
/// Consecutive chunks share exactly `chunk_overlap` characters: each chunk
/// starts `chunk_overlap` characters before the previous one ended. A chunk
/// ends right after the last separator inside its window as long as the text
/// still fits in `ceil(len / (chunk_size - chunk_overlap))` chunks; otherwise
/// it is cut at exactly `chunk_size` characters. Only the final chunk may be
/// shorter.
///
/// Chunk IDs are generated as `{document_id}_{chunk_index}`.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::TextChunker;
///
/// let chunker = TextChunker::new(1000, 200)?;
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separator: Option<String>,
}

impl TextChunker {
    /// Create a new `TextChunker` that prefers newline boundaries.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] unless `chunk_size > chunk_overlap`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate_window(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap, separator: Some(DEFAULT_SEPARATOR.to_string()) })
    }

    /// Set the preferred boundary separator. `None` (or an empty string) cuts
    /// every chunk at exactly `chunk_size` characters.
    pub fn with_separator(mut self, separator: Option<impl Into<String>>) -> Self {
        self.separator = separator.map(Into::into).filter(|s| !s.is_empty());
        self
    }

    /// Maximum chunk length in characters.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Overlap between consecutive chunks in characters.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }
}

impl Chunker for TextChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        split_spans(&document.text, self.chunk_size, self.chunk_overlap, self.separator.as_deref())
            .into_iter()
            .enumerate()
            .map(|(index, span)| Chunk {
                id: format!("{}_{index}", document.id),
                document_id: document.id.clone(),
                index,
                offset: span.offset,
                text: span.text,
            })
            .collect()
    }
}

/// Split `text` into overlapping spans. Pure and deterministic.
///
/// # Errors
///
/// Returns [`RagError::ConfigError`] unless `chunk_size > chunk_overlap`.
pub fn split_text(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
    separator: Option<&str>,
) -> Result<Vec<TextSpan>> {
    validate_window(chunk_size, chunk_overlap)?;
    Ok(split_spans(text, chunk_size, chunk_overlap, separator))
}

fn validate_window(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_overlap >= chunk_size {
        return Err(RagError::ConfigError(format!(
            "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

/// Caller guarantees `chunk_size > chunk_overlap`.
fn split_spans(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
    separator: Option<&str>,
) -> Vec<TextSpan> {
    if text.is_empty() {
        return Vec::new();
    }

    // Byte offset of every character boundary, including the end of the text.
    let bounds: Vec<usize> =
        text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();
    let len = bounds.len() - 1;
    let stride = chunk_size - chunk_overlap;
    let budget = len.div_ceil(stride);
    let separator = separator.filter(|s| !s.is_empty());

    let mut spans = Vec::new();
    let mut start = 0;

    loop {
        let hard_end = (start + chunk_size).min(len);
        if hard_end == len {
            spans.push(span_at(text, &bounds, start, len));
            break;
        }

        let end = separator
            .and_then(|sep| last_separator_end(text, &bounds, start, hard_end, sep))
            .filter(|&end| {
                // Hard cuts from `end` on must still fit in the budget.
                let rest = (len - end).div_ceil(stride).max(1);
                end > start + chunk_overlap && spans.len() + 1 + rest <= budget
            })
            .unwrap_or(hard_end);

        spans.push(span_at(text, &bounds, start, end));
        start = end - chunk_overlap;
    }

    spans
}

/// Character position just past the last `separator` inside `[start, end)`.
fn last_separator_end(
    text: &str,
    bounds: &[usize],
    start: usize,
    end: usize,
    separator: &str,
) -> Option<usize> {
    let window = &text[bounds[start]..bounds[end]];
    let pos = window.rfind(separator)?;
    let byte_end = bounds[start] + pos + separator.len();
    bounds.binary_search(&byte_end).ok()
}

fn span_at(text: &str, bounds: &[usize], start: usize, end: usize) -> TextSpan {
    TextSpan { offset: start, text: text[bounds[start]..bounds[end]].to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(spans: &[TextSpan]) -> Vec<&str> {
        spans.iter().map(|s| s.text.as_str()).collect()
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(split_text("", 1000, 200, Some("\n")).unwrap().is_empty());
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let spans = split_text("hello world", 1000, 200, Some("\n")).unwrap();
        assert_eq!(texts(&spans), vec!["hello world"]);
        assert_eq!(spans[0].offset, 0);
    }

    #[test]
    fn hard_cuts_overlap_exactly() {
        let spans = split_text("abcdefghij", 4, 1, None).unwrap();
        assert_eq!(texts(&spans), vec!["abcd", "defg", "ghij"]);
        assert_eq!(spans.iter().map(|s| s.offset).collect::<Vec<_>>(), vec![0, 3, 6]);
    }

    #[test]
    fn prefers_separator_inside_window() {
        let text = "aaaaaa\nbbbbbbbbbbbb";
        let spans = split_text(text, 10, 2, Some("\n")).unwrap();
        assert_eq!(spans[0].text, "aaaaaa\n");
        assert_eq!(spans[1].offset, 5);
        assert!(spans[1].text.starts_with("a\n"));
    }

    #[test]
    fn separator_that_costs_a_chunk_falls_back_to_hard_cut() {
        // 16 chars fit in two chunks of stride 8; cutting at the newline needs three.
        let text = "aa\nbbbbbbbbbbbbb";
        let spans = split_text(text, 10, 2, Some("\n")).unwrap();
        assert_eq!(texts(&spans), vec!["aa\nbbbbbbb", "bbbbbbbb"]);
    }

    #[test]
    fn many_short_lines_stay_within_chunk_budget() {
        let text = format!("{}\n", "a".repeat(400)).repeat(40);
        let len = text.chars().count();
        let spans = split_text(&text, 1000, 200, Some("\n")).unwrap();
        assert!(spans.len() <= len.div_ceil(800), "{} chunks for {len} chars", spans.len());
    }

    #[test]
    fn multibyte_characters_are_never_split() {
        let text = "héllo wörld ünïcödé";
        let spans = split_text(text, 5, 2, None).unwrap();
        for span in &spans {
            assert!(span.text.chars().count() <= 5);
        }
        let mut rebuilt = spans[0].text.clone();
        for span in &spans[1..] {
            rebuilt.extend(span.text.chars().skip(2));
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        assert!(split_text("abc", 10, 10, None).is_err());
        assert!(TextChunker::new(5, 7).is_err());
    }

    #[test]
    fn chunker_assigns_ids_and_indices() {
        let chunker = TextChunker::new(4, 1).unwrap().with_separator(None::<String>);
        let chunks = chunker.chunk(&Document::new("paper.pdf", "abcdefghij"));
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].id, "paper.pdf_2");
        assert_eq!(chunks[2].index, 2);
        assert_eq!(chunks[2].document_id, "paper.pdf");
        assert_eq!(chunks[2].offset, 6);
    }

    #[test]
    fn rechunking_is_idempotent() {
        let chunker = TextChunker::new(50, 10).unwrap();
        let doc = Document::new("d", "line one\nline two\n".repeat(20));
        assert_eq!(chunker.chunk(&doc), chunker.chunk(&doc));
    }
}
