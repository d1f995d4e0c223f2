//! Turning uploaded files into [`Document`]s.
//!
//! PDFs go through `pdf-extract` on the blocking pool; plain text and markdown
//! are decoded as UTF-8 (lossily). The document id is the file name.

use std::path::Path;

use docqa_rag::Document;
use tracing::{debug, warn};

use crate::error::DocumentError;

const TEXT_EXTENSIONS: &[&str] = &["txt", "text", "md", "markdown"];

/// The kinds of file the loader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Text,
}

impl DocumentFormat {
    /// Detect the format from the file name, falling back to the `%PDF` magic.
    pub fn detect(name: &str, bytes: &[u8]) -> Option<Self> {
        let extension = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("pdf") => Some(Self::Pdf),
            Some(ext) if TEXT_EXTENSIONS.contains(&ext) => Some(Self::Text),
            _ if bytes.starts_with(b"%PDF") => Some(Self::Pdf),
            _ => None,
        }
    }
}

/// Extract the text of one uploaded file.
///
/// # Errors
///
/// - [`DocumentError::UnsupportedFormat`] if the format is unknown, or is a
///   PDF and the `pdf` feature is off.
/// - [`DocumentError::Pdf`] if the PDF cannot be parsed.
/// - [`DocumentError::ExtractionEmpty`] if no text was found.
pub async fn extract_text(name: &str, bytes: Vec<u8>) -> Result<String, DocumentError> {
    let text = match DocumentFormat::detect(name, &bytes) {
        Some(DocumentFormat::Pdf) => extract_pdf(name, bytes).await?,
        Some(DocumentFormat::Text) => String::from_utf8_lossy(&bytes).into_owned(),
        None => return Err(DocumentError::UnsupportedFormat(name.to_string())),
    };
    if text.trim().is_empty() {
        return Err(DocumentError::ExtractionEmpty(name.to_string()));
    }
    debug!(document = name, chars = text.chars().count(), "extracted text");
    Ok(text)
}

#[cfg(feature = "pdf")]
async fn extract_pdf(name: &str, bytes: Vec<u8>) -> Result<String, DocumentError> {
    let pages = tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text_from_mem_by_pages(&bytes).map_err(|e| e.to_string())
    })
    .await
    .map_err(|e| DocumentError::Pdf { name: name.to_string(), message: e.to_string() })?
    .map_err(|message| DocumentError::Pdf { name: name.to_string(), message })?;

    Ok(join_pages(pages))
}

#[cfg(not(feature = "pdf"))]
async fn extract_pdf(name: &str, _bytes: Vec<u8>) -> Result<String, DocumentError> {
    Err(DocumentError::UnsupportedFormat(format!("{name} (built without PDF support)")))
}

/// Join page texts with newlines; blank pages contribute nothing.
pub fn join_pages<I, S>(pages: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut text = String::new();
    for page in pages {
        let page = page.as_ref();
        if page.trim().is_empty() {
            continue;
        }
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(page);
    }
    text
}

/// Build a [`Document`] from an uploaded file.
///
/// A file that parses but holds no text becomes an empty document: it is
/// still listed and gets a metadata row, it just contributes no chunks.
///
/// # Errors
///
/// Any [`DocumentError`] other than `ExtractionEmpty`.
pub async fn load_document(name: &str, bytes: Vec<u8>) -> Result<Document, DocumentError> {
    match extract_text(name, bytes).await {
        Ok(text) => Ok(Document::new(name, text)),
        Err(DocumentError::ExtractionEmpty(_)) => {
            warn!(document = name, "no extractable text, ingesting as empty document");
            Ok(Document::new(name, String::new()))
        }
        Err(e) => Err(e),
    }
}

/// Read and load a file from disk. The document id is the file name.
///
/// # Errors
///
/// [`DocumentError::Io`] if the file cannot be read, otherwise as
/// [`load_document`].
pub async fn load_path(path: impl AsRef<Path>) -> Result<Document, DocumentError> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    load_document(&name, bytes).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_formats() {
        assert_eq!(DocumentFormat::detect("paper.PDF", b""), Some(DocumentFormat::Pdf));
        assert_eq!(DocumentFormat::detect("notes.md", b""), Some(DocumentFormat::Text));
        assert_eq!(DocumentFormat::detect("upload", b"%PDF-1.7"), Some(DocumentFormat::Pdf));
        assert_eq!(DocumentFormat::detect("image.png", b"\x89PNG"), None);
    }

    #[test]
    fn blank_pages_are_skipped() {
        assert_eq!(join_pages(["one", "  \n", "", "two"]), "one\ntwo");
        assert_eq!(join_pages(Vec::<String>::new()), "");
    }

    #[tokio::test]
    async fn text_files_load_as_is() {
        let doc = load_document("notes.txt", b"Accuracy was 92%.".to_vec()).await.unwrap();
        assert_eq!(doc.id, "notes.txt");
        assert_eq!(doc.text, "Accuracy was 92%.");
    }

    #[tokio::test]
    async fn empty_text_becomes_empty_document() {
        assert!(matches!(
            extract_text("blank.txt", b" \n\t".to_vec()).await,
            Err(DocumentError::ExtractionEmpty(_))
        ));
        let doc = load_document("blank.txt", b" \n\t".to_vec()).await.unwrap();
        assert!(doc.text.is_empty());
    }

    #[tokio::test]
    async fn unsupported_format_is_rejected() {
        let err = load_document("image.png", vec![0x89, b'P', b'N', b'G']).await.unwrap_err();
        assert!(matches!(err, DocumentError::UnsupportedFormat(_)));
    }

    #[cfg(feature = "pdf")]
    #[tokio::test]
    async fn garbage_pdf_is_a_pdf_error() {
        let err = load_document("broken.pdf", b"%PDF-1.4 not really".to_vec()).await.unwrap_err();
        assert!(matches!(err, DocumentError::Pdf { .. }));
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let err = load_path("/definitely/not/here.txt").await.unwrap_err();
        assert!(matches!(err, DocumentError::Io(_)));
    }
}
