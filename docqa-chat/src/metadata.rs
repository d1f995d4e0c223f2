//! Structured metadata extraction from research papers.
//!
//! One model call per document asks for a strict JSON object with twelve
//! fixed keys. The response is parsed with validation and fails closed: any
//! shape problem yields [`PaperMetadata::error`], never a partial record.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use docqa_model::{Llm, LlmRequest, generate_within};
use docqa_rag::{DEFAULT_MAX_INPUT_CHARS, Document, truncate_chars};
use futures::StreamExt;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Value for a field the paper does not state.
pub const NOT_SPECIFIED: &str = "Not specified in the paper";

/// Value of every field when extraction failed.
pub const ERROR_SENTINEL: &str = "Error";

/// The twelve metadata keys, in display order.
pub const FIELD_NAMES: [&str; 12] = [
    "Year",
    "Authors",
    "Title",
    "Keywords",
    "Methodology",
    "Key_Findings",
    "Preprocessing",
    "Evaluation_Metrics",
    "Results",
    "Advantages",
    "Other_Details",
    "Limitations",
];

/// Bibliographic and methodological summary of one paper.
///
/// Every field is always present. A field the paper does not state holds
/// [`NOT_SPECIFIED`]; after a failed extraction all fields hold
/// [`ERROR_SENTINEL`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperMetadata {
    #[serde(rename = "Year")]
    pub year: String,
    #[serde(rename = "Authors")]
    pub authors: String,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Keywords")]
    pub keywords: String,
    #[serde(rename = "Methodology")]
    pub methodology: String,
    #[serde(rename = "Key_Findings")]
    pub key_findings: String,
    #[serde(rename = "Preprocessing")]
    pub preprocessing: String,
    #[serde(rename = "Evaluation_Metrics")]
    pub evaluation_metrics: String,
    #[serde(rename = "Results")]
    pub results: String,
    #[serde(rename = "Advantages")]
    pub advantages: String,
    #[serde(rename = "Other_Details")]
    pub other_details: String,
    #[serde(rename = "Limitations")]
    pub limitations: String,
}

impl PaperMetadata {
    /// Metadata with every field set to [`ERROR_SENTINEL`].
    pub fn error() -> Self {
        Self::filled(ERROR_SENTINEL)
    }

    /// Metadata with every field set to [`NOT_SPECIFIED`].
    pub fn not_specified() -> Self {
        Self::filled(NOT_SPECIFIED)
    }

    fn filled(value: &str) -> Self {
        match Self::try_from_fn(|_| Ok::<_, std::convert::Infallible>(value.to_string())) {
            Ok(metadata) => metadata,
            Err(never) => match never {},
        }
    }

    /// Whether this record is the all-error sentinel.
    pub fn is_error(&self) -> bool {
        self.fields().iter().all(|(_, value)| *value == ERROR_SENTINEL)
    }

    /// `(key, value)` pairs in [`FIELD_NAMES`] order.
    pub fn fields(&self) -> [(&'static str, &str); 12] {
        [
            ("Year", self.year.as_str()),
            ("Authors", self.authors.as_str()),
            ("Title", self.title.as_str()),
            ("Keywords", self.keywords.as_str()),
            ("Methodology", self.methodology.as_str()),
            ("Key_Findings", self.key_findings.as_str()),
            ("Preprocessing", self.preprocessing.as_str()),
            ("Evaluation_Metrics", self.evaluation_metrics.as_str()),
            ("Results", self.results.as_str()),
            ("Advantages", self.advantages.as_str()),
            ("Other_Details", self.other_details.as_str()),
            ("Limitations", self.limitations.as_str()),
        ]
    }

    fn try_from_fn<E>(mut value: impl FnMut(&'static str) -> Result<String, E>) -> Result<Self, E> {
        Ok(Self {
            year: value("Year")?,
            authors: value("Authors")?,
            title: value("Title")?,
            keywords: value("Keywords")?,
            methodology: value("Methodology")?,
            key_findings: value("Key_Findings")?,
            preprocessing: value("Preprocessing")?,
            evaluation_metrics: value("Evaluation_Metrics")?,
            results: value("Results")?,
            advantages: value("Advantages")?,
            other_details: value("Other_Details")?,
            limitations: value("Limitations")?,
        })
    }
}

/// Why a model response was rejected.
#[derive(Debug, Error, PartialEq)]
pub enum MetadataParseError {
    #[error("no JSON object in response")]
    NoObject,
    #[error("invalid JSON: {0}")]
    Json(String),
    #[error("missing key '{0}'")]
    MissingKey(&'static str),
    #[error("key '{key}' has unsupported {kind} value")]
    UnsupportedValue { key: &'static str, kind: &'static str },
}

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)```")
        .expect("unreachable error: invalid code fence pattern")
});

/// Return the content of the first fenced code block, or `text` itself.
pub fn strip_code_fences(text: &str) -> &str {
    CODE_FENCE
        .captures(text)
        .and_then(|c| c.get(1))
        .map_or(text, |m| m.as_str())
        .trim()
}

/// Parse a model response into [`PaperMetadata`].
///
/// Accepts an object with all twelve keys, optionally wrapped in a code fence
/// or surrounded by prose. Strings are kept (empty becomes [`NOT_SPECIFIED`]),
/// `null` becomes [`NOT_SPECIFIED`], numbers become their decimal text, and
/// arrays of strings are joined with `", "`. Extra keys are ignored.
///
/// # Errors
///
/// Returns [`MetadataParseError`] for malformed JSON, a missing key, or a value
/// of any other shape.
pub fn parse_metadata(response: &str) -> Result<PaperMetadata, MetadataParseError> {
    let body = strip_code_fences(response);
    let start = body.find('{').ok_or(MetadataParseError::NoObject)?;
    let end = body.rfind('}').filter(|&end| end > start).ok_or(MetadataParseError::NoObject)?;

    let value: Value = serde_json::from_str(&body[start..=end])
        .map_err(|e| MetadataParseError::Json(e.to_string()))?;
    let object = value.as_object().ok_or(MetadataParseError::NoObject)?;

    PaperMetadata::try_from_fn(|key| {
        let field = object.get(key).ok_or(MetadataParseError::MissingKey(key))?;
        normalize_field(key, field)
    })
}

fn normalize_field(key: &'static str, value: &Value) -> Result<String, MetadataParseError> {
    let text = match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => {
            let parts = items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.trim()),
                    _ => Err(MetadataParseError::UnsupportedValue { key, kind: "array element" }),
                })
                .collect::<Result<Vec<_>, _>>()?;
            parts.into_iter().filter(|s| !s.is_empty()).collect::<Vec<_>>().join(", ")
        }
        Value::Bool(_) => return Err(MetadataParseError::UnsupportedValue { key, kind: "boolean" }),
        Value::Object(_) => {
            return Err(MetadataParseError::UnsupportedValue { key, kind: "object" });
        }
    };
    Ok(if text.is_empty() { NOT_SPECIFIED.to_string() } else { text })
}

/// The instruction sent to the model for one document.
pub fn metadata_prompt(document_name: &str, document_text: &str) -> String {
    let keys = FIELD_NAMES.iter().map(|k| format!("\"{k}\"")).collect::<Vec<_>>().join(", ");
    format!(
        "You extract structured metadata from research papers.\n\
         Read the paper below and return a single JSON object with exactly these keys: {keys}.\n\
         Every value must be a string. \
         Use \"{NOT_SPECIFIED}\" for anything the paper does not state.\n\
         Return only the JSON object, with no markdown formatting and no other text.\n\n\
         Paper name: {document_name}\n\n\
         Paper text:\n{document_text}\n"
    )
}

/// Settings for [`MetadataExtractor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Sampling temperature for the extraction call.
    pub temperature: f32,
    /// Document text beyond this many characters is not sent.
    pub max_input_chars: usize,
    /// Deadline for one extraction call.
    pub timeout: Duration,
    /// Documents processed concurrently by [`MetadataExtractor::extract_all`].
    pub max_concurrency: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            timeout: Duration::from_secs(60),
            max_concurrency: 4,
        }
    }
}

/// Extracts [`PaperMetadata`] from document text with a language model.
#[derive(Clone)]
pub struct MetadataExtractor {
    llm: Arc<dyn Llm>,
    config: ExtractorConfig,
}

impl MetadataExtractor {
    /// Create an extractor with the default settings.
    pub fn new(llm: Arc<dyn Llm>) -> Self {
        Self::with_config(llm, ExtractorConfig::default())
    }

    /// Create an extractor with explicit settings.
    pub fn with_config(llm: Arc<dyn Llm>, config: ExtractorConfig) -> Self {
        Self { llm, config }
    }

    /// The active settings.
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Extract metadata for one document. Never fails: any problem yields
    /// [`PaperMetadata::error`].
    pub async fn extract(&self, document_text: &str, document_name: &str) -> PaperMetadata {
        let text = truncate_chars(document_text, self.config.max_input_chars.max(1));
        let request = LlmRequest::new(metadata_prompt(document_name, text))
            .with_temperature(self.config.temperature);

        debug!(
            document = document_name,
            model = self.llm.name(),
            chars = text.chars().count(),
            "extracting metadata"
        );

        let generated = generate_within(self.llm.as_ref(), &request, self.config.timeout).await;
        let response = match generated {
            Ok(response) => response,
            Err(e) => {
                warn!(document = document_name, error = %e, "metadata extraction failed");
                return PaperMetadata::error();
            }
        };

        match parse_metadata(&response) {
            Ok(metadata) => {
                info!(document = document_name, "extracted metadata");
                metadata
            }
            Err(e) => {
                warn!(document = document_name, error = %e, "metadata response rejected");
                PaperMetadata::error()
            }
        }
    }

    /// Extract metadata for every document, in input order.
    pub async fn extract_all(&self, documents: &[Document]) -> Vec<PaperMetadata> {
        futures::stream::iter(documents)
            .map(|doc| self.extract(&doc.text, &doc.id))
            .buffered(self.config.max_concurrency.max(1))
            .collect()
            .await
    }
}

impl std::fmt::Debug for MetadataExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataExtractor")
            .field("llm", &self.llm.name())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use docqa_model::{MockLlm, ModelError};

    use super::*;

    const VALID: &str = r#"{
        "Year": "2021", "Authors": "A. Smith, B. Jones", "Title": "Deep Things",
        "Keywords": "vision", "Methodology": "CNN", "Key_Findings": "works",
        "Preprocessing": "", "Evaluation_Metrics": "accuracy", "Results": "92%",
        "Advantages": "fast", "Other_Details": "none", "Limitations": "small data"
    }"#;

    #[test]
    fn parses_plain_object() {
        let metadata = parse_metadata(VALID).unwrap();
        assert_eq!(metadata.year, "2021");
        assert_eq!(metadata.results, "92%");
        assert_eq!(metadata.preprocessing, NOT_SPECIFIED);
        assert!(!metadata.is_error());
    }

    #[test]
    fn strips_fences_and_prose() {
        let fenced = format!("Here you go:\n```json\n{VALID}\n```\nHope this helps.");
        assert_eq!(parse_metadata(&fenced).unwrap().title, "Deep Things");

        let prose = format!("Sure! {VALID} Let me know.");
        assert_eq!(parse_metadata(&prose).unwrap().title, "Deep Things");
    }

    #[test]
    fn normalizes_value_shapes() {
        let response = VALID
            .replace(r#""Year": "2021""#, r#""Year": 2021"#)
            .replace(r#""Authors": "A. Smith, B. Jones""#, r#""Authors": ["A. Smith", "B. Jones"]"#)
            .replace(r#""Keywords": "vision""#, r#""Keywords": null"#);
        let metadata = parse_metadata(&response).unwrap();
        assert_eq!(metadata.year, "2021");
        assert_eq!(metadata.authors, "A. Smith, B. Jones");
        assert_eq!(metadata.keywords, NOT_SPECIFIED);
    }

    #[test]
    fn extra_keys_are_ignored() {
        let response = VALID.replacen('{', r#"{"Venue": "ICML","#, 1);
        assert!(parse_metadata(&response).is_ok());
    }

    #[test]
    fn rejects_missing_keys_and_bad_shapes() {
        let missing = VALID.replace(r#""Limitations": "small data""#, r#""Other": "x""#);
        assert_eq!(parse_metadata(&missing), Err(MetadataParseError::MissingKey("Limitations")));

        let nested = VALID.replace(r#""Results": "92%""#, r#""Results": {"acc": 0.92}"#);
        assert!(matches!(
            parse_metadata(&nested),
            Err(MetadataParseError::UnsupportedValue { key: "Results", .. })
        ));

        assert_eq!(parse_metadata("no json here"), Err(MetadataParseError::NoObject));
        assert!(matches!(parse_metadata("{not: json}"), Err(MetadataParseError::Json(_))));
    }

    #[test]
    fn error_sentinel_covers_every_field() {
        let metadata = PaperMetadata::error();
        assert!(metadata.is_error());
        assert!(metadata.fields().iter().all(|(_, v)| *v == ERROR_SENTINEL));
        let keys: Vec<&str> = metadata.fields().iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, FIELD_NAMES);
    }

    #[test]
    fn serializes_with_original_key_names() {
        let json = serde_json::to_value(PaperMetadata::not_specified()).unwrap();
        for key in FIELD_NAMES {
            assert_eq!(json[key], NOT_SPECIFIED);
        }
    }

    #[tokio::test]
    async fn extractor_uses_low_temperature_and_truncates() {
        let llm = Arc::new(MockLlm::new(VALID));
        let config = ExtractorConfig { max_input_chars: 10, ..ExtractorConfig::default() };
        let extractor = MetadataExtractor::with_config(llm.clone(), config);

        let metadata = extractor.extract(&"x".repeat(500), "paper.pdf").await;
        assert_eq!(metadata.title, "Deep Things");

        let request = &llm.requests()[0];
        assert_eq!(request.temperature, Some(0.2));
        assert!(request.prompt.contains(&format!("\n{}\n", "x".repeat(10))));
        assert!(!request.prompt.contains(&"x".repeat(11)));
    }

    #[tokio::test]
    async fn malformed_response_yields_error_sentinel() {
        let extractor = MetadataExtractor::new(Arc::new(MockLlm::new("I could not find it.")));
        assert!(extractor.extract("text", "paper.pdf").await.is_error());
    }

    #[tokio::test]
    async fn model_failure_yields_error_sentinel() {
        let extractor = MetadataExtractor::new(Arc::new(MockLlm::failing()));
        assert!(extractor.extract("text", "paper.pdf").await.is_error());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_yields_error_sentinel() {
        let llm = MockLlm::new(VALID).with_delay(Duration::from_secs(120));
        let extractor = MetadataExtractor::new(Arc::new(llm));
        assert!(extractor.extract("text", "paper.pdf").await.is_error());
    }

    #[tokio::test]
    async fn extract_all_keeps_order_and_isolates_failures() {
        let llm = MockLlm::from_fn(|request| {
            if request.prompt.contains("Paper name: bad.pdf") {
                Err(ModelError::unavailable("mock", "boom"))
            } else if request.prompt.contains("Paper name: b.pdf") {
                Ok(VALID.replace("Deep Things", "Second"))
            } else {
                Ok(VALID.to_string())
            }
        });
        let extractor = MetadataExtractor::new(Arc::new(llm));
        let docs = vec![
            Document::new("a.pdf", "first"),
            Document::new("bad.pdf", "second"),
            Document::new("b.pdf", "third"),
        ];

        let all = extractor.extract_all(&docs).await;
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].title, "Deep Things");
        assert!(all[1].is_error());
        assert_eq!(all[2].title, "Second");
    }

    mod prop_parse_metadata {
        use proptest::prelude::*;
        use serde_json::{Map, Value};

        use crate::metadata::{FIELD_NAMES, NOT_SPECIFIED, parse_metadata};

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(128))]

            #[test]
            fn any_response_is_rejected_or_fully_populated(response in any::<String>()) {
                if let Ok(metadata) = parse_metadata(&response) {
                    prop_assert!(metadata.fields().iter().all(|(_, value)| !value.is_empty()));
                }
            }

            #[test]
            fn string_objects_always_parse(
                values in proptest::collection::vec("[^`]{0,40}", 12),
                fenced in any::<bool>(),
            ) {
                let object: Map<String, Value> = FIELD_NAMES
                    .iter()
                    .zip(&values)
                    .map(|(key, value)| (key.to_string(), Value::String(value.clone())))
                    .collect();
                let json = Value::Object(object).to_string();
                let response =
                    if fenced { format!("Here you go:\n```json\n{json}\n```") } else { json };

                let metadata = parse_metadata(&response).unwrap();
                for ((key, field), value) in metadata.fields().iter().zip(&values) {
                    let expected =
                        if value.trim().is_empty() { NOT_SPECIFIED } else { value.trim() };
                    prop_assert_eq!(*field, expected, "{}", key);
                }
            }
        }
    }
}
