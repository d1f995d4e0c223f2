//! Terminal output for metadata tables and conversation history.

use std::fmt::Write as _;

use anyhow::Result;
use docqa_chat::{ConversationTurn, FIELD_NAMES, PaperMetadata};
use serde_json::{Map, Value};

/// Key/value listing, one block per document, in upload order.
pub fn metadata_listing(documents: &[String], rows: &[PaperMetadata]) -> String {
    let width = FIELD_NAMES.iter().map(|k| k.len()).max().unwrap_or(0) + 1;
    let mut out = String::new();
    for (name, row) in documents.iter().zip(rows) {
        let _ = writeln!(out, "== {name} ==");
        for (key, value) in row.fields() {
            let _ = writeln!(out, "{:<width$} {value}", format!("{key}:"));
        }
        out.push('\n');
    }
    out
}

/// JSON array, one object per document with a leading `Document` key.
///
/// # Errors
///
/// Fails only if serialization fails.
pub fn metadata_json(documents: &[String], rows: &[PaperMetadata]) -> Result<String> {
    let mut records = Vec::with_capacity(rows.len());
    for (name, row) in documents.iter().zip(rows) {
        let mut record = Map::new();
        record.insert("Document".to_string(), Value::String(name.clone()));
        if let Value::Object(fields) = serde_json::to_value(row)? {
            record.extend(fields);
        }
        records.push(Value::Object(record));
    }
    Ok(serde_json::to_string_pretty(&records)?)
}

pub fn history_listing(turns: &[ConversationTurn]) -> String {
    if turns.is_empty() {
        return "(no questions asked yet)\n".to_string();
    }
    let mut out = String::new();
    for (i, turn) in turns.iter().enumerate() {
        let _ = writeln!(out, "[{}] You: {}\n    Assistant: {}", i + 1, turn.question, turn.answer);
    }
    out
}
