//! Extraction and validation of the analysis JSON embedded in model output.
//!
//! Models are asked for a bare JSON object but frequently wrap it in prose
//! or a fenced code block.  [`extract_json`] first tries the whole response
//! as JSON (what a provider's structured-output mode returns) and only then
//! falls back to a greedy bracket-to-bracket match, logging the fallback.
//!
//! [`parse_analysis`] checks that the three required top-level fields are
//! present and well-shaped.  It deliberately does not check that every word
//! index is covered; see [`reconcile`](crate::analysis::reconcile).

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::analysis::types::AnalysisPayload;

/// Per-index source-word mapping (object).
pub const SOURCE_WORDS_FIELD: &str = "indexed_spanish_words";
/// Tokenized translation (array).
pub const TARGET_TOKENS_FIELD: &str = "indexed_english_translation_words";
/// Source index → target token indices (object).
pub const ALIGNMENT_FIELD: &str = "alignment_spanish_to_english";

// ---------------------------------------------------------------------------
// AnalysisError
// ---------------------------------------------------------------------------

/// Errors produced while reading an analysis response.
///
/// Both variants keep the untouched model output for diagnostics.
#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
    /// No JSON-shaped region was found, or it did not parse.
    #[error("no valid JSON in analysis response: {reason}")]
    Parse { reason: String, raw: String },

    /// JSON parsed but required fields are missing or mistyped.
    #[error("analysis response failed validation: {}", fields.join("; "))]
    Schema { fields: Vec<String>, raw: String },
}

impl AnalysisError {
    fn parse(reason: impl Into<String>, raw: &str) -> Self {
        AnalysisError::Parse {
            reason: reason.into(),
            raw: raw.to_string(),
        }
    }

    /// The model output that failed to parse or validate.
    pub fn raw(&self) -> &str {
        match self {
            AnalysisError::Parse { raw, .. } | AnalysisError::Schema { raw, .. } => raw,
        }
    }
}

// ---------------------------------------------------------------------------
// JSON extraction
// ---------------------------------------------------------------------------

/// Locate and parse the JSON object or array in `raw`.
pub fn extract_json(raw: &str) -> Result<Value, AnalysisError> {
    if let Ok(value) = serde_json::from_str::<Value>(raw.trim()) {
        if value.is_object() || value.is_array() {
            return Ok(value);
        }
    }

    let region = bracketed_region(raw)
        .ok_or_else(|| AnalysisError::parse("no JSON object or array found", raw))?;

    log::warn!(
        "analysis: response was not bare JSON, using bracket extraction ({} of {} bytes)",
        region.len(),
        raw.len()
    );

    serde_json::from_str(region).map_err(|e| AnalysisError::parse(e.to_string(), raw))
}

/// Greedy match from the first `{` or `[` to the last closer of the same kind.
fn bracketed_region(raw: &str) -> Option<&str> {
    let start = raw.find(['{', '['])?;
    let closer = if raw[start..].starts_with('{') { '}' } else { ']' };
    let end = raw.rfind(closer)?;
    (end > start).then(|| &raw[start..=end])
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Parse and validate an analysis response.
///
/// # Errors
///
/// * [`AnalysisError::Parse`]: no JSON region, or malformed JSON.
/// * [`AnalysisError::Schema`]: one entry per missing or malformed field.
pub fn parse_analysis(raw: &str) -> Result<AnalysisPayload, AnalysisError> {
    let value = extract_json(raw)?;

    let Some(object) = value.as_object() else {
        return Err(AnalysisError::Schema {
            fields: vec![format!("top-level value must be an object, got {}", kind(&value))],
            raw: raw.to_string(),
        });
    };

    let mut problems = Vec::new();

    let source_words = typed_field(
        object.get(SOURCE_WORDS_FIELD),
        SOURCE_WORDS_FIELD,
        Shape::Object,
        &mut problems,
    );
    let target_tokens = typed_field(
        object.get(TARGET_TOKENS_FIELD),
        TARGET_TOKENS_FIELD,
        Shape::Array,
        &mut problems,
    );
    let alignment = typed_field(
        object.get(ALIGNMENT_FIELD),
        ALIGNMENT_FIELD,
        Shape::Object,
        &mut problems,
    );

    match (source_words, target_tokens, alignment) {
        (Some(indexed_source_words), Some(target_tokens), Some(alignment_source_to_target))
            if problems.is_empty() =>
        {
            Ok(AnalysisPayload {
                indexed_source_words,
                target_tokens,
                alignment_source_to_target,
            })
        }
        _ => Err(AnalysisError::Schema {
            fields: problems,
            raw: raw.to_string(),
        }),
    }
}

#[derive(Clone, Copy)]
enum Shape {
    Object,
    Array,
}

/// Check a field's presence and JSON kind, then deserialize it.  Problems
/// are appended to `problems` and `None` is returned.
fn typed_field<T: DeserializeOwned>(
    value: Option<&Value>,
    name: &str,
    shape: Shape,
    problems: &mut Vec<String>,
) -> Option<T> {
    let Some(value) = value else {
        problems.push(format!("{name}: missing"));
        return None;
    };

    let shape_ok = match shape {
        Shape::Object => value.is_object(),
        Shape::Array => value.is_array(),
    };
    if !shape_ok {
        let expected = match shape {
            Shape::Object => "object",
            Shape::Array => "array",
        };
        problems.push(format!("{name}: expected {expected}, got {}", kind(value)));
        return None;
    }

    match serde_json::from_value(value.clone()) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            problems.push(format!("{name}: {e}"));
            None
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
