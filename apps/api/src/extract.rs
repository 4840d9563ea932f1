//! Structured-result extraction from raw oracle text.
//!
//! The oracle is asked for bare JSON but routinely wraps it in prose or code
//! fences. Extraction takes the span from the first `{` to the last `}` (or
//! `[`/`]` for lists) and parses that. Nothing here returns an error: a
//! response that cannot be parsed becomes `Degraded`, carrying the original
//! text and a reason, and flows downstream as data.
//!
//! Known limitation: a response that quotes example JSON in its prose
//! *before* the real object produces a span starting at the example, which
//! then fails to parse (or parses as the wrong thing). This is accepted.
//! Guessing which object the model "meant" is not attempted.

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Outcome of turning oracle text into a record of type `T`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StructuredResult<T = Map<String, Value>> {
    Success(T),
    Degraded { raw_text: String, reason: String },
}

impl<T> StructuredResult<T> {
    pub fn degraded(raw_text: impl Into<String>, reason: impl Into<String>) -> Self {
        StructuredResult::Degraded {
            raw_text: raw_text.into(),
            reason: reason.into(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, StructuredResult::Degraded { .. })
    }

    pub fn as_record(&self) -> Option<&T> {
        match self {
            StructuredResult::Success(record) => Some(record),
            StructuredResult::Degraded { .. } => None,
        }
    }

    pub fn degraded_reason(&self) -> Option<&str> {
        match self {
            StructuredResult::Success(_) => None,
            StructuredResult::Degraded { reason, .. } => Some(reason),
        }
    }
}

impl<T: Clone + Default> StructuredResult<T> {
    /// The parsed record, or the all-defaults record when degraded. This is
    /// what downstream prompt builders consume.
    pub fn record_or_default(&self) -> T {
        self.as_record().cloned().unwrap_or_default()
    }
}

/// Extracts the outermost `{...}` span of `text` as a JSON object.
pub fn extract(text: &str, fallback_reason: &str) -> StructuredResult {
    match outer_span(text, '{', '}').map(serde_json::from_str::<Map<String, Value>>) {
        Some(Ok(object)) => StructuredResult::Success(object),
        Some(Err(e)) => StructuredResult::degraded(text, format!("{fallback_reason}: {e}")),
        None => StructuredResult::degraded(text, format!("{fallback_reason}: no JSON object found")),
    }
}

/// Extracts the outermost `[...]` span of `text` as a JSON array.
pub fn extract_list(text: &str, fallback_reason: &str) -> StructuredResult<Vec<Value>> {
    match outer_span(text, '[', ']').map(serde_json::from_str::<Vec<Value>>) {
        Some(Ok(items)) => StructuredResult::Success(items),
        Some(Err(e)) => StructuredResult::degraded(text, format!("{fallback_reason}: {e}")),
        None => StructuredResult::degraded(text, format!("{fallback_reason}: no JSON array found")),
    }
}

/// Extracts an object and maps it onto `T`. A shape mismatch is reported as
/// `Degraded` with the original text preserved.
pub fn extract_record<T: DeserializeOwned>(text: &str, fallback_reason: &str) -> StructuredResult<T> {
    match extract(text, fallback_reason) {
        StructuredResult::Success(object) => {
            match serde_json::from_value::<T>(Value::Object(object)) {
                Ok(record) => StructuredResult::Success(record),
                Err(e) => StructuredResult::degraded(text, format!("{fallback_reason}: {e}")),
            }
        }
        StructuredResult::Degraded { raw_text, reason } => {
            StructuredResult::Degraded { raw_text, reason }
        }
    }
}

fn outer_span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

// ────────────────────────────────────────────────────────────────────────────
// Lenient field decoders shared by the stage records
// ────────────────────────────────────────────────────────────────────────────

/// Accepts a list of strings, a single string, `null`, or a list of mixed
/// scalars (stringified). Objects inside the list keep their JSON text.
pub fn lenient_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => Vec::new(),
        Value::String(s) if s.trim().is_empty() => Vec::new(),
        Value::String(s) => vec![s],
        Value::Array(items) => items.into_iter().filter_map(scalar_text).collect(),
        other => scalar_text(other).into_iter().collect(),
    })
}

/// Accepts a string, a number or `null`.
pub fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(scalar_text(value).unwrap_or_default())
}

/// Accepts a number or a numeric string (`"85"`, `"85%"`); anything else is 0.
pub fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(number_of(&value).unwrap_or(0.0))
}

pub fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok(),
        _ => None,
    }
}

fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}
