//! Decoding and validation of sanitized model output.
//!
//! This is the only path from model text to [`TaskDraft`]. It checks:
//! - The text is syntactically valid JSON.
//! - The top-level shape matches the mode (object vs array).
//! - Decompositions contain between 1 and [`MAX_DECOMPOSE_ITEMS`] items.
//! - Every task supplies a non-empty `title`, a `priority` of exactly
//!   `low`/`medium`/`high`, and a `due_date` that is an RFC 3339 timestamp
//!   or null. `description` defaults to the empty string.
//!
//! Unknown extra fields are dropped. Nothing is coerced: a value of the
//! wrong shape is an error naming the field.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::draft::{Priority, TaskDraft};
use crate::prompt::MAX_DECOMPOSE_ITEMS;

/// Ways model output can fail to be a valid task or task list.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("AI returned invalid JSON: {source}")]
    InvalidJson {
        /// The sanitized text that failed to parse.
        raw: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("AI did not return an object")]
    NotAnObject { raw: Value },

    #[error("AI did not return an array")]
    NotAnArray { raw: Value },

    #[error("AI returned {count} tasks (expected 1 to {MAX_DECOMPOSE_ITEMS})")]
    ItemCount { count: usize, raw: Value },

    #[error("task {index} is not an object")]
    ItemNotAnObject { index: usize, raw: Value },

    #[error("invalid {field}{}: {reason}", at_index(.index))]
    InvalidField {
        /// Position in the array for decompositions, `None` for single tasks.
        index: Option<usize>,
        field: &'static str,
        reason: String,
        raw: Value,
    },
}

impl OutputError {
    /// The offending payload, for diagnostics.
    ///
    /// Undecodable text is returned as a JSON string; everything else is the
    /// decoded value as the model produced it.
    pub fn raw(&self) -> Value {
        match self {
            Self::InvalidJson { raw, .. } => Value::String(raw.clone()),
            Self::NotAnObject { raw }
            | Self::NotAnArray { raw }
            | Self::ItemCount { raw, .. }
            | Self::ItemNotAnObject { raw, .. }
            | Self::InvalidField { raw, .. } => raw.clone(),
        }
    }
}

fn at_index(index: &Option<usize>) -> String {
    match index {
        Some(i) => format!(" in task {i}"),
        None => String::new(),
    }
}

/// A field-level problem before the payload is attached.
struct FieldViolation {
    field: &'static str,
    reason: String,
}

impl FieldViolation {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }

    fn into_error(self, index: Option<usize>, raw: &Value) -> OutputError {
        OutputError::InvalidField {
            index,
            field: self.field,
            reason: self.reason,
            raw: raw.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Decode a single task object.
pub fn decode_single(text: &str) -> Result<TaskDraft, OutputError> {
    let value = parse(text)?;
    match &value {
        Value::Object(map) => draft_from_object(map).map_err(|v| v.into_error(None, &value)),
        _ => Err(OutputError::NotAnObject { raw: value }),
    }
}

/// Decode an array of 1 to [`MAX_DECOMPOSE_ITEMS`] task objects.
pub fn decode_many(text: &str) -> Result<Vec<TaskDraft>, OutputError> {
    let value = parse(text)?;
    let Value::Array(items) = &value else {
        return Err(OutputError::NotAnArray { raw: value });
    };

    if items.is_empty() || items.len() > MAX_DECOMPOSE_ITEMS {
        return Err(OutputError::ItemCount {
            count: items.len(),
            raw: value,
        });
    }

    let mut drafts = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let Value::Object(map) = item else {
            return Err(OutputError::ItemNotAnObject {
                index,
                raw: value.clone(),
            });
        };
        let draft = draft_from_object(map).map_err(|v| v.into_error(Some(index), &value))?;
        drafts.push(draft);
    }
    Ok(drafts)
}

// ---------------------------------------------------------------------------
// Field extraction
// ---------------------------------------------------------------------------

fn parse(text: &str) -> Result<Value, OutputError> {
    serde_json::from_str(text).map_err(|source| OutputError::InvalidJson {
        raw: text.to_owned(),
        source,
    })
}

fn draft_from_object(map: &Map<String, Value>) -> Result<TaskDraft, FieldViolation> {
    let title = match map.get("title") {
        Some(Value::String(s)) => s.as_str(),
        Some(other) => return Err(wrong_type("title", "a string", other)),
        None => return Err(FieldViolation::new("title", "missing")),
    };

    let description = match map.get("description") {
        None | Some(Value::Null) => "",
        Some(Value::String(s)) => s.as_str(),
        Some(other) => return Err(wrong_type("description", "a string or null", other)),
    };

    let priority = match map.get("priority") {
        Some(Value::String(s)) => s
            .parse::<Priority>()
            .map_err(|e| FieldViolation::new("priority", e.to_string()))?,
        Some(other) => return Err(wrong_type("priority", "a string", other)),
        None => return Err(FieldViolation::new("priority", "missing")),
    };

    let due_date = match map.get("due_date") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(parse_due_date(s)?),
        Some(other) => return Err(wrong_type("due_date", "a timestamp string or null", other)),
    };

    TaskDraft::new(title, description, priority, due_date)
        .map_err(|e| FieldViolation::new(e.field(), e.to_string()))
}

/// Parse an absolute timestamp. Offsets other than UTC are converted.
fn parse_due_date(s: &str) -> Result<DateTime<Utc>, FieldViolation> {
    DateTime::parse_from_rfc3339(s.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            FieldViolation::new(
                "due_date",
                format!("expected an RFC 3339 timestamp, got {s:?} ({e})"),
            )
        })
}

fn wrong_type(field: &'static str, expected: &str, got: &Value) -> FieldViolation {
    FieldViolation::new(field, format!("expected {expected}, got {}", json_type(got)))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
