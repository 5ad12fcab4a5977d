//! Tool-call argument normalization.
//!
//! Models are not consistent about argument shape: the same tool call can
//! arrive as a JSON object or as a JSON-encoded string of that object, and
//! an individual field can be plain text or a structured value. Everything
//! downstream of this module only ever sees text.

use crate::error::MemoryError;
use serde_json::{Map, Value};

/// Normalized view over one tool call's arguments.
#[derive(Debug, Clone)]
pub struct ToolArguments(Map<String, Value>);

impl ToolArguments {
    /// Accept a JSON object, or JSON text that decodes to one. Anything else
    /// is a [`MemoryError::MalformedArguments`] — never coerced to empty.
    pub fn coerce(raw: &Value) -> anyhow::Result<Self> {
        match raw {
            Value::Object(map) => Ok(Self(map.clone())),
            Value::String(text) => match serde_json::from_str::<Value>(text) {
                Ok(Value::Object(map)) => Ok(Self(map)),
                Ok(other) => Err(MemoryError::MalformedArguments(format!(
                    "argument text decodes to {} instead of an object",
                    value_kind(&other)
                ))
                .into()),
                Err(e) => Err(MemoryError::MalformedArguments(format!(
                    "argument text is not valid JSON: {e}"
                ))
                .into()),
            },
            other => Err(MemoryError::MalformedArguments(format!(
                "arguments are {} instead of an object",
                value_kind(other)
            ))
            .into()),
        }
    }

    /// Field as text: strings verbatim, structured values as canonical JSON.
    pub fn field_text(&self, key: &str) -> Option<String> {
        self.0.get(key).map(value_text)
    }

    /// Like [`Self::field_text`] but a missing field is a malformed-arguments
    /// error rather than a silent default.
    pub fn require_text(&self, key: &str) -> anyhow::Result<String> {
        match self.field_text(key) {
            Some(text) => Ok(text),
            None => Err(MemoryError::MalformedArguments(format!(
                "missing required field `{key}`"
            ))
            .into()),
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
