//! Checked parsing of LLM JSON output.
//!
//! Model responses are parsed into a generic JSON value first, then
//! validated against an explicit required-field checklist before anything is
//! cast into a typed struct. Any shape mismatch is a typed [`ParseError`];
//! stages decide whether that degrades gracefully or fails the run.

use serde_json::{Map, Value};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Response is not valid JSON: {0}")]
    NotJson(String),

    #[error("Response is not a JSON object")]
    NotAnObject,

    #[error("Response is missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Field '{field}' has the wrong type (expected {expected})")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },
}

/// Strip a markdown code fence, if present, and surrounding whitespace.
///
/// Models routinely wrap JSON in ```` ```json ... ``` ```` even when told
/// not to; the payload inside the fence is what we want.
pub fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(inner) = inner.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the optional language tag on the opening fence line.
    match inner.split_once('\n') {
        Some((first_line, rest)) if first_line.trim().chars().all(char::is_alphanumeric) => {
            rest.trim()
        }
        _ => inner.trim(),
    }
}

/// Parse model output into a JSON object, tolerating code fences.
pub fn parse_object(content: &str) -> Result<Map<String, Value>, ParseError> {
    let value: Value = serde_json::from_str(strip_code_fences(content))
        .map_err(|e| ParseError::NotJson(e.to_string()))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ParseError::NotAnObject),
    }
}

/// Required string field.
pub fn require_str(map: &Map<String, Value>, field: &'static str) -> Result<String, ParseError> {
    match map.get(field) {
        None => Err(ParseError::MissingField(field)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(ParseError::WrongType {
            field,
            expected: "string",
        }),
    }
}

/// Required boolean field.
pub fn require_bool(map: &Map<String, Value>, field: &'static str) -> Result<bool, ParseError> {
    match map.get(field) {
        None => Err(ParseError::MissingField(field)),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(ParseError::WrongType {
            field,
            expected: "boolean",
        }),
    }
}

/// Optional string field; present-but-wrong-type is still an error.
pub fn optional_str(
    map: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, ParseError> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ParseError::WrongType {
            field,
            expected: "string",
        }),
    }
}

/// Required field that is either a string or an array of strings,
/// normalized to a vector.
pub fn require_str_list(
    map: &Map<String, Value>,
    field: &'static str,
) -> Result<Vec<String>, ParseError> {
    match map.get(field) {
        None => Err(ParseError::MissingField(field)),
        Some(Value::String(s)) => Ok(vec![s.clone()]),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                _ => Err(ParseError::WrongType {
                    field,
                    expected: "array of strings",
                }),
            })
            .collect(),
        Some(_) => Err(ParseError::WrongType {
            field,
            expected: "string or array of strings",
        }),
    }
}
