//! Interpreting the query endpoint's reply.
//!
//! The service answers either `{"result": "..."}` or `[{"output": "..."}, ...]`.
//! Missing or empty answers become [`NO_RESULTS`]; an empty body or one that
//! is not JSON is a malformed response.

use docdesk_common::{DocdeskError, Result};
use serde_json::Value;

pub const NO_RESULTS: &str = "No results found";

pub fn extract_excerpt(body: &str) -> Result<String> {
    if body.trim().is_empty() {
        return Err(DocdeskError::MalformedResponse("Empty response from server".to_string()));
    }

    let value: Value = serde_json::from_str(body).map_err(|_| invalid_format())?;
    let answer = match &value {
        Value::Array(items) => items.first().and_then(|item| item.get("output")),
        Value::Object(map) => map.get("result"),
        Value::Null => return Err(invalid_format()),
        _ => None,
    };

    Ok(answer.and_then(as_text).unwrap_or_else(|| NO_RESULTS.to_string()))
}

fn invalid_format() -> DocdeskError {
    DocdeskError::MalformedResponse("Invalid response format from server".to_string())
}

/// Text for a present answer; `None` for empty-ish values.
fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::String(_) | Value::Null | Value::Bool(false) => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        other => Some(other.to_string()),
    }
}
