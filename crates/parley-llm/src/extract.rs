//! JSON extraction from free-form model output

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{json, Value};
use thiserror::Error;

/// Why no JSON object could be read from a model answer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JsonExtractError {
    #[error("no JSON object found in model output")]
    NoObject,

    #[error("{0}")]
    Malformed(String),
}

impl JsonExtractError {
    /// The classification object used in place of an unparseable answer
    pub fn sentinel(&self) -> Value {
        json!({ "Result": "ERROR", "Error": self.to_string() })
    }
}

fn object_span() -> &'static Regex {
    static SPAN: OnceLock<Regex> = OnceLock::new();
    SPAN.get_or_init(|| Regex::new(r"(?s)\{.*\}").unwrap_or_else(|_| unreachable!()))
}

/// Parse the span from the first `{` to the last `}` of `text`
pub fn extract_json(text: &str) -> Result<Value, JsonExtractError> {
    let span = object_span()
        .find(text)
        .ok_or(JsonExtractError::NoObject)?;
    serde_json::from_str(span.as_str()).map_err(|e| JsonExtractError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_ignores_prose() {
        let text = "Sure! Here is the analysis:\n```json\n{\"message\": \"counter-offer\",\n \"buyer\": 50, \"seller\": 100}\n```\nHope it helps.";
        let value = extract_json(text).unwrap();
        assert_eq!(value["message"], "counter-offer");
        assert_eq!(value["seller"], 100);
    }

    #[test]
    fn test_extract_spans_nested_objects() {
        let value = extract_json(r#"{"a": {"b": 1}, "c": 2}"#).unwrap();
        assert_eq!(value["a"]["b"], 1);
    }

    #[test]
    fn test_extract_failures_give_sentinel() {
        assert_eq!(extract_json("no braces here"), Err(JsonExtractError::NoObject));

        let sentinel = extract_json("{not json}").unwrap_err().sentinel();
        assert_eq!(sentinel["Result"], "ERROR");
        assert!(sentinel["Error"].is_string());

        // Greedy span covers both objects and fails to parse
        let sentinel = extract_json(r#"{"a": 1} and {"b": 2}"#).unwrap_err().sentinel();
        assert_eq!(sentinel["Result"], "ERROR");
    }
}
