//! End-of-session evaluation types

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::value::number_or_nan;

/// How a negotiation session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionResult {
    Deal,
    Refusal,
    Error,
}

impl SessionResult {
    /// Parse an evaluator verdict; anything unrecognised is an error
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "DEAL" => Self::Deal,
            "REFUSAL" => Self::Refusal,
            _ => Self::Error,
        }
    }
}

impl std::fmt::Display for SessionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Deal => write!(f, "DEAL"),
            Self::Refusal => write!(f, "REFUSAL"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Prices the session evaluator read off the transcript
///
/// Unknown prices are NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatorSummary {
    pub result: SessionResult,
    pub initial_price: f64,
    pub initial_buyer_offer: f64,
    pub final_price: f64,
    pub error: Option<String>,
}

impl EvaluatorSummary {
    /// Read the evaluator's JSON answer
    ///
    /// Expects `Result`, `initial_price`, `initial_buyer_offer` and
    /// `final_price`; prices may be numbers or numeric strings.
    pub fn from_value(value: &Value) -> Self {
        let result = value
            .get("Result")
            .and_then(Value::as_str)
            .map(SessionResult::parse_lenient)
            .unwrap_or(SessionResult::Error);

        Self {
            result,
            initial_price: number_or_nan(value.get("initial_price")),
            initial_buyer_offer: number_or_nan(value.get("initial_buyer_offer")),
            final_price: number_or_nan(value.get("final_price")),
            error: value.get("Error").and_then(Value::as_str).map(str::to_string),
        }
    }

    /// Summary used when the evaluator answer could not be parsed
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            result: SessionResult::Error,
            initial_price: f64::NAN,
            initial_buyer_offer: f64::NAN,
            final_price: f64::NAN,
            error: Some(reason.into()),
        }
    }
}

/// Per-agent metrics of a finished session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentAnalysis {
    pub role: String,
    /// Only defined when the session ended in a deal
    pub utility: Option<f64>,
    pub initial_offer: Option<f64>,
    pub avg_msg_length: f64,
    pub retries: u32,
    pub format_errors: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_deception: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_deception: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hallucination_index: Option<f64>,
}

/// Evaluation stored with each session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub result: SessionResult,
    pub analysis: Vec<AgentAnalysis>,
    pub rounds: u32,
    pub final_price: Option<f64>,
}
