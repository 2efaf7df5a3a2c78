//! Offer Validator - monotonic offer tracking
//!
//! Each agent owns exactly one validator per session. The validator keeps
//! the agent's running best offer and classifies every structured message:
//!
//! 1. `message` is VALID without any numeric check
//! 2. `refusal` and `deal` end the negotiation (DEAL)
//! 3. `counter-offer` with equal prices is a DEAL; otherwise the offer must
//!    be consistent (buyer below seller) and strictly improve on the
//!    running best offer, or it is INVALID with a corrective hint
//! 4. anything else is an ERROR
//!
//! A buyer's running offer only goes up, a seller's only goes down.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use parley_types::{number_or_nan, Role};

/// Hint attached to every ERROR verdict
pub const MALFORMED_HINT: &str = "The JSON message is malformed.";

/// Hint for counter-offers whose prices are not numbers
pub const NUMERIC_HINT: &str = "Provide numeric buyer and seller prices.";

/// Message-kind tag of a structured message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageKind {
    Message,
    Refusal,
    Deal,
    CounterOffer,
}

impl MessageKind {
    /// Case-insensitive parse of a kind tag
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "message" => Some(Self::Message),
            "refusal" => Some(Self::Refusal),
            "deal" => Some(Self::Deal),
            "counter-offer" => Some(Self::CounterOffer),
            _ => None,
        }
    }
}

/// Machine-readable classification of one turn's raw text
///
/// Prices that are missing or not numeric are NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredMessage {
    /// The raw `MessageType` tag, if any
    pub tag: Option<String>,
    pub buyer: f64,
    pub seller: f64,
    /// Why the message could not be read, for sentinel messages
    pub error: Option<String>,
}

impl StructuredMessage {
    /// Read the analysis JSON (`MessageType`, `buyer`, `seller`)
    pub fn from_value(value: &Value) -> Self {
        Self {
            tag: value
                .get("MessageType")
                .and_then(Value::as_str)
                .map(str::to_string),
            buyer: number_or_nan(value.get("buyer")),
            seller: number_or_nan(value.get("seller")),
            error: value.get("Error").and_then(Value::as_str).map(str::to_string),
        }
    }

    /// A message that could not be parsed at all
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self {
            tag: None,
            buyer: f64::NAN,
            seller: f64::NAN,
            error: Some(reason.into()),
        }
    }

    pub fn of_kind(kind: &str) -> Self {
        Self {
            tag: Some(kind.to_string()),
            buyer: f64::NAN,
            seller: f64::NAN,
            error: None,
        }
    }

    pub fn counter_offer(buyer: f64, seller: f64) -> Self {
        Self {
            tag: Some("counter-offer".to_string()),
            buyer,
            seller,
            error: None,
        }
    }

    pub fn kind(&self) -> Option<MessageKind> {
        self.tag.as_deref().and_then(MessageKind::parse)
    }
}

/// Outcome of validating one structured message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "MessageType", rename_all = "UPPERCASE")]
pub enum Verdict {
    Valid,
    Invalid {
        #[serde(rename = "Hint")]
        hint: String,
    },
    Deal,
    Error {
        #[serde(rename = "Hint")]
        hint: String,
    },
}

impl Verdict {
    pub fn malformed() -> Self {
        Self::Error {
            hint: MALFORMED_HINT.to_string(),
        }
    }

    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::Invalid { hint } | Self::Error { hint } => Some(hint),
            Self::Valid | Self::Deal => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Valid => "VALID",
            Self::Invalid { .. } => "INVALID",
            Self::Deal => "DEAL",
            Self::Error { .. } => "ERROR",
        }
    }
}

/// Which validation protocol an agent runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Monotonic offer protocol over a model-produced analysis
    #[default]
    Reflexive,
    /// Baseline: the agent's own JSON is trusted, only `deal` ends the session
    NonReflexive,
}

/// Format a price the way hints show it: `50.0`, `72.5`, `inf`
pub fn format_price(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "inf" } else { "-inf" }.to_string()
    } else if value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

/// Per-agent offer validator
#[derive(Debug, Clone)]
pub struct OfferValidator {
    role: Role,
    mode: ValidationMode,
    best_offer: f64,
}

impl OfferValidator {
    pub fn new(role: Role) -> Self {
        Self::with_mode(role, ValidationMode::Reflexive)
    }

    pub fn with_mode(role: Role, mode: ValidationMode) -> Self {
        Self {
            role,
            mode,
            best_offer: Self::initial_offer(role),
        }
    }

    fn initial_offer(role: Role) -> f64 {
        match role {
            Role::Buyer => f64::NEG_INFINITY,
            Role::Seller => f64::INFINITY,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    /// The most recent accepted price for this role
    pub fn best_offer(&self) -> f64 {
        self.best_offer
    }

    /// Forget every accepted offer
    pub fn reset(&mut self) {
        self.best_offer = Self::initial_offer(self.role);
    }

    /// Classify a structured message, updating the running best offer on VALID
    pub fn evaluate(&mut self, message: &StructuredMessage) -> Verdict {
        match self.mode {
            ValidationMode::Reflexive => self.evaluate_reflexive(message),
            ValidationMode::NonReflexive => Self::evaluate_non_reflexive(message),
        }
    }

    fn evaluate_non_reflexive(message: &StructuredMessage) -> Verdict {
        if message.error.is_some() && message.tag.is_none() {
            return Verdict::malformed();
        }
        match message.kind() {
            Some(MessageKind::Deal) => Verdict::Deal,
            _ => Verdict::Valid,
        }
    }

    fn evaluate_reflexive(&mut self, message: &StructuredMessage) -> Verdict {
        match message.kind() {
            Some(MessageKind::Message) => Verdict::Valid,
            Some(MessageKind::Refusal) | Some(MessageKind::Deal) => Verdict::Deal,
            Some(MessageKind::CounterOffer) => self.check_offer(message.buyer, message.seller),
            None => Verdict::malformed(),
        }
    }

    fn check_offer(&mut self, buyer: f64, seller: f64) -> Verdict {
        if buyer == seller {
            return Verdict::Deal;
        }

        let (offer, improves) = match self.role {
            Role::Buyer => (buyer, buyer > self.best_offer),
            Role::Seller => (seller, seller < self.best_offer),
        };
        if buyer < seller && improves {
            self.best_offer = offer;
            return Verdict::Valid;
        }

        let mut hint = String::new();
        match self.role {
            Role::Buyer => {
                if buyer > seller {
                    hint.push_str(&format!(
                        "Propose a new offer that is lower than {}. ",
                        format_price(seller)
                    ));
                }
                if buyer <= self.best_offer {
                    hint.push_str(&format!(
                        "Propose a new offer that is higher than {}.",
                        format_price(self.best_offer)
                    ));
                }
            }
            Role::Seller => {
                // The consistency clause quotes the counterpart's price
                if buyer > seller {
                    hint.push_str(&format!(
                        "Propose a new offer that is higher than {}. ",
                        format_price(buyer)
                    ));
                }
                if seller >= self.best_offer {
                    hint.push_str(&format!(
                        "Propose a new offer that is lower than {}.",
                        format_price(self.best_offer)
                    ));
                }
            }
        }
        if hint.is_empty() {
            hint.push_str(NUMERIC_HINT);
        }

        Verdict::Invalid { hint }
    }
}
