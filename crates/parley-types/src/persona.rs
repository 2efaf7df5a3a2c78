//! Roles and persona descriptions
//!
//! A persona is the configuration block that parameterises a model call:
//! an `init` instruction plus a list of rules. Negotiators, validators and
//! evaluators are all described this way.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TypesError};

/// Negotiating side of an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Wants the price to go down; running offer only increases
    Buyer,
    /// Wants the price to go up; running offer only decreases
    Seller,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buyer => "Buyer",
            Self::Seller => "Seller",
        }
    }

    /// Whether a transcript speaker label belongs to this role
    pub fn matches(&self, speaker: &str) -> bool {
        speaker.eq_ignore_ascii_case(self.as_str())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "buyer" => Ok(Self::Buyer),
            "seller" => Ok(Self::Seller),
            _ => Err(TypesError::UnknownRole {
                role: s.to_string(),
            }),
        }
    }
}

/// Description of an actor, validator or evaluator persona
///
/// Unknown keys from the source JSON are kept in `extra` so that persisted
/// agent descriptions carry the full configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActorDescription {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role: String,
    /// Validator personas carry the side they check under `type`
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub init: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ActorDescription {
    pub fn new(name: impl Into<String>, role: impl Into<String>, init: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            init: init.into(),
            ..Self::default()
        }
    }

    pub fn with_rules<I, S>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rules.extend(rules.into_iter().map(Into::into));
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Parse the negotiating role of this persona
    pub fn negotiating_role(&self) -> Result<Role> {
        if self.role.is_empty() {
            return Err(TypesError::MissingRole {
                name: self.name.clone(),
            });
        }
        self.role.parse()
    }

    /// The checked side of a validator persona, falling back to `role`
    pub fn validated_role(&self) -> Result<Role> {
        match &self.kind {
            Some(kind) => kind.parse(),
            None => self.negotiating_role(),
        }
    }

    /// The full instruction text: `init` directly followed by the rules, newline-joined
    pub fn instructions(&self) -> String {
        format!("{}{}", self.init, self.rules.join("\n"))
    }

    /// Copy without rules, as stored in session records
    pub fn without_rules(&self) -> Self {
        Self {
            rules: Vec::new(),
            ..self.clone()
        }
    }
}
