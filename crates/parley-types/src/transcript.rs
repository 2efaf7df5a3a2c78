//! Transcript and message types

use serde::{Deserialize, Serialize};

use crate::persona::Role;

/// Speaker label of the scenario seed at transcript index 0
pub const SCENARIO_SPEAKER: &str = "scenario";

/// One displayed turn of the negotiation
///
/// Produced exactly once per agent turn, after any retry. `retry_count` and
/// `format_error` record protocol friction, not conversation content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub text: String,
    #[serde(rename = "retry_counts", default)]
    pub retry_count: u32,
    /// 0 or 1
    #[serde(default)]
    pub format_error: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deception_score: Option<f64>,
}

impl Message {
    /// The scenario seed that opens every transcript
    pub fn seed(scenario: impl Into<String>) -> Self {
        Self::note(SCENARIO_SPEAKER, scenario)
    }

    /// A bare entry with no protocol bookkeeping, used for evaluator prompts
    pub fn note(role: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            text: text.into(),
            retry_count: 0,
            format_error: 0,
            deception_score: None,
        }
    }

    /// An agent turn; the displayed text is prefixed with the role
    pub fn turn(role: Role, raw_text: &str, retry_count: u32, format_error: bool) -> Self {
        Self {
            role: role.as_str().to_string(),
            text: format!("{} : {}", role, raw_text),
            retry_count,
            format_error: u32::from(format_error),
            deception_score: None,
        }
    }

    pub fn is_from(&self, role: Role) -> bool {
        role.matches(&self.role)
    }

    pub fn with_deception_score(mut self, score: Option<f64>) -> Self {
        self.deception_score = score;
        self
    }
}

/// Append-only negotiation history
///
/// Index 0 always holds the scenario seed. There is no API to remove or edit
/// entries once pushed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    entries: Vec<Message>,
}

impl Transcript {
    pub fn new(scenario: impl Into<String>) -> Self {
        Self {
            entries: vec![Message::seed(scenario)],
        }
    }

    pub fn scenario(&self) -> &str {
        self.entries.first().map(|m| m.text.as_str()).unwrap_or_default()
    }

    pub fn push(&mut self, message: Message) {
        self.entries.push(message);
    }

    /// Every entry including the seed
    pub fn entries(&self) -> &[Message] {
        &self.entries
    }

    /// Agent turns only, without the seed
    pub fn history(&self) -> &[Message] {
        self.entries.get(1..).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Turns spoken by one role
    pub fn turns_of(&self, role: Role) -> impl Iterator<Item = &Message> {
        self.history().iter().filter(move |m| m.is_from(role))
    }

    /// The longest agent turn by character count; first one wins on ties
    pub fn longest_turn(&self) -> Option<&Message> {
        self.history().iter().fold(None, |longest: Option<&Message>, m| match longest {
            Some(l) if l.text.chars().count() >= m.text.chars().count() => Some(l),
            _ => Some(m),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_is_first_and_excluded_from_history() {
        let mut transcript = Transcript::new("A used bike is for sale.");
        transcript.push(Message::turn(Role::Seller, "I ask 100.", 0, false));

        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.scenario(), "A used bike is for sale.");
        assert_eq!(transcript.entries()[0].role, SCENARIO_SPEAKER);
        assert_eq!(transcript.history().len(), 1);
        assert_eq!(transcript.history()[0].text, "Seller : I ask 100.");
    }

    #[test]
    fn test_turns_of_role() {
        let mut transcript = Transcript::new("ctx");
        transcript.push(Message::turn(Role::Buyer, "50?", 0, false));
        transcript.push(Message::turn(Role::Seller, "90.", 1, true));
        transcript.push(Message::turn(Role::Buyer, "60?", 0, false));

        assert_eq!(transcript.turns_of(Role::Buyer).count(), 2);
        let seller: Vec<_> = transcript.turns_of(Role::Seller).collect();
        assert_eq!(seller[0].retry_count, 1);
        assert_eq!(seller[0].format_error, 1);
    }

    #[test]
    fn test_longest_turn_ignores_seed() {
        let mut transcript = Transcript::new("a very long scenario description indeed");
        assert!(transcript.longest_turn().is_none());

        transcript.push(Message::turn(Role::Buyer, "short", 0, false));
        transcript.push(Message::turn(Role::Seller, "a bit longer", 0, false));
        assert_eq!(transcript.longest_turn().unwrap().role, "Seller");
    }

    #[test]
    fn test_message_wire_names() {
        let message = Message::turn(Role::Buyer, "hi", 1, false).with_deception_score(Some(0.5));
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["retry_counts"], 1);
        assert_eq!(value["format_error"], 0);
        assert_eq!(value["deception_score"], 0.5);
    }
}
