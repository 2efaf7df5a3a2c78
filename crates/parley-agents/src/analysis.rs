//! Structured analysis of a raw turn
//!
//! Reflexive agents ask the evaluator model to classify their raw text as a
//! structured message. Non-reflexive agents are expected to answer in JSON
//! already, so their text is parsed directly.

use std::sync::Arc;

use parley_llm::{extract_json, CompletionRequest, LLMRouter};
use parley_types::{ActorDescription, Transcript};
use tracing::debug;

use crate::error::Result;
use crate::validator::{StructuredMessage, ValidationMode};

/// Produces the structured message the validator checks
#[derive(Clone)]
pub struct StructuredAnalyst {
    description: ActorDescription,
    client: Arc<LLMRouter>,
    mode: ValidationMode,
}

impl StructuredAnalyst {
    pub fn new(description: ActorDescription, client: Arc<LLMRouter>) -> Self {
        Self {
            description,
            client,
            mode: ValidationMode::Reflexive,
        }
    }

    pub fn with_mode(mut self, mode: ValidationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn description(&self) -> &ActorDescription {
        &self.description
    }

    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    /// Analysis prompt: every transcript text and the new raw text as user
    /// turns, then the validator persona as a rule
    pub fn request(&self, transcript: &Transcript, raw_text: &str) -> CompletionRequest {
        let format = self.client.prompt_format();
        let mut messages: Vec<_> = transcript
            .entries()
            .iter()
            .map(|m| format.user(m.text.clone()))
            .collect();
        messages.push(format.user(raw_text));
        messages.push(format.rule(self.description.instructions()));
        CompletionRequest::deterministic(messages)
    }

    /// Classify `raw_text`; unreadable output becomes a malformed message
    pub async fn analyze(&self, transcript: &Transcript, raw_text: &str) -> Result<StructuredMessage> {
        match self.mode {
            ValidationMode::NonReflexive => Ok(match serde_json::from_str(raw_text) {
                Ok(value) => StructuredMessage::from_value(&value),
                Err(e) => {
                    debug!("Agent output is not JSON: {}", e);
                    StructuredMessage::malformed(e.to_string())
                }
            }),
            ValidationMode::Reflexive => {
                let answer = self.client.generate(self.request(transcript, raw_text)).await?;
                Ok(match extract_json(&answer) {
                    Ok(value) => StructuredMessage::from_value(&value),
                    Err(e) => {
                        debug!("Analysis output has no JSON: {}", e);
                        StructuredMessage::from_value(&e.sentinel())
                    }
                })
            }
        }
    }
}
