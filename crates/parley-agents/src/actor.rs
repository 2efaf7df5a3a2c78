//! Actor - turns a persona and a transcript into a model call

use std::sync::Arc;

use parley_llm::{CompletionRequest, LLMRouter, PromptFormat};
use parley_types::{ActorDescription, Message, Role};

use crate::error::Result;

/// A persona bound to a text-generation client
///
/// The persona instructions open the prompt as a rule. Transcript entries
/// spoken by the actor's own role become model turns, every other entry a
/// user turn. A corrective hint, when given, closes the prompt as a rule.
#[derive(Clone)]
pub struct Actor {
    description: ActorDescription,
    client: Arc<LLMRouter>,
}

impl Actor {
    pub fn new(description: ActorDescription, client: Arc<LLMRouter>) -> Self {
        Self {
            description,
            client,
        }
    }

    pub fn description(&self) -> &ActorDescription {
        &self.description
    }

    /// Build the completion request for the given transcript entries
    pub fn request(&self, entries: &[Message], hint: Option<&str>) -> CompletionRequest {
        let format: PromptFormat = self.client.prompt_format();
        let own_role: Option<Role> = self.description.negotiating_role().ok();

        let mut messages = Vec::with_capacity(entries.len() + 2);
        messages.push(format.rule(self.description.instructions()));
        for entry in entries {
            if own_role.is_some_and(|role| entry.is_from(role)) {
                messages.push(format.model(entry.text.clone()));
            } else {
                messages.push(format.user(entry.text.clone()));
            }
        }
        if let Some(hint) = hint.filter(|h| !h.is_empty()) {
            messages.push(format.rule(hint));
        }

        CompletionRequest::deterministic(messages)
    }

    /// Ask the model for the actor's next text
    pub async fn ask(&self, entries: &[Message], hint: Option<&str>) -> Result<String> {
        let text = self.client.generate(self.request(entries, hint)).await?;
        Ok(text)
    }
}
