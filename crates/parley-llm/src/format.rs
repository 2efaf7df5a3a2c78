//! Prompt formats
//!
//! A negotiation prompt is built from three kinds of entries: rules the agent
//! must follow, turns written by the agent itself, and turns written by
//! anyone else. Model families place rules differently.

use serde::{Deserialize, Serialize};

use crate::types::{Message, ProviderKind};

/// How rule, user and model turns map onto chat roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptFormat {
    /// No system role: rules are sent as user turns
    Gemma,
    /// Rules are system messages
    Llama,
}

impl PromptFormat {
    /// Format native to a provider family
    pub fn for_provider(kind: ProviderKind) -> Self {
        match kind {
            ProviderKind::Gemini => Self::Gemma,
            ProviderKind::Groq | ProviderKind::Scripted => Self::Llama,
        }
    }

    /// A turn written by someone other than the prompted agent
    pub fn user(&self, text: impl Into<String>) -> Message {
        Message::user(text)
    }

    /// A turn previously written by the prompted agent
    pub fn model(&self, text: impl Into<String>) -> Message {
        Message::assistant(text)
    }

    /// An instruction the agent must follow
    pub fn rule(&self, text: impl Into<String>) -> Message {
        match self {
            Self::Gemma => Message::user(text),
            Self::Llama => Message::system(text),
        }
    }
}
