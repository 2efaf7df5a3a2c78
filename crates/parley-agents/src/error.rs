//! Agent errors

use thiserror::Error;

/// Errors that can occur while building or running an agent
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    Llm(#[from] parley_llm::LLMError),

    #[error("Invalid persona: {0}")]
    Persona(#[from] parley_types::TypesError),

    #[error("Agent with name {name} not found in {pool}")]
    AgentNotFound { name: String, pool: String },

    #[error("Persona {key} not found in rules catalog")]
    PersonaNotFound { key: String },

    #[error("Scenario has no hidden information")]
    MissingHiddenInfo,

    #[error("Cannot read {path}: {message}")]
    Io { path: String, message: String },

    #[error("Invalid JSON in {path}: {message}")]
    InvalidConfig { path: String, message: String },
}

pub type Result<T> = std::result::Result<T, AgentError>;
