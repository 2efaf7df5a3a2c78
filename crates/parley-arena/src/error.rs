//! Arena errors

use thiserror::Error;

/// Errors that can occur while running or saving a session
#[derive(Error, Debug)]
pub enum ArenaError {
    #[error("Agent error: {0}")]
    Agent(#[from] parley_agents::AgentError),

    #[error("LLM error: {0}")]
    Llm(#[from] parley_llm::LLMError),

    #[error("No agents registered")]
    NoAgents,

    #[error("Cannot access {path}: {message}")]
    Io { path: String, message: String },

    #[error("Invalid session store {path}: {message}")]
    InvalidStore { path: String, message: String },
}

pub type Result<T> = std::result::Result<T, ArenaError>;
