//! Parley LLM - Text-generation collaborators
//!
//! This crate provides the single interface the negotiation engine uses to
//! talk to models:
//!
//! ## Providers
//! - Groq (default): Llama models over chat completions
//! - Google Gemini: Gemma models over `generateContent`
//! - Scripted: canned responses for dry runs and tests
//!
//! ## Key Design Principles
//!
//! 1. Every call goes through [`LLMRouter`], which owns the retry policy
//! 2. Model output is never trusted: JSON is extracted, not assumed
//! 3. Prompt layout is chosen per provider family ([`PromptFormat`])

pub mod extract;
pub mod format;
pub mod providers;
pub mod router;
pub mod types;

pub use extract::*;
pub use format::*;
pub use providers::*;
pub use router::*;
pub use types::*;
