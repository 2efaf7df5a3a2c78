//! Parley Agents - Negotiating agents and the offer protocol
//!
//! This crate holds everything that happens inside one agent's turn:
//!
//! - **OfferValidator**: monotonic offer tracking, VALID / INVALID / DEAL / ERROR
//! - **Negotiator**: the turn controller with its single hinted retry
//! - **DeceptiveAgent**: adds a deception score to any agent's turns
//! - **AgentFactory**: builds agents from scenario files and the rules catalog
//!
//! # Key Principle
//!
//! **Every turn yields exactly one message.** Unreadable or invalid model
//! output is recorded with its retry and format-error counts rather than
//! aborting the session; only transport failures propagate.

pub mod actor;
pub mod agent;
pub mod analysis;
pub mod catalog;
pub mod deceptive;
pub mod error;
pub mod metrics;
pub mod validator;

pub use actor::Actor;
pub use agent::{NegotiationAgent, Negotiator};
pub use analysis::StructuredAnalyst;
pub use catalog::{AgentClients, AgentFactory, AgentOptions, AgentPool, RulesCatalog, ScenarioConfig};
pub use deceptive::DeceptiveAgent;
pub use error::{AgentError, Result};
pub use metrics::{avg_message_length, utility, AlphabeticTokenizer, Tokenizer};
pub use validator::*;
