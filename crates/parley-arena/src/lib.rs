//! Parley Arena - Negotiation sessions
//!
//! The arena drives registered agents through rounds over a shared
//! transcript, then evaluates the finished session and persists it:
//!
//! - **Arena**: round scheduling, agreement detection, save on completion
//! - **SessionEvaluator**: outcome, prices and per-agent analysis
//! - **SessionStore**: JSON file keyed by session id
//!
//! # Session Identity
//!
//! A session id is derived from the participants' names and roles, so
//! rerunning the same pairing overwrites its stored record instead of
//! adding another one.

pub mod arena;
pub mod error;
pub mod evaluator;
pub mod store;

pub use arena::{session_id, Arena, ArenaConfig, DEFAULT_MAX_ROUNDS};
pub use error::{ArenaError, Result};
pub use evaluator::SessionEvaluator;
pub use store::SessionStore;
