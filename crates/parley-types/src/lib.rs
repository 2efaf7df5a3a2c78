//! Parley Types - Canonical types for LLM price negotiations
//!
//! This crate contains the foundational types shared by every other parley
//! crate, with zero dependencies on them:
//!
//! - Roles and persona descriptions (who is talking, with which rules)
//! - Transcript and message types (who said what, when)
//! - Evaluation types (how the session ended, per-agent metrics)
//! - Session records (what gets persisted)
//!
//! # Transcript Invariant
//!
//! The transcript is append-only. Entry 0 is the scenario seed and is never
//! mutated; transcript order is the single source of truth for turn order.

pub mod error;
pub mod evaluation;
pub mod persona;
pub mod session;
pub mod transcript;
pub mod value;

pub use error::*;
pub use evaluation::*;
pub use persona::*;
pub use session::*;
pub use transcript::*;
pub use value::*;
