//! Error types for Parley type conversions

use thiserror::Error;

/// Result type for parley-types operations
pub type Result<T> = std::result::Result<T, TypesError>;

/// Errors raised while interpreting configuration values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypesError {
    /// A role string that is neither buyer nor seller
    #[error("Unknown role: {role}")]
    UnknownRole { role: String },

    /// A persona without a role where one is required
    #[error("Persona {name} has no role")]
    MissingRole { name: String },
}
