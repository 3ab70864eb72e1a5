//! Error types for dictionary and case operations.

use thiserror::Error;

/// Errors raised by the case and dictionary model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// A variable with the same name (ignoring case) already exists.
    #[error("duplicate variable name: {name}")]
    DuplicateVariable { name: String },

    /// No variable with this name exists in the dictionary.
    #[error("unknown variable: {name}")]
    UnknownVariable { name: String },

    /// Name rejected by the naming rules.
    #[error("invalid variable name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// A case does not have one value per dictionary variable.
    #[error("case has {actual} values but the dictionary defines {expected}")]
    SchemaMismatch { expected: usize, actual: usize },

    /// A value's width disagrees with its variable's declared width.
    #[error("value at position {position} has width {actual}, expected {expected}")]
    WidthMismatch {
        position: usize,
        expected: usize,
        actual: usize,
    },

    /// A variable has the wrong type for the role it was given.
    #[error("variable {name} must be {expected}")]
    KindMismatch { name: String, expected: &'static str },
}

/// Result type alias for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;

impl ModelError {
    /// Create a DuplicateVariable error.
    pub fn duplicate_variable(name: impl Into<String>) -> Self {
        Self::DuplicateVariable { name: name.into() }
    }

    /// Create an UnknownVariable error.
    pub fn unknown_variable(name: impl Into<String>) -> Self {
        Self::UnknownVariable { name: name.into() }
    }

    /// Create an InvalidName error.
    pub fn invalid_name(name: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason,
        }
    }

    /// Create a KindMismatch error.
    pub fn kind_mismatch(name: impl Into<String>, expected: &'static str) -> Self {
        Self::KindMismatch {
            name: name.into(),
            expected,
        }
    }
}
