//! Error types for merge setup.

use caseflow_core::PipelineError;
use caseflow_model::ModelError;
use thiserror::Error;

/// Errors raised while setting up or running a merge.
#[derive(Debug, Error)]
pub enum MergeError {
    /// Failure reading an input.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Dictionary error while applying RENAME/DROP/KEEP or building the
    /// output dictionary.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// No FILE input was given.
    #[error("at least one FILE input is required")]
    NoMasterFile,

    /// A TABLE input was given without BY variables.
    #[error("TABLE inputs require BY variables")]
    TableWithoutBy,

    /// A BY variable is missing from an input.
    #[error("BY variable {name} is not in {file}")]
    MissingByVariable { file: String, name: String },

    /// The same variable name has different types or widths across inputs.
    #[error("variable {name} in {file} has a different type or width than in earlier inputs")]
    IncompatibleVariable { file: String, name: String },

    /// An IN, FIRST or LAST variable name is already taken.
    #[error("flag variable name {name} is already in use")]
    FlagNameInUse { name: String },

    /// ADD FILES only accepts FILE inputs.
    #[error("ADD FILES does not accept TABLE input {file}")]
    TableInAddFiles { file: String },
}

/// Result type alias for merge setup.
pub type Result<T> = std::result::Result<T, MergeError>;

impl MergeError {
    /// Create a MissingByVariable error.
    pub fn missing_by(file: impl Into<String>, name: impl Into<String>) -> Self {
        Self::MissingByVariable {
            file: file.into(),
            name: name.into(),
        }
    }

    /// Create an IncompatibleVariable error.
    pub fn incompatible(file: impl Into<String>, name: impl Into<String>) -> Self {
        Self::IncompatibleVariable {
            file: file.into(),
            name: name.into(),
        }
    }
}
