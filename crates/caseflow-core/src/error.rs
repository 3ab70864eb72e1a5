//! Error types for pipeline runs.

use std::io;
use std::sync::Arc;

use caseflow_model::ModelError;
use thiserror::Error;

/// Errors that abort a pipeline run.
///
/// Errors are cheap to clone, so a failed run can report its first error
/// again when it is committed.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// I/O failure in a source, sink or backing store.
    #[error("I/O error: {0}")]
    Io(#[source] Arc<io::Error>),

    /// Shape or dictionary violation.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// A transformation returned the `Error` verdict.
    #[error("transformation '{name}' (step {index}) failed on case {case_number}")]
    TransformFailed {
        name: String,
        index: usize,
        case_number: u64,
    },

    /// Attempt to append to a finalized transformation chain.
    #[error("transformation chain is finalized")]
    ChainFinalized,

    /// The dataset has no active case source.
    #[error("dataset has no active file")]
    NoActiveFile,

    /// The run already failed; no further cases are produced.
    #[error("pipeline run was aborted by an earlier error")]
    RunAborted,

    /// A backing store produced fewer cases than were appended to it.
    #[error("store yielded {actual} cases but {expected} were written")]
    TruncatedStore { expected: u64, actual: u64 },

    /// A documented precondition does not hold.
    #[error("precondition violated: {message}")]
    Precondition { message: String },

    /// BY-key order decreased in an input that must be sorted.
    #[error("{context}: case {case_number} is not in ascending order")]
    UnsortedInput { context: String, case_number: u64 },
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

impl From<io::Error> for PipelineError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl PipelineError {
    /// Create a Precondition error.
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
        }
    }

    /// Create an UnsortedInput error.
    pub fn unsorted(context: impl Into<String>, case_number: u64) -> Self {
        Self::UnsortedInput {
            context: context.into(),
            case_number,
        }
    }
}
