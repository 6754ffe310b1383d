//! Interpreter error taxonomy.

use thiserror::Error;

use crate::definition::DefinitionError;
use crate::path::PathError;

/// Everything that can abort an interpretation.
#[derive(Debug, Error)]
pub enum InterpreterError {
    /// Static definition checks failed at entry.
    #[error(transparent)]
    Definition(#[from] DefinitionError),
    /// A path was syntactically invalid.
    #[error(transparent)]
    Path(#[from] PathError),
    /// A Choice state had no choices to evaluate.
    #[error("choice state '{0}' has no choices")]
    Choice(String),
    /// A Task state had no usable resource, or the catalog had no match.
    #[error("state '{state}': {message}")]
    Resource { state: String, message: String },
    /// A user-authored Fail state fired.
    #[error("{error}: {cause}")]
    FailState { error: String, cause: String },
    /// A domain method ran and failed.
    #[error("method '{method}' failed: {message}")]
    Host { method: String, message: String },
    /// Runtime data did not have the shape a state requires.
    #[error("state '{state}': {message}")]
    Data { state: String, message: String },
    /// The run was cancelled cooperatively.
    #[error("interpretation cancelled")]
    Cancelled,
}
