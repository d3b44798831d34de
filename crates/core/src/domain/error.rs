// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid job state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Unknown job status: {0}")]
    UnknownStatus(String),

    #[error("Invalid priority range: min {min} > max {max}")]
    InvalidPriorityRange { min: i32, max: i32 },
}

/// Rejection of a submitted job description.
///
/// Every variant names the offending field so the message can be shown
/// verbatim to whoever wrote the description.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field `{field}`")]
    MissingField { field: String },

    #[error("field `{field}`: expected {expected}, got {actual}")]
    InvalidType {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("field `{field}`: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("unknown kind `{kind}` (known: {known})")]
    UnknownKind { kind: String, known: String },

    #[error("unknown workflow `{workflow_ref}`")]
    UnknownWorkflow { workflow_ref: String },

    #[error("workflow `{workflow_ref}` requires inputs {missing:?}")]
    MissingInputs {
        workflow_ref: String,
        missing: Vec<String>,
    },
}

pub type Result<T> = std::result::Result<T, DomainError>;
