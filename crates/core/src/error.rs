// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Validation error: {0}")]
    Validation(#[from] crate::domain::ValidationError),

    /// Recoverable store failure (busy, constraint, connection)
    #[error("Store error: {0}")]
    Store(String),

    /// Unrecoverable store failure; callers must stop instead of retrying
    #[error("Store corrupted: {0}")]
    StoreCorrupted(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl AppError {
    /// True for errors that must terminate the process instead of being retried
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::StoreCorrupted(_))
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

// Note: sqlx::Error conversion is handled in infra-sqlite crate
// by mapping into AppError::Store / AppError::StoreCorrupted
