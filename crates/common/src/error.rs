//! Error types for the harness primitives

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the common Error
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("{label}: retry budget of {attempts} attempt(s) exhausted: {last_error}")]
    RetryExhausted {
        label: String,
        attempts: usize,
        last_error: String,
    },

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Project path for \"{0}\" does not exist")]
    ProjectPathNotFound(PathBuf),

    #[error("Unable to determine current OS username")]
    UserNameUnavailable,
}

impl Error {
    /// True when the error came out of an exhausted retry budget.
    pub fn is_retry_exhausted(&self) -> bool {
        matches!(self, Error::RetryExhausted { .. })
    }
}
