//! Error types for E2E orchestration

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("{0} not found on PATH")]
    CliNotFound(String),

    #[error("`{command}` exited with code {exit_code}: {stderr}")]
    CliFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("Unexpected output from `{command}`: {reason}")]
    UnexpectedOutput { command: String, reason: String },

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Extension error: {0}")]
    Extension(String),

    #[error("Step failed: {step} - {reason}")]
    StepFailed { step: String, reason: String },

    #[error(transparent)]
    Common(#[from] vscode_e2e_common::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

pub type E2eResult<T> = Result<T, E2eError>;

/// Fail with [`E2eError::AssertionFailed`] unless `haystack` contains `needle`
pub fn ensure_contains(haystack: &str, needle: &str, what: &str) -> E2eResult<()> {
    if haystack.contains(needle) {
        Ok(())
    } else {
        Err(E2eError::AssertionFailed(format!(
            "expected {} to contain '{}', got: {}",
            what, needle, haystack
        )))
    }
}
