//! Bounded retry runner
//!
//! Runs an async operation up to a fixed number of attempts, sleeping a
//! fixed delay between attempts. Every failure inside the budget is
//! swallowed; only exhaustion reaches the caller, as
//! [`Error::RetryExhausted`] carrying the label and the last error message.
//!
//! ```text
//!   attempt 1 ──Err──> sleep(delay) ──> attempt 2 ──Err──> ... ──> attempt N ──Err──> RetryExhausted
//!       │                                   │                          │
//!       └──Ok──> value                      └──Ok──> value             └──Ok──> value
//! ```

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Attempts made when the caller does not pick a budget
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// Label used in exhaustion errors when none is supplied
pub const DEFAULT_LABEL: &str = "operation";

/// Retries a re-runnable async operation within a fixed budget
#[derive(Debug, Clone)]
pub struct RetryRunner {
    max_attempts: usize,
    delay: Option<Duration>,
    label: String,
}

impl Default for RetryRunner {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: None,
            label: DEFAULT_LABEL.to_string(),
        }
    }
}

impl RetryRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retry budget. A budget of zero still runs the operation once.
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Sleep this long between a failed attempt and the next one
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Name the operation in the exhaustion error
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn attempts(&self) -> usize {
        self.max_attempts
    }

    /// Run `operation` until it succeeds or the budget is spent.
    ///
    /// The operation is re-executed in full on every attempt, so it must be
    /// safe to run again after a partial failure.
    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Display,
    {
        let mut last_error = String::new();

        for attempt in 1..=self.max_attempts {
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} succeeded on attempt {}/{}", self.label, attempt, self.max_attempts);
                    }
                    return Ok(value);
                }
                Err(e) => {
                    last_error = e.to_string();
                    warn!(
                        "{} failed on attempt {}/{}: {}",
                        self.label, attempt, self.max_attempts, last_error
                    );

                    if attempt < self.max_attempts {
                        if let Some(delay) = self.delay {
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }

        Err(Error::RetryExhausted {
            label: self.label.clone(),
            attempts: self.max_attempts,
            last_error,
        })
    }
}

/// Shorthand for a delay-free [`RetryRunner`] run
pub async fn retry_operation<T, E, F, Fut>(
    operation: F,
    max_attempts: usize,
    label: &str,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Display,
{
    RetryRunner::new()
        .max_attempts(max_attempts)
        .label(label)
        .run(operation)
        .await
}
