//! vscode-e2e common library
//!
//! Primitives shared by every part of the harness: the bounded retry
//! runner, tagged waits, throttle-scaled durations, process settings and
//! logging setup.

pub mod duration;
pub mod error;
pub mod logging;
pub mod retry;
pub mod settings;
pub mod wait;

pub use duration::{pause, ThrottleFactor};
pub use error::{Error, Result};
pub use logging::{init_tracing, LogLevel};
pub use retry::{retry_operation, RetryRunner};
pub use settings::Settings;
pub use wait::{PredicateWait, Wait};
