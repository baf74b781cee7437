//! Waiting on UI state: either a fixed delay or a polled predicate.
//!
//! Callers pick the variant up front; [`Wait::resolve`] applies the throttle
//! factor and does the waiting.

use futures::future::{BoxFuture, FutureExt};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::error::{Error, Result};
use crate::settings::Settings;

pub const DEFAULT_PREDICATE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_PREDICATE_INTERVAL: Duration = Duration::from_millis(500);

type Predicate = Box<dyn FnMut() -> BoxFuture<'static, bool> + Send>;

/// Poll an async predicate until it holds or a timeout passes.
///
/// Predicates fold their own failures into `false`; a check that errors is
/// simply polled again.
pub struct PredicateWait {
    predicate: Predicate,
    timeout: Duration,
    interval: Duration,
    reverse: bool,
    message: String,
}

impl fmt::Debug for PredicateWait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateWait")
            .field("predicate", &"<predicate>")
            .field("timeout", &self.timeout)
            .field("interval", &self.interval)
            .field("reverse", &self.reverse)
            .field("message", &self.message)
            .finish()
    }
}

impl PredicateWait {
    pub fn new<F, Fut>(mut predicate: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        Self {
            predicate: Box::new(move || predicate().boxed()),
            timeout: DEFAULT_PREDICATE_TIMEOUT,
            interval: DEFAULT_PREDICATE_INTERVAL,
            reverse: false,
            message: "predicate".to_string(),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Wait for the predicate to become false instead of true
    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    /// Text reported in the timeout error
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    async fn poll(mut self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut checks = 0usize;

        loop {
            checks += 1;
            if (self.predicate)().await != self.reverse {
                debug!("'{}' satisfied after {} check(s)", self.message, checks);
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout(format!(
                    "{} (after {} ms, {} checks)",
                    self.message,
                    timeout.as_millis(),
                    checks
                )));
            }
            sleep(self.interval.min(deadline - now)).await;
        }
    }
}

/// How to wait for the IDE to settle after an action
#[derive(Debug)]
pub enum Wait {
    FixedDelay(Duration),
    Predicate(PredicateWait),
}

impl Wait {
    pub fn fixed(delay: Duration) -> Self {
        Wait::FixedDelay(delay)
    }

    pub fn until<F, Fut>(predicate: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        Wait::Predicate(PredicateWait::new(predicate))
    }

    /// Perform the wait. The delay or timeout is scaled by the throttle
    /// factor; the polling interval is not.
    pub async fn resolve(self, settings: &Settings) -> Result<()> {
        match self {
            Wait::FixedDelay(delay) => {
                sleep(settings.scaled(delay)).await;
                Ok(())
            }
            Wait::Predicate(wait) => {
                let timeout = settings.scaled(wait.timeout);
                wait.poll(timeout).await
            }
        }
    }
}

impl From<Duration> for Wait {
    fn from(delay: Duration) -> Self {
        Wait::FixedDelay(delay)
    }
}

impl From<PredicateWait> for Wait {
    fn from(wait: PredicateWait) -> Self {
        Wait::Predicate(wait)
    }
}
