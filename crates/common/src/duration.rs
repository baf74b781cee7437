//! Throttle-scaled durations
//!
//! Slow CI machines get a throttle factor; every pause and UI timeout is
//! multiplied by it before use.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::settings::Settings;

/// Multiplier applied to timeouts and pauses. Never below 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThrottleFactor(u32);

impl ThrottleFactor {
    pub const NONE: ThrottleFactor = ThrottleFactor(1);

    pub fn new(factor: u32) -> Self {
        Self(factor.max(1))
    }

    /// Parse a raw environment value. Anything that is not a positive
    /// integer leaves the factor at 1.
    pub fn parse(raw: &str) -> Self {
        raw.trim()
            .parse::<u32>()
            .ok()
            .filter(|f| *f > 0)
            .map(Self)
            .unwrap_or(Self::NONE)
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    pub fn scale(&self, duration: Duration) -> Duration {
        duration.saturating_mul(self.0)
    }
}

impl Default for ThrottleFactor {
    fn default() -> Self {
        Self::NONE
    }
}

impl fmt::Display for ThrottleFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

/// Sleep for `duration` scaled by the configured throttle factor
pub async fn pause(settings: &Settings, duration: Duration) {
    tokio::time::sleep(settings.throttle_factor.scale(duration)).await;
}
