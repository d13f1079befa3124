//! Configuration for timeout tokens.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::cancellation::{with_timeout, CancellationToken, SHORT_TIMEOUT};
use crate::errors::CloserError;

/// Configuration for the short timeout used during shutdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Short timeout in seconds.
    #[serde(default = "default_short_timeout")]
    pub short_timeout_secs: f64,
}

fn default_short_timeout() -> f64 {
    SHORT_TIMEOUT.as_secs_f64()
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            short_timeout_secs: default_short_timeout(),
        }
    }
}

impl TimeoutConfig {
    /// Creates a new timeout configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the short timeout.
    #[must_use]
    pub fn with_short_timeout(mut self, seconds: f64) -> Self {
        self.short_timeout_secs = seconds;
        self
    }

    /// Checks that the timeout is a positive, finite number of seconds.
    pub fn validate(&self) -> Result<(), CloserError> {
        self.short_timeout().map(|_| ())
    }

    /// Returns the short timeout as a duration.
    pub fn short_timeout(&self) -> Result<Duration, CloserError> {
        let secs = self.short_timeout_secs;
        if !secs.is_finite() || secs <= 0.0 {
            return Err(CloserError::InvalidConfig(format!(
                "short_timeout_secs must be positive and finite, got {secs}"
            )));
        }
        Duration::try_from_secs_f64(secs)
            .map_err(|e| CloserError::InvalidConfig(format!("short_timeout_secs: {e}")))
    }

    /// Returns a fresh token cancelled after the configured timeout.
    pub fn token(&self) -> Result<Arc<CancellationToken>, CloserError> {
        Ok(with_timeout(None, self.short_timeout()?))
    }

    /// Returns a child of `parent` cancelled after the configured timeout.
    pub fn token_with_parent(
        &self,
        parent: &Arc<CancellationToken>,
    ) -> Result<Arc<CancellationToken>, CloserError> {
        Ok(with_timeout(Some(parent), self.short_timeout()?))
    }
}
