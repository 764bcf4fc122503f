//! Bounded retries with exponential backoff
//!
//! The engine retries on every error it sees. It does not classify failures;
//! callers that only want to retry some of them should filter inside the
//! wrapped closure and return `Ok` for the rest.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{OperationError, Result};

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryOptions {
    /// Retries after the first attempt; total attempts is `max_retries + 1`
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Wait before the first retry
    #[serde(default = "default_delay", with = "humantime_serde")]
    pub delay: Duration,

    /// Multiplier applied to the wait after each retry
    #[serde(default = "default_backoff")]
    pub backoff: f64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            delay: default_delay(),
            backoff: default_backoff(),
        }
    }
}

impl RetryOptions {
    pub fn new(max_retries: u32, delay: Duration, backoff: f64) -> Self {
        Self {
            max_retries,
            delay,
            backoff,
        }
    }

    /// Reject options that would make delays shrink or become undefined
    pub fn validate(&self) -> Result<()> {
        if !self.backoff.is_finite() {
            return Err(OperationError::invalid_config(
                "backoff",
                format!("must be a finite number, got {}", self.backoff),
            ));
        }
        if self.backoff < 1.0 {
            return Err(OperationError::invalid_config(
                "backoff",
                format!("must be at least 1.0, got {}", self.backoff),
            ));
        }
        Ok(())
    }

    /// Wait applied before retry number `retry` (0-indexed), saturating at
    /// [`Duration::MAX`]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        scale_delay(self.delay, self.effective_backoff().powi(exponent))
    }

    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    fn effective_backoff(&self) -> f64 {
        if self.backoff.is_finite() && self.backoff >= 1.0 {
            self.backoff
        } else {
            1.0
        }
    }
}

/// Run `operation` until it succeeds or `options.max_retries` retries are used up.
///
/// The error of the final attempt is returned as-is.
pub async fn retry<F, Fut, T, E>(
    mut operation: F,
    options: &RetryOptions,
) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Display,
{
    if options.validate().is_err() {
        warn!(
            "Retry backoff {} is invalid, falling back to a fixed delay",
            options.backoff
        );
    }

    let backoff = options.effective_backoff();
    let mut delay = options.delay;
    let mut attempt: u32 = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!("Operation succeeded after {} retries", attempt);
                }
                return Ok(value);
            }
            Err(err) if attempt < options.max_retries => {
                info!(
                    "Retrying after error: {} (attempt {}/{}) in {:?}",
                    err,
                    attempt + 1,
                    options.max_retries,
                    delay
                );
                tokio::time::sleep(delay).await;
                delay = scale_delay(delay, backoff);
                attempt += 1;
            }
            Err(err) => {
                debug!(
                    "Giving up after {} attempts: {}",
                    options.total_attempts(),
                    err
                );
                return Err(err);
            }
        }
    }
}

/// `delay * factor` for `factor >= 1`, saturating instead of overflowing
fn scale_delay(delay: Duration, factor: f64) -> Duration {
    if delay.is_zero() || factor == 1.0 {
        return delay;
    }
    Duration::try_from_secs_f64(delay.as_secs_f64() * factor).unwrap_or(Duration::MAX)
}

fn default_max_retries() -> u32 {
    3
}

fn default_delay() -> Duration {
    Duration::from_millis(1000)
}

fn default_backoff() -> f64 {
    1.5
}
