//! Backoff retry for individual RPC calls
//!
//! The retry layer knows nothing about endpoints: it re-runs one operation
//! while a predicate says the failure is worth retrying, sleeping with
//! exponential backoff between attempts. Endpoint rotation is layered on top
//! in [`super::fallback`].

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::error::{Error, Result};

/// RPC retry configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Initial backoff duration
    pub initial_backoff: Duration,
    /// Maximum backoff duration
    pub max_backoff: Duration,
    /// Backoff multiplier for exponential growth
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            initial_backoff: Duration::from_millis(300),
            max_backoff: Duration::from_secs(4),
            backoff_multiplier: 1.8,
        }
    }
}

impl RetryConfig {
    /// Single attempt, no backoff
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Calculate backoff duration after a failed attempt (0-indexed)
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let backoff_ms =
            self.initial_backoff.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        let capped = backoff_ms.min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(capped.round() as u64)
    }

    /// Whether another attempt is allowed after `attempt` (0-indexed) failed
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts
    }
}

/// Execute `operation` until it succeeds, fails non-retryably, or the
/// attempt budget is spent. The last error is returned unchanged.
pub async fn with_retry<T, F, Fut, P>(
    config: &RetryConfig,
    clock: &dyn Clock,
    label: &str,
    is_retryable: P,
    mut operation: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&Error) -> bool,
{
    let mut attempt = 0u32;

    loop {
        match operation(attempt).await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !is_retryable(&e) {
                    debug!(label, attempt, error = %e, "Non-retryable error");
                    return Err(e);
                }
                if !config.should_retry(attempt) {
                    warn!(
                        label,
                        attempts = attempt + 1,
                        error = %e,
                        "Retry budget exhausted"
                    );
                    return Err(e);
                }

                let backoff = config.backoff_for_attempt(attempt);
                debug!(
                    label,
                    attempt,
                    max = config.max_attempts,
                    ?backoff,
                    error = %e,
                    "Retrying after backoff"
                );
                clock.sleep(backoff).await;
                attempt += 1;
            }
        }
    }
}
