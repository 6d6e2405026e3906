//! Time source and sleep seam
//!
//! Every delay (retry backoff, scan pacing, receipt polling) and every
//! wall-clock read (session TTL, challenge-period ETA, analytics windows)
//! goes through [`Clock`] so tests can advance time without waiting.

use async_trait::async_trait;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[async_trait]
pub trait Clock: Send + Sync {
    /// Suspend the calling operation for `duration`.
    async fn sleep(&self, duration: Duration);

    /// Milliseconds since the unix epoch.
    fn unix_millis(&self) -> u64;

    /// Seconds since the unix epoch.
    fn unix_now(&self) -> u64 {
        self.unix_millis() / 1000
    }
}

/// Wall clock backed by tokio timers
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn unix_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}
