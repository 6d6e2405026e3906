//! Paged `eth_getLogs` over a bounded block range
//!
//! Windows are fetched sequentially. A transient failure halves the window
//! (down to a floor) and retries the same start block; any other failure, or
//! a transient one at the floor, skips the window. The scan itself never
//! fails: partial results beat no results.

use alloy::primitives::U64;
use alloy::rpc::types::{Filter, Log};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use super::fallback::RotatingClient;
use crate::error::Result;

/// Log scan tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogScanConfig {
    /// Initial window size in blocks
    pub initial_step: u64,
    /// Smallest window before a failing range is skipped
    pub min_step: u64,
    /// Pause after each successful window
    pub page_delay: Duration,
    /// Pause after a failed window
    pub failure_delay: Duration,
}

impl Default for LogScanConfig {
    fn default() -> Self {
        Self {
            initial_step: 9_000,
            min_step: 600,
            page_delay: Duration::from_millis(120),
            failure_delay: Duration::from_millis(250),
        }
    }
}

/// Sequential, self-throttling log scanner over one chain
pub struct LogScanner<'a> {
    client: &'a RotatingClient,
    config: LogScanConfig,
}

impl<'a> LogScanner<'a> {
    pub fn new(client: &'a RotatingClient, config: LogScanConfig) -> Self {
        Self { client, config }
    }

    /// Scan `[from_block, to_block]` inclusive; the filter's own block range is ignored
    pub async fn scan(&self, filter: &Filter, from_block: u64, to_block: u64) -> Vec<Log> {
        let clock = self.client.clock().clone();
        let chain = self.client.endpoints().label().to_string();
        let mut logs = Vec::new();
        let mut step = self.config.initial_step.max(1);
        let mut start = from_block;

        while start <= to_block {
            let end = to_block.min(start.saturating_add(step - 1));

            let window = filter.clone().from_block(start).to_block(end);
            match self.client.call::<Vec<Log>>("eth_getLogs", json!([window])).await {
                Ok(page) => {
                    debug!(chain = %chain, from = start, to = end, count = page.len(), "Log window fetched");
                    logs.extend(page);
                    start = end + 1;
                    clock.sleep(self.config.page_delay).await;
                }
                Err(e) if e.is_transient() && step > self.config.min_step => {
                    step = self.config.min_step.max(step / 2);
                    debug!(chain = %chain, from = start, step, error = %e, "Shrinking log window");
                    clock.sleep(self.config.failure_delay).await;
                }
                Err(e) => {
                    warn!(
                        chain = %chain,
                        from = start,
                        to = end,
                        error = %e,
                        "Skipping log window"
                    );
                    start = end + 1;
                    clock.sleep(self.config.failure_delay).await;
                }
            }
        }

        logs
    }

    /// Scan the last `lookback` blocks up to the current head
    pub async fn scan_recent(&self, filter: &Filter, lookback: u64) -> Result<Vec<Log>> {
        let head: U64 = self.client.call("eth_blockNumber", json!([])).await?;
        let head = head.to::<u64>();
        let from = head.saturating_sub(lookback);
        Ok(self.scan(filter, from, head).await)
    }
}
