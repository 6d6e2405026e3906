//! Tail pagination over the append-only history
//!
//! Page 1 is the newest `page_size` records. Each fetched window is
//! decrypted handle by handle; if any handle is refused, the smallest
//! contiguous index range covering the refusals is granted on chain and the
//! refused handles are decrypted once more. Whatever still fails stays
//! [`Amount::Private`].

use alloy::primitives::{Address, B256};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::hub::MetricsHub;
use super::provenance::ProvenanceIndex;
use crate::clock::Clock;
use crate::confidential::ConfidentialReader;
use crate::error::Result;
use crate::types::{Amount, DecryptedRecord, DirectionalPair, HistoryRecord};

// ============================================================================
// Page windows
// ============================================================================

/// `[start, start + count)` slice of a history of `total` records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageWindow {
    /// 1-based page, clamped to `[1, pages]`
    pub page: u64,
    pub pages: u64,
    pub total: u64,
    pub start: u64,
    pub count: u64,
}

impl PageWindow {
    pub fn compute(total: u64, page: u64, page_size: u64) -> Self {
        let page_size = page_size.max(1);
        let pages = total.div_ceil(page_size).max(1);
        let page = page.clamp(1, pages);
        let end = total.saturating_sub((page - 1) * page_size);
        let start = end.saturating_sub(page_size);
        Self {
            page,
            pages,
            total,
            start,
            count: end - start,
        }
    }

    pub fn end(&self) -> u64 {
        self.start + self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

// ============================================================================
// Rows
// ============================================================================

/// One displayed history row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryRow {
    pub index: u64,
    pub timestamp: u64,
    pub amount: Amount,
    /// Origin transfer, else the recording transaction; `None` when unknown
    pub tx_hash: Option<B256>,
}

/// A rendered page, rows newest-first
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryPage {
    pub window: PageWindow,
    pub rows: Vec<HistoryRow>,
}

// ============================================================================
// Paginator
// ============================================================================

pub struct HistoryPaginator {
    hub: Arc<MetricsHub>,
    reader: Arc<ConfidentialReader>,
    clock: Arc<dyn Clock>,
    page_size: u64,
    bulk_delay: Duration,
    provenance_lookback: u64,
}

impl HistoryPaginator {
    pub fn new(
        hub: Arc<MetricsHub>,
        reader: Arc<ConfidentialReader>,
        clock: Arc<dyn Clock>,
        page_size: u64,
        bulk_delay: Duration,
        provenance_lookback: u64,
    ) -> Self {
        Self {
            hub,
            reader,
            clock,
            page_size: page_size.max(1),
            bulk_delay,
            provenance_lookback,
        }
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Fetch and decrypt `[start, start + count)`, ascending, healing refusals once
    pub async fn read_range(
        &self,
        pair: DirectionalPair,
        user: Address,
        start: u64,
        count: u64,
    ) -> Result<Vec<DecryptedRecord>> {
        let records = self.hub.history(pair, user, start, count).await?;
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let handles: Vec<B256> = records.iter().map(|r| r.handle).collect();
        let mut outcome = self.reader.decrypt_batch(&handles).await?;

        if !outcome.failed.is_empty() {
            let failed = outcome.failed.clone();
            if self.heal(pair, &records, &failed).await {
                let retry_handles: Vec<B256> = failed.iter().map(|&i| handles[i]).collect();
                match self.reader.decrypt_batch(&retry_handles).await {
                    Ok(retry) => {
                        for (slot, amount) in failed.iter().zip(retry.amounts) {
                            outcome.amounts[*slot] = amount;
                        }
                        outcome.failed = retry.failed.iter().map(|&k| failed[k]).collect();
                    }
                    Err(e) if e.is_user_rejection() => {
                        debug!(pair = %pair, "Signature declined after grant");
                    }
                    Err(e) => {
                        warn!(pair = %pair, error = %e, "Decrypt retry after grant failed");
                    }
                }
            }
            if !outcome.failed.is_empty() {
                debug!(pair = %pair, unknown = outcome.failed.len(), "Records left private");
            }
        }

        Ok(records
            .into_iter()
            .zip(outcome.amounts)
            .map(|(record, amount)| DecryptedRecord { record, amount })
            .collect())
    }

    /// Grant the contiguous span covering `failed`; `true` if the grant landed
    async fn heal(&self, pair: DirectionalPair, records: &[HistoryRecord], failed: &[usize]) -> bool {
        let (Some(&first), Some(&last)) = (failed.iter().min(), failed.iter().max()) else {
            return false;
        };
        let (lo, hi) = (records[first].index, records[last].index + 1);

        info!(pair = %pair, start = lo, end = hi, "Decryption refused, requesting grant");
        match self.hub.grant_range(pair, lo, hi).await {
            Ok(_) => true,
            Err(e) if e.is_user_rejection() => {
                debug!(pair = %pair, "Grant declined by user");
                false
            }
            Err(e) => {
                warn!(pair = %pair, start = lo, end = hi, error = %e, "Grant failed");
                false
            }
        }
    }

    /// One page of history, newest-first, with provenance links
    pub async fn page(&self, pair: DirectionalPair, user: Address, page: u64) -> Result<HistoryPage> {
        let total = self.hub.history_length(pair, user).await?;
        let window = PageWindow::compute(total, page, self.page_size);
        if window.is_empty() {
            return Ok(HistoryPage {
                window,
                rows: Vec::new(),
            });
        }

        let decrypted = self.read_range(pair, user, window.start, window.count).await?;
        let provenance =
            ProvenanceIndex::load(&self.hub, pair, user, self.provenance_lookback).await;

        let rows = decrypted
            .into_iter()
            .rev()
            .map(|d| HistoryRow {
                index: d.record.index,
                timestamp: d.record.timestamp,
                amount: d.amount,
                tx_hash: provenance.tx_for(d.record.index),
            })
            .collect();

        Ok(HistoryPage { window, rows })
    }

    /// The newest `n` records, newest-first
    pub async fn read_last(&self, pair: DirectionalPair, user: Address, n: u64) -> Result<Vec<DecryptedRecord>> {
        let total = self.hub.history_length(pair, user).await?;
        let start = total.saturating_sub(n);
        let mut records = self.read_range(pair, user, start, total - start).await?;
        records.reverse();
        Ok(records)
    }

    /// Entire history in ascending order, `chunk` records per read
    pub async fn read_all(&self, pair: DirectionalPair, user: Address, chunk: u64) -> Result<Vec<DecryptedRecord>> {
        let chunk = chunk.max(1);
        let total = self.hub.history_length(pair, user).await?;
        let mut all = Vec::with_capacity(total as usize);

        let mut start = 0;
        while start < total {
            let count = chunk.min(total - start);
            all.extend(self.read_range(pair, user, start, count).await?);
            start += count;
            if start < total {
                self.clock.sleep(self.bulk_delay).await;
            }
        }

        debug!(pair = %pair, total, "Full history read");
        Ok(all)
    }
}
