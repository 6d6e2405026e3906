//! Rolling-window analytics over decrypted history
//!
//! Recomputed in full on every refresh. Records whose amount could not be
//! decrypted are left out of every statistic and counted separately, so an
//! unreadable record never reads as a zero-value transfer.

use alloy::primitives::U256;
use serde::Serialize;

use crate::types::DecryptedRecord;

const DAY_SECS: u64 = 86_400;
const WEEK_SECS: u64 = 7 * DAY_SECS;

/// Transfer counts by size relative to the 7-day median and 90th percentile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SizeBuckets {
    /// Below the median
    pub small: usize,
    /// From the median up to (excluding) the 90th percentile
    pub medium: usize,
    /// At or above the 90th percentile
    pub large: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalyticsWindow {
    pub volume_24h: U256,
    pub volume_7d: U256,
    pub median_7d: U256,
    pub p90_7d: U256,
    pub buckets: SizeBuckets,
    /// Known-amount transfers in the 7-day window
    pub count_7d: usize,
    /// Records in the 7-day window whose amount is private
    pub unknown_7d: usize,
}

impl AnalyticsWindow {
    /// Statistics for records at or after `now - 24h` / `now - 7d`
    pub fn compute(records: &[DecryptedRecord], now: u64) -> Self {
        let day_ago = now.saturating_sub(DAY_SECS);
        let week_ago = now.saturating_sub(WEEK_SECS);

        let mut window = Self::default();
        let mut values_7d = Vec::new();

        for entry in records {
            let ts = entry.record.timestamp;
            if ts < week_ago {
                continue;
            }
            let Some(wei) = entry.amount.known() else {
                window.unknown_7d += 1;
                continue;
            };
            window.volume_7d += wei;
            if ts >= day_ago {
                window.volume_24h += wei;
            }
            values_7d.push(wei);
        }

        values_7d.sort_unstable();
        window.count_7d = values_7d.len();
        window.median_7d = median(&values_7d);
        window.p90_7d = percentile(&values_7d, 0.9);

        if !values_7d.is_empty() {
            for wei in &values_7d {
                if *wei < window.median_7d {
                    window.buckets.small += 1;
                } else if *wei < window.p90_7d {
                    window.buckets.medium += 1;
                } else {
                    window.buckets.large += 1;
                }
            }
        }

        window
    }
}

/// Median of sorted values; the mean of the middle two for even counts
pub fn median(sorted: &[U256]) -> U256 {
    let n = sorted.len();
    if n == 0 {
        return U256::ZERO;
    }
    let mid = n / 2;
    if n % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / U256::from(2)
    }
}

/// Nearest-rank percentile: element at `floor((n - 1) * p)`
pub fn percentile(sorted: &[U256], p: f64) -> U256 {
    let n = sorted.len();
    if n == 0 {
        return U256::ZERO;
    }
    let idx = (((n - 1) as f64) * p.clamp(0.0, 1.0)).floor() as usize;
    sorted[idx.min(n - 1)]
}

/// Whole-history totals for the connected wallet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PrivateTotals {
    /// Sum of decryptable amounts
    pub volume: U256,
    /// Number of records, decryptable or not
    pub count: u64,
    /// Records whose amount stayed private
    pub unknown: u64,
}

impl PrivateTotals {
    pub fn from_records(records: &[DecryptedRecord]) -> Self {
        let mut totals = Self {
            count: records.len() as u64,
            ..Self::default()
        };
        for entry in records {
            match entry.amount.known() {
                Some(wei) => totals.volume += wei,
                None => totals.unknown += 1,
            }
        }
        totals
    }
}
