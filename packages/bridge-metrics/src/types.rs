//! Common types for the two tracked bridge directions
//!
//! A [`DirectionalPair`] (source chain id, destination chain id) is the
//! compound key of every metrics-hub read and write; [`Direction`] names the
//! two pairs the dashboard tracks.

use alloy::primitives::{utils::format_ether, utils::parse_ether, B256, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Fraction digits kept when rendering ETH amounts
const DISPLAY_DECIMALS: usize = 6;

// ============================================================================
// Directions
// ============================================================================

/// One of the two tracked transfer directions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Settlement chain (L1) → rollup (L2), via deposit
    Deposit,
    /// Rollup (L2) → settlement chain (L1), via withdrawal
    Withdraw,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Deposit, Direction::Withdraw];

    /// Short label used by the dashboard ("S→B" / "B→S")
    pub fn label(&self) -> &'static str {
        match self {
            Direction::Deposit => "S→B",
            Direction::Withdraw => "B→S",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// (source chain id, destination chain id) key for hub reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirectionalPair {
    pub src: u32,
    pub dst: u32,
}

impl DirectionalPair {
    pub fn new(src: u32, dst: u32) -> Self {
        Self { src, dst }
    }
}

impl fmt::Display for DirectionalPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}→{}", self.src, self.dst)
    }
}

// ============================================================================
// History
// ============================================================================

/// One append-only entry of a wallet's on-chain history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRecord {
    /// Sequential index within (pair, wallet)
    pub index: u64,
    /// Ciphertext handle of the recorded amount
    pub handle: B256,
    /// Unix seconds at which the record was appended
    pub timestamp: u64,
}

/// A history record joined with its decrypted amount
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedRecord {
    pub record: HistoryRecord,
    pub amount: Amount,
}

/// A decrypted amount, or a record the wallet cannot read.
///
/// `Private` is never folded into zero: aggregates skip it and count it
/// separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "wei")]
pub enum Amount {
    Known(U256),
    Private,
}

impl Amount {
    pub fn known(&self) -> Option<U256> {
        match self {
            Amount::Known(v) => Some(*v),
            Amount::Private => None,
        }
    }

    pub fn is_private(&self) -> bool {
        matches!(self, Amount::Private)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Amount::Known(wei) => write!(f, "{} ETH", format_eth(*wei)),
            Amount::Private => f.write_str("private"),
        }
    }
}

// ============================================================================
// Formatting and parsing helpers
// ============================================================================

/// `0x12345678…abcdef` form used in lists
pub fn short_hash(hash: &B256) -> String {
    let full = format!("0x{}", hex::encode(hash));
    format!("{}…{}", &full[..10], &full[full.len() - 6..])
}

/// Render wei as ETH with at most six fraction digits
pub fn format_eth(wei: U256) -> String {
    let full = format_ether(wei);
    let (int, frac) = full.split_once('.').unwrap_or((full.as_str(), ""));
    let frac: String = frac.chars().take(DISPLAY_DECIMALS).collect();
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        int.to_string()
    } else {
        format!("{int}.{frac}")
    }
}

/// Calendar date (UTC) of a unix timestamp, `YYYY-MM-DD`
pub fn date_only(timestamp: u64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp as i64, 0)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "—".to_string())
}

/// Parse a user-typed ETH amount.
///
/// Accepts `,` as the decimal separator and ignores whitespace; the result
/// must be strictly positive.
pub fn parse_eth_relaxed(input: &str) -> Result<U256> {
    let normalized: String = input
        .trim()
        .replacen(',', ".", 1)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    if !is_decimal_literal(&normalized) {
        return Err(Error::InvalidAmount("Enter a valid amount".into()));
    }

    let wei = parse_ether(&normalized)
        .map_err(|e| Error::InvalidAmount(format!("Enter a valid amount: {e}")))?;
    if wei.is_zero() {
        return Err(Error::InvalidAmount("Amount must be > 0".into()));
    }
    Ok(wei)
}

/// `^\d*\.?\d+$`
fn is_decimal_literal(s: &str) -> bool {
    let mut dots = 0;
    for c in s.chars() {
        match c {
            '0'..='9' => {}
            '.' => dots += 1,
            _ => return false,
        }
    }
    dots <= 1 && s.chars().last().is_some_and(|c| c.is_ascii_digit())
}
