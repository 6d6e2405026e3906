//! Withdrawal lifecycle

use alloy::primitives::B256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage of an L2→L1 withdrawal, ordered by progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WithdrawalStatus {
    /// No output root covering the L2 block has been published yet
    WaitingToProve,
    ReadyToProve,
    /// Proven, challenge period still running
    WaitingToFinalize,
    ReadyToFinalize,
    Finalized,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::WaitingToProve => "waiting-to-prove",
            WithdrawalStatus::ReadyToProve => "ready-to-prove",
            WithdrawalStatus::WaitingToFinalize => "waiting-to-finalize",
            WithdrawalStatus::ReadyToFinalize => "ready-to-finalize",
            WithdrawalStatus::Finalized => "finalized",
        }
    }

    pub fn is_pending(&self) -> bool {
        *self != WithdrawalStatus::Finalized
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved state of one withdrawal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WithdrawalReport {
    /// Rollup transaction that initiated the withdrawal
    pub l2_tx: B256,
    pub withdrawal_hash: Option<B256>,
    /// 0 when the receipt could not be read
    pub l2_block: u64,
    pub status: WithdrawalStatus,
    /// Settlement-chain timestamp of the proof
    pub proved_at: Option<u64>,
    pub challenge_period: Option<u64>,
    /// Seconds until finalization opens, 0 when not waiting
    pub eta_secs: u64,
}

impl WithdrawalReport {
    /// Conservative report used whenever the status cannot be determined
    pub fn waiting(l2_tx: B256, l2_block: u64) -> Self {
        Self {
            l2_tx,
            withdrawal_hash: None,
            l2_block,
            status: WithdrawalStatus::WaitingToProve,
            proved_at: None,
            challenge_period: None,
            eta_secs: 0,
        }
    }

    pub fn eta_label(&self) -> Option<String> {
        format_eta(self.eta_secs)
    }
}

/// `~Ns` under 90 seconds, `~Nm` under 90 minutes, else `~Nh`, rounding up
pub fn format_eta(secs: u64) -> Option<String> {
    if secs == 0 {
        return None;
    }
    if secs < 90 {
        return Some(format!("~{secs}s"));
    }
    let minutes = secs.div_ceil(60);
    if minutes < 90 {
        return Some(format!("~{minutes}m"));
    }
    Some(format!("~{}h", minutes.div_ceil(60)))
}
