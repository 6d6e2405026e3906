//! Status strategies
//!
//! A withdrawal's stage is resolved by an ordered chain of strategies. Each
//! one either concludes, reports no evidence (`Ok(None)`, try the next one),
//! or fails; a failure moves on to the next strategy only when that
//! strategy's `falls_through_on` accepts it, otherwise it ends resolution.

use alloy::primitives::B256;
use async_trait::async_trait;
use tracing::debug;

use super::portal::PortalView;
use super::status::WithdrawalStatus;
use crate::error::{Error, Result};

/// What a strategy knows about the withdrawal being resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusContext {
    pub l2_tx: B256,
    pub withdrawal_hash: B256,
    pub l2_block: u64,
    /// Unix seconds at resolution time
    pub now: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusFinding {
    pub status: WithdrawalStatus,
    pub proved_at: Option<u64>,
    pub challenge_period: Option<u64>,
}

impl StatusFinding {
    pub fn plain(status: WithdrawalStatus) -> Self {
        Self {
            status,
            proved_at: None,
            challenge_period: None,
        }
    }

    /// Proven at `proved_at`: finalizable once the challenge period has elapsed
    pub fn proven(proved_at: u64, challenge_period: u64, now: u64) -> Self {
        let status = if proved_at.saturating_add(challenge_period) <= now {
            WithdrawalStatus::ReadyToFinalize
        } else {
            WithdrawalStatus::WaitingToFinalize
        };
        Self {
            status,
            proved_at: Some(proved_at),
            challenge_period: Some(challenge_period),
        }
    }

    /// Seconds until the challenge period ends, 0 if not proven or already over
    pub fn eta(&self, now: u64) -> u64 {
        match (self.proved_at, self.challenge_period) {
            (Some(at), Some(period)) => at.saturating_add(period).saturating_sub(now),
            _ => 0,
        }
    }
}

#[async_trait]
pub trait StatusStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether `error` should hand resolution to the next strategy
    fn falls_through_on(&self, error: &Error) -> bool;

    async fn resolve(&self, ctx: &StatusContext) -> Result<Option<StatusFinding>>;
}

async fn output_probe(portal: &PortalView, l2_block: u64) -> Result<StatusFinding> {
    let status = match portal.output_for_block(l2_block).await? {
        Some(_) => WithdrawalStatus::ReadyToProve,
        None => WithdrawalStatus::WaitingToProve,
    };
    Ok(StatusFinding::plain(status))
}

// ============================================================================
// Portal storage
// ============================================================================

/// Reads the portal's withdrawal mappings directly; any failure falls through
pub struct PortalStorageStrategy {
    portal: PortalView,
}

impl PortalStorageStrategy {
    pub fn new(portal: PortalView) -> Self {
        Self { portal }
    }
}

#[async_trait]
impl StatusStrategy for PortalStorageStrategy {
    fn name(&self) -> &'static str {
        "portal-storage"
    }

    fn falls_through_on(&self, _error: &Error) -> bool {
        true
    }

    async fn resolve(&self, ctx: &StatusContext) -> Result<Option<StatusFinding>> {
        if self.portal.is_finalized(ctx.withdrawal_hash).await? {
            return Ok(Some(StatusFinding::plain(WithdrawalStatus::Finalized)));
        }
        if let Some(proved_at) = self.portal.proven_at(ctx.withdrawal_hash).await? {
            let period = self.portal.challenge_period().await;
            return Ok(Some(StatusFinding::proven(proved_at, period, ctx.now)));
        }
        output_probe(&self.portal, ctx.l2_block).await.map(Some)
    }
}

// ============================================================================
// Portal events
// ============================================================================

/// Looks for `WithdrawalFinalized` / `WithdrawalProven` events in the lookback range
pub struct PortalEventStrategy {
    portal: PortalView,
}

impl PortalEventStrategy {
    pub fn new(portal: PortalView) -> Self {
        Self { portal }
    }
}

#[async_trait]
impl StatusStrategy for PortalEventStrategy {
    fn name(&self) -> &'static str {
        "portal-events"
    }

    fn falls_through_on(&self, error: &Error) -> bool {
        error.is_transient()
    }

    async fn resolve(&self, ctx: &StatusContext) -> Result<Option<StatusFinding>> {
        if self.portal.finalized_event(ctx.withdrawal_hash).await? {
            return Ok(Some(StatusFinding::plain(WithdrawalStatus::Finalized)));
        }
        let Some(block) = self.portal.proven_event_block(ctx.withdrawal_hash).await? else {
            return Ok(None);
        };
        let proved_at = self.portal.block_timestamp(block).await?;
        let period = self.portal.challenge_period().await;
        Ok(Some(StatusFinding::proven(proved_at, period, ctx.now)))
    }
}

// ============================================================================
// Output root
// ============================================================================

/// Last resort: provable once an output covers the block, otherwise waiting
pub struct OutputRootStrategy {
    portal: PortalView,
}

impl OutputRootStrategy {
    pub fn new(portal: PortalView) -> Self {
        Self { portal }
    }
}

#[async_trait]
impl StatusStrategy for OutputRootStrategy {
    fn name(&self) -> &'static str {
        "output-root"
    }

    fn falls_through_on(&self, _error: &Error) -> bool {
        false
    }

    async fn resolve(&self, ctx: &StatusContext) -> Result<Option<StatusFinding>> {
        match output_probe(&self.portal, ctx.l2_block).await {
            Ok(finding) => Ok(Some(finding)),
            Err(e) => {
                debug!(l2_block = ctx.l2_block, error = %e, "Output lookup failed");
                Ok(Some(StatusFinding::plain(WithdrawalStatus::WaitingToProve)))
            }
        }
    }
}
