//! Withdrawal status resolution
//!
//! Resolution never fails outward: a missing receipt, a transaction that is
//! not a withdrawal, or a strategy error all resolve to `waiting-to-prove`,
//! the most conservative stage.

use alloy::primitives::{Address, B256};
use alloy::rpc::types::TransactionReceipt;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use super::portal::PortalView;
use super::status::{WithdrawalReport, WithdrawalStatus};
use super::strategy::{
    OutputRootStrategy, PortalEventStrategy, PortalStorageStrategy, StatusContext, StatusFinding,
    StatusStrategy,
};
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::evm::{ChainReader, RecordedEvent, WithdrawalMessage};

/// Distinct non-zero origin transfers, newest record first, at most `max`
pub fn recent_origins(events: &[RecordedEvent], max: usize) -> Vec<B256> {
    let mut sorted: Vec<&RecordedEvent> = events.iter().filter(|e| e.origin().is_some()).collect();
    sorted.sort_by(|a, b| b.block_number.cmp(&a.block_number));

    let mut seen = HashSet::new();
    sorted
        .into_iter()
        .map(|e| e.origin_tx)
        .filter(|tx| seen.insert(*tx))
        .take(max)
        .collect()
}

pub struct WithdrawalResolver {
    l2: ChainReader,
    message_passer: Address,
    strategies: Vec<Box<dyn StatusStrategy>>,
    clock: Arc<dyn Clock>,
}

impl WithdrawalResolver {
    /// Storage reads, then portal events, then the output-root probe
    pub fn new(l2: ChainReader, message_passer: Address, portal: PortalView, clock: Arc<dyn Clock>) -> Self {
        let strategies: Vec<Box<dyn StatusStrategy>> = vec![
            Box::new(PortalStorageStrategy::new(portal.clone())),
            Box::new(PortalEventStrategy::new(portal.clone())),
            Box::new(OutputRootStrategy::new(portal)),
        ];
        Self::with_strategies(l2, message_passer, strategies, clock)
    }

    pub fn with_strategies(
        l2: ChainReader,
        message_passer: Address,
        strategies: Vec<Box<dyn StatusStrategy>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            l2,
            message_passer,
            strategies,
            clock,
        }
    }

    pub fn l2(&self) -> &ChainReader {
        &self.l2
    }

    /// Receipt and withdrawal message of `l2_tx`
    pub async fn locate(&self, l2_tx: B256) -> Result<(TransactionReceipt, WithdrawalMessage)> {
        let receipt = self
            .l2
            .transaction_receipt(l2_tx)
            .await?
            .ok_or(Error::ReceiptNotFound(l2_tx))?;
        let message = WithdrawalMessage::find(receipt.inner.logs(), self.message_passer)
            .ok_or(Error::NotAWithdrawal(l2_tx))?;
        Ok((receipt, message))
    }

    async fn run_strategies(&self, ctx: &StatusContext) -> Result<StatusFinding> {
        for strategy in &self.strategies {
            match strategy.resolve(ctx).await {
                Ok(Some(finding)) => {
                    debug!(
                        l2_tx = %ctx.l2_tx,
                        strategy = strategy.name(),
                        status = %finding.status,
                        "Withdrawal status resolved"
                    );
                    return Ok(finding);
                }
                Ok(None) => {}
                Err(e) if strategy.falls_through_on(&e) => {
                    debug!(strategy = strategy.name(), error = %e, "Status strategy fell through");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(StatusFinding::plain(WithdrawalStatus::WaitingToProve))
    }

    /// Current stage of the withdrawal initiated by `l2_tx`
    pub async fn resolve(&self, l2_tx: B256) -> WithdrawalReport {
        let receipt = match self.l2.transaction_receipt(l2_tx).await {
            Ok(Some(receipt)) => receipt,
            Ok(None) => {
                warn!(l2_tx = %l2_tx, "Withdrawal receipt missing, assuming waiting-to-prove");
                return WithdrawalReport::waiting(l2_tx, 0);
            }
            Err(e) => {
                warn!(l2_tx = %l2_tx, error = %e, "Withdrawal receipt unreadable, assuming waiting-to-prove");
                return WithdrawalReport::waiting(l2_tx, 0);
            }
        };
        let l2_block = receipt.block_number.unwrap_or_default();

        let Some(message) = WithdrawalMessage::find(receipt.inner.logs(), self.message_passer) else {
            warn!(l2_tx = %l2_tx, "No withdrawal message in receipt, assuming waiting-to-prove");
            return WithdrawalReport::waiting(l2_tx, l2_block);
        };
        let withdrawal_hash = message.verified_hash();

        let now = self.clock.unix_now();
        let ctx = StatusContext {
            l2_tx,
            withdrawal_hash,
            l2_block,
            now,
        };

        match self.run_strategies(&ctx).await {
            Ok(finding) => WithdrawalReport {
                l2_tx,
                withdrawal_hash: Some(withdrawal_hash),
                l2_block,
                status: finding.status,
                proved_at: finding.proved_at,
                challenge_period: finding.challenge_period,
                eta_secs: finding.eta(now),
            },
            Err(e) => {
                warn!(l2_tx = %l2_tx, error = %e, "Status resolution failed, assuming waiting-to-prove");
                WithdrawalReport {
                    withdrawal_hash: Some(withdrawal_hash),
                    ..WithdrawalReport::waiting(l2_tx, l2_block)
                }
            }
        }
    }

    /// Resolve `origins` in order, drop finalized ones, newest L2 block first
    pub async fn pending_withdrawals(&self, origins: &[B256]) -> Vec<WithdrawalReport> {
        let mut reports = Vec::with_capacity(origins.len());
        for l2_tx in origins {
            let report = self.resolve(*l2_tx).await;
            if report.status.is_pending() {
                reports.push(report);
            }
        }
        reports.sort_by(|a, b| b.l2_block.cmp(&a.l2_block));
        reports
    }
}
