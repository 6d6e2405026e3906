//! Proving and finalizing withdrawals on the settlement chain
//!
//! Proof construction needs `eth_getProof` on the rollup, which public
//! endpoints often lack or rate-limit; it rotates across the rollup URLs on
//! any proof-related failure.

use alloy::primitives::{Address, Bytes, B256, U256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::portal::PortalView;
use super::resolver::WithdrawalResolver;
use super::status::{WithdrawalReport, WithdrawalStatus};
use crate::clock::Clock;
use crate::config::ChainConfig;
use crate::error::{Error, Result};
use crate::evm::{
    message_slot, output_root, ChainReader, IOptimismPortal, OutputRootProof,
    WithdrawalTransaction,
};
use crate::wallet::{TxRequest, WalletClient};

/// Arguments of `proveWithdrawalTransaction`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProveArgs {
    pub transaction: WithdrawalTransaction,
    pub output_index: U256,
    pub output_root_proof: OutputRootProof,
    pub withdrawal_proof: Vec<Bytes>,
}

/// Outcome of finalizing every ready withdrawal
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinalizeSummary {
    /// (rollup tx, settlement finalize tx)
    pub finalized: Vec<(B256, B256)>,
    /// (rollup tx, short error)
    pub failed: Vec<(B256, String)>,
}

pub struct WithdrawalProver {
    resolver: Arc<WithdrawalResolver>,
    portal: PortalView,
    wallet: Arc<WalletClient>,
    settlement: ChainConfig,
    message_passer: Address,
    clock: Arc<dyn Clock>,
    finalize_pause: Duration,
}

impl WithdrawalProver {
    pub fn new(
        resolver: Arc<WithdrawalResolver>,
        portal: PortalView,
        wallet: Arc<WalletClient>,
        settlement: ChainConfig,
        message_passer: Address,
        clock: Arc<dyn Clock>,
        finalize_pause: Duration,
    ) -> Self {
        Self {
            resolver,
            portal,
            wallet,
            settlement,
            message_passer,
            clock,
            finalize_pause,
        }
    }

    fn l2(&self) -> &ChainReader {
        self.resolver.l2()
    }

    /// Build the proof for the withdrawal initiated by `l2_tx`
    pub async fn build_proof(&self, l2_tx: B256) -> Result<ProveArgs> {
        let (receipt, message) = self.resolver.locate(l2_tx).await?;
        let withdrawal_hash = message.verified_hash();

        let l2_block = receipt.block_number.unwrap_or_default();
        let (output_index, output) = self
            .portal
            .output_for_block(l2_block)
            .await?
            .ok_or(Error::OutputNotPublished(l2_block))?;
        let proof_block = u64::try_from(output.l2BlockNumber)
            .map_err(|_| Error::Decode(format!("output block {}", output.l2BlockNumber)))?;

        let l2 = self.l2();
        let passer = self.message_passer;
        let slot = message_slot(withdrawal_hash);

        let (block, proof) = l2
            .client()
            .with_rotation(Error::is_proof_issue, |url| async move {
                let block = l2
                    .block_at(&url, proof_block)
                    .await?
                    .ok_or_else(|| Error::Decode(format!("L2 block {proof_block} not found")))?;
                let proof = l2.proof_at(&url, passer, &[slot], proof_block).await?;
                Ok((block, proof))
            })
            .await?;

        let output_root_proof = OutputRootProof {
            version: B256::ZERO,
            stateRoot: block.header.inner.state_root,
            messagePasserStorageRoot: proof.storage_hash,
            latestBlockhash: block.header.hash,
        };
        let computed = output_root(&output_root_proof);
        if computed != output.outputRoot {
            warn!(
                l2_tx = %l2_tx,
                published = %output.outputRoot,
                computed = %computed,
                "Output root mismatch"
            );
        }

        let withdrawal_proof = proof
            .storage_proof
            .into_iter()
            .next()
            .map(|p| p.proof)
            .ok_or_else(|| Error::Decode("eth_getProof returned no storage proof".into()))?;

        Ok(ProveArgs {
            transaction: message.to_transaction(),
            output_index,
            output_root_proof,
            withdrawal_proof,
        })
    }

    /// Prove on the settlement chain; returns the proving transaction
    pub async fn prove(&self, l2_tx: B256) -> Result<B256> {
        let args = self.build_proof(l2_tx).await?;
        self.wallet.ensure_chain(&self.settlement).await?;

        let call = IOptimismPortal::proveWithdrawalTransactionCall {
            _tx: args.transaction,
            _l2OutputIndex: args.output_index,
            _outputRootProof: args.output_root_proof,
            _withdrawalProof: args.withdrawal_proof,
        };
        let receipt = self
            .wallet
            .send_and_confirm(TxRequest::call(self.portal.portal(), &call))
            .await?;
        info!(l2_tx = %l2_tx, tx_hash = %receipt.transaction_hash, "Withdrawal proven");
        Ok(receipt.transaction_hash)
    }

    async fn send_finalize(&self, l2_tx: B256) -> Result<B256> {
        self.wallet.ensure_chain(&self.settlement).await?;
        let (_, message) = self.resolver.locate(l2_tx).await?;
        let call = IOptimismPortal::finalizeWithdrawalTransactionCall {
            _tx: message.to_transaction(),
        };
        let receipt = self
            .wallet
            .send_and_confirm(TxRequest::call(self.portal.portal(), &call))
            .await?;
        info!(l2_tx = %l2_tx, tx_hash = %receipt.transaction_hash, "Withdrawal finalized");
        Ok(receipt.transaction_hash)
    }

    /// Finalize one withdrawal; warns but proceeds if it does not look ready
    pub async fn finalize(&self, l2_tx: B256) -> Result<B256> {
        let report = self.resolver.resolve(l2_tx).await;
        if report.status != WithdrawalStatus::ReadyToFinalize {
            warn!(l2_tx = %l2_tx, status = %report.status, "Withdrawal may not be finalizable yet");
        }
        self.send_finalize(l2_tx).await
    }

    /// Finalize each ready report in turn; one failure does not stop the rest
    pub async fn finalize_ready(&self, reports: &[WithdrawalReport]) -> FinalizeSummary {
        let mut summary = FinalizeSummary::default();
        let ready = reports
            .iter()
            .filter(|r| r.status == WithdrawalStatus::ReadyToFinalize);

        for report in ready {
            match self.send_finalize(report.l2_tx).await {
                Ok(tx) => summary.finalized.push((report.l2_tx, tx)),
                Err(e) => {
                    warn!(l2_tx = %report.l2_tx, error = %e, "Finalize failed");
                    summary.failed.push((report.l2_tx, e.short_message()));
                }
            }
            self.clock.sleep(self.finalize_pause).await;
        }

        summary
    }
}
