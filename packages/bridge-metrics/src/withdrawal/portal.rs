//! Settlement-chain reads about withdrawals
//!
//! Storage reads (`finalizedWithdrawals`, `provenWithdrawals`), portal event
//! scans, and output-oracle lookups, all over the settlement chain's
//! rotating RPC client.

use alloy::primitives::{Address, B256, U256};
use alloy::rpc::types::Filter;
use alloy::sol_types::SolEvent;
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};
use crate::evm::{ChainReader, IL2OutputOracle, IOptimismPortal, OutputProposal};
use crate::rpc::{LogScanConfig, LogScanner};

#[derive(Clone)]
pub struct PortalView {
    reader: ChainReader,
    portal: Address,
    oracle: Address,
    default_challenge_period: u64,
    scan: LogScanConfig,
    lookback: u64,
}

impl PortalView {
    pub fn new(
        reader: ChainReader,
        portal: Address,
        oracle: Address,
        default_challenge_period: Duration,
        scan: LogScanConfig,
        lookback: u64,
    ) -> Self {
        Self {
            reader,
            portal,
            oracle,
            default_challenge_period: default_challenge_period.as_secs(),
            scan,
            lookback,
        }
    }

    pub fn reader(&self) -> &ChainReader {
        &self.reader
    }

    pub fn portal(&self) -> Address {
        self.portal
    }

    /// Oracle finalization period, or the configured default if unreadable
    pub async fn challenge_period(&self) -> u64 {
        match self
            .reader
            .view(None, self.oracle, &IL2OutputOracle::finalizationPeriodSecondsCall {})
            .await
        {
            Ok(ret) => u64::try_from(ret._0).unwrap_or(self.default_challenge_period),
            Err(e) => {
                debug!(error = %e, "Finalization period unreadable, using default");
                self.default_challenge_period
            }
        }
    }

    /// First output proposal covering `l2_block`, `None` if none is published yet
    pub async fn output_for_block(&self, l2_block: u64) -> Result<Option<(U256, OutputProposal)>> {
        let latest = self
            .reader
            .view(None, self.oracle, &IL2OutputOracle::latestBlockNumberCall {})
            .await?
            ._0;
        if latest < U256::from(l2_block) {
            return Ok(None);
        }

        let index = self
            .reader
            .view(
                None,
                self.oracle,
                &IL2OutputOracle::getL2OutputIndexAfterCall {
                    l2BlockNumber: U256::from(l2_block),
                },
            )
            .await?
            ._0;
        let output = self
            .reader
            .view(
                None,
                self.oracle,
                &IL2OutputOracle::getL2OutputCall {
                    l2OutputIndex: index,
                },
            )
            .await?
            ._0;
        Ok(Some((index, output)))
    }

    pub async fn is_finalized(&self, withdrawal_hash: B256) -> Result<bool> {
        let call = IOptimismPortal::finalizedWithdrawalsCall {
            withdrawalHash: withdrawal_hash,
        };
        Ok(self.reader.view(None, self.portal, &call).await?._0)
    }

    /// Proof timestamp from portal storage, `None` if unproven
    pub async fn proven_at(&self, withdrawal_hash: B256) -> Result<Option<u64>> {
        let call = IOptimismPortal::provenWithdrawalsCall {
            withdrawalHash: withdrawal_hash,
        };
        let ret = self.reader.view(None, self.portal, &call).await?;
        if ret.timestamp == 0 {
            return Ok(None);
        }
        u64::try_from(ret.timestamp)
            .map(Some)
            .map_err(|_| Error::Decode(format!("proof timestamp {}", ret.timestamp)))
    }

    fn filter<E: SolEvent>(&self, withdrawal_hash: B256) -> Filter {
        Filter::new()
            .address(self.portal)
            .event_signature(E::SIGNATURE_HASH)
            .topic1(withdrawal_hash)
    }

    /// Whether a `WithdrawalFinalized` event exists in the lookback range
    pub async fn finalized_event(&self, withdrawal_hash: B256) -> Result<bool> {
        let filter = self.filter::<IOptimismPortal::WithdrawalFinalized>(withdrawal_hash);
        let logs = LogScanner::new(self.reader.client(), self.scan.clone())
            .scan_recent(&filter, self.lookback)
            .await?;
        Ok(!logs.is_empty())
    }

    /// Block of the latest `WithdrawalProven` event in the lookback range
    pub async fn proven_event_block(&self, withdrawal_hash: B256) -> Result<Option<u64>> {
        let filter = self.filter::<IOptimismPortal::WithdrawalProven>(withdrawal_hash);
        let logs = LogScanner::new(self.reader.client(), self.scan.clone())
            .scan_recent(&filter, self.lookback)
            .await?;
        Ok(logs.last().and_then(|log| log.block_number))
    }

    pub async fn block_timestamp(&self, number: u64) -> Result<u64> {
        self.reader
            .block(number)
            .await?
            .map(|b| b.header.inner.timestamp)
            .ok_or_else(|| Error::Decode(format!("block {number} not found")))
    }
}
