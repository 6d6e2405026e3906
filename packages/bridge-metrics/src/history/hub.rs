//! Metrics hub access
//!
//! Reads go through the settlement chain's rotating RPC client with `from`
//! set to the connected account (the hub keys history by `msg.sender`).
//! Writes go through the wallet on the settlement chain; every confirmed
//! write drops the cached decryption session because it may change what the
//! account is allowed to decrypt.

use alloy::primitives::{Address, B256, U256};
use alloy::rpc::types::{Filter, TransactionReceipt};
use alloy::sol_types::SolEvent;
use std::sync::Arc;
use tracing::{debug, info};

use crate::confidential::{EncryptedInput, SessionCache};
use crate::config::{ChainConfig, GasLimits};
use crate::error::{Error, Result};
use crate::evm::{ChainReader, IMetricsHub, RecordedEvent};
use crate::rpc::{LogScanConfig, LogScanner};
use crate::types::{DirectionalPair, HistoryRecord};
use crate::wallet::{TxRequest, WalletClient};

pub struct MetricsHub {
    address: Address,
    chain: ChainConfig,
    reader: ChainReader,
    wallet: Arc<WalletClient>,
    sessions: Arc<SessionCache>,
    gas: GasLimits,
    scan: LogScanConfig,
}

impl MetricsHub {
    pub fn new(
        address: Address,
        chain: ChainConfig,
        reader: ChainReader,
        wallet: Arc<WalletClient>,
        sessions: Arc<SessionCache>,
        gas: GasLimits,
        scan: LogScanConfig,
    ) -> Self {
        Self {
            address,
            chain,
            reader,
            wallet,
            sessions,
            gas,
            scan,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn reader(&self) -> &ChainReader {
        &self.reader
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn history_length(&self, pair: DirectionalPair, user: Address) -> Result<u64> {
        let call = IMetricsHub::myHistoryLengthCall {
            srcChainId: pair.src,
            dstChainId: pair.dst,
        };
        let ret = self.reader.view(Some(user), self.address, &call).await?;
        u64::try_from(ret.length).map_err(|_| Error::Decode(format!("history length {}", ret.length)))
    }

    /// Records `[start, start + count)` in ascending index order
    pub async fn history(
        &self,
        pair: DirectionalPair,
        user: Address,
        start: u64,
        count: u64,
    ) -> Result<Vec<HistoryRecord>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let call = IMetricsHub::getMyHistoryCall {
            srcChainId: pair.src,
            dstChainId: pair.dst,
            start: U256::from(start),
            count: U256::from(count),
        };
        let ret = self.reader.view(Some(user), self.address, &call).await?;
        if ret.amounts.len() != ret.timestamps.len() {
            return Err(Error::Decode(format!(
                "getMyHistory returned {} amounts and {} timestamps",
                ret.amounts.len(),
                ret.timestamps.len()
            )));
        }

        Ok(ret
            .amounts
            .into_iter()
            .zip(ret.timestamps)
            .enumerate()
            .map(|(offset, (handle, timestamp))| HistoryRecord {
                index: start + offset as u64,
                handle,
                timestamp,
            })
            .collect())
    }

    /// Encrypted (volume, count) running totals of `user` for `pair`
    pub async fn totals(&self, pair: DirectionalPair, user: Address) -> Result<(B256, B256)> {
        let call = IMetricsHub::getTotalsCall {
            srcChainId: pair.src,
            dstChainId: pair.dst,
        };
        let ret = self.reader.view(Some(user), self.address, &call).await?;
        Ok((ret.totalVolumeWei, ret.txCount))
    }

    /// Publicly decryptable (volume, count) snapshot; zero handles if never published
    pub async fn public_snapshots(&self, pair: DirectionalPair) -> Result<(B256, B256)> {
        let call = IMetricsHub::getPublicSnapshotsCall {
            srcChainId: pair.src,
            dstChainId: pair.dst,
        };
        let ret = self.reader.view(None, self.address, &call).await?;
        Ok((ret.publicVolumeWei, ret.publicCount))
    }

    /// `Recorded` events of `user` for `pair` over the last `lookback` blocks
    pub async fn recorded_events(
        &self,
        pair: DirectionalPair,
        user: Address,
        lookback: u64,
    ) -> Result<Vec<RecordedEvent>> {
        let filter = Filter::new()
            .address(self.address)
            .event_signature(IMetricsHub::Recorded::SIGNATURE_HASH)
            .topic1(B256::from(U256::from(pair.src)))
            .topic2(B256::from(U256::from(pair.dst)))
            .topic3(user.into_word());

        let logs = LogScanner::new(self.reader.client(), self.scan.clone())
            .scan_recent(&filter, lookback)
            .await?;
        Ok(logs.iter().filter_map(RecordedEvent::from_log).collect())
    }

    // =========================================================================
    // Writes
    // =========================================================================

    async fn send(&self, tx: TxRequest) -> Result<TransactionReceipt> {
        self.wallet.ensure_chain(&self.chain).await?;
        let receipt = self.wallet.send_and_confirm(tx).await?;
        self.sessions.invalidate();
        Ok(receipt)
    }

    /// Append an encrypted amount to the caller's history
    pub async fn record(
        &self,
        pair: DirectionalPair,
        input: &EncryptedInput,
        origin: Option<B256>,
    ) -> Result<TransactionReceipt> {
        let call = IMetricsHub::recordCall {
            srcChainId: pair.src,
            dstChainId: pair.dst,
            amountWeiExt: input.handle,
            inputProof: input.input_proof.clone(),
            originTxHash: origin.unwrap_or_default(),
        };
        let receipt = self
            .send(TxRequest::call(self.address, &call).with_gas(self.gas.record))
            .await?;
        info!(
            pair = %pair,
            tx_hash = %receipt.transaction_hash,
            origin = ?origin,
            "Metric recorded"
        );
        Ok(receipt)
    }

    /// Publish the aggregate snapshot; `k` below 1 is raised to 1
    pub async fn publish(&self, pair: DirectionalPair, k: u64) -> Result<TransactionReceipt> {
        let call = IMetricsHub::publishCall {
            srcChainId: pair.src,
            dstChainId: pair.dst,
            kThreshold: k.max(1),
        };
        let receipt = self
            .send(TxRequest::call(self.address, &call).with_gas(self.gas.publish))
            .await?;
        info!(pair = %pair, k = k.max(1), tx_hash = %receipt.transaction_hash, "Snapshot published");
        Ok(receipt)
    }

    /// Authorize the caller to decrypt records `[start, end)`
    pub async fn grant_range(&self, pair: DirectionalPair, start: u64, end: u64) -> Result<TransactionReceipt> {
        let call = IMetricsHub::grantMyHistoryRangeCall {
            srcChainId: pair.src,
            dstChainId: pair.dst,
            start: U256::from(start),
            endExclusive: U256::from(end),
        };
        let receipt = self
            .send(TxRequest::call(self.address, &call).with_gas(self.gas.grant_range))
            .await?;
        info!(pair = %pair, start, end, "History decryption granted");
        Ok(receipt)
    }

    /// Authorize the caller for an explicit set of indices
    pub async fn grant_indices(&self, pair: DirectionalPair, indices: &[u64]) -> Result<TransactionReceipt> {
        let call = IMetricsHub::grantMyHistoryCall {
            srcChainId: pair.src,
            dstChainId: pair.dst,
            idxs: indices.iter().map(|i| U256::from(*i)).collect(),
        };
        self.send(TxRequest::call(self.address, &call).with_gas(self.gas.grant_range))
            .await
    }

    /// Re-grant the newest record; `None` when the history is empty
    pub async fn regrant_latest(&self, pair: DirectionalPair, user: Address) -> Result<Option<TransactionReceipt>> {
        let len = self.history_length(pair, user).await?;
        if len == 0 {
            return Ok(None);
        }
        debug!(pair = %pair, index = len - 1, "Re-granting latest record");
        let call = IMetricsHub::grantMyHistoryRangeCall {
            srcChainId: pair.src,
            dstChainId: pair.dst,
            start: U256::from(len - 1),
            endExclusive: U256::from(len),
        };
        let receipt = self
            .send(TxRequest::call(self.address, &call).with_gas(self.gas.regrant_latest))
            .await?;
        Ok(Some(receipt))
    }
}
