//! Bridge orchestrator
//!
//! Composes the wallet, the chain readers, the metrics hub and the
//! withdrawal machinery into the operations the dashboard exposes. Each
//! operation re-derives its state from the chains; nothing is cached here
//! besides the decryption session owned by the confidential reader.

use alloy::primitives::{Address, B256, U256};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::analytics::{AnalyticsWindow, PrivateTotals};
use crate::clock::{Clock, SystemClock};
use crate::confidential::{ConfidentialReader, Relayer, SessionCache};
use crate::config::{ChainConfig, Config};
use crate::error::{Error, Result};
use crate::evm::{ChainReader, IL1StandardBridge, IL2StandardBridge};
use crate::history::{HistoryPage, HistoryPaginator, MetricsHub};
use crate::rpc::{EndpointSet, HttpTransport, RetryConfig, RotatingClient, RpcTransport};
use crate::types::{parse_eth_relaxed, Direction};
use crate::wallet::{Eip1193Provider, TxRequest, WalletClient};
use crate::withdrawal::{
    recent_origins, FinalizeSummary, PortalView, WithdrawalProver, WithdrawalReport,
    WithdrawalResolver,
};

/// A bridge transfer and the metric recorded for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeTransfer {
    pub direction: Direction,
    pub amount: U256,
    /// Deposit or withdrawal transaction
    pub transfer_tx: B256,
    /// Hub `record` transaction; `None` if recording failed or was declined
    pub metric_tx: Option<B256>,
}

fn chain_reader(
    chain: &ChainConfig,
    transport: &Arc<dyn RpcTransport>,
    retry: &RetryConfig,
    clock: &Arc<dyn Clock>,
) -> Result<ChainReader> {
    Ok(ChainReader::new(RotatingClient::new(
        EndpointSet::from_chain(chain)?,
        transport.clone(),
        retry.clone(),
        clock.clone(),
    )))
}

pub struct BridgeOrchestrator {
    config: Config,
    clock: Arc<dyn Clock>,
    wallet: Arc<WalletClient>,
    l1: ChainReader,
    l2: ChainReader,
    hub: Arc<MetricsHub>,
    reader: Arc<ConfidentialReader>,
    paginator: HistoryPaginator,
    resolver: Arc<WithdrawalResolver>,
    prover: WithdrawalProver,
}

impl BridgeOrchestrator {
    pub fn new(
        config: Config,
        transport: Arc<dyn RpcTransport>,
        provider: Arc<dyn Eip1193Provider>,
        relayer: Arc<dyn Relayer>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let l1 = chain_reader(&config.l1, &transport, &config.retry, &clock)?;
        let l2 = chain_reader(&config.l2, &transport, &config.retry, &clock)?;
        let contracts = &config.contracts;

        let wallet = Arc::new(WalletClient::new(provider, clock.clone(), &config));
        let sessions = Arc::new(SessionCache::new(config.session_ttl));

        let hub = Arc::new(MetricsHub::new(
            contracts.metrics_hub,
            config.l1.clone(),
            l1.clone(),
            wallet.clone(),
            sessions.clone(),
            config.gas,
            config.history_scan.clone(),
        ));
        let reader = Arc::new(ConfidentialReader::new(
            relayer,
            wallet.clone(),
            clock.clone(),
            sessions,
            contracts.metrics_hub,
            config.authorization_validity_days,
        ));
        let paginator = HistoryPaginator::new(
            hub.clone(),
            reader.clone(),
            clock.clone(),
            config.page_size,
            config.bulk_page_delay,
            config.recorded_lookback,
        );

        let portal = PortalView::new(
            l1.clone(),
            contracts.optimism_portal,
            contracts.l2_output_oracle,
            config.challenge_period,
            config.portal_scan.clone(),
            config.recorded_lookback,
        );
        let resolver = Arc::new(WithdrawalResolver::new(
            l2.clone(),
            contracts.l2_to_l1_message_passer,
            portal.clone(),
            clock.clone(),
        ));
        let prover = WithdrawalProver::new(
            resolver.clone(),
            portal,
            wallet.clone(),
            config.l1.clone(),
            contracts.l2_to_l1_message_passer,
            clock.clone(),
            config.finalize_pause,
        );

        info!(
            l1 = %config.l1.name,
            l2 = %config.l2.name,
            hub = %contracts.metrics_hub,
            "Bridge orchestrator ready"
        );

        Ok(Self {
            config,
            clock,
            wallet,
            l1,
            l2,
            hub,
            reader,
            paginator,
            resolver,
            prover,
        })
    }

    /// Orchestrator over HTTP JSON-RPC and the system clock
    pub fn with_http(
        config: Config,
        provider: Arc<dyn Eip1193Provider>,
        relayer: Arc<dyn Relayer>,
    ) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(config.rpc_timeout)?);
        Self::new(config, transport, provider, relayer, Arc::new(SystemClock))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn wallet(&self) -> &Arc<WalletClient> {
        &self.wallet
    }

    pub fn hub(&self) -> &Arc<MetricsHub> {
        &self.hub
    }

    pub fn paginator(&self) -> &HistoryPaginator {
        &self.paginator
    }

    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect the wallet and check the deployment it will talk to
    pub async fn connect(&self) -> Result<Address> {
        let account = self.wallet.connect().await?;
        self.verify_deployment().await?;
        Ok(account)
    }

    /// The KMS and the metrics hub must both have code on the settlement chain
    pub async fn verify_deployment(&self) -> Result<()> {
        let contracts = &self.config.contracts;
        for (label, address) in [("KMS", contracts.kms), ("Contract", contracts.metrics_hub)] {
            let code = self.l1.code(address).await?;
            if code.is_empty() {
                warn!(label, address = %address, "No code at deployment address");
                return Err(Error::ContractNotFound { label, address });
            }
        }
        debug!(chain = %self.config.l1.name, "Deployment verified");
        Ok(())
    }

    pub fn disconnect(&self) {
        self.wallet.disconnect();
        self.reader.invalidate_session();
    }

    fn reader_for(&self, direction: Direction) -> &ChainReader {
        match direction {
            Direction::Deposit => &self.l1,
            Direction::Withdraw => &self.l2,
        }
    }

    // =========================================================================
    // Balances
    // =========================================================================

    /// Balance on the chain funding `direction`
    pub async fn balance(&self, direction: Direction) -> Result<U256> {
        let account = self.wallet.account().await?;
        self.reader_for(direction).balance(account).await
    }

    /// Balance minus the gas buffer, never negative
    pub async fn max_spendable(&self, direction: Direction) -> Result<U256> {
        let balance = self.balance(direction).await?;
        Ok(balance.saturating_sub(self.config.gas_buffer_wei))
    }

    // =========================================================================
    // Transfers
    // =========================================================================

    /// Deposit ETH from the settlement chain to the rollup, then record it
    pub async fn deposit(&self, input: &str) -> Result<BridgeTransfer> {
        let amount = parse_eth_relaxed(input)?;
        self.wallet.ensure_chain(&self.config.l1).await?;

        let call = IL1StandardBridge::depositETHCall {
            minGasLimit: self.config.gas.bridge_min_gas,
            extraData: Default::default(),
        };
        let tx = TxRequest::call(self.config.contracts.l1_standard_bridge, &call).with_value(amount);
        let receipt = self.wallet.send_and_confirm(tx).await?;
        info!(amount = %amount, tx_hash = %receipt.transaction_hash, "Deposit confirmed");

        let metric_tx = self
            .record_best_effort(Direction::Deposit, amount, receipt.transaction_hash)
            .await;
        Ok(BridgeTransfer {
            direction: Direction::Deposit,
            amount,
            transfer_tx: receipt.transaction_hash,
            metric_tx,
        })
    }

    /// Initiate a withdrawal from the rollup, then record it on the settlement chain
    pub async fn withdraw(&self, input: &str) -> Result<BridgeTransfer> {
        let amount = parse_eth_relaxed(input)?;
        self.wallet.ensure_chain(&self.config.l2).await?;

        let account = self.wallet.account().await?;
        let balance = self.l2.balance(account).await?;
        if balance < amount {
            return Err(Error::InsufficientBalance {
                have: balance,
                need: amount,
            });
        }

        let contracts = &self.config.contracts;
        let gas = &self.config.gas;
        let withdraw_to = IL2StandardBridge::withdrawToCall {
            l2Token: contracts.l2_eth_token,
            to: account,
            amount,
            minGasLimit: gas.bridge_min_gas,
            extraData: Default::default(),
        };
        let request = TxRequest::call(contracts.l2_standard_bridge, &withdraw_to)
            .with_value(amount)
            .with_gas(gas.withdraw);

        let receipt = match self.wallet.send_and_confirm(request).await {
            Ok(receipt) => receipt,
            Err(e) if e.is_user_rejection() => return Err(e),
            Err(e) => {
                warn!(error = %e, "withdrawTo failed, falling back to withdraw");
                let plain = IL2StandardBridge::withdrawCall {
                    l2Token: contracts.l2_eth_token,
                    amount,
                    minGasLimit: gas.bridge_min_gas,
                    extraData: Default::default(),
                };
                let request = TxRequest::call(contracts.l2_standard_bridge, &plain)
                    .with_value(amount)
                    .with_gas(gas.withdraw);
                self.wallet.send_and_confirm(request).await?
            }
        };
        info!(amount = %amount, tx_hash = %receipt.transaction_hash, "Withdrawal initiated");

        self.wallet.ensure_chain(&self.config.l1).await?;
        let metric_tx = self
            .record_best_effort(Direction::Withdraw, amount, receipt.transaction_hash)
            .await;
        Ok(BridgeTransfer {
            direction: Direction::Withdraw,
            amount,
            transfer_tx: receipt.transaction_hash,
            metric_tx,
        })
    }

    async fn record_best_effort(&self, direction: Direction, amount: U256, origin: B256) -> Option<B256> {
        match self.record_metric(direction, amount, Some(origin)).await {
            Ok(tx) => Some(tx),
            Err(e) if e.is_user_rejection() => {
                debug!(direction = %direction, "Metric recording declined");
                None
            }
            Err(e) => {
                warn!(direction = %direction, origin = %origin, error = %e, "Metric recording failed");
                None
            }
        }
    }

    // =========================================================================
    // Metrics
    // =========================================================================

    /// Encrypt `amount` and append it to the caller's history for `direction`.
    ///
    /// The newest record is re-granted afterwards so it decrypts without a
    /// heal round; a failed re-grant is only logged.
    pub async fn record_metric(
        &self,
        direction: Direction,
        amount: U256,
        origin: Option<B256>,
    ) -> Result<B256> {
        let pair = self.config.pair(direction);
        let account = self.wallet.account().await?;
        let input = self.reader.encrypt_amount(amount).await?;
        let receipt = self.hub.record(pair, &input, origin).await?;

        match self.hub.regrant_latest(pair, account).await {
            Ok(_) => {}
            Err(e) if e.is_user_rejection() => debug!(pair = %pair, "Re-grant declined"),
            Err(e) => warn!(pair = %pair, error = %e, "Re-grant of latest record failed"),
        }
        self.reader.invalidate_session();
        Ok(receipt.transaction_hash)
    }

    /// Publish the aggregate snapshot for `direction`
    pub async fn publish(&self, direction: Direction, k: u64) -> Result<B256> {
        let receipt = self.hub.publish(self.config.pair(direction), k).await?;
        Ok(receipt.transaction_hash)
    }

    /// Publicly decrypted volume snapshot; zero when unpublished or unreadable
    pub async fn public_volume(&self, direction: Direction) -> U256 {
        let pair = self.config.pair(direction);
        let handle = match self.hub.public_snapshots(pair).await {
            Ok((volume, _)) => volume,
            Err(e) => {
                warn!(pair = %pair, error = %e, "Public snapshot read failed");
                return U256::ZERO;
            }
        };
        match self.reader.public_decrypt(handle).await {
            Ok(volume) => volume,
            Err(e) => {
                warn!(pair = %pair, error = %e, "Public snapshot decryption failed");
                U256::ZERO
            }
        }
    }

    /// Encrypted (volume, count) handles of the caller's running totals
    pub async fn encrypted_totals(&self, direction: Direction) -> Result<(B256, B256)> {
        let account = self.wallet.account().await?;
        self.hub.totals(self.config.pair(direction), account).await
    }

    /// Totals over the whole history; undecryptable records counted apart
    pub async fn private_totals(&self, direction: Direction) -> Result<PrivateTotals> {
        let account = self.wallet.account().await?;
        let records = self
            .paginator
            .read_all(self.config.pair(direction), account, self.config.strict_chunk)
            .await?;
        Ok(PrivateTotals::from_records(&records))
    }

    /// Rolling windows over the newest records
    pub async fn analytics(&self, direction: Direction) -> Result<AnalyticsWindow> {
        let account = self.wallet.account().await?;
        let records = self
            .paginator
            .read_last(self.config.pair(direction), account, self.config.analytics_tail)
            .await?;
        Ok(AnalyticsWindow::compute(&records, self.clock.unix_now()))
    }

    pub async fn history_page(&self, direction: Direction, page: u64) -> Result<HistoryPage> {
        let account = self.wallet.account().await?;
        self.paginator
            .page(self.config.pair(direction), account, page)
            .await
    }

    // =========================================================================
    // Withdrawals
    // =========================================================================

    /// Unfinalized withdrawals behind the caller's recent B→S records
    pub async fn pending_withdrawals(&self) -> Result<Vec<WithdrawalReport>> {
        let account = self.wallet.account().await?;
        let events = match self
            .hub
            .recorded_events(
                self.config.pair(Direction::Withdraw),
                account,
                self.config.origin_lookback,
            )
            .await
        {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "Recorded events unavailable, listing no withdrawals");
                return Ok(Vec::new());
            }
        };
        let origins = recent_origins(&events, self.config.max_recent_withdrawals);
        debug!(origins = origins.len(), "Resolving recent withdrawals");
        Ok(self.resolver.pending_withdrawals(&origins).await)
    }

    pub async fn withdrawal_status(&self, l2_tx: B256) -> WithdrawalReport {
        self.resolver.resolve(l2_tx).await
    }

    pub async fn prove_withdrawal(&self, l2_tx: B256) -> Result<B256> {
        self.prover.prove(l2_tx).await
    }

    pub async fn finalize_withdrawal(&self, l2_tx: B256) -> Result<B256> {
        self.prover.finalize(l2_tx).await
    }

    /// Finalize every pending withdrawal whose challenge period has elapsed
    pub async fn finalize_all_ready(&self) -> Result<FinalizeSummary> {
        let pending = self.pending_withdrawals().await?;
        let summary = self.prover.finalize_ready(&pending).await;
        info!(
            finalized = summary.finalized.len(),
            failed = summary.failed.len(),
            "Finalize-all complete"
        );
        Ok(summary)
    }
}
