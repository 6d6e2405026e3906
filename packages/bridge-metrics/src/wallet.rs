//! Injected wallet seam (EIP-1193)
//!
//! The embedding application supplies an [`Eip1193Provider`] that forwards
//! requests to the browser wallet. [`WalletClient`] adds what the dashboard
//! needs on top: account tracking, chain switching, transaction submission
//! with receipt polling, and typed-data signing.

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::rpc::types::TransactionReceipt;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::{ChainConfig, Config};
use crate::error::{Error, Result};
use crate::redact::Redacted;

/// Wallet error code for a chain the wallet does not know yet
const CODE_UNRECOGNIZED_CHAIN: i64 = 4902;

/// EIP-1193 `request` as exposed by an injected wallet
#[async_trait]
pub trait Eip1193Provider: Send + Sync {
    /// Provider errors should be returned as [`Error::Wallet`] (or
    /// [`Error::Rpc`], which is normalised the same way).
    async fn request(&self, method: &str, params: Value) -> Result<Value>;
}

/// A transaction to send through the wallet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub gas: Option<u64>,
}

impl TxRequest {
    /// Contract call with no value attached
    pub fn call<C: SolCall>(to: Address, call: &C) -> Self {
        Self {
            to,
            data: call.abi_encode().into(),
            value: U256::ZERO,
            gas: None,
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn with_gas(mut self, gas: u64) -> Self {
        self.gas = Some(gas);
        self
    }
}

/// Fold provider-level errors into the wallet taxonomy
fn normalize(error: Error) -> Error {
    match error {
        Error::Rpc { code, message } => Error::wallet(code, message),
        Error::Wallet { code, message } => Error::wallet(code, message),
        other => other,
    }
}

/// Wallet access for the connected account
pub struct WalletClient {
    provider: Arc<dyn Eip1193Provider>,
    clock: Arc<dyn Clock>,
    account: Mutex<Option<Address>>,
    switch_settle: Duration,
    poll_interval: Duration,
    receipt_timeout: Duration,
}

impl WalletClient {
    pub fn new(provider: Arc<dyn Eip1193Provider>, clock: Arc<dyn Clock>, config: &Config) -> Self {
        Self {
            provider,
            clock,
            account: Mutex::new(None),
            switch_settle: config.chain_switch_settle,
            poll_interval: config.receipt_poll_interval,
            receipt_timeout: config.receipt_timeout,
        }
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        self.provider.request(method, params).await.map_err(normalize)
    }

    async fn request_as<R: serde::de::DeserializeOwned>(&self, method: &str, params: Value) -> Result<R> {
        let value = self.request(method, params).await?;
        Ok(serde_json::from_value(value)?)
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    /// Prompt for account access and remember the first account
    pub async fn connect(&self) -> Result<Address> {
        let accounts: Vec<Address> = self.request_as("eth_requestAccounts", json!([])).await?;
        let account = accounts.first().copied().ok_or(Error::WalletNotConnected)?;
        self.set_account(Some(account));
        info!(account = %account, "Wallet connected");
        Ok(account)
    }

    /// Current account: cached, else whatever the wallet already exposes
    pub async fn account(&self) -> Result<Address> {
        if let Some(account) = self.current_account() {
            return Ok(account);
        }
        let accounts: Vec<Address> = self.request_as("eth_accounts", json!([])).await?;
        let account = accounts.first().copied().ok_or(Error::WalletNotConnected)?;
        self.set_account(Some(account));
        Ok(account)
    }

    pub fn current_account(&self) -> Option<Address> {
        *self.account.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn disconnect(&self) {
        self.set_account(None);
    }

    fn set_account(&self, account: Option<Address>) {
        *self.account.lock().unwrap_or_else(|e| e.into_inner()) = account;
    }

    // =========================================================================
    // Chains
    // =========================================================================

    pub async fn chain_id(&self) -> Result<u64> {
        let id: alloy::primitives::U64 = self.request_as("eth_chainId", json!([])).await?;
        Ok(id.to::<u64>())
    }

    /// Switch the wallet to `chain`, adding it first if the wallet lacks it
    pub async fn ensure_chain(&self, chain: &ChainConfig) -> Result<()> {
        if self.chain_id().await? == chain.chain_id {
            return Ok(());
        }

        debug!(chain = %chain.name, "Switching wallet chain");
        let switch = json!([{ "chainId": chain.chain_id_hex() }]);
        match self.request("wallet_switchEthereumChain", switch).await {
            Ok(_) => {}
            Err(Error::Wallet { code, .. }) if code == CODE_UNRECOGNIZED_CHAIN => {
                info!(chain = %chain.name, "Wallet lacks chain, adding it");
                let add = json!([{
                    "chainId": chain.chain_id_hex(),
                    "chainName": chain.name,
                    "nativeCurrency": {
                        "name": chain.currency_symbol,
                        "symbol": chain.currency_symbol,
                        "decimals": 18
                    },
                    "rpcUrls": chain.rpc_urls,
                    "blockExplorerUrls": [chain.explorer_url],
                }]);
                self.request("wallet_addEthereumChain", add).await?;
            }
            Err(e) => return Err(e),
        }

        self.clock.sleep(self.switch_settle).await;
        Ok(())
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    pub async fn send_transaction(&self, tx: TxRequest) -> Result<B256> {
        let from = self.account().await?;
        let mut request = json!({
            "from": from,
            "to": tx.to,
            "data": tx.data,
            "value": format!("0x{:x}", tx.value),
        });
        if let Some(gas) = tx.gas {
            request["gas"] = json!(format!("0x{:x}", gas));
        }

        let hash: B256 = self.request_as("eth_sendTransaction", json!([request])).await?;
        debug!(tx_hash = %hash, to = %tx.to, "Transaction submitted");
        Ok(hash)
    }

    /// Poll until the receipt shows up; a reverted receipt is an error
    pub async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TransactionReceipt> {
        let started = self.clock.unix_millis();
        let timeout_ms = self.receipt_timeout.as_millis() as u64;

        loop {
            match self
                .request_as::<Option<TransactionReceipt>>("eth_getTransactionReceipt", json!([tx_hash]))
                .await
            {
                Ok(Some(receipt)) => {
                    if !receipt.status() {
                        warn!(tx_hash = %tx_hash, "Transaction reverted");
                        return Err(Error::Reverted(tx_hash));
                    }
                    return Ok(receipt);
                }
                Ok(None) => {}
                Err(e) if e.is_transient() => {
                    debug!(tx_hash = %tx_hash, error = %e, "Receipt poll failed");
                }
                Err(e) => return Err(e),
            }

            if self.clock.unix_millis().saturating_sub(started) >= timeout_ms {
                return Err(Error::ReceiptNotFound(tx_hash));
            }
            self.clock.sleep(self.poll_interval).await;
        }
    }

    /// Send and wait for a successful receipt
    pub async fn send_and_confirm(&self, tx: TxRequest) -> Result<TransactionReceipt> {
        let hash = self.send_transaction(tx).await?;
        self.wait_for_receipt(hash).await
    }

    // =========================================================================
    // Signing
    // =========================================================================

    /// `eth_signTypedData_v4` for the connected account
    pub async fn sign_typed_data(&self, typed_data: &Value) -> Result<Redacted<String>> {
        let account = self.account().await?;
        let payload = serde_json::to_string(typed_data)?;
        let signature: String = self
            .request_as("eth_signTypedData_v4", json!([account, payload]))
            .await?;
        Ok(Redacted(signature))
    }
}
