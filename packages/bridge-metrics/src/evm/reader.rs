//! Typed chain reads over the rotating RPC client

use alloy::primitives::{Address, Bytes, B256, U256, U64};
use alloy::rpc::types::{Block, EIP1186AccountProofResponse, TransactionReceipt};
use alloy::sol_types::SolCall;
use serde_json::json;

use crate::error::Result;
use crate::rpc::RotatingClient;

fn block_tag(number: u64) -> String {
    format!("0x{:x}", number)
}

/// Read-only view of one chain
#[derive(Clone)]
pub struct ChainReader {
    client: RotatingClient,
}

impl ChainReader {
    pub fn new(client: RotatingClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &RotatingClient {
        &self.client
    }

    pub fn label(&self) -> &str {
        self.client.endpoints().label()
    }

    pub async fn chain_id(&self) -> Result<u64> {
        let id: U64 = self.client.call("eth_chainId", json!([])).await?;
        Ok(id.to::<u64>())
    }

    pub async fn block_number(&self) -> Result<u64> {
        let head: U64 = self.client.call("eth_blockNumber", json!([])).await?;
        Ok(head.to::<u64>())
    }

    pub async fn balance(&self, account: Address) -> Result<U256> {
        self.client
            .call("eth_getBalance", json!([account, "latest"]))
            .await
    }

    pub async fn code(&self, account: Address) -> Result<Bytes> {
        self.client
            .call("eth_getCode", json!([account, "latest"]))
            .await
    }

    /// `None` while the transaction is unknown or unmined
    pub async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<TransactionReceipt>> {
        self.client
            .call("eth_getTransactionReceipt", json!([tx_hash]))
            .await
    }

    pub async fn block(&self, number: u64) -> Result<Option<Block>> {
        self.client
            .call("eth_getBlockByNumber", json!([block_tag(number), false]))
            .await
    }

    pub async fn block_at(&self, url: &str, number: u64) -> Result<Option<Block>> {
        self.client
            .call_at(url, "eth_getBlockByNumber", json!([block_tag(number), false]))
            .await
    }

    pub async fn proof_at(
        &self,
        url: &str,
        account: Address,
        slots: &[B256],
        block: u64,
    ) -> Result<EIP1186AccountProofResponse> {
        self.client
            .call_at(url, "eth_getProof", json!([account, slots, block_tag(block)]))
            .await
    }

    /// Raw `eth_call` at the latest block
    pub async fn eth_call(&self, from: Option<Address>, to: Address, data: Bytes) -> Result<Bytes> {
        let mut request = json!({ "to": to, "data": data });
        if let Some(from) = from {
            request["from"] = json!(from);
        }
        self.client.call("eth_call", json!([request, "latest"])).await
    }

    /// ABI-encode `call`, run it against `to`, decode the return
    pub async fn view<C: SolCall>(&self, from: Option<Address>, to: Address, call: &C) -> Result<C::Return> {
        let output = self.eth_call(from, to, call.abi_encode().into()).await?;
        Ok(C::abi_decode_returns(&output, true)?)
    }
}
