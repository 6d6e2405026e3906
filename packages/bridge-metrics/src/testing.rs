//! Test doubles shared by the unit tests: a manual clock, a scripted JSON-RPC
//! transport, and in-memory wallet/relayer fakes.

use alloy::primitives::{keccak256, Address, Bloom, Bytes, LogData, B256, B64, U256, U64};
use alloy::rpc::types::Log;
use alloy::sol_types::{SolCall, SolEvent};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::clock::Clock;
use crate::confidential::{DecryptionSession, EncryptedInput, Keypair, Relayer};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::evm::{
    output_root, ChainReader, IL2OutputOracle, IL2ToL1MessagePasser, IMetricsHub, IOptimismPortal,
    OutputProposal, OutputRootProof, WithdrawalMessage,
};
use crate::redact::Redacted;
use crate::rpc::{EndpointSet, RetryConfig, RotatingClient, RpcTransport};
use crate::types::DirectionalPair;
use crate::wallet::Eip1193Provider;
use crate::withdrawal::PortalView;

// ============================================================================
// RPC payloads
// ============================================================================

/// `eth_getLogs` / receipt log as a node returns it
pub fn rpc_log(address: Address, data: LogData, block: u64, tx: B256) -> Log {
    Log {
        inner: alloy::primitives::Log { address, data },
        block_number: Some(block),
        transaction_hash: Some(tx),
        log_index: Some(0),
        ..Default::default()
    }
}

/// `eth_getTransactionReceipt` result for an EIP-1559 transaction
pub fn receipt_json(tx: B256, block: u64, succeeded: bool, logs: &[Log]) -> Value {
    json!({
        "type": "0x2",
        "status": if succeeded { "0x1" } else { "0x0" },
        "cumulativeGasUsed": "0x5208",
        "logs": logs,
        "logsBloom": Bloom::ZERO,
        "transactionHash": tx,
        "transactionIndex": "0x0",
        "blockHash": keccak256(format!("block-{block}")),
        "blockNumber": format!("0x{:x}", block),
        "gasUsed": "0x5208",
        "effectiveGasPrice": "0x3b9aca00",
        "from": Address::repeat_byte(0xaa),
        "to": Address::repeat_byte(0xbb),
        "contractAddress": null,
    })
}

/// `eth_getBlockByNumber` result (hashes only)
pub fn block_json(number: u64, hash: B256, timestamp: u64, state_root: B256) -> Value {
    json!({
        "hash": hash,
        "parentHash": B256::ZERO,
        "sha3Uncles": B256::ZERO,
        "miner": Address::ZERO,
        "stateRoot": state_root,
        "transactionsRoot": B256::ZERO,
        "receiptsRoot": B256::ZERO,
        "logsBloom": Bloom::ZERO,
        "difficulty": "0x0",
        "number": format!("0x{:x}", number),
        "gasLimit": "0x1c9c380",
        "gasUsed": "0x0",
        "timestamp": format!("0x{:x}", timestamp),
        "extraData": "0x",
        "mixHash": B256::ZERO,
        "nonce": B64::ZERO,
        "baseFeePerGas": "0x1",
        "uncles": [],
        "transactions": [],
    })
}

/// `eth_getProof` result with one storage proof
pub fn proof_json(account: Address, storage_hash: B256, slot: &Value, proof: &[&str]) -> Value {
    json!({
        "address": account,
        "balance": "0x0",
        "codeHash": keccak256(b""),
        "nonce": "0x0",
        "storageHash": storage_hash,
        "accountProof": [],
        "storageProof": [{ "key": slot, "value": "0x1", "proof": proof }],
    })
}

// ============================================================================
// Clock
// ============================================================================

/// Clock that only moves when slept on or advanced
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicU64,
    slept_ms: AtomicU64,
}

impl ManualClock {
    pub fn new(start_secs: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(start_secs * 1000),
            slept_ms: AtomicU64::new(0),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now_ms.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    /// Total time spent in `sleep`
    pub fn slept(&self) -> Duration {
        Duration::from_millis(self.slept_ms.load(Ordering::SeqCst))
    }
}

#[async_trait]
impl Clock for ManualClock {
    async fn sleep(&self, duration: Duration) {
        let ms = duration.as_millis() as u64;
        self.slept_ms.fetch_add(ms, Ordering::SeqCst);
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }

    fn unix_millis(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

// ============================================================================
// JSON-RPC transport
// ============================================================================

type Handler = dyn Fn(&str, &str, &Value) -> Result<Value> + Send + Sync;

/// Transport answering from a closure and logging every call
pub struct ScriptedTransport {
    handler: Box<Handler>,
    calls: Mutex<Vec<(String, String, Value)>>,
}

impl ScriptedTransport {
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&str, &str, &Value) -> Result<Value> + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// (url, method, params) of every call so far
    pub fn calls(&self) -> Vec<(String, String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.0 == url).count()
    }

    pub fn calls_of(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.1 == method)
            .count()
    }
}

#[async_trait]
impl RpcTransport for ScriptedTransport {
    async fn request(&self, url: &str, method: &str, params: Value) -> Result<Value> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), method.to_string(), params.clone()));
        (self.handler)(url, method, &params)
    }
}

fn parse_hex_u64(value: &Value) -> u64 {
    serde_json::from_value::<U64>(value.clone())
        .map(|v| v.to::<u64>())
        .unwrap_or(0)
}

// ============================================================================
// Wallet
// ============================================================================

/// A transaction the fake wallet accepted
#[derive(Debug, Clone)]
pub struct SentTx {
    pub hash: B256,
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub gas: Option<u64>,
    pub chain_id: u64,
}

type SendHook = dyn Fn(&SentTx) -> bool + Send + Sync;

#[derive(Default)]
struct WalletState {
    chain: u64,
    forgotten: HashSet<u64>,
    reject: HashSet<String>,
    reverting: HashSet<Address>,
    methods: Vec<String>,
    sent: Vec<SentTx>,
    receipts: HashMap<B256, (bool, u64)>,
}

/// In-memory EIP-1193 wallet with one account
pub struct FakeWallet {
    account: Address,
    state: Mutex<WalletState>,
    on_send: Mutex<Option<Arc<SendHook>>>,
}

impl FakeWallet {
    pub fn new(account: Address, chain_id: u64) -> Arc<Self> {
        Arc::new(Self {
            account,
            state: Mutex::new(WalletState {
                chain: chain_id,
                ..WalletState::default()
            }),
            on_send: Mutex::new(None),
        })
    }

    pub fn account(&self) -> Address {
        self.account
    }

    pub fn chain(&self) -> u64 {
        self.state.lock().unwrap().chain
    }

    pub fn method_count(&self, method: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .methods
            .iter()
            .filter(|m| *m == method)
            .count()
    }

    /// Switching to `chain_id` fails with 4902 until the chain is added
    pub fn forget_chain(&self, chain_id: u64) {
        self.state.lock().unwrap().forgotten.insert(chain_id);
    }

    /// Reject the next request for `method` as the user would
    pub fn reject_next(&self, method: &str) {
        self.state.lock().unwrap().reject.insert(method.to_string());
    }

    /// Transactions sent to `to` get a failed receipt
    pub fn revert_calls_to(&self, to: Address) {
        self.state.lock().unwrap().reverting.insert(to);
    }

    pub fn sent(&self) -> Vec<SentTx> {
        self.state.lock().unwrap().sent.clone()
    }

    /// Calls of `C` sent so far, decoded
    pub fn sent_calls<C: SolCall>(&self) -> Vec<C> {
        self.sent()
            .iter()
            .filter(|tx| tx.data.len() >= 4 && tx.data[..4] == C::SELECTOR)
            .filter_map(|tx| C::abi_decode(&tx.data, true).ok())
            .collect()
    }

    /// Hook deciding whether a sent transaction succeeds
    pub fn on_send<F>(&self, hook: F)
    where
        F: Fn(&SentTx) -> bool + Send + Sync + 'static,
    {
        *self.on_send.lock().unwrap() = Some(Arc::new(hook));
    }

    fn send(&self, request: &Value) -> Result<Value> {
        let to: Address = serde_json::from_value(request["to"].clone())?;
        let data: Bytes = serde_json::from_value(request["data"].clone()).unwrap_or_default();
        let value: U256 = serde_json::from_value(request["value"].clone()).unwrap_or_default();
        let gas = request.get("gas").map(parse_hex_u64);

        let (tx, reverting) = {
            let state = self.state.lock().unwrap();
            let n = state.sent.len() as u64;
            let tx = SentTx {
                hash: keccak256(format!("tx-{n}")),
                from: self.account,
                to,
                data,
                value,
                gas,
                chain_id: state.chain,
            };
            (tx, state.reverting.contains(&to))
        };

        let hook = self.on_send.lock().unwrap().clone();
        let succeeded = !reverting && hook.map(|h| h(&tx)).unwrap_or(true);

        let mut state = self.state.lock().unwrap();
        let block = state.sent.len() as u64 + 1;
        state.receipts.insert(tx.hash, (succeeded, block));
        state.sent.push(tx.clone());
        Ok(json!(tx.hash))
    }
}

#[async_trait]
impl Eip1193Provider for FakeWallet {
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        {
            let mut state = self.state.lock().unwrap();
            state.methods.push(method.to_string());
            if state.reject.remove(method) {
                return Err(Error::Wallet {
                    code: 4001,
                    message: "User rejected the request.".into(),
                });
            }
        }

        match method {
            "eth_requestAccounts" | "eth_accounts" => Ok(json!([self.account])),
            "eth_chainId" => Ok(json!(format!("0x{:x}", self.chain()))),
            "wallet_switchEthereumChain" => {
                let id = parse_hex_u64(&params[0]["chainId"]);
                let mut state = self.state.lock().unwrap();
                if state.forgotten.contains(&id) {
                    return Err(Error::Wallet {
                        code: 4902,
                        message: "Unrecognized chain ID".into(),
                    });
                }
                state.chain = id;
                Ok(Value::Null)
            }
            "wallet_addEthereumChain" => {
                let id = parse_hex_u64(&params[0]["chainId"]);
                let mut state = self.state.lock().unwrap();
                state.forgotten.remove(&id);
                state.chain = id;
                Ok(Value::Null)
            }
            "eth_sendTransaction" => self.send(&params[0]),
            "eth_getTransactionReceipt" => {
                let hash: B256 = serde_json::from_value(params[0].clone())?;
                let state = self.state.lock().unwrap();
                Ok(match state.receipts.get(&hash) {
                    Some((ok, block)) => receipt_json(hash, *block, *ok, &[]),
                    None => Value::Null,
                })
            }
            "eth_signTypedData_v4" => Ok(json!(format!("0x{}", "11".repeat(65)))),
            other => Err(Error::Wallet {
                code: -32601,
                message: format!("{other} unsupported"),
            }),
        }
    }
}

// ============================================================================
// Relayer
// ============================================================================

#[derive(Default)]
struct RelayerState {
    plaintexts: HashMap<B256, U256>,
    authorized: HashSet<B256>,
    public: HashSet<B256>,
    next: u64,
}

/// In-memory relayer: handles map to plaintexts, decryption needs authorization
#[derive(Default)]
pub struct FakeRelayer {
    state: Mutex<RelayerState>,
    keypairs: AtomicU64,
    user_decrypts: AtomicU64,
}

impl FakeRelayer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a ciphertext and return its handle
    pub fn insert(&self, value: U256, authorized: bool) -> B256 {
        let mut state = self.state.lock().unwrap();
        state.next += 1;
        let handle = keccak256(format!("handle-{}", state.next));
        state.plaintexts.insert(handle, value);
        if authorized {
            state.authorized.insert(handle);
        }
        handle
    }

    pub fn authorize(&self, handle: B256) {
        self.state.lock().unwrap().authorized.insert(handle);
    }

    pub fn make_public(&self, handle: B256) {
        self.state.lock().unwrap().public.insert(handle);
    }

    pub fn plaintext(&self, handle: B256) -> Option<U256> {
        self.state.lock().unwrap().plaintexts.get(&handle).copied()
    }

    pub fn keypairs_generated(&self) -> u64 {
        self.keypairs.load(Ordering::SeqCst)
    }

    pub fn user_decrypt_calls(&self) -> u64 {
        self.user_decrypts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Relayer for FakeRelayer {
    async fn generate_keypair(&self) -> Result<Keypair> {
        let n = self.keypairs.fetch_add(1, Ordering::SeqCst);
        Ok(Keypair {
            public_key: format!("0xpub{n}"),
            private_key: Redacted(format!("0xpriv{n}")),
        })
    }

    fn create_authorization(
        &self,
        public_key: &str,
        contracts: &[Address],
        start_timestamp: u64,
        duration_days: u64,
    ) -> Result<Value> {
        Ok(json!({
            "primaryType": "UserDecryptRequestVerification",
            "message": {
                "publicKey": public_key,
                "contractAddresses": contracts,
                "startTimestamp": start_timestamp.to_string(),
                "durationDays": duration_days.to_string(),
            }
        }))
    }

    async fn user_decrypt(
        &self,
        handles: &[B256],
        _contract: Address,
        _session: &DecryptionSession,
    ) -> Result<HashMap<B256, U256>> {
        self.user_decrypts.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        let mut out = HashMap::new();
        for handle in handles {
            if !state.authorized.contains(handle) {
                return Err(Error::Relayer(format!(
                    "user is not authorized to decrypt handle {handle}"
                )));
            }
            if let Some(v) = state.plaintexts.get(handle) {
                out.insert(*handle, *v);
            }
        }
        Ok(out)
    }

    async fn public_decrypt(&self, handles: &[B256]) -> Result<HashMap<B256, U256>> {
        let state = self.state.lock().unwrap();
        let mut out = HashMap::new();
        for handle in handles {
            if !state.public.contains(handle) {
                return Err(Error::Relayer(format!(
                    "handle {handle} is not allowed for public decryption"
                )));
            }
            if let Some(v) = state.plaintexts.get(handle) {
                out.insert(*handle, *v);
            }
        }
        Ok(out)
    }

    async fn encrypt_u128(&self, _contract: Address, _user: Address, amount: u128) -> Result<EncryptedInput> {
        let handle = self.insert(U256::from(amount), true);
        Ok(EncryptedInput {
            handle,
            input_proof: Bytes::from_static(b"\x01proof"),
        })
    }
}

// ============================================================================
// Metrics hub
// ============================================================================

#[derive(Default)]
struct HubState {
    records: HashMap<(DirectionalPair, Address), Vec<(B256, u64)>>,
    logs: Vec<(u64, Value)>,
    snapshots: HashMap<DirectionalPair, (B256, B256)>,
    balances: HashMap<Address, U256>,
    timestamp: u64,
    block: u64,
}

/// In-memory settlement chain hosting the metrics hub.
///
/// Serves `eth_call`/`eth_getLogs` for the hub through [`FakeHub::transport`]
/// and reacts to hub transactions sent through an attached [`FakeWallet`].
pub struct FakeHub {
    address: Address,
    relayer: Arc<FakeRelayer>,
    state: Mutex<HubState>,
}

fn topic_u32(v: u32) -> B256 {
    B256::from(U256::from(v))
}

impl FakeHub {
    pub fn new(address: Address, relayer: Arc<FakeRelayer>) -> Arc<Self> {
        Arc::new(Self {
            address,
            relayer,
            state: Mutex::new(HubState {
                timestamp: 1_700_000_000,
                block: 1_000,
                ..HubState::default()
            }),
        })
    }

    pub fn set_balance(&self, account: Address, wei: U256) {
        self.state.lock().unwrap().balances.insert(account, wei);
    }

    /// Append a record directly, as if written earlier; returns its handle
    pub fn push(
        &self,
        pair: DirectionalPair,
        user: Address,
        wei: U256,
        timestamp: u64,
        authorized: bool,
        origin: B256,
    ) -> B256 {
        let handle = self.relayer.insert(wei, authorized);
        let tx = keccak256(format!("record-{handle}"));
        self.append(pair, user, handle, timestamp, origin, tx);
        handle
    }

    fn append(&self, pair: DirectionalPair, user: Address, handle: B256, timestamp: u64, origin: B256, tx: B256) {
        let mut state = self.state.lock().unwrap();
        state.block += 1;
        let block = state.block;
        let records = state.records.entry((pair, user)).or_default();
        let idx = records.len();
        records.push((handle, timestamp));

        let event = IMetricsHub::Recorded {
            src: pair.src,
            dst: pair.dst,
            user,
            idx: U256::from(idx),
            originTx: origin,
        };
        let log = rpc_log(self.address, event.encode_log_data(), block, tx);
        state.logs.push((block, json!(log)));
    }

    pub fn len(&self, pair: DirectionalPair, user: Address) -> usize {
        self.records(pair, user).len()
    }

    pub fn records(&self, pair: DirectionalPair, user: Address) -> Vec<(B256, u64)> {
        self.state
            .lock()
            .unwrap()
            .records
            .get(&(pair, user))
            .cloned()
            .unwrap_or_default()
    }

    /// Route hub transactions from `wallet` into this hub
    pub fn attach(self: &Arc<Self>, wallet: &FakeWallet) {
        let hub = self.clone();
        wallet.on_send(move |tx| hub.apply(tx));
    }

    /// Apply a sent transaction to hub state; `false` reverts it
    pub fn apply(&self, tx: &SentTx) -> bool {
        if tx.to != self.address {
            return true;
        }
        let data = &tx.data[..];

        if let Ok(call) = IMetricsHub::grantMyHistoryRangeCall::abi_decode(data, true) {
            let pair = DirectionalPair::new(call.srcChainId, call.dstChainId);
            let records = self.records(pair, tx.from);
            let (start, end) = (call.start.to::<usize>(), call.endExclusive.to::<usize>());
            if start >= end || end > records.len() {
                return false;
            }
            for (handle, _) in &records[start..end] {
                self.relayer.authorize(*handle);
            }
            return true;
        }

        if let Ok(call) = IMetricsHub::grantMyHistoryCall::abi_decode(data, true) {
            let pair = DirectionalPair::new(call.srcChainId, call.dstChainId);
            let records = self.records(pair, tx.from);
            for idx in call.idxs {
                match records.get(idx.to::<usize>()) {
                    Some((handle, _)) => self.relayer.authorize(*handle),
                    None => return false,
                }
            }
            return true;
        }

        if let Ok(call) = IMetricsHub::recordCall::abi_decode(data, true) {
            let pair = DirectionalPair::new(call.srcChainId, call.dstChainId);
            let timestamp = {
                let mut state = self.state.lock().unwrap();
                state.timestamp += 12;
                state.timestamp
            };
            self.append(pair, tx.from, call.amountWeiExt, timestamp, call.originTxHash, tx.hash);
            return true;
        }

        if let Ok(call) = IMetricsHub::publishCall::abi_decode(data, true) {
            let pair = DirectionalPair::new(call.srcChainId, call.dstChainId);
            let (volume, count) = self.aggregate(pair);
            if count < call.kThreshold as usize {
                return false;
            }
            let volume = self.relayer.insert(volume, false);
            let count = self.relayer.insert(U256::from(count), false);
            self.relayer.make_public(volume);
            self.relayer.make_public(count);
            self.state.lock().unwrap().snapshots.insert(pair, (volume, count));
            return true;
        }

        true
    }

    /// Sum of all plaintexts recorded for `pair`, and the record count
    fn aggregate(&self, pair: DirectionalPair) -> (U256, usize) {
        let state = self.state.lock().unwrap();
        let mut total = U256::ZERO;
        let mut count = 0;
        for ((p, _), records) in state.records.iter() {
            if *p != pair {
                continue;
            }
            for (handle, _) in records {
                total += self.relayer.plaintext(*handle).unwrap_or_default();
                count += 1;
            }
        }
        (total, count)
    }

    fn call(&self, from: Address, data: &[u8]) -> Result<Vec<u8>> {
        if let Ok(call) = IMetricsHub::myHistoryLengthCall::abi_decode(data, true) {
            let len = self.len(DirectionalPair::new(call.srcChainId, call.dstChainId), from);
            return Ok(IMetricsHub::myHistoryLengthCall::abi_encode_returns(&(U256::from(len),)));
        }
        if let Ok(call) = IMetricsHub::getMyHistoryCall::abi_decode(data, true) {
            let records = self.records(DirectionalPair::new(call.srcChainId, call.dstChainId), from);
            let start = call.start.to::<usize>().min(records.len());
            let end = (start + call.count.to::<usize>()).min(records.len());
            let slice = &records[start..end];
            let amounts: Vec<B256> = slice.iter().map(|r| r.0).collect();
            let timestamps: Vec<u64> = slice.iter().map(|r| r.1).collect();
            return Ok(IMetricsHub::getMyHistoryCall::abi_encode_returns(&(amounts, timestamps)));
        }
        if let Ok(call) = IMetricsHub::getTotalsCall::abi_decode(data, true) {
            let pair = DirectionalPair::new(call.srcChainId, call.dstChainId);
            let records = self.records(pair, from);
            let mut total = U256::ZERO;
            for (handle, _) in &records {
                total += self.relayer.plaintext(*handle).unwrap_or_default();
            }
            let (volume, count) = if records.is_empty() {
                (B256::ZERO, B256::ZERO)
            } else {
                (
                    self.relayer.insert(total, true),
                    self.relayer.insert(U256::from(records.len()), true),
                )
            };
            return Ok(IMetricsHub::getTotalsCall::abi_encode_returns(&(volume, count)));
        }
        if let Ok(call) = IMetricsHub::getPublicSnapshotsCall::abi_decode(data, true) {
            let pair = DirectionalPair::new(call.srcChainId, call.dstChainId);
            let (volume, count) = self
                .state
                .lock()
                .unwrap()
                .snapshots
                .get(&pair)
                .copied()
                .unwrap_or_default();
            return Ok(IMetricsHub::getPublicSnapshotsCall::abi_encode_returns(&(volume, count)));
        }
        Err(Error::Rpc {
            code: 3,
            message: "execution reverted".into(),
        })
    }

    fn logs(&self, filter: &Value) -> Vec<Value> {
        let from = parse_hex_u64(&filter["fromBlock"]);
        let to = parse_hex_u64(&filter["toBlock"]);
        let wanted: Vec<Option<B256>> = filter["topics"]
            .as_array()
            .map(|t| t.iter().map(|v| serde_json::from_value(v.clone()).ok()).collect())
            .unwrap_or_default();

        self.state
            .lock()
            .unwrap()
            .logs
            .iter()
            .filter(|(block, _)| *block >= from && *block <= to)
            .filter(|(_, log)| {
                wanted.iter().enumerate().all(|(i, want)| match want {
                    Some(t) => log["topics"][i] == json!(t),
                    None => true,
                })
            })
            .map(|(_, log)| log.clone())
            .collect()
    }

    /// JSON-RPC handler for the settlement chain
    pub fn handle(&self, method: &str, params: &Value) -> Result<Value> {
        match method {
            "eth_blockNumber" => Ok(json!(format!("0x{:x}", self.state.lock().unwrap().block + 5))),
            "eth_chainId" => Ok(json!("0xaa36a7")),
            "eth_getCode" => Ok(json!("0x6080604052")),
            "eth_getBalance" => {
                let account: Address = serde_json::from_value(params[0].clone())?;
                let balance = self
                    .state
                    .lock()
                    .unwrap()
                    .balances
                    .get(&account)
                    .copied()
                    .unwrap_or_default();
                Ok(json!(balance))
            }
            "eth_call" => {
                let to: Address = serde_json::from_value(params[0]["to"].clone())?;
                if to != self.address {
                    return Err(Error::Rpc {
                        code: 3,
                        message: "execution reverted".into(),
                    });
                }
                let from: Address =
                    serde_json::from_value(params[0]["from"].clone()).unwrap_or_default();
                let data: Bytes = serde_json::from_value(params[0]["data"].clone())?;
                Ok(json!(Bytes::from(self.call(from, &data)?)))
            }
            "eth_getLogs" => Ok(json!(self.logs(&params[0]))),
            other => Err(Error::Rpc {
                code: -32601,
                message: format!("the method {other} does not exist/is not available"),
            }),
        }
    }

    pub fn transport(self: &Arc<Self>) -> Arc<ScriptedTransport> {
        let hub = self.clone();
        ScriptedTransport::new(move |_, method, params| hub.handle(method, params))
    }
}

// ============================================================================
// OP stack
// ============================================================================

pub const L2_URLS: [&str; 2] = ["https://l2-a.example", "https://l2-b.example"];
const L1_HEAD: u64 = 10_000;
const OUTPUT_INTERVAL: u64 = 100;

#[derive(Default)]
struct StackState {
    l2_txs: HashMap<B256, (u64, Option<WithdrawalMessage>)>,
    latest_output_block: u64,
    proven: HashMap<B256, u64>,
    finalized: HashSet<B256>,
    storage_broken: bool,
    portal_logs: Vec<(u64, Value)>,
    proof_failing: HashSet<String>,
    next_nonce: u64,
    next_l1_block: u64,
}

/// Settlement chain (portal + output oracle) and rollup (receipts, blocks,
/// storage proofs) for withdrawal tests
pub struct FakeOpStack {
    config: Config,
    state: Arc<Mutex<StackState>>,
}

fn tagged(tag: &str, n: u64) -> B256 {
    keccak256(format!("{tag}-{n}"))
}

fn l2_block(number: u64) -> Value {
    block_json(
        number,
        tagged("l2-hash", number),
        1_600_000_000 + number * 2,
        tagged("l2-state", number),
    )
}

fn storage_root() -> B256 {
    keccak256("passer-storage")
}

/// Output committing to the fake rollup state at `l2_block`
fn fake_output(l2_block: u64) -> OutputProposal {
    let proof = OutputRootProof {
        version: B256::ZERO,
        stateRoot: tagged("l2-state", l2_block),
        messagePasserStorageRoot: storage_root(),
        latestBlockhash: tagged("l2-hash", l2_block),
    };
    OutputProposal {
        outputRoot: output_root(&proof),
        timestamp: 1_600_000_000,
        l2BlockNumber: l2_block as u128,
    }
}

impl FakeOpStack {
    pub fn new() -> Self {
        Self {
            config: Config::sepolia_base(),
            state: Arc::new(Mutex::new(StackState {
                next_l1_block: 9_000,
                ..StackState::default()
            })),
        }
    }

    pub fn message_passer(&self) -> Address {
        self.config.contracts.l2_to_l1_message_passer
    }

    pub fn portal(&self) -> Address {
        self.config.contracts.optimism_portal
    }

    pub fn l1_block_timestamp(&self, block: u64) -> u64 {
        1_700_000_000 + block
    }

    // =========================================================================
    // Scenario setup
    // =========================================================================

    /// Rollup transaction at `l2_block` that emits a withdrawal message
    pub fn add_withdrawal(&self, l2_block: u64) -> B256 {
        let mut state = self.state.lock().unwrap();
        state.next_nonce += 1;
        let mut message = WithdrawalMessage {
            nonce: U256::from(state.next_nonce),
            sender: self.config.contracts.l2_standard_bridge,
            target: self.config.contracts.l1_standard_bridge,
            value: U256::from(10u64).pow(U256::from(16u64)),
            gas_limit: U256::from(200_000u64),
            data: Bytes::from_static(b"\x01"),
            withdrawal_hash: B256::ZERO,
        };
        message.withdrawal_hash = message.computed_hash();
        let tx = tagged("l2-tx", state.next_nonce);
        state.l2_txs.insert(tx, (l2_block, Some(message)));
        tx
    }

    /// Rollup transaction with no withdrawal message
    pub fn add_plain_tx(&self, l2_block: u64) -> B256 {
        let tx = tagged("plain-tx", l2_block);
        self.state.lock().unwrap().l2_txs.insert(tx, (l2_block, None));
        tx
    }

    pub fn withdrawal_hash(&self, tx: B256) -> B256 {
        self.state.lock().unwrap().l2_txs[&tx]
            .1
            .as_ref()
            .map(|m| m.withdrawal_hash)
            .unwrap_or_default()
    }

    pub fn set_latest_output_block(&self, l2_block: u64) {
        self.state.lock().unwrap().latest_output_block = l2_block;
    }

    pub fn prove_in_storage(&self, tx: B256, timestamp: u64) {
        let hash = self.withdrawal_hash(tx);
        self.state.lock().unwrap().proven.insert(hash, timestamp);
    }

    pub fn finalize_in_storage(&self, tx: B256) {
        let hash = self.withdrawal_hash(tx);
        self.state.lock().unwrap().finalized.insert(hash);
    }

    /// Portal storage reads revert from now on
    pub fn break_portal_storage(&self) {
        self.state.lock().unwrap().storage_broken = true;
    }

    /// `eth_getProof` is unavailable on `url`
    pub fn fail_proofs_on(&self, url: &str) {
        self.state.lock().unwrap().proof_failing.insert(url.to_string());
    }

    fn push_portal_log(&self, data: LogData) -> u64 {
        let mut state = self.state.lock().unwrap();
        state.next_l1_block += 1;
        let block = state.next_l1_block;
        let log = rpc_log(self.portal(), data, block, tagged("l1-tx", block));
        state.portal_logs.push((block, json!(log)));
        block
    }

    /// Emit `WithdrawalProven`; returns the settlement block it landed in
    pub fn prove_with_event(&self, tx: B256) -> u64 {
        let event = IOptimismPortal::WithdrawalProven {
            withdrawalHash: self.withdrawal_hash(tx),
            from: Address::repeat_byte(0x01),
            to: Address::repeat_byte(0x02),
        };
        self.push_portal_log(event.encode_log_data())
    }

    pub fn finalize_with_event(&self, tx: B256) -> u64 {
        let event = IOptimismPortal::WithdrawalFinalized {
            withdrawalHash: self.withdrawal_hash(tx),
            success: true,
        };
        self.push_portal_log(event.encode_log_data())
    }

    // =========================================================================
    // Clients
    // =========================================================================

    pub fn l1_transport(&self) -> Arc<ScriptedTransport> {
        let state = self.state.clone();
        let config = self.config.clone();
        ScriptedTransport::new(move |_, method, params| l1_handle(&config, &state, method, params))
    }

    pub fn l2_transport(&self) -> Arc<ScriptedTransport> {
        let state = self.state.clone();
        let passer = self.message_passer();
        ScriptedTransport::new(move |url, method, params| l2_handle(passer, &state, url, method, params))
    }

    /// Settlement transport where `fail(url, method)` can pre-empt any call
    pub fn l1_transport_failing<F>(&self, fail: F) -> Arc<ScriptedTransport>
    where
        F: Fn(&str, &str) -> Option<Error> + Send + Sync + 'static,
    {
        let state = self.state.clone();
        let config = self.config.clone();
        ScriptedTransport::new(move |url, method, params| match fail(url, method) {
            Some(e) => Err(e),
            None => l1_handle(&config, &state, method, params),
        })
    }

    pub fn l1_reader(&self, clock: Arc<dyn Clock>) -> ChainReader {
        self.l1_reader_over(self.l1_transport(), clock)
    }

    pub fn l1_reader_over(&self, transport: Arc<ScriptedTransport>, clock: Arc<dyn Clock>) -> ChainReader {
        ChainReader::new(RotatingClient::new(
            EndpointSet::from_chain(&self.config.l1).unwrap(),
            transport,
            RetryConfig::no_retry(),
            clock,
        ))
    }

    pub fn l2_reader_over(&self, transport: Arc<ScriptedTransport>, clock: Arc<dyn Clock>) -> ChainReader {
        ChainReader::new(RotatingClient::new(
            EndpointSet::new("l2", L2_URLS.iter().map(|u| u.to_string()).collect()).unwrap(),
            transport,
            RetryConfig::no_retry(),
            clock,
        ))
    }

    pub fn l2_reader(&self, clock: Arc<dyn Clock>) -> ChainReader {
        self.l2_reader_over(self.l2_transport(), clock)
    }

    pub fn portal_view(&self, clock: Arc<dyn Clock>) -> PortalView {
        self.portal_view_over(self.l1_transport(), clock)
    }

    pub fn portal_view_over(&self, transport: Arc<ScriptedTransport>, clock: Arc<dyn Clock>) -> PortalView {
        PortalView::new(
            self.l1_reader_over(transport, clock),
            self.config.contracts.optimism_portal,
            self.config.contracts.l2_output_oracle,
            self.config.challenge_period,
            self.config.portal_scan.clone(),
            self.config.recorded_lookback,
        )
    }
}

fn reverted() -> Error {
    Error::Rpc {
        code: 3,
        message: "execution reverted".into(),
    }
}

fn l1_call(config: &Config, state: &StackState, to: Address, data: &[u8]) -> Result<Vec<u8>> {
    let contracts = &config.contracts;
    if to == contracts.l2_output_oracle {
        if IL2OutputOracle::latestBlockNumberCall::abi_decode(data, true).is_ok() {
            return Ok(IL2OutputOracle::latestBlockNumberCall::abi_encode_returns(&(U256::from(
                state.latest_output_block,
            ),)));
        }
        if let Ok(call) = IL2OutputOracle::getL2OutputIndexAfterCall::abi_decode(data, true) {
            let block = call.l2BlockNumber.to::<u64>();
            if block > state.latest_output_block {
                return Err(reverted());
            }
            let index = block.div_ceil(OUTPUT_INTERVAL).max(1) - 1;
            return Ok(IL2OutputOracle::getL2OutputIndexAfterCall::abi_encode_returns(&(U256::from(index),)));
        }
        if let Ok(call) = IL2OutputOracle::getL2OutputCall::abi_decode(data, true) {
            let l2_block = (call.l2OutputIndex.to::<u64>() + 1) * OUTPUT_INTERVAL;
            return Ok(IL2OutputOracle::getL2OutputCall::abi_encode_returns(&(fake_output(l2_block),)));
        }
        if IL2OutputOracle::finalizationPeriodSecondsCall::abi_decode(data, true).is_ok() {
            return Ok(IL2OutputOracle::finalizationPeriodSecondsCall::abi_encode_returns(&(U256::from(
                604_800u64,
            ),)));
        }
    }
    if to == contracts.optimism_portal {
        if state.storage_broken {
            return Err(reverted());
        }
        if let Ok(call) = IOptimismPortal::finalizedWithdrawalsCall::abi_decode(data, true) {
            let done = state.finalized.contains(&call.withdrawalHash);
            return Ok(IOptimismPortal::finalizedWithdrawalsCall::abi_encode_returns(&(done,)));
        }
        if let Ok(call) = IOptimismPortal::provenWithdrawalsCall::abi_decode(data, true) {
            let ts = state.proven.get(&call.withdrawalHash).copied().unwrap_or(0);
            return Ok(IOptimismPortal::provenWithdrawalsCall::abi_encode_returns(&(
                B256::ZERO,
                ts as u128,
                0u128,
            )));
        }
    }
    Err(reverted())
}

fn l1_handle(config: &Config, state: &Mutex<StackState>, method: &str, params: &Value) -> Result<Value> {
    let state = state.lock().unwrap();
    match method {
        "eth_blockNumber" => Ok(json!(format!("0x{:x}", L1_HEAD))),
        "eth_getBlockByNumber" => {
            let number = parse_hex_u64(&params[0]);
            Ok(block_json(
                number,
                tagged("l1-hash", number),
                1_700_000_000 + number,
                tagged("l1-state", number),
            ))
        }
        "eth_getLogs" => {
            let filter = &params[0];
            let from = parse_hex_u64(&filter["fromBlock"]);
            let to = parse_hex_u64(&filter["toBlock"]);
            let logs: Vec<Value> = state
                .portal_logs
                .iter()
                .filter(|(block, _)| *block >= from && *block <= to)
                .filter(|(_, log)| log["topics"][0] == filter["topics"][0] && log["topics"][1] == filter["topics"][1])
                .map(|(_, log)| log.clone())
                .collect();
            Ok(json!(logs))
        }
        "eth_call" => {
            let to: Address = serde_json::from_value(params[0]["to"].clone())?;
            let data: Bytes = serde_json::from_value(params[0]["data"].clone())?;
            Ok(json!(Bytes::from(l1_call(config, &state, to, &data)?)))
        }
        other => Err(Error::Rpc {
            code: -32601,
            message: format!("the method {other} does not exist/is not available"),
        }),
    }
}

fn l2_handle(passer: Address, state: &Mutex<StackState>, url: &str, method: &str, params: &Value) -> Result<Value> {
    let state = state.lock().unwrap();
    match method {
        "eth_blockNumber" => Ok(json!("0x100000")),
        "eth_getTransactionReceipt" => {
            let tx: B256 = serde_json::from_value(params[0].clone())?;
            let Some((block, message)) = state.l2_txs.get(&tx) else {
                return Ok(Value::Null);
            };
            let logs: Vec<Log> = message
                .iter()
                .map(|m| {
                    let data = IL2ToL1MessagePasser::MessagePassed {
                        nonce: m.nonce,
                        sender: m.sender,
                        target: m.target,
                        value: m.value,
                        gasLimit: m.gas_limit,
                        data: m.data.clone(),
                        withdrawalHash: m.withdrawal_hash,
                    }
                    .encode_log_data();
                    rpc_log(passer, data, *block, tx)
                })
                .collect();
            Ok(receipt_json(tx, *block, true, &logs))
        }
        "eth_getBlockByNumber" => Ok(l2_block(parse_hex_u64(&params[0]))),
        "eth_getProof" => {
            if state.proof_failing.contains(url) {
                return Err(Error::Rpc {
                    code: -32601,
                    message: "the method eth_getProof does not exist/is not available".into(),
                });
            }
            Ok(proof_json(passer, storage_root(), &params[1][0], &["0xf851", "0xe21a"]))
        }
        other => Err(Error::Rpc {
            code: -32601,
            message: format!("the method {other} does not exist/is not available"),
        }),
    }
}
