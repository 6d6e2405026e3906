//! Dashboard configuration
//!
//! Built-in defaults target Sepolia (settlement chain) and Base Sepolia
//! (rollup). Every value can be overridden from the environment, with a
//! `.env` file loaded first when present.
//!
//! # Environment Variable Schema
//!
//! ```text
//! L1_NAME=Sepolia                  # optional
//! L1_CHAIN_ID=11155111             # optional
//! L1_RPC_URLS=https://a,https://b  # comma-separated, tried in order
//! L1_EXPLORER_URL=https://sepolia.etherscan.io
//! L2_NAME / L2_CHAIN_ID / L2_RPC_URLS / L2_EXPLORER_URL
//! METRICS_HUB_ADDRESS=0x...
//! KMS_ADDRESS=0x...
//! L1_STANDARD_BRIDGE=0x...  L2_STANDARD_BRIDGE=0x...
//! OPTIMISM_PORTAL=0x...     L2_OUTPUT_ORACLE=0x...
//! RELAYER_URL=https://...   GATEWAY_URL=https://...
//! RPC_TIMEOUT_MS=3500       CHALLENGE_PERIOD_SECS=604800
//! ```

use alloy::primitives::{address, Address, U256};
use eyre::{eyre, Result, WrapErr};
use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::rpc::{LogScanConfig, RetryConfig};
use crate::types::{Direction, DirectionalPair};

// ============================================================================
// URL Validation
// ============================================================================

/// Parse a comma-separated RPC URL string into individual trimmed URLs.
pub fn parse_rpc_urls(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Validates that a URL uses http/https and has a host component.
pub fn validate_rpc_url(url_str: &str, name: &str) -> Result<()> {
    let parsed =
        url::Url::parse(url_str).map_err(|e| eyre!("{} must be a valid URL: {}", name, e))?;

    let scheme = parsed.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(eyre!(
            "{} must use http:// or https:// scheme, got {}",
            name,
            scheme
        ));
    }

    if parsed.host_str().is_none() {
        return Err(eyre!("{} must have a host component", name));
    }

    if scheme == "http" {
        tracing::warn!("{} uses unencrypted http://, use https:// outside local testing", name);
    }

    Ok(())
}

/// `scheme://host` of a URL; hosted RPC keys usually live in the path
fn url_origin(url_str: &str) -> String {
    match url::Url::parse(url_str) {
        Ok(u) => format!("{}://{}", u.scheme(), u.host_str().unwrap_or("?")),
        Err(_) => "<invalid>".to_string(),
    }
}

// ============================================================================
// Chain Configuration
// ============================================================================

/// One chain the dashboard talks to
#[derive(Clone)]
pub struct ChainConfig {
    /// Human-readable name (e.g., "Sepolia")
    pub name: String,
    /// Native EVM chain ID
    pub chain_id: u64,
    /// Ordered endpoint list; no priority beyond order
    pub rpc_urls: Vec<String>,
    pub explorer_url: String,
    pub currency_symbol: String,
}

impl ChainConfig {
    /// `0x`-prefixed hex chain id as wallets expect it
    pub fn chain_id_hex(&self) -> String {
        format!("0x{:x}", self.chain_id)
    }

    pub fn tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_url.trim_end_matches('/'), tx_hash)
    }
}

/// Custom Debug that prints only endpoint origins (API keys live in paths).
impl fmt::Debug for ChainConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let origins: Vec<String> = self.rpc_urls.iter().map(|u| url_origin(u)).collect();
        f.debug_struct("ChainConfig")
            .field("name", &self.name)
            .field("chain_id", &self.chain_id)
            .field("rpc_urls", &origins)
            .field("explorer_url", &self.explorer_url)
            .field("currency_symbol", &self.currency_symbol)
            .finish()
    }
}

/// Deployed contract addresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractAddresses {
    /// Confidential metrics hub (settlement chain)
    pub metrics_hub: Address,
    /// Confidential-compute KMS verifier (settlement chain)
    pub kms: Address,
    pub l1_standard_bridge: Address,
    pub optimism_portal: Address,
    pub l2_output_oracle: Address,
    /// OP-stack predeploys on the rollup
    pub l2_standard_bridge: Address,
    pub l2_to_l1_message_passer: Address,
    /// Legacy ETH token address accepted by `withdrawTo`
    pub l2_eth_token: Address,
}

/// Gas limits for the state-changing calls the dashboard sends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasLimits {
    pub record: u64,
    pub regrant_latest: u64,
    pub grant_range: u64,
    pub publish: u64,
    pub withdraw: u64,
    /// Minimum gas forwarded to the message on the destination chain
    pub bridge_min_gas: u32,
}

impl Default for GasLimits {
    fn default() -> Self {
        Self {
            record: 1_200_000,
            regrant_latest: 500_000,
            grant_range: 800_000,
            publish: 800_000,
            withdraw: 900_000,
            bridge_min_gas: 200_000,
        }
    }
}

// ============================================================================
// Main Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct Config {
    /// Settlement chain (deposits originate here, withdrawals finalize here)
    pub l1: ChainConfig,
    /// Rollup chain
    pub l2: ChainConfig,
    pub contracts: ContractAddresses,
    pub relayer_url: String,
    pub gateway_url: String,

    /// Per-call JSON-RPC timeout
    pub rpc_timeout: Duration,
    pub retry: RetryConfig,
    /// Portal event scans
    pub portal_scan: LogScanConfig,
    /// Hub `Recorded` event scans
    pub history_scan: LogScanConfig,

    /// Blocks scanned back for `Recorded` provenance
    pub recorded_lookback: u64,
    /// Blocks scanned back for pending withdrawals
    pub origin_lookback: u64,
    pub max_recent_withdrawals: usize,
    /// Used when the oracle's finalization period cannot be read
    pub challenge_period: Duration,

    pub session_ttl: Duration,
    pub authorization_validity_days: u64,

    pub page_size: u64,
    pub bulk_chunk: u64,
    pub strict_chunk: u64,
    pub bulk_page_delay: Duration,
    pub analytics_tail: u64,

    pub gas: GasLimits,
    /// Kept aside from the balance when computing the max spendable amount
    pub gas_buffer_wei: U256,
    pub finalize_pause: Duration,
    pub chain_switch_settle: Duration,
    pub receipt_poll_interval: Duration,
    pub receipt_timeout: Duration,
}

fn default_challenge_period() -> Duration {
    Duration::from_secs(604_800)
}

fn default_rpc_timeout() -> Duration {
    Duration::from_millis(3_500)
}

/// 0.002 ETH
fn default_gas_buffer() -> U256 {
    U256::from(2_000_000_000_000_000u64)
}

impl Config {
    /// Sepolia / Base Sepolia deployment
    pub fn sepolia_base() -> Self {
        Self {
            l1: ChainConfig {
                name: "Sepolia".to_string(),
                chain_id: 11_155_111,
                rpc_urls: vec![
                    "https://ethereum-sepolia.publicnode.com".to_string(),
                    "https://rpc.ankr.com/eth_sepolia".to_string(),
                    "https://eth-sepolia.public.blastapi.io".to_string(),
                ],
                explorer_url: "https://sepolia.etherscan.io".to_string(),
                currency_symbol: "ETH".to_string(),
            },
            l2: ChainConfig {
                name: "Base Sepolia".to_string(),
                chain_id: 84_532,
                rpc_urls: vec!["https://sepolia.base.org".to_string()],
                explorer_url: "https://sepolia.basescan.org".to_string(),
                currency_symbol: "ETH".to_string(),
            },
            contracts: ContractAddresses {
                metrics_hub: address!("B6970Bd34dd8Ac7eE684dEFB61399D2B122905eB"),
                kms: address!("1364cBBf2cDF5032C47d8226a6f6FBD2AFCDacAC"),
                l1_standard_bridge: address!("fd0Bf71F60660E2f608ed56e1659C450eB113120"),
                optimism_portal: address!("49f53e41452C74589E85cA1677426Ba426459e85"),
                l2_output_oracle: address!("84457ca9D0163FbC4bbfe4Dfbb20ba46e48DF254"),
                l2_standard_bridge: address!("4200000000000000000000000000000000000010"),
                l2_to_l1_message_passer: address!("4200000000000000000000000000000000000016"),
                l2_eth_token: address!("DeadDeAddeAddEAddeadDEaDDEAdDeaDDeAD0000"),
            },
            relayer_url: "https://relayer.testnet.zama.cloud".to_string(),
            gateway_url: "https://gateway.sepolia.zama.ai/".to_string(),
            rpc_timeout: default_rpc_timeout(),
            retry: RetryConfig::default(),
            portal_scan: LogScanConfig::default(),
            history_scan: LogScanConfig {
                min_step: 1_000,
                ..LogScanConfig::default()
            },
            recorded_lookback: 500_000,
            origin_lookback: 140_000,
            max_recent_withdrawals: 10,
            challenge_period: default_challenge_period(),
            session_ttl: Duration::from_secs(60),
            authorization_validity_days: 7,
            page_size: 10,
            bulk_chunk: 300,
            strict_chunk: 350,
            bulk_page_delay: Duration::from_millis(60),
            analytics_tail: 300,
            gas: GasLimits::default(),
            gas_buffer_wei: default_gas_buffer(),
            finalize_pause: Duration::from_millis(200),
            chain_switch_settle: Duration::from_millis(250),
            receipt_poll_interval: Duration::from_millis(1_500),
            receipt_timeout: Duration::from_secs(300),
        }
    }

    /// Load configuration from environment variables
    /// Loads .env file if present, then reads from environment
    pub fn load() -> Result<Self> {
        Self::load_from_file(".env")
    }

    /// Load from a specific .env file path
    pub fn load_from_file(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            dotenvy::from_filename(path)
                .wrap_err_with(|| format!("Failed to load .env file from {}", path))?;
        }
        Self::load_from_env()
    }

    /// Apply environment overrides on top of [`Config::sepolia_base`]
    pub fn load_from_env() -> Result<Self> {
        let mut config = Self::sepolia_base();

        apply_chain_env(&mut config.l1, "L1")?;
        apply_chain_env(&mut config.l2, "L2")?;

        let c = &mut config.contracts;
        override_address(&mut c.metrics_hub, "METRICS_HUB_ADDRESS")?;
        override_address(&mut c.kms, "KMS_ADDRESS")?;
        override_address(&mut c.l1_standard_bridge, "L1_STANDARD_BRIDGE")?;
        override_address(&mut c.optimism_portal, "OPTIMISM_PORTAL")?;
        override_address(&mut c.l2_output_oracle, "L2_OUTPUT_ORACLE")?;
        override_address(&mut c.l2_standard_bridge, "L2_STANDARD_BRIDGE")?;
        override_address(&mut c.l2_to_l1_message_passer, "L2_TO_L1_MESSAGE_PASSER")?;

        if let Ok(v) = env::var("RELAYER_URL") {
            config.relayer_url = v;
        }
        if let Ok(v) = env::var("GATEWAY_URL") {
            config.gateway_url = v;
        }

        if let Some(ms) = parse_env::<u64>("RPC_TIMEOUT_MS")? {
            config.rpc_timeout = Duration::from_millis(ms);
        }
        if let Some(n) = parse_env::<u32>("RPC_RETRY_ATTEMPTS")? {
            config.retry.max_attempts = n;
        }
        if let Some(secs) = parse_env::<u64>("CHALLENGE_PERIOD_SECS")? {
            config.challenge_period = Duration::from_secs(secs);
        }
        if let Some(n) = parse_env::<u64>("RECORDED_LOOKBACK_BLOCKS")? {
            config.recorded_lookback = n;
        }
        if let Some(n) = parse_env::<u64>("ORIGIN_LOOKBACK_BLOCKS")? {
            config.origin_lookback = n;
        }
        if let Some(n) = parse_env::<u64>("HISTORY_PAGE_SIZE")? {
            config.page_size = n;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        for chain in [&self.l1, &self.l2] {
            if chain.rpc_urls.is_empty() {
                return Err(eyre!("{} needs at least one RPC URL", chain.name));
            }
            for (i, url) in chain.rpc_urls.iter().enumerate() {
                validate_rpc_url(url, &format!("{} RPC URL #{}", chain.name, i + 1))?;
            }
            if chain.chain_id == 0 || chain.chain_id > u32::MAX as u64 {
                return Err(eyre!(
                    "{} chain id {} must fit a non-zero u32 (hub key)",
                    chain.name,
                    chain.chain_id
                ));
            }
        }

        if self.l1.chain_id == self.l2.chain_id {
            return Err(eyre!(
                "L1 and L2 share chain id {}; directions would collide",
                self.l1.chain_id
            ));
        }

        if self.page_size == 0 || self.bulk_chunk == 0 || self.strict_chunk == 0 {
            return Err(eyre!("page and chunk sizes must be positive"));
        }

        for (name, scan) in [("portal", &self.portal_scan), ("history", &self.history_scan)] {
            if scan.min_step == 0 || scan.min_step > scan.initial_step {
                return Err(eyre!(
                    "{} scan floor {} must be in 1..={}",
                    name,
                    scan.min_step,
                    scan.initial_step
                ));
            }
        }

        if self.retry.max_attempts == 0 {
            return Err(eyre!("retry.max_attempts must be at least 1"));
        }

        Ok(())
    }

    /// Hub key for one direction
    pub fn pair(&self, direction: Direction) -> DirectionalPair {
        let (l1, l2) = (self.l1.chain_id as u32, self.l2.chain_id as u32);
        match direction {
            Direction::Deposit => DirectionalPair::new(l1, l2),
            Direction::Withdraw => DirectionalPair::new(l2, l1),
        }
    }

    /// Chain whose balance funds a transfer in `direction`
    pub fn source_chain(&self, direction: Direction) -> &ChainConfig {
        match direction {
            Direction::Deposit => &self.l1,
            Direction::Withdraw => &self.l2,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::sepolia_base()
    }
}

fn apply_chain_env(chain: &mut ChainConfig, prefix: &str) -> Result<()> {
    if let Ok(name) = env::var(format!("{prefix}_NAME")) {
        chain.name = name;
    }
    if let Some(id) = parse_env::<u64>(&format!("{prefix}_CHAIN_ID"))? {
        chain.chain_id = id;
    }
    if let Ok(raw) = env::var(format!("{prefix}_RPC_URLS")) {
        let urls = parse_rpc_urls(&raw);
        if urls.is_empty() {
            return Err(eyre!("{prefix}_RPC_URLS cannot be empty"));
        }
        chain.rpc_urls = urls;
    }
    if let Ok(url) = env::var(format!("{prefix}_EXPLORER_URL")) {
        chain.explorer_url = url;
    }
    Ok(())
}

fn override_address(slot: &mut Address, var: &str) -> Result<()> {
    if let Ok(raw) = env::var(var) {
        *slot = Address::from_str(raw.trim())
            .wrap_err_with(|| format!("{} must be a 20-byte hex address", var))?;
    }
    Ok(())
}

fn parse_env<T>(var: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .wrap_err_with(|| format!("{} has an invalid value", var)),
        Err(_) => Ok(None),
    }
}
