//! Bridge-Metrics: client core for the confidential bridge metrics dashboard
//!
//! This crate holds everything the dashboard does besides rendering:
//!
//! - **RPC** - JSON-RPC transport, retry with backoff, endpoint rotation, paged log scans
//! - **EVM** - Contract bindings (metrics hub, OP-stack bridge/portal/oracle), event parsing, typed reads
//! - **Wallet** - EIP-1193 seam for the injected wallet (chain switching, transactions, typed-data signing)
//! - **Confidential** - Relayer seam, decryption sessions, per-handle decryption
//! - **History** - Hub access, tail pagination with self-healing grants, provenance join
//! - **Analytics** - Rolling 24h/7d volume, median, percentile and size buckets
//! - **Withdrawal** - L2→L1 withdrawal status resolution, proving and finalization
//! - **Orchestrator** - Deposit/withdraw flows that record the encrypted metric afterwards
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! bridge-metrics = { path = "../bridge-metrics" }
//! ```
//!
//! The browser pieces (wallet provider, relayer SDK) are supplied by the
//! embedding application through the [`wallet::Eip1193Provider`] and
//! [`confidential::Relayer`] traits.

pub mod analytics;
pub mod clock;
pub mod config;
pub mod confidential;
pub mod error;
pub mod evm;
pub mod history;
pub mod orchestrator;
pub mod redact;
pub mod rpc;
pub mod types;
pub mod wallet;
pub mod withdrawal;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used items at the crate root
pub use analytics::{AnalyticsWindow, PrivateTotals, SizeBuckets};
pub use clock::{Clock, SystemClock};
pub use config::{ChainConfig, Config};
pub use confidential::{ConfidentialReader, DecryptOutcome, Relayer, SessionCache};
pub use error::{classify_error, Error, ErrorClass, Result};
pub use history::{HistoryPage, HistoryPaginator, HistoryRow, MetricsHub, PageWindow};
pub use orchestrator::{BridgeOrchestrator, BridgeTransfer};
pub use rpc::{EndpointSet, LogScanner, RetryConfig, RotatingClient, RpcTransport};
pub use types::{Amount, Direction, DirectionalPair, HistoryRecord};
pub use wallet::{Eip1193Provider, WalletClient};
pub use withdrawal::{WithdrawalProver, WithdrawalReport, WithdrawalResolver, WithdrawalStatus};
