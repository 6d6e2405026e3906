//! EVM Chain Support Module
//!
//! ## Submodules
//!
//! - `contracts` - Metrics hub and OP-stack bindings using alloy sol! macro
//! - `events` - `Recorded` / `MessagePassed` parsing and withdrawal hashing
//! - `reader` - Typed chain reads over the rotating RPC client

pub mod contracts;
pub mod events;
pub mod reader;

// Re-export commonly used items
pub use contracts::{
    IL1StandardBridge, IL2OutputOracle, IL2StandardBridge, IL2ToL1MessagePasser, IMetricsHub,
    IOptimismPortal, OutputProposal, OutputRootProof, WithdrawalTransaction,
};
pub use events::{message_slot, output_root, withdrawal_hash, RecordedEvent, WithdrawalMessage};
pub use reader::ChainReader;
