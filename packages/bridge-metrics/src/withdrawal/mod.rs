//! L2→L1 Withdrawals
//!
//! ## Submodules
//!
//! - `status` - Lifecycle stages, status reports and ETA formatting
//! - `portal` - Settlement-chain reads shared by the status strategies and the prover
//! - `strategy` - Ordered status strategies with per-strategy fall-through rules
//! - `resolver` - Status resolution for one withdrawal and the pending list
//! - `prover` - Proof construction, proving and finalization

pub mod portal;
pub mod prover;
pub mod resolver;
pub mod status;
pub mod strategy;

pub use portal::PortalView;
pub use prover::{FinalizeSummary, WithdrawalProver};
pub use resolver::{recent_origins, WithdrawalResolver};
pub use status::{format_eta, WithdrawalReport, WithdrawalStatus};
pub use strategy::{
    OutputRootStrategy, PortalEventStrategy, PortalStorageStrategy, StatusContext, StatusFinding,
    StatusStrategy,
};
