//! Encrypted History
//!
//! ## Submodules
//!
//! - `hub` - Typed reads and writes against the metrics hub
//! - `paginator` - Tail pagination over the append-only history with self-healing grants
//! - `provenance` - Joins history indices to the transfer that produced them

pub mod hub;
pub mod paginator;
pub mod provenance;

pub use hub::MetricsHub;
pub use paginator::{HistoryPage, HistoryPaginator, HistoryRow, PageWindow};
pub use provenance::ProvenanceIndex;
