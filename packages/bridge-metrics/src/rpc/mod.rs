//! JSON-RPC plumbing: transport, retry, endpoint rotation, paged log scans

pub mod fallback;
pub mod log_scan;
pub mod retry;
pub mod transport;

pub use fallback::{rotate, EndpointSet, RotatingClient};
pub use log_scan::{LogScanConfig, LogScanner};
pub use retry::{with_retry, RetryConfig};
pub use transport::{HttpTransport, RpcTransport};
