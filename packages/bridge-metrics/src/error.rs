//! Error taxonomy for the dashboard core
//!
//! Every fault is classified into an [`ErrorClass`] that decides how the
//! caller reacts: retry with backoff, rotate to the next endpoint, heal via a
//! decryption grant, or surface a short message to the user.

use alloy::primitives::{Address, B256, U256};
use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Maximum length of a status line shown to the user
const STATUS_LINE_MAX: usize = 180;

/// JSON-RPC / wallet error codes with a fixed meaning
const CODE_USER_REJECTED: i64 = 4001;
const CODE_LIMIT_EXCEEDED: i64 = -32005;
const CODE_BACKEND_UNAVAILABLE: i64 = -32011;
const CODE_METHOD_NOT_FOUND: i64 = -32601;
const CODE_RESOURCE_BUSY: i64 = 35;
const CODE_TOO_MANY_REQUESTS: i64 = 429;

#[derive(Debug, Error)]
pub enum Error {
    #[error("user rejected the request")]
    UserRejected,

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("all {attempted} endpoints failed, last error: {last}")]
    EndpointsExhausted { attempted: usize, last: Box<Error> },

    #[error("no RPC endpoints configured for {0}")]
    NoEndpoints(String),

    #[error("wallet error {code}: {message}")]
    Wallet { code: i64, message: String },

    #[error("wallet not connected")]
    WalletNotConnected,

    #[error("relayer error: {0}")]
    Relayer(String),

    #[error("decryption refused for handle {0}")]
    DecryptionRefused(B256),

    #[error("{label} not found at {address}")]
    ContractNotFound { label: &'static str, address: Address },

    #[error("insufficient balance: have {have} wei, need {need} wei")]
    InsufficientBalance { have: U256, need: U256 },

    #[error("transaction receipt not found for {0}")]
    ReceiptNotFound(B256),

    #[error("transaction {0} did not initiate a withdrawal")]
    NotAWithdrawal(B256),

    #[error("transaction {0} reverted")]
    Reverted(B256),

    #[error("no output root published yet for L2 block {0}")]
    OutputNotPublished(u64),

    #[error("{0}")]
    InvalidAmount(String),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("ABI error: {0}")]
    Abi(#[from] alloy::sol_types::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Classifies errors for retry, rotation and reporting decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Temporary failure - retry with backoff, then rotate endpoints
    Transient,
    /// Endpoint lacks the storage-proof method - rotate to the next endpoint
    ProofUnavailable,
    /// Wallet refused a signature or transaction - swallow silently
    UserRejected,
    /// Relayer refused to decrypt - heal with a grant
    Unauthorized,
    /// Required contract or funds missing - fail immediately
    Precondition,
    /// Permanent failure - do not retry
    Permanent,
    /// Unrecognised - not retried
    Unknown,
}

/// Classify an opaque error message
pub fn classify_error(error: &str) -> ErrorClass {
    let error_lower = error.to_lowercase();

    if error_lower.contains("user rejected")
        || error_lower.contains("user denied")
        || error_lower.contains("action_rejected")
        || error_lower.contains("request rejected")
    {
        return ErrorClass::UserRejected;
    }

    if error_lower.contains("eth_getproof")
        || error_lower.contains("getproof")
        || error_lower.contains("not available")
        || error_lower.contains("unsupported")
        || error_lower.contains("method not found")
    {
        return ErrorClass::ProofUnavailable;
    }

    if error_lower.contains("timeout")
        || error_lower.contains("timed out")
        || error_lower.contains("temporar")
        || error_lower.contains("busy")
        || error_lower.contains("no backend")
        || error_lower.contains("server error")
        || error_lower.contains("bad request")
        || error_lower.contains("service unavailable")
        || error_lower.contains("502")
        || error_lower.contains("503")
        || error_lower.contains("429")
        || error_lower.contains("too many")
        || error_lower.contains("rate limit")
        || error_lower.contains("connection")
        || error_lower.contains("network")
    {
        return ErrorClass::Transient;
    }

    if error_lower.contains("not authorized")
        || error_lower.contains("unauthorized")
        || error_lower.contains("not allowed")
    {
        return ErrorClass::Unauthorized;
    }

    if error_lower.contains("reverted")
        || error_lower.contains("invalid signature")
        || error_lower.contains("insufficient funds")
        || error_lower.contains("out of gas")
        || error_lower.contains("invalid params")
        || error_lower.contains("invalid argument")
    {
        return ErrorClass::Permanent;
    }

    ErrorClass::Unknown
}

impl Error {
    /// Build a wallet error, folding rejections into [`Error::UserRejected`]
    pub fn wallet(code: i64, message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if code == CODE_USER_REJECTED
            || lower.contains("denied")
            || lower.contains("rejected")
        {
            return Error::UserRejected;
        }
        Error::Wallet { code, message }
    }

    /// Classify this error
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::UserRejected => ErrorClass::UserRejected,
            Error::Rpc { code, message } => match *code {
                CODE_BACKEND_UNAVAILABLE
                | CODE_RESOURCE_BUSY
                | CODE_TOO_MANY_REQUESTS
                | CODE_LIMIT_EXCEEDED => ErrorClass::Transient,
                CODE_METHOD_NOT_FOUND => ErrorClass::ProofUnavailable,
                CODE_USER_REJECTED => ErrorClass::UserRejected,
                _ => classify_error(message),
            },
            Error::Http { status, .. } => match *status {
                400 | 408 | 429 | 500..=599 => ErrorClass::Transient,
                _ => ErrorClass::Permanent,
            },
            Error::Transport(_) | Error::Timeout { .. } => ErrorClass::Transient,
            Error::EndpointsExhausted { last, .. } => last.class(),
            Error::NoEndpoints(_) | Error::WalletNotConnected => ErrorClass::Precondition,
            Error::Wallet { message, .. } => classify_error(message),
            Error::Relayer(message) => classify_error(message),
            Error::DecryptionRefused(_) => ErrorClass::Unauthorized,
            Error::ContractNotFound { .. }
            | Error::InsufficientBalance { .. }
            | Error::InvalidAmount(_)
            | Error::OutputNotPublished(_) => ErrorClass::Precondition,
            // receipts lag behind submission
            Error::ReceiptNotFound(_) => ErrorClass::Transient,
            Error::NotAWithdrawal(_)
            | Error::Reverted(_)
            | Error::Decode(_)
            | Error::Abi(_)
            | Error::Json(_) => ErrorClass::Permanent,
        }
    }

    /// Whether a retry after backoff may succeed
    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    /// Whether building a storage proof may succeed on another endpoint
    pub fn is_proof_issue(&self) -> bool {
        matches!(
            self.class(),
            ErrorClass::Transient | ErrorClass::ProofUnavailable
        )
    }

    pub fn is_user_rejection(&self) -> bool {
        self.class() == ErrorClass::UserRejected
    }

    /// Single-line message suitable for the dashboard status bar
    pub fn short_message(&self) -> String {
        let raw = self.to_string();
        let trimmed = raw.strip_prefix("Error:").unwrap_or(&raw).trim();
        let collapsed = trimmed.split_whitespace().collect::<Vec<_>>().join(" ");
        collapsed.chars().take(STATUS_LINE_MAX).collect()
    }
}

/// Status line for a failed operation; user cancellations produce none.
pub fn status_line(error: &Error) -> Option<String> {
    if error.is_user_rejection() {
        None
    } else {
        Some(error.short_message())
    }
}
