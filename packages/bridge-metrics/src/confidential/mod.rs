//! Confidential Reads
//!
//! ## Submodules
//!
//! - `relayer` - Seam to the confidential-compute relayer (keypairs, EIP-712 authorizations, decryption, encryption)
//! - `session` - Short-lived decryption sessions and their cache
//! - `reader` - Per-handle user decryption and public decryption over a cached session

pub mod reader;
pub mod relayer;
pub mod session;

pub use reader::{ConfidentialReader, DecryptOutcome};
pub use relayer::{EncryptedInput, Keypair, Relayer};
pub use session::{DecryptionSession, SessionCache};
