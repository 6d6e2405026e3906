//! Relayer seam
//!
//! The relayer SDK lives in the embedding application. It generates the
//! ephemeral decryption keypair, builds the EIP-712 authorization the wallet
//! signs, and performs user and public decryption plus input encryption.

use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

use super::session::DecryptionSession;
use crate::error::Result;
use crate::redact::Redacted;

/// Ephemeral keypair the relayer re-encrypts plaintexts to
#[derive(Debug, Clone)]
pub struct Keypair {
    pub public_key: String,
    pub private_key: Redacted<String>,
}

/// Encrypted 128-bit amount plus its proof of well-formedness
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedInput {
    pub handle: B256,
    pub input_proof: Bytes,
}

#[async_trait]
pub trait Relayer: Send + Sync {
    async fn generate_keypair(&self) -> Result<Keypair>;

    /// EIP-712 typed data authorizing `public_key` to decrypt handles of
    /// `contracts` for `duration_days` starting at `start_timestamp`.
    fn create_authorization(
        &self,
        public_key: &str,
        contracts: &[Address],
        start_timestamp: u64,
        duration_days: u64,
    ) -> Result<Value>;

    /// Decrypt handles of `contract` that the session owner may read.
    ///
    /// Handles the owner is not authorized for produce an error or are
    /// missing from the returned map; neither is ever reported as zero.
    async fn user_decrypt(
        &self,
        handles: &[B256],
        contract: Address,
        session: &DecryptionSession,
    ) -> Result<HashMap<B256, U256>>;

    /// Decrypt handles that were made publicly decryptable
    async fn public_decrypt(&self, handles: &[B256]) -> Result<HashMap<B256, U256>>;

    /// Encrypt `amount` as an input to `contract` on behalf of `user`
    async fn encrypt_u128(&self, contract: Address, user: Address, amount: u128) -> Result<EncryptedInput>;
}
