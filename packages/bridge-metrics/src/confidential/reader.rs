//! Per-handle decryption over a cached session
//!
//! Handles are decrypted one at a time so that a single unauthorized handle
//! does not sink the whole batch: every failure is recorded by position and
//! the rest of the batch still resolves.

use alloy::primitives::{Address, B256, U256};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

use super::relayer::{EncryptedInput, Relayer};
use super::session::{DecryptionSession, SessionCache};
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::types::Amount;
use crate::wallet::WalletClient;

/// Result of decrypting a batch of handles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptOutcome {
    /// One entry per input handle, `Private` where decryption failed
    pub amounts: Vec<Amount>,
    /// Positions (into the input) that failed
    pub failed: Vec<usize>,
}

impl DecryptOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct ConfidentialReader {
    relayer: Arc<dyn Relayer>,
    wallet: Arc<WalletClient>,
    clock: Arc<dyn Clock>,
    sessions: Arc<SessionCache>,
    contract: Address,
    validity_days: u64,
    /// Serialises session creation so concurrent reads share one signature
    creating: AsyncMutex<()>,
}

impl ConfidentialReader {
    pub fn new(
        relayer: Arc<dyn Relayer>,
        wallet: Arc<WalletClient>,
        clock: Arc<dyn Clock>,
        sessions: Arc<SessionCache>,
        contract: Address,
        validity_days: u64,
    ) -> Self {
        Self {
            relayer,
            wallet,
            clock,
            sessions,
            contract,
            validity_days,
            creating: AsyncMutex::new(()),
        }
    }

    pub fn sessions(&self) -> &Arc<SessionCache> {
        &self.sessions
    }

    pub fn invalidate_session(&self) {
        self.sessions.invalidate();
    }

    /// Cached session for the connected account, or a freshly signed one
    pub async fn session(&self) -> Result<Arc<DecryptionSession>> {
        let owner = self.wallet.account().await?;
        if let Some(session) = self.sessions.get(owner, self.clock.unix_millis()) {
            return Ok(session);
        }

        let _guard = self.creating.lock().await;
        if let Some(session) = self.sessions.get(owner, self.clock.unix_millis()) {
            return Ok(session);
        }

        let keypair = self.relayer.generate_keypair().await?;
        let start_timestamp = self.clock.unix_now();
        let typed_data = self.relayer.create_authorization(
            &keypair.public_key,
            &[self.contract],
            start_timestamp,
            self.validity_days,
        )?;
        let signature = self.wallet.sign_typed_data(&typed_data).await?;

        info!(owner = %owner, days = self.validity_days, "New decryption session");
        Ok(self.sessions.store(DecryptionSession {
            owner,
            keypair,
            signature,
            start_timestamp,
            duration_days: self.validity_days,
            created_at_ms: self.clock.unix_millis(),
        }))
    }

    async fn decrypt_with(&self, session: &DecryptionSession, handle: B256) -> Result<U256> {
        // an unset ciphertext reads as zero on chain
        if handle.is_zero() {
            return Ok(U256::ZERO);
        }
        let values = self
            .relayer
            .user_decrypt(&[handle], self.contract, session)
            .await?;
        values
            .get(&handle)
            .copied()
            .ok_or(Error::DecryptionRefused(handle))
    }

    /// Decrypt a single handle the connected account is authorized for
    pub async fn decrypt_one(&self, handle: B256) -> Result<U256> {
        let session = self.session().await?;
        self.decrypt_with(&session, handle).await
    }

    /// Decrypt each handle independently.
    ///
    /// Session errors (e.g. the user refusing to sign) abort the batch;
    /// per-handle failures are recorded and the batch continues.
    pub async fn decrypt_batch(&self, handles: &[B256]) -> Result<DecryptOutcome> {
        let session = self.session().await?;
        let mut amounts = Vec::with_capacity(handles.len());
        let mut failed = Vec::new();

        for (position, handle) in handles.iter().enumerate() {
            match self.decrypt_with(&session, *handle).await {
                Ok(value) => amounts.push(Amount::Known(value)),
                Err(e) => {
                    debug!(handle = %handle, error = %e, "Handle decryption failed");
                    amounts.push(Amount::Private);
                    failed.push(position);
                }
            }
        }

        Ok(DecryptOutcome { amounts, failed })
    }

    /// Decrypt a publicly decryptable handle; the zero handle reads as zero
    pub async fn public_decrypt(&self, handle: B256) -> Result<U256> {
        if handle.is_zero() {
            return Ok(U256::ZERO);
        }
        let values = self.relayer.public_decrypt(&[handle]).await?;
        values
            .get(&handle)
            .copied()
            .ok_or(Error::DecryptionRefused(handle))
    }

    /// Encrypt a wei amount as a 128-bit input to the hub for the connected account
    pub async fn encrypt_amount(&self, amount: U256) -> Result<EncryptedInput> {
        let amount = u128::try_from(amount)
            .map_err(|_| Error::InvalidAmount("Amount exceeds 128 bits".into()))?;
        let user = self.wallet.account().await?;
        self.relayer.encrypt_u128(self.contract, user, amount).await
    }
}
