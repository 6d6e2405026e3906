//! Decryption sessions
//!
//! A session bundles the ephemeral keypair with the wallet's signature over
//! the authorization typed data. It is reused for at most the configured TTL,
//! only for the account that signed it, and is dropped whenever an
//! authorization-changing transaction lands.

use alloy::primitives::Address;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

use super::relayer::Keypair;
use crate::redact::Redacted;

#[derive(Debug, Clone)]
pub struct DecryptionSession {
    pub owner: Address,
    pub keypair: Keypair,
    /// Wallet signature over the authorization typed data
    pub signature: Redacted<String>,
    pub start_timestamp: u64,
    pub duration_days: u64,
    pub created_at_ms: u64,
}

impl DecryptionSession {
    pub fn is_valid_for(&self, owner: Address, now_ms: u64, ttl: Duration) -> bool {
        self.owner == owner && now_ms.saturating_sub(self.created_at_ms) < ttl.as_millis() as u64
    }
}

/// Single-slot session cache
#[derive(Debug)]
pub struct SessionCache {
    ttl: Duration,
    slot: Mutex<Option<Arc<DecryptionSession>>>,
}

impl SessionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached session if it belongs to `owner` and has not expired
    pub fn get(&self, owner: Address, now_ms: u64) -> Option<Arc<DecryptionSession>> {
        let slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        slot.as_ref()
            .filter(|s| s.is_valid_for(owner, now_ms, self.ttl))
            .cloned()
    }

    pub fn store(&self, session: DecryptionSession) -> Arc<DecryptionSession> {
        let session = Arc::new(session);
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(session.clone());
        session
    }

    pub fn invalidate(&self) {
        let previous = self.slot.lock().unwrap_or_else(|e| e.into_inner()).take();
        if previous.is_some() {
            debug!("Decryption session invalidated");
        }
    }
}
