//! Event parsing and withdrawal hashing
//!
//! Typed views over the raw logs the dashboard reads: the hub's `Recorded`
//! provenance events and the rollup's `MessagePassed` withdrawal messages,
//! plus the OP-stack hash commitments derived from them.

use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use alloy::rpc::types::Log;
use alloy::sol_types::{SolEvent, SolValue};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::contracts::{IL2ToL1MessagePasser, IMetricsHub, OutputRootProof, WithdrawalTransaction};
use crate::types::DirectionalPair;

// ============================================================================
// Recorded
// ============================================================================

/// Hub `Recorded` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedEvent {
    pub pair: DirectionalPair,
    pub user: Address,
    /// History index the record was appended at
    pub index: u64,
    /// Bridge transfer the record describes; zero when not supplied
    pub origin_tx: B256,
    /// Transaction that wrote the record
    pub record_tx: Option<B256>,
    pub block_number: u64,
}

impl RecordedEvent {
    /// Parse a hub log, `None` if it is not a well-formed `Recorded`
    pub fn from_log(log: &Log) -> Option<Self> {
        let event = log.log_decode::<IMetricsHub::Recorded>().ok()?.inner.data;

        let index = match u64::try_from(event.idx) {
            Ok(i) => i,
            Err(_) => {
                warn!(idx = %event.idx, "Recorded index exceeds u64, ignoring log");
                return None;
            }
        };

        Some(Self {
            pair: DirectionalPair::new(event.src, event.dst),
            user: event.user,
            index,
            origin_tx: event.originTx,
            record_tx: log.transaction_hash,
            block_number: log.block_number.unwrap_or_default(),
        })
    }

    /// Origin transfer hash, when one was supplied
    pub fn origin(&self) -> Option<B256> {
        (!self.origin_tx.is_zero()).then_some(self.origin_tx)
    }

    /// Hash to link in the UI: the origin transfer if known, else the record tx
    pub fn display_tx(&self) -> Option<B256> {
        self.origin().or(self.record_tx)
    }
}

// ============================================================================
// Withdrawals
// ============================================================================

/// Withdrawal message emitted by the L2ToL1MessagePasser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalMessage {
    pub nonce: U256,
    pub sender: Address,
    pub target: Address,
    pub value: U256,
    pub gas_limit: U256,
    pub data: Bytes,
    /// Hash as emitted by the message passer
    pub withdrawal_hash: B256,
}

impl WithdrawalMessage {
    pub fn from_log(log: &Log) -> Option<Self> {
        let event = log
            .log_decode::<IL2ToL1MessagePasser::MessagePassed>()
            .ok()?
            .inner
            .data;

        Some(Self {
            nonce: event.nonce,
            sender: event.sender,
            target: event.target,
            value: event.value,
            gas_limit: event.gasLimit,
            data: event.data,
            withdrawal_hash: event.withdrawalHash,
        })
    }

    /// First withdrawal message among a receipt's logs
    pub fn find(logs: &[Log], message_passer: Address) -> Option<Self> {
        let topic = IL2ToL1MessagePasser::MessagePassed::SIGNATURE_HASH;
        logs.iter()
            .filter(|log| log.address() == message_passer)
            .filter(|log| log.topics().first() == Some(&topic))
            .find_map(Self::from_log)
    }

    pub fn to_transaction(&self) -> WithdrawalTransaction {
        WithdrawalTransaction {
            nonce: self.nonce,
            sender: self.sender,
            target: self.target,
            value: self.value,
            gasLimit: self.gas_limit,
            data: self.data.clone(),
        }
    }

    /// Recompute the hash from the message fields
    pub fn computed_hash(&self) -> B256 {
        withdrawal_hash(&self.to_transaction())
    }

    /// Emitted hash, logging when it disagrees with the recomputed one
    pub fn verified_hash(&self) -> B256 {
        let computed = self.computed_hash();
        if computed != self.withdrawal_hash {
            warn!(
                emitted = %self.withdrawal_hash,
                computed = %computed,
                "Withdrawal hash mismatch, using emitted hash"
            );
        }
        self.withdrawal_hash
    }
}

/// `keccak256(abi.encode(nonce, sender, target, value, gasLimit, data))`
pub fn withdrawal_hash(tx: &WithdrawalTransaction) -> B256 {
    let encoded = (
        tx.nonce,
        tx.sender,
        tx.target,
        tx.value,
        tx.gasLimit,
        tx.data.clone(),
    )
        .abi_encode_params();
    keccak256(encoded)
}

/// Message-passer storage slot marking `withdrawal_hash` as sent
pub fn message_slot(withdrawal_hash: B256) -> B256 {
    let mut preimage = [0u8; 64];
    preimage[..32].copy_from_slice(withdrawal_hash.as_slice());
    keccak256(preimage)
}

/// Output root committed to by an output proposal (version 0)
pub fn output_root(proof: &OutputRootProof) -> B256 {
    let mut preimage = Vec::with_capacity(128);
    preimage.extend_from_slice(proof.version.as_slice());
    preimage.extend_from_slice(proof.stateRoot.as_slice());
    preimage.extend_from_slice(proof.messagePasserStorageRoot.as_slice());
    preimage.extend_from_slice(proof.latestBlockhash.as_slice());
    keccak256(preimage)
}
