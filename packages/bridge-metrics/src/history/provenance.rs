//! Provenance join
//!
//! Maps history indices to the transaction a row should link to, using the
//! hub's `Recorded` events. Provenance is decoration: a failed scan yields an
//! empty index and rows simply carry no link.

use alloy::primitives::{Address, B256};
use std::collections::HashMap;
use tracing::warn;

use super::hub::MetricsHub;
use crate::evm::RecordedEvent;
use crate::types::DirectionalPair;

#[derive(Debug, Clone, Default)]
pub struct ProvenanceIndex {
    by_index: HashMap<u64, RecordedEvent>,
}

impl ProvenanceIndex {
    /// Later events win for a repeated index
    pub fn from_events(events: impl IntoIterator<Item = RecordedEvent>) -> Self {
        let by_index = events.into_iter().map(|e| (e.index, e)).collect();
        Self { by_index }
    }

    /// Scan the hub; never fails
    pub async fn load(hub: &MetricsHub, pair: DirectionalPair, user: Address, lookback: u64) -> Self {
        match hub.recorded_events(pair, user, lookback).await {
            Ok(events) => Self::from_events(events),
            Err(e) => {
                warn!(pair = %pair, error = %e, "Provenance scan failed");
                Self::default()
            }
        }
    }

    /// Origin transfer if recorded, else the recording transaction
    pub fn tx_for(&self, index: u64) -> Option<B256> {
        self.by_index.get(&index).and_then(RecordedEvent::display_tx)
    }

    pub fn len(&self) -> usize {
        self.by_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_index.is_empty()
    }
}
