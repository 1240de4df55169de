// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::EmbeddedStore;
use crate::error::StateStoreError;
use crate::service::{CalculatedFieldStateService, PartitionGroup, PersistTicket, RestoreReport};
use crate::tracker::PartitionTracker;
use async_trait::async_trait;
use cf_core::{CalculatedFieldState, CfEntityKey};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

/// State service backed by a local [`EmbeddedStore`].
///
/// Writes are synchronous, so a completed call is durable. Every stored state
/// is restored once, on the first rebalance of a node that owns nothing yet.
pub struct EmbeddedStateService {
    store: Mutex<EmbeddedStore>,
    tracker: PartitionTracker,
    restored: AtomicBool,
}

impl EmbeddedStateService {
    pub fn new(store: EmbeddedStore) -> Self {
        Self { store: Mutex::new(store), tracker: PartitionTracker::new(), restored: AtomicBool::new(false) }
    }

    pub fn open(path: &Path, compact_threshold: usize) -> Result<Self, StateStoreError> {
        Ok(Self::new(EmbeddedStore::open(path, compact_threshold)?))
    }

    /// Decode every row, skipping those that fail.
    fn decode_all(&self) -> (BTreeMap<CfEntityKey, CalculatedFieldState>, usize) {
        let store = self.store.lock();
        let mut states = BTreeMap::new();
        let mut skipped = 0;
        for (key, raw) in store.iter() {
            match serde_json::from_value::<CalculatedFieldState>(raw.clone()) {
                Ok(state) => {
                    states.insert(*key, state);
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "skipping undecodable state record");
                    skipped += 1;
                }
            }
        }
        (states, skipped)
    }

    fn logged(key: CfEntityKey, op: &'static str, result: Result<(), StateStoreError>) -> PersistTicket {
        if let Err(e) = &result {
            tracing::warn!(key = %key, op, error = %e, "failed to write calculated field state");
        }
        PersistTicket::ready(result)
    }
}

#[async_trait]
impl CalculatedFieldStateService for EmbeddedStateService {
    async fn restore_states(&self) -> Result<BTreeMap<CfEntityKey, CalculatedFieldState>, StateStoreError> {
        Ok(self.decode_all().0)
    }

    async fn restore_state(&self, key: &CfEntityKey) -> Result<Option<CalculatedFieldState>, StateStoreError> {
        let raw = self.store.lock().get(key).cloned();
        match raw {
            Some(raw) => Ok(Some(serde_json::from_value(raw)?)),
            None => Ok(None),
        }
    }

    fn persist_state(&self, key: CfEntityKey, state: &CalculatedFieldState) -> PersistTicket {
        let result = serde_json::to_value(state)
            .map_err(StateStoreError::from)
            .and_then(|raw| self.store.lock().put(key, raw));
        Self::logged(key, "persist", result)
    }

    fn remove_state(&self, key: CfEntityKey) -> PersistTicket {
        let result = self.store.lock().delete(&key).map(|_| ());
        Self::logged(key, "remove", result)
    }

    async fn restore(&self, group: &PartitionGroup, owned: BTreeSet<u32>) -> Result<RestoreReport, StateStoreError> {
        let first_boot = self.tracker.owned().is_empty() && !self.restored.swap(true, Ordering::SeqCst);
        let rebalance = self.tracker.assign(owned);
        let mut report = RestoreReport { revoked: rebalance.revoked, ..RestoreReport::default() };
        if first_boot {
            let (states, skipped) = self.decode_all();
            report.restored = states;
            report.skipped = skipped;
            tracing::info!(
                group = %group,
                skipped,
                "restored {} states for partitions {:?}",
                report.restored.len(),
                self.tracker.owned(),
            );
        }
        self.tracker.mark_live(&self.tracker.owned());
        Ok(report)
    }

    fn tracker(&self) -> &PartitionTracker {
        &self.tracker
    }
}
