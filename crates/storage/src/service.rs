// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence seam for calculated field states.
//!
//! Writes are fire-and-forget: `persist_state` and `remove_state` return at
//! once with a [`PersistTicket`] the caller may await or drop. Failures are
//! logged by the service either way and never reach the calculation path.

use crate::error::StateStoreError;
use crate::tracker::PartitionTracker;
use async_trait::async_trait;
use cf_core::{CalculatedFieldState, CfEntityKey};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tokio::sync::oneshot;

/// Name of the partitioned stream a rebalance applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionGroup(pub String);

impl PartitionGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for PartitionGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// States recovered by a rebalance.
#[derive(Debug, Default)]
pub struct RestoreReport {
    pub restored: BTreeMap<CfEntityKey, CalculatedFieldState>,
    /// Partitions no longer owned; the caller evicts their states
    pub revoked: BTreeSet<u32>,
    /// Records that failed to decode and were skipped
    pub skipped: usize,
}

/// Completion of one asynchronous write.
#[must_use = "drop the ticket explicitly to ignore the outcome"]
pub struct PersistTicket {
    rx: oneshot::Receiver<Result<(), StateStoreError>>,
}

impl PersistTicket {
    /// A pending ticket and the sender that completes it.
    pub(crate) fn pending() -> (oneshot::Sender<Result<(), StateStoreError>>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }

    /// A ticket that has already completed.
    pub(crate) fn ready(result: Result<(), StateStoreError>) -> Self {
        let (tx, ticket) = Self::pending();
        let _ = tx.send(result);
        ticket
    }

    /// Wait for the write to finish.
    pub async fn wait(self) -> Result<(), StateStoreError> {
        self.rx.await.unwrap_or(Err(StateStoreError::Closed))
    }
}

/// Adapter for durable calculated field state
#[async_trait]
pub trait CalculatedFieldStateService: Send + Sync {
    /// Every stored state, for cold start.
    async fn restore_states(&self) -> Result<BTreeMap<CfEntityKey, CalculatedFieldState>, StateStoreError>;

    async fn restore_state(&self, key: &CfEntityKey) -> Result<Option<CalculatedFieldState>, StateStoreError>;

    fn persist_state(&self, key: CfEntityKey, state: &CalculatedFieldState) -> PersistTicket;

    fn remove_state(&self, key: CfEntityKey) -> PersistTicket;

    /// Take over `owned` partitions of `group` after a rebalance.
    ///
    /// Newly owned partitions are restored before they are marked live.
    async fn restore(&self, group: &PartitionGroup, owned: BTreeSet<u32>) -> Result<RestoreReport, StateStoreError>;

    fn tracker(&self) -> &PartitionTracker;
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
