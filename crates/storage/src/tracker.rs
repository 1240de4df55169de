// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Partition ownership and liveness.
//!
//! A partition is owned once the cluster assigns it to this node and live
//! once its states are restored. Live-update consumers wait for liveness so
//! they never compute against state that hasn't been replayed yet.

use std::collections::BTreeSet;
use tokio::sync::watch;

/// Outcome of applying a new assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rebalance {
    /// Newly owned, not yet live
    pub added: BTreeSet<u32>,
    /// No longer owned; their states should be evicted
    pub revoked: BTreeSet<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Partitions {
    owned: BTreeSet<u32>,
    live: BTreeSet<u32>,
}

/// Shared view of owned and live partitions.
pub struct PartitionTracker {
    tx: watch::Sender<Partitions>,
}

impl Default for PartitionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PartitionTracker {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Partitions::default());
        Self { tx }
    }

    /// Replace the owned set. Revoked partitions stop being live at once.
    pub fn assign(&self, owned: BTreeSet<u32>) -> Rebalance {
        let mut rebalance = Rebalance::default();
        self.tx.send_modify(|p| {
            rebalance.added = owned.difference(&p.owned).copied().collect();
            rebalance.revoked = p.owned.difference(&owned).copied().collect();
            p.live.retain(|n| owned.contains(n));
            p.owned = owned;
        });
        if !rebalance.added.is_empty() || !rebalance.revoked.is_empty() {
            tracing::debug!(added = ?rebalance.added, revoked = ?rebalance.revoked, "partition ownership changed");
        }
        rebalance
    }

    /// Mark restored partitions live. Partitions no longer owned are ignored.
    pub fn mark_live(&self, partitions: &BTreeSet<u32>) {
        self.tx.send_modify(|p| {
            let owned: Vec<u32> = partitions.intersection(&p.owned).copied().collect();
            p.live.extend(owned);
        });
    }

    pub fn owned(&self) -> BTreeSet<u32> {
        self.tx.borrow().owned.clone()
    }

    pub fn live(&self) -> BTreeSet<u32> {
        self.tx.borrow().live.clone()
    }

    pub fn is_owned(&self, partition: u32) -> bool {
        self.tx.borrow().owned.contains(&partition)
    }

    pub fn is_live(&self, partition: u32) -> bool {
        self.tx.borrow().live.contains(&partition)
    }

    /// Wait until `partition` is live.
    ///
    /// Returns false if the partition is not owned, or stops being owned
    /// while waiting.
    pub async fn wait_live(&self, partition: u32) -> bool {
        let mut rx = self.tx.subscribe();
        loop {
            {
                let p = rx.borrow_and_update();
                if p.live.contains(&partition) {
                    return true;
                }
                if !p.owned.contains(&partition) {
                    return false;
                }
            }
            if rx.changed().await.is_err() {
                return false;
            }
        }
    }
}

#[cfg(test)]
#[path = "tracker_tests.rs"]
mod tests;
