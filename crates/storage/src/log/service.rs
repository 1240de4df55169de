// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{LogRecord, StateLog};
use crate::error::StateStoreError;
use crate::record::{decode_state, encode_state, RecordHeaders};
use crate::service::{CalculatedFieldStateService, PartitionGroup, PersistTicket, RestoreReport};
use crate::tracker::PartitionTracker;
use async_trait::async_trait;
use cf_core::{CalculatedFieldState, CfEntityKey, Partitioner};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// State service backed by a partitioned log.
///
/// Writes go through one writer task so they reach the log in the order
/// they were issued.
pub struct LogStateService {
    log: Arc<dyn StateLog>,
    partitioner: Partitioner,
    tracker: PartitionTracker,
    writes: mpsc::UnboundedSender<PendingWrite>,
}

struct PendingWrite {
    key: CfEntityKey,
    op: &'static str,
    partition: u32,
    record: LogRecord,
    done: oneshot::Sender<Result<(), StateStoreError>>,
}

/// Result of replaying one partition.
#[derive(Default)]
struct Replay {
    states: BTreeMap<CfEntityKey, CalculatedFieldState>,
    skipped: usize,
}

impl LogStateService {
    /// Partition with the log's own partition count, matching the live stream.
    ///
    /// Spawns the writer task, so this must run inside a Tokio runtime.
    pub fn new(log: Arc<dyn StateLog>) -> Self {
        let partitioner = Partitioner::new(log.partitions());
        let (writes, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(Arc::clone(&log), rx));
        Self { log, partitioner, tracker: PartitionTracker::new(), writes }
    }

    pub fn partitioner(&self) -> Partitioner {
        self.partitioner
    }

    fn partition_for(&self, key: &CfEntityKey) -> u32 {
        self.partitioner.partition_for(&key.entity_id)
    }

    fn check_partition(&self, partition: u32) -> Result<(), StateStoreError> {
        let partitions = self.partitioner.partitions();
        if partition >= partitions {
            return Err(StateStoreError::UnknownPartition { partition, partitions });
        }
        Ok(())
    }

    /// Last record per key wins; a tombstone deletes. Undecodable records are
    /// logged and skipped.
    async fn replay(&self, partition: u32) -> Result<Replay, StateStoreError> {
        let mut replay = Replay::default();
        for record in self.log.replay(partition).await? {
            let key = match record.headers.key() {
                Ok(key) => key,
                Err(e) => {
                    tracing::warn!(partition, entity_id = %record.key, error = %e, "skipping state record without key");
                    replay.skipped += 1;
                    continue;
                }
            };
            let Some(body) = record.body else {
                replay.states.remove(&key);
                continue;
            };
            match decode_state(&body) {
                Ok(state) => {
                    replay.states.insert(key, state);
                }
                Err(e) => {
                    tracing::warn!(partition, key = %key, error = %e, "skipping undecodable state record");
                    replay.skipped += 1;
                }
            }
        }
        Ok(replay)
    }

    fn write(&self, key: CfEntityKey, op: &'static str, body: Option<Vec<u8>>) -> PersistTicket {
        let partition = self.partition_for(&key);
        let record = LogRecord { key: key.entity_id, headers: RecordHeaders::for_key(&key), body };
        let (done, ticket) = PersistTicket::pending();
        if let Err(mpsc::error::SendError(write)) = self.writes.send(PendingWrite { key, op, partition, record, done }) {
            tracing::warn!(key = %write.key, op, "state writer stopped, dropping write");
            let _ = write.done.send(Err(StateStoreError::Closed));
        }
        ticket
    }
}

async fn run_writer(log: Arc<dyn StateLog>, mut rx: mpsc::UnboundedReceiver<PendingWrite>) {
    while let Some(write) = rx.recv().await {
        let result = log.append(write.partition, write.record).await.map(|_| ()).map_err(StateStoreError::from);
        if let Err(e) = &result {
            tracing::warn!(key = %write.key, op = write.op, error = %e, "failed to write calculated field state");
        }
        let _ = write.done.send(result);
    }
}

#[async_trait]
impl CalculatedFieldStateService for LogStateService {
    async fn restore_states(&self) -> Result<BTreeMap<CfEntityKey, CalculatedFieldState>, StateStoreError> {
        let mut states = BTreeMap::new();
        for partition in 0..self.partitioner.partitions() {
            states.extend(self.replay(partition).await?.states);
        }
        Ok(states)
    }

    async fn restore_state(&self, key: &CfEntityKey) -> Result<Option<CalculatedFieldState>, StateStoreError> {
        let mut replay = self.replay(self.partition_for(key)).await?;
        Ok(replay.states.remove(key))
    }

    fn persist_state(&self, key: CfEntityKey, state: &CalculatedFieldState) -> PersistTicket {
        match encode_state(state) {
            Ok(body) => self.write(key, "persist", Some(body)),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "failed to encode calculated field state");
                PersistTicket::ready(Err(e))
            }
        }
    }

    fn remove_state(&self, key: CfEntityKey) -> PersistTicket {
        self.write(key, "remove", None)
    }

    async fn restore(&self, group: &PartitionGroup, owned: BTreeSet<u32>) -> Result<RestoreReport, StateStoreError> {
        for partition in &owned {
            self.check_partition(*partition)?;
        }
        let rebalance = self.tracker.assign(owned);
        let mut report = RestoreReport { revoked: rebalance.revoked, ..RestoreReport::default() };

        // owned but not yet live, which includes partitions a failed restore left behind
        let pending: BTreeSet<u32> = self.tracker.owned().difference(&self.tracker.live()).copied().collect();

        // replay completes for every pending partition before any of them goes live
        for partition in &pending {
            let replay = self.replay(*partition).await?;
            report.skipped += replay.skipped;
            report.restored.extend(replay.states);
        }
        self.tracker.mark_live(&pending);

        tracing::info!(
            group = %group,
            skipped = report.skipped,
            "restored {} states for partitions {:?}",
            report.restored.len(),
            pending,
        );
        Ok(report)
    }

    fn tracker(&self) -> &PartitionTracker {
        &self.tracker
    }
}
