// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Partitioned, replicated log seam.
//!
//! The log backend writes one record per state change, keyed by entity id,
//! to the partition the live-update stream uses for that entity. Replaying a
//! partition front to back and keeping the last record per key rebuilds the
//! states it holds.

mod service;

pub use service::LogStateService;

use crate::record::RecordHeaders;
use async_trait::async_trait;
use cf_core::EntityId;
use parking_lot::Mutex;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LogError {
    #[error("partition {0} does not exist")]
    UnknownPartition(u32),
    #[error("log is closed")]
    Closed,
}

/// One message on the log. A tombstone has no body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub key: EntityId,
    pub headers: RecordHeaders,
    pub body: Option<Vec<u8>>,
}

impl LogRecord {
    pub fn is_tombstone(&self) -> bool {
        self.body.is_none()
    }
}

/// Adapter for the partitioned log holding state records
#[async_trait]
pub trait StateLog: Send + Sync {
    fn partitions(&self) -> u32;

    /// Append to `partition`, returning the record's offset.
    async fn append(&self, partition: u32, record: LogRecord) -> Result<u64, LogError>;

    /// Every record of `partition` from the start up to the current end.
    async fn replay(&self, partition: u32) -> Result<Vec<LogRecord>, LogError>;
}

/// In-process log for single-node deployments and tests.
pub struct MemoryLog {
    inner: Mutex<MemoryLogState>,
}

struct MemoryLogState {
    partitions: Vec<Vec<LogRecord>>,
    closed: bool,
}

impl MemoryLog {
    pub fn new(partitions: u32) -> Self {
        let partitions = (0..partitions.max(1)).map(|_| Vec::new()).collect();
        Self { inner: Mutex::new(MemoryLogState { partitions, closed: false }) }
    }

    /// Reject every later append and replay.
    pub fn close(&self) {
        self.inner.lock().closed = true;
    }

    /// Number of records in `partition`, tombstones included.
    pub fn len(&self, partition: u32) -> usize {
        self.inner.lock().partitions.get(partition as usize).map_or(0, Vec::len)
    }

    /// Append raw records, bypassing the state service.
    pub fn push_raw(&self, partition: u32, record: LogRecord) -> Result<u64, LogError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(LogError::Closed);
        }
        let records = inner.partitions.get_mut(partition as usize).ok_or(LogError::UnknownPartition(partition))?;
        records.push(record);
        Ok(records.len() as u64 - 1)
    }
}

#[async_trait]
impl StateLog for MemoryLog {
    fn partitions(&self) -> u32 {
        self.inner.lock().partitions.len() as u32
    }

    async fn append(&self, partition: u32, record: LogRecord) -> Result<u64, LogError> {
        self.push_raw(partition, record)
    }

    async fn replay(&self, partition: u32) -> Result<Vec<LogRecord>, LogError> {
        let inner = self.inner.lock();
        if inner.closed {
            return Err(LogError::Closed);
        }
        inner.partitions.get(partition as usize).cloned().ok_or(LogError::UnknownPartition(partition))
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
