// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State keys and the entity partitioning function.

use crate::id::{CalculatedFieldId, EntityId, TenantId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Identity of one calculated field state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CfEntityKey {
    pub tenant_id: TenantId,
    pub cf_id: CalculatedFieldId,
    pub entity_id: EntityId,
}

impl CfEntityKey {
    pub fn new(tenant_id: TenantId, cf_id: CalculatedFieldId, entity_id: EntityId) -> Self {
        Self { tenant_id, cf_id, entity_id }
    }
}

impl fmt::Display for CfEntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.tenant_id, self.cf_id, self.entity_id)
    }
}

/// Maps entities to partitions.
///
/// State writes and the live updates that caused them must use the same
/// partitioner so both stay ordered within a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partitioner {
    partitions: u32,
}

impl Partitioner {
    /// A partitioner over `partitions` partitions (at least one).
    pub fn new(partitions: u32) -> Self {
        Self { partitions: partitions.max(1) }
    }

    pub fn partitions(&self) -> u32 {
        self.partitions
    }

    pub fn partition_for(&self, entity_id: &EntityId) -> u32 {
        let digest = Sha256::digest(entity_id.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        (u64::from_be_bytes(prefix) % u64::from(self.partitions)) as u32
    }
}

#[cfg(test)]
#[path = "partition_tests.rs"]
mod tests;
