// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cf-storage: durable calculated field state, partition-aware

pub mod config;
pub mod embedded;
pub mod env;
pub mod error;
pub mod log;
pub mod record;
pub mod service;
pub mod tracker;

pub use config::{ConfigError, StateBackend, StorageConfig};
pub use embedded::{EmbeddedStateService, EmbeddedStore};
pub use error::StateStoreError;
pub use log::{LogError, LogRecord, LogStateService, MemoryLog, StateLog};
pub use record::{RecordHeaders, CF_ID_HEADER, ENTITY_ID_HEADER, TENANT_ID_HEADER};
pub use service::{CalculatedFieldStateService, PartitionGroup, PersistTicket, RestoreReport};
pub use tracker::{PartitionTracker, Rebalance};
