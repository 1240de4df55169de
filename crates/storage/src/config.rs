// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage configuration and backend selection.

use crate::embedded::EmbeddedStateService;
use crate::env;
use crate::error::StateStoreError;
use crate::log::{LogStateService, MemoryLog, StateLog};
use crate::service::CalculatedFieldStateService;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// File name of the embedded store inside the state directory.
pub const STATE_FILE: &str = "cf-states.jsonl";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("could not determine state directory")]
    NoStateDir,
    #[error("unknown state backend '{0}', expected 'log' or 'embedded'")]
    UnknownBackend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StateBackend {
    /// Replicated log, replayed per partition on rebalance
    Log,
    /// Local store, restored once at startup
    #[default]
    Embedded,
}

impl FromStr for StateBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "log" => Ok(StateBackend::Log),
            "embedded" => Ok(StateBackend::Embedded),
            _ => Err(ConfigError::UnknownBackend(s.to_string())),
        }
    }
}

cf_core::simple_display! {
    StateBackend {
        Log => "log",
        Embedded => "embedded",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub backend: StateBackend,
    pub state_dir: PathBuf,
    pub partitions: u32,
    pub compact_threshold: usize,
}

impl StorageConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let backend = match env::state_backend() {
            Some(raw) => raw.parse()?,
            None => StateBackend::default(),
        };
        Ok(Self {
            backend,
            state_dir: env::state_dir()?,
            partitions: env::partitions(),
            compact_threshold: env::compact_threshold(),
        })
    }

    pub fn state_file(&self) -> PathBuf {
        self.state_dir.join(STATE_FILE)
    }

    /// Build the configured service.
    ///
    /// The log backend runs on an in-process [`MemoryLog`]; use
    /// [`open_log_service`](Self::open_log_service) to supply another log.
    pub fn open_service(&self) -> Result<Arc<dyn CalculatedFieldStateService>, StateStoreError> {
        tracing::info!(backend = %self.backend, dir = %self.state_dir.display(), "opening state service");
        match self.backend {
            StateBackend::Log => Ok(self.open_log_service(Arc::new(MemoryLog::new(self.partitions)))),
            StateBackend::Embedded => {
                Ok(Arc::new(EmbeddedStateService::open(&self.state_file(), self.compact_threshold)?))
            }
        }
    }

    pub fn open_log_service(&self, log: Arc<dyn StateLog>) -> Arc<dyn CalculatedFieldStateService> {
        if log.partitions() != self.partitions {
            tracing::warn!(
                configured = self.partitions,
                actual = log.partitions(),
                "state log partition count differs from configuration, using the log's"
            );
        }
        Arc::new(LogStateService::new(log))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
