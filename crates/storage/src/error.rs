// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::log::LogError;
use thiserror::Error;

/// Errors from persisting or restoring calculated field states
#[derive(Debug, Error)]
pub enum StateStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("log error: {0}")]
    Log(#[from] LogError),
    #[error("record is missing header '{0}'")]
    MissingHeader(&'static str),
    #[error("invalid header '{name}': {reason}")]
    InvalidHeader { name: &'static str, reason: String },
    #[error("partition {partition} is outside the {partitions} partitions of the log")]
    UnknownPartition { partition: u32, partitions: u32 },
    #[error("state service is closed")]
    Closed,
}
