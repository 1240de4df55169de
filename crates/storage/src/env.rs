// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the storage crate.

use crate::config::ConfigError;
use std::path::PathBuf;

/// Backend selector, unparsed
pub fn state_backend() -> Option<String> {
    std::env::var("CF_STATE_BACKEND").ok().filter(|s| !s.is_empty())
}

/// Resolve state directory: CF_STATE_DIR > XDG_STATE_HOME/cf > ~/.local/state/cf
pub fn state_dir() -> Result<PathBuf, ConfigError> {
    if let Ok(dir) = std::env::var("CF_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("cf"));
    }
    let home = std::env::var("HOME").map_err(|_| ConfigError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/cf"))
}

/// Partition count of the state log (default 10)
pub fn partitions() -> u32 {
    std::env::var("CF_STATE_PARTITIONS")
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(10)
}

/// Embedded store rows appended before compaction (default 10000)
pub fn compact_threshold() -> usize {
    std::env::var("CF_STATE_COMPACT_THRESHOLD").ok().and_then(|s| s.parse::<usize>().ok()).unwrap_or(10_000)
}
