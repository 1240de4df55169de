// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Argument entries: the per-slot values a calculated field state accumulates.
//!
//! Each entry is one of three shapes. Single values follow a ts/version
//! freshness rule, rolling entries keep a count- and age-bounded window, and
//! geofencing entries hold the zone perimeters for one slot.

mod geofencing;
mod rolling;
mod single;

pub use geofencing::GeofencingEntry;
pub use rolling::{TsRollingEntry, UNBOUNDED_WINDOW_MS};
pub use single::SingleValueEntry;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors from feeding entries into argument slots
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ArgumentError {
    #[error("unsupported argument entry type for {context}: {actual}")]
    UnsupportedType { context: String, actual: ArgumentEntryType },

    #[error(
        "unsupported argument entry type for {argument} argument: {actual}. Only {expected} type is allowed."
    )]
    UnexpectedSlotType { argument: String, actual: ArgumentEntryType, expected: ArgumentEntryType },

    #[error("argument {argument} is {size} bytes, over the {limit} byte limit")]
    TooLarge { argument: String, size: usize, limit: usize },
}

impl ArgumentError {
    pub(crate) fn unsupported(context: &str, actual: &ArgumentEntry) -> Self {
        ArgumentError::UnsupportedType { context: context.to_string(), actual: actual.entry_type() }
    }
}

/// Discriminator of an [`ArgumentEntry`], as written on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArgumentEntryType {
    SingleValue,
    TsRolling,
    Geofencing,
}

crate::simple_display! {
    ArgumentEntryType {
        SingleValue => "SINGLE_VALUE",
        TsRolling => "TS_ROLLING",
        Geofencing => "GEOFENCING",
    }
}

/// The current value held in one argument slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArgumentEntry {
    SingleValue(SingleValueEntry),
    TsRolling(TsRollingEntry),
    Geofencing(GeofencingEntry),
}

impl ArgumentEntry {
    pub fn entry_type(&self) -> ArgumentEntryType {
        match self {
            ArgumentEntry::SingleValue(_) => ArgumentEntryType::SingleValue,
            ArgumentEntry::TsRolling(_) => ArgumentEntryType::TsRolling,
            ArgumentEntry::Geofencing(_) => ArgumentEntryType::Geofencing,
        }
    }

    /// True when the entry carries no usable value.
    pub fn is_empty(&self) -> bool {
        match self {
            ArgumentEntry::SingleValue(e) => e.is_empty(),
            ArgumentEntry::TsRolling(e) => e.is_empty(),
            ArgumentEntry::Geofencing(e) => e.is_empty(),
        }
    }

    /// Whether the producer asked for the slot to be replaced outright.
    pub fn force_reset_previous(&self) -> bool {
        match self {
            ArgumentEntry::SingleValue(e) => e.force_reset_previous,
            ArgumentEntry::TsRolling(e) => e.force_reset_previous,
            ArgumentEntry::Geofencing(e) => e.force_reset_previous,
        }
    }

    pub fn set_force_reset_previous(&mut self, value: bool) {
        match self {
            ArgumentEntry::SingleValue(e) => e.force_reset_previous = value,
            ArgumentEntry::TsRolling(e) => e.force_reset_previous = value,
            ArgumentEntry::Geofencing(e) => e.force_reset_previous = value,
        }
    }

    pub fn with_force_reset(mut self) -> Self {
        self.set_force_reset_previous(true);
        self
    }

    /// Merge `other` into this entry, returning whether anything changed.
    ///
    /// Feeding a kind the slot cannot absorb is a caller error.
    pub fn update_entry(&mut self, other: &ArgumentEntry, now_ms: i64) -> Result<bool, ArgumentError> {
        match (self, other) {
            (ArgumentEntry::SingleValue(e), ArgumentEntry::SingleValue(o)) => Ok(e.update(o)),
            (ArgumentEntry::SingleValue(_), o) => {
                Err(ArgumentError::unsupported("single value argument entry", o))
            }
            (ArgumentEntry::TsRolling(e), ArgumentEntry::TsRolling(o)) => Ok(e.merge(o, now_ms)),
            (ArgumentEntry::TsRolling(e), ArgumentEntry::SingleValue(o)) => {
                Ok(e.merge_single(o, now_ms))
            }
            (ArgumentEntry::TsRolling(_), o) => {
                Err(ArgumentError::unsupported("rolling argument entry", o))
            }
            (ArgumentEntry::Geofencing(e), ArgumentEntry::Geofencing(o)) => Ok(e.update(o)),
            (ArgumentEntry::Geofencing(_), o) => {
                Err(ArgumentError::unsupported("geofencing argument entry", o))
            }
        }
    }

    /// Projection bound into expressions and scripts.
    pub fn to_eval_arg(&self, now_ms: i64) -> Value {
        match self {
            ArgumentEntry::SingleValue(e) => e.to_eval_arg(),
            ArgumentEntry::TsRolling(e) => e.to_eval_arg(now_ms),
            ArgumentEntry::Geofencing(e) => e.to_eval_arg(),
        }
    }

    /// Timestamp this entry contributes to the state's latest timestamp.
    ///
    /// Rolling entries use their newest record, or `now_ms` when empty.
    /// Geofencing entries don't contribute.
    pub fn effective_ts(&self, now_ms: i64) -> Option<i64> {
        match self {
            ArgumentEntry::SingleValue(e) => Some(e.ts),
            ArgumentEntry::TsRolling(e) => Some(e.latest_ts().unwrap_or(now_ms)),
            ArgumentEntry::Geofencing(_) => None,
        }
    }

    /// Size of a single value's textual form, used for the per-argument limit.
    pub fn single_value_size(&self) -> Option<usize> {
        match self {
            ArgumentEntry::SingleValue(e) => e.value.as_ref().map(|v| v.value_as_string().len()),
            _ => None,
        }
    }
}

impl From<SingleValueEntry> for ArgumentEntry {
    fn from(e: SingleValueEntry) -> Self {
        ArgumentEntry::SingleValue(e)
    }
}

impl From<TsRollingEntry> for ArgumentEntry {
    fn from(e: TsRollingEntry) -> Self {
        ArgumentEntry::TsRolling(e)
    }
}

impl From<GeofencingEntry> for ArgumentEntry {
    fn from(e: GeofencingEntry) -> Self {
        ArgumentEntry::Geofencing(e)
    }
}

/// Freshness rule shared by single values and zone perimeters.
///
/// A candidate replaces the current value iff its ts differs and, when both
/// carry a version, its version is strictly greater. Equal timestamps are
/// rejected even when the version increases.
pub fn is_fresher(current_ts: i64, current_version: Option<i64>, ts: i64, version: Option<i64>) -> bool {
    if ts == current_ts {
        return false;
    }
    match (current_version, version) {
        (Some(current), Some(candidate)) => candidate > current,
        _ => true,
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
