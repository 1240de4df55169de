// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-entity calculated field state.
//!
//! A state accumulates argument entries for one (tenant, field, entity) key
//! and evaluates the field once every required argument holds a value. The
//! four variants share the accumulation and readiness machinery and differ in
//! which entries a slot accepts and how the result is computed.
//!
//! Exactly one owner mutates a state at a time; nothing here locks.

mod geofencing;
mod last_records;
mod script;
mod simple;

use crate::argument::{ArgumentEntry, ArgumentError};
use crate::ctx::CalculatedFieldCtx;
use crate::expr::ExprError;
use crate::field::CalculatedFieldType;
use crate::id::{CalculatedFieldId, EntityId};
use crate::limits::OversizedArgumentPolicy;
use crate::partition::CfEntityKey;
use crate::result::CalculatedFieldResult;
use crate::script::ScriptError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Latest timestamp of a state that has seen no update.
pub const NO_TIMESTAMP: i64 = -1;

/// Errors from evaluating a state
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalculationError {
    #[error("calculated field {0} is not initialized")]
    NotInitialized(CalculatedFieldId),
    #[error("state is missing required arguments")]
    NotReady,
    #[error("state was cleared for exceeding the size limit")]
    StateTooLarge,
    #[error("argument '{0}' has no numeric value")]
    NonNumericArgument(String),
    #[error("invalid result: {0}")]
    InvalidResult(String),
    #[error(transparent)]
    Expression(#[from] ExprError),
    #[error(transparent)]
    Script(#[from] ScriptError),
}

/// Data shared by every state variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateData {
    #[serde(default)]
    pub arguments: BTreeMap<String, ArgumentEntry>,
    /// Copied from the ctx by `init`; not persisted
    #[serde(skip)]
    required_argument_names: BTreeSet<String>,
    #[serde(default)]
    size_exceeds_limit: bool,
    #[serde(default = "no_timestamp")]
    latest_timestamp: i64,
}

fn no_timestamp() -> i64 {
    NO_TIMESTAMP
}

impl Default for StateData {
    fn default() -> Self {
        Self {
            arguments: BTreeMap::new(),
            required_argument_names: BTreeSet::new(),
            size_exceeds_limit: false,
            latest_timestamp: NO_TIMESTAMP,
        }
    }
}

/// Mutable accumulator for one entity of one field.
///
/// Serialized with a `type` discriminator naming the variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CalculatedFieldState {
    Simple(StateData),
    Script(StateData),
    Geofencing(StateData),
    LastRecords(StateData),
}

impl CalculatedFieldState {
    /// Empty state for a field type.
    pub fn new(cf_type: CalculatedFieldType) -> Self {
        let data = StateData::default();
        match cf_type {
            CalculatedFieldType::Simple => CalculatedFieldState::Simple(data),
            CalculatedFieldType::Script => CalculatedFieldState::Script(data),
            CalculatedFieldType::Geofencing => CalculatedFieldState::Geofencing(data),
            CalculatedFieldType::LastRecords => CalculatedFieldState::LastRecords(data),
        }
    }

    /// Rebuild a state from its persisted parts. `init` must still run.
    pub fn from_parts(
        cf_type: CalculatedFieldType,
        arguments: BTreeMap<String, ArgumentEntry>,
        latest_timestamp: i64,
    ) -> Self {
        let mut state = Self::new(cf_type);
        let data = state.data_mut();
        data.arguments = arguments;
        data.latest_timestamp = latest_timestamp;
        state
    }

    pub fn cf_type(&self) -> CalculatedFieldType {
        match self {
            CalculatedFieldState::Simple(_) => CalculatedFieldType::Simple,
            CalculatedFieldState::Script(_) => CalculatedFieldType::Script,
            CalculatedFieldState::Geofencing(_) => CalculatedFieldType::Geofencing,
            CalculatedFieldState::LastRecords(_) => CalculatedFieldType::LastRecords,
        }
    }

    pub fn data(&self) -> &StateData {
        match self {
            CalculatedFieldState::Simple(d)
            | CalculatedFieldState::Script(d)
            | CalculatedFieldState::Geofencing(d)
            | CalculatedFieldState::LastRecords(d) => d,
        }
    }

    fn data_mut(&mut self) -> &mut StateData {
        match self {
            CalculatedFieldState::Simple(d)
            | CalculatedFieldState::Script(d)
            | CalculatedFieldState::Geofencing(d)
            | CalculatedFieldState::LastRecords(d) => d,
        }
    }

    pub fn arguments(&self) -> &BTreeMap<String, ArgumentEntry> {
        &self.data().arguments
    }

    pub fn latest_timestamp(&self) -> i64 {
        self.data().latest_timestamp
    }

    pub fn size_exceeds_limit(&self) -> bool {
        self.data().size_exceeds_limit
    }

    pub fn required_argument_names(&self) -> &BTreeSet<String> {
        &self.data().required_argument_names
    }

    /// Take the required argument names from the ctx.
    ///
    /// Runs on creation and again after a restore, since required names are
    /// not persisted.
    pub fn init(&mut self, ctx: &CalculatedFieldCtx) {
        self.data_mut().required_argument_names = ctx.required_argument_names().cloned().collect();
    }

    /// Apply newly arrived argument entries.
    ///
    /// Returns whether any slot changed. A latched state ignores updates until
    /// it is reset. The batch applies as a whole: if any entry is rejected the
    /// state is left as it was.
    pub fn update(
        &mut self,
        ctx: &CalculatedFieldCtx,
        new_args: BTreeMap<String, ArgumentEntry>,
    ) -> Result<bool, ArgumentError> {
        if self.size_exceeds_limit() {
            return Ok(false);
        }
        let new_args = self.enforce_argument_size(ctx, new_args)?;
        let now = ctx.now_ms();
        let cf_type = self.cf_type();
        let mut staged = Vec::with_capacity(new_args.len());
        let mut latest = self.latest_timestamp();
        let mut changed = false;
        for (name, mut entry) in new_args {
            let effective_ts = entry.effective_ts(now);
            let (slot, slot_changed) = match self.data().arguments.get(&name) {
                Some(existing) if !entry.force_reset_previous() => {
                    let mut slot = existing.clone();
                    let slot_changed = slot.update_entry(&entry, now)?;
                    (slot, slot_changed)
                }
                _ => {
                    entry.set_force_reset_previous(false);
                    (validate_new_entry(cf_type, ctx, &name, entry, now)?, true)
                }
            };
            if slot_changed {
                if let Some(ts) = effective_ts {
                    latest = latest.max(ts);
                }
                changed = true;
            }
            staged.push((name, slot));
        }

        let data = self.data_mut();
        data.arguments.extend(staged);
        data.latest_timestamp = latest;
        Ok(changed)
    }

    fn enforce_argument_size(
        &self,
        ctx: &CalculatedFieldCtx,
        mut new_args: BTreeMap<String, ArgumentEntry>,
    ) -> Result<BTreeMap<String, ArgumentEntry>, ArgumentError> {
        let limit = ctx.max_single_value_bytes();
        if limit == 0 {
            return Ok(new_args);
        }
        let oversized: Vec<(String, usize)> = new_args
            .iter()
            .filter_map(|(name, e)| e.single_value_size().filter(|s| *s > limit).map(|s| (name.clone(), s)))
            .collect();
        for (argument, size) in oversized {
            match ctx.oversized_policy() {
                OversizedArgumentPolicy::Reject => {
                    return Err(ArgumentError::TooLarge { argument, size, limit });
                }
                OversizedArgumentPolicy::Skip => {
                    tracing::warn!(cf_id = %ctx.cf_id(), %argument, size, limit, "skipping oversized argument");
                    new_args.remove(&argument);
                }
            }
        }
        Ok(new_args)
    }

    /// True iff every required argument is present and non-empty.
    pub fn is_ready(&self) -> bool {
        let data = self.data();
        data.required_argument_names.iter().all(|name| data.arguments.contains_key(name))
            && !data.arguments.values().any(ArgumentEntry::is_empty)
    }

    /// Clear back to the freshly created state. `init` must run again.
    pub fn reset(&mut self) {
        *self.data_mut() = StateData::default();
    }

    /// Clear the state and latch the size flag if it serializes over `max_bytes`.
    ///
    /// Returns whether the flag is latched afterwards. A zero limit disables the
    /// check.
    pub fn check_state_size(&mut self, key: &CfEntityKey, max_bytes: usize) -> bool {
        if self.size_exceeds_limit() || max_bytes == 0 {
            return self.size_exceeds_limit();
        }
        let size = match serde_json::to_vec(self) {
            Ok(bytes) => bytes.len(),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "failed to measure state size");
                return false;
            }
        };
        if size > max_bytes {
            tracing::info!(key = %key, size, max_bytes, "state exceeds size limit, clearing arguments");
            let data = self.data_mut();
            data.arguments.clear();
            data.size_exceeds_limit = true;
        }
        self.size_exceeds_limit()
    }

    /// Evaluate the field for `entity_id`.
    ///
    /// Geofencing evaluation advances the zone runtimes held in this state.
    pub async fn perform_calculation(
        &mut self,
        entity_id: &EntityId,
        ctx: &CalculatedFieldCtx,
    ) -> Result<CalculatedFieldResult, CalculationError> {
        if !ctx.is_initialized() {
            return Err(CalculationError::NotInitialized(ctx.cf_id()));
        }
        if self.size_exceeds_limit() {
            return Err(CalculationError::StateTooLarge);
        }
        if !self.is_ready() {
            return Err(CalculationError::NotReady);
        }
        match self {
            CalculatedFieldState::Simple(data) => simple::calculate(data, ctx),
            CalculatedFieldState::Script(data) => script::calculate(data, ctx).await,
            CalculatedFieldState::Geofencing(data) => geofencing::calculate(data, entity_id, ctx),
            CalculatedFieldState::LastRecords(data) => last_records::calculate(data, ctx),
        }
    }
}

/// Variant hook run before an entry takes over an empty or reset slot.
fn validate_new_entry(
    cf_type: CalculatedFieldType,
    ctx: &CalculatedFieldCtx,
    name: &str,
    entry: ArgumentEntry,
    now_ms: i64,
) -> Result<ArgumentEntry, ArgumentError> {
    match cf_type {
        CalculatedFieldType::Simple => simple::validate_new_entry(entry),
        CalculatedFieldType::Script => Ok(entry),
        CalculatedFieldType::Geofencing => geofencing::validate_new_entry(name, entry),
        CalculatedFieldType::LastRecords => last_records::validate_new_entry(ctx, name, entry, now_ms),
    }
}

/// Wrap a time-series payload with the state's latest timestamp when the
/// output asks for it.
fn with_output_ts(data: &StateData, ctx: &CalculatedFieldCtx, values: serde_json::Value) -> serde_json::Value {
    let output = ctx.output();
    if output.use_latest_ts
        && output.output_type == crate::field::OutputType::TimeSeries
        && data.latest_timestamp != NO_TIMESTAMP
    {
        serde_json::json!({"ts": data.latest_timestamp, "values": values})
    } else {
        values
    }
}

fn telemetry(ctx: &CalculatedFieldCtx, payload: serde_json::Value) -> CalculatedFieldResult {
    let output = ctx.output();
    CalculatedFieldResult::Telemetry(crate::result::TelemetryResult {
        output_type: output.output_type,
        scope: output.scope,
        strategy: output.strategy,
        payload,
    })
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
