// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{telemetry, CalculationError, StateData};
use crate::argument::{ArgumentEntry, ArgumentError, TsRollingEntry};
use crate::ctx::CalculatedFieldCtx;
use crate::result::CalculatedFieldResult;
use serde_json::{json, Map, Value};

/// Every slot becomes a bounded window using the ctx limit and window.
pub(super) fn validate_new_entry(
    ctx: &CalculatedFieldCtx,
    name: &str,
    entry: ArgumentEntry,
    now_ms: i64,
) -> Result<ArgumentEntry, ArgumentError> {
    let (limit, window_ms) = ctx.rolling_params(name);
    let mut window = TsRollingEntry::new(limit, window_ms);
    match &entry {
        ArgumentEntry::SingleValue(single) => {
            window.merge_single(single, now_ms);
        }
        ArgumentEntry::TsRolling(rolling) => {
            window.merge(rolling, now_ms);
        }
        ArgumentEntry::Geofencing(_) => {
            return Err(ArgumentError::unsupported("last records calculated field state", &entry));
        }
    }
    Ok(window.into())
}

/// `{name: [{"ts": .., "value": ..}, ...]}` with the newest record first.
pub(super) fn calculate(data: &StateData, ctx: &CalculatedFieldCtx) -> Result<CalculatedFieldResult, CalculationError> {
    let mut payload = Map::new();
    for name in ctx.arg_names() {
        let Some(ArgumentEntry::TsRolling(window)) = data.arguments.get(name) else {
            continue;
        };
        let records: Vec<Value> = window
            .records()
            .iter()
            .rev()
            .map(|(ts, v)| json!({"ts": ts, "value": serde_json::Number::from_f64(*v)}))
            .collect();
        payload.insert(name.clone(), Value::Array(records));
    }
    Ok(telemetry(ctx, Value::Object(payload)))
}
