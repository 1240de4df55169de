// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{telemetry, with_output_ts, CalculationError, StateData};
use crate::ctx::CalculatedFieldCtx;
use crate::result::CalculatedFieldResult;
use serde_json::{json, Map, Value};

/// Invoke the compiled script with the ctx projection followed by every
/// argument in binding order.
pub(super) async fn calculate(
    data: &StateData,
    ctx: &CalculatedFieldCtx,
) -> Result<CalculatedFieldResult, CalculationError> {
    let Some((engine, script_id)) = ctx.script() else {
        return Err(CalculationError::NotInitialized(ctx.cf_id()));
    };
    let now = ctx.now_ms();
    let eval_args: Vec<Value> = ctx
        .arg_names()
        .iter()
        .map(|name| data.arguments.get(name).map_or(Value::Null, |e| e.to_eval_arg(now)))
        .collect();

    let mut args = Vec::with_capacity(eval_args.len() + 1);
    args.push(ctx_projection(data, ctx, &eval_args));
    args.extend(eval_args);

    let result = engine.invoke(script_id, args).await?;
    let payload = match result {
        Value::Object(map) if map.contains_key("ts") => Value::Object(map),
        other => with_output_ts(data, ctx, other),
    };
    Ok(telemetry(ctx, payload))
}

/// `{"latestTs": .., "args": {name: evalArg}}`
fn ctx_projection(data: &StateData, ctx: &CalculatedFieldCtx, eval_args: &[Value]) -> Value {
    let args: Map<String, Value> = ctx.arg_names().iter().cloned().zip(eval_args.iter().cloned()).collect();
    json!({"latestTs": data.latest_timestamp, "args": args})
}
