// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{telemetry, with_output_ts, CalculationError, StateData};
use crate::argument::{ArgumentEntry, ArgumentError};
use crate::ctx::CalculatedFieldCtx;
use crate::result::CalculatedFieldResult;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::{Map, Value};

const DEFAULT_OUTPUT_NAME: &str = "output";

/// Scalar expressions only consume single values.
pub(super) fn validate_new_entry(entry: ArgumentEntry) -> Result<ArgumentEntry, ArgumentError> {
    match entry {
        ArgumentEntry::SingleValue(_) => Ok(entry),
        other => Err(ArgumentError::unsupported("simple calculated field state", &other)),
    }
}

pub(super) fn calculate(data: &StateData, ctx: &CalculatedFieldCtx) -> Result<CalculatedFieldResult, CalculationError> {
    let Some(expression) = ctx.expression() else {
        return Err(CalculationError::NotInitialized(ctx.cf_id()));
    };
    let bindings = ctx
        .arg_names()
        .iter()
        .map(|name| match data.arguments.get(name) {
            Some(ArgumentEntry::SingleValue(e)) => {
                e.as_f64().ok_or_else(|| CalculationError::NonNumericArgument(name.clone()))
            }
            _ => Err(CalculationError::NonNumericArgument(name.clone())),
        })
        .collect::<Result<Vec<f64>, _>>()?;
    let result = expression.evaluate(&bindings)?;

    let output = ctx.output();
    let name = output.name.clone().unwrap_or_else(|| DEFAULT_OUTPUT_NAME.to_string());
    let mut values = Map::new();
    values.insert(name, format_result(result, output.decimals_by_default)?);
    Ok(telemetry(ctx, with_output_ts(data, ctx, Value::Object(values))))
}

/// Round half away from zero to `decimals` places. Zero places yields an integer.
pub(crate) fn format_result(value: f64, decimals: Option<u32>) -> Result<Value, CalculationError> {
    if !value.is_finite() {
        return Err(CalculationError::InvalidResult(value.to_string()));
    }
    let Some(decimals) = decimals else {
        return number(value);
    };
    // shortest round-trip text, so 2.675 rounds as written rather than as stored
    let Ok(exact) = value.to_string().parse::<Decimal>() else {
        return number(value);
    };
    let rounded = exact.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
    if decimals == 0 {
        return rounded
            .to_i64()
            .map(Value::from)
            .ok_or_else(|| CalculationError::InvalidResult(rounded.to_string()));
    }
    number(rounded.to_f64().unwrap_or(value))
}

fn number(value: f64) -> Result<Value, CalculationError> {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| CalculationError::InvalidResult(value.to_string()))
}
