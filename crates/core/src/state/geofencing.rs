// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{CalculationError, StateData};
use crate::argument::{ArgumentEntry, ArgumentEntryType, ArgumentError};
use crate::ctx::CalculatedFieldCtx;
use crate::field::{LATITUDE, LONGITUDE, RESTRICTED_ZONES, SAVE_ZONES};
use crate::geofencing::Coordinates;
use crate::id::EntityId;
use crate::result::{CalculatedFieldResult, ZoneEventRecord};

/// Coordinates must be single values and zone slots geofencing entries.
pub(super) fn validate_new_entry(name: &str, entry: ArgumentEntry) -> Result<ArgumentEntry, ArgumentError> {
    let expected = match name {
        LATITUDE | LONGITUDE => ArgumentEntryType::SingleValue,
        SAVE_ZONES | RESTRICTED_ZONES => ArgumentEntryType::Geofencing,
        _ => return Err(ArgumentError::unsupported(&format!("geofencing argument '{name}'"), &entry)),
    };
    if entry.entry_type() != expected {
        return Err(ArgumentError::UnexpectedSlotType {
            argument: name.to_string(),
            actual: entry.entry_type(),
            expected,
        });
    }
    Ok(entry)
}

/// Evaluate every save zone, then every restricted zone.
pub(super) fn calculate(
    data: &mut StateData,
    entity_id: &EntityId,
    ctx: &CalculatedFieldCtx,
) -> Result<CalculatedFieldResult, CalculationError> {
    let point = Coordinates::new(coordinate(data, LATITUDE)?, coordinate(data, LONGITUDE)?);
    let now = ctx.now_ms();
    let strategy = ctx.report_strategy();
    let mut events = Vec::new();
    for (slot, restricted) in [(SAVE_ZONES, false), (RESTRICTED_ZONES, true)] {
        let Some(ArgumentEntry::Geofencing(zones)) = data.arguments.get_mut(slot) else {
            continue;
        };
        for (zone_id, zone) in zones.zone_states.iter_mut() {
            let event = zone.evaluate(&point, now);
            if strategy.reports(event) {
                events.push(ZoneEventRecord { entity_id: *entity_id, zone_id: *zone_id, restricted, event });
            }
        }
    }
    Ok(CalculatedFieldResult::Geofencing { events })
}

fn coordinate(data: &StateData, name: &str) -> Result<f64, CalculationError> {
    match data.arguments.get(name) {
        Some(ArgumentEntry::SingleValue(e)) => {
            e.as_f64().ok_or_else(|| CalculationError::NonNumericArgument(name.to_string()))
        }
        _ => Err(CalculationError::NonNumericArgument(name.to_string())),
    }
}
