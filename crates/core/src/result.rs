// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Results handed to the downstream sink.

use crate::field::{AttributeScope, OutputStrategy, OutputType};
use crate::geofencing::GeofencingEvent;
use crate::id::EntityId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Telemetry to write back for the field's entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryResult {
    #[serde(rename = "type")]
    pub output_type: OutputType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<AttributeScope>,
    pub strategy: OutputStrategy,
    pub payload: Value,
}

/// One zone's event for the evaluated entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneEventRecord {
    pub entity_id: EntityId,
    pub zone_id: EntityId,
    pub restricted: bool,
    pub event: GeofencingEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CalculatedFieldResult {
    Telemetry(TelemetryResult),
    Geofencing { events: Vec<ZoneEventRecord> },
}

impl CalculatedFieldResult {
    pub fn payload(&self) -> Option<&Value> {
        match self {
            CalculatedFieldResult::Telemetry(t) => Some(&t.payload),
            CalculatedFieldResult::Geofencing { .. } => None,
        }
    }

    pub fn zone_events(&self) -> &[ZoneEventRecord] {
        match self {
            CalculatedFieldResult::Telemetry(_) => &[],
            CalculatedFieldResult::Geofencing { events } => events,
        }
    }
}
