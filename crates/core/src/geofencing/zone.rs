// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-zone containment state machine.

use super::perimeter::{Coordinates, PerimeterDefinition, PerimeterError};
use crate::id::EntityId;
use crate::kv::KvEntry;
use serde::{Deserialize, Serialize};

/// Event emitted for one zone on each evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GeofencingEvent {
    Entered,
    Left,
    Inside,
    Outside,
}

crate::simple_display! {
    GeofencingEvent {
        Entered => "ENTERED",
        Left => "LEFT",
        Inside => "INSIDE",
        Outside => "OUTSIDE",
    }
}

impl GeofencingEvent {
    /// Whether the event marks a containment flip rather than a steady status.
    pub fn is_transition(&self) -> bool {
        matches!(self, GeofencingEvent::Entered | GeofencingEvent::Left)
    }
}

/// Last known containment for a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneRuntime {
    pub inside: bool,
    pub state_switch_time: i64,
    pub stayed: bool,
}

/// One zone's perimeter plus its containment runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofencingZoneState {
    pub zone_id: EntityId,
    pub ts: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    pub perimeter: PerimeterDefinition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<ZoneRuntime>,
}

impl GeofencingZoneState {
    pub fn new(zone_id: EntityId, ts: i64, perimeter: PerimeterDefinition) -> Self {
        Self { zone_id, ts, version: None, perimeter, runtime: None }
    }

    /// Build from the zone entity's perimeter attribute.
    pub fn from_kv(zone_id: EntityId, entry: &KvEntry) -> Result<Self, PerimeterError> {
        let perimeter = PerimeterDefinition::parse(&entry.value.value_as_string())?;
        Ok(Self { zone_id, ts: entry.ts, version: entry.version, perimeter, runtime: None })
    }

    /// Take the other zone's perimeter if it is fresher.
    ///
    /// Same freshness rule as single-value arguments. The runtime is kept even
    /// when the perimeter changes.
    pub fn update(&mut self, other: &GeofencingZoneState) -> bool {
        if !crate::argument::is_fresher(self.ts, self.version, other.ts, other.version) {
            return false;
        }
        self.ts = other.ts;
        self.version = other.version;
        self.perimeter = other.perimeter.clone();
        true
    }

    /// Evaluate the entity position against this zone and advance the runtime.
    ///
    /// The first evaluation reports `Entered` when the entity starts inside and
    /// `Outside` otherwise.
    pub fn evaluate(&mut self, point: &Coordinates, now_ms: i64) -> GeofencingEvent {
        let inside = self.perimeter.contains(point);
        let Some(runtime) = self.runtime.as_mut() else {
            self.runtime = Some(ZoneRuntime { inside, state_switch_time: self.ts, stayed: false });
            return if inside { GeofencingEvent::Entered } else { GeofencingEvent::Outside };
        };
        if runtime.state_switch_time == 0 || runtime.inside != inside {
            *runtime = ZoneRuntime { inside, state_switch_time: now_ms, stayed: false };
            return if inside { GeofencingEvent::Entered } else { GeofencingEvent::Left };
        }
        if inside {
            GeofencingEvent::Inside
        } else {
            GeofencingEvent::Outside
        }
    }
}

#[cfg(test)]
#[path = "zone_tests.rs"]
mod tests;
