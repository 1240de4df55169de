// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::geofencing::GeofencingZoneState;
use crate::id::EntityId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Zone perimeters bound to one geofencing slot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofencingEntry {
    pub zone_states: BTreeMap<EntityId, GeofencingZoneState>,
    #[serde(skip)]
    pub force_reset_previous: bool,
}

impl GeofencingEntry {
    pub fn from_zones(zones: impl IntoIterator<Item = GeofencingZoneState>) -> Self {
        Self {
            zone_states: zones.into_iter().map(|z| (z.zone_id, z)).collect(),
            force_reset_previous: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.zone_states.is_empty()
    }

    /// Merge the incoming zone map into this one.
    ///
    /// Zones present on both sides go through the per-zone freshness rule and
    /// keep their runtime. Zones missing from `other` are dropped.
    pub fn update(&mut self, other: &GeofencingEntry) -> bool {
        let mut changed = self.zone_states.len() != other.zone_states.len();
        let mut next = BTreeMap::new();
        for (zone_id, incoming) in &other.zone_states {
            let zone = match self.zone_states.get(zone_id) {
                Some(existing) => {
                    let mut zone = existing.clone();
                    changed |= zone.update(incoming);
                    zone
                }
                None => {
                    changed = true;
                    incoming.clone()
                }
            };
            next.insert(*zone_id, zone);
        }
        if changed {
            self.zone_states = next;
        }
        changed
    }

    pub fn to_eval_arg(&self) -> Value {
        let zones: Map<String, Value> = self
            .zone_states
            .iter()
            .map(|(id, zone)| (id.to_string(), zone.perimeter.to_json()))
            .collect();
        Value::Object(zones)
    }
}
