// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::argument::{ArgumentEntry, GeofencingEntry, SingleValueEntry};
use crate::clock::FakeClock;
use crate::ctx::{CalculatedFieldCtx, TelemetryUpdate};
use crate::field::{
    Argument, CalculatedField, CalculatedFieldConfiguration, CalculatedFieldType, Output, LATITUDE, LONGITUDE,
    RESTRICTED_ZONES, SAVE_ZONES,
};
use crate::geofencing::{GeofencingZoneState, PerimeterDefinition};
use crate::id::EntityId;
use crate::kv::{KvEntry, KvValue};
use crate::limits::{StaticLimits, TenantLimits};
use std::collections::BTreeMap;
use std::sync::Arc;

// ── Proptest strategies ─────────────────────────────────────────────────

/// Proptest strategies for argument entries and states.
pub mod strategies {
    use crate::argument::{ArgumentEntry, SingleValueEntry, TsRollingEntry};
    use crate::field::CalculatedFieldType;
    use crate::kv::KvValue;
    use crate::state::CalculatedFieldState;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    pub fn arb_kv_value() -> impl Strategy<Value = KvValue> {
        prop_oneof![
            any::<bool>().prop_map(KvValue::Boolean),
            any::<i64>().prop_map(KvValue::Long),
            (-1e9f64..1e9).prop_map(KvValue::Double),
            arb_non_finite().prop_map(KvValue::Double),
            "[a-z]{0,8}".prop_map(KvValue::String),
        ]
    }

    pub fn arb_non_finite() -> impl Strategy<Value = f64> {
        prop_oneof![Just(f64::NAN), Just(f64::INFINITY), Just(f64::NEG_INFINITY)]
    }

    fn arb_sample() -> impl Strategy<Value = f64> {
        prop_oneof![9 => -1e6f64..1e6, 1 => arb_non_finite()]
    }

    pub fn arb_single_value() -> impl Strategy<Value = SingleValueEntry> {
        (1i64..1_000_000, proptest::option::of(0i64..100), arb_kv_value())
            .prop_map(|(ts, version, value)| SingleValueEntry { version, ..SingleValueEntry::new(ts, value) })
    }

    pub fn arb_rolling(now_ms: i64) -> impl Strategy<Value = TsRollingEntry> {
        (1usize..10, proptest::collection::vec((0i64..60_000, arb_sample()), 0..20)).prop_map(
            move |(limit, points)| {
                let mut entry = TsRollingEntry::new(limit, 60_000);
                for (age, value) in points {
                    entry.insert(now_ms - age, value, now_ms);
                }
                entry
            },
        )
    }

    pub fn arb_argument_entry(now_ms: i64) -> impl Strategy<Value = ArgumentEntry> {
        prop_oneof![
            arb_single_value().prop_map(ArgumentEntry::from),
            arb_rolling(now_ms).prop_map(ArgumentEntry::from),
        ]
    }

    /// Script states accept every entry kind, so any argument map is valid.
    pub fn arb_script_state(now_ms: i64) -> impl Strategy<Value = CalculatedFieldState> {
        (
            proptest::collection::btree_map("[a-z]{1,6}", arb_argument_entry(now_ms), 0..6),
            0i64..1_000_000,
        )
            .prop_map(|(args, ts): (BTreeMap<String, ArgumentEntry>, i64)| {
                CalculatedFieldState::from_parts(CalculatedFieldType::Script, args, ts)
            })
    }
}

// ── Field factories ─────────────────────────────────────────────────────

/// Simple field computing `expression` over time-series arguments named after
/// their keys.
pub fn simple_field(expression: &str, args: &[&str]) -> CalculatedField {
    let configuration = args
        .iter()
        .fold(CalculatedFieldConfiguration::new(Output::time_series("result")), |c, name| {
            c.argument(*name, Argument::ts_latest(*name))
        })
        .expression(expression);
    CalculatedField::builder().cf_type(CalculatedFieldType::Simple).configuration(configuration).build()
}

pub fn script_field(script: &str, args: &[(&str, Argument)]) -> CalculatedField {
    let configuration = args
        .iter()
        .fold(CalculatedFieldConfiguration::new(Output::time_series("result")), |c, (name, a)| {
            c.argument(*name, a.clone())
        })
        .expression(script);
    CalculatedField::builder().cf_type(CalculatedFieldType::Script).configuration(configuration).build()
}

/// Geofencing field with both zone groups reading the `perimeter` attribute.
pub fn geofencing_field() -> CalculatedField {
    let zone_arg = Argument::attribute("perimeter", crate::field::AttributeScope::ServerScope);
    let configuration = CalculatedFieldConfiguration::new(Output::default())
        .argument(LATITUDE, Argument::ts_latest("latitude"))
        .argument(LONGITUDE, Argument::ts_latest("longitude"))
        .argument(SAVE_ZONES, zone_arg.clone())
        .argument(RESTRICTED_ZONES, zone_arg);
    CalculatedField::builder().cf_type(CalculatedFieldType::Geofencing).configuration(configuration).build()
}

/// Ctx with default limits and a fake clock.
pub fn test_ctx(definition: CalculatedField, clock: &FakeClock) -> CalculatedFieldCtx {
    CalculatedFieldCtx::new(definition, &StaticLimits(TenantLimits::default())).with_clock(Arc::new(clock.clone()))
}

// ── Argument factories ──────────────────────────────────────────────────

pub fn single(ts: i64, value: impl Into<KvValue>) -> ArgumentEntry {
    SingleValueEntry::new(ts, value).into()
}

pub fn args<const N: usize>(entries: [(&str, ArgumentEntry); N]) -> BTreeMap<String, ArgumentEntry> {
    entries.into_iter().map(|(name, e)| (name.to_string(), e)).collect()
}

/// Polygon zone spanning `[lat0, lat1] x [lon0, lon1]`.
pub fn rect_zone(zone_id: EntityId, ts: i64, lat: (f64, f64), lon: (f64, f64)) -> GeofencingZoneState {
    let points = vec![
        crate::geofencing::Coordinates::new(lat.0, lon.0),
        crate::geofencing::Coordinates::new(lat.0, lon.1),
        crate::geofencing::Coordinates::new(lat.1, lon.1),
        crate::geofencing::Coordinates::new(lat.1, lon.0),
    ];
    GeofencingZoneState::new(zone_id, ts, PerimeterDefinition::Polygon { points })
}

pub fn zones(states: impl IntoIterator<Item = GeofencingZoneState>) -> ArgumentEntry {
    GeofencingEntry::from_zones(states).into()
}

pub fn ts_update(ts: i64, values: &[(&str, f64)]) -> TelemetryUpdate {
    TelemetryUpdate::TimeSeries { entries: values.iter().map(|(k, v)| KvEntry::new(*k, ts, *v)).collect() }
}
