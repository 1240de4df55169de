// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::argument::{SingleValueEntry, TsRollingEntry};
use crate::clock::FakeClock;
use crate::field::{
    Argument, CalculatedField, CalculatedFieldConfiguration, GeofencingReportStrategy, Output, LATITUDE, LONGITUDE,
    RESTRICTED_ZONES, SAVE_ZONES,
};
use crate::geofencing::GeofencingEvent;
use crate::limits::{StaticLimits, TenantLimits};
use crate::script::FakeScriptEngine;
use crate::test_support::strategies::arb_script_state;
use crate::test_support::{args, geofencing_field, rect_zone, script_field, simple_field, single, test_ctx, zones};
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;

const NOW: i64 = 1_000_000;

async fn ready_ctx(definition: CalculatedField, clock: &FakeClock) -> CalculatedFieldCtx {
    let mut ctx = test_ctx(definition, clock);
    ctx.init().await.unwrap();
    ctx
}

fn state_for(ctx: &CalculatedFieldCtx) -> CalculatedFieldState {
    let mut state = CalculatedFieldState::new(ctx.cf_type());
    state.init(ctx);
    state
}

// --- simple ---

#[tokio::test]
async fn simple_sum_of_two_arguments() {
    let clock = FakeClock::new(NOW);
    let ctx = ready_ctx(simple_field("a + b", &["a", "b"]), &clock).await;
    let mut state = state_for(&ctx);

    assert!(state.update(&ctx, args([("a", single(10, 3.0))])).unwrap());
    assert!(!state.is_ready());
    assert_eq!(
        state.perform_calculation(&ctx.entity_id(), &ctx).await.unwrap_err(),
        CalculationError::NotReady
    );

    assert!(state.update(&ctx, args([("b", single(20, 4.0))])).unwrap());
    assert!(state.is_ready());
    assert_eq!(state.latest_timestamp(), 20);

    let result = state.perform_calculation(&ctx.entity_id(), &ctx).await.unwrap();
    assert_eq!(result.payload(), Some(&json!({"result": 7.0})));
}

#[tokio::test]
async fn uninitialized_ctx_refuses_to_calculate() {
    let clock = FakeClock::new(NOW);
    let ctx = test_ctx(simple_field("a", &["a"]), &clock);
    let mut state = state_for(&ctx);
    state.update(&ctx, args([("a", single(1, 1.0))])).unwrap();
    assert_eq!(
        state.perform_calculation(&ctx.entity_id(), &ctx).await.unwrap_err(),
        CalculationError::NotInitialized(ctx.cf_id())
    );
}

#[tokio::test]
async fn stale_update_leaves_state_unchanged() {
    let clock = FakeClock::new(NOW);
    let ctx = ready_ctx(simple_field("a", &["a"]), &clock).await;
    let mut state = state_for(&ctx);
    state.update(&ctx, args([("a", single(20, 1.0))])).unwrap();

    assert!(!state.update(&ctx, args([("a", single(20, 2.0))])).unwrap());
    assert_eq!(state.latest_timestamp(), 20);
    assert_eq!(state.arguments()["a"], single(20, 1.0));
}

#[tokio::test]
async fn force_reset_replaces_slot_regardless_of_freshness() {
    let clock = FakeClock::new(NOW);
    let ctx = ready_ctx(simple_field("a", &["a"]), &clock).await;
    let mut state = state_for(&ctx);
    state.update(&ctx, args([("a", single(20, 1.0))])).unwrap();

    assert!(state.update(&ctx, args([("a", single(10, 5.0).with_force_reset())])).unwrap());
    assert_eq!(state.arguments()["a"], single(10, 5.0));
    assert!(!state.arguments()["a"].force_reset_previous());
    // the older ts doesn't move latest_timestamp backwards
    assert_eq!(state.latest_timestamp(), 20);
}

#[tokio::test]
async fn simple_state_rejects_rolling_entries() {
    let clock = FakeClock::new(NOW);
    let ctx = ready_ctx(simple_field("a", &["a"]), &clock).await;
    let mut state = state_for(&ctx);
    let err = state.update(&ctx, args([("a", TsRollingEntry::new(10, 60_000).into())])).unwrap_err();
    assert_eq!(err.to_string(), "unsupported argument entry type for simple calculated field state: TS_ROLLING");
    assert!(state.arguments().is_empty());
}

#[tokio::test]
async fn rejected_batch_leaves_earlier_slots_untouched() {
    let clock = FakeClock::new(NOW);
    let ctx = ready_ctx(simple_field("a + b + c", &["a", "b", "c"]), &clock).await;
    let mut state = state_for(&ctx);

    // "a" sorts ahead of the rolling "b" that fails the batch
    let batch = args([("a", single(10, 3.0)), ("b", TsRollingEntry::new(10, 60_000).into())]);
    assert!(state.update(&ctx, batch).is_err());
    assert!(!state.arguments().contains_key("a"));
    assert_eq!(state.latest_timestamp(), NO_TIMESTAMP);

    state.update(&ctx, args([("a", single(10, 3.0))])).unwrap();
    let batch = args([("a", single(20, 5.0)), ("b", TsRollingEntry::new(20, 60_000).into())]);
    assert!(state.update(&ctx, batch).is_err());
    assert_eq!(state.arguments()["a"], single(10, 3.0));
    assert_eq!(state.arguments().len(), 1);
    assert_eq!(state.latest_timestamp(), 10);
}

#[tokio::test]
async fn non_numeric_argument_fails_calculation() {
    let clock = FakeClock::new(NOW);
    let ctx = ready_ctx(simple_field("a * 2", &["a"]), &clock).await;
    let mut state = state_for(&ctx);
    state.update(&ctx, args([("a", single(1, "abc"))])).unwrap();
    assert_eq!(
        state.perform_calculation(&ctx.entity_id(), &ctx).await.unwrap_err(),
        CalculationError::NonNumericArgument("a".into())
    );
}

#[tokio::test]
async fn decimals_round_half_away_from_zero() {
    let clock = FakeClock::new(NOW);
    let mut field = simple_field("a + b", &["a", "b"]);
    field.configuration.output = Output::time_series("result").decimals_by_default(0u32);
    let ctx = ready_ctx(field, &clock).await;
    let mut state = state_for(&ctx);
    state.update(&ctx, args([("a", single(1, 1.0)), ("b", single(1, 0.5))])).unwrap();
    let result = state.perform_calculation(&ctx.entity_id(), &ctx).await.unwrap();
    assert_eq!(result.payload(), Some(&json!({"result": 2})));
}

#[yare::parameterized(
    two_places      = { 2.675, Some(2), json!(2.68) },
    negative_half   = { -1.5, Some(0), json!(-2) },
    positive_half   = { 2.5, Some(0), json!(3) },
    no_rounding     = { 1.23456, None, json!(1.23456) },
    already_short   = { 0.1, Some(3), json!(0.1) },
)]
fn format_result_rounding(value: f64, decimals: Option<u32>, expected: serde_json::Value) {
    assert_eq!(simple::format_result(value, decimals).unwrap(), expected);
}

#[test]
fn format_result_rejects_non_finite() {
    assert!(matches!(simple::format_result(f64::NAN, None), Err(CalculationError::InvalidResult(_))));
    assert!(matches!(simple::format_result(f64::INFINITY, Some(2)), Err(CalculationError::InvalidResult(_))));
}

#[tokio::test]
async fn latest_ts_wraps_time_series_output() {
    let clock = FakeClock::new(NOW);
    let mut field = simple_field("a", &["a"]);
    field.configuration.output = Output::time_series("result").use_latest_ts(true);
    let ctx = ready_ctx(field, &clock).await;
    let mut state = state_for(&ctx);
    state.update(&ctx, args([("a", single(42, 1.0))])).unwrap();
    let result = state.perform_calculation(&ctx.entity_id(), &ctx).await.unwrap();
    assert_eq!(result.payload(), Some(&json!({"ts": 42, "values": {"result": 1.0}})));
}

// --- size limits ---

#[tokio::test]
async fn oversized_state_is_cleared_and_latched() {
    let clock = FakeClock::new(NOW);
    let ctx = ready_ctx(simple_field("a + b", &["a", "b"]), &clock).await;
    let key = ctx.state_key(ctx.entity_id());
    let mut state = state_for(&ctx);
    state.update(&ctx, args([("a", single(1, 1.0)), ("b", single(1, 2.0))])).unwrap();

    assert!(!state.check_state_size(&key, 1024));
    assert_eq!(state.arguments().len(), 2);

    assert!(state.check_state_size(&key, 16));
    assert!(state.arguments().is_empty());
    assert!(state.size_exceeds_limit());

    // latched: updates are ignored and calculation reports the latch
    assert!(!state.update(&ctx, args([("a", single(2, 1.0))])).unwrap());
    assert!(state.arguments().is_empty());
    assert_eq!(
        state.perform_calculation(&ctx.entity_id(), &ctx).await.unwrap_err(),
        CalculationError::StateTooLarge
    );

    state.reset();
    state.init(&ctx);
    assert!(!state.size_exceeds_limit());
    assert!(state.update(&ctx, args([("a", single(3, 1.0))])).unwrap());
}

#[test]
fn zero_size_limit_disables_check() {
    let ctx = test_ctx(simple_field("a", &["a"]), &FakeClock::new(NOW));
    let mut state = state_for(&ctx);
    state.update(&ctx, args([("a", single(1, 1.0))])).unwrap();
    assert!(!state.check_state_size(&ctx.state_key(ctx.entity_id()), 0));
    assert_eq!(state.arguments().len(), 1);
}

fn small_value_limits() -> StaticLimits {
    StaticLimits(TenantLimits { max_single_value_argument_size_in_kbytes: 1, ..TenantLimits::default() })
}

#[test]
fn oversized_argument_rejected_by_default() {
    let ctx = CalculatedFieldCtx::new(simple_field("a", &["a"]), &small_value_limits());
    let mut state = state_for(&ctx);
    let big = "x".repeat(2048);
    let err = state.update(&ctx, args([("a", single(1, big.as_str()))])).unwrap_err();
    assert_eq!(err, ArgumentError::TooLarge { argument: "a".into(), size: 2048, limit: 1024 });
    assert!(state.arguments().is_empty());
}

#[test]
fn oversized_argument_skipped_under_skip_policy() {
    let ctx = CalculatedFieldCtx::new(simple_field("a + b", &["a", "b"]), &small_value_limits())
        .with_oversized_policy(OversizedArgumentPolicy::Skip);
    let mut state = state_for(&ctx);
    let big = "x".repeat(2048);
    assert!(state.update(&ctx, args([("a", single(1, big.as_str())), ("b", single(1, 2.0))])).unwrap());
    assert_eq!(state.arguments().keys().collect::<Vec<_>>(), vec!["b"]);
}

// --- geofencing ---

#[tokio::test]
async fn geofencing_slot_type_errors() {
    let clock = FakeClock::new(NOW);
    let ctx = ready_ctx(geofencing_field(), &clock).await;
    let mut state = state_for(&ctx);

    let err = state.update(&ctx, args([(LATITUDE, zones([]))])).unwrap_err();
    assert_eq!(
        err.to_string(),
        "unsupported argument entry type for latitude argument: GEOFENCING. Only SINGLE_VALUE type is allowed."
    );

    let err = state.update(&ctx, args([(SAVE_ZONES, single(1, 2.0))])).unwrap_err();
    assert_eq!(
        err.to_string(),
        "unsupported argument entry type for saveZones argument: SINGLE_VALUE. Only GEOFENCING type is allowed."
    );

    let err = state.update(&ctx, args([("speed", single(1, 2.0))])).unwrap_err();
    assert!(matches!(err, ArgumentError::UnsupportedType { .. }));
}

#[tokio::test]
async fn geofencing_reports_zone_transitions() {
    let clock = FakeClock::new(NOW);
    let ctx = ready_ctx(geofencing_field(), &clock).await;
    let entity = ctx.entity_id();
    let (save_id, restricted_id) = (EntityId::new(), EntityId::new());
    let mut state = state_for(&ctx);
    state
        .update(
            &ctx,
            args([
                (LATITUDE, single(10, 5.0)),
                (LONGITUDE, single(10, 5.0)),
                (SAVE_ZONES, zones([rect_zone(save_id, 1, (0.0, 10.0), (0.0, 10.0))])),
                (RESTRICTED_ZONES, zones([rect_zone(restricted_id, 1, (20.0, 30.0), (20.0, 30.0))])),
            ]),
        )
        .unwrap();

    let events = |result: &CalculatedFieldResult| {
        result.zone_events().iter().map(|e| (e.zone_id, e.restricted, e.event)).collect::<Vec<_>>()
    };

    let first = state.perform_calculation(&entity, &ctx).await.unwrap();
    assert_eq!(
        events(&first),
        vec![(save_id, false, GeofencingEvent::Entered), (restricted_id, true, GeofencingEvent::Outside)]
    );
    assert!(first.zone_events().iter().all(|e| e.entity_id == entity));

    let second = state.perform_calculation(&entity, &ctx).await.unwrap();
    assert_eq!(
        events(&second),
        vec![(save_id, false, GeofencingEvent::Inside), (restricted_id, true, GeofencingEvent::Outside)]
    );

    clock.advance(std::time::Duration::from_secs(5));
    state.update(&ctx, args([(LATITUDE, single(20, 25.0)), (LONGITUDE, single(20, 25.0))])).unwrap();
    let moved = state.perform_calculation(&entity, &ctx).await.unwrap();
    assert_eq!(
        events(&moved),
        vec![(save_id, false, GeofencingEvent::Left), (restricted_id, true, GeofencingEvent::Entered)]
    );
}

#[tokio::test]
async fn geofencing_report_strategy_filters_events() {
    let clock = FakeClock::new(NOW);
    let mut field = geofencing_field();
    field.configuration.report_strategy = GeofencingReportStrategy::ReportTransitionEventsOnly;
    let ctx = ready_ctx(field, &clock).await;
    let mut state = state_for(&ctx);
    let zone_id = EntityId::new();
    state
        .update(
            &ctx,
            args([
                (LATITUDE, single(10, 5.0)),
                (LONGITUDE, single(10, 5.0)),
                (SAVE_ZONES, zones([rect_zone(zone_id, 1, (0.0, 10.0), (0.0, 10.0))])),
                (RESTRICTED_ZONES, zones([rect_zone(EntityId::new(), 1, (20.0, 30.0), (20.0, 30.0))])),
            ]),
        )
        .unwrap();

    let first = state.perform_calculation(&ctx.entity_id(), &ctx).await.unwrap();
    assert_eq!(first.zone_events().len(), 1);
    assert_eq!((first.zone_events()[0].zone_id, first.zone_events()[0].event), (zone_id, GeofencingEvent::Entered));

    let second = state.perform_calculation(&ctx.entity_id(), &ctx).await.unwrap();
    assert!(second.zone_events().is_empty());
}

#[tokio::test]
async fn geofencing_not_ready_without_zones() {
    let clock = FakeClock::new(NOW);
    let ctx = ready_ctx(geofencing_field(), &clock).await;
    let mut state = state_for(&ctx);
    state
        .update(
            &ctx,
            args([
                (LATITUDE, single(10, 5.0)),
                (LONGITUDE, single(10, 5.0)),
                (SAVE_ZONES, zones([])),
                (RESTRICTED_ZONES, zones([])),
            ]),
        )
        .unwrap();
    assert!(!state.is_ready());
}

// --- last records ---

fn last_records_field(limit: usize) -> CalculatedField {
    let configuration = CalculatedFieldConfiguration::new(Output::time_series("history"))
        .argument("temp", Argument::ts_rolling("temperature").limit(limit));
    CalculatedField::builder().cf_type(CalculatedFieldType::LastRecords).configuration(configuration).build()
}

#[tokio::test]
async fn last_records_keep_newest_points_first() {
    let clock = FakeClock::new(NOW);
    let ctx = ready_ctx(last_records_field(2), &clock).await;
    let mut state = state_for(&ctx);
    for (ts, value) in [(NOW - 3000, 1.0), (NOW - 2000, 2.0), (NOW - 1000, 3.0)] {
        assert!(state.update(&ctx, args([("temp", single(ts, value))])).unwrap());
    }
    let ArgumentEntry::TsRolling(window) = &state.arguments()["temp"] else { panic!("expected rolling slot") };
    assert_eq!(window.len(), 2);
    assert_eq!(state.latest_timestamp(), NOW - 1000);

    let result = state.perform_calculation(&ctx.entity_id(), &ctx).await.unwrap();
    assert_eq!(
        result.payload(),
        Some(&json!({"temp": [{"ts": NOW - 1000, "value": 3.0}, {"ts": NOW - 2000, "value": 2.0}]}))
    );
}

#[tokio::test]
async fn last_records_reject_geofencing_entries() {
    let clock = FakeClock::new(NOW);
    let ctx = ready_ctx(last_records_field(5), &clock).await;
    let mut state = state_for(&ctx);
    let err = state.update(&ctx, args([("temp", zones([]))])).unwrap_err();
    assert_eq!(err.to_string(), "unsupported argument entry type for last records calculated field state: GEOFENCING");
}

// --- script ---

#[tokio::test]
async fn script_receives_ctx_projection_then_arguments() {
    let clock = FakeClock::new(NOW);
    let engine = FakeScriptEngine::new(|_| Ok(json!({"sum": 7})));
    let field = script_field("return {sum: a + b};", &[("a", Argument::ts_latest("a")), ("b", Argument::ts_latest("b"))]);
    let mut ctx = test_ctx(field, &clock).with_script_engine(Arc::new(engine.clone()));
    ctx.init().await.unwrap();
    let mut state = state_for(&ctx);
    state.update(&ctx, args([("a", single(10, 3.0)), ("b", single(20, 4.0))])).unwrap();

    let result = state.perform_calculation(&ctx.entity_id(), &ctx).await.unwrap();
    assert_eq!(result.payload(), Some(&json!({"sum": 7})));

    let calls = engine.calls();
    assert_eq!(calls.len(), 1);
    let sent = &calls[0].args;
    assert_eq!(sent.len(), 3);
    assert_eq!(
        sent[0],
        json!({"latestTs": 20, "args": {"a": {"ts": 10, "value": 3.0}, "b": {"ts": 20, "value": 4.0}}})
    );
    assert_eq!(sent[1], json!({"ts": 10, "value": 3.0}));
    assert_eq!(sent[2], json!({"ts": 20, "value": 4.0}));
}

#[tokio::test]
async fn script_result_timestamp_handling() {
    let clock = FakeClock::new(NOW);
    let engine = FakeScriptEngine::new(|args| {
        let value = args[1]["value"].clone();
        if value == json!(1.0) {
            Ok(json!({"ts": 5, "values": {"x": 1}}))
        } else {
            Ok(json!({"x": 2}))
        }
    });
    let mut field = script_field("return a;", &[("a", Argument::ts_latest("a"))]);
    field.configuration.output = Output::time_series("result").use_latest_ts(true);
    let mut ctx = test_ctx(field, &clock).with_script_engine(Arc::new(engine));
    ctx.init().await.unwrap();
    let mut state = state_for(&ctx);

    state.update(&ctx, args([("a", single(30, 1.0))])).unwrap();
    let kept = state.perform_calculation(&ctx.entity_id(), &ctx).await.unwrap();
    assert_eq!(kept.payload(), Some(&json!({"ts": 5, "values": {"x": 1}})));

    state.update(&ctx, args([("a", single(40, 2.0))])).unwrap();
    let wrapped = state.perform_calculation(&ctx.entity_id(), &ctx).await.unwrap();
    assert_eq!(wrapped.payload(), Some(&json!({"ts": 40, "values": {"x": 2}})));
}

#[tokio::test]
async fn script_accepts_rolling_arguments() {
    let clock = FakeClock::new(NOW);
    let engine = FakeScriptEngine::new(|args| Ok(json!({"n": args[1]["values"].as_array().map_or(0, Vec::len)})));
    let field = script_field("return n;", &[("h", Argument::ts_rolling("h").time_window_ms(60_000i64))]);
    let mut ctx = test_ctx(field, &clock).with_script_engine(Arc::new(engine));
    ctx.init().await.unwrap();
    let mut state = state_for(&ctx);
    let update = ctx.arguments_from_update(None, &crate::test_support::ts_update(NOW - 10, &[("h", 1.0)]));
    state.update(&ctx, update).unwrap();
    let result = state.perform_calculation(&ctx.entity_id(), &ctx).await.unwrap();
    assert_eq!(result.payload(), Some(&json!({"n": 1})));
}

// --- lifecycle and persistence ---

#[tokio::test]
async fn reset_returns_to_fresh_state() {
    let clock = FakeClock::new(NOW);
    let ctx = ready_ctx(simple_field("a", &["a"]), &clock).await;
    let mut state = state_for(&ctx);
    state.update(&ctx, args([("a", single(5, 1.0))])).unwrap();
    state.reset();
    assert!(state.arguments().is_empty());
    assert!(state.required_argument_names().is_empty());
    assert_eq!(state.latest_timestamp(), NO_TIMESTAMP);
    assert_eq!(state.cf_type(), CalculatedFieldType::Simple);
}

#[tokio::test]
async fn restored_state_needs_init_for_readiness() {
    let clock = FakeClock::new(NOW);
    let ctx = ready_ctx(simple_field("a + b", &["a", "b"]), &clock).await;
    let mut state = state_for(&ctx);
    state.update(&ctx, args([("a", single(1, 1.0))])).unwrap();

    let json = serde_json::to_value(&state).unwrap();
    assert_eq!(json["type"], "SIMPLE");
    assert_eq!(json["latestTimestamp"], 1);
    assert!(json.get("requiredArgumentNames").is_none());

    let mut restored: CalculatedFieldState = serde_json::from_value(json).unwrap();
    // with no required names only the stored arguments are checked
    assert!(restored.is_ready());
    restored.init(&ctx);
    assert!(!restored.is_ready());
    assert_eq!(restored, state);
}

#[test]
fn latched_flag_survives_serialization() {
    let ctx = test_ctx(simple_field("a", &["a"]), &FakeClock::new(NOW));
    let mut state = state_for(&ctx);
    state.update(&ctx, args([("a", single(1, "a long enough value"))])).unwrap();
    assert!(state.check_state_size(&ctx.state_key(ctx.entity_id()), 8));

    let restored: CalculatedFieldState = serde_json::from_str(&serde_json::to_string(&state).unwrap()).unwrap();
    assert!(restored.size_exceeds_limit());
    assert!(restored.arguments().is_empty());
}

#[test]
fn from_parts_keeps_arguments_and_timestamp() {
    let arguments = args([("a", SingleValueEntry::new(3, 1.0).into())]);
    let state = CalculatedFieldState::from_parts(CalculatedFieldType::Script, arguments.clone(), 3);
    assert_eq!(state.cf_type(), CalculatedFieldType::Script);
    assert_eq!(state.arguments(), &arguments);
    assert_eq!(state.latest_timestamp(), 3);
}

proptest! {
    #[test]
    fn size_check_never_leaves_an_oversized_state(state in arb_script_state(NOW), max_bytes in 1usize..2048) {
        let key = CfEntityKey::new(crate::id::TenantId::new(), crate::id::CalculatedFieldId::new(), EntityId::new());
        let mut state = state;
        let latched = state.check_state_size(&key, max_bytes);
        if latched {
            prop_assert!(state.arguments().is_empty());
        } else {
            prop_assert!(serde_json::to_vec(&state).unwrap().len() <= max_bytes);
        }
    }
}
