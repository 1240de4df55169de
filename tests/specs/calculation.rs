// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Calculation specs
//!
//! Telemetry flows from an update through the ctx's routing into the state,
//! and out as a result once every required argument has arrived.

use crate::prelude::*;

fn log_service(partitions: u32) -> Arc<dyn CalculatedFieldStateService> {
    Arc::new(LogStateService::new(Arc::new(MemoryLog::new(partitions))))
}

#[tokio::test]
async fn simple_field_calculates_once_all_arguments_arrive() {
    init_tracing();
    let clock = FakeClock::new(NOW);
    let ctx = ready_ctx(simple_field("(a + b) / 2", &["a", "b"]), &clock).await;
    let mut node = Node::new(ctx, log_service(4));

    assert!(node.apply(&ts_update(10, &[("a", 3.0)])).await.is_none());
    let result = node.apply(&ts_update(20, &[("b", 5.0)])).await.unwrap();
    assert_eq!(result.payload(), Some(&json!({"result": 4.0})));

    // unrelated keys never reach the state
    assert!(node.apply(&ts_update(30, &[("c", 1.0)])).await.is_none());
    assert_eq!(node.state.latest_timestamp(), 20);
}

#[tokio::test]
async fn stale_telemetry_does_not_recalculate() {
    let clock = FakeClock::new(NOW);
    let ctx = ready_ctx(simple_field("a * 2", &["a"]), &clock).await;
    let mut node = Node::new(ctx, log_service(1));

    let first = node.apply(&ts_update(50, &[("a", 2.0)])).await.unwrap();
    assert_eq!(first.payload(), Some(&json!({"result": 4.0})));
    assert!(node.apply(&ts_update(40, &[("a", 9.0)])).await.is_none());

    let stored = node.service.restore_state(&node.key()).await.unwrap().unwrap();
    assert_eq!(stored.latest_timestamp(), 50);
}

#[tokio::test]
async fn script_field_sees_rolling_window() {
    let clock = FakeClock::new(NOW);
    let engine = FakeScriptEngine::new(|args| {
        let values = args[1]["values"].as_array().cloned().unwrap_or_default();
        let sum: f64 = values.iter().filter_map(|v| v["value"].as_f64()).sum();
        Ok(json!({"total": sum, "points": values.len()}))
    });
    let field = script_field("return total;", &[("h", Argument::ts_rolling("humidity").time_window_ms(60_000i64))]);
    let mut ctx = test_ctx(field, &clock).with_script_engine(Arc::new(engine));
    ctx.init().await.unwrap();
    let mut node = Node::new(ctx, log_service(2));

    node.apply(&ts_update(NOW - 2_000, &[("humidity", 40.0)])).await.unwrap();
    let result = node.apply(&ts_update(NOW - 1_000, &[("humidity", 42.0)])).await.unwrap();
    assert_eq!(result.payload(), Some(&json!({"total": 82.0, "points": 2})));
}

#[tokio::test]
async fn geofencing_field_reports_transitions() {
    let clock = FakeClock::new(NOW);
    let ctx = ready_ctx(geofencing_field(), &clock).await;
    let mut node = Node::new(ctx, log_service(2));
    let (home, danger) = (EntityId::new(), EntityId::new());

    let mut new_args = node.ctx.arguments_from_update(None, &ts_update(10, &[("latitude", 5.0), ("longitude", 5.0)]));
    new_args.extend(args([
        (SAVE_ZONES, zones([rect_zone(home, 1, (0.0, 10.0), (0.0, 10.0))])),
        (RESTRICTED_ZONES, zones([rect_zone(danger, 1, (20.0, 30.0), (20.0, 30.0))])),
    ]));
    let entered = node.apply_args(new_args).await.unwrap();
    let events: Vec<_> = entered.zone_events().iter().map(|e| (e.zone_id, e.event)).collect();
    assert_eq!(events, vec![(home, GeofencingEvent::Entered), (danger, GeofencingEvent::Outside)]);

    clock.advance(std::time::Duration::from_secs(5));
    let moved = node.apply(&ts_update(20, &[("latitude", 25.0), ("longitude", 25.0)])).await.unwrap();
    let events: Vec<_> = moved.zone_events().iter().map(|e| (e.zone_id, e.event)).collect();
    assert_eq!(events, vec![(home, GeofencingEvent::Left), (danger, GeofencingEvent::Entered)]);
}
