// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recovery specs
//!
//! A node that restarts picks its states back up from the store and carries
//! on calculating where the previous process stopped.

use crate::prelude::*;
use cf_core::{StaticLimits, TenantLimits};

#[tokio::test]
async fn embedded_states_survive_restart() {
    init_tracing();
    let dir = tempdir().unwrap();
    let path = dir.path().join("states.jsonl");
    let clock = FakeClock::new(NOW);
    let field = simple_field("a - b", &["a", "b"]);

    let mut node = Node::new(
        ready_ctx(field.clone(), &clock).await,
        Arc::new(EmbeddedStateService::open(&path, 0).unwrap()),
    );
    node.apply(&ts_update(10, &[("a", 10.0), ("b", 4.0)])).await.unwrap();
    drop(node);

    let service = Arc::new(EmbeddedStateService::open(&path, 0).unwrap());
    let mut node = Node::recover(ready_ctx(field, &clock).await, service, BTreeSet::from([0])).await;
    assert!(node.state.is_ready());
    assert_eq!(node.state.latest_timestamp(), 10);

    // one argument is enough now that the other came back from disk
    let result = node.apply(&ts_update(20, &[("b", 1.0)])).await.unwrap();
    assert_eq!(result.payload(), Some(&json!({"result": 9.0})));
}

#[tokio::test]
async fn zone_runtimes_survive_restart() {
    let log: Arc<dyn StateLog> = Arc::new(MemoryLog::new(1));
    let clock = FakeClock::new(NOW);
    let home = EntityId::new();
    let field = geofencing_field();

    let mut node = Node::new(ready_ctx(field.clone(), &clock).await, Arc::new(LogStateService::new(log.clone())));
    let entered = node
        .apply_args(args([
            (LATITUDE, single(10, 5.0)),
            (LONGITUDE, single(10, 5.0)),
            (SAVE_ZONES, zones([rect_zone(home, 1, (0.0, 10.0), (0.0, 10.0))])),
            (RESTRICTED_ZONES, zones([rect_zone(EntityId::new(), 1, (40.0, 50.0), (40.0, 50.0))])),
        ]))
        .await
        .unwrap();
    assert_eq!(entered.zone_events()[0].event, GeofencingEvent::Entered);
    drop(node);

    let service = Arc::new(LogStateService::new(log));
    let mut node = Node::recover(ready_ctx(field, &clock).await, service, BTreeSet::from([0])).await;
    clock.advance(std::time::Duration::from_secs(1));
    let again = node.apply(&ts_update(20, &[("latitude", 6.0), ("longitude", 6.0)])).await.unwrap();
    // the restored runtime already knows the entity is inside
    assert_eq!(again.zone_events()[0].event, GeofencingEvent::Inside);
}

#[tokio::test]
async fn oversized_state_is_removed_from_the_store() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("states.jsonl");
    let clock = FakeClock::new(NOW);
    let limits = TenantLimits { max_state_size_in_kbytes: 1, ..TenantLimits::default() };
    let field = script_field("return n;", &[("h", Argument::ts_rolling("h").time_window_ms(600_000i64))]);
    let engine = FakeScriptEngine::new(|_| Ok(json!({"n": 1})));
    let mut ctx = CalculatedFieldCtx::new(field, &StaticLimits(limits))
        .with_clock(Arc::new(clock.clone()))
        .with_script_engine(Arc::new(engine));
    ctx.init().await.unwrap();

    let service: Arc<dyn CalculatedFieldStateService> = Arc::new(EmbeddedStateService::open(&path, 0).unwrap());
    let mut node = Node::new(ctx, service.clone());
    assert!(node.apply(&ts_update(NOW - 100, &[("h", 1.0)])).await.is_some());
    assert!(service.restore_state(&node.key()).await.unwrap().is_some());

    let mut latched = false;
    for i in 1..200 {
        node.apply(&ts_update(NOW - 100 + i, &[("h", 1.0)])).await;
        if node.state.size_exceeds_limit() {
            latched = true;
            break;
        }
    }
    assert!(latched);
    assert!(node.state.arguments().is_empty());
    assert!(service.restore_state(&node.key()).await.unwrap().is_none());
}
