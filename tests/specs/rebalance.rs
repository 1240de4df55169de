// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rebalance specs
//!
//! Partitions move between nodes sharing one state log. The node gaining a
//! partition replays it before treating it as live; the node losing it drops
//! the states it held.

use crate::prelude::*;

fn field_on(entity: EntityId) -> cf_core::CalculatedField {
    let mut field = simple_field("t * 1.8 + 32", &["t"]);
    field.entity_id = entity;
    field
}

/// Two entities that land on different partitions.
fn split_entities(service: &LogStateService) -> (EntityId, EntityId) {
    let partitioner = service.partitioner();
    let first = EntityId::new();
    loop {
        let second = EntityId::new();
        if partitioner.partition_for(&second) != partitioner.partition_for(&first) {
            return (first, second);
        }
    }
}

#[tokio::test]
async fn partition_moves_to_another_node() {
    init_tracing();
    let log: Arc<dyn StateLog> = Arc::new(MemoryLog::new(4));
    let clock = FakeClock::new(NOW);
    let node_a = Arc::new(LogStateService::new(log.clone()));
    let (kept, moved) = split_entities(&node_a);
    let kept_partition = node_a.partitioner().partition_for(&kept);
    let moved_partition = node_a.partitioner().partition_for(&moved);

    let (kept_field, moved_field) = (field_on(kept), field_on(moved));

    node_a.restore(&group(), BTreeSet::from([0, 1, 2, 3])).await.unwrap();
    for field in [&kept_field, &moved_field] {
        let mut node = Node::new(ready_ctx(field.clone(), &clock).await, node_a.clone());
        let result = node.apply(&ts_update(10, &[("t", 100.0)])).await.unwrap();
        assert_eq!(result.payload(), Some(&json!({"result": 212.0})));
    }

    let shrink = node_a.restore(&group(), BTreeSet::from([kept_partition])).await.unwrap();
    assert!(shrink.revoked.contains(&moved_partition));
    assert!(shrink.restored.is_empty());
    assert!(!node_a.tracker().is_live(moved_partition));
    assert!(node_a.tracker().is_live(kept_partition));

    let node_b = Arc::new(LogStateService::new(log));
    let gained = node_b.restore(&group(), BTreeSet::from([moved_partition])).await.unwrap();
    assert!(node_b.tracker().wait_live(moved_partition).await);
    let moved_ctx = ready_ctx(moved_field, &clock).await;
    let mut state = gained.restored.get(&moved_ctx.state_key(moved)).cloned().unwrap();
    assert!(!gained.restored.keys().any(|k| k.entity_id == kept));

    state.init(&moved_ctx);
    let mut node = Node { ctx: moved_ctx, state, service: node_b };
    let result = node.apply(&ts_update(20, &[("t", 0.0)])).await.unwrap();
    assert_eq!(result.payload(), Some(&json!({"result": 32.0})));
}

#[tokio::test]
async fn removed_state_is_not_restored_elsewhere() {
    let log: Arc<dyn StateLog> = Arc::new(MemoryLog::new(2));
    let clock = FakeClock::new(NOW);
    let entity = EntityId::new();
    let node_a = Arc::new(LogStateService::new(log.clone()));
    let mut node = Node::new(ready_ctx(field_on(entity), &clock).await, node_a.clone());
    node.apply(&ts_update(10, &[("t", 20.0)])).await.unwrap();
    node_a.remove_state(node.key()).wait().await.unwrap();

    let node_b = LogStateService::new(log);
    let report = node_b.restore(&group(), BTreeSet::from([0, 1])).await.unwrap();
    assert!(report.restored.is_empty());
    assert_eq!(report.skipped, 0);
}
