// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for workspace specs

pub use cf_core::field::{LATITUDE, LONGITUDE, RESTRICTED_ZONES, SAVE_ZONES};
pub use cf_core::test_support::{
    args, geofencing_field, rect_zone, script_field, simple_field, single, test_ctx, ts_update, zones,
};
pub use cf_core::{
    Argument, CalculatedFieldCtx, CalculatedFieldResult, CalculatedFieldState, CfEntityKey,
    EntityId, FakeClock, FakeScriptEngine, GeofencingEvent, TelemetryUpdate,
};
pub use cf_storage::{
    CalculatedFieldStateService, EmbeddedStateService, LogStateService, MemoryLog, PartitionGroup, StateLog,
};
pub use serde_json::json;
pub use std::collections::{BTreeMap, BTreeSet};
pub use std::sync::Arc;
pub use tempfile::tempdir;

pub const NOW: i64 = 1_000_000;

/// Route test logs through the harness; `RUST_LOG` picks the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn group() -> PartitionGroup {
    PartitionGroup::new("cf-states")
}

pub async fn ready_ctx(definition: cf_core::CalculatedField, clock: &FakeClock) -> CalculatedFieldCtx {
    let mut ctx = test_ctx(definition, clock);
    if let Err(e) = ctx.init().await {
        panic!("ctx init failed: {e}");
    }
    ctx
}

/// One node's view of a field: its ctx, the live state and the store behind it.
pub struct Node {
    pub ctx: CalculatedFieldCtx,
    pub state: CalculatedFieldState,
    pub service: Arc<dyn CalculatedFieldStateService>,
}

impl Node {
    pub fn new(ctx: CalculatedFieldCtx, service: Arc<dyn CalculatedFieldStateService>) -> Self {
        let mut state = CalculatedFieldState::new(ctx.cf_type());
        state.init(&ctx);
        Self { ctx, state, service }
    }

    pub fn key(&self) -> CfEntityKey {
        self.ctx.state_key(self.ctx.entity_id())
    }

    /// Feed an update for the field's own entity, calculate when ready, then persist.
    pub async fn apply(&mut self, update: &TelemetryUpdate) -> Option<CalculatedFieldResult> {
        if !self.ctx.matches(update) {
            return None;
        }
        let new_args = self.ctx.arguments_from_update(None, update);
        self.apply_args(new_args).await
    }

    pub async fn apply_args(
        &mut self,
        new_args: BTreeMap<String, cf_core::ArgumentEntry>,
    ) -> Option<CalculatedFieldResult> {
        let changed = match self.state.update(&self.ctx, new_args) {
            Ok(changed) => changed,
            Err(e) => panic!("update failed: {e}"),
        };
        if !changed {
            return None;
        }
        let entity = self.ctx.entity_id();
        let mut result = None;
        if self.state.is_ready() {
            match self.state.perform_calculation(&entity, &self.ctx).await {
                Ok(r) => result = Some(r),
                Err(e) => panic!("calculation failed: {e}"),
            }
        }
        // calculation may advance zone runtimes, so persist afterwards
        let key = self.key();
        let ticket = if self.state.check_state_size(&key, self.ctx.max_state_size_bytes()) {
            self.service.remove_state(key)
        } else {
            self.service.persist_state(key, &self.state)
        };
        if let Err(e) = ticket.wait().await {
            panic!("write failed: {e}");
        }
        result.filter(|_| !self.state.size_exceeds_limit())
    }

    /// Pull the field's state back out of `service`, as a fresh node would.
    pub async fn recover(
        ctx: CalculatedFieldCtx,
        service: Arc<dyn CalculatedFieldStateService>,
        partitions: BTreeSet<u32>,
    ) -> Self {
        let key = ctx.state_key(ctx.entity_id());
        let report = match service.restore(&group(), partitions).await {
            Ok(report) => report,
            Err(e) => panic!("restore failed: {e}"),
        };
        let mut state = report.restored.get(&key).cloned().unwrap_or_else(|| CalculatedFieldState::new(ctx.cf_type()));
        state.init(&ctx);
        Self { ctx, state, service }
    }
}
