// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Compiled descriptor of one calculated field.
//!
//! A ctx is built once per field definition. It indexes the arguments by
//! reference key so the dispatcher can test an update for relevance in time
//! proportional to the update, compiles the expression or script once, and
//! fixes the tenant limits the states of this field run under.

use crate::argument::{ArgumentEntry, SingleValueEntry, TsRollingEntry, UNBOUNDED_WINDOW_MS};
use crate::clock::{Clock, SystemClock};
use crate::expr::CompiledExpression;
use crate::field::{
    Argument, ArgumentKind, AttributeScope, CalculatedField, CalculatedFieldType, GeofencingReportStrategy, Output,
    LATITUDE, LONGITUDE, RESTRICTED_ZONES, SAVE_ZONES,
};
use crate::id::{CalculatedFieldId, EntityId, TenantId};
use crate::kv::KvEntry;
use crate::limits::{LimitsProvider, OversizedArgumentPolicy, TenantLimits};
use crate::partition::CfEntityKey;
use crate::script::{ScriptEngine, ScriptId};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;

/// Leading script parameter carrying the state projection.
pub const SCRIPT_CTX_ARG: &str = "ctx";

/// Errors from preparing a ctx
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CtxError {
    #[error("calculated field {cf_id} has an invalid configuration: {reason}")]
    Configuration { cf_id: CalculatedFieldId, reason: String },
}

/// A batch of attribute or time-series values for one entity.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryUpdate {
    Attributes { scope: AttributeScope, entries: Vec<KvEntry> },
    TimeSeries { entries: Vec<KvEntry> },
}

impl TelemetryUpdate {
    pub fn entries(&self) -> &[KvEntry] {
        match self {
            TelemetryUpdate::Attributes { entries, .. } | TelemetryUpdate::TimeSeries { entries } => entries,
        }
    }
}

/// Keys deleted from an entity's attributes or time series.
#[derive(Debug, Clone, PartialEq)]
pub enum RemovedKeys {
    Attributes { scope: AttributeScope, keys: Vec<String> },
    TimeSeries { keys: Vec<String> },
}

/// Which kind of data an update carries, for route matching.
#[derive(Clone, Copy)]
enum Source {
    Attributes(AttributeScope),
    TimeSeries,
}

/// One argument reachable through a telemetry key.
#[derive(Debug, Clone)]
struct ArgRoute {
    kind: ArgumentKind,
    scope: Option<AttributeScope>,
    name: String,
}

impl ArgRoute {
    fn accepts(&self, source: Source) -> bool {
        match source {
            Source::Attributes(scope) => self.kind == ArgumentKind::Attribute && self.scope == Some(scope),
            Source::TimeSeries => matches!(self.kind, ArgumentKind::TsLatest | ArgumentKind::TsRolling),
        }
    }
}

type KeyIndex = HashMap<String, Vec<ArgRoute>>;

pub struct CalculatedFieldCtx {
    definition: CalculatedField,
    arg_names: Vec<String>,
    main_entity_args: KeyIndex,
    linked_entity_args: HashMap<EntityId, KeyIndex>,
    limits: TenantLimits,
    oversized_policy: OversizedArgumentPolicy,
    clock: Arc<dyn Clock>,
    script_engine: Option<Arc<dyn ScriptEngine>>,
    expression: Option<Arc<CompiledExpression>>,
    script_id: Option<ScriptId>,
    initialized: bool,
}

impl std::fmt::Debug for CalculatedFieldCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalculatedFieldCtx")
            .field("cf_id", &self.definition.id)
            .field("cf_type", &self.definition.cf_type)
            .field("arg_names", &self.arg_names)
            .field("limits", &self.limits)
            .field("initialized", &self.initialized)
            .finish()
    }
}

impl CalculatedFieldCtx {
    /// Index the definition and resolve its tenant limits.
    ///
    /// The ctx can't evaluate anything until [`init`](Self::init) succeeds.
    pub fn new(definition: CalculatedField, limits: &dyn LimitsProvider) -> Self {
        let limits = limits.limits(&definition.tenant_id);
        let arg_names: Vec<String> = definition.configuration.arguments.keys().cloned().collect();
        let mut main_entity_args = KeyIndex::new();
        let mut linked_entity_args: HashMap<EntityId, KeyIndex> = HashMap::new();
        for (name, argument) in &definition.configuration.arguments {
            let route = ArgRoute {
                kind: argument.ref_entity_key.kind,
                scope: argument.ref_entity_key.scope,
                name: name.clone(),
            };
            let index = match argument.ref_entity_id {
                Some(id) if id != definition.entity_id => linked_entity_args.entry(id).or_default(),
                _ => &mut main_entity_args,
            };
            index.entry(argument.ref_entity_key.key.clone()).or_default().push(route);
        }
        Self {
            definition,
            arg_names,
            main_entity_args,
            linked_entity_args,
            limits,
            oversized_policy: OversizedArgumentPolicy::default(),
            clock: Arc::new(SystemClock),
            script_engine: None,
            expression: None,
            script_id: None,
            initialized: false,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_script_engine(mut self, engine: Arc<dyn ScriptEngine>) -> Self {
        self.script_engine = Some(engine);
        self
    }

    pub fn with_oversized_policy(mut self, policy: OversizedArgumentPolicy) -> Self {
        self.oversized_policy = policy;
        self
    }

    /// Validate the definition and compile its expression or script.
    ///
    /// Failure leaves the ctx uninitialized until the field is redeployed.
    pub async fn init(&mut self) -> Result<(), CtxError> {
        self.initialized = false;
        match self.definition.cf_type {
            CalculatedFieldType::Simple => {
                if let Some((name, _)) =
                    self.arguments().iter().find(|(_, a)| a.kind() == ArgumentKind::TsRolling)
                {
                    return Err(self.config_error(format!("simple field argument '{name}' can't be TS_ROLLING")));
                }
                let source = self.required_expression()?;
                let compiled = CompiledExpression::compile(&source, &self.arg_names)
                    .map_err(|e| self.config_error(e.to_string()))?;
                self.expression = Some(Arc::new(compiled));
            }
            CalculatedFieldType::Script => {
                let source = self.required_expression()?;
                let Some(engine) = self.script_engine.clone() else {
                    return Err(self.config_error("no scripting runtime configured".to_string()));
                };
                let mut params = Vec::with_capacity(self.arg_names.len() + 1);
                params.push(SCRIPT_CTX_ARG.to_string());
                params.extend(self.arg_names.iter().cloned());
                let id = engine.compile(&source, &params).await.map_err(|e| self.config_error(e.to_string()))?;
                self.script_id = Some(id);
            }
            CalculatedFieldType::Geofencing => self.validate_geofencing()?,
            CalculatedFieldType::LastRecords => {}
        }
        self.initialized = true;
        tracing::debug!(cf_id = %self.cf_id(), cf_type = %self.cf_type(), "calculated field ctx initialized");
        Ok(())
    }

    /// Release the compiled script or expression.
    pub async fn stop(&mut self) {
        if let (Some(engine), Some(id)) = (self.script_engine.as_ref(), self.script_id.take()) {
            engine.release(&id).await;
        }
        self.expression = None;
        self.initialized = false;
    }

    fn required_expression(&self) -> Result<String, CtxError> {
        match self.definition.configuration.expression.as_deref().map(str::trim) {
            Some(source) if !source.is_empty() => Ok(source.to_string()),
            _ => Err(self.config_error("expression is required".to_string())),
        }
    }

    fn validate_geofencing(&self) -> Result<(), CtxError> {
        for name in [LATITUDE, LONGITUDE] {
            match self.arguments().get(name) {
                None => return Err(self.config_error(format!("missing '{name}' argument"))),
                Some(a) if a.kind() != ArgumentKind::TsLatest => {
                    return Err(self.config_error(format!(
                        "'{name}' argument must be TS_LATEST, got {}",
                        a.kind()
                    )));
                }
                Some(_) => {}
            }
        }
        if !self.arguments().contains_key(SAVE_ZONES) && !self.arguments().contains_key(RESTRICTED_ZONES) {
            return Err(self.config_error(format!("at least one of '{SAVE_ZONES}' or '{RESTRICTED_ZONES}' is required")));
        }
        if let Some(other) = self.arg_names.iter().find(|n| !is_geofencing_slot(n)) {
            return Err(self.config_error(format!("unexpected geofencing argument '{other}'")));
        }
        Ok(())
    }

    fn config_error(&self, reason: String) -> CtxError {
        CtxError::Configuration { cf_id: self.definition.id, reason }
    }

    // --- matching ---

    /// Whether an update of the field's own entity touches any argument.
    pub fn matches(&self, update: &TelemetryUpdate) -> bool {
        Self::index_matches(&self.main_entity_args, update)
    }

    /// Whether an update of a linked entity touches any argument.
    pub fn link_matches(&self, entity_id: &EntityId, update: &TelemetryUpdate) -> bool {
        self.linked_entity_args.get(entity_id).is_some_and(|index| Self::index_matches(index, update))
    }

    pub fn matches_removed(&self, removed: &RemovedKeys) -> bool {
        Self::index_matches_removed(&self.main_entity_args, removed)
    }

    pub fn link_matches_removed(&self, entity_id: &EntityId, removed: &RemovedKeys) -> bool {
        self.linked_entity_args.get(entity_id).is_some_and(|index| Self::index_matches_removed(index, removed))
    }

    fn index_matches(index: &KeyIndex, update: &TelemetryUpdate) -> bool {
        let source = source_of(update);
        update.entries().iter().any(|kv| route_hit(index, &kv.key, source))
    }

    fn index_matches_removed(index: &KeyIndex, removed: &RemovedKeys) -> bool {
        let (source, keys) = match removed {
            RemovedKeys::Attributes { scope, keys } => (Source::Attributes(*scope), keys),
            RemovedKeys::TimeSeries { keys } => (Source::TimeSeries, keys),
        };
        keys.iter().any(|key| route_hit(index, key, source))
    }

    /// Map a matched update onto the argument slots it feeds.
    ///
    /// `source` is the entity the update belongs to, `None` meaning the
    /// field's own entity. Rolling arguments become one-point windows with
    /// this ctx's limit and window. Geofencing zone slots are assembled by
    /// the caller from zone perimeters and are skipped here.
    pub fn arguments_from_update(
        &self,
        source: Option<&EntityId>,
        update: &TelemetryUpdate,
    ) -> BTreeMap<String, ArgumentEntry> {
        let index = match source {
            Some(id) if *id != self.definition.entity_id => match self.linked_entity_args.get(id) {
                Some(index) => index,
                None => return BTreeMap::new(),
            },
            _ => &self.main_entity_args,
        };
        let kind = source_of(update);
        let now = self.now_ms();
        let mut out: BTreeMap<String, ArgumentEntry> = BTreeMap::new();
        for kv in update.entries() {
            let Some(routes) = index.get(&kv.key) else {
                continue;
            };
            for route in routes.iter().filter(|r| r.accepts(kind)) {
                if self.cf_type() == CalculatedFieldType::Geofencing && is_zone_slot(&route.name) {
                    continue;
                }
                let single = SingleValueEntry::from_kv(kv);
                match (route.kind, out.get_mut(&route.name)) {
                    (ArgumentKind::TsRolling, Some(ArgumentEntry::TsRolling(window))) => {
                        window.merge_single(&single, now);
                    }
                    (ArgumentKind::TsRolling, _) => {
                        let (limit, window_ms) = self.rolling_params(&route.name);
                        let mut window = TsRollingEntry::new(limit, window_ms);
                        window.merge_single(&single, now);
                        out.insert(route.name.clone(), window.into());
                    }
                    (_, Some(ArgumentEntry::SingleValue(current))) if current.ts >= single.ts => {}
                    _ => {
                        out.insert(route.name.clone(), single.into());
                    }
                }
            }
        }
        out
    }

    /// Entries for arguments that declare a default value.
    pub fn default_arguments(&self) -> BTreeMap<String, ArgumentEntry> {
        self.arguments()
            .iter()
            .filter(|(_, a)| a.kind() != ArgumentKind::TsRolling)
            .filter_map(|(name, a)| {
                let value = a.default_value.as_deref()?;
                Some((name.clone(), SingleValueEntry::new(0, value).into()))
            })
            .collect()
    }

    // --- change impact ---

    /// Output or computation changed; existing state can be recomputed.
    pub fn has_other_significant_changes(&self, other: &CalculatedFieldCtx) -> bool {
        let (a, b) = (&self.definition.configuration, &other.definition.configuration);
        a.output != b.output || a.expression != b.expression || a.report_strategy != b.report_strategy
    }

    /// Type or arguments changed; accumulated state must be discarded.
    pub fn has_state_changes(&self, other: &CalculatedFieldCtx) -> bool {
        self.definition.cf_type != other.definition.cf_type
            || self.definition.configuration.arguments != other.definition.configuration.arguments
    }

    // --- accessors ---

    pub fn definition(&self) -> &CalculatedField {
        &self.definition
    }

    pub fn tenant_id(&self) -> TenantId {
        self.definition.tenant_id
    }

    pub fn cf_id(&self) -> CalculatedFieldId {
        self.definition.id
    }

    pub fn entity_id(&self) -> EntityId {
        self.definition.entity_id
    }

    pub fn cf_type(&self) -> CalculatedFieldType {
        self.definition.cf_type
    }

    /// State key for one entity evaluated by this field.
    pub fn state_key(&self, entity_id: EntityId) -> CfEntityKey {
        CfEntityKey::new(self.tenant_id(), self.cf_id(), entity_id)
    }

    pub fn arguments(&self) -> &indexmap::IndexMap<String, Argument> {
        &self.definition.configuration.arguments
    }

    /// Argument names in binding order.
    pub fn arg_names(&self) -> &[String] {
        &self.arg_names
    }

    pub fn required_argument_names(&self) -> impl Iterator<Item = &String> {
        self.arg_names.iter()
    }

    pub fn output(&self) -> &Output {
        &self.definition.configuration.output
    }

    pub fn report_strategy(&self) -> GeofencingReportStrategy {
        self.definition.configuration.report_strategy
    }

    pub fn expression(&self) -> Option<&CompiledExpression> {
        self.expression.as_deref()
    }

    pub fn script(&self) -> Option<(&Arc<dyn ScriptEngine>, &ScriptId)> {
        self.script_engine.as_ref().zip(self.script_id.as_ref())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn limits(&self) -> &TenantLimits {
        &self.limits
    }

    pub fn max_rolling_points(&self) -> usize {
        self.limits.max_data_points_per_rolling_arg
    }

    pub fn max_state_size_bytes(&self) -> usize {
        self.limits.max_state_size_bytes()
    }

    pub fn max_single_value_bytes(&self) -> usize {
        self.limits.max_single_value_bytes()
    }

    pub fn oversized_policy(&self) -> OversizedArgumentPolicy {
        self.oversized_policy
    }

    /// Window size and length for a rolling slot.
    pub fn rolling_params(&self, name: &str) -> (usize, i64) {
        let argument = self.arguments().get(name);
        let limit = self.limits.rolling_limit(argument.and_then(|a| a.limit));
        let window = argument.and_then(|a| a.time_window_ms).unwrap_or(UNBOUNDED_WINDOW_MS);
        (limit, window)
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }
}

fn source_of(update: &TelemetryUpdate) -> Source {
    match update {
        TelemetryUpdate::Attributes { scope, .. } => Source::Attributes(*scope),
        TelemetryUpdate::TimeSeries { .. } => Source::TimeSeries,
    }
}

fn route_hit(index: &KeyIndex, key: &str, source: Source) -> bool {
    index.get(key).is_some_and(|routes| routes.iter().any(|r| r.accepts(source)))
}

fn is_zone_slot(name: &str) -> bool {
    name == SAVE_ZONES || name == RESTRICTED_ZONES
}

fn is_geofencing_slot(name: &str) -> bool {
    name == LATITUDE || name == LONGITUDE || is_zone_slot(name)
}

#[cfg(test)]
#[path = "ctx_tests.rs"]
mod tests;
