// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Calculated field definitions.
//!
//! A definition names its arguments, where each one is sourced from, how the
//! result is computed, and where it is written.

use crate::id::{CalculatedFieldId, EntityId, TenantId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Latitude slot of a geofencing field.
pub const LATITUDE: &str = "latitude";
/// Longitude slot of a geofencing field.
pub const LONGITUDE: &str = "longitude";
/// Zones the entity is expected to stay in.
pub const SAVE_ZONES: &str = "saveZones";
/// Zones the entity is expected to stay out of.
pub const RESTRICTED_ZONES: &str = "restrictedZones";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CalculatedFieldType {
    Simple,
    Script,
    Geofencing,
    LastRecords,
}

crate::simple_display! {
    CalculatedFieldType {
        Simple => "SIMPLE",
        Script => "SCRIPT",
        Geofencing => "GEOFENCING",
        LastRecords => "LAST_RECORDS",
    }
}

/// How an argument is sourced from entity data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArgumentKind {
    Attribute,
    TsLatest,
    TsRolling,
}

crate::simple_display! {
    ArgumentKind {
        Attribute => "ATTRIBUTE",
        TsLatest => "TS_LATEST",
        TsRolling => "TS_ROLLING",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttributeScope {
    ClientScope,
    ServerScope,
    SharedScope,
}

crate::simple_display! {
    AttributeScope {
        ClientScope => "CLIENT_SCOPE",
        ServerScope => "SERVER_SCOPE",
        SharedScope => "SHARED_SCOPE",
    }
}

/// The (key, kind, scope) tuple an incoming update is matched against.
///
/// Scope only applies to attributes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferencedEntityKey {
    pub key: String,
    #[serde(rename = "type")]
    pub kind: ArgumentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<AttributeScope>,
}

impl ReferencedEntityKey {
    pub fn attribute(key: impl Into<String>, scope: AttributeScope) -> Self {
        Self { key: key.into(), kind: ArgumentKind::Attribute, scope: Some(scope) }
    }

    pub fn ts_latest(key: impl Into<String>) -> Self {
        Self { key: key.into(), kind: ArgumentKind::TsLatest, scope: None }
    }

    pub fn ts_rolling(key: impl Into<String>) -> Self {
        Self { key: key.into(), kind: ArgumentKind::TsRolling, scope: None }
    }
}

/// One named input of a calculated field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Argument {
    /// Source entity; `None` means the field's own entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_entity_id: Option<EntityId>,
    pub ref_entity_key: ReferencedEntityKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    /// Rolling window size, capped by the tenant limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Rolling window length in ms; absent means no age bound
    #[serde(default, rename = "timeWindow", skip_serializing_if = "Option::is_none")]
    pub time_window_ms: Option<i64>,
}

impl Argument {
    pub fn new(ref_entity_key: ReferencedEntityKey) -> Self {
        Self { ref_entity_id: None, ref_entity_key, default_value: None, limit: None, time_window_ms: None }
    }

    pub fn attribute(key: impl Into<String>, scope: AttributeScope) -> Self {
        Self::new(ReferencedEntityKey::attribute(key, scope))
    }

    pub fn ts_latest(key: impl Into<String>) -> Self {
        Self::new(ReferencedEntityKey::ts_latest(key))
    }

    pub fn ts_rolling(key: impl Into<String>) -> Self {
        Self::new(ReferencedEntityKey::ts_rolling(key))
    }

    crate::setters! {
        option {
            ref_entity_id: EntityId,
            default_value: String,
            limit: usize,
            time_window_ms: i64,
        }
    }

    pub fn kind(&self) -> ArgumentKind {
        self.ref_entity_key.kind
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutputType {
    #[default]
    TimeSeries,
    Attributes,
}

crate::simple_display! {
    OutputType {
        TimeSeries => "TIME_SERIES",
        Attributes => "ATTRIBUTES",
    }
}

/// How the downstream sink should deliver a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutputStrategy {
    #[default]
    Immediate,
    RuleChain,
}

/// Where and how a field's result is written.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Output {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub output_type: OutputType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<AttributeScope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals_by_default: Option<u32>,
    #[serde(default)]
    pub strategy: OutputStrategy,
    /// Stamp time-series results with the state's latest ts instead of letting
    /// the sink use the server time
    #[serde(default)]
    pub use_latest_ts: bool,
}

impl Output {
    pub fn time_series(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()), output_type: OutputType::TimeSeries, ..Self::default() }
    }

    pub fn attributes(name: impl Into<String>, scope: AttributeScope) -> Self {
        Self {
            name: Some(name.into()),
            output_type: OutputType::Attributes,
            scope: Some(scope),
            ..Self::default()
        }
    }

    crate::setters! {
        set {
            strategy: OutputStrategy,
            use_latest_ts: bool,
        }
        option {
            decimals_by_default: u32,
        }
    }
}

/// Which per-zone events a geofencing field reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GeofencingReportStrategy {
    ReportTransitionEventsOnly,
    ReportPresenceStatusOnly,
    #[default]
    ReportTransitionEventsAndPresenceStatus,
}

impl GeofencingReportStrategy {
    pub fn reports(&self, event: crate::geofencing::GeofencingEvent) -> bool {
        match self {
            GeofencingReportStrategy::ReportTransitionEventsOnly => event.is_transition(),
            GeofencingReportStrategy::ReportPresenceStatusOnly => !event.is_transition(),
            GeofencingReportStrategy::ReportTransitionEventsAndPresenceStatus => true,
        }
    }
}

/// Arguments, computation and output of one field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculatedFieldConfiguration {
    /// Ordered; argument order is the binding order for expressions and scripts
    pub arguments: IndexMap<String, Argument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub report_strategy: GeofencingReportStrategy,
}

impl CalculatedFieldConfiguration {
    pub fn new(output: Output) -> Self {
        Self { output, ..Self::default() }
    }

    pub fn argument(mut self, name: impl Into<String>, argument: Argument) -> Self {
        self.arguments.insert(name.into(), argument);
        self
    }

    pub fn expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    pub fn report_strategy(mut self, strategy: GeofencingReportStrategy) -> Self {
        self.report_strategy = strategy;
        self
    }
}

/// A calculated field bound to its owning entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculatedField {
    pub tenant_id: TenantId,
    pub id: CalculatedFieldId,
    pub entity_id: EntityId,
    pub name: String,
    #[serde(rename = "type")]
    pub cf_type: CalculatedFieldType,
    pub configuration: CalculatedFieldConfiguration,
}

crate::builder! {
    pub struct CalculatedFieldBuilder => CalculatedField {
        into {
            name: String = "calculated field",
        }
        set {
            tenant_id: TenantId = TenantId::new(),
            id: CalculatedFieldId = CalculatedFieldId::new(),
            entity_id: EntityId = EntityId::new(),
            cf_type: CalculatedFieldType = CalculatedFieldType::Simple,
            configuration: CalculatedFieldConfiguration = CalculatedFieldConfiguration::default(),
        }
    }
}

#[cfg(test)]
#[path = "field_tests.rs"]
mod tests;
