// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cf-core: calculated field state engine

pub mod macros;

pub mod argument;
pub mod clock;
pub mod ctx;
pub mod expr;
pub mod field;
pub mod geofencing;
pub mod id;
pub mod kv;
pub mod limits;
pub mod partition;
pub mod result;
pub mod script;
pub mod state;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use argument::{
    ArgumentEntry, ArgumentEntryType, ArgumentError, GeofencingEntry, SingleValueEntry, TsRollingEntry,
};
pub use clock::{Clock, FakeClock, SystemClock};
pub use ctx::{CalculatedFieldCtx, CtxError, RemovedKeys, TelemetryUpdate};
pub use expr::{CompiledExpression, ExprError};
#[cfg(any(test, feature = "test-support"))]
pub use field::CalculatedFieldBuilder;
pub use field::{
    Argument, ArgumentKind, AttributeScope, CalculatedField, CalculatedFieldConfiguration, CalculatedFieldType,
    GeofencingReportStrategy, Output, OutputStrategy, OutputType, ReferencedEntityKey,
};
pub use geofencing::{Coordinates, GeofencingEvent, GeofencingZoneState, PerimeterDefinition, PerimeterError};
pub use id::{CalculatedFieldId, EntityId, TenantId};
pub use kv::{KvEntry, KvValue};
pub use limits::{LimitsProvider, OversizedArgumentPolicy, StaticLimits, TenantLimits};
pub use partition::{CfEntityKey, Partitioner};
pub use result::{CalculatedFieldResult, TelemetryResult, ZoneEventRecord};
#[cfg(any(test, feature = "test-support"))]
pub use script::{FakeScriptEngine, ScriptCall};
pub use script::{ScriptEngine, ScriptError, ScriptId};
pub use state::{CalculatedFieldState, CalculationError, NO_TIMESTAMP};
