// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Geofencing perimeters and zone containment tracking.

mod perimeter;
mod zone;

pub use perimeter::{Coordinates, PerimeterDefinition, PerimeterError};
pub use zone::{GeofencingEvent, GeofencingZoneState, ZoneRuntime};
