// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Zone perimeters and point containment.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Errors from parsing a zone perimeter attribute
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PerimeterError {
    #[error("perimeter is not valid JSON: {0}")]
    Json(String),
    #[error("polygon needs at least 3 points, got {0}")]
    TooFewPoints(usize),
    #[error("invalid perimeter: {0}")]
    Invalid(String),
}

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Great-circle distance in meters.
    pub fn distance_m(&self, other: &Coordinates) -> f64 {
        let (lat1, lat2) = (self.latitude.to_radians(), other.latitude.to_radians());
        let d_lat = lat2 - lat1;
        let d_lon = (other.longitude - self.longitude).to_radians();
        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().asin()
    }
}

/// Geographic boundary of a zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PerimeterDefinition {
    Polygon { points: Vec<Coordinates> },
    Circle { center: Coordinates, radius_m: f64 },
}

impl PerimeterDefinition {
    /// Parse the perimeter attribute a zone entity carries.
    ///
    /// Polygons are `[[lat, lon], ...]`. Circles are
    /// `{"latitude": .., "longitude": .., "radius": .., "radiusUnit": ..}`
    /// with the unit defaulting to meters.
    pub fn parse(raw: &str) -> Result<Self, PerimeterError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| PerimeterError::Json(e.to_string()))?;
        match value {
            Value::Array(items) => parse_polygon(&items),
            Value::Object(obj) => {
                let field = |name: &str| {
                    obj.get(name)
                        .and_then(Value::as_f64)
                        .ok_or_else(|| PerimeterError::Invalid(format!("missing numeric '{name}'")))
                };
                let radius = field("radius")?;
                let unit = obj.get("radiusUnit").and_then(Value::as_str).unwrap_or("METER");
                let radius_m = radius * meters_per_unit(unit)?;
                if radius_m.is_nan() || radius_m <= 0.0 {
                    return Err(PerimeterError::Invalid(format!("radius must be positive: {radius}")));
                }
                Ok(PerimeterDefinition::Circle {
                    center: Coordinates::new(field("latitude")?, field("longitude")?),
                    radius_m,
                })
            }
            other => Err(PerimeterError::Invalid(format!("unexpected perimeter shape: {other}"))),
        }
    }

    /// Whether the point lies within the perimeter.
    pub fn contains(&self, point: &Coordinates) -> bool {
        match self {
            PerimeterDefinition::Circle { center, radius_m } => center.distance_m(point) <= *radius_m,
            PerimeterDefinition::Polygon { points } => polygon_contains(points, point),
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn parse_polygon(items: &[Value]) -> Result<PerimeterDefinition, PerimeterError> {
    let mut points = Vec::with_capacity(items.len());
    for item in items {
        let pair = item
            .as_array()
            .filter(|p| p.len() == 2)
            .ok_or_else(|| PerimeterError::Invalid(format!("expected [lat, lon], got {item}")))?;
        match (pair[0].as_f64(), pair[1].as_f64()) {
            (Some(lat), Some(lon)) => points.push(Coordinates::new(lat, lon)),
            _ => return Err(PerimeterError::Invalid(format!("non-numeric point {item}"))),
        }
    }
    if points.len() < 3 {
        return Err(PerimeterError::TooFewPoints(points.len()));
    }
    Ok(PerimeterDefinition::Polygon { points })
}

fn meters_per_unit(unit: &str) -> Result<f64, PerimeterError> {
    match unit {
        "METER" => Ok(1.0),
        "KILOMETER" => Ok(1000.0),
        "FOOT" => Ok(0.3048),
        "MILE" => Ok(1609.344),
        "NAUTICAL_MILE" => Ok(1852.0),
        other => Err(PerimeterError::Invalid(format!("unknown radius unit: {other}"))),
    }
}

/// Even-odd ray casting, treating latitude as y and longitude as x.
fn polygon_contains(points: &[Coordinates], point: &Coordinates) -> bool {
    if points.is_empty() {
        return false;
    }
    let (x, y) = (point.longitude, point.latitude);
    let mut inside = false;
    let mut j = points.len() - 1;
    for i in 0..points.len() {
        let (xi, yi) = (points[i].longitude, points[i].latitude);
        let (xj, yj) = (points[j].longitude, points[j].latitude);
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

#[cfg(test)]
#[path = "perimeter_tests.rs"]
mod tests;
