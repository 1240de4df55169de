// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed attribute and time-series values.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// A typed scalar as stored by the platform.
///
/// JSON values travel as their raw text, the same way the platform stores them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KvValue {
    Boolean(bool),
    Long(i64),
    Double(#[serde(with = "wire_double")] f64),
    String(String),
    Json(String),
}

crate::simple_display! {
    KvValue {
        Boolean(..) => "BOOLEAN",
        Long(..) => "LONG",
        Double(..) => "DOUBLE",
        String(..) => "STRING",
        Json(..) => "JSON",
    }
}

impl KvValue {
    /// Numeric view of the value.
    ///
    /// Longs and doubles pass through, booleans map to 0/1, strings and JSON
    /// text are parsed as a double. Returns `None` when the text doesn't parse.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            KvValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            KvValue::Long(l) => Some(*l as f64),
            KvValue::Double(d) => Some(*d),
            KvValue::String(s) | KvValue::Json(s) => s.trim().parse::<f64>().ok(),
        }
    }

    /// Textual form, as the platform renders values for size accounting.
    pub fn value_as_string(&self) -> String {
        match self {
            KvValue::Boolean(b) => b.to_string(),
            KvValue::Long(l) => l.to_string(),
            KvValue::Double(d) => d.to_string(),
            KvValue::String(s) | KvValue::Json(s) => s.clone(),
        }
    }

    /// JSON projection handed to scripts and result payloads.
    ///
    /// Non-finite doubles become `null`; JSON text that fails to parse is
    /// passed through as a string.
    pub fn to_json(&self) -> Value {
        match self {
            KvValue::Boolean(b) => Value::Bool(*b),
            KvValue::Long(l) => Value::from(*l),
            KvValue::Double(d) => serde_json::Number::from_f64(*d).map(Value::Number).unwrap_or(Value::Null),
            KvValue::String(s) => Value::String(s.clone()),
            KvValue::Json(s) => serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.clone())),
        }
    }
}

impl From<f64> for KvValue {
    fn from(v: f64) -> Self {
        KvValue::Double(v)
    }
}

impl From<i64> for KvValue {
    fn from(v: i64) -> Self {
        KvValue::Long(v)
    }
}

impl From<bool> for KvValue {
    fn from(v: bool) -> Self {
        KvValue::Boolean(v)
    }
}

impl From<&str> for KvValue {
    fn from(v: &str) -> Self {
        KvValue::String(v.to_string())
    }
}

/// A double as persisted. Finite values are JSON numbers; NaN and the
/// infinities are the strings `"NaN"`, `"Infinity"` and `"-Infinity"`.
///
/// `null` reads back as NaN.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WireDouble(pub f64);

impl Serialize for WireDouble {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            v if v.is_finite() => s.serialize_f64(v),
            v if v.is_nan() => s.serialize_str("NaN"),
            v if v > 0.0 => s.serialize_str("Infinity"),
            _ => s.serialize_str("-Infinity"),
        }
    }
}

impl<'de> Deserialize<'de> for WireDouble {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        d.deserialize_any(WireDoubleVisitor)
    }
}

struct WireDoubleVisitor;

impl<'de> Visitor<'de> for WireDoubleVisitor {
    type Value = WireDouble;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a number, \"NaN\", \"Infinity\" or \"-Infinity\"")
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<WireDouble, E> {
        Ok(WireDouble(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<WireDouble, E> {
        Ok(WireDouble(v as f64))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<WireDouble, E> {
        Ok(WireDouble(v as f64))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<WireDouble, E> {
        match v {
            "NaN" => Ok(WireDouble(f64::NAN)),
            "Infinity" => Ok(WireDouble(f64::INFINITY)),
            "-Infinity" => Ok(WireDouble(f64::NEG_INFINITY)),
            other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
        }
    }

    fn visit_unit<E: de::Error>(self) -> Result<WireDouble, E> {
        Ok(WireDouble(f64::NAN))
    }

    fn visit_none<E: de::Error>(self) -> Result<WireDouble, E> {
        Ok(WireDouble(f64::NAN))
    }
}

/// `#[serde(with)]` adapter over [`WireDouble`].
pub(crate) mod wire_double {
    use super::WireDouble;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
        WireDouble(*v).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        WireDouble::deserialize(d).map(|w| w.0)
    }
}

/// One attribute or time-series sample for a key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KvEntry {
    pub key: String,
    pub ts: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    pub value: KvValue,
}

impl KvEntry {
    pub fn new(key: impl Into<String>, ts: i64, value: impl Into<KvValue>) -> Self {
        Self { key: key.into(), ts, version: None, value: value.into() }
    }

    pub fn with_version(mut self, version: i64) -> Self {
        self.version = Some(version);
        self
    }
}

#[cfg(test)]
#[path = "kv_tests.rs"]
mod tests;
