// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::kv::{KvEntry, KvValue};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Latest scalar sample for a key.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SingleValueEntry {
    pub ts: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<KvValue>,
    #[serde(skip)]
    pub force_reset_previous: bool,
}

impl SingleValueEntry {
    pub fn new(ts: i64, value: impl Into<KvValue>) -> Self {
        Self { ts, version: None, value: Some(value.into()), force_reset_previous: false }
    }

    pub fn from_kv(entry: &KvEntry) -> Self {
        Self {
            ts: entry.ts,
            version: entry.version,
            value: Some(entry.value.clone()),
            force_reset_previous: false,
        }
    }

    /// Placeholder for a declared argument whose value hasn't arrived.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_version(mut self, version: i64) -> Self {
        self.version = Some(version);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.value.as_ref().and_then(KvValue::as_f64)
    }

    /// Replace ts, version and value together when `other` is fresher.
    pub fn update(&mut self, other: &SingleValueEntry) -> bool {
        if !super::is_fresher(self.ts, self.version, other.ts, other.version) {
            return false;
        }
        self.ts = other.ts;
        self.version = other.version;
        self.value = other.value.clone();
        true
    }

    pub fn to_eval_arg(&self) -> Value {
        json!({
            "ts": self.ts,
            "value": self.value.as_ref().map(KvValue::to_json).unwrap_or(Value::Null),
        })
    }
}
