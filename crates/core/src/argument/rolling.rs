// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::SingleValueEntry;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Window length meaning "no age bound".
pub const UNBOUNDED_WINDOW_MS: i64 = i64::MAX;

/// Count- and age-bounded window of numeric samples keyed by ts.
///
/// After every insertion the window holds at most `limit` records and none
/// older than `now - time_window_ms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TsRollingEntry {
    pub limit: usize,
    #[serde(rename = "timeWindow")]
    pub time_window_ms: i64,
    #[serde(with = "records_serde")]
    records: BTreeMap<i64, f64>,
    #[serde(skip)]
    pub force_reset_previous: bool,
}

impl TsRollingEntry {
    pub fn new(limit: usize, time_window_ms: i64) -> Self {
        Self { limit, time_window_ms, records: BTreeMap::new(), force_reset_previous: false }
    }

    pub fn records(&self) -> &BTreeMap<i64, f64> {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn latest_ts(&self) -> Option<i64> {
        self.records.last_key_value().map(|(ts, _)| *ts)
    }

    /// Insert one sample and re-apply both bounds.
    ///
    /// Returns whether the retained records changed. A sample already outside
    /// the window, or one that falls straight off the count bound, is dropped.
    pub fn insert(&mut self, ts: i64, value: f64, now_ms: i64) -> bool {
        let cutoff = now_ms.saturating_sub(self.time_window_ms);
        let aged = self.evict_before(cutoff);
        if ts < cutoff {
            return aged;
        }

        let previous = self.records.insert(ts, value);
        let replaced = !matches!(previous, Some(p) if p.to_bits() == value.to_bits());

        let mut trimmed = false;
        while self.records.len() > self.limit {
            match self.records.pop_first() {
                Some((first, _)) if first == ts && previous.is_none() => {}
                Some(_) => trimmed = true,
                None => break,
            }
        }
        aged || trimmed || (replaced && self.records.contains_key(&ts))
    }

    /// Merge another window point by point.
    pub fn merge(&mut self, other: &TsRollingEntry, now_ms: i64) -> bool {
        let mut changed = false;
        for (ts, value) in &other.records {
            changed |= self.insert(*ts, *value, now_ms);
        }
        changed
    }

    /// Merge a scalar sample, coercing it to a double.
    ///
    /// Values that don't coerce are stored as NaN.
    pub fn merge_single(&mut self, other: &SingleValueEntry, now_ms: i64) -> bool {
        let Some(kv) = other.value.as_ref() else {
            return false;
        };
        let value = match kv.as_f64() {
            Some(v) => v,
            None => {
                tracing::warn!(ts = other.ts, value_type = %kv, "rolling value is not numeric, storing NaN");
                f64::NAN
            }
        };
        self.insert(other.ts, value, now_ms)
    }

    fn evict_before(&mut self, cutoff: i64) -> bool {
        let before = self.records.len();
        self.records = self.records.split_off(&cutoff);
        self.records.len() != before
    }

    pub fn to_eval_arg(&self, now_ms: i64) -> Value {
        let values: Vec<Value> = self
            .records
            .iter()
            .map(|(ts, v)| json!({"ts": ts, "value": serde_json::Number::from_f64(*v)}))
            .collect();
        json!({
            "timeWindow": {
                "startTs": now_ms.saturating_sub(self.time_window_ms).max(0),
                "endTs": now_ms,
            },
            "values": values,
        })
    }
}

/// Records travel as `[[ts, value], ...]`, values in the kv double encoding.
mod records_serde {
    use crate::kv::WireDouble;
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(records: &BTreeMap<i64, f64>, s: S) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(records.len()))?;
        for (ts, value) in records {
            seq.serialize_element(&(ts, WireDouble(*value)))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<i64, f64>, D::Error> {
        let pairs = Vec::<(i64, WireDouble)>::deserialize(d)?;
        Ok(pairs.into_iter().map(|(ts, v)| (ts, v.0)).collect())
    }
}
