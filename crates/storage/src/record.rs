// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted wire form of a calculated field state.
//!
//! A record body is the JSON state itself, discriminated by its `type` tag.
//! The key travels beside the body as headers so a consumer can route or
//! delete a record without decoding it; a removal is headers with no body.

use crate::error::StateStoreError;
use cf_core::{CalculatedFieldId, CalculatedFieldState, CfEntityKey, EntityId, TenantId};
use std::str::FromStr;

pub const TENANT_ID_HEADER: &str = "tenantId";
pub const CF_ID_HEADER: &str = "cfId";
pub const ENTITY_ID_HEADER: &str = "entityId";

/// Key headers attached to every record, including tombstones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeaders(Vec<(String, Vec<u8>)>);

impl RecordHeaders {
    pub fn for_key(key: &CfEntityKey) -> Self {
        Self(vec![
            (TENANT_ID_HEADER.to_string(), key.tenant_id.to_string().into_bytes()),
            (CF_ID_HEADER.to_string(), key.cf_id.to_string().into_bytes()),
            (ENTITY_ID_HEADER.to_string(), key.entity_id.to_string().into_bytes()),
        ])
    }

    pub fn from_pairs(pairs: Vec<(String, Vec<u8>)>) -> Self {
        Self(pairs)
    }

    pub fn pairs(&self) -> &[(String, Vec<u8>)] {
        &self.0
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.0.iter().rev().find(|(n, _)| n == name).map(|(_, v)| v.as_slice())
    }

    /// Recover the state key from the headers.
    pub fn key(&self) -> Result<CfEntityKey, StateStoreError> {
        Ok(CfEntityKey::new(
            self.parse::<TenantId>(TENANT_ID_HEADER)?,
            self.parse::<CalculatedFieldId>(CF_ID_HEADER)?,
            self.parse::<EntityId>(ENTITY_ID_HEADER)?,
        ))
    }

    fn parse<T>(&self, name: &'static str) -> Result<T, StateStoreError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.get(name).ok_or(StateStoreError::MissingHeader(name))?;
        let text = std::str::from_utf8(raw)
            .map_err(|e| StateStoreError::InvalidHeader { name, reason: e.to_string() })?;
        text.parse().map_err(|e: T::Err| StateStoreError::InvalidHeader { name, reason: e.to_string() })
    }
}

/// Body of a state record.
pub fn encode_state(state: &CalculatedFieldState) -> Result<Vec<u8>, StateStoreError> {
    Ok(serde_json::to_vec(state)?)
}

pub fn decode_state(body: &[u8]) -> Result<CalculatedFieldState, StateStoreError> {
    Ok(serde_json::from_slice(body)?)
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
