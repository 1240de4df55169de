// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cf_core::test_support::{args, single};
use cf_core::CalculatedFieldType;

fn key() -> CfEntityKey {
    CfEntityKey::new(TenantId::new(), CalculatedFieldId::new(), EntityId::new())
}

#[test]
fn headers_carry_the_full_key() {
    let key = key();
    let headers = RecordHeaders::for_key(&key);
    assert_eq!(headers.pairs().len(), 3);
    assert_eq!(headers.get(ENTITY_ID_HEADER), Some(key.entity_id.to_string().as_bytes()));
    assert_eq!(headers.key().unwrap(), key);
}

#[test]
fn missing_header_is_reported_by_name() {
    let headers = RecordHeaders::from_pairs(vec![(TENANT_ID_HEADER.to_string(), b"x".to_vec())]);
    let err = headers.key().unwrap_err();
    assert!(matches!(err, StateStoreError::InvalidHeader { name: TENANT_ID_HEADER, .. }));

    let headers = RecordHeaders::from_pairs(Vec::new());
    assert!(matches!(headers.key().unwrap_err(), StateStoreError::MissingHeader(TENANT_ID_HEADER)));
}

#[test]
fn later_header_wins() {
    let key = key();
    let mut pairs = RecordHeaders::for_key(&CfEntityKey::new(key.tenant_id, key.cf_id, EntityId::new()))
        .pairs()
        .to_vec();
    pairs.push((ENTITY_ID_HEADER.to_string(), key.entity_id.to_string().into_bytes()));
    assert_eq!(RecordHeaders::from_pairs(pairs).key().unwrap(), key);
}

#[test]
fn body_is_the_tagged_state() {
    let state = CalculatedFieldState::from_parts(CalculatedFieldType::Simple, args([("a", single(5, 2.5))]), 5);
    let body = encode_state(&state).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["type"], "SIMPLE");
    assert_eq!(json["arguments"]["a"]["type"], "SINGLE_VALUE");
    assert_eq!(decode_state(&body).unwrap(), state);
}

#[test]
fn undecodable_body_is_an_error() {
    assert!(matches!(decode_state(b"{\"type\":\"NOPE\"}"), Err(StateStoreError::Json(_))));
}
