// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn create_root_stores_the_initial_payload() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();
    let ledger = ContextLedger::new(&store);
    let row = ledger
        .create_root(
            EventContextId::new("ctx-1"),
            "file-to-report",
            "analyze",
            serde_json::json!({"origin_pattern": "summarize"}),
            1,
        )
        .unwrap();
    assert!(row.parent_id.is_none());
    assert_eq!(row.accumulated_json["origin_pattern"], "summarize");
}

#[test]
fn extend_merges_incoming_payload_over_parent() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();
    let ledger = ContextLedger::new(&store);
    let root = ledger
        .create_root(
            EventContextId::new("ctx-1"),
            "p",
            "step1",
            serde_json::json!({"output_dir": "/tmp/out"}),
            1,
        )
        .unwrap();
    let child = ledger
        .extend(
            EventContextId::new("ctx-2"),
            &root.id,
            "p",
            "step2",
            &serde_json::json!({"pattern": "summarize"}),
            2,
        )
        .unwrap();
    assert_eq!(child.accumulated_json["output_dir"], "/tmp/out");
    assert_eq!(child.accumulated_json["pattern"], "summarize");
}

#[test]
fn origin_prefixed_keys_are_immutable_once_set() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();
    let ledger = ContextLedger::new(&store);
    let root = ledger
        .create_root(
            EventContextId::new("ctx-1"),
            "p",
            "step1",
            serde_json::json!({"origin_pattern": "first"}),
            1,
        )
        .unwrap();
    let child = ledger
        .extend(
            EventContextId::new("ctx-2"),
            &root.id,
            "p",
            "step2",
            &serde_json::json!({"origin_pattern": "second"}),
            2,
        )
        .unwrap();
    assert_eq!(child.accumulated_json["origin_pattern"], "first");
}

#[test]
fn extend_past_max_baggage_bytes_fails() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();
    let ledger = ContextLedger::new(&store);
    let root = ledger
        .create_root(EventContextId::new("ctx-1"), "p", "step1", serde_json::json!({}), 1)
        .unwrap();
    let huge = "x".repeat(MAX_BAGGAGE_BYTES + 1);
    let err = ledger
        .extend(
            EventContextId::new("ctx-2"),
            &root.id,
            "p",
            "step2",
            &serde_json::json!({"blob": huge}),
            2,
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::Baggage(_)));
}

#[test]
fn extend_from_unknown_parent_fails() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();
    let ledger = ContextLedger::new(&store);
    let err = ledger
        .extend(
            EventContextId::new("ctx-2"),
            &EventContextId::new("missing"),
            "p",
            "step2",
            &serde_json::json!({}),
            2,
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::ContextNotFound(_)));
}

#[test]
fn lineage_returns_the_chain_from_root_to_leaf() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();
    let ledger = ContextLedger::new(&store);
    let root = ledger
        .create_root(EventContextId::new("ctx-1"), "p", "step1", serde_json::json!({}), 1)
        .unwrap();
    let mid = ledger
        .extend(EventContextId::new("ctx-2"), &root.id, "p", "step2", &serde_json::json!({}), 2)
        .unwrap();
    let leaf = ledger
        .extend(EventContextId::new("ctx-3"), &mid.id, "p", "step3", &serde_json::json!({}), 3)
        .unwrap();

    let chain = ledger.lineage(&leaf.id);
    assert_eq!(chain.len(), 3);
    assert_eq!(chain[0].id, root.id);
    assert_eq!(chain[2].id, leaf.id);
}
