// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Context Ledger row data model.

use crate::EventContextId;
use serde::{Deserialize, Serialize};

/// Maximum size, in bytes, of an `accumulated_json` blob before an
/// `Extend` is rejected as baggage overflow.
pub const MAX_BAGGAGE_BYTES: usize = 1024 * 1024;

/// Prefix marking a baggage key as immutable once first set.
pub const ORIGIN_PREFIX: &str = "origin_";

/// One row in the Context Ledger: a node in the tree of accumulated
/// baggage along a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextRow {
    pub id: EventContextId,
    pub parent_id: Option<EventContextId>,
    pub pipeline_name: String,
    pub step_id: String,
    pub accumulated_json: serde_json::Value,
    pub created_at_ms: u64,
}

impl ContextRow {
    pub fn size_bytes(&self) -> usize {
        // Matches how the store measures baggage: the serialized form, not
        // an estimate over the parsed value.
        serde_json::to_vec(&self.accumulated_json)
            .map(|b| b.len())
            .unwrap_or(usize::MAX)
    }
}

/// Error returned when an `Extend` would push baggage past [`MAX_BAGGAGE_BYTES`].
#[derive(Debug, Clone, thiserror::Error)]
#[error("baggage overflow: accumulated context would be {size} bytes, limit is {MAX_BAGGAGE_BYTES}")]
pub struct BaggageOverflow {
    pub size: usize,
}

/// Merge `incoming` into `base` per `Extend` semantics: for each
/// top-level key in `incoming`, if the key starts with
/// [`ORIGIN_PREFIX`] **and** is already present in `base`, keep `base`'s
/// value; otherwise adopt `incoming`'s value.
pub fn merge_baggage(base: &serde_json::Value, incoming: &serde_json::Value) -> serde_json::Value {
    let mut merged = base.as_object().cloned().unwrap_or_default();
    if let Some(incoming_obj) = incoming.as_object() {
        for (key, value) in incoming_obj {
            if key.starts_with(ORIGIN_PREFIX) && merged.contains_key(key) {
                continue;
            }
            merged.insert(key.clone(), value.clone());
        }
    }
    serde_json::Value::Object(merged)
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
