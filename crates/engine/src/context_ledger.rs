// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CreateRoot/Extend/Lineage over the Context Ledger, persisted as rows in
//! the Durable Store's `MaterializedState` — each `Extend` is itself an
//! `Event` folded into state, so crash recovery comes for free via WAL
//! replay, following the rest of the engine's event-sourced state shape.

use crate::error::EngineError;
use crate::store::Store;
use ductile_core::{merge_baggage, ContextRow, EventContextId, Event, MAX_BAGGAGE_BYTES, ORIGIN_PREFIX};

pub struct ContextLedger<'a> {
    store: &'a Store,
}

impl<'a> ContextLedger<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// CreateRoot(pipeline_name, step_id, initial_payload): every
    /// `origin_`-prefixed top-level key in `initial_payload` is immutable
    /// from this row onward.
    pub fn create_root(
        &self,
        id: EventContextId,
        pipeline_name: &str,
        step_id: &str,
        initial_payload: serde_json::Value,
        now_ms: u64,
    ) -> Result<ContextRow, EngineError> {
        let row = ContextRow {
            id,
            parent_id: None,
            pipeline_name: pipeline_name.to_string(),
            step_id: step_id.to_string(),
            accumulated_json: initial_payload,
            created_at_ms: now_ms,
        };
        self.insert(row)
    }

    /// Extend(parent_id, pipeline_name, step_id, incoming_event_payload).
    /// Fails with [`EngineError::Baggage`] if the merged blob exceeds
    /// [`MAX_BAGGAGE_BYTES`].
    pub fn extend(
        &self,
        id: EventContextId,
        parent_id: &EventContextId,
        pipeline_name: &str,
        step_id: &str,
        incoming_payload: &serde_json::Value,
        now_ms: u64,
    ) -> Result<ContextRow, EngineError> {
        let parent = self
            .store
            .read()
            .context_rows
            .get(parent_id.as_str())
            .cloned()
            .ok_or_else(|| EngineError::ContextNotFound(parent_id.to_string()))?;

        let merged = merge_baggage(&parent.accumulated_json, incoming_payload);
        let row = ContextRow {
            id,
            parent_id: Some(parent_id.clone()),
            pipeline_name: pipeline_name.to_string(),
            step_id: step_id.to_string(),
            accumulated_json: merged,
            created_at_ms: now_ms,
        };
        let size = row.size_bytes();
        if size > MAX_BAGGAGE_BYTES {
            return Err(EngineError::Baggage(ductile_core::BaggageOverflow { size }));
        }
        self.insert(row)
    }

    /// Lineage(context_id): the ordered chain from root to this row.
    pub fn lineage(&self, context_id: &EventContextId) -> Vec<ContextRow> {
        let state = self.store.read();
        let mut chain = Vec::new();
        let mut current = state.context_rows.get(context_id.as_str()).cloned();
        while let Some(row) = current {
            let parent_id = row.parent_id.clone();
            chain.push(row);
            current = parent_id.and_then(|id| state.context_rows.get(id.as_str()).cloned());
        }
        chain.reverse();
        chain
    }

    fn insert(&self, row: ContextRow) -> Result<ContextRow, EngineError> {
        self.store.apply(Event::ContextRowCreated { row: Box::new(row.clone()) })?;
        Ok(row)
    }
}

/// Keys beginning with [`ORIGIN_PREFIX`] survive unchanged from their first
/// appearance along a row's lineage; exposed for callers that want to
/// check this without walking the whole lineage.
pub fn is_origin_key(key: &str) -> bool {
    key.starts_with(ORIGIN_PREFIX)
}

#[cfg(test)]
#[path = "context_ledger_tests.rs"]
mod tests;
