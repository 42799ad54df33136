// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retention-driven cleanup of terminal job rows, orphan workspaces, and
//! expired context ledger subtrees, run on the same scheduler tick as
//! polling. Follows the checkpoint/WAL-truncation housekeeping rhythm:
//! periodic, best-effort, logged rather than propagated as a hard failure.

use crate::error::EngineError;
use crate::store::Store;
use crate::workspace_manager::WorkspaceManager;
use ductile_core::{Clock, Event};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

pub struct Pruner<C: Clock> {
    store: Arc<Store>,
    clock: Arc<C>,
    workspaces: Arc<WorkspaceManager>,
    retention: Duration,
}

/// What one pruning pass removed, for logging/metrics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PruneReport {
    pub jobs_pruned: usize,
    pub workspaces_removed: usize,
    pub context_rows_pruned: usize,
}

impl<C: Clock> Pruner<C> {
    pub fn new(store: Arc<Store>, clock: Arc<C>, workspaces: Arc<WorkspaceManager>, retention: Duration) -> Self {
        Self {
            store,
            clock,
            workspaces,
            retention,
        }
    }

    fn now_ms(&self) -> u64 {
        self.clock.now().timestamp_millis().max(0) as u64
    }

    /// One pruning pass: terminal jobs whose `completed_at_ms` is older
    /// than the retention window are dropped, their workspaces unlinked
    /// (unless still referenced by a live child), and any context row
    /// rooted entirely in pruned jobs is collapsed.
    pub fn prune(&self) -> Result<PruneReport, EngineError> {
        let now_ms = self.now_ms();
        let cutoff_ms = now_ms.saturating_sub(self.retention.as_millis() as u64);

        let (expired_jobs, live_job_ids): (Vec<_>, HashSet<_>) = {
            let state = self.store.read();
            let expired: Vec<_> = state
                .jobs
                .values()
                .filter(|j| j.is_terminal())
                .filter(|j| j.completed_at_ms.is_some_and(|t| t <= cutoff_ms))
                .cloned()
                .collect();
            let live: HashSet<_> = state.jobs.keys().cloned().collect();
            (expired, live)
        };

        let mut report = PruneReport::default();
        for job in &expired_jobs {
            let still_referenced = {
                let state = self.store.read();
                state.jobs.values().any(|j| j.parent_job_id.as_ref() == Some(&job.id))
            };
            if !still_referenced {
                if self.workspaces.cleanup(&job.id).is_ok() {
                    report.workspaces_removed += 1;
                } else {
                    tracing::warn!(job_id = %job.id, "failed to remove workspace during pruning");
                }
            }

            if let Some(context_id) = &job.event_context_id {
                if self.context_row_is_prunable(context_id, &live_job_ids, job.id.as_str()) {
                    self.store.apply(Event::ContextRowPruned { id: context_id.clone() })?;
                    report.context_rows_pruned += 1;
                }
            }

            self.store.apply(Event::JobPruned { job_id: job.id.clone() })?;
            report.jobs_pruned += 1;
        }

        tracing::info!(
            jobs_pruned = report.jobs_pruned,
            workspaces_removed = report.workspaces_removed,
            context_rows_pruned = report.context_rows_pruned,
            "retention pruning pass complete"
        );
        Ok(report)
    }

    /// A context row is prunable once no job still in the store (other
    /// than the one we're about to prune) references it.
    fn context_row_is_prunable(
        &self,
        context_id: &ductile_core::EventContextId,
        live_job_ids: &HashSet<String>,
        excluding_job_id: &str,
    ) -> bool {
        let state = self.store.read();
        !state.jobs.iter().any(|(id, j)| {
            live_job_ids.contains(id)
                && id != excluding_job_id
                && j.event_context_id.as_ref() == Some(context_id)
        })
    }
}

#[cfg(test)]
#[path = "pruner_tests.rs"]
mod tests;
