// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state from WAL replay.

use ductile_core::{ContextRow, Event, Job, JobStatus, Workspace, WorkspaceStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Breaker status for one (plugin, command) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerStatus {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerRecord {
    pub status: BreakerStatus,
    pub until_ms: Option<u64>,
}

impl Default for BreakerRecord {
    fn default() -> Self {
        Self {
            status: BreakerStatus::Closed,
            until_ms: None,
        }
    }
}

/// Materialized state built from WAL replay.
///
/// Every public field is derived entirely from folding [`Event`]s in
/// sequence order; nothing here is mutated outside `apply_event`.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MaterializedState {
    pub jobs: HashMap<String, Job>,
    #[serde(default)]
    pub plugin_state: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub context_rows: HashMap<String, ContextRow>,
    #[serde(default)]
    pub workspaces: HashMap<String, Workspace>,
    /// Keyed by `"<plugin>:<command>"`.
    #[serde(default)]
    pub breakers: HashMap<String, BreakerRecord>,
}

fn breaker_key(plugin: &str, command: &str) -> String {
    format!("{plugin}:{command}")
}

impl MaterializedState {
    /// Get a job by id or unique prefix (like git commit hashes).
    pub fn get_job(&self, id: &str) -> Option<&Job> {
        if let Some(job) = self.jobs.get(id) {
            return Some(job);
        }
        let matches: Vec<_> = self.jobs.iter().filter(|(k, _)| k.starts_with(id)).collect();
        if matches.len() == 1 {
            Some(matches[0].1)
        } else {
            None
        }
    }

    pub fn breaker(&self, plugin: &str, command: &str) -> BreakerRecord {
        self.breakers
            .get(&breaker_key(plugin, command))
            .cloned()
            .unwrap_or_default()
    }

    /// Jobs currently queued or running for a given dedupe key, used by the
    /// Work Queue's dedup-within-TTL check.
    pub fn jobs_with_dedupe_key(&self, key: &str) -> Vec<&Job> {
        self.jobs
            .values()
            .filter(|j| j.dedupe_key.as_deref() == Some(key))
            .collect()
    }

    /// Apply an event to derive state changes.
    ///
    /// All handlers must be idempotent: replaying the same event twice must
    /// produce the same state as once. Guard inserts with existence checks
    /// and prefer assignment over accumulation.
    pub fn apply_event(&mut self, event: &Event) {
        match event {
            Event::JobEnqueued { job } => {
                self.jobs.entry(job.id.as_str().to_string()).or_insert_with(|| (**job).clone());
            }

            Event::JobStarted { job_id, started_at_ms } => {
                if let Some(job) = self.jobs.get_mut(job_id.as_str()) {
                    job.status = JobStatus::Running;
                    job.started_at_ms = Some(*started_at_ms);
                }
            }

            Event::JobSucceeded {
                job_id,
                completed_at_ms,
                result,
            } => {
                if let Some(job) = self.jobs.get_mut(job_id.as_str()) {
                    job.status = JobStatus::Succeeded;
                    job.completed_at_ms = Some(*completed_at_ms);
                    job.result = Some(result.clone());
                    job.last_error = None;
                }
            }

            Event::JobFailed {
                job_id,
                completed_at_ms,
                last_error,
                stderr,
                stdout,
                terminal,
            } => {
                if let Some(job) = self.jobs.get_mut(job_id.as_str()) {
                    job.status = if *terminal { JobStatus::Dead } else { JobStatus::Failed };
                    job.completed_at_ms = Some(*completed_at_ms);
                    job.last_error = Some(last_error.clone());
                    job.stderr.clone_from(stderr);
                    job.stdout.clone_from(stdout);
                    job.retryable = !*terminal;
                }
            }

            Event::JobTimedOut { job_id, completed_at_ms } => {
                if let Some(job) = self.jobs.get_mut(job_id.as_str()) {
                    job.status = JobStatus::TimedOut;
                    job.completed_at_ms = Some(*completed_at_ms);
                    job.last_error = Some("command timed out".to_string());
                }
            }

            Event::JobRetryScheduled {
                job_id,
                attempt,
                next_retry_at_ms,
                last_error,
            } => {
                if let Some(job) = self.jobs.get_mut(job_id.as_str()) {
                    job.status = JobStatus::Queued;
                    job.attempt = *attempt;
                    job.next_retry_at_ms = Some(*next_retry_at_ms);
                    if last_error.is_some() {
                        job.last_error.clone_from(last_error);
                    }
                }
            }

            Event::JobMarkedDead { job_id } => {
                if let Some(job) = self.jobs.get_mut(job_id.as_str()) {
                    job.status = JobStatus::Dead;
                }
            }

            Event::JobPruned { job_id } => {
                self.jobs.remove(job_id.as_str());
            }

            Event::ContextRowPruned { id } => {
                self.context_rows.remove(id.as_str());
            }

            Event::PluginStateUpdated { plugin, state_updates } => {
                let entry = self
                    .plugin_state
                    .entry(plugin.clone())
                    .or_insert_with(|| serde_json::json!({}));
                if let (Some(base), Some(incoming)) = (entry.as_object_mut(), state_updates.as_object()) {
                    for (k, v) in incoming {
                        base.insert(k.clone(), v.clone());
                    }
                }
            }

            Event::ContextRowCreated { row } => {
                self.context_rows.entry(row.id.as_str().to_string()).or_insert_with(|| (**row).clone());
            }

            Event::WorkspaceCreated { workspace } => {
                self.workspaces
                    .entry(workspace.id.as_str().to_string())
                    .or_insert_with(|| (**workspace).clone());
            }

            Event::WorkspaceStatusChanged { id, status } => {
                if let Some(ws) = self.workspaces.get_mut(id.as_str()) {
                    ws.status = status.clone();
                }
            }

            Event::WorkspaceReferenced { id, by } => {
                if let Some(ws) = self.workspaces.get_mut(id.as_str()) {
                    if !ws.referenced_by.contains(by) {
                        ws.referenced_by.push(by.clone());
                    }
                }
            }

            Event::WorkspaceRemoved { id } => {
                self.workspaces.remove(id.as_str());
            }

            Event::BreakerOpened { plugin, command, until_ms } => {
                self.breakers.insert(
                    breaker_key(plugin, command),
                    BreakerRecord {
                        status: BreakerStatus::Open,
                        until_ms: Some(*until_ms),
                    },
                );
            }

            Event::BreakerClosed { plugin, command } => {
                self.breakers.insert(
                    breaker_key(plugin, command),
                    BreakerRecord {
                        status: BreakerStatus::Closed,
                        until_ms: None,
                    },
                );
            }

            Event::BreakerHalfOpen { plugin, command } => {
                if let Some(record) = self.breakers.get_mut(&breaker_key(plugin, command)) {
                    record.status = BreakerStatus::HalfOpen;
                } else {
                    self.breakers.insert(
                        breaker_key(plugin, command),
                        BreakerRecord {
                            status: BreakerStatus::HalfOpen,
                            until_ms: None,
                        },
                    );
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
