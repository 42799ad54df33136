// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job data model.

use crate::{EventContextId, JobId};
use serde::{Deserialize, Serialize};

/// Terminal/non-terminal status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    TimedOut,
    Dead,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::TimedOut | JobStatus::Dead
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::TimedOut => "timed_out",
            JobStatus::Dead => "dead",
        };
        write!(f, "{s}")
    }
}

/// One dispatch of one plugin command, with full lineage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub plugin: String,
    pub command: String,
    pub status: JobStatus,
    pub attempt: u32,
    pub max_attempts: u32,
    /// Serialized event envelope, or empty for externally-triggered jobs.
    #[serde(default)]
    pub payload: serde_json::Value,
    pub parent_job_id: Option<JobId>,
    /// The (job_id, event_index) pair of the event that caused this job,
    /// serialized as `"<job_id>#<index>"` so it is a flat, comparable key
    /// usable directly as a dedup key component.
    pub source_event_id: Option<String>,
    pub event_context_id: Option<EventContextId>,
    pub dedupe_key: Option<String>,
    pub submitted_at_ms: u64,
    pub started_at_ms: Option<u64>,
    pub completed_at_ms: Option<u64>,
    pub next_retry_at_ms: Option<u64>,
    /// Origin tag: `scheduler`, `webhook:<path>`, `api`, `pipeline:<name>:<step>`, ...
    pub submitted_by: String,
    pub last_error: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    /// Whether the last recorded failure is explicitly non-retryable
    /// (plugin returned `retry: false`, or exit code 78).
    #[serde(default)]
    pub retryable: bool,
}

impl Job {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Builds a flat `source_event_id` string from a job id and the index of
/// the emitted event within that job's response.
pub fn source_event_id(job_id: &JobId, event_index: usize) -> String {
    format!("{job_id}#{event_index}")
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
