// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Two distinct "event" concepts, kept separate:
//!
//! - [`Event`] is the durable write-ahead log entry: every state mutation
//!   the engine makes is first expressed as one of these variants, appended
//!   to the WAL, and folded into `MaterializedState`. This is a WAL-event
//!   pattern retargeted at Ductile's entities.
//! - [`PluginEvent`] is the transient "Event": a value produced by a
//!   plugin response (`type`, `payload`, optional `dedupe_key`). It never
//!   outlives the dispatcher call that produced it; its substance survives
//!   only as child jobs and ledger rows the Router creates from it.

use crate::{ContextRow, Job, JobId, Workspace, WorkspaceId, WorkspaceStatus};
use serde::{Deserialize, Serialize};

/// A durable state-mutation record, folded by `MaterializedState::apply_event`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    JobEnqueued {
        job: Box<Job>,
    },
    JobStarted {
        job_id: JobId,
        started_at_ms: u64,
    },
    JobSucceeded {
        job_id: JobId,
        completed_at_ms: u64,
        result: serde_json::Value,
    },
    JobFailed {
        job_id: JobId,
        completed_at_ms: u64,
        last_error: String,
        stderr: Option<String>,
        stdout: Option<String>,
        terminal: bool,
    },
    JobTimedOut {
        job_id: JobId,
        completed_at_ms: u64,
    },
    JobRetryScheduled {
        job_id: JobId,
        attempt: u32,
        next_retry_at_ms: u64,
        #[serde(default)]
        last_error: Option<String>,
    },
    JobMarkedDead {
        job_id: JobId,
    },
    /// Retention pruner (C14): drop a terminal job row past the
    /// configured retention window.
    JobPruned {
        job_id: JobId,
    },
    /// Retention pruner (C14): collapse a fully-expired context ledger
    /// subtree (every row it roots is older than the retention window and
    /// no live job references it).
    ContextRowPruned {
        id: crate::EventContextId,
    },
    PluginStateUpdated {
        plugin: String,
        state_updates: serde_json::Value,
    },
    ContextRowCreated {
        row: Box<ContextRow>,
    },
    WorkspaceCreated {
        workspace: Box<Workspace>,
    },
    WorkspaceStatusChanged {
        id: WorkspaceId,
        status: WorkspaceStatus,
    },
    WorkspaceReferenced {
        id: WorkspaceId,
        by: JobId,
    },
    WorkspaceRemoved {
        id: WorkspaceId,
    },
    BreakerOpened {
        plugin: String,
        command: String,
        until_ms: u64,
    },
    BreakerClosed {
        plugin: String,
        command: String,
    },
    BreakerHalfOpen {
        plugin: String,
        command: String,
    },
}

/// A transient value produced by a plugin response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub dedupe_key: Option<String>,
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
