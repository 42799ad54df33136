// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle events published to the Event Hub after every dispatch cycle,
//! and exposed to callers through `EngineFacade::subscribe_events`.

use crate::JobId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum LifecycleEvent {
    #[serde(rename = "job.started")]
    JobStarted { job_id: JobId },
    #[serde(rename = "job.completed")]
    JobCompleted { job_id: JobId },
    #[serde(rename = "job.failed")]
    JobFailed { job_id: JobId },
    #[serde(rename = "job.timed_out")]
    JobTimedOut { job_id: JobId },
    #[serde(rename = "plugin.spawned")]
    PluginSpawned { job_id: JobId, plugin: String },
    #[serde(rename = "poll.throttled")]
    PollThrottled { plugin: String, command: String },
    #[serde(rename = "breaker.opened")]
    BreakerOpened { plugin: String, command: String },
    #[serde(rename = "breaker.closed")]
    BreakerClosed { plugin: String, command: String },
    #[serde(rename = "breaker.half_open")]
    BreakerHalfOpen { plugin: String, command: String },
}

impl LifecycleEvent {
    /// The `event:` field name as it would appear in an SSE frame.
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::JobStarted { .. } => "job.started",
            LifecycleEvent::JobCompleted { .. } => "job.completed",
            LifecycleEvent::JobFailed { .. } => "job.failed",
            LifecycleEvent::JobTimedOut { .. } => "job.timed_out",
            LifecycleEvent::PluginSpawned { .. } => "plugin.spawned",
            LifecycleEvent::PollThrottled { .. } => "poll.throttled",
            LifecycleEvent::BreakerOpened { .. } => "breaker.opened",
            LifecycleEvent::BreakerClosed { .. } => "breaker.closed",
            LifecycleEvent::BreakerHalfOpen { .. } => "breaker.half_open",
        }
    }
}

#[cfg(test)]
#[path = "lifecycle_event_tests.rs"]
mod tests;
