// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Enqueue/Dequeue/Complete/RecoverOrphans/ListJobs, each a transaction
//! against the Durable Store: append an `Event`, fold it into
//! `MaterializedState`, flush the WAL before returning — an
//! event-append-then-fold pattern specialized to job lifecycle events.

use crate::error::EngineError;
use crate::store::Store;
use ductile_core::{Clock, Event, EventContextId, IdGen, Job, JobId, JobStatus};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

/// Base for exponential retry backoff: `base · 2^(attempt-1) + jitter`.
const RETRY_BASE_MS: i64 = 1_000;
const RETRY_MAX_JITTER_MS: i64 = 1_000;

#[derive(Debug, Clone)]
pub struct EnqueueParams {
    pub plugin: String,
    pub command: String,
    pub payload: serde_json::Value,
    pub parent_job_id: Option<JobId>,
    pub source_event_id: Option<String>,
    pub event_context_id: Option<EventContextId>,
    pub dedupe_key: Option<String>,
    pub max_attempts: u32,
    pub submitted_by: String,
}

impl EnqueueParams {
    pub fn new(plugin: impl Into<String>, command: impl Into<String>, submitted_by: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            command: command.into(),
            payload: serde_json::json!({}),
            parent_job_id: None,
            source_event_id: None,
            event_context_id: None,
            dedupe_key: None,
            max_attempts: 3,
            submitted_by: submitted_by.into(),
        }
    }

    pub fn with_dedupe_key(mut self, key: impl Into<String>) -> Self {
        self.dedupe_key = Some(key.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

#[derive(Debug, Clone)]
pub enum Completion {
    Success {
        result: serde_json::Value,
    },
    Failure {
        error: String,
        stdout: Option<String>,
        stderr: Option<String>,
        retryable: bool,
    },
    TimedOut,
}

#[derive(Debug, Default, Clone)]
pub struct JobFilter {
    pub plugin: Option<String>,
    pub command: Option<String>,
    pub status: Option<JobStatus>,
}

impl JobFilter {
    fn matches(&self, job: &Job) -> bool {
        self.plugin.as_deref().is_none_or(|p| p == job.plugin)
            && self.command.as_deref().is_none_or(|c| c == job.command)
            && self.status.is_none_or(|s| s == job.status)
    }
}

pub struct WorkQueue<G: IdGen, C: Clock> {
    store: Arc<Store>,
    clock: Arc<C>,
    id_gen: G,
    dedup_ttl: Duration,
}

impl<G: IdGen, C: Clock> WorkQueue<G, C> {
    pub fn new(store: Arc<Store>, clock: Arc<C>, id_gen: G, dedup_ttl: Duration) -> Self {
        Self {
            store,
            clock,
            id_gen,
            dedup_ttl,
        }
    }

    fn now_ms(&self) -> u64 {
        self.clock.now().timestamp_millis().max(0) as u64
    }

    /// Enqueue: if `dedupe_key` matches a row that succeeded within the
    /// dedup TTL, or a row that is still queued/running, return that
    /// existing job's id instead of enqueueing a duplicate.
    pub fn enqueue(&self, params: EnqueueParams) -> Result<JobId, EngineError> {
        let now_ms = self.now_ms();

        if let Some(key) = &params.dedupe_key {
            let state = self.store.read();
            for job in state.jobs_with_dedupe_key(key) {
                match job.status {
                    JobStatus::Queued | JobStatus::Running => return Ok(job.id.clone()),
                    JobStatus::Succeeded => {
                        if let Some(completed_at) = job.completed_at_ms {
                            let age_ms = now_ms.saturating_sub(completed_at);
                            if age_ms <= self.dedup_ttl.as_millis() as u64 {
                                return Ok(job.id.clone());
                            }
                        }
                    }
                    JobStatus::Failed | JobStatus::TimedOut | JobStatus::Dead => {}
                }
            }
        }

        let id = JobId::new(self.id_gen.next());
        let job = Job {
            id: id.clone(),
            plugin: params.plugin,
            command: params.command,
            status: JobStatus::Queued,
            attempt: 1,
            max_attempts: params.max_attempts,
            payload: params.payload,
            parent_job_id: params.parent_job_id,
            source_event_id: params.source_event_id,
            event_context_id: params.event_context_id,
            dedupe_key: params.dedupe_key,
            submitted_at_ms: now_ms,
            started_at_ms: None,
            completed_at_ms: None,
            next_retry_at_ms: None,
            submitted_by: params.submitted_by,
            last_error: None,
            stderr: None,
            stdout: None,
            result: None,
            retryable: true,
        };
        self.store.apply(Event::JobEnqueued { job: Box::new(job) })?;
        Ok(id)
    }

    /// Dequeue: the oldest queued row (by `submitted_at_ms`) whose
    /// `next_retry_at_ms` (if any) has elapsed. Atomically transitions it
    /// to `Running` so no two dispatcher loops can pick the same job.
    pub fn dequeue(&self) -> Result<Option<Job>, EngineError> {
        let now_ms = self.now_ms();
        let candidate = {
            let state = self.store.read();
            let mut eligible: Vec<&Job> = state
                .jobs
                .values()
                .filter(|j| j.status == JobStatus::Queued)
                .filter(|j| j.next_retry_at_ms.is_none_or(|t| t <= now_ms))
                .collect();
            eligible.sort_by_key(|j| j.submitted_at_ms);
            eligible.first().map(|j| j.id.clone())
        };

        let Some(job_id) = candidate else {
            return Ok(None);
        };

        self.store.apply(Event::JobStarted {
            job_id: job_id.clone(),
            started_at_ms: now_ms,
        })?;

        Ok(self.store.read().get_job(job_id.as_str()).cloned())
    }

    /// Complete: stamp a terminal outcome, or — when attempts remain and
    /// the failure is retryable — schedule an exponential-backoff retry.
    pub fn complete(&self, job_id: &JobId, completion: Completion) -> Result<(), EngineError> {
        let now_ms = self.now_ms();
        match completion {
            Completion::Success { result } => {
                self.store.apply(Event::JobSucceeded {
                    job_id: job_id.clone(),
                    completed_at_ms: now_ms,
                    result,
                })?;
            }
            Completion::TimedOut => {
                self.store.apply(Event::JobTimedOut {
                    job_id: job_id.clone(),
                    completed_at_ms: now_ms,
                })?;
            }
            Completion::Failure {
                error,
                stdout,
                stderr,
                retryable,
            } => {
                let (attempt, max_attempts) = {
                    let state = self.store.read();
                    let job = state
                        .get_job(job_id.as_str())
                        .ok_or_else(|| EngineError::JobNotFound(job_id.to_string()))?;
                    (job.attempt, job.max_attempts)
                };

                let can_retry = retryable && attempt < max_attempts;
                if can_retry {
                    let next_attempt = attempt + 1;
                    let backoff = RETRY_BASE_MS.saturating_mul(1i64 << (attempt.saturating_sub(1)));
                    let jitter = jitter_ms(job_id.as_str(), attempt);
                    let next_retry_at_ms = now_ms.saturating_add(backoff.max(0) as u64).saturating_add(jitter);
                    self.store.apply(Event::JobRetryScheduled {
                        job_id: job_id.clone(),
                        attempt: next_attempt,
                        next_retry_at_ms,
                        last_error: Some(error),
                    })?;
                } else {
                    // Attempts exhausted goes to Dead; an explicit
                    // non-retryable failure on a single attempt goes to
                    // the (also terminal) Failed status instead.
                    let terminal = attempt >= max_attempts;
                    self.store.apply(Event::JobFailed {
                        job_id: job_id.clone(),
                        completed_at_ms: now_ms,
                        last_error: error,
                        stderr,
                        stdout,
                        terminal,
                    })?;
                }
            }
        }
        Ok(())
    }

    /// RecoverOrphans: any row left `Running` across a restart was
    /// interrupted mid-dispatch. Re-queue it with an incremented attempt,
    /// or mark it dead if attempts are exhausted — crash recovery never
    /// loses or duplicates terminal state.
    pub fn recover_orphans(&self) -> Result<usize, EngineError> {
        let now_ms = self.now_ms();
        let orphans: Vec<Job> = self
            .store
            .read()
            .jobs
            .values()
            .filter(|j| j.status == JobStatus::Running)
            .cloned()
            .collect();

        for job in &orphans {
            tracing::warn!(job_id = %job.id, attempt = job.attempt, "recovering orphaned running job");
            if job.attempt < job.max_attempts {
                self.store.apply(Event::JobRetryScheduled {
                    job_id: job.id.clone(),
                    attempt: job.attempt + 1,
                    next_retry_at_ms: now_ms,
                    last_error: Some("recovered after restart with job still running".to_string()),
                })?;
            } else {
                self.store.apply(Event::JobMarkedDead { job_id: job.id.clone() })?;
            }
        }
        Ok(orphans.len())
    }

    pub fn list_jobs(&self, filter: &JobFilter) -> Vec<Job> {
        self.store
            .read()
            .jobs
            .values()
            .filter(|j| filter.matches(j))
            .cloned()
            .collect()
    }
}

/// Deterministic pseudo-random jitter in `[0, RETRY_MAX_JITTER_MS)`, keyed
/// on the job id and attempt number so retries of the same job don't all
/// land on the same millisecond without pulling in a `rand` dependency.
fn jitter_ms(job_id: &str, attempt: u32) -> u64 {
    let mut hasher = DefaultHasher::new();
    job_id.hash(&mut hasher);
    attempt.hash(&mut hasher);
    hasher.finish() % (RETRY_MAX_JITTER_MS as u64)
}

#[cfg(test)]
#[path = "work_queue_tests.rs"]
mod tests;
