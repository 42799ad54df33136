// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dequeue → Prepare → Spawn → Enforce timeout → Decode → Apply →
//! Publish, the engine's single serial consumer loop.
//!
//! Subprocess handling is `tokio::process::Command` + `tokio::time::timeout`,
//! extended with `nix::sys::signal::kill` to escalate SIGTERM to SIGKILL
//! after a grace period instead of an immediate kill-on-drop.

use crate::context_ledger::ContextLedger;
use crate::error::EngineError;
use crate::protocol::{parse_response, RequestEnvelope, ResponseStatus, CONFIG_ERROR_EXIT_CODE};
use crate::store::Store;
use crate::work_queue::{Completion, WorkQueue};
use crate::workspace_manager::WorkspaceManager;
use chrono::Duration as ChronoDuration;
use ductile_core::{Clock, Event, EventContextId, IdGen, Job, PluginEvent, MAX_BAGGAGE_BYTES};
use ductile_registry::Registry;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// What a dispatched job produced, for the Router to consume.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub job: Job,
    pub events: Vec<PluginEvent>,
    pub event_context_id: Option<EventContextId>,
}

pub struct Dispatcher<G: IdGen, C: Clock> {
    store: Arc<Store>,
    clock: Arc<C>,
    work_queue: Arc<WorkQueue<G, C>>,
    registry: Arc<Registry>,
    workspaces: Arc<WorkspaceManager>,
    id_gen: G,
    plugin_configs: HashMap<String, serde_json::Value>,
    default_timeout: Duration,
    sigterm_grace: Duration,
    stdout_cap_bytes: usize,
    stderr_cap_bytes: usize,
}

impl<G: IdGen, C: Clock> Dispatcher<G, C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<Store>,
        clock: Arc<C>,
        work_queue: Arc<WorkQueue<G, C>>,
        registry: Arc<Registry>,
        workspaces: Arc<WorkspaceManager>,
        id_gen: G,
        plugin_configs: HashMap<String, serde_json::Value>,
        default_timeout: Duration,
        sigterm_grace: Duration,
        stdout_cap_bytes: usize,
        stderr_cap_bytes: usize,
    ) -> Self {
        Self {
            store,
            clock,
            work_queue,
            registry,
            workspaces,
            id_gen,
            plugin_configs,
            default_timeout,
            sigterm_grace,
            stdout_cap_bytes,
            stderr_cap_bytes,
        }
    }

    fn now_ms(&self) -> u64 {
        self.clock.now().timestamp_millis().max(0) as u64
    }

    /// Run one dispatch cycle: dequeue the next eligible job, run it to
    /// completion, and return what it produced. `Ok(None)` means the queue
    /// was empty.
    pub async fn dispatch_once(&self) -> Result<Option<DispatchOutcome>, EngineError> {
        let Some(job) = self.work_queue.dequeue()? else {
            return Ok(None);
        };

        // Once a job is dequeued it is `Running`; any failure from here on
        // must route back through `complete` rather than bubble up,
        // otherwise the job is stranded `Running` forever.
        let plugin = match self.registry.get(&job.plugin).cloned() {
            Some(p) => p,
            None => return Ok(Some(self.fail_prepare(&job, format!("unknown plugin `{}`", job.plugin), false)?)),
        };

        let workspace_dir = match &job.parent_job_id {
            Some(parent_id) => self.workspaces.clone_from(parent_id, &job.id),
            None => self.workspaces.create(&job.id),
        };
        let workspace_dir = match workspace_dir {
            Ok(p) => p,
            Err(e) => return Ok(Some(self.fail_prepare(&job, e.to_string(), true)?)),
        };

        let event_context_id = match self.ensure_context(&job) {
            Ok(id) => id,
            Err(e) => return Ok(Some(self.fail_prepare(&job, e.to_string(), true)?)),
        };

        let config = self.plugin_configs.get(&job.plugin).cloned().unwrap_or(serde_json::json!({}));
        let state = self.store.read().plugin_state.get(&job.plugin).cloned().unwrap_or(serde_json::json!({}));
        let context = event_context_id
            .as_ref()
            .and_then(|id| self.store.read().context_rows.get(id.as_str()).cloned())
            .map(|row| row.accumulated_json)
            .unwrap_or(serde_json::json!({}));
        let event: Option<PluginEvent> = serde_json::from_value(job.payload.clone()).ok();

        let timeout = self.default_timeout;
        let deadline_at = self.clock.now() + ChronoDuration::from_std(timeout).unwrap_or(ChronoDuration::seconds(300));

        let request = RequestEnvelope::new(
            job.id.clone(),
            job.command.clone(),
            config,
            state,
            event,
            workspace_dir,
            context,
            deadline_at,
        );
        let body = serde_json::to_vec(&request).map_err(|e| EngineError::Protocol(e.to_string()))?;

        let mut cmd = Command::new(plugin.entrypoint_path());
        cmd.arg(&job.command);
        cmd.current_dir(&plugin.root_dir);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let spawned = run_to_completion(cmd, &body, timeout, self.sigterm_grace).await;

        let outcome = match spawned {
            Ok(RunResult::Completed { stdout, stderr, exit_code }) => {
                self.apply_response(&job, event_context_id.clone(), &stdout, &stderr, exit_code)?
            }
            Ok(RunResult::TimedOut) => {
                self.work_queue.complete(&job.id, Completion::TimedOut)?;
                DispatchOutcome {
                    job: self.reloaded(&job)?,
                    events: Vec::new(),
                    event_context_id,
                }
            }
            Err(io_err) => {
                self.work_queue.complete(
                    &job.id,
                    Completion::Failure {
                        error: io_err,
                        stdout: None,
                        stderr: None,
                        retryable: true,
                    },
                )?;
                DispatchOutcome {
                    job: self.reloaded(&job)?,
                    events: Vec::new(),
                    event_context_id,
                }
            }
        };

        Ok(Some(outcome))
    }

    /// Fail a job during Prepare (before any subprocess is spawned), before
    /// it can ever be stranded `Running`.
    fn fail_prepare(&self, job: &Job, error: String, retryable: bool) -> Result<DispatchOutcome, EngineError> {
        self.work_queue.complete(
            &job.id,
            Completion::Failure {
                error,
                stdout: None,
                stderr: None,
                retryable,
            },
        )?;
        Ok(DispatchOutcome {
            job: self.reloaded(job)?,
            events: Vec::new(),
            event_context_id: None,
        })
    }

    fn reloaded(&self, job: &Job) -> Result<Job, EngineError> {
        self.store
            .read()
            .get_job(job.id.as_str())
            .cloned()
            .ok_or_else(|| EngineError::JobNotFound(job.id.to_string()))
    }

    /// Ensure this job has a context row: roots are seeded from the job's
    /// own submitted payload (or extended from the parent job's context row
    /// when this job was cloned from a parent), jobs chained from a parent
    /// event get `Extend`.
    fn ensure_context(&self, job: &Job) -> Result<Option<EventContextId>, EngineError> {
        if let Some(id) = &job.event_context_id {
            return Ok(Some(id.clone()));
        }
        let ledger = ContextLedger::new(&self.store);
        let now_ms = self.now_ms();
        let id = EventContextId::new(self.id_gen.next());

        if let Some(parent_job_id) = &job.parent_job_id {
            let parent_context_id = self.store.read().get_job(parent_job_id.as_str()).and_then(|j| j.event_context_id.clone());
            if let Some(parent_context_id) = parent_context_id {
                let row = ledger.extend(id, &parent_context_id, &job.plugin, &job.command, &job.payload, now_ms)?;
                return Ok(Some(row.id));
            }
        }

        let row = ledger.create_root(id, &job.plugin, &job.command, job.payload.clone(), now_ms)?;
        Ok(Some(row.id))
    }

    fn apply_response(
        &self,
        job: &Job,
        event_context_id: Option<EventContextId>,
        stdout: &[u8],
        stderr: &[u8],
        exit_code: Option<i32>,
    ) -> Result<DispatchOutcome, EngineError> {
        let stdout_capped = cap_bytes(stdout, self.stdout_cap_bytes);
        let stderr_capped = cap_bytes(stderr, self.stderr_cap_bytes);

        let response = match parse_response(stdout) {
            Ok(r) => r,
            Err(e) => {
                self.work_queue.complete(
                    &job.id,
                    Completion::Failure {
                        error: e.to_string(),
                        stdout: Some(stdout_capped),
                        stderr: Some(stderr_capped),
                        retryable: false,
                    },
                )?;
                return Ok(DispatchOutcome {
                    job: self.reloaded(job)?,
                    events: Vec::new(),
                    event_context_id,
                });
            }
        };

        match response.status {
            ResponseStatus::Ok => {
                if !response.state_updates.is_null() {
                    self.apply_plugin_state(&job.plugin, &response.state_updates)?;
                }
                self.work_queue.complete(
                    &job.id,
                    Completion::Success {
                        result: serde_json::json!({
                            "state_updates": response.state_updates,
                            "events": response.events,
                        }),
                    },
                )?;
                Ok(DispatchOutcome {
                    job: self.reloaded(job)?,
                    events: response.events,
                    event_context_id,
                })
            }
            ResponseStatus::Error => {
                let retryable = response.retry && exit_code != Some(CONFIG_ERROR_EXIT_CODE);
                self.work_queue.complete(
                    &job.id,
                    Completion::Failure {
                        error: response.error.unwrap_or_else(|| "plugin reported an error".to_string()),
                        stdout: Some(stdout_capped),
                        stderr: Some(stderr_capped),
                        retryable,
                    },
                )?;
                Ok(DispatchOutcome {
                    job: self.reloaded(job)?,
                    events: Vec::new(),
                    event_context_id,
                })
            }
        }
    }

    /// Shallow-merge `updates` into the plugin's persisted state, refusing
    /// (and logging) a merge that would exceed the baggage-sized cap.
    fn apply_plugin_state(&self, plugin: &str, updates: &serde_json::Value) -> Result<(), EngineError> {
        let current = self.store.read().plugin_state.get(plugin).cloned().unwrap_or(serde_json::json!({}));
        let merged = ductile_core::merge_baggage(&current, updates);
        let size = serde_json::to_vec(&merged).map(|b| b.len()).unwrap_or(usize::MAX);
        if size > MAX_BAGGAGE_BYTES {
            tracing::warn!(plugin, size, "dropping plugin state update that would exceed the state size cap");
            return Ok(());
        }
        self.store.apply(Event::PluginStateUpdated {
            plugin: plugin.to_string(),
            state_updates: updates.clone(),
        })?;
        Ok(())
    }
}

fn cap_bytes(data: &[u8], cap: usize) -> String {
    let truncated = &data[..data.len().min(cap)];
    String::from_utf8_lossy(truncated).into_owned()
}

enum RunResult {
    Completed {
        stdout: Vec<u8>,
        stderr: Vec<u8>,
        exit_code: Option<i32>,
    },
    TimedOut,
}

/// Spawn `cmd`, write `stdin_body` then close stdin, and wait up to
/// `timeout`. On timeout, send SIGTERM, wait `sigterm_grace`, then SIGKILL.
async fn run_to_completion(
    mut cmd: Command,
    stdin_body: &[u8],
    timeout: Duration,
    sigterm_grace: Duration,
) -> Result<RunResult, String> {
    let mut child = cmd.spawn().map_err(|e| format!("failed to spawn plugin: {e}"))?;
    if let Some(mut stdin) = child.stdin.take() {
        if let Err(e) = stdin.write_all(stdin_body).await {
            return Err(format!("failed to write request to plugin stdin: {e}"));
        }
    }

    let pid = child.id();
    let output_fut = child.wait_with_output();
    tokio::pin!(output_fut);

    match tokio::time::timeout(timeout, &mut output_fut).await {
        Ok(Ok(output)) => Ok(RunResult::Completed {
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code: output.status.code(),
        }),
        Ok(Err(e)) => Err(format!("plugin process error: {e}")),
        Err(_elapsed) => {
            if let Some(pid) = pid {
                let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
            }
            match tokio::time::timeout(sigterm_grace, &mut output_fut).await {
                Ok(_) => {}
                Err(_) => {
                    if let Some(pid) = pid {
                        let _ = kill(Pid::from_raw(pid as i32), Signal::SIGKILL);
                    }
                    let _ = output_fut.await;
                }
            }
            Ok(RunResult::TimedOut)
        }
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
