// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `EngineFacade`: the single trait an HTTP/webhook/CLI front end is
//! written against, and `Engine`, the concrete type that wires every other
//! component together. Follows the `async_trait`-on-a-plain-trait idiom
//! used throughout the adapter layer.

use crate::context_ledger::ContextLedger;
use crate::dispatcher::Dispatcher;
use crate::error::EngineError;
use crate::event_hub::EventHub;
use crate::pruner::Pruner;
use crate::router::Router;
use crate::scheduler::Scheduler;
use crate::store::Store;
use crate::sync_bridge::{SyncBridge, SyncOutcome};
use crate::work_queue::{EnqueueParams, JobFilter, WorkQueue};
use crate::workspace_manager::WorkspaceManager;
use async_trait::async_trait;
use ductile_core::{Clock, CompiledPipeline, EventContextId, ExecutionMode, IdGen, Job, JobId, LifecycleEvent};
use ductile_registry::Registry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Everything an external caller supplies to enqueue a one-off job
/// directly, bypassing pipeline routing.
#[derive(Debug, Clone)]
pub struct EnqueueRequest {
    pub plugin: String,
    pub command: String,
    pub payload: serde_json::Value,
    pub dedupe_key: Option<String>,
    pub max_attempts: Option<u32>,
    pub submitted_by: String,
}

/// What triggering a named pipeline returns: the root job, and — for a
/// `synchronous` pipeline — the aggregated result of waiting on its whole
/// descendant closure.
#[derive(Debug, Clone)]
pub struct PipelineTrigger {
    pub root_job_id: JobId,
    pub sync_result: Option<SyncOutcome>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HealthStatus {
    pub ok: bool,
    pub queued_jobs: usize,
    pub running_jobs: usize,
    pub open_breakers: usize,
}

#[async_trait]
pub trait EngineFacade: Send + Sync {
    async fn enqueue(&self, req: EnqueueRequest) -> Result<JobId, EngineError>;
    async fn trigger_pipeline(&self, name: &str, payload: serde_json::Value) -> Result<PipelineTrigger, EngineError>;
    async fn get_job(&self, id: &JobId) -> Result<Option<Job>, EngineError>;
    async fn list_jobs(&self, filter: JobFilter) -> Result<Vec<Job>, EngineError>;
    async fn healthz(&self) -> HealthStatus;
    fn subscribe_events(&self) -> broadcast::Receiver<LifecycleEvent>;
}

/// Concrete composition root: every C1-C14 component sharing the one
/// `Store`, wired together the way `ductile-daemon::lifecycle` constructs
/// it at startup.
pub struct Engine<G: IdGen, C: Clock> {
    store: Arc<Store>,
    clock: Arc<C>,
    id_gen: G,
    work_queue: Arc<WorkQueue<G, C>>,
    scheduler: Scheduler<G, C>,
    dispatcher: Dispatcher<G, C>,
    router: Router<G, C>,
    sync_bridge: Arc<SyncBridge>,
    event_hub: Arc<EventHub>,
    pruner: Pruner<C>,
    pipelines: Vec<CompiledPipeline>,
}

impl<G: IdGen, C: Clock> Engine<G, C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<Store>,
        clock: Arc<C>,
        id_gen: G,
        registry: Arc<Registry>,
        workspaces: Arc<WorkspaceManager>,
        pipelines: Vec<CompiledPipeline>,
        plugin_configs: std::collections::HashMap<String, serde_json::Value>,
        cfg: &EngineTuning,
    ) -> Self {
        let work_queue = Arc::new(WorkQueue::new(store.clone(), clock.clone(), id_gen.clone(), cfg.dedup_ttl));
        let scheduler = Scheduler::new(
            store.clone(),
            clock.clone(),
            work_queue.clone(),
            cfg.schedule_entries.clone(),
            cfg.breaker_threshold,
            cfg.breaker_cooldown,
            cfg.max_outstanding_polls,
        );
        let dispatcher = Dispatcher::new(
            store.clone(),
            clock.clone(),
            work_queue.clone(),
            registry,
            workspaces.clone(),
            id_gen.clone(),
            plugin_configs,
            cfg.default_command_timeout,
            cfg.sigterm_grace,
            cfg.stdout_cap_bytes,
            cfg.stderr_cap_bytes,
        );
        let router = Router::new(store.clone(), clock.clone(), work_queue.clone(), id_gen.clone(), pipelines.clone());
        let sync_bridge = Arc::new(SyncBridge::new(
            store.clone(),
            cfg.max_concurrent_sync_waits,
            cfg.sync_bridge_max_wait,
            cfg.sync_bridge_absolute_ceiling,
        ));
        let event_hub = Arc::new(EventHub::new(cfg.event_hub_capacity));
        let pruner = Pruner::new(store.clone(), clock.clone(), workspaces, cfg.retention);

        Self {
            store,
            clock,
            id_gen,
            work_queue,
            scheduler,
            dispatcher,
            router,
            sync_bridge,
            event_hub,
            pruner,
            pipelines,
        }
    }

    fn now_ms(&self) -> u64 {
        self.clock.now().timestamp_millis().max(0) as u64
    }

    /// Recover any job left `Running` across a crash, then perform one
    /// scheduler tick — the startup sequence `ductile-daemon::lifecycle`
    /// runs once before accepting requests.
    pub fn recover_and_prime(&self) -> Result<(), EngineError> {
        let recovered = self.work_queue.recover_orphans()?;
        if recovered > 0 {
            tracing::info!(recovered, "recovered orphaned running jobs at startup");
        }
        self.scheduler.tick()?;
        Ok(())
    }

    /// Run one dispatch cycle and route whatever it emits. Callers (the
    /// daemon's main loop) call this in a tight loop, sleeping when it
    /// returns `Ok(None)`.
    pub async fn dispatch_and_route_once(&self) -> Result<bool, EngineError> {
        let Some(outcome) = self.dispatcher.dispatch_once().await? else {
            return Ok(false);
        };

        let lifecycle = match outcome.job.status {
            ductile_core::JobStatus::Succeeded => Some(LifecycleEvent::JobCompleted { job_id: outcome.job.id.clone() }),
            ductile_core::JobStatus::Failed | ductile_core::JobStatus::Dead => {
                Some(LifecycleEvent::JobFailed { job_id: outcome.job.id.clone() })
            }
            ductile_core::JobStatus::TimedOut => Some(LifecycleEvent::JobTimedOut { job_id: outcome.job.id.clone() }),
            _ => None,
        };
        if let Some(event) = lifecycle {
            self.event_hub.publish(event);
        }

        let breaker_event = match outcome.job.status {
            ductile_core::JobStatus::Succeeded => self.scheduler.record_success(&outcome.job.plugin, &outcome.job.command)?,
            ductile_core::JobStatus::Failed | ductile_core::JobStatus::TimedOut | ductile_core::JobStatus::Dead => {
                self.scheduler.record_failure(&outcome.job.plugin, &outcome.job.command)?
            }
            _ => None,
        };
        if let Some(event) = breaker_event {
            self.event_hub.publish(event);
        }

        if !outcome.events.is_empty() {
            self.router.route(&outcome.job, &outcome.events)?;
        }

        if outcome.job.is_terminal() {
            self.sync_bridge.notify_completed();
        }

        Ok(true)
    }

    /// One scheduler tick plus one pruning pass, run together on the same
    /// cadence.
    pub fn tick(&self) -> Result<(), EngineError> {
        for event in self.scheduler.tick()? {
            self.event_hub.publish(event);
        }
        self.pruner.prune()?;
        Ok(())
    }

    /// Snapshot the current state durably and reclaim WAL space, run on
    /// the periodic checkpoint cadence and once more at graceful shutdown.
    pub fn checkpoint(&self) -> Result<(), EngineError> {
        let result = self.store.checkpoint_sync()?;
        self.store.truncate_wal(result.seq)?;
        Ok(())
    }

    fn root_context(&self, pipeline_name: &str, step_id: &str, payload: &serde_json::Value) -> Result<EventContextId, EngineError> {
        let ledger = ContextLedger::new(&self.store);
        let id = EventContextId::new(self.id_gen.next());
        let row = ledger.create_root(id, pipeline_name, step_id, payload.clone(), self.now_ms())?;
        Ok(row.id)
    }
}

#[async_trait]
impl<G: IdGen, C: Clock> EngineFacade for Engine<G, C> {
    async fn enqueue(&self, req: EnqueueRequest) -> Result<JobId, EngineError> {
        let mut params = EnqueueParams::new(req.plugin, req.command, req.submitted_by).with_payload(req.payload);
        if let Some(key) = req.dedupe_key {
            params = params.with_dedupe_key(key);
        }
        if let Some(max_attempts) = req.max_attempts {
            params.max_attempts = max_attempts;
        }
        self.work_queue.enqueue(params)
    }

    async fn trigger_pipeline(&self, name: &str, payload: serde_json::Value) -> Result<PipelineTrigger, EngineError> {
        let pipeline = self
            .pipelines
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| EngineError::PipelineNotFound(name.to_string()))?;
        let first = pipeline
            .first_step()
            .ok_or_else(|| EngineError::PipelineNotFound(format!("{name} has no steps")))?;

        let plugin = match &first.kind {
            ductile_core::StepKind::Uses(plugin) => plugin.clone(),
            _ => {
                return Err(EngineError::Protocol(format!(
                    "pipeline `{name}`'s first step must be a plugin step, found a call/split"
                )))
            }
        };

        let context_id = self.root_context(&pipeline.name, &first.id, &payload)?;

        let mut params = EnqueueParams::new(plugin, "handle", format!("pipeline:{name}:{}", first.id))
            .with_payload(payload);
        params.event_context_id = Some(context_id);
        let root_job_id = self.work_queue.enqueue(params)?;

        let sync_result = if pipeline.execution_mode == ExecutionMode::Synchronous {
            Some(self.sync_bridge.wait_for_tree(root_job_id.clone(), None).await?)
        } else {
            None
        };

        Ok(PipelineTrigger {
            root_job_id,
            sync_result,
        })
    }

    async fn get_job(&self, id: &JobId) -> Result<Option<Job>, EngineError> {
        Ok(self.store.read().get_job(id.as_str()).cloned())
    }

    async fn list_jobs(&self, filter: JobFilter) -> Result<Vec<Job>, EngineError> {
        Ok(self.work_queue.list_jobs(&filter))
    }

    async fn healthz(&self) -> HealthStatus {
        let state = self.store.read();
        let queued_jobs = state.jobs.values().filter(|j| j.status == ductile_core::JobStatus::Queued).count();
        let running_jobs = state.jobs.values().filter(|j| j.status == ductile_core::JobStatus::Running).count();
        let open_breakers = state
            .breakers
            .values()
            .filter(|b| b.status == ductile_storage::BreakerStatus::Open)
            .count();
        HealthStatus {
            ok: true,
            queued_jobs,
            running_jobs,
            open_breakers,
        }
    }

    fn subscribe_events(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.event_hub.subscribe()
    }
}

/// Ambient tuning knobs `Engine::new` needs, distinct from
/// `ductile_core::EngineConfig` only in that schedule entries have already
/// been parsed into [`crate::scheduler::ScheduleEntry`]s.
pub struct EngineTuning {
    pub dedup_ttl: Duration,
    pub retention: Duration,
    pub breaker_threshold: u32,
    pub breaker_cooldown: Duration,
    pub default_command_timeout: Duration,
    pub sigterm_grace: Duration,
    pub stdout_cap_bytes: usize,
    pub stderr_cap_bytes: usize,
    pub sync_bridge_max_wait: Duration,
    pub sync_bridge_absolute_ceiling: Duration,
    pub max_concurrent_sync_waits: usize,
    pub max_outstanding_polls: u32,
    pub event_hub_capacity: usize,
    pub schedule_entries: Vec<crate::scheduler::ScheduleEntry>,
}

#[cfg(test)]
#[path = "facade_tests.rs"]
mod tests;
