// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event-to-pipeline-step matching and child-job fan-out, built the way a
//! decision builder assembles a list of effects from one completed step,
//! generalized from "advance one runbook" to "fan a job's emitted events
//! out across every matching pipeline step."
//!
//! Workspace cloning for a child job is *not* done here: the Dispatcher
//! already clones a job's workspace from `parent_job_id` at Prepare time,
//! so setting `parent_job_id` on the enqueued child is sufficient —
//! duplicating the hardlink walk here would just race the dispatcher's
//! own clone for no benefit.

use crate::context_ledger::ContextLedger;
use crate::error::EngineError;
use crate::store::Store;
use crate::work_queue::{EnqueueParams, WorkQueue};
use ductile_core::{
    source_event_id, Clock, CompiledPipeline, CompiledStep, EventContextId, IdGen, Job, JobId, PluginEvent, StepKind,
};
use std::sync::Arc;

pub struct Router<G: IdGen, C: Clock> {
    store: Arc<Store>,
    clock: Arc<C>,
    work_queue: Arc<WorkQueue<G, C>>,
    id_gen: G,
    pipelines: Vec<CompiledPipeline>,
}

impl<G: IdGen, C: Clock> Router<G, C> {
    pub fn new(
        store: Arc<Store>,
        clock: Arc<C>,
        work_queue: Arc<WorkQueue<G, C>>,
        id_gen: G,
        pipelines: Vec<CompiledPipeline>,
    ) -> Self {
        Self {
            store,
            clock,
            work_queue,
            id_gen,
            pipelines,
        }
    }

    fn now_ms(&self) -> u64 {
        self.clock.now().timestamp_millis().max(0) as u64
    }

    /// Route every event a completed job J emitted to the pipeline steps it
    /// matches, returning every child job id created or reused. Idempotent
    /// on `(source_event_id, next step)`: calling this twice for the same J
    /// and events never double-enqueues.
    pub fn route(&self, job: &Job, events: &[PluginEvent]) -> Result<Vec<JobId>, EngineError> {
        let mut children = Vec::new();
        for (index, event) in events.iter().enumerate() {
            let source_id = source_event_id(&job.id, index);
            for (pipeline, step) in self.matches_for(job, &event.event_type) {
                children.extend(self.enqueue_step(pipeline, step, job, event, &source_id)?);
            }
        }
        Ok(children)
    }

    /// Pairs of (pipeline, next step) a given emitted event type matches:
    /// pipelines triggered fresh by this event type (entering at their
    /// first step), plus the step immediately after J's own step when J was
    /// dispatched as an explicit pipeline step that declares this event
    /// type in `on_events`.
    fn matches_for<'p>(&'p self, job: &Job, event_type: &str) -> Vec<(&'p CompiledPipeline, &'p CompiledStep)> {
        let mut matches = Vec::new();
        for pipeline in &self.pipelines {
            if pipeline.trigger_event_type == event_type {
                if let Some(first) = pipeline.first_step() {
                    matches.push((pipeline, first));
                }
            }
        }

        if let Some((pipeline_name, step_id)) = parse_pipeline_step(&job.submitted_by) {
            if let Some(pipeline) = self.pipelines.iter().find(|p| p.name == pipeline_name) {
                if let Some(step) = pipeline.get_step(step_id) {
                    if step.on_events.iter().any(|e| e == event_type) {
                        if let Some(next) = pipeline.step_after(step_id) {
                            matches.push((pipeline, next));
                        }
                    }
                }
            }
        }
        matches
    }

    /// Enqueue whatever a matched step implies: one child job for `uses`,
    /// a recursive descent into the called pipeline's first step for
    /// `call`, or every sibling of a `split` independently — no implicit
    /// join; an operator-declared aggregator step is the only way to wait
    /// on all siblings.
    fn enqueue_step(
        &self,
        pipeline: &CompiledPipeline,
        step: &CompiledStep,
        job: &Job,
        event: &PluginEvent,
        source_id: &str,
    ) -> Result<Vec<JobId>, EngineError> {
        match &step.kind {
            StepKind::Uses(plugin) => Ok(self
                .enqueue_child(pipeline, step, plugin, job, event, source_id)?
                .into_iter()
                .collect()),
            StepKind::Call(called_name) => {
                let called = self
                    .pipelines
                    .iter()
                    .find(|p| &p.name == called_name)
                    .ok_or_else(|| EngineError::PipelineNotFound(called_name.clone()))?;
                match called.first_step() {
                    Some(entry) => self.enqueue_step(called, entry, job, event, source_id),
                    None => Ok(Vec::new()),
                }
            }
            StepKind::Split(siblings) => {
                let mut ids = Vec::new();
                for sibling in siblings {
                    ids.extend(self.enqueue_step(pipeline, sibling, job, event, source_id)?);
                }
                Ok(ids)
            }
        }
    }

    fn enqueue_child(
        &self,
        pipeline: &CompiledPipeline,
        step: &CompiledStep,
        plugin: &str,
        job: &Job,
        event: &PluginEvent,
        source_id: &str,
    ) -> Result<Option<JobId>, EngineError> {
        let dedupe_key = format!("route:{source_id}:{}", step.id);
        if let Some(existing) = self.already_routed(&dedupe_key) {
            return Ok(Some(existing));
        }

        let Some(parent_context_id) = job.event_context_id.clone() else {
            tracing::warn!(job_id = %job.id, "cannot route an event from a job with no context");
            return Ok(None);
        };

        let ledger = ContextLedger::new(&self.store);
        let row = ledger.extend(
            EventContextId::new(self.id_gen.next()),
            &parent_context_id,
            &pipeline.name,
            &step.id,
            &event.payload,
            self.now_ms(),
        )?;

        let mut params = EnqueueParams::new(plugin, "handle", format!("pipeline:{}:{}", pipeline.name, step.id))
            .with_dedupe_key(dedupe_key)
            .with_payload(serde_json::to_value(event).unwrap_or(serde_json::json!({})));
        params.parent_job_id = Some(job.id.clone());
        params.source_event_id = Some(source_id.to_string());
        params.event_context_id = Some(row.id);

        Ok(Some(self.work_queue.enqueue(params)?))
    }

    /// A child already routed for this `(source_event_id, step)` pair,
    /// regardless of its current status — unlike the Work Queue's own
    /// dedup, this check has no TTL: a `source_event_id` routes at most
    /// once for the lifetime of the store, not just within a window.
    fn already_routed(&self, dedupe_key: &str) -> Option<JobId> {
        self.store
            .read()
            .jobs
            .values()
            .find(|j| j.dedupe_key.as_deref() == Some(dedupe_key))
            .map(|j| j.id.clone())
    }
}

fn parse_pipeline_step(submitted_by: &str) -> Option<(&str, &str)> {
    submitted_by.strip_prefix("pipeline:")?.rsplit_once(':')
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
