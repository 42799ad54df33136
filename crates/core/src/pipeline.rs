// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Compiled pipeline DAG data model. Parsing YAML into this shape lives
//! in `ductile-pipeline`; this crate only holds the shared,
//! already-validated result that the engine's Router walks.

use crate::PipelineId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Async,
    Synchronous,
}

impl Default for ExecutionMode {
    fn default() -> Self {
        ExecutionMode::Async
    }
}

/// What a compiled step does.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StepKind {
    /// Dispatch to a plugin's `handle` command.
    Uses(String),
    /// Embed another compiled pipeline as a sub-DAG; its own root becomes a
    /// child node entered in place of this step.
    Call(String),
    /// Parallel sibling steps that all start together and join before the
    /// next step in sequence.
    Split(Vec<CompiledStep>),
}

/// One node in a compiled pipeline's DAG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledStep {
    pub id: String,
    pub kind: StepKind,
    /// Extra event types (beyond the pipeline-level trigger) that route
    /// directly to this step when a job declares it as an explicit step.
    #[serde(default)]
    pub on_events: Vec<String>,
}

/// A fully compiled, validated (acyclic) pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledPipeline {
    pub id: PipelineId,
    pub name: String,
    pub trigger_event_type: String,
    #[serde(default)]
    pub execution_mode: ExecutionMode,
    pub timeout_secs: Option<u64>,
    /// Steps in declaration order; sequential entries imply serial edges.
    pub steps: Vec<CompiledStep>,
    /// Content fingerprint (sha256 hex) of the normalized pipeline form.
    pub fingerprint: String,
}

impl CompiledPipeline {
    pub fn first_step(&self) -> Option<&CompiledStep> {
        self.steps.first()
    }

    pub fn get_step(&self, id: &str) -> Option<&CompiledStep> {
        fn find<'a>(steps: &'a [CompiledStep], id: &str) -> Option<&'a CompiledStep> {
            for step in steps {
                if step.id == id {
                    return Some(step);
                }
                if let StepKind::Split(children) = &step.kind {
                    if let Some(found) = find(children, id) {
                        return Some(found);
                    }
                }
            }
            None
        }
        find(&self.steps, id)
    }

    /// Step immediately following `id` in declaration order at the top
    /// level: sequential listing implies serial edges.
    pub fn step_after(&self, id: &str) -> Option<&CompiledStep> {
        let idx = self.steps.iter().position(|s| s.id == id)?;
        self.steps.get(idx + 1)
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
