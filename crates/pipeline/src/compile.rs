// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline compilation: DAG cycle detection (DFS, grounded on the pack's
//! structural-validation pass style) and content fingerprinting (spec
//! §4.10 Pipeline Compiler).

use crate::def::{DefError, PipelineFile, StepFile, StepRun};
use ductile_core::{CompiledPipeline, CompiledStep, PipelineId, StepKind};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Def(#[from] DefError),
    #[error("duplicate pipeline name `{name}` found in {first} and {second}")]
    DuplicateName {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },
    #[error("pipeline `{0}` calls unknown pipeline `{1}`")]
    UnknownCall(String, String),
    #[error("cycle detected in pipeline call graph: {0}")]
    Cycle(String),
}

/// Compile every pipeline file under `dir` (non-recursive, one YAML document
/// per `.yaml`/`.yml` file) into validated, fingerprinted `CompiledPipeline`s.
pub fn compile_dir(dir: &std::path::Path) -> Result<Vec<CompiledPipeline>, CompileError> {
    let mut files: Vec<(PathBuf, PipelineFile)> = Vec::new();
    let entries = std::fs::read_dir(dir).map_err(|source| {
        DefError::Read {
            path: dir.to_path_buf(),
            source,
        }
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| DefError::Read {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e == "yaml" || e == "yml")
            .unwrap_or(false);
        if !is_yaml {
            continue;
        }
        let file = crate::def::parse_pipeline_file(&path)?;
        files.push((path, file));
    }
    compile_all(files)
}

/// Compile a set of already-parsed pipeline files, named by their source
/// path for duplicate-name error reporting.
pub fn compile_all(files: Vec<(PathBuf, PipelineFile)>) -> Result<Vec<CompiledPipeline>, CompileError> {
    let mut by_name: HashMap<String, (PathBuf, PipelineFile)> = HashMap::new();
    for (path, file) in files {
        if let Some((first_path, _)) = by_name.get(&file.name) {
            return Err(CompileError::DuplicateName {
                name: file.name,
                first: first_path.clone(),
                second: path,
            });
        }
        by_name.insert(file.name.clone(), (path, file));
    }

    for name in by_name.keys() {
        detect_cycle(name, &by_name, &mut Vec::new(), &mut HashSet::new())?;
    }

    by_name
        .into_values()
        .map(|(_, file)| compile_one(file))
        .collect()
}

/// DFS cycle detection over the call graph, following `call:` edges at any
/// nesting depth (including inside `split` blocks).
fn detect_cycle(
    name: &str,
    by_name: &HashMap<String, (PathBuf, PipelineFile)>,
    stack: &mut Vec<String>,
    visited: &mut HashSet<String>,
) -> Result<(), CompileError> {
    if let Some(pos) = stack.iter().position(|n| n == name) {
        let cycle_path = stack[pos..]
            .iter()
            .cloned()
            .chain(std::iter::once(name.to_string()))
            .collect::<Vec<_>>()
            .join(" -> ");
        return Err(CompileError::Cycle(cycle_path));
    }
    if visited.contains(name) {
        return Ok(());
    }

    let (_, file) = by_name
        .get(name)
        .ok_or_else(|| CompileError::UnknownCall("<root>".into(), name.to_string()))?;

    stack.push(name.to_string());
    for call_target in call_targets(&file.steps) {
        if !by_name.contains_key(&call_target) {
            return Err(CompileError::UnknownCall(name.to_string(), call_target));
        }
        detect_cycle(&call_target, by_name, stack, visited)?;
    }
    stack.pop();
    visited.insert(name.to_string());
    Ok(())
}

fn call_targets(steps: &[StepFile]) -> Vec<String> {
    let mut targets = Vec::new();
    for step in steps {
        match &step.run {
            StepRun::Call(name) => targets.push(name.clone()),
            StepRun::Split(children) => targets.extend(call_targets(children)),
            StepRun::Uses(_) => {}
        }
    }
    targets
}

fn compile_one(file: PipelineFile) -> Result<CompiledPipeline, CompileError> {
    let timeout_secs = match &file.timeout {
        Some(raw) => Some(crate::def::parse_timeout_secs(raw).map_err(|reason| {
            DefError::InvalidTimeout {
                path: PathBuf::new(),
                raw: raw.clone(),
                reason,
            }
        })?),
        None => None,
    };
    let steps = compile_steps(&file.steps);
    let fingerprint = fingerprint(&file);

    Ok(CompiledPipeline {
        id: PipelineId::new(format!("pipe-{}", &fingerprint[..12])),
        name: file.name,
        trigger_event_type: file.on,
        execution_mode: file.execution_mode.unwrap_or_default(),
        timeout_secs,
        steps,
        fingerprint,
    })
}

fn compile_steps(steps: &[StepFile]) -> Vec<CompiledStep> {
    steps
        .iter()
        .map(|step| CompiledStep {
            id: step.id.clone(),
            kind: match &step.run {
                StepRun::Uses(plugin) => StepKind::Uses(plugin.clone()),
                StepRun::Call(pipeline) => StepKind::Call(pipeline.clone()),
                StepRun::Split(children) => StepKind::Split(compile_steps(children)),
            },
            on_events: step.on_events.clone(),
        })
        .collect()
}

/// Content fingerprint: sha256 hex over the pipeline's canonical-JSON form.
fn fingerprint(file: &PipelineFile) -> String {
    let value = serde_json::to_value(CanonicalPipeline {
        name: &file.name,
        on: &file.on,
        steps: &file.steps,
    })
    .unwrap_or(serde_json::Value::Null);
    let canonical = canonical_json(&value);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    to_hex(&hasher.finalize())
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[derive(serde::Serialize)]
struct CanonicalPipeline<'a> {
    name: &'a str,
    on: &'a str,
    steps: &'a [StepFile],
}

/// Serialize a `serde_json::Value` with object keys sorted, so semantically
/// identical YAML (key order aside) fingerprints identically.
fn canonical_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let parts: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{:?}:{}", k, canonical_json(&map[k])))
                .collect();
            format!("{{{}}}", parts.join(","))
        }
        serde_json::Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", parts.join(","))
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
#[path = "compile_tests.rs"]
mod tests;
