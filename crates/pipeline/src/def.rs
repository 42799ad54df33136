// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Raw YAML pipeline definitions. This is the pre-validation shape a
//! pipeline file parses into; [`crate::compile`] turns it into
//! `ductile_core::CompiledPipeline`.

use ductile_core::ExecutionMode;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DefError {
    #[error("{path}: failed to read pipeline file: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: invalid YAML: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("{path}: invalid timeout `{raw}`: {reason}")]
    InvalidTimeout {
        path: PathBuf,
        raw: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineFile {
    pub name: String,
    pub on: String,
    #[serde(default)]
    pub execution_mode: Option<ExecutionMode>,
    #[serde(default)]
    pub timeout: Option<String>,
    #[serde(default)]
    pub steps: Vec<StepFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StepFile {
    pub id: String,
    #[serde(flatten)]
    pub run: StepRun,
    #[serde(default)]
    pub on_events: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepRun {
    Uses(String),
    Call(String),
    Split(Vec<StepFile>),
}

/// Parse one pipeline YAML document, validating only its syntactic shape
/// (field presence/types, duration grammar). Graph-level validation (cycle
/// detection, duplicate names across files) happens in [`crate::compile`].
pub fn parse_pipeline_file(path: &Path) -> Result<PipelineFile, DefError> {
    let raw = std::fs::read_to_string(path).map_err(|source| DefError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let file: PipelineFile =
        serde_yaml::from_str(&raw).map_err(|source| DefError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
    if let Some(raw) = &file.timeout {
        parse_timeout_secs(raw).map_err(|reason| DefError::InvalidTimeout {
            path: path.to_path_buf(),
            raw: raw.clone(),
            reason,
        })?;
    }
    Ok(file)
}

/// Parse a duration string like `30s`, `5m`, `1h`, `2d` into seconds.
///
/// Mirrors the `<number><unit>` grammar used elsewhere in the pack for
/// human-readable durations (scheduler intervals, retention windows).
pub fn parse_timeout_secs(raw: &str) -> Result<u64, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("empty duration string".into());
    }
    let split_at = raw
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(raw.len());
    let (num, unit) = raw.split_at(split_at);
    let num: u64 = num
        .parse()
        .map_err(|_| format!("invalid number in duration: {raw}"))?;
    let multiplier = match unit {
        "" | "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86_400,
        "w" => 604_800,
        other => return Err(format!("unknown duration unit: {other}")),
    };
    Ok(num * multiplier)
}

#[cfg(test)]
#[path = "def_tests.rs"]
mod tests;
