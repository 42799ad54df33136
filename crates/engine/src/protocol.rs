// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request/response envelopes exchanged with plugins over stdin/stdout,
//! following a versioned envelope-DTO pattern.

use chrono::{DateTime, Utc};
use ductile_core::{JobId, PluginEvent};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const PROTOCOL_VERSION: u32 = 2;

/// Written to the plugin's stdin, then stdin is closed.
#[derive(Debug, Clone, Serialize)]
pub struct RequestEnvelope {
    pub protocol: u32,
    pub job_id: JobId,
    pub command: String,
    pub config: serde_json::Value,
    pub state: serde_json::Value,
    pub event: Option<PluginEvent>,
    pub workspace_dir: PathBuf,
    pub context: serde_json::Value,
    pub deadline_at: DateTime<Utc>,
}

impl RequestEnvelope {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        job_id: JobId,
        command: impl Into<String>,
        config: serde_json::Value,
        state: serde_json::Value,
        event: Option<PluginEvent>,
        workspace_dir: PathBuf,
        context: serde_json::Value,
        deadline_at: DateTime<Utc>,
    ) -> Self {
        Self {
            protocol: PROTOCOL_VERSION,
            job_id,
            command: command.into(),
            config,
            state,
            event,
            workspace_dir,
            context,
            deadline_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogLine {
    pub level: String,
    pub message: String,
}

/// Read from the plugin's stdout until EOF.
///
/// `retry` defaults to `true` — a paranoid default, matching the
/// write-command-by-default posture for anything a plugin leaves
/// unspecified: an error response that doesn't say otherwise is assumed
/// retryable until the plugin explicitly opts out.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseEnvelope {
    pub status: ResponseStatus,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default = "default_retry")]
    pub retry: bool,
    #[serde(default)]
    pub events: Vec<PluginEvent>,
    #[serde(default)]
    pub state_updates: serde_json::Value,
    #[serde(default)]
    pub logs: Vec<LogLine>,
}

fn default_retry() -> bool {
    true
}

/// Exit status signalling a non-retryable configuration failure.
pub const CONFIG_ERROR_EXIT_CODE: i32 = 78;

/// Parse a plugin's raw stdout bytes into a response envelope.
///
/// Any non-JSON output, or JSON that doesn't match the envelope shape, is a
/// protocol error — including a plugin writing zero bytes to stdout.
pub fn parse_response(stdout: &[u8]) -> Result<ResponseEnvelope, ProtocolError> {
    if stdout.is_empty() {
        return Err(ProtocolError::EmptyResponse);
    }
    serde_json::from_slice(stdout).map_err(|source| ProtocolError::Malformed {
        source,
        raw_len: stdout.len(),
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("plugin wrote 0 bytes to stdout")]
    EmptyResponse,
    #[error("plugin stdout ({raw_len} bytes) is not a valid response envelope: {source}")]
    Malformed {
        #[source]
        source: serde_json::Error,
        raw_len: usize,
    },
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
