// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plugin and command-type data model.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Whether a command is safe to schedule/replay/dedupe freely, or has side
/// effects. Unspecified commands default to `Write` (paranoid default).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    /// Idempotent; may be scheduled, replayed, or deduped freely.
    Read,
    /// Has side effects; the default when a command's type is unspecified.
    Write,
}

impl Default for CommandType {
    fn default() -> Self {
        CommandType::Write
    }
}

/// One command a plugin exposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandDef {
    #[serde(default)]
    pub kind: CommandType,
    #[serde(default)]
    pub input_schema: Option<serde_json::Value>,
    #[serde(default)]
    pub output_schema: Option<serde_json::Value>,
}

/// A discovered, validated plugin. Immutable after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plugin {
    pub name: String,
    pub protocol: u32,
    /// Path to the executable, relative to `root_dir`.
    pub entrypoint: PathBuf,
    /// The plugin's own directory (absolute).
    pub root_dir: PathBuf,
    pub commands: BTreeMap<String, CommandDef>,
    #[serde(default)]
    pub required_config: Vec<String>,
    #[serde(default)]
    pub optional_config: Vec<String>,
    /// Schedule expression (`30s`, `7m`, `hourly`, …) for this plugin's
    /// `poll` command, if it has one. `None` means the plugin is never
    /// polled on a timer — only event- or webhook-triggered.
    #[serde(default)]
    pub schedule: Option<String>,
}

impl Plugin {
    /// Absolute path to the entrypoint executable.
    pub fn entrypoint_path(&self) -> PathBuf {
        self.root_dir.join(&self.entrypoint)
    }

    pub fn command(&self, name: &str) -> Option<&CommandDef> {
        self.commands.get(name)
    }

    /// Commands of the given type, for scope expansion (read vs read-write).
    pub fn commands_of_type(&self, kind: CommandType) -> Vec<&str> {
        self.commands
            .iter()
            .filter(|(_, def)| def.kind == kind)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

#[cfg(test)]
#[path = "plugin_tests.rs"]
mod tests;
