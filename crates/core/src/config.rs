// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ambient engine configuration: the typed struct the rest of the ambient
//! stack (logging, storage paths, scheduler tuning) hangs off of.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

fn default_dedup_ttl() -> Duration {
    Duration::from_secs(24 * 3600)
}

fn default_retention() -> Duration {
    Duration::from_secs(30 * 24 * 3600)
}

fn default_scheduler_tick() -> Duration {
    Duration::from_secs(60)
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_breaker_threshold() -> u32 {
    5
}

fn default_breaker_cooldown() -> Duration {
    Duration::from_secs(300)
}

fn default_max_outstanding_polls() -> u32 {
    1
}

fn default_sync_bridge_max_wait() -> Duration {
    Duration::from_secs(30)
}

fn default_sync_bridge_absolute_ceiling() -> Duration {
    Duration::from_secs(120)
}

fn default_max_concurrent_sync_waits() -> usize {
    64
}

fn default_cap_bytes() -> usize {
    64 * 1024
}

fn default_sigterm_grace() -> Duration {
    Duration::from_secs(5)
}

fn default_max_body_size() -> usize {
    1024 * 1024
}

/// Engine-wide configuration, loaded once at daemon startup and treated as
/// immutable for the process lifetime — config reload is deliberately
/// deferred to a restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub state_dir: PathBuf,
    pub plugin_roots: Vec<PathBuf>,
    pub pipelines_dir: PathBuf,
    pub workspace_root: PathBuf,
    #[serde(with = "humantime_duration")]
    pub dedup_ttl: Duration,
    #[serde(with = "humantime_duration")]
    pub retention: Duration,
    #[serde(with = "humantime_duration")]
    pub scheduler_tick: Duration,
    #[serde(with = "humantime_duration")]
    pub default_command_timeout: Duration,
    pub breaker_threshold: u32,
    #[serde(with = "humantime_duration")]
    pub breaker_cooldown: Duration,
    pub max_outstanding_polls: u32,
    #[serde(with = "humantime_duration")]
    pub sync_bridge_max_wait: Duration,
    #[serde(with = "humantime_duration")]
    pub sync_bridge_absolute_ceiling: Duration,
    pub max_concurrent_sync_waits: usize,
    #[serde(with = "humantime_duration")]
    pub sigterm_grace: Duration,
    pub stdout_cap_bytes: usize,
    pub stderr_cap_bytes: usize,
    pub max_webhook_body_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from("./ductile-state"),
            plugin_roots: Vec::new(),
            pipelines_dir: PathBuf::from("./pipelines"),
            workspace_root: PathBuf::from("./ductile-state/workspaces"),
            dedup_ttl: default_dedup_ttl(),
            retention: default_retention(),
            scheduler_tick: default_scheduler_tick(),
            default_command_timeout: default_command_timeout(),
            breaker_threshold: default_breaker_threshold(),
            breaker_cooldown: default_breaker_cooldown(),
            max_outstanding_polls: default_max_outstanding_polls(),
            sync_bridge_max_wait: default_sync_bridge_max_wait(),
            sync_bridge_absolute_ceiling: default_sync_bridge_absolute_ceiling(),
            max_concurrent_sync_waits: default_max_concurrent_sync_waits(),
            sigterm_grace: default_sigterm_grace(),
            stdout_cap_bytes: default_cap_bytes(),
            stderr_cap_bytes: default_cap_bytes(),
            max_webhook_body_bytes: default_max_body_size(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML string, falling back to defaults for
    /// any field left unspecified. There is no include-merging or layered
    /// override resolution here — just plain ambient deserialization.
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }
}

/// Serializes `Duration` as a humantime-style string (e.g. `"60s"`) so the
/// TOML form stays readable, without adding a dependency beyond `toml` and
/// `serde`.
mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        format!("{}s", d.as_secs()).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    fn parse(raw: &str) -> Result<Duration, String> {
        let raw = raw.trim();
        let (num, unit) = raw
            .find(|c: char| !c.is_ascii_digit())
            .map(|idx| raw.split_at(idx))
            .ok_or_else(|| format!("missing unit in duration '{raw}'"))?;
        let n: u64 = num
            .parse()
            .map_err(|_| format!("invalid duration number '{num}'"))?;
        let secs = match unit {
            "s" => n,
            "m" => n * 60,
            "h" => n * 3600,
            "d" => n * 86400,
            other => return Err(format!("unknown duration unit '{other}'")),
        };
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
