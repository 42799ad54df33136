// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon binary.

use std::path::PathBuf;
use std::time::Duration;

/// Resolve the config file path: `DUCTILE_CONFIG` if set, else
/// `./ductile.toml`. A missing file at the resolved path is not an error —
/// the caller falls back to `EngineConfig::default()`.
pub fn config_path() -> PathBuf {
    std::env::var("DUCTILE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./ductile.toml"))
}

/// Dispatch-loop idle sleep override, mostly useful to speed up tests.
pub fn dispatch_idle_ms() -> Option<Duration> {
    std::env::var("DUCTILE_DISPATCH_IDLE_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
