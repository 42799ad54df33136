// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup sequencing: lock, directories, plugin discovery, pipeline
//! compilation, store open, and orphan recovery — the one-time setup a
//! front end (`main.rs`) runs before accepting requests. The
//! lock-then-directories-then-replay-then-ready shape is deliberately flat:
//! there is no tmux/agent adapter layer, no Unix socket, and no
//! breadcrumb-based reconciliation here — `ductile_engine::Store::open`
//! already performs snapshot load, WAL replay, and compaction internally.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ductile_core::{EngineConfig, SystemClock, UuidIdGen};
use ductile_engine::{parse_schedule_expr, Engine, EngineTuning, ScheduleEntry, Store, WorkspaceManager};
use ductile_pipeline::CompileError;
use ductile_registry::{Registry, RegistryError};
use ductile_storage::{InstanceLock, LockError};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to acquire instance lock: {0}")]
    Lock(#[from] LockError),
    #[error("failed to open durable store: {0}")]
    Store(#[from] ductile_engine::EngineError),
    #[error("plugin discovery failed: {0}")]
    Registry(#[from] RegistryError),
    #[error("pipeline compilation failed: {0}")]
    Compile(#[from] CompileError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything `main.rs` needs after a successful startup: the wired
/// [`Engine`] plus the held lock, which must outlive the process (dropping
/// it releases the advisory lock).
pub struct StartupResult {
    pub engine: Arc<Engine<UuidIdGen, SystemClock>>,
    pub lock: InstanceLock,
    pub config: EngineConfig,
}

/// Run the full startup sequence: acquire the instance lock, create the
/// state/workspace/pipeline directories, discover plugins, compile
/// pipelines, open the durable store, wire the engine, and recover any
/// job left `Running` across a crash.
pub fn startup(config: EngineConfig) -> Result<StartupResult, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;
    let lock = InstanceLock::acquire(&config.state_dir)?;

    std::fs::create_dir_all(&config.workspace_root)?;
    std::fs::create_dir_all(&config.pipelines_dir)?;

    let registry = Registry::discover(&config.plugin_roots)?;
    info!(plugins = registry.len(), "plugin registry loaded");

    let pipelines = compile_pipelines(&config.pipelines_dir)?;
    info!(pipelines = pipelines.len(), "pipelines compiled");

    let store = Arc::new(Store::open(&config.state_dir)?);

    let schedule_entries = build_schedule_entries(&registry);
    info!(entries = schedule_entries.len(), "scheduler entries built from plugin manifests");

    let tuning = EngineTuning {
        dedup_ttl: config.dedup_ttl,
        retention: config.retention,
        breaker_threshold: config.breaker_threshold,
        breaker_cooldown: config.breaker_cooldown,
        default_command_timeout: config.default_command_timeout,
        sigterm_grace: config.sigterm_grace,
        stdout_cap_bytes: config.stdout_cap_bytes,
        stderr_cap_bytes: config.stderr_cap_bytes,
        sync_bridge_max_wait: config.sync_bridge_max_wait,
        sync_bridge_absolute_ceiling: config.sync_bridge_absolute_ceiling,
        max_concurrent_sync_waits: config.max_concurrent_sync_waits,
        max_outstanding_polls: config.max_outstanding_polls,
        event_hub_capacity: 1024,
        schedule_entries,
    };

    let engine = Engine::new(
        store,
        Arc::new(SystemClock),
        UuidIdGen,
        Arc::new(registry),
        Arc::new(WorkspaceManager::new(config.workspace_root.clone())),
        pipelines,
        std::collections::HashMap::new(),
        &tuning,
    );
    engine.recover_and_prime()?;

    Ok(StartupResult {
        engine: Arc::new(engine),
        lock,
        config,
    })
}

/// Build one [`ScheduleEntry`] per enabled plugin that declares a
/// `schedule` expression in its manifest, polling its `poll` command. A
/// plugin with an unparsable schedule expression is skipped (logged), not
/// fatal to startup.
fn build_schedule_entries(registry: &Registry) -> Vec<ScheduleEntry> {
    registry
        .iter()
        .filter_map(|plugin| {
            let expr = plugin.schedule.as_ref()?;
            match parse_schedule_expr(expr) {
                Ok(interval) => Some(ScheduleEntry {
                    plugin: plugin.name.clone(),
                    command: "poll".to_string(),
                    interval,
                }),
                Err(e) => {
                    warn!(plugin = %plugin.name, schedule = %expr, error = %e, "ignoring unparsable schedule expression");
                    None
                }
            }
        })
        .collect()
}

fn compile_pipelines(dir: &Path) -> Result<Vec<ductile_core::CompiledPipeline>, LifecycleError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    Ok(ductile_pipeline::compile_dir(dir)?)
}

/// Default checkpoint/scheduler-tick cadence fallback, used when
/// `EngineConfig::scheduler_tick` is unset (it never is — `EngineConfig`
/// always carries a default).
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(60);

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
