//! Shared helpers for Ductile's end-to-end scenario tests.
//!
//! These exercise the `EngineFacade` trait directly — the product's HTTP/
//! webhook front end is out of scope, so there is nothing to black-box
//! test a binary against; the boundary under test is the trait itself.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use ductile_core::{
    CompiledPipeline, CommandDef, CommandType, CompiledStep, ExecutionMode, FakeClock, Plugin,
    PipelineId, SequentialIdGen, StepKind,
};
use ductile_engine::{Engine, EngineTuning, Store, WorkspaceManager};
use ductile_registry::Registry;
use std::collections::BTreeMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub fn write_executable(path: &Path, contents: &str) {
    fs::write(path, contents).unwrap();
    let mut perms = fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).unwrap();
}

/// A shell-script-backed plugin exposing a single `handle` command,
/// written into `dir`.
pub fn script_plugin_def(dir: &Path, name: &str, script: &str) -> Plugin {
    write_executable(&dir.join("run.sh"), script);
    let mut commands = BTreeMap::new();
    commands.insert(
        "handle".to_string(),
        CommandDef {
            kind: CommandType::Write,
            input_schema: None,
            output_schema: None,
        },
    );
    Plugin {
        name: name.to_string(),
        protocol: 2,
        entrypoint: std::path::PathBuf::from("run.sh"),
        root_dir: dir.to_path_buf(),
        commands,
        required_config: Vec::new(),
        optional_config: Vec::new(),
        schedule: None,
    }
}

/// A single-plugin registry backed by a shell script written to `dir`.
pub fn script_plugin(dir: &Path, name: &str, script: &str) -> Registry {
    Registry::from_plugins(vec![script_plugin_def(dir, name, script)])
}

pub const OK_RESPONSE: &str = "#!/bin/sh\ncat <<'EOF'\n{\"status\":\"ok\",\"state_updates\":{},\"events\":[]}\nEOF\n";

pub fn hangs_forever_script() -> String {
    "#!/bin/sh\nsleep 5\ncat <<'EOF'\n{\"status\":\"ok\",\"state_updates\":{},\"events\":[]}\nEOF\n".to_string()
}

pub struct TestTuning;

impl TestTuning {
    pub fn fast() -> EngineTuning {
        EngineTuning {
            dedup_ttl: Duration::from_secs(3600),
            retention: Duration::from_secs(30 * 24 * 3600),
            breaker_threshold: 5,
            breaker_cooldown: Duration::from_secs(300),
            default_command_timeout: Duration::from_secs(5),
            sigterm_grace: Duration::from_millis(100),
            stdout_cap_bytes: 64 * 1024,
            stderr_cap_bytes: 64 * 1024,
            sync_bridge_max_wait: Duration::from_secs(5),
            sync_bridge_absolute_ceiling: Duration::from_secs(10),
            max_concurrent_sync_waits: 4,
            max_outstanding_polls: 5,
            event_hub_capacity: 32,
            schedule_entries: Vec::new(),
        }
    }

    pub fn with_timeout(timeout: Duration) -> EngineTuning {
        EngineTuning {
            default_command_timeout: timeout,
            sigterm_grace: Duration::from_millis(50),
            ..Self::fast()
        }
    }
}

/// A scratch engine rooted in fresh temp directories, ready to dispatch
/// against whatever `Registry`/pipelines the scenario supplies.
pub struct TestEngine {
    pub engine: Engine<SequentialIdGen, FakeClock>,
    store: Arc<Store>,
    _state_dir: TempDir,
    _workspace_root: TempDir,
}

impl TestEngine {
    pub fn build(registry: Registry, pipelines: Vec<CompiledPipeline>, tuning: EngineTuning) -> Self {
        let state_dir = tempfile::tempdir().unwrap();
        let workspace_root = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(state_dir.path()).unwrap());
        let clock = Arc::new(FakeClock::new(chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap()));
        let workspaces = Arc::new(WorkspaceManager::new(workspace_root.path().to_path_buf()));
        let engine = Engine::new(
            store.clone(),
            clock,
            SequentialIdGen::new("job"),
            Arc::new(registry),
            workspaces,
            pipelines,
            std::collections::HashMap::new(),
            &tuning,
        );
        Self {
            engine,
            store,
            _state_dir: state_dir,
            _workspace_root: workspace_root,
        }
    }

    /// Direct access to the underlying durable store, for scenarios that
    /// need to apply a raw event the way an internal component would
    /// (e.g. simulating a job left mid-dispatch at crash time).
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Reopen a new engine against the same state/workspace directories,
    /// simulating a restart after a crash. Consumes `self` so the old
    /// `Store`'s WAL handle is dropped before the new one is opened.
    pub fn reopen(self, registry: Registry, pipelines: Vec<CompiledPipeline>, tuning: EngineTuning) -> Self {
        drop(self.engine);
        drop(self.store);
        let store = Arc::new(Store::open(self._state_dir.path()).unwrap());
        let clock = Arc::new(FakeClock::new(chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap()));
        let workspaces = Arc::new(WorkspaceManager::new(self._workspace_root.path().to_path_buf()));
        let engine = Engine::new(
            store.clone(),
            clock,
            SequentialIdGen::new("job"),
            Arc::new(registry),
            workspaces,
            pipelines,
            std::collections::HashMap::new(),
            &tuning,
        );
        Self {
            engine,
            store,
            _state_dir: self._state_dir,
            _workspace_root: self._workspace_root,
        }
    }

    /// Recover orphaned jobs and run one scheduler tick, mirroring what
    /// `ductile-daemon::lifecycle::startup` does right after `Engine::new`.
    pub fn recover(&self) {
        self.engine.recover_and_prime().unwrap();
    }
}

pub fn one_step_pipeline(name: &str, plugin: &str, mode: ExecutionMode) -> CompiledPipeline {
    CompiledPipeline {
        id: PipelineId::new(format!("pipe-{name}")),
        name: name.to_string(),
        trigger_event_type: "never".to_string(),
        execution_mode: mode,
        timeout_secs: None,
        steps: vec![CompiledStep {
            id: "handle".to_string(),
            kind: StepKind::Uses(plugin.to_string()),
            on_events: Vec::new(),
        }],
        fingerprint: "deadbeef".to_string(),
    }
}

pub fn two_hop_pipeline(name: &str, first_plugin: &str, second_plugin: &str) -> CompiledPipeline {
    CompiledPipeline {
        id: PipelineId::new(format!("pipe-{name}")),
        name: name.to_string(),
        trigger_event_type: "never".to_string(),
        execution_mode: ExecutionMode::Async,
        timeout_secs: None,
        steps: vec![
            CompiledStep {
                id: "first".to_string(),
                kind: StepKind::Uses(first_plugin.to_string()),
                on_events: vec!["first.done".to_string()],
            },
            CompiledStep {
                id: "second".to_string(),
                kind: StepKind::Uses(second_plugin.to_string()),
                on_events: Vec::new(),
            },
        ],
        fingerprint: "cafef00d".to_string(),
    }
}

/// Drive the dispatcher/router loop until it reports an empty queue, up to
/// `max_cycles` times — the in-process analogue of waiting on a running
/// daemon.
pub async fn drain(engine: &Engine<SequentialIdGen, FakeClock>, max_cycles: usize) {
    use ductile_engine::EngineFacade;
    for _ in 0..max_cycles {
        if !engine.dispatch_and_route_once().await.unwrap() {
            return;
        }
    }
}
