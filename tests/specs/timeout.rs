//! Scenario: a plugin that never returns is killed once its command
//! timeout elapses and the job is recorded as timed out, not left
//! `Running` forever.

use crate::prelude::*;
use ductile_engine::{EnqueueRequest, EngineFacade};
use ductile_core::JobStatus;
use std::time::Duration;

#[tokio::test]
async fn a_hanging_plugin_is_killed_and_marked_timed_out() {
    let plugin_dir = tempfile::tempdir().unwrap();
    let registry = script_plugin(plugin_dir.path(), "slowpoke", &hangs_forever_script());
    let tuning = TestTuning::with_timeout(Duration::from_millis(150));
    let harness = TestEngine::build(registry, Vec::new(), tuning);

    let id = harness
        .engine
        .enqueue(EnqueueRequest {
            plugin: "slowpoke".to_string(),
            command: "handle".to_string(),
            payload: serde_json::json!({}),
            dedupe_key: None,
            max_attempts: None,
            submitted_by: "api".to_string(),
        })
        .await
        .unwrap();

    // dispatch_and_route_once awaits the subprocess to completion (or
    // timeout) internally, so a single call is enough to observe the
    // terminal state.
    harness.engine.dispatch_and_route_once().await.unwrap();

    let job = harness.engine.get_job(&id).await.unwrap().expect("job exists");
    assert_eq!(job.status, JobStatus::TimedOut);
    assert!(job.completed_at_ms.is_some());
}
