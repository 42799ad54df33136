//! Scenario: state durably written before a crash is still there after the
//! process restarts and reopens the same state directory (WAL replay).

use crate::prelude::*;
use ductile_engine::{EnqueueRequest, EngineFacade};
use ductile_core::{Event, JobStatus};

#[tokio::test]
async fn a_queued_job_survives_an_unclean_restart() {
    let plugin_dir = tempfile::tempdir().unwrap();
    let registry = script_plugin(plugin_dir.path(), "echo", OK_RESPONSE);
    let harness = TestEngine::build(registry, Vec::new(), TestTuning::fast());

    let id = harness
        .engine
        .enqueue(EnqueueRequest {
            plugin: "echo".to_string(),
            command: "handle".to_string(),
            payload: serde_json::json!({"n": 1}),
            dedupe_key: None,
            max_attempts: None,
            submitted_by: "api".to_string(),
        })
        .await
        .unwrap();

    // Simulate the process dying here: no graceful `checkpoint()` call,
    // the engine and its `Store` are simply dropped with the WAL already
    // durably flushed by `apply` (no data relies on an explicit checkpoint).
    let plugin_dir2 = tempfile::tempdir().unwrap();
    let registry2 = script_plugin(plugin_dir2.path(), "echo", OK_RESPONSE);
    let harness = harness.reopen(registry2, Vec::new(), TestTuning::fast());

    let job = harness.engine.get_job(&id).await.unwrap().expect("job survives replay");
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.payload, serde_json::json!({"n": 1}));
}

#[tokio::test]
async fn a_succeeded_job_and_its_result_survive_an_unclean_restart() {
    let plugin_dir = tempfile::tempdir().unwrap();
    let registry = script_plugin(plugin_dir.path(), "echo", OK_RESPONSE);
    let harness = TestEngine::build(registry, Vec::new(), TestTuning::fast());

    let id = harness
        .engine
        .enqueue(EnqueueRequest {
            plugin: "echo".to_string(),
            command: "handle".to_string(),
            payload: serde_json::json!({}),
            dedupe_key: None,
            max_attempts: None,
            submitted_by: "api".to_string(),
        })
        .await
        .unwrap();
    drain(&harness.engine, 10).await;

    let before = harness.engine.get_job(&id).await.unwrap().expect("job exists");
    assert_eq!(before.status, JobStatus::Succeeded);

    let plugin_dir2 = tempfile::tempdir().unwrap();
    let registry2 = script_plugin(plugin_dir2.path(), "echo", OK_RESPONSE);
    let harness = harness.reopen(registry2, Vec::new(), TestTuning::fast());

    let after = harness.engine.get_job(&id).await.unwrap().expect("job survives replay");
    assert_eq!(after.status, JobStatus::Succeeded);
    assert_eq!(after.completed_at_ms, before.completed_at_ms);
}

#[tokio::test]
async fn a_job_left_running_at_crash_time_is_recovered_not_stranded() {
    let plugin_dir = tempfile::tempdir().unwrap();
    let registry = script_plugin(plugin_dir.path(), "echo", OK_RESPONSE);
    let harness = TestEngine::build(registry, Vec::new(), TestTuning::fast());

    let id = harness
        .engine
        .enqueue(EnqueueRequest {
            plugin: "echo".to_string(),
            command: "handle".to_string(),
            payload: serde_json::json!({}),
            dedupe_key: None,
            max_attempts: None,
            submitted_by: "api".to_string(),
        })
        .await
        .unwrap();

    // Move it to `Running` directly via the store, the same transition
    // `WorkQueue::dequeue` applies, without ever completing it — exactly
    // what an unclean kill mid-dispatch leaves behind.
    harness
        .store()
        .apply(Event::JobStarted { job_id: id.clone(), started_at_ms: 1_700_000_000_000 })
        .unwrap();

    let plugin_dir2 = tempfile::tempdir().unwrap();
    let registry2 = script_plugin(plugin_dir2.path(), "echo", OK_RESPONSE);
    let harness = harness.reopen(registry2, Vec::new(), TestTuning::fast());
    harness.recover();

    let job = harness.engine.get_job(&id).await.unwrap().expect("job exists after recovery");
    assert_ne!(job.status, JobStatus::Running, "recover_and_prime must not leave a job stuck Running");
}
