//! Scenario: a scheduled poll of a `read`-type command runs to completion
//! and its result is queryable afterwards.

use crate::prelude::*;
use ductile_engine::{EnqueueRequest, EngineFacade};
use ductile_core::JobStatus;

#[tokio::test]
async fn echo_poll_runs_to_completion_and_records_its_result() {
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
            submitted_by: "scheduler".to_string(),
        })
        .await
        .unwrap();

    drain(&harness.engine, 10).await;

    let job = harness.engine.get_job(&id).await.unwrap().expect("job exists");
    assert_eq!(job.status, JobStatus::Succeeded);
    assert_eq!(job.attempt, 1);
}

#[tokio::test]
async fn echo_poll_with_a_dedupe_key_collapses_duplicate_submissions() {
    let plugin_dir = tempfile::tempdir().unwrap();
    let registry = script_plugin(plugin_dir.path(), "echo", OK_RESPONSE);
    let harness = TestEngine::build(registry, Vec::new(), TestTuning::fast());

    let first = harness
        .engine
        .enqueue(EnqueueRequest {
            plugin: "echo".to_string(),
            command: "handle".to_string(),
            payload: serde_json::json!({}),
            dedupe_key: Some("poll-tick-1".to_string()),
            max_attempts: None,
            submitted_by: "scheduler".to_string(),
        })
        .await
        .unwrap();

    let second = harness
        .engine
        .enqueue(EnqueueRequest {
            plugin: "echo".to_string(),
            command: "handle".to_string(),
            payload: serde_json::json!({}),
            dedupe_key: Some("poll-tick-1".to_string()),
            max_attempts: None,
            submitted_by: "scheduler".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(first, second, "same dedupe key within the TTL window must return the same job");
}
