//! Scenario: a two-step pipeline where the first step's emitted event
//! routes a job to the second step.

use crate::prelude::*;
use ductile_engine::EngineFacade;
use ductile_core::JobStatus;
use ductile_registry::Registry;

const FIRST_EMITS_DONE: &str = "#!/bin/sh\ncat <<'EOF'\n{\"status\":\"ok\",\"state_updates\":{},\"events\":[{\"type\":\"first.done\",\"payload\":{}}]}\nEOF\n";

#[tokio::test]
async fn a_step_that_emits_the_declared_event_routes_to_the_next_step() {
    let first_dir = tempfile::tempdir().unwrap();
    let second_dir = tempfile::tempdir().unwrap();

    let first = script_plugin_def(first_dir.path(), "first-plugin", FIRST_EMITS_DONE);
    let second = script_plugin_def(second_dir.path(), "second-plugin", OK_RESPONSE);
    let registry = Registry::from_plugins(vec![first, second]);

    let pipeline = two_hop_pipeline("fan-out", "first-plugin", "second-plugin");
    let harness = TestEngine::build(registry, vec![pipeline], TestTuning::fast());

    let trigger = harness.engine.trigger_pipeline("fan-out", serde_json::json!({})).await.unwrap();
    drain(&harness.engine, 20).await;

    let root = harness.engine.get_job(&trigger.root_job_id).await.unwrap().expect("root job exists");
    assert_eq!(root.plugin, "first-plugin");
    assert_eq!(root.status, JobStatus::Succeeded);

    let children = harness
        .engine
        .list_jobs(ductile_engine::JobFilter {
            plugin: Some("second-plugin".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(children.len(), 1, "the second step must have been routed to exactly once");
    let second_job = &children[0];
    assert_eq!(second_job.status, JobStatus::Succeeded);
    assert_eq!(second_job.parent_job_id.as_ref(), Some(&root.id));
}

#[tokio::test]
async fn a_step_that_emits_no_matching_event_never_routes_downstream() {
    let first_dir = tempfile::tempdir().unwrap();
    let second_dir = tempfile::tempdir().unwrap();

    let first = script_plugin_def(first_dir.path(), "first-plugin", OK_RESPONSE);
    let second = script_plugin_def(second_dir.path(), "second-plugin", OK_RESPONSE);
    let registry = Registry::from_plugins(vec![first, second]);

    let pipeline = two_hop_pipeline("fan-out-silent", "first-plugin", "second-plugin");
    let harness = TestEngine::build(registry, vec![pipeline], TestTuning::fast());

    let trigger = harness.engine.trigger_pipeline("fan-out-silent", serde_json::json!({})).await.unwrap();
    drain(&harness.engine, 20).await;

    let root = harness.engine.get_job(&trigger.root_job_id).await.unwrap().expect("root job exists");
    assert_eq!(root.status, JobStatus::Succeeded);

    let children = harness
        .engine
        .list_jobs(ductile_engine::JobFilter {
            plugin: Some("second-plugin".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(children.is_empty(), "no event means no fan-out, even with a compiled next step");
}
