// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ductile_core::{Job, JobId, JobStatus};

fn sample_job(id: &str) -> Job {
    Job {
        id: JobId::new(id),
        plugin: "echo".into(),
        command: "poll".into(),
        status: JobStatus::Queued,
        attempt: 1,
        max_attempts: 3,
        payload: serde_json::json!({}),
        parent_job_id: None,
        source_event_id: None,
        event_context_id: None,
        dedupe_key: None,
        submitted_at_ms: 1,
        started_at_ms: None,
        completed_at_ms: None,
        next_retry_at_ms: None,
        submitted_by: "scheduler".into(),
        last_error: None,
        stderr: None,
        stdout: None,
        result: None,
        retryable: false,
    }
}

#[test]
fn open_on_empty_directory_starts_with_blank_state() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();
    assert!(store.read().jobs.is_empty());
}

#[test]
fn applied_events_are_immediately_visible_to_readers() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();
    let job = sample_job("job-1");
    store.apply(Event::JobEnqueued { job: Box::new(job) }).unwrap();
    assert_eq!(store.read().jobs.len(), 1);
    assert!(store.read().jobs.contains_key("job-1"));
}

#[test]
fn reopening_replays_applied_events_from_the_wal() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = Store::open(dir.path()).unwrap();
        store
            .apply(Event::JobEnqueued {
                job: Box::new(sample_job("job-1")),
            })
            .unwrap();
    }
    let reopened = Store::open(dir.path()).unwrap();
    assert_eq!(reopened.read().jobs.len(), 1);
}

#[test]
fn checkpoint_then_truncate_preserves_state_on_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();
    let seq = store
        .apply(Event::JobEnqueued {
            job: Box::new(sample_job("job-1")),
        })
        .unwrap();
    let result = store.checkpoint_sync().unwrap();
    store.truncate_wal(result.seq).unwrap();
    assert_eq!(result.seq, seq);

    let reopened = Store::open(dir.path()).unwrap();
    assert_eq!(reopened.read().jobs.len(), 1);
}
