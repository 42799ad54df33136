use super::*;

#[test]
fn terminal_statuses_are_classified_correctly() {
    assert!(!JobStatus::Queued.is_terminal());
    assert!(!JobStatus::Running.is_terminal());
    assert!(JobStatus::Succeeded.is_terminal());
    assert!(JobStatus::Failed.is_terminal());
    assert!(JobStatus::TimedOut.is_terminal());
    assert!(JobStatus::Dead.is_terminal());
}

#[test]
fn source_event_id_is_flat_and_stable() {
    let id = JobId::new("job-1");
    assert_eq!(source_event_id(&id, 0), "job-1#0");
    assert_eq!(source_event_id(&id, 1), "job-1#1");
}

#[test]
fn display_matches_serde_rename() {
    assert_eq!(JobStatus::TimedOut.to_string(), "timed_out");
}
