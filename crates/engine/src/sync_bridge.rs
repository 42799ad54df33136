// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded, tree-terminal waiting for `execution_mode = synchronous`
//! pipeline triggers. Built on a wake-notification shape — a channel that
//! wakes a waiter instead of having it poll — retargeted from "wake the
//! engine loop on a new WAL entry" to "wake an API caller once its whole
//! job tree has gone terminal."

use crate::error::EngineError;
use crate::store::Store;
use ductile_storage::MaterializedState;
use ductile_core::{Job, JobId, JobStatus};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Semaphore};

/// One node of an aggregated sync-wait result.
#[derive(Debug, Clone, Serialize)]
pub struct TreeNode {
    pub job_id: JobId,
    pub plugin: String,
    pub command: String,
    pub status: JobStatus,
    pub stdout_excerpt: Option<String>,
    pub state_updates: Option<serde_json::Value>,
}

/// Aggregated result for a watched root's whole descendant closure.
#[derive(Debug, Clone, Serialize)]
pub struct SyncResult {
    pub root_job_id: JobId,
    pub nodes: Vec<TreeNode>,
}

#[derive(Debug, Clone)]
pub enum SyncOutcome {
    /// The entire descendant closure reached a terminal state.
    Completed(SyncResult),
    /// The wait's timeout elapsed first; the jobs keep running.
    TimedOut(SyncResult),
}

fn node_of(job: &Job) -> TreeNode {
    TreeNode {
        job_id: job.id.clone(),
        plugin: job.plugin.clone(),
        command: job.command.clone(),
        status: job.status,
        stdout_excerpt: job.stdout.clone(),
        state_updates: job.result.as_ref().and_then(|r| r.get("state_updates").cloned()),
    }
}

/// Every job reachable from `root` by following `parent_job_id`, `root`
/// included.
fn descendant_closure(state: &MaterializedState, root: &JobId) -> Vec<Job> {
    let mut result = Vec::new();
    let mut seen = HashSet::new();
    let mut frontier = vec![root.clone()];
    while let Some(id) = frontier.pop() {
        if !seen.insert(id.clone()) {
            continue;
        }
        if let Some(job) = state.jobs.get(id.as_str()) {
            result.push(job.clone());
            for candidate in state.jobs.values() {
                if candidate.parent_job_id.as_ref() == Some(&id) {
                    frontier.push(candidate.id.clone());
                }
            }
        }
    }
    result
}

pub struct SyncBridge {
    store: Arc<Store>,
    watchers: Mutex<HashMap<JobId, Vec<oneshot::Sender<SyncResult>>>>,
    semaphore: Arc<Semaphore>,
    default_timeout: Duration,
    max_timeout: Duration,
}

impl SyncBridge {
    pub fn new(store: Arc<Store>, max_concurrent_waits: usize, default_timeout: Duration, max_timeout: Duration) -> Self {
        Self {
            store,
            watchers: Mutex::new(HashMap::new()),
            semaphore: Arc::new(Semaphore::new(max_concurrent_waits)),
            default_timeout,
            max_timeout,
        }
    }

    fn aggregate(&self, root: &JobId) -> SyncResult {
        let state = self.store.read();
        SyncResult {
            root_job_id: root.clone(),
            nodes: descendant_closure(&state, root).iter().map(node_of).collect(),
        }
    }

    fn is_tree_terminal(&self, root: &JobId) -> bool {
        let state = self.store.read();
        let closure = descendant_closure(&state, root);
        !closure.is_empty() && closure.iter().all(|j| j.is_terminal())
    }

    /// Register a watch on `root` and wait up to `timeout` (capped at
    /// `max_timeout`, defaulting to `default_timeout`) for its whole
    /// descendant closure to reach a terminal state. A global semaphore
    /// caps how many of these waits may be outstanding at once.
    pub async fn wait_for_tree(&self, root: JobId, timeout: Option<Duration>) -> Result<SyncOutcome, EngineError> {
        let _permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| EngineError::Protocol("sync bridge is shutting down".to_string()))?;

        if self.is_tree_terminal(&root) {
            return Ok(SyncOutcome::Completed(self.aggregate(&root)));
        }

        let requested = timeout.unwrap_or(self.default_timeout).min(self.max_timeout);
        let (tx, rx) = oneshot::channel();
        self.watchers.lock().entry(root.clone()).or_default().push(tx);

        match tokio::time::timeout(requested, rx).await {
            Ok(Ok(result)) => Ok(SyncOutcome::Completed(result)),
            Ok(Err(_canceled)) => Err(EngineError::Protocol("sync watcher dropped before completion".to_string())),
            Err(_elapsed) => {
                if let Some(senders) = self.watchers.lock().get_mut(&root) {
                    senders.retain(|_| false);
                }
                Ok(SyncOutcome::TimedOut(self.aggregate(&root)))
            }
        }
    }

    /// Called after every terminal job completion; fulfills any watcher
    /// whose whole tree has now gone terminal by checking whether the
    /// completing job belongs to a watched tree.
    pub fn notify_completed(&self) {
        let ready: Vec<JobId> = {
            let watchers = self.watchers.lock();
            watchers.keys().filter(|root| self.is_tree_terminal(root)).cloned().collect()
        };
        for root in ready {
            let senders = self.watchers.lock().remove(&root);
            if let Some(senders) = senders {
                let result = self.aggregate(&root);
                for tx in senders {
                    let _ = tx.send(result.clone());
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "sync_bridge_tests.rs"]
mod tests;
