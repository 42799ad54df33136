// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace data model.

use crate::JobId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Lifecycle status of a per-job workspace directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum WorkspaceStatus {
    /// Directory is being created or hardlink-cloned.
    Creating,
    /// Directory exists and is ready to be opened by a dispatch.
    Ready,
    /// Unlink in progress (retention pruner).
    Cleaning,
    /// Creation or cleanup failed.
    Failed { reason: String },
}

impl std::fmt::Display for WorkspaceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkspaceStatus::Creating => write!(f, "creating"),
            WorkspaceStatus::Ready => write!(f, "ready"),
            WorkspaceStatus::Cleaning => write!(f, "cleaning"),
            WorkspaceStatus::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// A workspace record as persisted in `MaterializedState`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: crate::WorkspaceId,
    pub path: PathBuf,
    pub status: WorkspaceStatus,
    /// The root ancestor job that owns this workspace until retention.
    pub owner_job_id: JobId,
    /// Jobs that hold a reference (clone) into this workspace's lineage.
    #[serde(default)]
    pub referenced_by: Vec<JobId>,
    pub created_at_ms: u64,
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
