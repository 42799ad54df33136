// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Create/Clone/Open/Cleanup for per-job workspace directories, built in
//! a plain directory-preparation style: `std::fs` calls with `tracing` on
//! each step, no agent-settings-injection logic.

use ductile_core::JobId;
use std::fs;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn io_err(path: &Path, source: std::io::Error) -> WorkspaceError {
    WorkspaceError::Io {
        path: path.to_path_buf(),
        source,
    }
}

pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Absolute path a job's workspace would live at, whether or not it
    /// has been created yet.
    pub fn open(&self, job_id: &JobId) -> PathBuf {
        self.root.join(job_id.as_str())
    }

    /// Create(job_id): an empty directory unique to the job.
    pub fn create(&self, job_id: &JobId) -> Result<PathBuf, WorkspaceError> {
        let path = self.open(job_id);
        fs::create_dir_all(&path).map_err(|e| io_err(&path, e))?;
        tracing::debug!(job_id = %job_id, path = %path.display(), "workspace created");
        Ok(path)
    }

    /// Clone(parent_job_id, child_job_id): hardlink every regular file from
    /// the parent's workspace into the child's, mirroring directories and
    /// recreating symlinks — never a byte copy.
    pub fn clone_from(&self, parent_job_id: &JobId, child_job_id: &JobId) -> Result<PathBuf, WorkspaceError> {
        let parent_path = self.open(parent_job_id);
        let child_path = self.open(child_job_id);
        fs::create_dir_all(&child_path).map_err(|e| io_err(&child_path, e))?;
        if parent_path.exists() {
            clone_dir_recursive(&parent_path, &child_path)?;
        }
        tracing::debug!(
            parent = %parent_job_id,
            child = %child_job_id,
            path = %child_path.display(),
            "workspace cloned by hardlink"
        );
        Ok(child_path)
    }

    /// Cleanup(job_id): unlink the directory. Safe to call on a
    /// already-removed or never-created workspace.
    pub fn cleanup(&self, job_id: &JobId) -> Result<(), WorkspaceError> {
        let path = self.open(job_id);
        match fs::remove_dir_all(&path) {
            Ok(()) => {
                tracing::info!(job_id = %job_id, path = %path.display(), "workspace removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(&path, e)),
        }
    }
}

fn clone_dir_recursive(src: &Path, dst: &Path) -> Result<(), WorkspaceError> {
    for entry in fs::read_dir(src).map_err(|e| io_err(src, e))? {
        let entry = entry.map_err(|e| io_err(src, e))?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        let meta = fs::symlink_metadata(&src_path).map_err(|e| io_err(&src_path, e))?;

        if meta.is_dir() {
            fs::create_dir_all(&dst_path).map_err(|e| io_err(&dst_path, e))?;
            clone_dir_recursive(&src_path, &dst_path)?;
        } else if meta.file_type().is_symlink() {
            let target = fs::read_link(&src_path).map_err(|e| io_err(&src_path, e))?;
            symlink(&target, &dst_path).map_err(|e| io_err(&dst_path, e))?;
        } else {
            fs::hard_link(&src_path, &dst_path).map_err(|e| io_err(&dst_path, e))?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "workspace_manager_tests.rs"]
mod tests;
