// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-writer instance lock.
//!
//! Exactly one engine process may hold the state directory at a time. A
//! second process attempting to start against the same `state_dir` must
//! fail fast rather than corrupt the WAL with interleaved writes.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to acquire instance lock at {0}: another engine process is running")]
    AlreadyLocked(PathBuf),
}

/// An exclusive hold on `<state_dir>/ductile.lock`. Dropping it releases the
/// OS-level advisory lock; the file itself is left behind with the PID that
/// last held it.
pub struct InstanceLock {
    // Held only to keep the exclusive lock alive; released on drop.
    #[allow(dead_code)]
    file: File,
    path: PathBuf,
}

impl InstanceLock {
    /// Acquire the instance lock at `<state_dir>/ductile.lock`, creating the
    /// directory and file if needed.
    ///
    /// Opens with `truncate(false)` so a failed `try_lock_exclusive` never
    /// wipes the running process's recorded PID.
    pub fn acquire(state_dir: &Path) -> Result<Self, LockError> {
        std::fs::create_dir_all(state_dir)?;
        let path = state_dir.join("ductile.lock");

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        file.try_lock_exclusive()
            .map_err(|_| LockError::AlreadyLocked(path.clone()))?;

        let mut file = file;
        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;

        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
