// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Durable Store as the engine sees it: a single writer applying
//! `Event`s to the WAL and folding them into an in-memory
//! `MaterializedState` guarded by a `parking_lot::RwLock` — single writer,
//! concurrent readers.
//!
//! Built on a WAL-backed send + wake-notify shape, specialized here to
//! apply synchronously: the dispatcher is itself the single serial
//! consumer, so there is no separate reader task to notify — `apply`
//! appends, flushes, and folds in one call before returning to the caller.

use crate::error::EngineError;
use ductile_core::Event;
use ductile_storage::{load_snapshot, CheckpointResult, Checkpointer, MaterializedState, Wal};
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use std::path::{Path, PathBuf};

pub struct Store {
    wal: Mutex<Wal>,
    state: RwLock<MaterializedState>,
    checkpointer: Checkpointer,
}

impl Store {
    /// Open (or initialize) the store at `state_dir`: load the latest
    /// snapshot if present, open the WAL at the snapshot's processed
    /// sequence, and replay any entries written after it.
    pub fn open(state_dir: &Path) -> Result<Self, EngineError> {
        ductile_storage::reject_network_filesystem(state_dir)?;

        let snapshot_path = state_dir.join("snapshot.zst");
        let wal_path = state_dir.join("wal.jsonl");

        let (mut state, seq) = match load_snapshot(&snapshot_path)? {
            Some(snapshot) => (snapshot.state, snapshot.seq),
            None => (MaterializedState::default(), 0),
        };

        let mut wal = Wal::open(&wal_path, seq)?;
        while let Some(entry) = wal.next_unprocessed()? {
            state.apply_event(&entry.event);
            wal.mark_processed(entry.seq);
        }

        Ok(Self {
            wal: Mutex::new(wal),
            state: RwLock::new(state),
            checkpointer: Checkpointer::new(snapshot_path),
        })
    }

    /// Append `event` to the WAL, flush it durably, and fold it into the
    /// materialized state. Returns the assigned sequence number.
    pub fn apply(&self, event: Event) -> Result<u64, EngineError> {
        let seq = {
            let mut wal = self.wal.lock();
            let seq = wal.append(&event)?;
            wal.flush()?;
            seq
        };
        self.state.write().apply_event(&event);
        Ok(seq)
    }

    pub fn read(&self) -> RwLockReadGuard<'_, MaterializedState> {
        self.state.read()
    }

    /// Synchronous checkpoint, used at shutdown and on the pruner tick.
    pub fn checkpoint_sync(&self) -> Result<CheckpointResult, EngineError> {
        let seq = self.wal.lock().processed_seq();
        let state = self.state.read().clone();
        Ok(self.checkpointer.checkpoint_sync(seq, &state)?)
    }

    /// Reclaim WAL disk space after a checkpoint is durable.
    pub fn truncate_wal(&self, seq: u64) -> Result<(), EngineError> {
        self.wal.lock().truncate_before(seq)?;
        Ok(())
    }
}

pub fn default_paths(state_dir: &Path) -> (PathBuf, PathBuf) {
    (state_dir.join("snapshot.zst"), state_dir.join("wal.jsonl"))
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
