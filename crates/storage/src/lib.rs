// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Durable storage for Ductile: write-ahead log, materialized state,
//! snapshot/checkpoint persistence, schema migration, and the instance
//! lock and network-filesystem guard that gate daemon startup.

mod checkpoint;
mod lock;
mod migration;
mod netfs;
mod snapshot;
mod state;
mod wal;

/// Current on-disk schema version for [`snapshot::Snapshot`]. Bump this and
/// register a [`migration::Migration`] whenever `MaterializedState`'s shape
/// changes incompatibly.
pub const CURRENT_SNAPSHOT_VERSION: u32 = 1;

pub(crate) fn current_snapshot_version() -> u32 {
    CURRENT_SNAPSHOT_VERSION
}

pub use checkpoint::{
    CheckpointError, CheckpointHandle, CheckpointResult, CheckpointWriter, Checkpointer,
    FsCheckpointWriter, load_snapshot,
};
pub use lock::{InstanceLock, LockError};
pub use migration::{Migration, MigrationError, MigrationRegistry};
pub use netfs::{NetworkFilesystemError, reject_network_filesystem};
pub use snapshot::{Snapshot, SnapshotError};
pub use state::{BreakerRecord, BreakerStatus, MaterializedState};
pub use wal::{Wal, WalEntry, WalError};
