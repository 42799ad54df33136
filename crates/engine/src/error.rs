// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine runtime.

use ductile_core::BaggageOverflow;
use ductile_pipeline::CompileError;
use ductile_registry::RegistryError;
use ductile_storage::{CheckpointError, LockError, NetworkFilesystemError, SnapshotError, WalError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("wal error: {0}")]
    Wal(#[from] WalError),
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
    #[error("instance lock error: {0}")]
    Lock(#[from] LockError),
    #[error("network filesystem error: {0}")]
    NetworkFilesystem(#[from] NetworkFilesystemError),
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("pipeline compile error: {0}")]
    Compile(#[from] CompileError),
    #[error("baggage overflow: {0}")]
    Baggage(#[from] BaggageOverflow),
    #[error("plugin not found: {0}")]
    PluginNotFound(String),
    #[error("pipeline not found: {0}")]
    PipelineNotFound(String),
    #[error("job not found: {0}")]
    JobNotFound(String),
    #[error("context row not found: {0}")]
    ContextNotFound(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("workspace error: {0}")]
    Workspace(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
