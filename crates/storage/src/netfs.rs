// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Network-filesystem rejection: the durable store requires local-disk
//! locking semantics, so startup must fail fast if `state_dir` resolves
//! onto NFS or a similar network mount rather than silently corrupting
//! state under concurrent access from another host.

use nix::sys::statfs::{statfs, FsType, CIFS_MAGIC_NUMBER, NFS_SUPER_MAGIC, SMB_SUPER_MAGIC};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkFilesystemError {
    #[error("failed to stat filesystem at {0}: {1}")]
    StatFailed(std::path::PathBuf, nix::Error),
    #[error("state directory {path} resolves onto a network filesystem ({fs_type:?}); local disk is required")]
    NetworkFilesystem {
        path: std::path::PathBuf,
        fs_type: FsType,
    },
}

fn is_network_fs(fs_type: FsType) -> bool {
    fs_type == NFS_SUPER_MAGIC || fs_type == CIFS_MAGIC_NUMBER || fs_type == SMB_SUPER_MAGIC
}

/// Reject `path` if it resolves onto a known network filesystem type.
///
/// Creates `path` first if it doesn't exist, since `statfs` needs a real
/// inode to resolve.
pub fn reject_network_filesystem(path: &Path) -> Result<(), NetworkFilesystemError> {
    std::fs::create_dir_all(path)
        .map_err(|_| NetworkFilesystemError::StatFailed(path.to_path_buf(), nix::Error::EIO))?;

    let stat = statfs(path).map_err(|e| NetworkFilesystemError::StatFailed(path.to_path_buf(), e))?;
    let fs_type = stat.filesystem_type();

    if is_network_fs(fs_type) {
        return Err(NetworkFilesystemError::NetworkFilesystem {
            path: path.to_path_buf(),
            fs_type,
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "netfs_tests.rs"]
mod tests;
