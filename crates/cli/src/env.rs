// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Config file path resolution, mirrored from `ductile-daemon::env` so the
//! CLI and the daemon agree on where to look by default.

use std::path::PathBuf;

pub fn config_path() -> PathBuf {
    std::env::var("DUCTILE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./ductile.toml"))
}
