// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Plugin discovery and manifest validation.
//!
//! Walks every configured plugin root at startup, parses each subdirectory's
//! manifest, and builds a read-only, immutable-after-load lookup table.

mod manifest;

pub use manifest::{load_manifest, ManifestError, MANIFEST_FILE_NAME};

use ductile_core::{CommandType, Plugin};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read plugin root {0}: {1}")]
    ReadRoot(PathBuf, std::io::Error),
    #[error("plugin manifest invalid: {0}")]
    Manifest(#[from] ManifestError),
    #[error("duplicate plugin name `{name}` found in {first} and {second}")]
    DuplicateName {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },
}

/// A read-only, immutable-after-load table of discovered plugins.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    plugins: HashMap<String, Plugin>,
}

impl Registry {
    /// Walk every root in order, loading each subdirectory's manifest.
    /// Duplicate plugin names across roots abort discovery.
    pub fn discover(roots: &[PathBuf]) -> Result<Self, RegistryError> {
        let mut plugins: HashMap<String, Plugin> = HashMap::new();

        for root in roots {
            let entries = std::fs::read_dir(root)
                .map_err(|e| RegistryError::ReadRoot(root.clone(), e))?;
            for entry in entries {
                let entry = entry.map_err(|e| RegistryError::ReadRoot(root.clone(), e))?;
                let path = entry.path();
                if !path.is_dir() {
                    continue;
                }
                if !path.join(MANIFEST_FILE_NAME).exists() {
                    continue;
                }
                let plugin = load_manifest(&path)?;
                if let Some(existing) = plugins.get(&plugin.name) {
                    return Err(RegistryError::DuplicateName {
                        name: plugin.name,
                        first: existing.root_dir.clone(),
                        second: path,
                    });
                }
                info!(plugin = %plugin.name, root = %path.display(), "discovered plugin");
                plugins.insert(plugin.name.clone(), plugin);
            }
        }

        if plugins.is_empty() {
            warn!("plugin registry discovered zero plugins across {} root(s)", roots.len());
        }

        Ok(Self { plugins })
    }

    /// Build a registry directly from already-loaded plugins (tests, or a
    /// caller that discovers manifests some other way).
    pub fn from_plugins(plugins: impl IntoIterator<Item = Plugin>) -> Self {
        Self {
            plugins: plugins.into_iter().map(|p| (p.name.clone(), p)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Plugin> {
        self.plugins.get(name)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Plugin> {
        self.plugins.values()
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.keys().map(|s| s.as_str()).collect()
    }

    /// Commands of `kind` for `plugin`, for read/read-write scope expansion.
    pub fn commands_of_type(&self, plugin: &str, kind: CommandType) -> Vec<&str> {
        self.plugins
            .get(plugin)
            .map(|p| p.commands_of_type(kind))
            .unwrap_or_default()
    }
}

/// Helper used by config loading: split a `plugin_roots` config list into
/// canonical absolute paths before passing to [`Registry::discover`].
pub fn canonicalize_roots(roots: &[impl AsRef<Path>]) -> std::io::Result<Vec<PathBuf>> {
    roots.iter().map(|r| std::fs::canonicalize(r)).collect()
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
