// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plugin manifest parsing and validation.

use ductile_core::{CommandDef, CommandType, Plugin};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const MANIFEST_FILE_NAME: &str = "plugin.yaml";

const SUPPORTED_PROTOCOL: u32 = 2;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("{path}: failed to read manifest: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: invalid YAML: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("{path}: unsupported protocol {found} (only {SUPPORTED_PROTOCOL} is accepted)")]
    UnsupportedProtocol { path: PathBuf, found: u32 },
    #[error("{path}: entrypoint `{entrypoint}` escapes the plugin directory")]
    EntrypointEscapes { path: PathBuf, entrypoint: String },
    #[error("{path}: entrypoint `{entrypoint}` does not exist")]
    EntrypointMissing { path: PathBuf, entrypoint: String },
    #[error("{path}: entrypoint `{entrypoint}` is not executable")]
    EntrypointNotExecutable { path: PathBuf, entrypoint: String },
    #[error("{path}: plugin directory is world-writable")]
    DirectoryWorldWritable { path: PathBuf },
    #[error("{path}: failed to stat `{target}`: {source}")]
    Stat {
        path: PathBuf,
        target: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Raw manifest shape as written in YAML; either form of `commands` is
/// accepted — a bare list or structured entries.
#[derive(Debug, Deserialize)]
struct ManifestFile {
    name: String,
    protocol: u32,
    entrypoint: String,
    #[serde(default, deserialize_with = "deserialize_commands")]
    commands: BTreeMap<String, CommandDef>,
    #[serde(default)]
    required_config: Vec<String>,
    #[serde(default)]
    optional_config: Vec<String>,
    #[serde(default)]
    schedule: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawCommands {
    Bare(Vec<String>),
    Structured(BTreeMap<String, RawCommandDef>),
}

#[derive(Debug, Default, Deserialize)]
struct RawCommandDef {
    #[serde(default, rename = "type")]
    kind: Option<CommandType>,
    #[serde(default)]
    input_schema: Option<serde_json::Value>,
    #[serde(default)]
    output_schema: Option<serde_json::Value>,
}

fn deserialize_commands<'de, D>(d: D) -> Result<BTreeMap<String, CommandDef>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = RawCommands::deserialize(d)?;
    Ok(match raw {
        RawCommands::Bare(names) => names
            .into_iter()
            .map(|name| (name, CommandDef {
                kind: CommandType::Write,
                input_schema: None,
                output_schema: None,
            }))
            .collect(),
        RawCommands::Structured(map) => map
            .into_iter()
            .map(|(name, raw)| {
                (
                    name,
                    CommandDef {
                        kind: raw.kind.unwrap_or_default(),
                        input_schema: raw.input_schema,
                        output_schema: raw.output_schema,
                    },
                )
            })
            .collect(),
    })
}

/// Parse and validate the manifest in `dir` (a single plugin directory).
///
/// `dir` must be absolute (the registry canonicalizes plugin roots before
/// walking them) so `Plugin::root_dir` and `Plugin::entrypoint_path` compose
/// to an absolute, spawnable path.
pub fn load_manifest(dir: &Path) -> Result<Plugin, ManifestError> {
    let manifest_path = dir.join(MANIFEST_FILE_NAME);
    let raw = std::fs::read_to_string(&manifest_path).map_err(|source| ManifestError::Read {
        path: manifest_path.clone(),
        source,
    })?;
    let parsed: ManifestFile =
        serde_yaml::from_str(&raw).map_err(|source| ManifestError::Yaml {
            path: manifest_path.clone(),
            source,
        })?;

    if parsed.protocol != SUPPORTED_PROTOCOL {
        return Err(ManifestError::UnsupportedProtocol {
            path: manifest_path,
            found: parsed.protocol,
        });
    }

    let entrypoint = PathBuf::from(&parsed.entrypoint);
    validate_entrypoint_containment(&manifest_path, &parsed.entrypoint, &entrypoint)?;

    let entrypoint_abs = dir.join(&entrypoint);
    let meta = std::fs::metadata(&entrypoint_abs).map_err(|_| ManifestError::EntrypointMissing {
        path: manifest_path.clone(),
        entrypoint: parsed.entrypoint.clone(),
    })?;
    if meta.permissions().mode() & 0o111 == 0 {
        return Err(ManifestError::EntrypointNotExecutable {
            path: manifest_path,
            entrypoint: parsed.entrypoint,
        });
    }

    validate_directory_not_world_writable(&manifest_path, dir)?;

    Ok(Plugin {
        name: parsed.name,
        protocol: parsed.protocol,
        entrypoint,
        root_dir: dir.to_path_buf(),
        commands: parsed.commands,
        required_config: parsed.required_config,
        optional_config: parsed.optional_config,
        schedule: parsed.schedule,
    })
}

/// Reject entrypoints that escape the plugin directory via `..` or an
/// absolute path, without trusting the filesystem to exist yet (a purely
/// lexical check).
fn validate_entrypoint_containment(
    manifest_path: &Path,
    raw: &str,
    entrypoint: &Path,
) -> Result<(), ManifestError> {
    if entrypoint.is_absolute() || entrypoint.components().any(|c| c.as_os_str() == "..") {
        return Err(ManifestError::EntrypointEscapes {
            path: manifest_path.to_path_buf(),
            entrypoint: raw.to_string(),
        });
    }
    Ok(())
}

fn validate_directory_not_world_writable(
    manifest_path: &Path,
    dir: &Path,
) -> Result<(), ManifestError> {
    let meta = std::fs::metadata(dir).map_err(|source| ManifestError::Stat {
        path: manifest_path.to_path_buf(),
        target: dir.to_path_buf(),
        source,
    })?;
    if meta.permissions().mode() & 0o002 != 0 {
        return Err(ManifestError::DirectoryWorldWritable {
            path: manifest_path.to_path_buf(),
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
