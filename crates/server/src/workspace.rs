// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory reflection of the on-disk workspace config with atomic saves.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Directory roles, defaults, and the port nickname map.
///
/// Unknown keys round-trip through `extra` so configs written by newer
/// versions survive a save from this one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceConfig {
    pub build_output_dir: String,
    pub sketches_dir: String,
    pub data_dir: String,
    pub default_fqbn: String,
    #[serde(default = "default_baud")]
    pub default_baud: u32,
    #[serde(default)]
    pub additional_build_dirs: Vec<String>,
    #[serde(default)]
    pub port_nicknames: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_baud() -> u32 {
    115_200
}

impl WorkspaceConfig {
    /// Fresh config rooted under `root`, used when no file exists yet.
    pub fn defaults(root: &Path, fqbn: &str) -> Self {
        Self {
            build_output_dir: root.join("builds").to_string_lossy().into_owned(),
            sketches_dir: root.join("sketches").to_string_lossy().into_owned(),
            data_dir: root.join("data").to_string_lossy().into_owned(),
            default_fqbn: fqbn.to_owned(),
            default_baud: default_baud(),
            additional_build_dirs: Vec::new(),
            port_nicknames: BTreeMap::new(),
            extra: serde_json::Map::new(),
        }
    }
}

/// Single authoritative in-memory copy of the workspace config.
///
/// Writes go through an atomic save: serialize to a temp file in the same
/// directory, then rename over the target.
pub struct WorkspaceService {
    path: PathBuf,
    current: RwLock<WorkspaceConfig>,
}

impl WorkspaceService {
    /// Load the config from `path`, recreating it with `defaults` when the
    /// file is absent or unreadable as JSON.
    pub fn load_or_default(path: PathBuf, defaults: WorkspaceConfig) -> std::io::Result<Self> {
        let config = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<WorkspaceConfig>(&contents) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(path = %path.display(), err = %e, "workspace config unreadable, recreating with defaults");
                    defaults
                }
            },
            Err(_) => defaults,
        };
        let service = Self { path, current: RwLock::new(config) };
        service.save()?;
        Ok(service)
    }

    /// Current config snapshot.
    pub fn snapshot(&self) -> WorkspaceConfig {
        self.current.read().clone()
    }

    pub fn default_baud(&self) -> u32 {
        self.current.read().default_baud
    }

    pub fn default_fqbn(&self) -> String {
        self.current.read().default_fqbn.clone()
    }

    pub fn build_output_dir(&self) -> PathBuf {
        PathBuf::from(&self.current.read().build_output_dir)
    }

    pub fn sketches_dir(&self) -> PathBuf {
        PathBuf::from(&self.current.read().sketches_dir)
    }

    /// Nickname for a port, if one is set.
    pub fn nickname(&self, port: &str) -> Option<String> {
        self.current.read().port_nicknames.get(port).cloned()
    }

    /// Current nickname map.
    pub fn nicknames(&self) -> BTreeMap<String, String> {
        self.current.read().port_nicknames.clone()
    }

    /// Set or clear (empty string) a port nickname and persist. Returns the
    /// updated map.
    pub fn set_nickname(
        &self,
        port: &str,
        nickname: &str,
    ) -> std::io::Result<BTreeMap<String, String>> {
        let map = {
            let mut current = self.current.write();
            if nickname.is_empty() {
                current.port_nicknames.remove(port);
            } else {
                current.port_nicknames.insert(port.to_owned(), nickname.to_owned());
            }
            current.port_nicknames.clone()
        };
        self.save()?;
        Ok(map)
    }

    /// Replace the whole config (used by tests and future config endpoints).
    pub fn replace(&self, config: WorkspaceConfig) -> std::io::Result<()> {
        *self.current.write() = config;
        self.save()
    }

    /// Atomic write-temp-then-rename save of the current config.
    fn save(&self) -> std::io::Result<()> {
        let snapshot = self.current.read().clone();
        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;
        let json = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(json.as_bytes())?;
        tmp.write_all(b"\n")?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
