//! Mod manifest parsing and directory scanning.
//!
//! Each mod lives in its own directory under the mods root and carries a
//! `mod.json` descriptor: id, dependency ids, capability flags, and the
//! path of the native module to load.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name of the per-mod descriptor.
pub const MANIFEST_FILE: &str = "mod.json";

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("manifest not found for mod '{0}'")]
    NotFound(String),

    #[error("failed to read manifest {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid manifest JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid manifest: {0}")]
    Invalid(String),
}

/// Static descriptor of one mod.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModManifest {
    /// Unique, stable mod identifier.
    pub id: String,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// Ids of mods that must be resident before this one loads.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Whether the mod supports the suspend/resume transitions.
    #[serde(default)]
    pub can_suspend: bool,
    /// Whether the mod supports being unloaded at runtime.
    #[serde(default)]
    pub can_unload: bool,
    /// Whether the runtime loads this mod automatically on attach.
    #[serde(default)]
    pub auto_load: bool,
    /// Path of the native module, relative to the mod directory.
    pub entry: PathBuf,
}

impl ModManifest {
    /// Load a manifest from a `mod.json` file. The `entry` path is
    /// resolved relative to the manifest's directory.
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|e| ManifestError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut manifest = Self::from_json(&content).map_err(|e| match e {
            ManifestError::Parse { source, .. } => ManifestError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        if manifest.entry.is_relative() {
            if let Some(dir) = path.parent() {
                manifest.entry = dir.join(&manifest.entry);
            }
        }
        Ok(manifest)
    }

    /// Parse a manifest from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ManifestError> {
        serde_json::from_str(json).map_err(|e| ManifestError::Parse {
            path: PathBuf::new(),
            source: e,
        })
    }

    /// Validate manifest invariants: non-empty id, no self-dependency.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.id.is_empty() {
            return Err(ManifestError::Invalid("id cannot be empty".into()));
        }
        if self.dependencies.iter().any(|d| d == &self.id) {
            return Err(ManifestError::Invalid(format!(
                "mod '{}' depends on itself",
                self.id
            )));
        }
        Ok(())
    }
}

/// Reads mod manifests from a directory of mod subdirectories.
///
/// The store is stateless: every call re-scans the backing directory, so
/// manifests added or edited between requests are picked up without a
/// restart.
pub struct ManifestStore {
    root: PathBuf,
}

impl ManifestStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scan the mods root and return all valid manifests in discovery
    /// order (directory entries sorted by file name, for determinism).
    ///
    /// Unreadable or invalid manifests are skipped with a warning; a
    /// broken mod directory must not take down the whole scan.
    pub fn list(&self) -> Vec<ModManifest> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(root = %self.root.display(), error = %e, "mods root not readable");
                return Vec::new();
            }
        };

        let mut dirs: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();

        let mut manifests = Vec::new();
        for dir in dirs {
            let manifest_path = dir.join(MANIFEST_FILE);
            if !manifest_path.is_file() {
                continue;
            }
            match ModManifest::from_file(&manifest_path).and_then(|m| {
                m.validate()?;
                Ok(m)
            }) {
                Ok(manifest) => manifests.push(manifest),
                Err(e) => {
                    tracing::warn!(path = %manifest_path.display(), error = %e, "skipping invalid manifest");
                }
            }
        }
        manifests
    }

    /// Fetch a single manifest by id.
    pub fn get(&self, id: &str) -> Result<ModManifest, ManifestError> {
        self.list()
            .into_iter()
            .find(|m| m.id == id)
            .ok_or_else(|| ManifestError::NotFound(id.to_string()))
    }
}
