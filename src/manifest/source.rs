//! Manifest sources.
//!
//! The auditor asks its source for a fresh snapshot on every event, so
//! edits to the manifest tree take effect without a restart.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::{Manifest, ManifestError};

/// Supplies the current set of promotion manifests.
pub trait ManifestSource: Send + Sync {
    fn fetch(&self) -> Result<Vec<Manifest>, ManifestError>;
}

/// Fixed in-memory manifests.
#[derive(Debug, Clone, Default)]
pub struct StaticManifestSource {
    manifests: Vec<Manifest>,
}

impl StaticManifestSource {
    pub fn new(manifests: Vec<Manifest>) -> Self {
        Self { manifests }
    }
}

impl ManifestSource for StaticManifestSource {
    fn fetch(&self) -> Result<Vec<Manifest>, ManifestError> {
        Ok(self.manifests.clone())
    }
}

/// Every `*.yaml`, `*.yml` and `*.json` file under a directory tree, one
/// manifest per file, visited in file-name order.
#[derive(Debug, Clone)]
pub struct DirectoryManifestSource {
    root: PathBuf,
}

impl DirectoryManifestSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn load_file(path: &Path) -> Result<Manifest, ManifestError> {
        let contents = fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut manifest: Manifest = if has_extension(path, &["json"]) {
            serde_json::from_str(&contents).map_err(|source| ManifestError::Json {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            serde_yaml::from_str(&contents).map_err(|source| ManifestError::Yaml {
                path: path.to_path_buf(),
                source,
            })?
        };

        manifest.origin = Some(path.to_path_buf());
        Ok(manifest)
    }
}

impl ManifestSource for DirectoryManifestSource {
    fn fetch(&self) -> Result<Vec<Manifest>, ManifestError> {
        if !self.root.exists() {
            return Err(ManifestError::NotFound(self.root.clone()));
        }

        if self.root.is_file() {
            return Ok(vec![Self::load_file(&self.root)?]);
        }

        let mut manifests = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() || !has_extension(entry.path(), &["yaml", "yml", "json"]) {
                continue;
            }
            manifests.push(Self::load_file(entry.path())?);
        }

        tracing::debug!(
            root = %self.root.display(),
            count = manifests.len(),
            "loaded promotion manifests"
        );
        Ok(manifests)
    }
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|x| e.eq_ignore_ascii_case(x)))
        .unwrap_or(false)
}
