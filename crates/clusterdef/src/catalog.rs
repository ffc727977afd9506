//! Cluster definition catalog
//!
//! Maps cluster names to definition files found on the cluster path. A file
//! named `<cluster>.yaml` (or `.yml`, `.json`) defines `<cluster>`; when two
//! directories hold the same name, the earlier directory wins.

use crate::definition::ClusterDefinition;
use clusterdef_types::{ClusterError, Result};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Extensions recognised as definition files
pub const DEFINITION_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

/// Lazily scanned, cached index of definition files
#[derive(Debug)]
pub struct ClusterCatalog {
    cluster_path: Vec<PathBuf>,
    filenames: RwLock<Option<BTreeMap<String, PathBuf>>>,
}

impl ClusterCatalog {
    pub fn new(cluster_path: Vec<PathBuf>) -> Self {
        Self {
            cluster_path,
            filenames: RwLock::new(None),
        }
    }

    pub fn cluster_path(&self) -> &[PathBuf] {
        &self.cluster_path
    }

    /// Cluster name to definition file, scanning on first use
    pub fn filenames(&self) -> Result<BTreeMap<String, PathBuf>> {
        if let Some(cached) = self.filenames.read().as_ref() {
            return Ok(cached.clone());
        }

        let mut guard = self.filenames.write();
        if let Some(cached) = guard.as_ref() {
            return Ok(cached.clone());
        }
        let scanned = self.scan()?;
        *guard = Some(scanned.clone());
        Ok(scanned)
    }

    fn scan(&self) -> Result<BTreeMap<String, PathBuf>> {
        let mut found = BTreeMap::new();
        for dir in &self.cluster_path {
            if !dir.is_dir() {
                warn!(dir = %dir.display(), "Cluster path entry is not a directory, skipping");
                continue;
            }
            let mut files: Vec<PathBuf> = fs::read_dir(dir)
                .map_err(|e| ClusterError::io(dir, e))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| path.is_file() && is_definition_file(path))
                .collect();
            files.sort();

            for path in files {
                let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                found.entry(name.to_string()).or_insert(path);
            }
        }
        debug!(count = found.len(), "Scanned cluster path");
        Ok(found)
    }

    /// Definition file for `name`
    pub fn locate(&self, name: &str) -> Result<PathBuf> {
        self.filenames()?
            .remove(name)
            .ok_or_else(|| ClusterError::ClusterNotFound {
                name: name.to_string(),
                searched: self.cluster_path.clone(),
            })
    }

    /// Every cluster name on the path, sorted
    pub fn names(&self) -> Result<Vec<String>> {
        Ok(self.filenames()?.into_keys().collect())
    }

    /// Forget the scanned filenames; the next lookup rescans.
    pub fn invalidate(&self) {
        *self.filenames.write() = None;
    }

    /// Write `definition` as YAML into the first cluster path directory.
    ///
    /// Refuses to replace an existing definition of the same name unless
    /// `overwrite` is set.
    pub fn write_definition(
        &self,
        definition: &ClusterDefinition,
        overwrite: bool,
    ) -> Result<PathBuf> {
        let dir = self
            .cluster_path
            .first()
            .ok_or_else(|| {
                ClusterError::configuration("cluster_path", "no directory to write definitions to")
            })?;

        let path = dir.join(format!("{}.yaml", definition.name));
        if let Ok(existing) = self.locate(&definition.name) {
            if !overwrite {
                return Err(ClusterError::ClusterExists {
                    name: definition.name.clone(),
                    path: existing,
                });
            }
            // a same-named .json or .yml in this directory would shadow the new file
            if existing != path && existing.parent() == Some(dir.as_path()) {
                fs::remove_file(&existing).map_err(|e| ClusterError::io(&existing, e))?;
            }
        }

        fs::create_dir_all(dir).map_err(|e| ClusterError::io(dir, e))?;
        let text = serde_yaml::to_string(definition).map_err(|e| ClusterError::Definition {
            path: path.clone(),
            message: e.to_string(),
        })?;
        fs::write(&path, text).map_err(|e| ClusterError::io(&path, e))?;
        self.invalidate();

        info!(cluster = %definition.name, path = %path.display(), "Wrote cluster definition");
        Ok(path)
    }
}

fn is_definition_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| DEFINITION_EXTENSIONS.contains(&ext))
}
