//! Manifest sources.
//!
//! A [`SourceProvider`] hands the type collection the text of every
//! manifest unit, plus a modification marker per unit. Comparing the
//! current markers against those recorded at load is how staleness is
//! detected.

use crate::error::SourceError;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use trellis_core::{Clock, Timestamp};

/// Extension of manifest files
pub const MANIFEST_EXTENSION: &str = "pp";

/// One manifest unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestSource {
    /// Unit name, used in locations
    pub name: String,
    /// Manifest text
    pub text: String,
    /// Modification marker
    pub marker: Timestamp,
}

impl ManifestSource {
    /// Create a source
    #[must_use]
    pub fn new(name: impl Into<String>, text: impl Into<String>, marker: Timestamp) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            marker,
        }
    }
}

/// Supplies manifest units to a type collection
pub trait SourceProvider: Send + Sync {
    /// Read every unit
    ///
    /// # Errors
    ///
    /// Returns error if a unit cannot be read
    fn load(&self) -> Result<Vec<ManifestSource>, SourceError>;

    /// Current marker of every unit, without reading the text
    ///
    /// # Errors
    ///
    /// Returns error if the units cannot be listed
    fn markers(&self) -> Result<IndexMap<String, Timestamp>, SourceError>;
}

/// In-process sources, marked with the time they were last written
///
/// Writes at the same clock reading still move the marker forward, so a
/// rewrite is always visible as a change.
pub struct MemorySources {
    clock: Arc<dyn Clock>,
    units: RwLock<IndexMap<String, ManifestSource>>,
}

impl MemorySources {
    /// Create an empty set of sources
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            units: RwLock::new(IndexMap::new()),
        }
    }

    /// Builder-style [`MemorySources::set`]
    #[must_use]
    pub fn with_source(self, name: &str, text: &str) -> Self {
        self.set(name, text);
        self
    }

    /// Add or replace a unit
    pub fn set(&self, name: &str, text: &str) {
        let mut units = self.units.write().unwrap_or_else(PoisonError::into_inner);
        let mut marker = self.clock.now();
        if let Some(previous) = units.get(name) {
            if marker <= previous.marker {
                marker = previous.marker.successor();
            }
        }
        units.insert(name.to_string(), ManifestSource::new(name, text, marker));
    }

    /// Remove a unit, returning whether it existed
    pub fn remove(&self, name: &str) -> bool {
        let mut units = self.units.write().unwrap_or_else(PoisonError::into_inner);
        units.shift_remove(name).is_some()
    }
}

impl SourceProvider for MemorySources {
    fn load(&self) -> Result<Vec<ManifestSource>, SourceError> {
        let units = self.units.read().unwrap_or_else(PoisonError::into_inner);
        Ok(units.values().cloned().collect())
    }

    fn markers(&self) -> Result<IndexMap<String, Timestamp>, SourceError> {
        let units = self.units.read().unwrap_or_else(PoisonError::into_inner);
        Ok(units
            .iter()
            .map(|(name, unit)| (name.clone(), unit.marker))
            .collect())
    }
}

/// Manifest files under a directory, marked with their mtime
///
/// Every `*.pp` file below the root is a unit, named by its path relative
/// to the root and visited in sorted path order.
#[derive(Debug, Clone)]
pub struct DirectorySources {
    root: PathBuf,
}

impl DirectorySources {
    /// Sources rooted at `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn files(&self) -> Result<Vec<PathBuf>, SourceError> {
        if !self.root.is_dir() {
            return Err(SourceError::MissingDirectory(self.root.clone()));
        }
        let mut files = Vec::new();
        collect_manifests(&self.root, &mut files)?;
        files.sort();
        Ok(files)
    }

    fn unit_name(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

fn collect_manifests(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), SourceError> {
    let io_err = |source: std::io::Error| SourceError::Io {
        path: dir.to_path_buf(),
        source,
    };
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_dir() {
            collect_manifests(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == MANIFEST_EXTENSION) {
            out.push(path);
        }
    }
    Ok(())
}

fn modified(path: &Path) -> Result<Timestamp, SourceError> {
    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map(Timestamp::from_system_time)
        .map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })
}

impl SourceProvider for DirectorySources {
    fn load(&self) -> Result<Vec<ManifestSource>, SourceError> {
        self.files()?
            .into_iter()
            .map(|path| -> Result<ManifestSource, SourceError> {
                let text = std::fs::read_to_string(&path).map_err(|source| SourceError::Io {
                    path: path.clone(),
                    source,
                })?;
                Ok(ManifestSource::new(self.unit_name(&path), text, modified(&path)?))
            })
            .collect()
    }

    fn markers(&self) -> Result<IndexMap<String, Timestamp>, SourceError> {
        self.files()?
            .into_iter()
            .map(|path| -> Result<(String, Timestamp), SourceError> {
                Ok((self.unit_name(&path), modified(&path)?))
            })
            .collect()
    }
}
