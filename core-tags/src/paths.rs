//! Case-insensitive path resolution.
//!
//! Playlists and libraries exported from other systems often reference files
//! with the wrong letter case. [`PathLookup`] maps case-folded paths to the
//! real paths of one directory snapshot. It is built per request and passed
//! explicitly; nothing is cached between requests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Result, TagError};
use crate::tag_map::spec_for_path;

#[derive(Debug, Clone, Default)]
pub struct PathLookup {
    by_folded: HashMap<String, PathBuf>,
}

impl PathLookup {
    /// Snapshot every file below `root`.
    pub fn scan(root: &Path) -> Result<Self> {
        let mut paths = Vec::new();
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = entry.map_err(|e| TagError::Io(e.into()))?;
            if entry.file_type().is_file() {
                paths.push(entry.into_path());
            }
        }
        debug!(root = %root.display(), files = paths.len(), "Path snapshot built");
        Ok(Self::from_paths(paths))
    }

    pub fn from_paths<I>(paths: I) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        Self {
            by_folded: paths
                .into_iter()
                .map(|path| (fold(&path), path))
                .collect(),
        }
    }

    /// Real path matching `path` ignoring case and separator style.
    pub fn resolve(&self, path: &Path) -> Option<&Path> {
        self.by_folded.get(&fold(path)).map(PathBuf::as_path)
    }

    /// Snapshot paths with a supported audio extension, sorted.
    pub fn audio_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .by_folded
            .values()
            .filter(|path| spec_for_path(path).is_ok())
            .cloned()
            .collect();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.by_folded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_folded.is_empty()
    }
}

fn fold(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/").to_lowercase()
}
