//! Caches filesystem modification times for the duration of a build so a
//! target with many shared inputs doesn't re-stat the same file repeatedly.
//! Mirrors `CachingMTimeRebuilder`'s disk-backed `DirtyCache` pattern: one
//! lookup per path, memoized for the cache's lifetime.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::UpToDateError;

/// A path's freshness-relevant metadata. Symlinks are read with `symlink_metadata`
/// so the link's own mtime is what gets cached, never the target's — a
/// changed symlink target does not by itself make an up-to-date check stale
/// unless the link itself was re-pointed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Missing,
    Present(SystemTime),
}

#[derive(Default)]
pub struct TimestampCache {
    cache: HashMap<PathBuf, Freshness>,
}

impl TimestampCache {
    pub fn new() -> Self {
        TimestampCache::default()
    }

    pub fn mtime(&mut self, path: &Path) -> Result<Freshness, UpToDateError> {
        if let Some(cached) = self.cache.get(path) {
            return Ok(*cached);
        }
        let freshness = match std::fs::symlink_metadata(path) {
            Ok(meta) => Freshness::Present(meta.modified().map_err(|source| UpToDateError::Io {
                path: path.display().to_string(),
                source,
            })?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Freshness::Missing,
            Err(source) => return Err(UpToDateError::Io { path: path.display().to_string(), source }),
        };
        self.cache.insert(path.to_path_buf(), freshness);
        Ok(freshness)
    }

    pub fn invalidate(&mut self, path: &Path) {
        self.cache.remove(path);
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}
