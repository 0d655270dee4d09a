//! Explicit memoization of parsed source files.
//!
//! Entries are keyed by source path and validated against the file's
//! modification time. A stale or unreadable timestamp falls back to
//! recomputation; the cache is an optimization, never a correctness
//! requirement.

use crate::error::PipelineError;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

#[derive(Debug, Default)]
pub struct SourceCache<T> {
    entries: HashMap<PathBuf, (SystemTime, T)>,
}

impl<T: Clone> SourceCache<T> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Return the cached value for `path` if its modification time is
    /// unchanged, otherwise run `compute` and cache the result.
    pub fn get_or_insert_with<F>(&mut self, path: &Path, compute: F) -> Result<T, PipelineError>
    where
        F: FnOnce() -> Result<T, PipelineError>,
    {
        let mtime = fs::metadata(path).and_then(|m| m.modified()).ok();

        if let Some(mtime) = mtime {
            if let Some((cached_mtime, value)) = self.entries.get(path) {
                if *cached_mtime == mtime {
                    debug!("cache hit for {}", path.display());
                    return Ok(value.clone());
                }
                debug!("cache stale for {}", path.display());
            }
        }

        let value = compute()?;

        if let Some(mtime) = mtime {
            self.entries.insert(path.to_path_buf(), (mtime, value.clone()));
        }

        Ok(value)
    }

    /// Drop all cached entries, forcing the next load to reparse.
    #[allow(dead_code)] // Utility for long-lived callers
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[allow(dead_code)] // Utility for long-lived callers
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[allow(dead_code)] // Companion to len
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
