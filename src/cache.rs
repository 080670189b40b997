//! Persistent record of the posts already commented on.
//!
//! A bounded FIFO set: once full, adding an id evicts the oldest one.
//! Hits never re-promote an entry. The set lives in memory and is only
//! written to disk by an explicit [`DedupCache::save`].

use std::collections::{HashSet, VecDeque};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode cache for {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("cache file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// On-disk layout of the cache file.
#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    capacity: usize,
    items: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DedupCache {
    path: PathBuf,
    capacity: usize,
    order: VecDeque<String>,
    members: HashSet<String>,
}

impl DedupCache {
    /// Create an empty cache backed by `path`. Nothing is read or written.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, capacity: usize) -> Self {
        assert!(capacity > 0, "cache capacity must be at least 1");
        Self {
            path: path.into(),
            capacity,
            order: VecDeque::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
        }
    }

    /// Load the cache from `path` if the file exists, else start empty.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Corrupt`] if the file exists but cannot be
    /// decoded. A corrupt cache is never silently replaced by an empty one.
    pub fn open(path: impl Into<PathBuf>, capacity: usize) -> Result<Self, CacheError> {
        let mut cache = Self::new(path, capacity);
        if cache.path.exists() {
            cache.load()?;
        } else {
            debug!(path = %cache.path.display(), "No cache file yet, starting empty");
        }
        Ok(cache)
    }

    /// Replace the in-memory state with the contents of the backing file.
    ///
    /// Entries beyond the capacity are dropped oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded.
    pub fn load(&mut self) -> Result<(), CacheError> {
        let bytes = std::fs::read(&self.path).map_err(|source| CacheError::Io {
            path: self.path.clone(),
            source,
        })?;
        let file: CacheFile =
            serde_json::from_slice(&bytes).map_err(|source| CacheError::Corrupt {
                path: self.path.clone(),
                source,
            })?;

        self.order.clear();
        self.members.clear();
        for item in file.items {
            self.add(item);
        }

        debug!(
            path = %self.path.display(),
            entries = self.order.len(),
            "Loaded dedup cache"
        );
        Ok(())
    }

    /// Write the cache to its backing file.
    ///
    /// The data goes to a temporary file in the same directory which is then
    /// renamed over the old file, so a crash never leaves a half-written cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or renamed.
    pub fn save(&self) -> Result<(), CacheError> {
        let io_err = |source| CacheError::Io {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(io_err)?;

        let file = CacheFile {
            capacity: self.capacity,
            items: self.order.iter().cloned().collect(),
        };
        let json = serde_json::to_vec(&file).map_err(|source| CacheError::Encode {
            path: self.path.clone(),
            source,
        })?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(&json).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;

        debug!(
            path = %self.path.display(),
            entries = self.order.len(),
            "Saved dedup cache"
        );
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.members.contains(id)
    }

    /// Record `id`, evicting the oldest entry if the cache is full.
    ///
    /// Adding an id that is already present changes nothing.
    pub fn add(&mut self, id: impl Into<String>) {
        let id = id.into();
        if self.members.contains(&id) {
            return;
        }
        if self.order.len() == self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.members.remove(&evicted);
            }
        }
        self.members.insert(id.clone());
        self.order.push_back(id);
    }

    /// Ids in insertion order, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
