//! Compiled-style cache and persistence.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::assets::write_atomic;

/// One compiled style, keyed by the identity of its source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleCacheEntry {
    /// Component file path, `inline:<hash>` for raw fragments, or `site`.
    pub source_key: String,
    pub compiled_css: String,
    /// Hash of prelude, style text and mode at compile time.
    pub checksum: String,
}

/// A thread-safe cache of compiled styles with optional JSON persistence.
///
/// Concurrent writers are last-writer-wins. Each persist writes the whole
/// map to a fresh temporary file and renames it over the previous one.
#[derive(Debug, Clone, Default)]
pub struct StyleCache {
    inner: Arc<DashMap<String, StyleCacheEntry>>,
    persistence_path: Option<PathBuf>,
}

impl StyleCache {
    /// Create an empty cache.
    pub fn new(persistence_path: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            persistence_path,
        }
    }

    /// Create a cache backed by `path`, loading it if present.
    ///
    /// An unreadable or corrupt file is logged and the cache starts empty;
    /// it is rewritten on the next insert.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cache = Self::new(Some(path.clone()));

        match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<Vec<StyleCacheEntry>>(&bytes) {
                Ok(entries) => {
                    for entry in entries {
                        cache.inner.insert(entry.source_key.clone(), entry);
                    }
                    tracing::info!(
                        path = %path.display(),
                        entries = cache.inner.len(),
                        "Loaded style cache"
                    );
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Ignoring corrupt style cache");
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cannot read style cache");
            }
        }

        cache
    }

    /// Compiled CSS for `source_key` if it was built from `checksum`.
    pub fn get_valid(&self, source_key: &str, checksum: &str) -> Option<String> {
        self.inner
            .get(source_key)
            .filter(|entry| entry.checksum == checksum)
            .map(|entry| entry.compiled_css.clone())
    }

    pub fn get(&self, source_key: &str) -> Option<StyleCacheEntry> {
        self.inner.get(source_key).map(|r| r.value().clone())
    }

    /// Store an entry, replacing any previous one, and persist.
    ///
    /// A failed persist is logged; the in-memory entry is kept.
    pub fn insert(&self, entry: StyleCacheEntry) {
        self.inner.insert(entry.source_key.clone(), entry);
        if let Err(e) = self.save_to_file() {
            tracing::warn!(error = %e, "Failed to persist style cache");
        }
    }

    /// Write the whole cache to its persistence file, if it has one.
    pub fn save_to_file(&self) -> io::Result<()> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };

        let mut entries: Vec<StyleCacheEntry> =
            self.inner.iter().map(|r| r.value().clone()).collect();
        entries.sort_by(|a, b| a.source_key.cmp(&b.source_key));

        let json = serde_json::to_vec_pretty(&entries)?;
        write_atomic(path, &json)
    }

    /// Drop every entry and delete the persistence file. Idempotent.
    pub fn purge(&self) -> io::Result<usize> {
        let removed = self.inner.len();
        self.inner.clear();
        if let Some(path) = &self.persistence_path {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(removed)
    }

    pub fn persistence_path(&self) -> Option<&Path> {
        self.persistence_path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
