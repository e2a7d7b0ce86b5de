//! The digest-keyed namespace map.
//!
//! A flat table from path key to entry. No parent or child pointers exist;
//! hierarchy lives only in the path strings, and ancestor directories are
//! materialized by the dispatcher on create. The map is read-concurrent;
//! only the dispatcher thread mutates it.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use opal_digest::path_key;

use crate::entry::FileEntry;

pub(crate) struct Namespace {
    map: RwLock<HashMap<String, Arc<FileEntry>>>,
}

impl Namespace {
    /// Fresh namespace holding only the root directory.
    pub fn new() -> Self {
        let ns = Self {
            map: RwLock::new(HashMap::new()),
        };
        ns.insert(Arc::new(FileEntry::new_directory("/")));
        ns
    }

    /// O(1) lookup by exact path string. The sole existence test.
    pub fn check(&self, path: &str) -> Option<Arc<FileEntry>> {
        let map = self.map.read().unwrap_or_else(|e| e.into_inner());
        map.get(&path_key(path)).cloned()
    }

    pub fn insert(&self, entry: Arc<FileEntry>) {
        let key = path_key(entry.path());
        let mut map = self.map.write().unwrap_or_else(|e| e.into_inner());
        map.insert(key, entry);
    }

    pub fn remove(&self, path: &str) -> Option<Arc<FileEntry>> {
        let mut map = self.map.write().unwrap_or_else(|e| e.into_inner());
        map.remove(&path_key(path))
    }

    pub fn len(&self) -> usize {
        let map = self.map.read().unwrap_or_else(|e| e.into_inner());
        map.len()
    }

    /// Snapshot of every entry handle, in no particular order.
    pub fn entries(&self) -> Vec<Arc<FileEntry>> {
        let map = self.map.read().unwrap_or_else(|e| e.into_inner());
        map.values().cloned().collect()
    }

    /// Replace the whole table. Used when reloading from an image; the
    /// root is re-materialized, never read from the stream.
    pub fn replace_all(&self, entries: Vec<Arc<FileEntry>>) {
        let mut fresh: HashMap<String, Arc<FileEntry>> = HashMap::with_capacity(entries.len() + 1);
        let root: Arc<FileEntry> = Arc::new(FileEntry::new_directory("/"));
        fresh.insert(path_key("/"), root);
        for entry in entries {
            fresh.insert(path_key(entry.path()), entry);
        }
        let mut map = self.map.write().unwrap_or_else(|e| e.into_inner());
        *map = fresh;
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new()
    }
}

/// Root lookup helper used by invariant checks.
pub(crate) fn is_root(path: &str) -> bool {
    path == "/"
}
