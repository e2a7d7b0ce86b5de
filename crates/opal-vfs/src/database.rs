//! The public façade.
//!
//! A [`Database`] is built either fresh (root-only namespace) or by loading
//! an existing image, then starts serving once [`Database::start_io_controller`]
//! spawns the dispatcher. Reads go straight to the namespace; every mutation
//! travels through the ingress queue.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Sender};
use tracing::info;

use opal_image::{read_image, write_image, FsFlags, SnapshotEntry};

use crate::dispatcher;
use crate::entry::{EntryKind, FileEntry};
use crate::error::{Result, VfsError};
use crate::io::{Reader, Writer};
use crate::namespace::Namespace;
use crate::request::{IoRequest, Operation};

/// Longest accepted path, in bytes. Checked before an envelope is built.
pub const MAX_PATH_LENGTH: usize = 256;

/// An in-memory path-addressed filesystem bound to one on-disk image.
pub struct Database {
    filename: String,
    flags: FsFlags,
    namespace: Arc<Namespace>,
    total_size: Arc<AtomicU64>,
    ingress: OnceLock<Sender<IoRequest>>,
    create_sync: Mutex<()>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl Database {
    /// Build a database handle for the image file `name`.
    ///
    /// With [`FsFlags::DB_LOAD`] the namespace is populated from the image
    /// on disk (a missing or corrupt image is an error); otherwise the
    /// namespace starts with only the root. `flags` also fixes the transform
    /// set used by [`Database::commit`].
    pub fn new(name: impl Into<String>, flags: FsFlags) -> Result<Self> {
        let db = Self {
            filename: name.into(),
            flags,
            namespace: Arc::new(Namespace::new()),
            total_size: Arc::new(AtomicU64::new(0)),
            ingress: OnceLock::new(),
            create_sync: Mutex::new(()),
            dispatcher: Mutex::new(None),
        };

        if flags.contains(FsFlags::DB_LOAD) {
            db.reload_from_disk()?;
            info!(image = %db.filename, files = db.file_count(), "database loaded");
        }
        Ok(db)
    }

    /// Spawn the dispatcher and begin serving mutations. Must be called
    /// exactly once per handle.
    pub fn start_io_controller(&self) -> Result<()> {
        let (tx, rx) = bounded(0);
        if self.ingress.set(tx).is_err() {
            return Err(VfsError::AlreadyServing);
        }
        let handle = dispatcher::spawn(
            Arc::clone(&self.namespace),
            Arc::clone(&self.total_size),
            rx,
        )?;
        *self.lock_dispatcher() = Some(handle);
        Ok(())
    }

    fn lock_dispatcher(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.dispatcher.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn send_request(&self, op: Operation) -> Result<Option<Arc<FileEntry>>> {
        let sender = self.ingress.get().ok_or(VfsError::NotServing)?;
        let (request, reply_rx) = IoRequest::new(op);
        sender.send(request).map_err(|_| VfsError::Terminated)?;
        reply_rx.recv().map_err(|_| VfsError::Terminated)?
    }

    /// O(1) existence test by exact path string.
    pub fn check(&self, path: &str) -> Option<Arc<FileEntry>> {
        self.namespace.check(path)
    }

    /// Create a file (or, with a trailing `/`, a directory) at `path`,
    /// materializing any missing ancestor directories.
    ///
    /// Concurrent creates are serialized end-to-end: the create lock is held
    /// from envelope construction through reply receipt.
    pub fn create(&self, path: &str) -> Result<Arc<FileEntry>> {
        // The existence check must sit inside the create lock, or two racing
        // creates could both pass it and the loser would silently replace
        // the winner's entry.
        let _guard = self.create_sync.lock().unwrap_or_else(|e| e.into_inner());
        if self.check(path).is_some() {
            return Err(VfsError::AlreadyExists(path.to_string()));
        }
        if path.len() > MAX_PATH_LENGTH {
            return Err(VfsError::PathTooLong(path.len()));
        }

        let reply = self.send_request(Operation::Create {
            path: path.to_string(),
        })?;
        reply.ok_or_else(|| VfsError::NotFound(path.to_string()))
    }

    /// Snapshot copy of a file's payload.
    pub fn read(&self, path: &str) -> Result<Vec<u8>> {
        let entry = self
            .check(path)
            .ok_or_else(|| VfsError::NotFound(path.to_string()))?;
        if entry.is_directory() {
            return Err(VfsError::IsDirectory(path.to_string()));
        }
        Ok(entry.payload_snapshot())
    }

    /// Replace the payload of an existing file. Writes go through the
    /// dispatcher and replace the entire payload.
    pub fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        if self.check(path).is_none() {
            return Err(VfsError::NotFound(path.to_string()));
        }
        self.send_request(Operation::Write {
            path: path.to_string(),
            data: data.to_vec(),
        })?;
        Ok(())
    }

    /// Remove the entry at `path`. The slot is cleared; re-creating the same
    /// path afterwards is legal. The root cannot be deleted.
    pub fn delete(&self, path: &str) -> Result<()> {
        if self.check(path).is_none() {
            return Err(VfsError::NotFound(path.to_string()));
        }
        self.send_request(Operation::Delete {
            path: path.to_string(),
        })?;
        Ok(())
    }

    /// Terminate the dispatcher. Irrecoverable: every later mutation fails.
    pub fn purge(&self) -> Result<()> {
        let sender = self.ingress.get().ok_or(VfsError::NotServing)?;
        let (request, _reply_rx) = IoRequest::new(Operation::Purge);
        sender.send(request).map_err(|_| VfsError::Terminated)?;
        if let Some(handle) = self.lock_dispatcher().take() {
            let _ = handle.join();
        }
        Ok(())
    }

    /// Sequential read view over an existing path.
    pub fn new_reader(&self, path: &str) -> Result<Reader<'_>> {
        let entry = self
            .check(path)
            .ok_or_else(|| VfsError::NotFound(path.to_string()))?;
        Ok(Reader::new(self, path.to_string(), entry))
    }

    /// Write view over an existing path.
    pub fn new_writer(&self, path: &str) -> Result<Writer<'_>> {
        if self.check(path).is_none() {
            return Err(VfsError::NotFound(path.to_string()));
        }
        Ok(Writer::new(self, path.to_string()))
    }

    /// Serialize the whole namespace into the image file, overwriting it.
    ///
    /// `flags` selects per-file compression and the whole-image transforms
    /// for this snapshot; loading must repeat the same set.
    pub fn unmount_db(&self, flags: FsFlags) -> Result<u64> {
        let entries: Vec<SnapshotEntry> = self
            .namespace
            .entries()
            .into_iter()
            .map(|entry| {
                let data = entry.data();
                SnapshotEntry {
                    name: entry.path().to_string(),
                    kind: entry.kind().flags(),
                    content_sum: data.content_sum.clone(),
                    payload: data.payload.clone(),
                }
            })
            .collect();

        let written = write_image(Path::new(&self.filename), entries, flags)?;
        info!(image = %self.filename, bytes = written, "database unmounted");
        Ok(written)
    }

    /// Unmount with the handle's construction flags, then reload the
    /// namespace from the freshly written image.
    pub fn commit(&self) -> Result<()> {
        self.unmount_db(self.flags)?;
        self.reload_from_disk()
    }

    fn reload_from_disk(&self) -> Result<()> {
        let loaded = read_image(Path::new(&self.filename), self.flags)?;

        let mut total: u64 = 0;
        let mut entries = Vec::with_capacity(loaded.len());
        for item in loaded {
            let kind = EntryKind::from_flags(item.kind);
            if kind == EntryKind::File {
                total += item.payload.len() as u64;
            }
            entries.push(Arc::new(FileEntry::with_payload(
                item.name,
                kind,
                item.payload,
                item.content_sum,
            )));
        }

        self.namespace.replace_all(entries);
        self.total_size.store(total, Ordering::SeqCst);
        Ok(())
    }

    /// Payload length of a file entry.
    pub fn file_size(&self, path: &str) -> Result<u64> {
        let entry = self
            .check(path)
            .ok_or_else(|| VfsError::NotFound(path.to_string()))?;
        Ok(entry.payload_len() as u64)
    }

    /// Sum of every file payload length in the namespace.
    pub fn total_file_sizes(&self) -> u64 {
        self.total_size.load(Ordering::SeqCst)
    }

    /// Number of entries, root included.
    pub fn file_count(&self) -> usize {
        self.namespace.len()
    }

    /// Every entry as `(canonical path, kind)`, sorted by path.
    pub fn file_list(&self) -> Vec<(String, EntryKind)> {
        let mut list: Vec<(String, EntryKind)> = self
            .namespace
            .entries()
            .into_iter()
            .map(|e| (e.path().to_string(), e.kind()))
            .collect();
        list.sort_by(|a, b| a.0.cmp(&b.0));
        list
    }

    /// Immediate children of a directory prefix, sorted by path. A missing
    /// trailing slash is supplied. Deeper descendants are not listed; they
    /// are reachable through their synthesized parent directories.
    pub fn file_list_directory(&self, prefix: &str) -> Vec<(String, EntryKind)> {
        let prefix = if prefix.ends_with('/') {
            prefix.to_string()
        } else {
            format!("{}/", prefix)
        };
        let mut list: Vec<(String, EntryKind)> = self
            .namespace
            .entries()
            .into_iter()
            .filter(|e| match e.path().strip_prefix(&prefix) {
                Some(rest) if !rest.is_empty() => !rest.trim_end_matches('/').contains('/'),
                _ => false,
            })
            .map(|e| (e.path().to_string(), e.kind()))
            .collect();
        list.sort_by(|a, b| a.0.cmp(&b.0));
        list
    }

    /// The on-disk image path this handle serializes to.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Flags the handle was constructed with.
    pub fn flags(&self) -> FsFlags {
        self.flags
    }
}
