//! File entries: the unit the namespace maps to.

use std::sync::{Mutex, MutexGuard};

use opal_image::FsFlags;

/// Entry kind. Directories carry no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EntryKind {
    File,
    Directory,
}

impl EntryKind {
    /// Kind bits as they appear in an image record.
    pub fn flags(self) -> FsFlags {
        match self {
            EntryKind::File => FsFlags::FILE,
            EntryKind::Directory => FsFlags::DIRECTORY,
        }
    }

    pub(crate) fn from_flags(flags: FsFlags) -> Self {
        if flags.contains(FsFlags::DIRECTORY) {
            EntryKind::Directory
        } else {
            EntryKind::File
        }
    }
}

/// Mutable state of an entry, guarded by the per-entry lock.
#[derive(Debug, Default)]
pub(crate) struct EntryData {
    pub payload: Vec<u8>,
    pub content_sum: String,
}

/// One file or directory in the namespace.
///
/// The canonical path and kind are fixed at creation; the payload and its
/// content sum live behind the per-entry lock, which is held for the entire
/// duration of any payload replacement. Readers never hold the lock across a
/// return: they copy the payload out under it.
#[derive(Debug)]
pub struct FileEntry {
    path: String,
    kind: EntryKind,
    data: Mutex<EntryData>,
}

impl FileEntry {
    pub(crate) fn new_file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::File,
            data: Mutex::new(EntryData::default()),
        }
    }

    /// `path` must already carry its trailing `/`.
    pub(crate) fn new_directory(path: impl Into<String>) -> Self {
        let path = path.into();
        debug_assert!(path.ends_with('/'));
        Self {
            path,
            kind: EntryKind::Directory,
            data: Mutex::new(EntryData::default()),
        }
    }

    pub(crate) fn with_payload(path: String, kind: EntryKind, payload: Vec<u8>, sum: String) -> Self {
        Self {
            path,
            kind,
            data: Mutex::new(EntryData {
                payload,
                content_sum: sum,
            }),
        }
    }

    /// Canonical path; directories end in `/`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    /// Acquire the per-entry lock.
    pub(crate) fn data(&self) -> MutexGuard<'_, EntryData> {
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Copy of the current payload, taken under the entry lock.
    pub fn payload_snapshot(&self) -> Vec<u8> {
        self.data().payload.clone()
    }

    pub fn payload_len(&self) -> usize {
        self.data().payload.len()
    }

    /// Stored content sum; empty until the first non-empty write.
    pub fn content_sum(&self) -> String {
        self.data().content_sum.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_flags_roundtrip() {
        assert_eq!(EntryKind::from_flags(EntryKind::File.flags()), EntryKind::File);
        assert_eq!(
            EntryKind::from_flags(EntryKind::Directory.flags()),
            EntryKind::Directory
        );
    }

    #[test]
    fn test_new_entries_are_empty() {
        let file = FileEntry::new_file("/a/b");
        assert!(file.is_file());
        assert_eq!(file.payload_len(), 0);
        assert!(file.content_sum().is_empty());

        let dir = FileEntry::new_directory("/a/");
        assert!(dir.is_directory());
        assert_eq!(dir.path(), "/a/");
    }

    #[test]
    fn test_payload_snapshot_is_a_copy() {
        let file = FileEntry::new_file("/a");
        file.data().payload = vec![1, 2, 3];
        let mut snap = file.payload_snapshot();
        snap.push(4);
        assert_eq!(file.payload_len(), 3);
    }
}
