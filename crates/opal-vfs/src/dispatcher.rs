//! The single-writer request dispatcher.
//!
//! One long-lived thread owns every mutation of the namespace map and of
//! `total_size`. Clients rendezvous with it over the unbuffered ingress
//! queue and block on their envelope's reply channel, so all mutations are
//! linearized in receipt order. Readers never pass through here: they take
//! snapshot copies straight off the map.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Receiver;
use tracing::{debug, info, warn};

use opal_digest::content_sum;

use crate::entry::FileEntry;
use crate::error::VfsError;
use crate::namespace::{is_root, Namespace};
use crate::request::{IoRequest, Operation};

/// Replace `entry`'s payload with `data` under the entry lock.
///
/// Empty input is a no-op returning zero. `total_size` is adjusted by the
/// signed length delta, saturating at zero. Returns the new payload length.
fn write_internal(entry: &FileEntry, data: &[u8], total_size: &AtomicU64) -> usize {
    if data.is_empty() {
        return 0;
    }

    let mut guard = entry.data();
    let old_len = guard.payload.len();

    if data.len() >= old_len {
        total_size.fetch_add((data.len() - old_len) as u64, Ordering::SeqCst);
    } else {
        let shrink = (old_len - data.len()) as u64;
        let _ = total_size.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
            Some(v.saturating_sub(shrink))
        });
    }

    guard.payload = data.to_vec();
    guard.content_sum = content_sum(data);
    guard.payload.len()
}

/// Proper-prefix directories of `path`, shallowest first, without their
/// trailing slash. `"/a/b/c"` and `"/a/b/c/"` both yield `["/a", "/a/b"]`.
fn ancestor_prefixes(path: &str) -> Vec<String> {
    let trimmed = path.trim_end_matches('/');
    let mut prefixes = Vec::new();
    let mut acc = String::new();
    let components: Vec<&str> = trimmed.split('/').filter(|c| !c.is_empty()).collect();
    for component in components.iter().take(components.len().saturating_sub(1)) {
        acc.push('/');
        acc.push_str(component);
        prefixes.push(acc.clone());
    }
    prefixes
}

fn handle_create(namespace: &Namespace, path: &str) -> Arc<FileEntry> {
    let entry = if path.ends_with('/') {
        Arc::new(FileEntry::new_directory(path.to_string()))
    } else {
        Arc::new(FileEntry::new_file(path.to_string()))
    };
    namespace.insert(Arc::clone(&entry));

    // Materialize every missing ancestor as a directory. An existing entry
    // at the directory key is never overwritten; a same-named *file* lives
    // under a different key (no trailing slash) and coexists legally.
    for prefix in ancestor_prefixes(path) {
        let canonical = format!("{}/", prefix);
        if namespace.check(&canonical).is_none() {
            namespace.insert(Arc::new(FileEntry::new_directory(canonical)));
        }
    }

    entry
}

/// Spawn the dispatcher thread. It runs until a `Purge` arrives or every
/// sender is gone.
pub(crate) fn spawn(
    namespace: Arc<Namespace>,
    total_size: Arc<AtomicU64>,
    ingress: Receiver<IoRequest>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("opal-dispatcher".to_string())
        .spawn(move || run(&namespace, &total_size, &ingress))
}

fn run(namespace: &Namespace, total_size: &AtomicU64, ingress: &Receiver<IoRequest>) {
    debug!("dispatcher started");
    for request in ingress.iter() {
        match request.op {
            Operation::Purge => {
                // Dropping the receiver closes the queue; senders still
                // blocked on it fail. Deliberately no reply.
                info!("purge received, dispatcher terminating");
                return;
            }

            Operation::Delete { path } => {
                let reply = if is_root(&path) {
                    warn!(path = %path, "refusing to delete root");
                    Err(VfsError::RootDelete)
                } else {
                    match namespace.remove(&path) {
                        Some(entry) => {
                            if entry.is_file() {
                                let freed = entry.payload_len() as u64;
                                let _ = total_size
                                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
                                        Some(v.saturating_sub(freed))
                                    });
                            }
                            debug!(path = %path, "entry deleted");
                            Ok(None)
                        }
                        None => Err(VfsError::NotFound(path)),
                    }
                };
                let _ = request.reply.send(reply);
            }

            Operation::Write { path, data } => {
                let reply = match namespace.check(&path) {
                    None => Err(VfsError::NotFound(path)),
                    Some(entry) => {
                        let requested = data.len();
                        let written = write_internal(&entry, &data, total_size);
                        if written == requested {
                            debug!(path = %path, bytes = written, "payload replaced");
                            Ok(Some(entry))
                        } else {
                            Err(VfsError::ShortWrite { written, requested })
                        }
                    }
                };
                let _ = request.reply.send(reply);
            }

            Operation::Create { path } => {
                let entry = handle_create(namespace, &path);
                debug!(path = %path, kind = ?entry.kind(), "entry created");
                let _ = request.reply.send(Ok(Some(entry)));
            }
        }
    }
    debug!("ingress closed, dispatcher exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ancestor_prefixes() {
        assert_eq!(
            ancestor_prefixes("/folder0/folder1/file0"),
            vec!["/folder0", "/folder0/folder1"]
        );
        // A directory path yields the same proper prefixes.
        assert_eq!(ancestor_prefixes("/folder0/folder1/"), vec!["/folder0"]);
        assert!(ancestor_prefixes("/file").is_empty());
        assert!(ancestor_prefixes("/").is_empty());
    }

    #[test]
    fn test_write_internal_accounting() {
        let entry = FileEntry::new_file("/a");
        let total = AtomicU64::new(0);

        assert_eq!(write_internal(&entry, &[1, 2, 3, 4], &total), 4);
        assert_eq!(total.load(Ordering::SeqCst), 4);

        // Shrinking write adjusts downward.
        assert_eq!(write_internal(&entry, &[9], &total), 1);
        assert_eq!(total.load(Ordering::SeqCst), 1);
        assert_eq!(entry.payload_snapshot(), vec![9]);

        // Empty write is a no-op.
        assert_eq!(write_internal(&entry, &[], &total), 0);
        assert_eq!(entry.payload_snapshot(), vec![9]);
        assert_eq!(total.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_write_internal_updates_content_sum() {
        let entry = FileEntry::new_file("/a");
        let total = AtomicU64::new(0);
        write_internal(&entry, &[1, 2, 3], &total);
        assert_eq!(entry.content_sum(), content_sum(&[1, 2, 3]));
    }

    #[test]
    fn test_total_size_never_underflows() {
        let entry = FileEntry::new_file("/a");
        // A total that is already out of sync must saturate, not wrap.
        let total = AtomicU64::new(0);
        entry.data().payload = vec![0; 100];
        write_internal(&entry, &[1], &total);
        assert_eq!(total.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_create_synthesizes_ancestors() {
        let ns = Namespace::new();
        handle_create(&ns, "/folder0/folder1/file0");

        assert!(ns.check("/folder0/folder1/file0").is_some());
        let d0 = ns.check("/folder0/").expect("ancestor missing");
        assert!(d0.is_directory());
        let d1 = ns.check("/folder0/folder1/").expect("ancestor missing");
        assert!(d1.is_directory());
        // Ancestors are stored under the trailing-slash spelling only.
        assert!(ns.check("/folder0").is_none());
    }

    #[test]
    fn test_synthesis_never_overwrites() {
        let ns = Namespace::new();
        let first = handle_create(&ns, "/a/");
        handle_create(&ns, "/a/b/c");
        let still = ns.check("/a/").expect("directory vanished");
        assert!(Arc::ptr_eq(&first, &still));
    }

    #[test]
    fn test_file_and_synthesized_directory_coexist() {
        let ns = Namespace::new();
        handle_create(&ns, "/a/b");
        handle_create(&ns, "/a/b/c");

        let file = ns.check("/a/b").expect("file missing");
        assert!(file.is_file());
        let dir = ns.check("/a/b/").expect("directory missing");
        assert!(dir.is_directory());
    }
}
