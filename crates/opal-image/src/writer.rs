//! Parallel snapshot writer.
//!
//! One worker per entry: the root sends nothing, every other entry encodes
//! its record (gzipping the payload when per-file compression is on) and
//! sends exactly one buffer on the funnel. The assembler writes the header
//! first, then drains exactly `file_count` buffers in completion order, so
//! record order in the stream is nondeterministic and the loader must not
//! depend on it.

use std::fs;
use std::path::Path;
use std::thread;

use crossbeam_channel::bounded;
use tracing::debug;

use crate::record::{FileRecord, ImageHeader};
use crate::transform::{encipher_stream, gzip};
use crate::{FsFlags, ImageError, Result};

/// One namespace entry, flattened for serialization.
#[derive(Debug, Clone)]
pub struct SnapshotEntry {
    /// Canonical path (directories end in `/`).
    pub name: String,
    /// Entry kind: [`FsFlags::FILE`] or [`FsFlags::DIRECTORY`].
    pub kind: FsFlags,
    /// Stored content sum; empty for directories and empty files.
    pub content_sum: String,
    /// Payload bytes; empty for directories and empty files.
    pub payload: Vec<u8>,
}

fn encode_entry(entry: &SnapshotEntry, flags: FsFlags) -> Result<Vec<u8>> {
    let mut record = FileRecord {
        content_sum: entry.content_sum.clone(),
        flags: entry.kind.bits(),
        name: entry.name.clone(),
        unzipped_len: entry.payload.len() as u64,
    };

    let body = if entry.kind.contains(FsFlags::FILE) && !entry.payload.is_empty() {
        if flags.contains(FsFlags::COMPRESS_FILES) {
            record.flags |= FsFlags::COMPRESS_FILES.bits();
            gzip(&entry.payload)?
        } else {
            entry.payload.clone()
        }
    } else {
        // Directories and empty files are record-only.
        Vec::new()
    };

    let mut buf = bincode::serialize(&record)?;
    buf.extend_from_slice(&body);
    Ok(buf)
}

/// Serialize `entries` into a single image at `target`, overwriting it.
///
/// `flags` selects per-file compression plus the whole-image transforms:
/// gzip when `COMPRESS` is set, then the host-keyed cipher when `ENCRYPT`
/// is set. Returns the number of bytes written to disk.
pub fn write_image(target: &Path, entries: Vec<SnapshotEntry>, flags: FsFlags) -> Result<u64> {
    let file_count = entries.iter().filter(|e| e.name != "/").count() as u64;

    let mut stream = bincode::serialize(&ImageHeader::new(file_count))?;

    thread::scope(|scope| -> Result<()> {
        let (funnel_tx, funnel_rx) = bounded::<Result<Vec<u8>>>(0);

        for entry in &entries {
            let tx = funnel_tx.clone();
            scope.spawn(move || {
                if entry.name == "/" {
                    // The root is implicit in every image; it exits without
                    // sending, which is why it is excluded from file_count.
                    return;
                }
                // A send only fails when the assembler already bailed out.
                let _ = tx.send(encode_entry(entry, flags));
            });
        }
        drop(funnel_tx);

        for _ in 0..file_count {
            // Every non-root worker sends exactly once; a lost sender means
            // a worker died before its record made it onto the funnel.
            let buf = funnel_rx.recv().map_err(|_| ImageError::WorkerLost)??;
            stream.extend_from_slice(&buf);
        }
        Ok(())
    })?;

    if flags.contains(FsFlags::COMPRESS) {
        stream = gzip(&stream)?;
    }
    if flags.contains(FsFlags::ENCRYPT) {
        encipher_stream(&mut stream, &opal_digest::fs_key());
    }

    fs::write(target, &stream)?;
    debug!(
        target = %target.display(),
        files = file_count,
        bytes = stream.len(),
        "image written"
    );
    Ok(stream.len() as u64)
}
