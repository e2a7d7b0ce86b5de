//! Verifying image loader.
//!
//! Inverts the write path: decipher, inflate, decode the header, then decode
//! records until the cursor is exhausted. Payload lengths and content sums
//! are checked record by record; any mismatch aborts the load.

use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;

use flate2::bufread::GzDecoder;
use tracing::debug;

use crate::record::{FileRecord, ImageHeader};
use crate::transform::{decipher_stream, gunzip};
use crate::{FsFlags, ImageError, Result};

/// One decoded entry, ready to be inserted into a namespace.
#[derive(Debug, Clone)]
pub struct LoadedEntry {
    pub name: String,
    pub kind: FsFlags,
    pub content_sum: String,
    pub payload: Vec<u8>,
}

/// Read the payload that follows `record`, advancing the cursor past it.
fn read_payload(cursor: &mut Cursor<Vec<u8>>, record: &FileRecord) -> Result<Vec<u8>> {
    let declared = record.unzipped_len as usize;
    let pos = cursor.position() as usize;
    let remaining = &cursor.get_ref()[pos..];

    if FsFlags::from_bits_truncate(record.flags).contains(FsFlags::COMPRESS_FILES) {
        // The gzip stream is self-terminating; decode it off the remaining
        // slice and advance the cursor by however much it consumed.
        let mut decoder = GzDecoder::new(remaining);
        let mut payload = Vec::with_capacity(declared);
        decoder
            .read_to_end(&mut payload)
            .map_err(|_| ImageError::Truncated {
                name: record.name.clone(),
            })?;
        let consumed = remaining.len() - decoder.into_inner().len();
        cursor.set_position((pos + consumed) as u64);

        if payload.len() != declared {
            return Err(ImageError::LengthMismatch {
                name: record.name.clone(),
                declared: record.unzipped_len,
                actual: payload.len() as u64,
            });
        }
        Ok(payload)
    } else {
        if remaining.len() < declared {
            return Err(ImageError::Truncated {
                name: record.name.clone(),
            });
        }
        let payload = remaining[..declared].to_vec();
        cursor.set_position((pos + declared) as u64);
        Ok(payload)
    }
}

/// Load and verify the image at `source`.
///
/// `flags` must repeat the transform set the image was written with; the
/// stream carries no in-band indication. The returned entries do not include
/// the root, which every namespace materializes itself.
pub fn read_image(source: &Path, flags: FsFlags) -> Result<Vec<LoadedEntry>> {
    let mut image = fs::read(source)?;

    if flags.contains(FsFlags::ENCRYPT) {
        decipher_stream(&mut image, &opal_digest::fs_key());
    }
    if flags.contains(FsFlags::COMPRESS) {
        image = gunzip(&image)?;
    }

    let len = image.len() as u64;
    let mut cursor = Cursor::new(image);

    let header: ImageHeader = bincode::deserialize_from(&mut cursor)?;
    header.validate()?;

    let mut entries = Vec::with_capacity(header.file_count as usize);
    while cursor.position() < len {
        let record: FileRecord = bincode::deserialize_from(&mut cursor)?;

        let payload = if record.unzipped_len > 0 {
            let payload = read_payload(&mut cursor, &record)?;
            if opal_digest::content_sum(&payload) != record.content_sum {
                return Err(ImageError::ChecksumMismatch { name: record.name });
            }
            payload
        } else {
            Vec::new()
        };

        let kind = if FsFlags::from_bits_truncate(record.flags).contains(FsFlags::DIRECTORY) {
            FsFlags::DIRECTORY
        } else {
            FsFlags::FILE
        };

        entries.push(LoadedEntry {
            name: record.name,
            kind,
            content_sum: record.content_sum,
            payload,
        });
    }

    if entries.len() as u64 != header.file_count {
        return Err(ImageError::CountMismatch {
            declared: header.file_count,
            actual: entries.len() as u64,
        });
    }

    debug!(
        source = %source.display(),
        files = entries.len(),
        "image loaded"
    );
    Ok(entries)
}
