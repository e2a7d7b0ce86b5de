//! On-stream record types.

use serde::{Deserialize, Serialize};

use crate::{ImageError, Result};

/// Leading record of every image stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageHeader {
    /// Must equal [`opal_digest::FS_SIGNATURE`].
    pub signature: String,
    /// Number of file records that follow. The root entry is never
    /// serialized and is not counted.
    pub file_count: u64,
}

impl ImageHeader {
    pub fn new(file_count: u64) -> Self {
        Self {
            signature: opal_digest::FS_SIGNATURE.to_string(),
            file_count,
        }
    }

    /// Reject streams written by anything other than this format.
    pub fn validate(&self) -> Result<()> {
        if self.signature != opal_digest::FS_SIGNATURE {
            return Err(ImageError::SignatureMismatch {
                expected: opal_digest::FS_SIGNATURE.to_string(),
                actual: self.signature.clone(),
            });
        }
        Ok(())
    }
}

/// Per-entry metadata record. Field order is part of the format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    /// Salted content sum of the payload; empty when the payload is empty.
    pub content_sum: String,
    /// [`crate::FsFlags`] bits: entry kind plus `COMPRESS_FILES` when the
    /// appended payload is independently gzipped.
    pub flags: u32,
    /// Canonical path (directories end in `/`).
    pub name: String,
    /// Uncompressed payload length. Zero means no payload bytes follow.
    pub unzipped_len: u64,
}
