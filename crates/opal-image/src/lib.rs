//! # opal-image
//!
//! The single-file image format for the Opal virtual filesystem.
//!
//! An image is one opaque byte stream:
//!
//! ```text
//! [whole-image transforms: gzip inner, stream cipher outer]
//! └── [image header]                    magic signature + file count
//!     [file record][payload bytes?]     repeated file-count times,
//!     [file record][payload bytes?]     in worker completion order
//!     ...
//! ```
//!
//! Records and the header are bincode-encoded. Payload bytes follow a record
//! only when its `unzipped_len` is non-zero; they are raw unless the record
//! carries [`FsFlags::COMPRESS_FILES`], in which case they are an
//! independently gzipped stream that inflates to exactly `unzipped_len`
//! bytes.
//!
//! Writing fans per-file compression out across one worker per entry and
//! funnels the encoded buffers back through a channel; loading inverts the
//! transforms (decrypt, then inflate) and verifies every content sum.

mod reader;
mod record;
mod transform;
mod writer;

pub use reader::{read_image, LoadedEntry};
pub use record::{FileRecord, ImageHeader};
pub use transform::{decipher_stream, encipher_stream, gzip, gunzip};
pub use writer::{write_image, SnapshotEntry};

use bitflags::bitflags;
use thiserror::Error;

bitflags! {
    /// Flag set shared by database construction, image transforms, and
    /// per-record kind tagging.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FsFlags: u32 {
        /// Entry is a regular file.
        const FILE = 1;
        /// Entry is a directory.
        const DIRECTORY = 2;
        /// Gzip the whole image stream.
        const COMPRESS = 4;
        /// Cipher the whole image stream with the host-bound key.
        const ENCRYPT = 8;
        /// Construct the database by loading an existing image.
        const DB_LOAD = 16;
        /// Construct a fresh, root-only database.
        const DB_CREATE = 32;
        /// Gzip each file payload independently inside the image.
        const COMPRESS_FILES = 64;
    }
}

/// Errors produced while writing or loading an image.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encode(#[from] bincode::Error),

    #[error("bad image signature: expected {expected:?}, got {actual:?}")]
    SignatureMismatch { expected: String, actual: String },

    #[error("record count mismatch: header declares {declared}, stream holds {actual}")]
    CountMismatch { declared: u64, actual: u64 },

    #[error("payload length mismatch for {name}: declared {declared}, got {actual}")]
    LengthMismatch {
        name: String,
        declared: u64,
        actual: u64,
    },

    #[error("content sum mismatch for {name}")]
    ChecksumMismatch { name: String },

    #[error("image truncated while reading payload for {name}")]
    Truncated { name: String },

    #[error("snapshot worker exited without sending its record")]
    WorkerLost,
}

pub type Result<T> = std::result::Result<T, ImageError>;
