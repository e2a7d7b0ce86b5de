//! Error surface for all user-facing operations.

use thiserror::Error;

/// Errors that can occur during filesystem operations.
#[derive(Debug, Error)]
pub enum VfsError {
    #[error("path is too long: {0} bytes")]
    PathTooLong(usize),

    #[error("file already exists: {0}")]
    AlreadyExists(String),

    #[error("file does not exist: {0}")]
    NotFound(String),

    #[error("cannot read a directory: {0}")]
    IsDirectory(String),

    #[error("cannot delete the root entry")]
    RootDelete,

    #[error("short write: wrote {written} of {requested} bytes")]
    ShortWrite { written: usize, requested: usize },

    #[error("write buffer is empty")]
    EmptyWrite,

    #[error("store is not serving requests")]
    NotServing,

    #[error("I/O controller is already running")]
    AlreadyServing,

    #[error("store has been purged")]
    Terminated,

    #[error(transparent)]
    Image(#[from] opal_image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, VfsError>;
