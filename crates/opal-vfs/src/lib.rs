//! # opal-vfs
//!
//! An in-memory, hierarchical, path-addressed virtual filesystem that
//! serializes to and restores from a single opaque image file.
//!
//! Paths hash to stable 128-bit keys, so locating an entry is O(1) at any
//! tree depth. All mutations funnel through one dispatcher thread over an
//! unbuffered ingress queue; reads take snapshot copies off the namespace
//! concurrently and never block behind the queue.
//!
//! ```no_run
//! use opal_vfs::{Database, FsFlags};
//!
//! # fn main() -> opal_vfs::Result<()> {
//! let db = Database::new("my.db", FsFlags::DB_CREATE)?;
//! db.start_io_controller()?;
//!
//! db.create("/folder0/folder0/file0")?;
//! db.write("/folder0/folder0/file0", &[1, 2, 3, 4])?;
//! assert_eq!(db.read("/folder0/folder0/file0")?, vec![1, 2, 3, 4]);
//!
//! db.unmount_db(FsFlags::COMPRESS | FsFlags::ENCRYPT)?;
//! # Ok(())
//! # }
//! ```

mod database;
mod dispatcher;
mod entry;
mod error;
mod io;
pub mod logging;
mod namespace;
mod request;

pub use database::{Database, MAX_PATH_LENGTH};
pub use entry::{EntryKind, FileEntry};
pub use error::{Result, VfsError};
pub use io::{Reader, Writer};

// The flag set travels with the image format.
pub use opal_image::FsFlags;
