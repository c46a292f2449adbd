//! # bucketdb storage
//!
//! Byte-level backends for the bucketdb commit log.
//!
//! A backend is an opaque, append-only byte sequence. It knows nothing
//! about buckets, transactions or record framing; the bucket store owns
//! all of that and only asks the backend to append, read back, sync and
//! cut off a torn tail.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - ephemeral stores and tests
//! - [`FileBackend`] - a single log file on disk
//!
//! ## Example
//!
//! ```rust
//! use bucketdb_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut log = InMemoryBackend::new();
//! let offset = log.append(b"commit").unwrap();
//! assert_eq!(log.read_at(offset, 6).unwrap(), b"commit");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
