//! Error types for the bucket store.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the bucket store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Log backend error.
    #[error("storage error: {0}")]
    Storage(#[from] bucketdb_storage::StorageError),

    /// The commit log contains a record that cannot be decoded.
    #[error("commit log corrupted at offset {offset}: {message}")]
    Corrupted {
        /// Offset of the offending record.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// A commit record failed its checksum.
    #[error("checksum mismatch at offset {offset}: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Offset of the offending record.
        offset: u64,
        /// Checksum stored in the record.
        expected: u32,
        /// Checksum computed over the record.
        actual: u32,
    },

    /// Bucket names must not be empty.
    #[error("bucket name required")]
    BucketNameRequired,

    /// Keys must not be empty.
    #[error("key required")]
    KeyRequired,

    /// The key (or bucket name) exceeds the configured limit.
    #[error("key too large: {len} bytes exceeds maximum of {max}")]
    KeyTooLarge {
        /// Length of the rejected key.
        len: usize,
        /// Configured maximum.
        max: usize,
    },

    /// The value exceeds the configured limit.
    #[error("value too large: {len} bytes exceeds maximum of {max}")]
    ValueTooLarge {
        /// Length of the rejected value.
        len: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Another write transaction held the writer lock for too long.
    #[error("timed out after {timeout:?} waiting for the write lock")]
    WriteTimeout {
        /// The configured wait.
        timeout: Duration,
    },

    /// The store has been closed.
    #[error("store is closed")]
    Closed,

    /// The store file does not exist and creation was disabled.
    #[error("store not found at {path:?}")]
    NotFound {
        /// Path that was looked up.
        path: PathBuf,
    },
}

impl StoreError {
    /// Creates a corruption error.
    pub fn corrupted(offset: u64, message: impl Into<String>) -> Self {
        Self::Corrupted {
            offset,
            message: message.into(),
        }
    }
}
