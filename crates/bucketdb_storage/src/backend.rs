//! The backend trait.

use crate::error::StorageResult;

/// An append-only byte log.
///
/// The bucket store writes one framed record per committed transaction and
/// reads the whole log back on open. Backends never interpret the bytes.
///
/// # Invariants
///
/// - `append` returns the offset the data starts at, which is the size
///   before the call
/// - `read_at` returns exactly the bytes previously appended there
/// - after `sync` returns, every appended byte survives process exit
/// - backends are `Send + Sync` so a store can be shared across threads
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::ReadPastEnd`] if the range is not
    /// fully inside the log, or an I/O error.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends `data` and returns the offset it was written at.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Makes all appended data durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Returns the current log size in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Cuts the log back to `new_size` bytes.
    ///
    /// Used by recovery to drop a record that was only partially written.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::InvalidTruncate`] if `new_size` is
    /// larger than the log, or an I/O error.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;
}
