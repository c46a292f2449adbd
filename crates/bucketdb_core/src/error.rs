//! Error types for the command layer.

use thiserror::Error;

/// Result type for command operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors returned by commands and by [`crate::Db`].
///
/// Missing buckets, fields and members are never errors; reads return
/// empty results instead.
#[derive(Debug, Error)]
pub enum DbError {
    /// The bucket store reported a failure.
    #[error("store error: {0}")]
    Store(#[from] bucketdb_store::StoreError),

    /// A multi-command body gave up on its transaction.
    #[error("transaction aborted: {reason}")]
    Aborted {
        /// Reason given by the caller.
        reason: String,
    },
}

impl DbError {
    /// Creates an aborted error, for use inside `multi_update` bodies.
    pub fn aborted(reason: impl Into<String>) -> Self {
        Self::Aborted {
            reason: reason.into(),
        }
    }
}
