//! Shared store types.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Contents of one bucket, ordered by key bytes.
pub(crate) type Entries = BTreeMap<Vec<u8>, Vec<u8>>;

/// All buckets, ordered by name. Buckets are shared between snapshots and
/// copied on first write.
pub(crate) type Buckets = BTreeMap<Vec<u8>, Arc<Entries>>;

/// Commit sequence number.
///
/// Every commit that changes data gets the next number. A snapshot is
/// identified by the sequence it was taken at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SequenceNumber(pub u64);

impl SequenceNumber {
    /// Creates a new sequence number.
    #[must_use]
    pub const fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the following sequence number.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seq:{}", self.0)
    }
}
