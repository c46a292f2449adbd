//! Read and write transactions.

use crate::bucket::{Bucket, BucketMut, Readable};
use crate::error::{StoreError, StoreResult};
use crate::log::LogOp;
use crate::store::BucketStore;
use crate::types::{Buckets, SequenceNumber};
use parking_lot::MutexGuard;
use std::collections::btree_map::Entry;
use std::sync::Arc;
use tracing::debug;

/// A read-only transaction.
///
/// Holds a point-in-time snapshot of the committed buckets. Commits made
/// after it was opened are not visible, and it never blocks writers.
#[derive(Debug)]
pub struct ReadTransaction {
    snapshot: Arc<Buckets>,
    sequence: SequenceNumber,
}

impl ReadTransaction {
    pub(crate) fn new(snapshot: Arc<Buckets>, sequence: SequenceNumber) -> Self {
        Self { snapshot, sequence }
    }

    /// Sequence number of the snapshot.
    #[must_use]
    pub fn snapshot_seq(&self) -> SequenceNumber {
        self.sequence
    }
}

impl Readable for ReadTransaction {
    fn bucket(&self, name: &[u8]) -> Option<Bucket<'_>> {
        self.snapshot
            .get_key_value(name)
            .map(|(name, entries)| Bucket::new(name, entries))
    }

    fn bucket_names(&self) -> Vec<Vec<u8>> {
        self.snapshot.keys().cloned().collect()
    }
}

/// A read-write transaction.
///
/// Holds the store's writer lock until it is committed, rolled back or
/// dropped. Changes are made to a private copy of the bucket map and only
/// published on [`WriteTransaction::commit`]. Dropping without committing
/// rolls back.
pub struct WriteTransaction<'s> {
    store: &'s BucketStore,
    _guard: MutexGuard<'s, ()>,
    buckets: Arc<Buckets>,
    ops: Vec<LogOp>,
    snapshot_seq: SequenceNumber,
    finished: bool,
}

impl<'s> WriteTransaction<'s> {
    pub(crate) fn new(
        store: &'s BucketStore,
        guard: MutexGuard<'s, ()>,
        buckets: Arc<Buckets>,
        snapshot_seq: SequenceNumber,
    ) -> Self {
        Self {
            store,
            _guard: guard,
            buckets,
            ops: Vec::new(),
            snapshot_seq,
            finished: false,
        }
    }

    /// Sequence number this transaction started from.
    #[must_use]
    pub fn snapshot_seq(&self) -> SequenceNumber {
        self.snapshot_seq
    }

    /// Number of bucket operations recorded so far.
    #[must_use]
    pub fn op_count(&self) -> usize {
        self.ops.len()
    }

    /// Returns a writable view of an existing bucket.
    pub fn bucket_mut(&mut self, name: &[u8]) -> Option<BucketMut<'_>> {
        if !self.buckets.contains_key(name) {
            return None;
        }
        let store = self.store;
        let config = store.config();
        let entries = Arc::make_mut(&mut self.buckets).get_mut(name)?;
        Some(BucketMut::new(
            name,
            Arc::make_mut(entries),
            &mut self.ops,
            config,
        ))
    }

    /// Returns a writable view of the bucket, creating it if needed.
    ///
    /// # Errors
    ///
    /// - [`StoreError::BucketNameRequired`] if `name` is empty
    /// - [`StoreError::KeyTooLarge`] if `name` exceeds the key limit
    pub fn create_bucket_if_not_exists(&mut self, name: &[u8]) -> StoreResult<BucketMut<'_>> {
        let store = self.store;
        let config = store.config();
        if name.is_empty() {
            return Err(StoreError::BucketNameRequired);
        }
        if name.len() > config.max_key_size {
            return Err(StoreError::KeyTooLarge {
                len: name.len(),
                max: config.max_key_size,
            });
        }

        let buckets = Arc::make_mut(&mut self.buckets);
        let entries = match buckets.entry(name.to_vec()) {
            Entry::Occupied(slot) => slot.into_mut(),
            Entry::Vacant(slot) => {
                self.ops.push(LogOp::CreateBucket {
                    bucket: name.to_vec(),
                });
                slot.insert(Arc::default())
            }
        };
        Ok(BucketMut::new(
            name,
            Arc::make_mut(entries),
            &mut self.ops,
            config,
        ))
    }

    /// Drops a bucket and all its entries. Returns whether it existed.
    pub fn delete_bucket(&mut self, name: &[u8]) -> bool {
        if !self.buckets.contains_key(name) {
            return false;
        }
        Arc::make_mut(&mut self.buckets).remove(name);
        self.ops.push(LogOp::DropBucket {
            bucket: name.to_vec(),
        });
        true
    }

    /// Publishes all changes atomically and releases the writer lock.
    ///
    /// A transaction that changed nothing does not touch the log and
    /// returns the current sequence.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit record cannot be written. Nothing is
    /// published in that case.
    pub fn commit(mut self) -> StoreResult<SequenceNumber> {
        self.finished = true;
        let ops = std::mem::take(&mut self.ops);
        let buckets = Arc::clone(&self.buckets);
        self.store.publish(buckets, ops)
    }

    /// Discards all changes and releases the writer lock.
    pub fn rollback(mut self) {
        self.finished = true;
        debug!(ops = self.ops.len(), snapshot = %self.snapshot_seq, "write transaction rolled back");
    }
}

impl Readable for WriteTransaction<'_> {
    fn bucket(&self, name: &[u8]) -> Option<Bucket<'_>> {
        self.buckets
            .get_key_value(name)
            .map(|(name, entries)| Bucket::new(name, entries))
    }

    fn bucket_names(&self) -> Vec<Vec<u8>> {
        self.buckets.keys().cloned().collect()
    }
}

impl Drop for WriteTransaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            debug!(ops = self.ops.len(), snapshot = %self.snapshot_seq, "write transaction dropped without commit");
        }
    }
}

impl std::fmt::Debug for WriteTransaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteTransaction")
            .field("snapshot_seq", &self.snapshot_seq)
            .field("op_count", &self.ops.len())
            .finish_non_exhaustive()
    }
}
