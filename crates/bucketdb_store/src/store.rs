//! The bucket store handle.

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::log::{CommitLog, CommitRecord, LogOp};
use crate::transaction::{ReadTransaction, WriteTransaction};
use crate::types::{Buckets, SequenceNumber};
use bucketdb_storage::{FileBackend, InMemoryBackend, StorageBackend};
use parking_lot::{Mutex, RwLock};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// An embedded, transactional store of named buckets.
///
/// Each bucket is an ordered map from byte-string keys to byte-string
/// values. Buckets are only reachable through a transaction:
///
/// - any number of [`ReadTransaction`]s, each on a consistent snapshot
/// - at most one [`WriteTransaction`] at a time; further writers block
///   (or time out, see [`StoreConfig::write_timeout`])
///
/// Committed changes are appended to a commit log and replayed on open.
///
/// # Example
///
/// ```rust
/// use bucketdb_store::{BucketStore, Readable, StoreError};
///
/// let store = BucketStore::open_in_memory().unwrap();
/// store
///     .update(|txn| {
///         txn.create_bucket_if_not_exists(b"users")?.put(b"ada", b"1")?;
///         Ok::<_, StoreError>(())
///     })
///     .unwrap();
///
/// let txn = store.begin_read().unwrap();
/// assert_eq!(txn.bucket(b"users").unwrap().get(b"ada"), Some(b"1".as_slice()));
/// ```
pub struct BucketStore {
    config: StoreConfig,
    log: Mutex<CommitLog>,
    committed: RwLock<Arc<Buckets>>,
    committed_seq: AtomicU64,
    write_lock: Mutex<()>,
    is_open: RwLock<bool>,
}

impl BucketStore {
    /// Opens a store whose commit log lives in the file at `path`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if the file is missing and
    ///   `create_if_missing` is false
    /// - [`StoreError::Corrupted`] / [`StoreError::ChecksumMismatch`] if the
    ///   log cannot be replayed
    pub fn open_path(path: &Path, config: StoreConfig) -> StoreResult<Self> {
        if !config.create_if_missing && !path.exists() {
            return Err(StoreError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let backend = FileBackend::open_with_create_dirs(path)?;
        info!(path = %path.display(), "opening bucket store");
        Self::open_with_backend(Box::new(backend), config)
    }

    /// Opens a store that lives only in memory.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::open_with_backend(Box::new(InMemoryBackend::new()), StoreConfig::default())
    }

    /// Opens a store on an arbitrary log backend, replaying its contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read or is corrupted.
    pub fn open_with_backend(
        backend: Box<dyn StorageBackend>,
        config: StoreConfig,
    ) -> StoreResult<Self> {
        let mut log = CommitLog::new(backend, config.sync_on_commit);
        let records = log.replay()?;

        let mut buckets = Buckets::new();
        let mut sequence = SequenceNumber::default();
        for record in &records {
            for op in &record.ops {
                op.apply(&mut buckets);
            }
            sequence = sequence.max(record.sequence);
        }
        info!(
            records = records.len(),
            buckets = buckets.len(),
            %sequence,
            "bucket store recovered"
        );

        Ok(Self {
            config,
            log: Mutex::new(log),
            committed: RwLock::new(Arc::new(buckets)),
            committed_seq: AtomicU64::new(sequence.as_u64()),
            write_lock: Mutex::new(()),
            is_open: RwLock::new(true),
        })
    }

    /// The configuration the store was opened with.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Sequence number of the latest commit.
    #[must_use]
    pub fn committed_seq(&self) -> SequenceNumber {
        SequenceNumber::new(self.committed_seq.load(Ordering::SeqCst))
    }

    /// Whether the store is still open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.is_open.read()
    }

    /// Begins a read-only transaction on the latest committed snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Closed`] if the store is closed.
    pub fn begin_read(&self) -> StoreResult<ReadTransaction> {
        self.ensure_open()?;
        let committed = self.committed.read();
        Ok(ReadTransaction::new(
            Arc::clone(&*committed),
            self.committed_seq(),
        ))
    }

    /// Begins a read-write transaction, taking the writer lock.
    ///
    /// Blocks while another write transaction is active. Calling this again
    /// on the same thread while holding a write transaction deadlocks unless
    /// a write timeout is configured.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Closed`] if the store is closed
    /// - [`StoreError::WriteTimeout`] if the lock wasn't acquired in time
    pub fn begin_write(&self) -> StoreResult<WriteTransaction<'_>> {
        self.ensure_open()?;
        let guard = match self.config.write_timeout {
            Some(timeout) => self
                .write_lock
                .try_lock_for(timeout)
                .ok_or(StoreError::WriteTimeout { timeout })?,
            None => self.write_lock.lock(),
        };
        // The store may have been closed while we waited.
        self.ensure_open()?;

        let buckets = Arc::clone(&*self.committed.read());
        Ok(WriteTransaction::new(
            self,
            guard,
            buckets,
            self.committed_seq(),
        ))
    }

    /// Runs `f` in a write transaction, committing iff it returns `Ok`.
    ///
    /// # Errors
    ///
    /// Returns the error from `f` unchanged (after rolling back), or a
    /// store error from beginning or committing the transaction.
    pub fn update<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut WriteTransaction<'_>) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut txn = self.begin_write()?;
        match f(&mut txn) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(err) => {
                txn.rollback();
                Err(err)
            }
        }
    }

    /// Runs `f` in a read-only transaction.
    ///
    /// # Errors
    ///
    /// Returns the error from `f`, or [`StoreError::Closed`].
    pub fn view<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&ReadTransaction) -> Result<T, E>,
        E: From<StoreError>,
    {
        let txn = self.begin_read()?;
        f(&txn)
    }

    /// Closes the store.
    ///
    /// Waits for an active writer to finish, syncs the commit log and
    /// rejects every later `begin_read`/`begin_write`. Read transactions
    /// already open keep their snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the final sync fails.
    pub fn close(&self) -> StoreResult<()> {
        let _writer = self.write_lock.lock();
        let mut is_open = self.is_open.write();
        if !*is_open {
            return Ok(());
        }
        self.log.lock().sync()?;
        *is_open = false;
        info!(sequence = %self.committed_seq(), "bucket store closed");
        Ok(())
    }

    /// Writes and publishes a finished write transaction. Called with the
    /// writer lock held.
    pub(crate) fn publish(
        &self,
        buckets: Arc<Buckets>,
        ops: Vec<LogOp>,
    ) -> StoreResult<SequenceNumber> {
        if ops.is_empty() {
            return Ok(self.committed_seq());
        }

        let sequence = self.committed_seq().next();
        let op_count = ops.len();
        let record = CommitRecord { sequence, ops };
        self.log.lock().append(&record)?;

        // Readers take the snapshot and its sequence under the same lock.
        let mut committed = self.committed.write();
        *committed = buckets;
        self.committed_seq
            .store(sequence.as_u64(), Ordering::SeqCst);
        drop(committed);
        debug!(%sequence, ops = op_count, "write transaction committed");
        Ok(sequence)
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(StoreError::Closed)
        }
    }
}

impl std::fmt::Debug for BucketStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketStore")
            .field("committed_seq", &self.committed_seq())
            .field("is_open", &self.is_open())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::Readable;
    use std::thread;
    use std::time::Duration;

    fn put(store: &BucketStore, bucket: &[u8], key: &[u8], value: &[u8]) {
        let mut txn = store.begin_write().unwrap();
        txn.create_bucket_if_not_exists(bucket)
            .unwrap()
            .put(key, value)
            .unwrap();
        txn.commit().unwrap();
    }

    #[test]
    fn committed_write_is_visible() {
        let store = BucketStore::open_in_memory().unwrap();
        put(&store, b"h", b"f", b"v");

        let txn = store.begin_read().unwrap();
        let bucket = txn.bucket(b"h").unwrap();
        assert_eq!(bucket.get(b"f"), Some(b"v".as_slice()));
        assert_eq!(store.committed_seq().as_u64(), 1);
    }

    #[test]
    fn rollback_discards_changes() {
        let store = BucketStore::open_in_memory().unwrap();
        let mut txn = store.begin_write().unwrap();
        txn.create_bucket_if_not_exists(b"h")
            .unwrap()
            .put(b"f", b"v")
            .unwrap();
        txn.rollback();

        assert!(store.begin_read().unwrap().bucket(b"h").is_none());
        assert_eq!(store.committed_seq().as_u64(), 0);
    }

    #[test]
    fn dropped_write_transaction_rolls_back() {
        let store = BucketStore::open_in_memory().unwrap();
        {
            let mut txn = store.begin_write().unwrap();
            txn.create_bucket_if_not_exists(b"h").unwrap();
        }
        assert!(store.begin_read().unwrap().bucket_names().is_empty());
        // The writer lock was released.
        store.begin_write().unwrap().rollback();
    }

    #[test]
    fn empty_commit_does_not_advance_sequence() {
        let store = BucketStore::open_in_memory().unwrap();
        let seq = store.begin_write().unwrap().commit().unwrap();
        assert_eq!(seq.as_u64(), 0);
    }

    #[test]
    fn reader_keeps_its_snapshot() {
        let store = BucketStore::open_in_memory().unwrap();
        put(&store, b"h", b"f", b"old");

        let reader = store.begin_read().unwrap();
        put(&store, b"h", b"f", b"new");
        put(&store, b"other", b"k", b"v");

        assert_eq!(
            reader.bucket(b"h").unwrap().get(b"f"),
            Some(b"old".as_slice())
        );
        assert!(reader.bucket(b"other").is_none());
        assert_eq!(reader.snapshot_seq().as_u64(), 1);

        let fresh = store.begin_read().unwrap();
        assert_eq!(fresh.bucket(b"h").unwrap().get(b"f"), Some(b"new".as_slice()));
    }

    #[test]
    fn uncommitted_writes_are_invisible_to_readers() {
        let store = BucketStore::open_in_memory().unwrap();
        let mut writer = store.begin_write().unwrap();
        writer
            .create_bucket_if_not_exists(b"h")
            .unwrap()
            .put(b"f", b"v")
            .unwrap();

        assert!(store.begin_read().unwrap().bucket(b"h").is_none());
        assert_eq!(writer.bucket(b"h").unwrap().count(), 1);
        writer.commit().unwrap();
        assert!(store.begin_read().unwrap().bucket(b"h").is_some());
    }

    #[test]
    fn second_writer_times_out() {
        let config = StoreConfig::new().write_timeout(Some(Duration::from_millis(20)));
        let store =
            BucketStore::open_with_backend(Box::new(InMemoryBackend::new()), config).unwrap();

        let first = store.begin_write().unwrap();
        thread::scope(|scope| {
            let handle = scope.spawn(|| store.begin_write().map(|txn| txn.rollback()));
            let result = handle.join().unwrap();
            assert!(matches!(result, Err(StoreError::WriteTimeout { .. })));
        });
        first.rollback();
        assert!(store.begin_write().is_ok());
    }

    #[test]
    fn writers_are_serialized() {
        let store = Arc::new(BucketStore::open_in_memory().unwrap());
        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || put(&store, b"h", &[b'k', i], &[i]))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let txn = store.begin_read().unwrap();
        assert_eq!(txn.bucket(b"h").unwrap().count(), 8);
        assert_eq!(store.committed_seq().as_u64(), 8);
    }

    #[test]
    fn delete_bucket_reports_presence() {
        let store = BucketStore::open_in_memory().unwrap();
        put(&store, b"h", b"f", b"v");

        let mut txn = store.begin_write().unwrap();
        assert!(txn.delete_bucket(b"h"));
        assert!(!txn.delete_bucket(b"h"));
        assert!(txn.bucket_mut(b"h").is_none());
        txn.commit().unwrap();

        assert!(store.begin_read().unwrap().bucket(b"h").is_none());
    }

    #[test]
    fn empty_bucket_name_is_rejected() {
        let store = BucketStore::open_in_memory().unwrap();
        let mut txn = store.begin_write().unwrap();
        assert!(matches!(
            txn.create_bucket_if_not_exists(b""),
            Err(StoreError::BucketNameRequired)
        ));
    }

    #[test]
    fn closed_store_rejects_transactions() {
        let store = BucketStore::open_in_memory().unwrap();
        store.close().unwrap();
        assert!(!store.is_open());
        assert!(matches!(store.begin_read(), Err(StoreError::Closed)));
        assert!(matches!(store.begin_write(), Err(StoreError::Closed)));
        store.close().unwrap();
    }

    #[test]
    fn update_rolls_back_on_error() {
        let store = BucketStore::open_in_memory().unwrap();
        let result: StoreResult<()> = store.update(|txn| {
            txn.create_bucket_if_not_exists(b"h")?.put(b"f", b"v")?;
            Err(StoreError::KeyRequired)
        });
        assert!(matches!(result, Err(StoreError::KeyRequired)));

        let count = store
            .view(|txn| Ok::<_, StoreError>(txn.bucket_names().len()))
            .unwrap();
        assert_eq!(count, 0);
    }
}
