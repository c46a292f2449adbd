//! Transaction handles.

use crate::command::{ReadTx, WriteTx};
use crate::error::DbResult;
use bucketdb_store::{ReadTransaction, Readable, WriteTransaction};

/// Command handle over a read-write store transaction.
///
/// Implements both [`ReadTx`] and [`WriteTx`]. Reads see the writes made
/// earlier through the same handle. Nothing is visible to other
/// transactions until the underlying transaction commits.
///
/// Do not call single-shot [`crate::Db`] write methods while a `Tx` is
/// alive on the same thread: the store has one writer lock and it is not
/// re-entrant.
#[derive(Debug)]
pub struct Tx<'t, 's> {
    txn: &'t mut WriteTransaction<'s>,
}

impl<'t, 's> Tx<'t, 's> {
    /// Wraps a write transaction.
    pub fn new(txn: &'t mut WriteTransaction<'s>) -> Self {
        Self { txn }
    }

    /// The underlying store transaction, for raw bucket access.
    pub fn transaction(&mut self) -> &mut WriteTransaction<'s> {
        &mut *self.txn
    }
}

impl ReadTx for Tx<'_, '_> {
    fn readable(&self) -> &dyn Readable {
        &*self.txn
    }
}

impl WriteTx for Tx<'_, '_> {
    fn del<I, K>(&mut self, keys: I) -> DbResult<()>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<[u8]>,
    {
        for key in keys {
            self.txn.delete_bucket(key.as_ref());
        }
        Ok(())
    }

    fn hdel(&mut self, key: impl AsRef<[u8]>, field: impl AsRef<[u8]>) -> DbResult<()> {
        let (key, field) = (key.as_ref(), field.as_ref());
        // Only touch the bucket when there is something to remove, so a
        // no-op delete doesn't copy it.
        if !self.hexists(key, field)? {
            return Ok(());
        }
        if let Some(mut bucket) = self.txn.bucket_mut(key) {
            bucket.delete(field);
        }
        Ok(())
    }

    fn hdelall(&mut self, key: impl AsRef<[u8]>) -> DbResult<()> {
        self.txn.delete_bucket(key.as_ref());
        Ok(())
    }

    fn hset(
        &mut self,
        key: impl AsRef<[u8]>,
        field: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> DbResult<()> {
        self.txn
            .create_bucket_if_not_exists(key.as_ref())?
            .put(field.as_ref(), value.as_ref())?;
        Ok(())
    }

    fn hmset<I, F, V>(&mut self, key: impl AsRef<[u8]>, fields: I) -> DbResult<()>
    where
        I: IntoIterator<Item = (F, V)>,
        F: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let mut bucket = self.txn.create_bucket_if_not_exists(key.as_ref())?;
        for (field, value) in fields {
            bucket.put(field.as_ref(), value.as_ref())?;
        }
        Ok(())
    }
}

/// Command handle over a read-only store transaction.
///
/// Implements [`ReadTx`] only, so write commands do not exist on it.
#[derive(Debug, Clone, Copy)]
pub struct ReadOnlyTx<'t> {
    txn: &'t ReadTransaction,
}

impl<'t> ReadOnlyTx<'t> {
    /// Wraps a read transaction.
    #[must_use]
    pub fn new(txn: &'t ReadTransaction) -> Self {
        Self { txn }
    }

    /// The underlying store transaction, for raw bucket access.
    #[must_use]
    pub fn transaction(&self) -> &'t ReadTransaction {
        self.txn
    }
}

impl ReadTx for ReadOnlyTx<'_> {
    fn readable(&self) -> &dyn Readable {
        self.txn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use bucketdb_store::{BucketStore, StoreError};
    use std::collections::BTreeSet;

    fn set(members: &[&str]) -> BTreeSet<Vec<u8>> {
        members.iter().map(|m| m.as_bytes().to_vec()).collect()
    }

    #[test]
    fn reads_see_own_writes() {
        let store = BucketStore::open_in_memory().unwrap();
        let mut txn = store.begin_write().unwrap();
        let mut tx = Tx::new(&mut txn);

        tx.hset("k", "f", "v").unwrap();
        assert_eq!(tx.hget("k", "f").unwrap(), b"v");
        assert_eq!(tx.hlen("k").unwrap(), 1);
        assert_eq!(tx.transaction().op_count(), 2);
    }

    #[test]
    fn hdel_of_missing_field_records_nothing() {
        let store = BucketStore::open_in_memory().unwrap();
        let mut txn = store.begin_write().unwrap();
        let mut tx = Tx::new(&mut txn);

        tx.hdel("absent", "f").unwrap();
        tx.hset("k", "f", "v").unwrap();
        tx.hdel("k", "other").unwrap();
        assert_eq!(tx.transaction().op_count(), 2);

        tx.hdel("k", "f").unwrap();
        assert!(!tx.hexists("k", "f").unwrap());
        assert_eq!(tx.transaction().op_count(), 3);
    }

    #[test]
    fn hmset_fails_fast() {
        let store = BucketStore::open_in_memory().unwrap();
        let mut txn = store.begin_write().unwrap();
        let mut tx = Tx::new(&mut txn);

        let result = tx.hmset("k", [("a", "1"), ("", "2"), ("c", "3")]);
        assert!(matches!(
            result,
            Err(DbError::Store(StoreError::KeyRequired))
        ));
        assert!(tx.hexists("k", "a").unwrap());
        assert!(!tx.hexists("k", "c").unwrap());
    }

    #[test]
    fn sadd_fails_fast() {
        let store = BucketStore::open_in_memory().unwrap();
        let mut txn = store.begin_write().unwrap();
        let mut tx = Tx::new(&mut txn);

        assert!(tx.sadd("s", ["a", "", "b"]).is_err());
        assert_eq!(set(&["a"]), tx.smembers("s").unwrap().into_iter().collect::<BTreeSet<_>>());
    }

    #[test]
    fn hset_with_empty_key_is_rejected() {
        let store = BucketStore::open_in_memory().unwrap();
        let mut txn = store.begin_write().unwrap();
        let mut tx = Tx::new(&mut txn);

        assert!(matches!(
            tx.hset("", "f", "v"),
            Err(DbError::Store(StoreError::BucketNameRequired))
        ));
    }

    #[test]
    fn smove_within_same_set_keeps_member() {
        let store = BucketStore::open_in_memory().unwrap();
        let mut txn = store.begin_write().unwrap();
        let mut tx = Tx::new(&mut txn);

        tx.sadd("s", ["m"]).unwrap();
        assert!(tx.smove("s", "s", "m").unwrap());
        assert!(tx.sismember("s", "m").unwrap());
    }

    #[test]
    fn read_only_handle_reads_snapshot() {
        let store = BucketStore::open_in_memory().unwrap();
        {
            let mut txn = store.begin_write().unwrap();
            Tx::new(&mut txn).sadd("s", ["x", "y"]).unwrap();
            txn.commit().unwrap();
        }

        let txn = store.begin_read().unwrap();
        let tx = ReadOnlyTx::new(&txn);
        assert_eq!(tx.scard("s").unwrap(), 2);
        assert_eq!(tx.smembers("s").unwrap(), vec![b"x".to_vec(), b"y".to_vec()]);
        assert_eq!(tx.transaction().snapshot_seq().as_u64(), 1);
    }
}
