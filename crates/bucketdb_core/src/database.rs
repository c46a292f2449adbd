//! Database facade.

use crate::command::{ReadTx, WriteTx};
use crate::error::{DbError, DbResult};
use crate::tx::{ReadOnlyTx, Tx};
use bucketdb_store::{BucketStore, StoreConfig};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// The main database handle.
///
/// Every single-command method runs in its own store transaction: queries
/// in a read-only one, mutations in a read-write one that is committed
/// before the method returns. Each call is atomic and isolated, but two
/// calls are not atomic together. Use [`Db::multi_update`] or
/// [`Db::multi_read`] to group commands.
///
/// # Example
///
/// ```rust
/// use bucketdb_core::{Db, DbError, ReadTx, WriteTx};
///
/// let db = Db::open_in_memory().unwrap();
/// db.hset("user:1", "name", "ada").unwrap();
///
/// db.multi_update(|tx| {
///     tx.sadd("users", ["user:1"])?;
///     tx.hset("user:1", "active", "yes")?;
///     Ok::<_, DbError>(())
/// })
/// .unwrap();
///
/// assert_eq!(db.hget("user:1", "name").unwrap(), b"ada");
/// assert!(db.sismember("users", "user:1").unwrap());
/// ```
///
/// # Nesting
///
/// A `multi_update` body holds the store's only writer lock. Calling a
/// single-command write method (or another `multi_update`) on the same
/// `Db` from inside the body blocks forever, or fails with
/// `StoreError::WriteTimeout` when the store has a write timeout. Use the
/// `Tx` handle passed to the body instead.
#[derive(Debug, Clone)]
pub struct Db {
    store: Arc<BucketStore>,
}

impl Db {
    /// Wraps an open store. The caller keeps ownership of its lifecycle.
    #[must_use]
    pub fn new(store: Arc<BucketStore>) -> Self {
        Self { store }
    }

    /// Opens a database on a fresh in-memory store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened.
    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self::new(Arc::new(BucketStore::open_in_memory()?)))
    }

    /// Opens a database on the store file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened or recovered.
    pub fn open_path(path: &Path, config: StoreConfig) -> DbResult<Self> {
        Ok(Self::new(Arc::new(BucketStore::open_path(path, config)?)))
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<BucketStore> {
        &self.store
    }

    /// Runs `body` in one read-write transaction.
    ///
    /// Commits if `body` returns `Ok`. If it returns `Err`, every write it
    /// made is discarded and the error is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns the body's error, or a store error from beginning or
    /// committing the transaction.
    pub fn multi_update<F, T, E>(&self, body: F) -> Result<T, E>
    where
        F: FnOnce(&mut Tx<'_, '_>) -> Result<T, E>,
        E: From<DbError>,
    {
        let mut txn = self.store.begin_write().map_err(DbError::from)?;
        match body(&mut Tx::new(&mut txn)) {
            Ok(value) => {
                txn.commit().map_err(DbError::from)?;
                Ok(value)
            }
            Err(err) => {
                txn.rollback();
                Err(err)
            }
        }
    }

    /// Runs `body` in one read-only transaction.
    ///
    /// The body gets a [`ReadOnlyTx`], which has no write commands.
    ///
    /// # Errors
    ///
    /// Returns the body's error, or a store error from beginning the
    /// transaction.
    pub fn multi_read<F, T, E>(&self, body: F) -> Result<T, E>
    where
        F: FnOnce(&ReadOnlyTx<'_>) -> Result<T, E>,
        E: From<DbError>,
    {
        let txn = self.store.begin_read().map_err(DbError::from)?;
        body(&ReadOnlyTx::new(&txn))
    }

    /// See [`ReadTx::hexists`].
    pub fn hexists(&self, key: impl AsRef<[u8]>, field: impl AsRef<[u8]>) -> DbResult<bool> {
        self.multi_read(|tx| tx.hexists(key, field))
    }

    /// See [`ReadTx::hget`].
    pub fn hget(&self, key: impl AsRef<[u8]>, field: impl AsRef<[u8]>) -> DbResult<Vec<u8>> {
        self.multi_read(|tx| tx.hget(key, field))
    }

    /// See [`ReadTx::hgetall`].
    pub fn hgetall(&self, key: impl AsRef<[u8]>) -> DbResult<BTreeMap<Vec<u8>, Vec<u8>>> {
        self.multi_read(|tx| tx.hgetall(key))
    }

    /// See [`ReadTx::hkeys`].
    pub fn hkeys(&self, key: impl AsRef<[u8]>) -> DbResult<Vec<Vec<u8>>> {
        self.multi_read(|tx| tx.hkeys(key))
    }

    /// See [`ReadTx::hlen`].
    pub fn hlen(&self, key: impl AsRef<[u8]>) -> DbResult<usize> {
        self.multi_read(|tx| tx.hlen(key))
    }

    /// See [`ReadTx::hmget`].
    pub fn hmget<I, F>(&self, key: impl AsRef<[u8]>, fields: I) -> DbResult<Vec<Vec<u8>>>
    where
        I: IntoIterator<Item = F>,
        F: AsRef<[u8]>,
    {
        self.multi_read(|tx| tx.hmget(key, fields))
    }

    /// See [`ReadTx::scard`].
    pub fn scard(&self, key: impl AsRef<[u8]>) -> DbResult<usize> {
        self.multi_read(|tx| tx.scard(key))
    }

    /// See [`ReadTx::sismember`].
    pub fn sismember(&self, key: impl AsRef<[u8]>, member: impl AsRef<[u8]>) -> DbResult<bool> {
        self.multi_read(|tx| tx.sismember(key, member))
    }

    /// See [`ReadTx::smembers`].
    pub fn smembers(&self, key: impl AsRef<[u8]>) -> DbResult<Vec<Vec<u8>>> {
        self.multi_read(|tx| tx.smembers(key))
    }

    /// See [`WriteTx::del`].
    pub fn del<I, K>(&self, keys: I) -> DbResult<()>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<[u8]>,
    {
        self.multi_update(|tx| tx.del(keys))
    }

    /// See [`WriteTx::hdel`].
    pub fn hdel(&self, key: impl AsRef<[u8]>, field: impl AsRef<[u8]>) -> DbResult<()> {
        self.multi_update(|tx| tx.hdel(key, field))
    }

    /// See [`WriteTx::hdelall`].
    pub fn hdelall(&self, key: impl AsRef<[u8]>) -> DbResult<()> {
        self.multi_update(|tx| tx.hdelall(key))
    }

    /// See [`WriteTx::hset`].
    pub fn hset(
        &self,
        key: impl AsRef<[u8]>,
        field: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> DbResult<()> {
        self.multi_update(|tx| tx.hset(key, field, value))
    }

    /// See [`WriteTx::hmset`].
    pub fn hmset<I, F, V>(&self, key: impl AsRef<[u8]>, fields: I) -> DbResult<()>
    where
        I: IntoIterator<Item = (F, V)>,
        F: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        self.multi_update(|tx| tx.hmset(key, fields))
    }

    /// See [`WriteTx::sadd`].
    pub fn sadd<I, M>(&self, key: impl AsRef<[u8]>, members: I) -> DbResult<()>
    where
        I: IntoIterator<Item = M>,
        M: AsRef<[u8]>,
    {
        self.multi_update(|tx| tx.sadd(key, members))
    }

    /// See [`WriteTx::srem`].
    pub fn srem<I, M>(&self, key: impl AsRef<[u8]>, members: I) -> DbResult<()>
    where
        I: IntoIterator<Item = M>,
        M: AsRef<[u8]>,
    {
        self.multi_update(|tx| tx.srem(key, members))
    }

    /// See [`WriteTx::smove`].
    pub fn smove(
        &self,
        source: impl AsRef<[u8]>,
        destination: impl AsRef<[u8]>,
        member: impl AsRef<[u8]>,
    ) -> DbResult<bool> {
        self.multi_update(|tx| tx.smove(source, destination, member))
    }

    /// See [`ReadTx::sdiff`].
    pub fn sdiff<I, K>(&self, key: impl AsRef<[u8]>, diff_keys: I) -> DbResult<Vec<Vec<u8>>>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<[u8]>,
    {
        self.multi_read(|tx| tx.sdiff(key, diff_keys))
    }
}
