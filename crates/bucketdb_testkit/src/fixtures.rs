//! Test fixtures and database helpers.
//!
//! Provides convenience functions for setting up test databases
//! and common test scenarios.

use bucketdb_core::{Db, StoreConfig};
use bucketdb_storage::FileBackend;
use bucketdb_store::BucketStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// File name used for file-backed test stores.
pub const TEST_LOG_NAME: &str = "store.log";

/// A test database with automatic cleanup.
pub struct TestDb {
    /// The database instance.
    pub db: Db,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: Option<TempDir>,
}

impl TestDb {
    /// Creates a new in-memory test database.
    pub fn memory() -> Self {
        Self {
            db: Db::open_in_memory().expect("Failed to open in-memory database"),
            temp_dir: None,
        }
    }

    /// Creates a new in-memory test database whose writers give up after
    /// `timeout` instead of blocking.
    pub fn memory_with_write_timeout(timeout: Duration) -> Self {
        let store = BucketStore::open_with_backend(
            Box::new(bucketdb_storage::InMemoryBackend::new()),
            StoreConfig::new().write_timeout(Some(timeout)),
        )
        .expect("Failed to open in-memory store");
        Self {
            db: Db::new(Arc::new(store)),
            temp_dir: None,
        }
    }

    /// Creates a new file-based test database.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = open_file_db(&temp_dir.path().join(TEST_LOG_NAME));
        Self {
            db,
            temp_dir: Some(temp_dir),
        }
    }

    /// Returns the log path if file-based, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self.temp_dir.as_ref().map(|d| d.path().join(TEST_LOG_NAME))
    }

    /// Closes the store and opens it again from its log.
    ///
    /// Panics for in-memory databases, which have nothing to reopen from.
    pub fn reopen(&mut self) {
        let path = self.path().expect("Only file databases can be reopened");
        self.db.store().close().expect("Failed to close store");
        self.db = open_file_db(&path);
    }
}

fn open_file_db(path: &std::path::Path) -> Db {
    let backend =
        FileBackend::open_with_create_dirs(path).expect("Failed to create log backend");
    let store = BucketStore::open_with_backend(Box::new(backend), StoreConfig::default())
        .expect("Failed to open file store");
    Db::new(Arc::new(store))
}

impl std::ops::Deref for TestDb {
    type Target = Db;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

/// Runs a test with a temporary in-memory database.
///
/// # Example
///
/// ```rust
/// use bucketdb_testkit::with_temp_db;
///
/// with_temp_db(|db| {
///     db.sadd("s", ["a", "b"]).unwrap();
///     assert_eq!(db.scard("s").unwrap(), 2);
/// });
/// ```
pub fn with_temp_db<F, R>(f: F) -> R
where
    F: FnOnce(&Db) -> R,
{
    let test_db = TestDb::memory();
    f(&test_db.db)
}

/// Runs a test with a temporary file-based database.
pub fn with_file_db<F, R>(f: F) -> R
where
    F: FnOnce(&Db, &std::path::Path) -> R,
{
    let test_db = TestDb::file();
    let path = test_db.path().expect("File database should have a path");
    f(&test_db.db, &path)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use bucketdb_core::DbError;

    /// Creates a database holding `hash_count` hashes named `hash:{i}`,
    /// each with `fields_per_hash` fields `f{j}` set to `v{j}`.
    pub fn populated_hashes(hash_count: usize, fields_per_hash: usize) -> TestDb {
        let test_db = TestDb::memory();
        test_db
            .multi_update(|tx| {
                use bucketdb_core::WriteTx;
                for i in 0..hash_count {
                    let fields = (0..fields_per_hash).map(|j| (format!("f{j}"), format!("v{j}")));
                    tx.hmset(format!("hash:{i}"), fields)?;
                }
                Ok::<_, DbError>(())
            })
            .expect("Failed to populate hashes");
        test_db
    }

    /// Creates a database holding the given sets.
    pub fn populated_sets(sets: &[(&str, &[&str])]) -> TestDb {
        let test_db = TestDb::memory();
        for (key, members) in sets {
            test_db
                .sadd(key, members.iter())
                .expect("Failed to populate set");
        }
        test_db
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bucketdb_store::Readable;

    #[test]
    fn memory_db_starts_empty() {
        with_temp_db(|db| {
            assert_eq!(db.hlen("anything").unwrap(), 0);
            assert!(db.store().begin_read().unwrap().bucket_names().is_empty());
        });
    }

    #[test]
    fn file_db_reopens_with_data() {
        let mut test_db = TestDb::file();
        test_db.hset("h", "f", "v").unwrap();
        test_db.reopen();
        assert_eq!(test_db.hget("h", "f").unwrap(), b"v");
    }

    #[test]
    fn populated_hashes_has_expected_shape() {
        let test_db = scenarios::populated_hashes(3, 4);
        assert_eq!(test_db.hlen("hash:2").unwrap(), 4);
        assert_eq!(test_db.hget("hash:0", "f3").unwrap(), b"v3");
    }

    #[test]
    fn populated_sets_has_members() {
        let test_db = scenarios::populated_sets(&[("a", &["x", "y"][..]), ("b", &["y"][..])]);
        assert_eq!(test_db.sdiff("a", ["b"]).unwrap(), vec![b"x".to_vec()]);
    }
}
