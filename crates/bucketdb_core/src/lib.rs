//! # bucketdb core
//!
//! Redis-style hash and set commands over the bucketdb store.
//!
//! This crate provides:
//! - Hash commands (`HSET`, `HGET`, `HMGET`, `HGETALL`, ...) and set
//!   commands (`SADD`, `SREM`, `SMOVE`, `SDIFF`, ...), one bucket per key
//! - Transaction handles that split read and write capabilities
//! - A [`Db`] facade running each command in its own transaction, plus
//!   [`Db::multi_update`] and [`Db::multi_read`] to group commands
//!
//! ## Usage
//!
//! ```rust
//! use bucketdb_core::{Db, DbError, ReadTx, WriteTx};
//!
//! let db = Db::open_in_memory().unwrap();
//! db.sadd("colors", ["red", "green", "blue"]).unwrap();
//! db.sadd("warm", ["red"]).unwrap();
//!
//! let cool = db.sdiff("colors", ["warm"]).unwrap();
//! assert_eq!(cool, vec![b"blue".to_vec(), b"green".to_vec()]);
//!
//! let moved = db
//!     .multi_update(|tx| {
//!         let moved = tx.smove("colors", "warm", "green")?;
//!         tx.hset("palette", "size", "2")?;
//!         Ok::<_, DbError>(moved)
//!     })
//!     .unwrap();
//! assert!(moved);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod command;
mod database;
mod error;
mod tx;

pub use command::{ReadTx, WriteTx, SET_MEMBER_VALUE};
pub use database::Db;
pub use error::{DbError, DbResult};
pub use tx::{ReadOnlyTx, Tx};

pub use bucketdb_store::{BucketStore, StoreConfig, StoreError};
