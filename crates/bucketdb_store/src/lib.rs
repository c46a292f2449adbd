//! # bucketdb store
//!
//! Embedded, transactional bucket store.
//!
//! This crate provides:
//! - Named buckets, each an ordered map of byte-string keys to values
//! - Single-writer / multi-reader transactions with snapshot isolation
//! - A checksummed commit log replayed on open
//!
//! Buckets are created lazily by [`WriteTransaction::create_bucket_if_not_exists`]
//! and only exist at the top level.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod bucket;
mod config;
mod error;
mod log;
mod store;
mod transaction;
mod types;

pub use bucket::{Bucket, BucketMut, Readable};
pub use config::{StoreConfig, DEFAULT_MAX_KEY_SIZE, DEFAULT_MAX_VALUE_SIZE};
pub use error::{StoreError, StoreResult};
pub use log::{CommitRecord, LogOp, LOG_MAGIC, LOG_VERSION};
pub use store::BucketStore;
pub use transaction::{ReadTransaction, WriteTransaction};
pub use types::SequenceNumber;
