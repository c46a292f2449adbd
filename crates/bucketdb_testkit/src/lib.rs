//! # bucketdb testkit
//!
//! Test utilities for bucketdb.
//!
//! This crate provides:
//! - Test fixtures for in-memory and file-backed databases
//! - Property-based test generators using proptest
//! - A model harness that mirrors commands in plain collections
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bucketdb_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_database() {
//!     with_temp_db(|db| {
//!         db.hset("h", "f", "v").unwrap();
//!         // ... test operations
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod harness;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::harness::*;
}

pub use fixtures::*;
pub use generators::*;
pub use harness::*;
