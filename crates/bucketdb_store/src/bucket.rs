//! Bucket views handed out by transactions.

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::log::LogOp;
use crate::types::Entries;

/// Read access to the buckets visible in a transaction.
///
/// Implemented by both [`crate::ReadTransaction`] and
/// [`crate::WriteTransaction`], so read-only code can be written once.
pub trait Readable {
    /// Returns the bucket named `name`, or `None` if it doesn't exist.
    fn bucket(&self, name: &[u8]) -> Option<Bucket<'_>>;

    /// Returns the names of all buckets in key order.
    fn bucket_names(&self) -> Vec<Vec<u8>>;
}

/// A read-only view of one bucket.
///
/// Borrowed slices are only valid for the life of the transaction; copy
/// them out before it ends.
#[derive(Debug, Clone, Copy)]
pub struct Bucket<'t> {
    name: &'t [u8],
    entries: &'t Entries,
}

impl<'t> Bucket<'t> {
    pub(crate) fn new(name: &'t [u8], entries: &'t Entries) -> Self {
        Self { name, entries }
    }

    /// Bucket name.
    #[must_use]
    pub fn name(&self) -> &'t [u8] {
        self.name
    }

    /// Looks up `key`.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<&'t [u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Number of entries. O(1).
    #[must_use]
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Whether the bucket has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&'t [u8], &'t [u8])> + 't {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    /// Visits every entry in key order, stopping at the first error.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `visit`.
    pub fn for_each<F, E>(&self, mut visit: F) -> Result<(), E>
    where
        F: FnMut(&[u8], &[u8]) -> Result<(), E>,
    {
        for (key, value) in self.iter() {
            visit(key, value)?;
        }
        Ok(())
    }
}

/// A writable view of one bucket inside a write transaction.
///
/// Every change is recorded for the commit log.
#[derive(Debug)]
pub struct BucketMut<'t> {
    name: Vec<u8>,
    entries: &'t mut Entries,
    ops: &'t mut Vec<LogOp>,
    max_key_size: usize,
    max_value_size: usize,
}

impl<'t> BucketMut<'t> {
    pub(crate) fn new(
        name: &[u8],
        entries: &'t mut Entries,
        ops: &'t mut Vec<LogOp>,
        config: &StoreConfig,
    ) -> Self {
        Self {
            name: name.to_vec(),
            entries,
            ops,
            max_key_size: config.max_key_size,
            max_value_size: config.max_value_size,
        }
    }

    /// Bucket name.
    #[must_use]
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    /// Looks up `key`, including writes made earlier in this transaction.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Number of entries. O(1).
    #[must_use]
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Inserts or overwrites `key`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::KeyRequired`] if `key` is empty
    /// - [`StoreError::KeyTooLarge`] / [`StoreError::ValueTooLarge`] if a
    ///   configured limit is exceeded
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        if key.is_empty() {
            return Err(StoreError::KeyRequired);
        }
        if key.len() > self.max_key_size {
            return Err(StoreError::KeyTooLarge {
                len: key.len(),
                max: self.max_key_size,
            });
        }
        if value.len() > self.max_value_size {
            return Err(StoreError::ValueTooLarge {
                len: value.len(),
                max: self.max_value_size,
            });
        }

        self.entries.insert(key.to_vec(), value.to_vec());
        self.ops.push(LogOp::Put {
            bucket: self.name.clone(),
            key: key.to_vec(),
            value: value.to_vec(),
        });
        Ok(())
    }

    /// Removes `key`. Returns whether it was present.
    pub fn delete(&mut self, key: &[u8]) -> bool {
        if self.entries.remove(key).is_none() {
            return false;
        }
        self.ops.push(LogOp::Delete {
            bucket: self.name.clone(),
            key: key.to_vec(),
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries() -> Entries {
        let mut entries = Entries::new();
        entries.insert(b"b".to_vec(), b"2".to_vec());
        entries.insert(b"a".to_vec(), b"1".to_vec());
        entries
    }

    #[test]
    fn view_iterates_in_key_order() {
        let entries = entries();
        let bucket = Bucket::new(b"h", &entries);

        let keys: Vec<&[u8]> = bucket.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![b"a".as_slice(), b"b".as_slice()]);
        assert_eq!(bucket.get(b"b"), Some(b"2".as_slice()));
        assert_eq!(bucket.count(), 2);
    }

    #[test]
    fn for_each_stops_on_error() {
        let entries = entries();
        let bucket = Bucket::new(b"h", &entries);

        let mut seen = 0;
        let result: Result<(), &str> = bucket.for_each(|_, _| {
            seen += 1;
            Err("stop")
        });
        assert_eq!(result, Err("stop"));
        assert_eq!(seen, 1);
    }

    #[test]
    fn put_validates_and_records() {
        let mut entries = Entries::new();
        let mut ops = Vec::new();
        let config = StoreConfig::new().max_key_size(4).max_value_size(4);
        let mut bucket = BucketMut::new(b"h", &mut entries, &mut ops, &config);

        bucket.put(b"f", b"v").unwrap();
        assert!(matches!(bucket.put(b"", b"v"), Err(StoreError::KeyRequired)));
        assert!(matches!(
            bucket.put(b"toolong", b"v"),
            Err(StoreError::KeyTooLarge { len: 7, max: 4 })
        ));
        assert!(matches!(
            bucket.put(b"f", b"toolong"),
            Err(StoreError::ValueTooLarge { .. })
        ));
        assert!(bucket.delete(b"f"));
        assert!(!bucket.delete(b"f"));
        assert_eq!(bucket.count(), 0);

        assert_eq!(ops.len(), 2);
        assert!(matches!(ops[1], LogOp::Delete { .. }));
    }
}
