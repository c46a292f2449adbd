//! Hash and set command semantics.
//!
//! A hash is a bucket whose keys are field names and whose values are the
//! field values. A set is a bucket whose keys are the members and whose
//! values are all [`SET_MEMBER_VALUE`]. Nothing records which of the two a
//! bucket is meant to be; callers can read a hash as a set and vice versa.
//!
//! An absent bucket reads exactly like an empty one.
//!
//! Commands are split by capability: [`ReadTx`] works in any transaction,
//! [`WriteTx`] only in a read-write one.

use crate::error::DbResult;
use bucketdb_store::Readable;
use std::collections::{BTreeMap, BTreeSet};

/// Value stored for every set member.
pub const SET_MEMBER_VALUE: &[u8] = b"";

/// Read commands, available in read-only and read-write transactions.
///
/// Every result is copied out of the store, so it stays valid after the
/// transaction ends.
pub trait ReadTx {
    /// The buckets visible to this transaction.
    fn readable(&self) -> &dyn Readable;

    /// Whether `field` is set in hash `key`.
    fn hexists(&self, key: impl AsRef<[u8]>, field: impl AsRef<[u8]>) -> DbResult<bool> {
        Ok(self
            .readable()
            .bucket(key.as_ref())
            .is_some_and(|bucket| bucket.get(field.as_ref()).is_some()))
    }

    /// Value of `field` in hash `key`, or empty if either is missing.
    fn hget(&self, key: impl AsRef<[u8]>, field: impl AsRef<[u8]>) -> DbResult<Vec<u8>> {
        Ok(self
            .readable()
            .bucket(key.as_ref())
            .and_then(|bucket| bucket.get(field.as_ref()))
            .map(<[u8]>::to_vec)
            .unwrap_or_default())
    }

    /// Every field and value of hash `key`.
    fn hgetall(&self, key: impl AsRef<[u8]>) -> DbResult<BTreeMap<Vec<u8>, Vec<u8>>> {
        Ok(self
            .readable()
            .bucket(key.as_ref())
            .map(|bucket| {
                bucket
                    .iter()
                    .map(|(field, value)| (field.to_vec(), value.to_vec()))
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Field names of hash `key` in byte order.
    fn hkeys(&self, key: impl AsRef<[u8]>) -> DbResult<Vec<Vec<u8>>> {
        Ok(self
            .readable()
            .bucket(key.as_ref())
            .map(|bucket| bucket.iter().map(|(field, _)| field.to_vec()).collect())
            .unwrap_or_default())
    }

    /// Number of fields in hash `key`. O(1).
    fn hlen(&self, key: impl AsRef<[u8]>) -> DbResult<usize> {
        Ok(self
            .readable()
            .bucket(key.as_ref())
            .map_or(0, |bucket| bucket.count()))
    }

    /// Values of `fields` in hash `key`, one slot per requested field.
    ///
    /// Missing fields (or a missing hash) give an empty value in their
    /// slot, so the output is always as long as the input.
    fn hmget<I, F>(&self, key: impl AsRef<[u8]>, fields: I) -> DbResult<Vec<Vec<u8>>>
    where
        I: IntoIterator<Item = F>,
        F: AsRef<[u8]>,
    {
        let bucket = self.readable().bucket(key.as_ref());
        Ok(fields
            .into_iter()
            .map(|field| {
                bucket
                    .and_then(|bucket| bucket.get(field.as_ref()))
                    .map(<[u8]>::to_vec)
                    .unwrap_or_default()
            })
            .collect())
    }

    /// Number of members in set `key`.
    fn scard(&self, key: impl AsRef<[u8]>) -> DbResult<usize> {
        self.hlen(key)
    }

    /// Whether `member` belongs to set `key`.
    fn sismember(&self, key: impl AsRef<[u8]>, member: impl AsRef<[u8]>) -> DbResult<bool> {
        self.hexists(key, member)
    }

    /// Members of set `key` in byte order.
    fn smembers(&self, key: impl AsRef<[u8]>) -> DbResult<Vec<Vec<u8>>> {
        self.hkeys(key)
    }

    /// Members of set `key` that are in none of the `diff_keys` sets.
    ///
    /// Missing sets count as empty. The result comes back in byte order,
    /// but callers should treat it as unordered.
    fn sdiff<I, K>(&self, key: impl AsRef<[u8]>, diff_keys: I) -> DbResult<Vec<Vec<u8>>>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<[u8]>,
    {
        let mut members: BTreeSet<Vec<u8>> = self.smembers(key)?.into_iter().collect();
        for diff_key in diff_keys {
            if members.is_empty() {
                break;
            }
            for member in self.smembers(diff_key)? {
                members.remove(&member);
            }
        }
        Ok(members.into_iter().collect())
    }
}

/// Write commands, available only in read-write transactions.
///
/// Commands taking a sequence apply it in order and stop at the first
/// failure. Items applied before the failure stay applied in the open
/// transaction and are only undone if that transaction rolls back.
pub trait WriteTx: ReadTx {
    /// Drops every bucket in `keys`. Missing buckets are skipped.
    fn del<I, K>(&mut self, keys: I) -> DbResult<()>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<[u8]>;

    /// Removes `field` from hash `key`. No-op if either is missing.
    fn hdel(&mut self, key: impl AsRef<[u8]>, field: impl AsRef<[u8]>) -> DbResult<()>;

    /// Removes every field of hash `key` by dropping its bucket.
    fn hdelall(&mut self, key: impl AsRef<[u8]>) -> DbResult<()>;

    /// Sets `field` in hash `key`, creating the hash if needed.
    fn hset(
        &mut self,
        key: impl AsRef<[u8]>,
        field: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> DbResult<()>;

    /// Sets every `(field, value)` pair in hash `key`.
    fn hmset<I, F, V>(&mut self, key: impl AsRef<[u8]>, fields: I) -> DbResult<()>
    where
        I: IntoIterator<Item = (F, V)>,
        F: AsRef<[u8]>,
        V: AsRef<[u8]>;

    /// Adds `members` to set `key`.
    fn sadd<I, M>(&mut self, key: impl AsRef<[u8]>, members: I) -> DbResult<()>
    where
        I: IntoIterator<Item = M>,
        M: AsRef<[u8]>,
    {
        let key = key.as_ref();
        for member in members {
            self.hset(key, member, SET_MEMBER_VALUE)?;
        }
        Ok(())
    }

    /// Removes `members` from set `key`. Non-members are skipped.
    fn srem<I, M>(&mut self, key: impl AsRef<[u8]>, members: I) -> DbResult<()>
    where
        I: IntoIterator<Item = M>,
        M: AsRef<[u8]>,
    {
        let key = key.as_ref();
        for member in members {
            self.hdel(key, member)?;
        }
        Ok(())
    }

    /// Moves `member` from set `source` to set `destination`.
    ///
    /// Returns `false` without changing anything if `member` is not in
    /// `source`. Moving within the same set leaves it unchanged.
    fn smove(
        &mut self,
        source: impl AsRef<[u8]>,
        destination: impl AsRef<[u8]>,
        member: impl AsRef<[u8]>,
    ) -> DbResult<bool> {
        let source = source.as_ref();
        let destination = destination.as_ref();
        let member = member.as_ref();
        if !self.sismember(source, member)? {
            return Ok(false);
        }
        if source == destination {
            return Ok(true);
        }
        self.sadd(destination, [member])?;
        self.srem(source, [member])?;
        Ok(true)
    }
}
