//! Commit log: record framing, encoding and replay.
//!
//! Each committed write transaction that changed anything is appended as a
//! single framed record:
//!
//! ```text
//! | magic "BKTL" (4) | version (2) | length (4) | payload (N) | crc32 (4) |
//! ```
//!
//! The payload is the commit sequence number followed by the ordered list
//! of bucket operations the transaction performed. The CRC covers
//! everything before it.
//!
//! ## Recovery Policy
//!
//! - A record that runs past the end of the log is a write that never
//!   completed. It is dropped and the log truncated back to the last
//!   complete record.
//! - Bad magic, an unknown version, an unknown op tag or a CRC mismatch is
//!   corruption and the store refuses to open.

use crate::error::{StoreError, StoreResult};
use crate::types::{Buckets, SequenceNumber};
use bucketdb_storage::{StorageBackend, StorageResult};
use std::sync::Arc;
use tracing::warn;

/// Magic bytes at the start of every record.
pub const LOG_MAGIC: [u8; 4] = *b"BKTL";

/// Current record format version.
pub const LOG_VERSION: u16 = 1;

/// magic (4) + version (2) + length (4)
const HEADER_SIZE: usize = 10;

const CRC_SIZE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum OpTag {
    CreateBucket = 1,
    DropBucket = 2,
    Put = 3,
    Delete = 4,
}

impl OpTag {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::CreateBucket),
            2 => Some(Self::DropBucket),
            3 => Some(Self::Put),
            4 => Some(Self::Delete),
            _ => None,
        }
    }
}

/// One bucket mutation inside a commit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOp {
    /// A bucket was created.
    CreateBucket {
        /// Bucket name.
        bucket: Vec<u8>,
    },
    /// A bucket and all its entries were dropped.
    DropBucket {
        /// Bucket name.
        bucket: Vec<u8>,
    },
    /// A key was inserted or overwritten.
    Put {
        /// Bucket name.
        bucket: Vec<u8>,
        /// Entry key.
        key: Vec<u8>,
        /// Entry value.
        value: Vec<u8>,
    },
    /// A key was removed.
    Delete {
        /// Bucket name.
        bucket: Vec<u8>,
        /// Entry key.
        key: Vec<u8>,
    },
}

impl LogOp {
    fn tag(&self) -> OpTag {
        match self {
            Self::CreateBucket { .. } => OpTag::CreateBucket,
            Self::DropBucket { .. } => OpTag::DropBucket,
            Self::Put { .. } => OpTag::Put,
            Self::Delete { .. } => OpTag::Delete,
        }
    }

    /// Replays this operation onto `buckets`.
    pub(crate) fn apply(&self, buckets: &mut Buckets) {
        match self {
            Self::CreateBucket { bucket } => {
                buckets.entry(bucket.clone()).or_default();
            }
            Self::DropBucket { bucket } => {
                buckets.remove(bucket);
            }
            Self::Put { bucket, key, value } => {
                let entries = buckets.entry(bucket.clone()).or_default();
                Arc::make_mut(entries).insert(key.clone(), value.clone());
            }
            Self::Delete { bucket, key } => {
                if let Some(entries) = buckets.get_mut(bucket) {
                    Arc::make_mut(entries).remove(key);
                }
            }
        }
    }
}

/// A committed transaction as stored in the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    /// Sequence number assigned at commit.
    pub sequence: SequenceNumber,
    /// Operations in the order they were performed.
    pub ops: Vec<LogOp>,
}

impl CommitRecord {
    /// Encodes the record with its frame and checksum.
    ///
    /// # Errors
    ///
    /// Returns an error if a field or the payload does not fit a 4-byte
    /// length.
    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&self.sequence.as_u64().to_le_bytes());
        payload.extend_from_slice(&len_u32(self.ops.len())?.to_le_bytes());

        for op in &self.ops {
            payload.push(op.tag() as u8);
            match op {
                LogOp::CreateBucket { bucket } | LogOp::DropBucket { bucket } => {
                    put_field(&mut payload, bucket)?;
                }
                LogOp::Put { bucket, key, value } => {
                    put_field(&mut payload, bucket)?;
                    put_field(&mut payload, key)?;
                    put_field(&mut payload, value)?;
                }
                LogOp::Delete { bucket, key } => {
                    put_field(&mut payload, bucket)?;
                    put_field(&mut payload, key)?;
                }
            }
        }

        let len = len_u32(payload.len())?;
        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        frame.extend_from_slice(&LOG_MAGIC);
        frame.extend_from_slice(&LOG_VERSION.to_le_bytes());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&payload);
        let crc = crc32fast::hash(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());
        Ok(frame)
    }

    /// Decodes a record payload read from `offset`.
    fn decode_payload(offset: u64, payload: &[u8]) -> StoreResult<Self> {
        let mut reader = PayloadReader {
            offset,
            bytes: payload,
            pos: 0,
        };

        let sequence = SequenceNumber::new(reader.u64()?);
        let count = reader.u32()? as usize;
        let mut ops = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let tag = reader.u8()?;
            let op = match OpTag::from_byte(tag) {
                Some(OpTag::CreateBucket) => LogOp::CreateBucket {
                    bucket: reader.field()?,
                },
                Some(OpTag::DropBucket) => LogOp::DropBucket {
                    bucket: reader.field()?,
                },
                Some(OpTag::Put) => LogOp::Put {
                    bucket: reader.field()?,
                    key: reader.field()?,
                    value: reader.field()?,
                },
                Some(OpTag::Delete) => LogOp::Delete {
                    bucket: reader.field()?,
                    key: reader.field()?,
                },
                None => {
                    return Err(StoreError::corrupted(
                        offset,
                        format!("unknown op tag {tag}"),
                    ))
                }
            };
            ops.push(op);
        }

        if reader.pos != payload.len() {
            return Err(StoreError::corrupted(offset, "trailing bytes in record"));
        }
        Ok(Self { sequence, ops })
    }
}

fn len_u32(len: usize) -> StoreResult<u32> {
    u32::try_from(len).map_err(|_| StoreError::ValueTooLarge {
        len,
        max: u32::MAX as usize,
    })
}

fn put_field(buf: &mut Vec<u8>, field: &[u8]) -> StoreResult<()> {
    buf.extend_from_slice(&len_u32(field.len())?.to_le_bytes());
    buf.extend_from_slice(field);
    Ok(())
}

struct PayloadReader<'a> {
    offset: u64,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    fn take(&mut self, n: usize) -> StoreResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| StoreError::corrupted(self.offset, "record payload truncated"))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> StoreResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> StoreResult<u32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(buf))
    }

    fn u64(&mut self) -> StoreResult<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(buf))
    }

    fn field(&mut self) -> StoreResult<Vec<u8>> {
        let len = self.u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }
}

/// Append-side and replay-side access to the commit log.
pub(crate) struct CommitLog {
    backend: Box<dyn StorageBackend>,
    sync_on_commit: bool,
}

impl CommitLog {
    pub(crate) fn new(backend: Box<dyn StorageBackend>, sync_on_commit: bool) -> Self {
        Self {
            backend,
            sync_on_commit,
        }
    }

    /// Appends `record`, syncing if configured.
    ///
    /// On failure the log is cut back to where it was, so a half-written
    /// frame never precedes a later commit.
    pub(crate) fn append(&mut self, record: &CommitRecord) -> StoreResult<u64> {
        let frame = record.encode()?;
        let start = self.backend.size()?;
        match self.write_frame(&frame) {
            Ok(offset) => Ok(offset),
            Err(err) => {
                if let Err(truncate_err) = self.backend.truncate(start) {
                    warn!(error = %truncate_err, start, "failed to cut back commit log after write error");
                }
                Err(err.into())
            }
        }
    }

    fn write_frame(&mut self, frame: &[u8]) -> StorageResult<u64> {
        let offset = self.backend.append(frame)?;
        if self.sync_on_commit {
            self.backend.sync()?;
        }
        Ok(offset)
    }

    pub(crate) fn sync(&mut self) -> StoreResult<()> {
        self.backend.sync()?;
        Ok(())
    }

    /// Reads every complete record, dropping a torn tail.
    pub(crate) fn replay(&mut self) -> StoreResult<Vec<CommitRecord>> {
        let size = self.backend.size()?;
        let mut offset = 0u64;
        let mut records = Vec::new();

        while offset < size {
            let remaining = size - offset;
            if remaining < (HEADER_SIZE + CRC_SIZE) as u64 {
                self.discard_tail(offset, size)?;
                break;
            }

            let header = self.backend.read_at(offset, HEADER_SIZE)?;
            if header[..4] != LOG_MAGIC[..] {
                return Err(StoreError::corrupted(offset, "bad record magic"));
            }
            let version = u16::from_le_bytes([header[4], header[5]]);
            if version != LOG_VERSION {
                return Err(StoreError::corrupted(
                    offset,
                    format!("unsupported log version {version}"),
                ));
            }
            let len = u32::from_le_bytes([header[6], header[7], header[8], header[9]]) as u64;

            let frame_len = HEADER_SIZE as u64 + len + CRC_SIZE as u64;
            if frame_len > remaining {
                self.discard_tail(offset, size)?;
                break;
            }

            let frame = self.backend.read_at(offset, frame_len as usize)?;
            let body_end = HEADER_SIZE + len as usize;
            let mut stored = [0u8; CRC_SIZE];
            stored.copy_from_slice(&frame[body_end..]);
            let expected = u32::from_le_bytes(stored);
            let actual = crc32fast::hash(&frame[..body_end]);
            if expected != actual {
                return Err(StoreError::ChecksumMismatch {
                    offset,
                    expected,
                    actual,
                });
            }

            records.push(CommitRecord::decode_payload(
                offset,
                &frame[HEADER_SIZE..body_end],
            )?);
            offset += frame_len;
        }

        Ok(records)
    }

    fn discard_tail(&mut self, offset: u64, size: u64) -> StoreResult<()> {
        warn!(offset, dropped = size - offset, "discarding torn commit log tail");
        self.backend.truncate(offset)?;
        Ok(())
    }
}

impl std::fmt::Debug for CommitLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitLog")
            .field("sync_on_commit", &self.sync_on_commit)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bucketdb_storage::InMemoryBackend;

    fn sample(seq: u64) -> CommitRecord {
        CommitRecord {
            sequence: SequenceNumber::new(seq),
            ops: vec![
                LogOp::CreateBucket {
                    bucket: b"users".to_vec(),
                },
                LogOp::Put {
                    bucket: b"users".to_vec(),
                    key: b"name".to_vec(),
                    value: b"ada".to_vec(),
                },
                LogOp::Delete {
                    bucket: b"users".to_vec(),
                    key: b"age".to_vec(),
                },
                LogOp::DropBucket {
                    bucket: b"stale".to_vec(),
                },
            ],
        }
    }

    fn log_with(bytes: Vec<u8>) -> CommitLog {
        CommitLog::new(Box::new(InMemoryBackend::with_data(bytes)), false)
    }

    #[test]
    fn replay_returns_appended_records() {
        let mut log = CommitLog::new(Box::new(InMemoryBackend::new()), true);
        log.append(&sample(1)).unwrap();
        log.append(&sample(2)).unwrap();

        let records = log.replay().unwrap();
        assert_eq!(records, vec![sample(1), sample(2)]);
    }

    #[test]
    fn torn_tail_is_dropped() {
        let mut bytes = sample(1).encode().unwrap();
        let second = sample(2).encode().unwrap();
        let good_len = bytes.len();
        bytes.extend_from_slice(&second[..second.len() - 3]);

        let mut log = log_with(bytes);
        let records = log.replay().unwrap();
        assert_eq!(records, vec![sample(1)]);
        assert_eq!(log.backend.size().unwrap(), good_len as u64);
    }

    #[test]
    fn short_header_is_dropped() {
        let mut bytes = sample(1).encode().unwrap();
        bytes.extend_from_slice(b"BK");

        let mut log = log_with(bytes);
        assert_eq!(log.replay().unwrap().len(), 1);
    }

    #[test]
    fn flipped_byte_is_checksum_mismatch() {
        let mut bytes = sample(1).encode().unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xFF;

        let mut log = log_with(bytes);
        assert!(matches!(
            log.replay(),
            Err(StoreError::ChecksumMismatch { offset: 0, .. })
        ));
    }

    #[test]
    fn bad_magic_is_corruption() {
        let mut bytes = sample(1).encode().unwrap();
        bytes[0] = b'X';

        let mut log = log_with(bytes);
        assert!(matches!(log.replay(), Err(StoreError::Corrupted { .. })));
    }

    #[test]
    fn unknown_tag_is_corruption() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&1u64.to_le_bytes());
        payload.extend_from_slice(&1u32.to_le_bytes());
        payload.push(99);

        let mut frame = Vec::new();
        frame.extend_from_slice(&LOG_MAGIC);
        frame.extend_from_slice(&LOG_VERSION.to_le_bytes());
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(&payload);
        let crc = crc32fast::hash(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());

        let mut log = log_with(frame);
        let err = log.replay().unwrap_err();
        assert!(err.to_string().contains("unknown op tag 99"));
    }

    #[test]
    fn apply_rebuilds_buckets() {
        let mut buckets = Buckets::new();
        buckets.insert(b"stale".to_vec(), Arc::default());

        for op in sample(1).ops {
            op.apply(&mut buckets);
        }

        assert!(!buckets.contains_key(b"stale".as_slice()));
        let users = &buckets[b"users".as_slice()];
        assert_eq!(users.get(b"name".as_slice()), Some(&b"ada".to_vec()));
        assert_eq!(users.len(), 1);
    }
}
