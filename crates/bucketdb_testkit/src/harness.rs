//! Model-based test harness.
//!
//! [`ModelHarness`] applies each command to a database and to a plain
//! in-memory model, then checks that reads agree.

use crate::generators::CommandOp;
use bucketdb_core::{Db, DbResult, WriteTx, SET_MEMBER_VALUE};
use std::collections::BTreeMap;

type Model = BTreeMap<Vec<u8>, BTreeMap<Vec<u8>, Vec<u8>>>;

/// A test harness that tracks expected contents alongside a database.
pub struct ModelHarness {
    /// The database instance.
    pub db: Db,
    model: Model,
}

impl ModelHarness {
    /// Creates a harness over a fresh in-memory database.
    pub fn new() -> Self {
        Self::with_db(Db::open_in_memory().expect("Failed to open database"))
    }

    /// Creates a harness over an empty database.
    pub fn with_db(db: Db) -> Self {
        Self {
            db,
            model: Model::new(),
        }
    }

    /// Runs `op` as its own transaction and mirrors it in the model.
    pub fn apply(&mut self, op: &CommandOp) -> DbResult<()> {
        match op {
            CommandOp::Hset { key, field, value } => self.db.hset(key, field, value)?,
            CommandOp::Hdel { key, field } => self.db.hdel(key, field)?,
            CommandOp::Sadd { key, members } => self.db.sadd(key, members)?,
            CommandOp::Srem { key, members } => self.db.srem(key, members)?,
            CommandOp::Smove {
                source,
                destination,
                member,
            } => {
                self.db.smove(source, destination, member)?;
            }
            CommandOp::Del { keys } => self.db.del(keys)?,
        }
        apply_to_model(&mut self.model, op);
        Ok(())
    }

    /// Runs every op in one `multi_update` and mirrors them in the model.
    pub fn apply_batch(&mut self, ops: &[CommandOp]) -> DbResult<()> {
        self.db.multi_update(|tx| {
            for op in ops {
                match op {
                    CommandOp::Hset { key, field, value } => tx.hset(key, field, value)?,
                    CommandOp::Hdel { key, field } => tx.hdel(key, field)?,
                    CommandOp::Sadd { key, members } => tx.sadd(key, members)?,
                    CommandOp::Srem { key, members } => tx.srem(key, members)?,
                    CommandOp::Smove {
                        source,
                        destination,
                        member,
                    } => {
                        tx.smove(source, destination, member)?;
                    }
                    CommandOp::Del { keys } => tx.del(keys)?,
                }
            }
            Ok::<_, bucketdb_core::DbError>(())
        })?;
        for op in ops {
            apply_to_model(&mut self.model, op);
        }
        Ok(())
    }

    /// Expected contents of `key`. Absent keys are empty.
    pub fn expected(&self, key: &[u8]) -> BTreeMap<Vec<u8>, Vec<u8>> {
        self.model.get(key).cloned().unwrap_or_default()
    }

    /// Asserts that every key in `keys` and every tracked key reads back
    /// as the model says.
    pub fn verify<I, K>(&self, keys: I)
    where
        I: IntoIterator<Item = K>,
        K: AsRef<[u8]>,
    {
        let mut all: Vec<Vec<u8>> = self.model.keys().cloned().collect();
        all.extend(keys.into_iter().map(|k| k.as_ref().to_vec()));
        for key in all {
            let expected = self.expected(&key);
            let actual = self.db.hgetall(&key).expect("Failed to read hash");
            assert_eq!(actual, expected, "contents mismatch for {key:?}");
            assert_eq!(
                self.db.hlen(&key).expect("Failed to read length"),
                expected.len(),
                "length mismatch for {key:?}"
            );
        }
    }
}

impl Default for ModelHarness {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_to_model(model: &mut Model, op: &CommandOp) {
    match op {
        CommandOp::Hset { key, field, value } => {
            model
                .entry(key.clone())
                .or_default()
                .insert(field.clone(), value.clone());
        }
        CommandOp::Hdel { key, field } => {
            if let Some(hash) = model.get_mut(key) {
                hash.remove(field);
            }
        }
        CommandOp::Sadd { key, members } => {
            for member in members {
                model
                    .entry(key.clone())
                    .or_default()
                    .insert(member.clone(), SET_MEMBER_VALUE.to_vec());
            }
        }
        CommandOp::Srem { key, members } => {
            if let Some(set) = model.get_mut(key) {
                for member in members {
                    set.remove(member);
                }
            }
        }
        CommandOp::Smove {
            source,
            destination,
            member,
        } => {
            let present = model.get(source).is_some_and(|s| s.contains_key(member));
            if present && source != destination {
                model
                    .entry(destination.clone())
                    .or_default()
                    .insert(member.clone(), SET_MEMBER_VALUE.to_vec());
                if let Some(set) = model.get_mut(source) {
                    set.remove(member);
                }
            }
        }
        CommandOp::Del { keys } => {
            for key in keys {
                model.remove(key);
            }
        }
    }
}
