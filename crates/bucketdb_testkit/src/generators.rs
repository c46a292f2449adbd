//! Property-based test generators using proptest.
//!
//! Keys, fields and members are drawn from small alphabets so that
//! generated command sequences hit the same buckets often.

use proptest::prelude::*;

/// Strategy for generating bucket keys. Never empty.
pub fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::sample::select(vec!["h1", "h2", "s1", "s2", "s3"]).prop_map(|k| k.as_bytes().to_vec())
}

/// Strategy for generating hash field names and set members. Never empty.
pub fn member_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(b'a'..=b'f', 1..3)
}

/// Strategy for generating field values, including the empty value.
pub fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..16)
}

/// Strategy for generating a set of members.
pub fn member_set_strategy(max: usize) -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(member_strategy(), 0..max)
}

/// A generated write command.
#[derive(Debug, Clone)]
pub enum CommandOp {
    /// HSET key field value
    Hset {
        /// Hash key
        key: Vec<u8>,
        /// Field name
        field: Vec<u8>,
        /// Field value
        value: Vec<u8>,
    },
    /// HDEL key field
    Hdel {
        /// Hash key
        key: Vec<u8>,
        /// Field name
        field: Vec<u8>,
    },
    /// SADD key members...
    Sadd {
        /// Set key
        key: Vec<u8>,
        /// Members to add
        members: Vec<Vec<u8>>,
    },
    /// SREM key members...
    Srem {
        /// Set key
        key: Vec<u8>,
        /// Members to remove
        members: Vec<Vec<u8>>,
    },
    /// SMOVE source destination member
    Smove {
        /// Source set
        source: Vec<u8>,
        /// Destination set
        destination: Vec<u8>,
        /// Member to move
        member: Vec<u8>,
    },
    /// DEL keys...
    Del {
        /// Keys to drop
        keys: Vec<Vec<u8>>,
    },
}

/// Strategy for generating write commands.
pub fn command_op_strategy() -> impl Strategy<Value = CommandOp> {
    prop_oneof![
        3 => (key_strategy(), member_strategy(), value_strategy())
            .prop_map(|(key, field, value)| CommandOp::Hset { key, field, value }),
        2 => (key_strategy(), member_strategy())
            .prop_map(|(key, field)| CommandOp::Hdel { key, field }),
        3 => (key_strategy(), member_set_strategy(4))
            .prop_map(|(key, members)| CommandOp::Sadd { key, members }),
        2 => (key_strategy(), member_set_strategy(3))
            .prop_map(|(key, members)| CommandOp::Srem { key, members }),
        2 => (key_strategy(), key_strategy(), member_strategy())
            .prop_map(|(source, destination, member)| CommandOp::Smove { source, destination, member }),
        1 => prop::collection::vec(key_strategy(), 1..3)
            .prop_map(|keys| CommandOp::Del { keys }),
    ]
}

/// Strategy for generating a sequence of commands.
pub fn command_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<CommandOp>> {
    prop::collection::vec(command_op_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
