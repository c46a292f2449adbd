//! Store configuration.

use std::time::Duration;

/// Default maximum key (and bucket name) length: 32 KiB.
pub const DEFAULT_MAX_KEY_SIZE: usize = 32 * 1024;

/// Default maximum value length: just under 2 GiB.
pub const DEFAULT_MAX_VALUE_SIZE: usize = (1 << 31) - 2;

/// Configuration for opening a [`crate::BucketStore`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Whether to create the log file if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to sync the commit log on every commit.
    pub sync_on_commit: bool,

    /// Maximum length of a key or bucket name.
    pub max_key_size: usize,

    /// Maximum length of a value.
    pub max_value_size: usize,

    /// How long `begin_write` waits for the writer lock (`None` = forever).
    pub write_timeout: Option<Duration>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_commit: true,
            max_key_size: DEFAULT_MAX_KEY_SIZE,
            max_value_size: DEFAULT_MAX_VALUE_SIZE,
            write_timeout: None,
        }
    }
}

impl StoreConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the log file if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to sync the log on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets the maximum key length.
    #[must_use]
    pub const fn max_key_size(mut self, size: usize) -> Self {
        self.max_key_size = size;
        self
    }

    /// Sets the maximum value length.
    #[must_use]
    pub const fn max_value_size(mut self, size: usize) -> Self {
        self.max_value_size = size;
        self
    }

    /// Sets how long `begin_write` may wait for the writer lock.
    #[must_use]
    pub const fn write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = StoreConfig::default();
        assert!(config.create_if_missing);
        assert!(config.sync_on_commit);
        assert_eq!(config.max_key_size, DEFAULT_MAX_KEY_SIZE);
        assert!(config.write_timeout.is_none());
    }

    #[test]
    fn builder_pattern() {
        let config = StoreConfig::new()
            .create_if_missing(false)
            .sync_on_commit(false)
            .max_key_size(16)
            .write_timeout(Some(Duration::from_millis(5)));

        assert!(!config.create_if_missing);
        assert!(!config.sync_on_commit);
        assert_eq!(config.max_key_size, 16);
        assert_eq!(config.write_timeout, Some(Duration::from_millis(5)));
    }
}
