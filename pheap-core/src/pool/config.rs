//! Pool configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default pool size: 16 MB.
pub const DEFAULT_POOL_SIZE: u64 = 16 * 1024 * 1024;

/// Maximum pool size: 4 GB.
pub const MAX_POOL_SIZE: u64 = 4 * 1024 * 1024 * 1024;

/// Configuration for pool creation.
///
/// Derives serde so it can sit inside a host application's own config
/// file. Missing fields take their default values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Total size of the pool file in bytes, header included.
    pub capacity: u64,
    /// Directory for pool files.
    pub directory: PathBuf,
    /// Whether to hold an exclusive advisory lock on the pool file.
    ///
    /// Two processes mapping the same pool would race on its bytes; the
    /// lock turns the second open into an error instead.
    pub lock: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_POOL_SIZE,
            directory: PathBuf::from("/tmp/pheap"),
            lock: true,
        }
    }
}

impl PoolConfig {
    /// Create a configuration for tests.
    ///
    /// Uses a temporary directory with a unique name per invocation.
    pub fn in_memory() -> Self {
        Self {
            capacity: 1024 * 1024, // 1 MB for tests
            directory: std::env::temp_dir().join(format!("pheap_pool_{}", uuid::Uuid::new_v4())),
            lock: true,
        }
    }

    /// Set the pool capacity, clamped to [`MAX_POOL_SIZE`].
    pub fn with_capacity(mut self, capacity: u64) -> Self {
        self.capacity = capacity.min(MAX_POOL_SIZE);
        self
    }

    /// Set the pool directory.
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = directory.into();
        self
    }

    /// Enable or disable the advisory file lock.
    pub fn with_lock(mut self, lock: bool) -> Self {
        self.lock = lock;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_is_clamped() {
        let config = PoolConfig::default().with_capacity(u64::MAX);
        assert_eq!(config.capacity, MAX_POOL_SIZE);
    }

    #[test]
    fn in_memory_directories_are_unique() {
        assert_ne!(
            PoolConfig::in_memory().directory,
            PoolConfig::in_memory().directory
        );
    }

    #[test]
    fn builder_chain() {
        let config = PoolConfig::default()
            .with_capacity(4096)
            .with_directory("/var/lib/pheap")
            .with_lock(false);
        assert_eq!(config.capacity, 4096);
        assert_eq!(config.directory, PathBuf::from("/var/lib/pheap"));
        assert!(!config.lock);
    }
}
