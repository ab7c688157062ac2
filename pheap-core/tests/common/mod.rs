//! Common test utilities for integration tests.

#![allow(dead_code)]

use pheap_core::prelude::*;
use std::sync::Once;
use tempfile::TempDir;

static TRACING: Once = Once::new();

/// Install a test-friendly tracing subscriber once per test binary.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pheap_core=debug")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Pool configuration rooted in a fresh temporary directory.
pub fn test_pool_config(capacity: u64) -> (TempDir, PoolConfig) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let config = PoolConfig::default()
        .with_capacity(capacity)
        .with_directory(dir.path());
    (dir, config)
}

/// A registry holding one freshly created pool.
pub fn registry_with_pool(capacity: u64) -> (TempDir, PoolConfig, PoolRegistry, PoolId) {
    init_tracing();
    let (dir, config) = test_pool_config(capacity);
    let registry = PoolRegistry::new();
    let pool_id = PoolId::new();
    registry
        .create_pool(pool_id, &config)
        .expect("create pool");
    (dir, config, registry, pool_id)
}
