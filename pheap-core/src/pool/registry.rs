//! Registry of mapped pools, keyed by identity.

use super::config::PoolConfig;
use super::mapped::MappedPool;
use crate::error::{PheapError, Result};
use crate::heap::PersistentHeap;
use crate::types::PoolId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Resolves pool identities to their live mappings.
///
/// This is the heap an accessor normally runs against: a region handle
/// names its pool, the registry leases out that pool's mapping. Closing a
/// pool unregisters it at once; the mapping itself lives until the last
/// lease is dropped.
#[derive(Default)]
pub struct PoolRegistry {
    pools: RwLock<HashMap<PoolId, Arc<MappedPool>>>,
}

impl PoolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an already mapped pool.
    pub fn register(&self, pool: MappedPool) -> Result<Arc<MappedPool>> {
        let mut pools = self.pools.write();
        let id = pool.id();
        if pools.contains_key(&id) {
            return Err(PheapError::PoolExists { pool: id });
        }

        let pool = Arc::new(pool);
        pools.insert(id, Arc::clone(&pool));
        Ok(pool)
    }

    /// Create a new pool file and register it.
    pub fn create_pool(&self, pool_id: PoolId, config: &PoolConfig) -> Result<Arc<MappedPool>> {
        if self.contains(pool_id) {
            return Err(PheapError::PoolExists { pool: pool_id });
        }
        self.register(MappedPool::create(pool_id, config)?)
    }

    /// Map an existing pool file and register it.
    pub fn open_pool(&self, path: impl AsRef<Path>, lock: bool) -> Result<Arc<MappedPool>> {
        self.register(MappedPool::open(path, lock)?)
    }

    /// Get a registered pool.
    pub fn get(&self, pool_id: PoolId) -> Result<Arc<MappedPool>> {
        self.pools
            .read()
            .get(&pool_id)
            .cloned()
            .ok_or(PheapError::PoolNotFound { pool: pool_id })
    }

    /// Check whether a pool is registered.
    pub fn contains(&self, pool_id: PoolId) -> bool {
        self.pools.read().contains_key(&pool_id)
    }

    /// Identities of all registered pools.
    pub fn pool_ids(&self) -> Vec<PoolId> {
        let mut ids: Vec<_> = self.pools.read().keys().copied().collect();
        ids.sort();
        ids
    }

    /// Number of registered pools.
    pub fn len(&self) -> usize {
        self.pools.read().len()
    }

    /// Check if no pools are registered.
    pub fn is_empty(&self) -> bool {
        self.pools.read().is_empty()
    }

    /// Unregister a pool and close it.
    ///
    /// If other owners still hold the pool, it is flushed now and unmapped
    /// when the last owner drops it.
    pub fn close_pool(&self, pool_id: PoolId) -> Result<()> {
        let pool = self
            .pools
            .write()
            .remove(&pool_id)
            .ok_or(PheapError::PoolNotFound { pool: pool_id })?;

        match Arc::try_unwrap(pool) {
            Ok(pool) => pool.close(),
            Err(shared) => {
                tracing::debug!(pool = %pool_id, "Pool still shared, deferring unmap");
                shared.flush()
            }
        }
    }
}

impl PersistentHeap for PoolRegistry {
    type Mapping<'a> = Arc<MappedPool>;

    /// Lease a registered pool. The lease is a strong reference, so a
    /// concurrent [`close_pool`](Self::close_pool) defers the unmap until
    /// the access holding it is done.
    fn mapping(&self, pool: PoolId) -> Result<Self::Mapping<'_>> {
        self.get(pool)
    }
}
