//! Volatile in-memory heap.

use crate::error::{PheapError, Result};
use crate::heap::{PersistentHeap, PoolMapping};
use crate::types::{HeapOffset, PoolId, RegionHandle};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ptr::NonNull;

/// Region alignment used by [`MemoryHeap::allocate`].
const ALIGNMENT: u64 = 8;

#[derive(Default)]
struct MemoryState {
    /// Next free offset.
    cursor: u64,
    /// Region start -> region length.
    regions: HashMap<HeapOffset, u64>,
    /// Every drain seen, in order.
    drains: Vec<(PoolId, HeapOffset, u64)>,
}

/// A single-pool heap backed by ordinary memory.
///
/// Nothing survives the process, so drains only get recorded. Tests use
/// the record to check which bytes the accessor made durable.
pub struct MemoryHeap {
    pool: PoolId,
    /// Word-aligned backing storage, owned through a raw pointer so that
    /// moving the heap does not invalidate resolved addresses.
    storage: NonNull<[u64]>,
    capacity: u64,
    state: Mutex<MemoryState>,
}

// SAFETY: `storage` is uniquely owned by the heap and freed only in `Drop`.
// Synchronizing concurrent access to region bytes is the caller's job, as
// for any persistent heap; the bookkeeping is behind a mutex.
unsafe impl Send for MemoryHeap {}
unsafe impl Sync for MemoryHeap {}

impl MemoryHeap {
    /// Create a zeroed heap of (at least) `capacity` bytes.
    pub fn with_capacity(capacity: u64) -> Self {
        let words = capacity.div_ceil(ALIGNMENT).max(1) as usize;
        let boxed: Box<[u64]> = vec![0u64; words].into_boxed_slice();
        let storage = NonNull::from(Box::leak(boxed));

        Self {
            pool: PoolId::new(),
            storage,
            capacity: words as u64 * ALIGNMENT,
            state: Mutex::new(MemoryState {
                // Offset 0 stays unused so no region starts at the null offset.
                cursor: ALIGNMENT,
                ..Default::default()
            }),
        }
    }

    /// The identity of the single pool this heap serves.
    pub fn pool_id(&self) -> PoolId {
        self.pool
    }

    /// Allocate a zeroed region of `len` bytes.
    pub fn allocate(&self, len: u64) -> Result<RegionHandle> {
        if len == 0 {
            return Err(PheapError::InvalidAllocation {
                pool: self.pool,
                cause: "zero-length region".to_string(),
            });
        }

        let mut state = self.state.lock();
        let start = state.cursor;
        let end = start
            .checked_add(len)
            .filter(|end| *end <= self.capacity)
            .ok_or(PheapError::PoolCapacity {
                pool: self.pool,
                requested: len,
                available: self.capacity - start,
            })?;

        state.cursor = end.next_multiple_of(ALIGNMENT).min(self.capacity);
        state.regions.insert(HeapOffset::new(start), len);

        Ok(RegionHandle::new(self.pool, HeapOffset::new(start)))
    }

    /// Number of drains performed so far.
    pub fn drain_count(&self) -> usize {
        self.state.lock().drains.len()
    }

    /// The most recent drain, if any.
    pub fn last_drain(&self) -> Option<(PoolId, HeapOffset, u64)> {
        self.state.lock().drains.last().copied()
    }

}

impl Drop for MemoryHeap {
    fn drop(&mut self) {
        // SAFETY: `storage` came from `Box::leak` in `with_capacity` and is
        // released exactly once here.
        unsafe {
            drop(Box::from_raw(self.storage.as_ptr()));
        }
    }
}

impl PersistentHeap for MemoryHeap {
    type Mapping<'a> = &'a MemoryHeap;

    fn mapping(&self, pool: PoolId) -> Result<Self::Mapping<'_>> {
        if pool == self.pool {
            Ok(self)
        } else {
            Err(PheapError::PoolNotFound { pool })
        }
    }
}

// SAFETY: `storage` is freed only when the heap drops, which cannot happen
// while a lease borrows it.
unsafe impl PoolMapping for MemoryHeap {
    fn pool(&self) -> PoolId {
        self.pool
    }

    fn base(&self) -> NonNull<u8> {
        self.storage.cast::<u8>()
    }

    fn mapped_len(&self) -> u64 {
        self.capacity
    }

    fn region_len(&self, offset: HeapOffset) -> Result<u64> {
        self.state
            .lock()
            .regions
            .get(&offset)
            .copied()
            .ok_or_else(|| PheapError::PoolCorruption {
                offset,
                cause: "no region starts at this offset".to_string(),
            })
    }

    fn drain(&self, offset: HeapOffset, len: u64) -> Result<()> {
        self.state.lock().drains.push((self.pool, offset, len));
        Ok(())
    }
}
