//! Fault injection for the durability path.

use crate::error::{PheapError, Result};
use crate::heap::{PersistentHeap, PoolMapping};
use crate::types::{HeapOffset, PoolId};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[derive(Default)]
struct DrainFaults {
    armed: AtomicBool,
    injected: AtomicU64,
}

/// Wraps a heap and makes its drains fail on demand.
///
/// Everything except `drain` is passed through untouched, so stores still
/// land in the wrapped heap's memory while their durability is refused.
pub struct FaultyHeap<H> {
    inner: H,
    faults: DrainFaults,
}

impl<H: PersistentHeap> FaultyHeap<H> {
    /// Wrap `inner` with fault injection disabled.
    pub fn new(inner: H) -> Self {
        Self {
            inner,
            faults: DrainFaults::default(),
        }
    }

    /// Get the wrapped heap.
    pub fn inner(&self) -> &H {
        &self.inner
    }

    /// Turn drain failures on or off.
    pub fn fail_drains(&self, fail: bool) {
        self.faults.armed.store(fail, Ordering::SeqCst);
    }

    /// Number of drains that were failed on purpose.
    pub fn injected_faults(&self) -> u64 {
        self.faults.injected.load(Ordering::SeqCst)
    }
}

impl<H: PersistentHeap> PersistentHeap for FaultyHeap<H> {
    type Mapping<'a>
        = FaultyMapping<'a, H::Mapping<'a>>
    where
        Self: 'a;

    fn mapping(&self, pool: PoolId) -> Result<Self::Mapping<'_>> {
        Ok(FaultyMapping {
            inner: self.inner.mapping(pool)?,
            faults: &self.faults,
        })
    }
}

/// Lease handed out by [`FaultyHeap`]: the wrapped lease with drains that
/// fail while injection is armed.
pub struct FaultyMapping<'a, M> {
    inner: M,
    faults: &'a DrainFaults,
}

// SAFETY: the mapping is the wrapped lease's, held for as long as this one.
unsafe impl<M: PoolMapping> PoolMapping for FaultyMapping<'_, M> {
    fn pool(&self) -> PoolId {
        self.inner.pool()
    }

    fn base(&self) -> NonNull<u8> {
        self.inner.base()
    }

    fn mapped_len(&self) -> u64 {
        self.inner.mapped_len()
    }

    fn region_len(&self, offset: HeapOffset) -> Result<u64> {
        self.inner.region_len(offset)
    }

    fn drain(&self, offset: HeapOffset, len: u64) -> Result<()> {
        if self.faults.armed.load(Ordering::SeqCst) {
            self.faults.injected.fetch_add(1, Ordering::SeqCst);
            return Err(PheapError::DrainFailed {
                pool: self.inner.pool(),
                offset,
                len,
                cause: "injected drain fault".to_string(),
            });
        }
        self.inner.drain(offset, len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryHeap;

    #[test]
    fn drains_pass_through_until_armed() {
        let heap = FaultyHeap::new(MemoryHeap::with_capacity(64));
        let mapping = heap.mapping(heap.inner().pool_id()).unwrap();

        mapping.drain(HeapOffset::new(8), 1).unwrap();
        assert_eq!(heap.inner().drain_count(), 1);

        heap.fail_drains(true);
        let err = mapping.drain(HeapOffset::new(8), 1).unwrap_err();
        assert_eq!(err.code(), "E201");
        assert_eq!(heap.injected_faults(), 1);
        assert_eq!(heap.inner().drain_count(), 1);
    }
}
