//! Offsets and region handles into a mapped pool.

use super::ids::PoolId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Offset into a pool's mapped address space.
///
/// This is a raw byte offset from the start of the pool file. Offset 0
/// is the pool header and never belongs to a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(C)]
pub struct HeapOffset(u64);

impl HeapOffset {
    /// The null/invalid offset.
    pub const NULL: Self = Self(0);

    /// Create a new heap offset.
    #[must_use]
    pub const fn new(offset: u64) -> Self {
        Self(offset)
    }

    /// Get the raw offset value.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Check if this is the null offset.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Add a byte offset, returning `None` on overflow.
    #[must_use]
    pub const fn checked_add(&self, bytes: u64) -> Option<Self> {
        match self.0.checked_add(bytes) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }
}

impl fmt::Display for HeapOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

impl From<u64> for HeapOffset {
    fn from(offset: u64) -> Self {
        Self(offset)
    }
}

/// Handle to a previously allocated persistent byte range.
///
/// Pairs the owning pool's identity with the offset of the region's
/// first byte inside that pool. Handles are issued by the allocator,
/// never change, and stay meaningful across remaps of the same pool,
/// so they may themselves be persisted by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionHandle {
    pool: PoolId,
    offset: HeapOffset,
}

impl RegionHandle {
    /// Create a handle. Only allocators should need this.
    #[must_use]
    pub const fn new(pool: PoolId, offset: HeapOffset) -> Self {
        Self { pool, offset }
    }

    /// The pool that owns the region.
    #[must_use]
    pub const fn pool(&self) -> PoolId {
        self.pool
    }

    /// Offset of the region's first byte within the pool.
    #[must_use]
    pub const fn offset(&self) -> HeapOffset {
        self.offset
    }
}

impl fmt::Display for RegionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.pool, self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_offset_basic() {
        let offset = HeapOffset::new(0x100);
        assert_eq!(offset.as_u64(), 0x100);
        assert!(!offset.is_null());
        assert!(HeapOffset::NULL.is_null());
    }

    #[test]
    fn heap_offset_checked_add() {
        let offset = HeapOffset::new(0x100);
        assert_eq!(offset.checked_add(0x50), Some(HeapOffset::new(0x150)));
        assert_eq!(HeapOffset::new(u64::MAX).checked_add(1), None);
    }

    #[test]
    fn heap_offset_display() {
        assert_eq!(HeapOffset::new(0x1234).to_string(), "0x00001234");
    }

    #[test]
    fn region_handle_accessors() {
        let pool = PoolId::new();
        let handle = RegionHandle::new(pool, HeapOffset::new(0x48));
        assert_eq!(handle.pool(), pool);
        assert_eq!(handle.offset().as_u64(), 0x48);
        assert!(handle.to_string().ends_with("@0x00000048"));
    }
}
