//! The persistent-heap collaborator seam.
//!
//! The accessor never allocates, maps or unmaps anything. Everything it
//! needs from the heap goes through two traits:
//!
//! - [`PersistentHeap`] resolves a pool identity to a [`PoolMapping`]
//! - [`PoolMapping`] is a lease on one pool's mapping: its base address,
//!   its length, region lengths, and the drain that makes bytes durable
//!
//! The accessor holds the lease for the whole of one access, from bounds
//! check through store and drain, so a pool cannot be unmapped underneath
//! an access in flight.

use crate::error::Result;
use crate::types::{HeapOffset, PoolId};
use std::ptr::NonNull;
use std::sync::Arc;

/// A live lease on one pool's mapping.
///
/// # Safety
///
/// For as long as a value of the implementing type is alive, the
/// `mapped_len()` bytes starting at `base()` must stay mapped, readable and
/// writable, and must not move. Dropping the lease is the only thing that
/// may end that guarantee.
pub unsafe trait PoolMapping {
    /// Identity of the leased pool.
    fn pool(&self) -> PoolId;

    /// Base address of the mapping.
    fn base(&self) -> NonNull<u8>;

    /// Number of bytes owned by the mapping.
    fn mapped_len(&self) -> u64;

    /// Length in bytes of the region starting at `offset`.
    fn region_len(&self, offset: HeapOffset) -> Result<u64>;

    /// Make `len` bytes at `offset` durable.
    fn drain(&self, offset: HeapOffset, len: u64) -> Result<()>;
}

/// A provider of mapped persistent pools.
pub trait PersistentHeap: Send + Sync {
    /// Lease handed out for one pool.
    type Mapping<'a>: PoolMapping
    where
        Self: 'a;

    /// Lease the mapping of `pool`. Fails with `PoolNotFound` if the heap
    /// does not serve it.
    fn mapping(&self, pool: PoolId) -> Result<Self::Mapping<'_>>;
}

impl<H: PersistentHeap + ?Sized> PersistentHeap for &H {
    type Mapping<'a>
        = H::Mapping<'a>
    where
        Self: 'a;

    fn mapping(&self, pool: PoolId) -> Result<Self::Mapping<'_>> {
        (**self).mapping(pool)
    }
}

impl<H: PersistentHeap + ?Sized> PersistentHeap for Arc<H> {
    type Mapping<'a>
        = H::Mapping<'a>
    where
        Self: 'a;

    fn mapping(&self, pool: PoolId) -> Result<Self::Mapping<'_>> {
        (**self).mapping(pool)
    }
}

// SAFETY: a borrow keeps the borrowed lease alive.
unsafe impl<M: PoolMapping + ?Sized> PoolMapping for &M {
    fn pool(&self) -> PoolId {
        (**self).pool()
    }

    fn base(&self) -> NonNull<u8> {
        (**self).base()
    }

    fn mapped_len(&self) -> u64 {
        (**self).mapped_len()
    }

    fn region_len(&self, offset: HeapOffset) -> Result<u64> {
        (**self).region_len(offset)
    }

    fn drain(&self, offset: HeapOffset, len: u64) -> Result<()> {
        (**self).drain(offset, len)
    }
}

// SAFETY: a strong reference keeps the shared lease alive.
unsafe impl<M: PoolMapping + ?Sized> PoolMapping for Arc<M> {
    fn pool(&self) -> PoolId {
        (**self).pool()
    }

    fn base(&self) -> NonNull<u8> {
        (**self).base()
    }

    fn mapped_len(&self) -> u64 {
        (**self).mapped_len()
    }

    fn region_len(&self, offset: HeapOffset) -> Result<u64> {
        (**self).region_len(offset)
    }

    fn drain(&self, offset: HeapOffset, len: u64) -> Result<()> {
        (**self).drain(offset, len)
    }
}
