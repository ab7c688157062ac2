//! Typed access to persistent regions.
//!
//! [`RegionAccessor`] turns `(region handle, offset, width)` into a single
//! sized load or store against the mapped heap. Addresses are resolved on
//! every call and never leave this module.
//!
//! Each access leases the pool's mapping from the heap and holds the lease
//! until it returns, so closing a pool concurrently either waits out the
//! access or makes it fail with `PoolNotFound`.
//!
//! Writes are two-phase: the store lands in the mapping, then the touched
//! bytes are drained through the lease. A write only returns `Ok` once the
//! drain has succeeded.
//!
//! # Example
//!
//! ```no_run
//! use pheap_core::prelude::*;
//!
//! # fn main() -> pheap_core::Result<()> {
//! let registry = PoolRegistry::new();
//! let pool = registry.create_pool(PoolId::new(), &PoolConfig::default())?;
//! let region = pool.allocate(64)?;
//!
//! let accessor = RegionAccessor::new(&registry);
//! accessor.write(region, 0, Width::Byte, 255)?;
//! assert_eq!(accessor.read(region, 0, Width::Byte)?, -1);
//!
//! accessor.set_double(region, 8, -0.5)?;
//! assert_eq!(accessor.get_double(region, 8)?, -0.5);
//! # Ok(())
//! # }
//! ```

use crate::error::{PheapError, Result};
use crate::heap::{PersistentHeap, PoolMapping};
use crate::types::{HeapOffset, RegionHandle, Width};
use std::ptr::NonNull;

/// Performs typed, bounds-checked loads and stores on persistent regions.
///
/// The accessor holds no state besides its heap and takes no locks;
/// concurrent writers to the same bytes must be serialized by the caller.
#[derive(Debug, Clone)]
pub struct RegionAccessor<H> {
    heap: H,
}

impl<H: PersistentHeap> RegionAccessor<H> {
    /// Create an accessor over the given heap.
    pub fn new(heap: H) -> Self {
        Self { heap }
    }

    /// Get the underlying heap.
    pub fn heap(&self) -> &H {
        &self.heap
    }

    /// Consume the accessor and return its heap.
    pub fn into_inner(self) -> H {
        self.heap
    }

    /// Read a value of the given width, sign-extended to `i64`.
    pub fn read(&self, handle: RegionHandle, offset: u64, width: Width) -> Result<i64> {
        let (_mapping, ptr) = self.resolve(handle, offset, width.size())?;
        let ptr = ptr.as_ptr();

        // SAFETY: `resolve` checked that `width.size()` bytes starting at
        // `ptr` lie inside the mapping, which `_mapping` keeps alive.
        // Unaligned reads are used since callers choose offsets freely.
        let value = unsafe {
            match width {
                Width::Byte => ptr.cast::<i8>().read_unaligned() as i64,
                Width::Short => ptr.cast::<i16>().read_unaligned() as i64,
                Width::Int => ptr.cast::<i32>().read_unaligned() as i64,
                Width::Long => ptr.cast::<i64>().read_unaligned(),
            }
        };

        tracing::trace!(region = %handle, offset, %width, value, "read");
        Ok(value)
    }

    /// Store the low-order `width` bytes of `value` and drain them.
    ///
    /// On `DrainFailed` the bytes may already be in the mapping, but they
    /// are not known to be durable.
    pub fn write(&self, handle: RegionHandle, offset: u64, width: Width, value: i64) -> Result<()> {
        let (mapping, ptr) = self.resolve(handle, offset, width.size())?;
        let ptr = ptr.as_ptr();

        // SAFETY: `resolve` checked that `width.size()` bytes starting at
        // `ptr` lie inside the mapping, which `mapping` keeps alive.
        unsafe {
            match width {
                Width::Byte => ptr.cast::<i8>().write_unaligned(value as i8),
                Width::Short => ptr.cast::<i16>().write_unaligned(value as i16),
                Width::Int => ptr.cast::<i32>().write_unaligned(value as i32),
                Width::Long => ptr.cast::<i64>().write_unaligned(value),
            }
        }

        tracing::trace!(region = %handle, offset, %width, value, "write");
        drain(&mapping, handle, offset, width.size())
    }

    /// Read using a raw byte size instead of a [`Width`].
    ///
    /// Any size other than 1, 2, 4 or 8 fails with `InvalidWidth` before
    /// memory is touched.
    pub fn read_bits(&self, handle: RegionHandle, offset: u64, size: u32) -> Result<i64> {
        let width = checked_width(size, offset)?;
        self.read(handle, offset, width)
    }

    /// Write using a raw byte size instead of a [`Width`].
    ///
    /// Any size other than 1, 2, 4 or 8 fails with `InvalidWidth` before
    /// memory is touched.
    pub fn write_bits(&self, handle: RegionHandle, offset: u64, size: u32, value: i64) -> Result<()> {
        let width = checked_width(size, offset)?;
        self.write(handle, offset, width, value)
    }

    /// Read an `i8`.
    pub fn get_byte(&self, handle: RegionHandle, offset: u64) -> Result<i8> {
        self.read(handle, offset, Width::Byte).map(|v| v as i8)
    }

    /// Read an `i16`.
    pub fn get_short(&self, handle: RegionHandle, offset: u64) -> Result<i16> {
        self.read(handle, offset, Width::Short).map(|v| v as i16)
    }

    /// Read an `i32`.
    pub fn get_int(&self, handle: RegionHandle, offset: u64) -> Result<i32> {
        self.read(handle, offset, Width::Int).map(|v| v as i32)
    }

    /// Read an `i64`.
    pub fn get_long(&self, handle: RegionHandle, offset: u64) -> Result<i64> {
        self.read(handle, offset, Width::Long)
    }

    /// Read an `f32` stored as its bit pattern in an int slot.
    pub fn get_float(&self, handle: RegionHandle, offset: u64) -> Result<f32> {
        self.get_int(handle, offset)
            .map(|bits| f32::from_bits(bits as u32))
    }

    /// Read an `f64` stored as its bit pattern in a long slot.
    pub fn get_double(&self, handle: RegionHandle, offset: u64) -> Result<f64> {
        self.get_long(handle, offset)
            .map(|bits| f64::from_bits(bits as u64))
    }

    /// Read a `char` stored as its scalar value in an int slot.
    ///
    /// Bits that are not a Unicode scalar value fail with `InvalidValue`.
    pub fn get_char(&self, handle: RegionHandle, offset: u64) -> Result<char> {
        let bits = self.get_int(handle, offset)? as u32;
        char::from_u32(bits).ok_or(PheapError::InvalidValue {
            bits: bits as u64,
            offset,
            ty: "char",
        })
    }

    /// Read a `bool` stored as a byte; any nonzero byte is `true`.
    pub fn get_bool(&self, handle: RegionHandle, offset: u64) -> Result<bool> {
        self.get_byte(handle, offset).map(|b| b != 0)
    }

    /// Write an `i8`.
    pub fn set_byte(&self, handle: RegionHandle, offset: u64, value: i8) -> Result<()> {
        self.write(handle, offset, Width::Byte, value as i64)
    }

    /// Write an `i16`.
    pub fn set_short(&self, handle: RegionHandle, offset: u64, value: i16) -> Result<()> {
        self.write(handle, offset, Width::Short, value as i64)
    }

    /// Write an `i32`.
    pub fn set_int(&self, handle: RegionHandle, offset: u64, value: i32) -> Result<()> {
        self.write(handle, offset, Width::Int, value as i64)
    }

    /// Write an `i64`.
    pub fn set_long(&self, handle: RegionHandle, offset: u64, value: i64) -> Result<()> {
        self.write(handle, offset, Width::Long, value)
    }

    /// Write an `f32` as its bit pattern. NaN payloads are kept as is.
    pub fn set_float(&self, handle: RegionHandle, offset: u64, value: f32) -> Result<()> {
        self.set_int(handle, offset, value.to_bits() as i32)
    }

    /// Write an `f64` as its bit pattern. NaN payloads are kept as is.
    pub fn set_double(&self, handle: RegionHandle, offset: u64, value: f64) -> Result<()> {
        self.set_long(handle, offset, value.to_bits() as i64)
    }

    /// Write a `char` as its scalar value in an int slot.
    pub fn set_char(&self, handle: RegionHandle, offset: u64, value: char) -> Result<()> {
        self.set_int(handle, offset, value as u32 as i32)
    }

    /// Write a `bool` as a `0` or `1` byte.
    pub fn set_bool(&self, handle: RegionHandle, offset: u64, value: bool) -> Result<()> {
        self.set_byte(handle, offset, value as i8)
    }

    /// Copy `buf.len()` bytes out of the region starting at `offset`.
    pub fn read_bytes(&self, handle: RegionHandle, offset: u64, buf: &mut [u8]) -> Result<()> {
        let (_mapping, src) = self.resolve(handle, offset, buf.len() as u64)?;

        // SAFETY: `resolve` checked that `buf.len()` bytes starting at `src`
        // lie inside the mapping, which `_mapping` keeps alive. `copy`
        // tolerates overlap.
        unsafe {
            std::ptr::copy(src.as_ptr(), buf.as_mut_ptr(), buf.len());
        }

        tracing::trace!(region = %handle, offset, len = buf.len(), "read bytes");
        Ok(())
    }

    /// Copy `data` into the region starting at `offset` and drain it.
    pub fn write_bytes(&self, handle: RegionHandle, offset: u64, data: &[u8]) -> Result<()> {
        let (mapping, dst) = self.resolve(handle, offset, data.len() as u64)?;
        if data.is_empty() {
            return Ok(());
        }

        // SAFETY: `resolve` checked that `data.len()` bytes starting at `dst`
        // lie inside the mapping, which `mapping` keeps alive. `copy`
        // tolerates overlap.
        unsafe {
            std::ptr::copy(data.as_ptr(), dst.as_ptr(), data.len());
        }

        tracing::trace!(region = %handle, offset, len = data.len(), "write bytes");
        drain(&mapping, handle, offset, data.len() as u64)
    }

    /// Lease the region's pool and resolve the address of `len` bytes at
    /// `offset` within the region.
    ///
    /// Checks the access against the region length and the region against
    /// the mapping. The pointer is valid only while the returned lease is.
    fn resolve(
        &self,
        handle: RegionHandle,
        offset: u64,
        len: u64,
    ) -> Result<(H::Mapping<'_>, NonNull<u8>)> {
        let out_of_bounds = |cause: String| PheapError::RegionOutOfBounds {
            region: handle.offset(),
            offset,
            len,
            cause,
        };

        let mapping = self.heap.mapping(handle.pool())?;

        let region_len = mapping.region_len(handle.offset())?;
        match offset.checked_add(len) {
            Some(end) if end <= region_len => {}
            _ => {
                return Err(out_of_bounds(format!(
                    "region is {} bytes long",
                    region_len
                )));
            }
        }

        let mapped_len = mapping.mapped_len();
        match handle.offset().checked_add(region_len) {
            Some(end) if end.as_u64() <= mapped_len => {}
            _ => {
                return Err(out_of_bounds(format!(
                    "region ends past the {} byte mapping",
                    mapped_len
                )));
            }
        }

        // Both additions are bounded by `mapped_len` from here on.
        let pool_offset = handle.offset().as_u64() + offset;
        let pool_offset = usize::try_from(pool_offset)
            .map_err(|_| out_of_bounds("offset exceeds address space".to_string()))?;

        // SAFETY: `pool_offset + len <= mapped_len`, so the result stays
        // within (or one past the end of) the leased mapping.
        let ptr = unsafe { mapping.base().add(pool_offset) };
        Ok((mapping, ptr))
    }
}

fn drain<M: PoolMapping>(mapping: &M, handle: RegionHandle, offset: u64, len: u64) -> Result<()> {
    let start = HeapOffset::new(handle.offset().as_u64() + offset);
    mapping.drain(start, len).inspect_err(|e| {
        tracing::warn!(region = %handle, offset, len, error = %e, "Drain failed, write outcome unknown");
    })
}

fn checked_width(size: u32, offset: u64) -> Result<Width> {
    Width::try_from(size).map_err(|size| {
        tracing::error!(size, offset, "Asked to transfer a bad size");
        PheapError::InvalidWidth { size, offset }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FaultyHeap, MemoryHeap};

    fn setup(region_len: u64) -> (RegionAccessor<MemoryHeap>, RegionHandle) {
        let heap = MemoryHeap::with_capacity(4096);
        let region = heap.allocate(region_len).unwrap();
        (RegionAccessor::new(heap), region)
    }

    #[test]
    fn byte_255_reads_back_negative_one() {
        let (accessor, region) = setup(16);
        accessor.write(region, 0, Width::Byte, 255).unwrap();
        assert_eq!(accessor.read(region, 0, Width::Byte).unwrap(), -1);
    }

    #[test]
    fn long_max_is_not_truncated() {
        let (accessor, region) = setup(16);
        accessor.write(region, 8, Width::Long, i64::MAX).unwrap();
        assert_eq!(accessor.read(region, 8, Width::Long).unwrap(), i64::MAX);
    }

    #[test]
    fn write_narrows_to_low_order_bytes() {
        let (accessor, region) = setup(16);
        accessor.write(region, 0, Width::Short, 0x12_3456).unwrap();
        assert_eq!(accessor.read(region, 0, Width::Short).unwrap(), 0x3456);

        accessor.write(region, 4, Width::Int, 0x1_FFFF_FFFF).unwrap();
        assert_eq!(accessor.read(region, 4, Width::Int).unwrap(), -1);
    }

    #[test]
    fn unaligned_offsets_are_supported() {
        let (accessor, region) = setup(32);
        accessor.write(region, 3, Width::Long, -42).unwrap();
        accessor.write(region, 13, Width::Int, 7).unwrap();
        assert_eq!(accessor.read(region, 3, Width::Long).unwrap(), -42);
        assert_eq!(accessor.read(region, 13, Width::Int).unwrap(), 7);
    }

    #[test]
    fn bad_size_fails_without_transfer() {
        let (accessor, region) = setup(16);
        accessor.write(region, 0, Width::Long, 0x0102_0304_0506_0708).unwrap();
        let drains_before = accessor.heap().drain_count();

        for size in [0, 3, 5, 6, 7, 9, 16] {
            let err = accessor.write_bits(region, 0, size, -1).unwrap_err();
            assert!(matches!(err, PheapError::InvalidWidth { size: s, offset: 0 } if s == size));
            assert!(err.is_fatal());

            let err = accessor.read_bits(region, 0, size).unwrap_err();
            assert!(matches!(err, PheapError::InvalidWidth { .. }));
        }

        assert_eq!(accessor.heap().drain_count(), drains_before);
        assert_eq!(
            accessor.read(region, 0, Width::Long).unwrap(),
            0x0102_0304_0506_0708
        );
    }

    #[test]
    fn raw_sizes_dispatch_like_widths() {
        let (accessor, region) = setup(16);
        accessor.write_bits(region, 0, 2, -2).unwrap();
        assert_eq!(accessor.read_bits(region, 0, 2).unwrap(), -2);
        assert_eq!(accessor.get_short(region, 0).unwrap(), -2);
    }

    #[test]
    fn write_drains_exactly_the_touched_bytes() {
        let (accessor, region) = setup(32);
        accessor.write(region, 12, Width::Int, 99).unwrap();

        let (pool, start, len) = accessor.heap().last_drain().unwrap();
        assert_eq!(pool, region.pool());
        assert_eq!(start.as_u64(), region.offset().as_u64() + 12);
        assert_eq!(len, 4);
    }

    #[test]
    fn reads_do_not_drain() {
        let (accessor, region) = setup(8);
        accessor.read(region, 0, Width::Long).unwrap();
        assert_eq!(accessor.heap().drain_count(), 0);
    }

    #[test]
    fn access_past_region_end_is_rejected() {
        let (accessor, region) = setup(8);
        accessor.write(region, 0, Width::Long, 5).unwrap();

        let err = accessor.write(region, 4, Width::Long, -1).unwrap_err();
        assert!(matches!(err, PheapError::RegionOutOfBounds { .. }));
        let err = accessor.read(region, 8, Width::Byte).unwrap_err();
        assert!(matches!(err, PheapError::RegionOutOfBounds { .. }));
        let err = accessor.read(region, u64::MAX, Width::Short).unwrap_err();
        assert!(matches!(err, PheapError::RegionOutOfBounds { .. }));

        assert_eq!(accessor.read(region, 0, Width::Long).unwrap(), 5);
    }

    #[test]
    fn drain_failure_surfaces_as_error() {
        let heap = FaultyHeap::new(MemoryHeap::with_capacity(1024));
        let region = heap.inner().allocate(16).unwrap();
        let accessor = RegionAccessor::new(&heap);

        accessor.write(region, 0, Width::Int, 1).unwrap();

        heap.fail_drains(true);
        let err = accessor.write(region, 0, Width::Int, 2).unwrap_err();
        assert!(err.is_outcome_unknown());

        heap.fail_drains(false);
        accessor.write(region, 0, Width::Int, 3).unwrap();
        assert_eq!(accessor.get_int(region, 0).unwrap(), 3);
    }

    #[test]
    fn typed_helpers() {
        let (accessor, region) = setup(16);
        accessor.set_byte(region, 0, -7).unwrap();
        accessor.set_short(region, 1, i16::MIN).unwrap();
        accessor.set_int(region, 3, 123_456).unwrap();
        accessor.set_long(region, 7, -9_000_000_000).unwrap();

        assert_eq!(accessor.get_byte(region, 0).unwrap(), -7);
        assert_eq!(accessor.get_short(region, 1).unwrap(), i16::MIN);
        assert_eq!(accessor.get_int(region, 3).unwrap(), 123_456);
        assert_eq!(accessor.get_long(region, 7).unwrap(), -9_000_000_000);
    }

    #[test]
    fn bulk_bytes() {
        let (accessor, region) = setup(16);
        accessor.write_bytes(region, 2, b"persist").unwrap();
        assert_eq!(accessor.heap().last_drain().unwrap().2, 7);

        let mut buf = [0u8; 7];
        accessor.read_bytes(region, 2, &mut buf).unwrap();
        assert_eq!(&buf, b"persist");

        let mut too_long = [0u8; 16];
        assert!(accessor.read_bytes(region, 2, &mut too_long).is_err());
    }

    #[test]
    fn empty_bulk_write_is_a_noop() {
        let (accessor, region) = setup(8);
        accessor.write_bytes(region, 8, &[]).unwrap();
        assert_eq!(accessor.heap().drain_count(), 0);
        assert!(accessor.write_bytes(region, 9, &[]).is_err());
    }

    #[test]
    fn floats_keep_their_bit_patterns() {
        let (accessor, region) = setup(32);

        accessor.set_float(region, 0, -0.0).unwrap();
        let read = accessor.get_float(region, 0).unwrap();
        assert_eq!(read.to_bits(), (-0.0f32).to_bits());
        assert!(read.is_sign_negative());

        let payload_nan = f32::from_bits(0x7FC0_1234);
        accessor.set_float(region, 4, payload_nan).unwrap();
        assert_eq!(accessor.get_float(region, 4).unwrap().to_bits(), 0x7FC0_1234);
        assert_eq!(accessor.get_int(region, 4).unwrap(), 0x7FC0_1234);

        accessor.set_double(region, 8, -0.0).unwrap();
        assert_eq!(
            accessor.get_double(region, 8).unwrap().to_bits(),
            (-0.0f64).to_bits()
        );

        let payload_nan = f64::from_bits(0xFFF8_0000_DEAD_BEEF);
        accessor.set_double(region, 16, payload_nan).unwrap();
        assert_eq!(
            accessor.get_double(region, 16).unwrap().to_bits(),
            0xFFF8_0000_DEAD_BEEF
        );

        accessor.set_double(region, 24, f64::MIN_POSITIVE).unwrap();
        assert_eq!(accessor.get_double(region, 24).unwrap(), f64::MIN_POSITIVE);
        assert_eq!(accessor.heap().last_drain().unwrap().2, 8);
    }

    #[test]
    fn chars_use_an_int_slot() {
        let (accessor, region) = setup(16);
        for (offset, c) in [(0, 'a'), (4, 'é'), (8, '\u{10FFFF}')] {
            accessor.set_char(region, offset, c).unwrap();
            assert_eq!(accessor.get_char(region, offset).unwrap(), c);
        }
        assert_eq!(accessor.get_int(region, 0).unwrap(), 'a' as i32);
        assert_eq!(accessor.heap().last_drain().unwrap().2, 4);
    }

    #[test]
    fn surrogate_bits_are_not_a_char() {
        let (accessor, region) = setup(8);
        accessor.set_int(region, 0, 0xD800).unwrap();
        let err = accessor.get_char(region, 0).unwrap_err();
        assert!(matches!(
            err,
            PheapError::InvalidValue { bits: 0xD800, offset: 0, ty: "char" }
        ));

        accessor.set_int(region, 4, -1).unwrap();
        assert!(accessor.get_char(region, 4).is_err());
    }

    #[test]
    fn bools_use_a_byte() {
        let (accessor, region) = setup(8);
        accessor.set_bool(region, 0, true).unwrap();
        accessor.set_bool(region, 1, false).unwrap();

        assert!(accessor.get_bool(region, 0).unwrap());
        assert!(!accessor.get_bool(region, 1).unwrap());
        assert_eq!(accessor.get_byte(region, 0).unwrap(), 1);
        assert_eq!(accessor.get_byte(region, 1).unwrap(), 0);
        assert_eq!(accessor.heap().last_drain().unwrap().2, 1);

        accessor.set_byte(region, 2, -3).unwrap();
        assert!(accessor.get_bool(region, 2).unwrap());
    }
}
