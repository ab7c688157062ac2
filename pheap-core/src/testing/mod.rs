//! Heaps for testing code built on the accessor.
//!
//! - [`MemoryHeap`]: a volatile heap that records every drain, for
//!   asserting exactly which bytes were made durable
//! - [`FaultyHeap`]: a wrapper that fails drains on demand
//!
//! Neither persists anything. Use a `PoolRegistry` with a temporary
//! directory when a test needs real remap durability.
//!
//! # Example
//!
//! ```
//! use pheap_core::access::RegionAccessor;
//! use pheap_core::testing::MemoryHeap;
//! use pheap_core::types::Width;
//!
//! let heap = MemoryHeap::with_capacity(1024);
//! let region = heap.allocate(16).unwrap();
//! let accessor = RegionAccessor::new(&heap);
//!
//! accessor.write(region, 0, Width::Int, 42).unwrap();
//! assert_eq!(accessor.read(region, 0, Width::Int).unwrap(), 42);
//! assert_eq!(heap.drain_count(), 1);
//! ```

mod faulty;
mod memory;

pub use faulty::{FaultyHeap, FaultyMapping};
pub use memory::MemoryHeap;
