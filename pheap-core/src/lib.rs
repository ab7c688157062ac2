//! pheap core library
//!
//! Typed, bounds-checked access to regions of a memory-mapped persistent
//! heap.
//!
//! # Key Components
//!
//! - **Access**: `RegionAccessor`, the width-dispatched load/store with a
//!   mandatory durability drain on every write
//! - **Heap**: the `PersistentHeap` trait the accessor resolves addresses
//!   and drains through
//! - **Pool**: memory-mapped pool files and a registry implementing the heap
//! - **Types**: pool identities, offsets, region handles and widths
//!
//! # Example
//!
//! ```no_run
//! use pheap_core::prelude::*;
//!
//! # fn main() -> pheap_core::Result<()> {
//! let registry = PoolRegistry::new();
//! let pool = registry.create_pool(PoolId::new(), &PoolConfig::default())?;
//! let region = pool.allocate(16)?;
//!
//! let accessor = RegionAccessor::new(&registry);
//! accessor.write(region, 0, Width::Byte, 255)?;
//! assert_eq!(accessor.read(region, 0, Width::Byte)?, -1);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod access;
pub mod error;
pub mod heap;
pub mod pool;
pub mod prelude;
pub mod testing;
pub mod types;

// Re-export key types at crate root for convenience
pub use access::RegionAccessor;
pub use error::{PheapError, Result};
pub use heap::{PersistentHeap, PoolMapping};
pub use pool::{MappedPool, PoolConfig, PoolRegistry};
pub use types::{HeapOffset, PoolId, RegionHandle, Width};
