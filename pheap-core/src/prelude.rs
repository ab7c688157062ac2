//! Prelude for convenient imports.
//!
//! ```ignore
//! use pheap_core::prelude::*;
//! ```

// Core types
pub use crate::types::{HeapOffset, PoolId, RegionHandle, Width};

// Error handling
pub use crate::error::{PheapError, Result};

// Access
pub use crate::access::RegionAccessor;
pub use crate::heap::{PersistentHeap, PoolMapping};

// Pools
pub use crate::pool::{MappedPool, PoolConfig, PoolHeader, PoolRegistry};
