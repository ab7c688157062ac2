//! Core types for pheap.
//!
//! - `PoolId`: Identity of a persistent pool
//! - `HeapOffset`: Byte offset into a pool's mapping
//! - `RegionHandle`: Handle to an allocated region (pool + offset)
//! - `Width`: Size of a typed transfer

mod ids;
mod pointer;
mod width;

pub use ids::PoolId;
pub use pointer::{HeapOffset, RegionHandle};
pub use width::Width;
