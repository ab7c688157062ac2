//! Memory-mapped persistent pools.
//!
//! A pool is a single file mapped into memory. Regions are handed out by a
//! bump allocator and addressed by `RegionHandle`s (pool id + offset), so
//! handles stay valid across process restarts.
//!
//! # Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │ Header (64 bytes: magic, version, pool id, capacity, cursor)    │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ Region 0: [len: u64 LE][data: len bytes][pad to 8]              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ Region 1: [len: u64 LE][data: len bytes][pad to 8]              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ ... (unallocated, zero-filled up to capacity)                   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A region handle points at the first data byte, just past its length.

mod config;
mod header;
mod mapped;
mod registry;

pub use config::{DEFAULT_POOL_SIZE, MAX_POOL_SIZE, PoolConfig};
pub use header::{HEADER_SIZE, POOL_MAGIC, POOL_VERSION, PoolHeader};
pub use mapped::{MappedPool, REGION_ALIGNMENT};
pub use registry::PoolRegistry;
