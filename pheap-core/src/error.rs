//! Error types for pheap.
//!
//! Every error carries the identifiers needed to locate the failing
//! access (pool id, offsets, paths) and a stable code.

use crate::types::{HeapOffset, PoolId};
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for pheap operations.
#[derive(Error, Debug)]
pub enum PheapError {
    // =========================================================================
    // Pool Errors (E001-E099)
    // =========================================================================
    /// Failed to create, open, lock or size a pool file.
    #[error("E001: Failed to create pool at {path}: {cause}")]
    PoolCreate {
        /// The path where pool creation failed.
        path: PathBuf,
        /// Reason for the failure.
        cause: String,
    },

    /// Failed to memory-map the pool file.
    #[error("E002: Failed to mmap pool at {path}: {cause}")]
    PoolMmap {
        /// The path of the pool file.
        path: PathBuf,
        /// Reason for the mmap failure.
        cause: String,
    },

    /// Pool corruption detected.
    #[error("E003: Pool corruption detected at offset {offset}: {cause}")]
    PoolCorruption {
        /// The offset where corruption was detected.
        offset: HeapOffset,
        /// Description of the corruption.
        cause: String,
    },

    /// Pool capacity exceeded.
    #[error(
        "E004: Pool {pool} capacity exceeded: requested {requested} bytes, available {available} bytes"
    )]
    PoolCapacity {
        /// The pool that ran out of space.
        pool: PoolId,
        /// Number of bytes requested.
        requested: u64,
        /// Number of bytes available.
        available: u64,
    },

    /// No mapped pool with this identity.
    #[error("E005: Pool {pool} is not mapped")]
    PoolNotFound {
        /// The unknown pool.
        pool: PoolId,
    },

    /// A pool with this identity is already registered.
    #[error("E006: Pool {pool} is already mapped")]
    PoolExists {
        /// The duplicate pool.
        pool: PoolId,
    },

    /// Allocation request cannot be satisfied as stated.
    #[error("E007: Invalid allocation in pool {pool}: {cause}")]
    InvalidAllocation {
        /// The pool asked to allocate.
        pool: PoolId,
        /// Why the request is invalid.
        cause: String,
    },

    // =========================================================================
    // Access Errors (E100-E199)
    // =========================================================================
    /// Transfer size is not 1, 2, 4 or 8 bytes.
    #[error("E101: Bad transfer size {size} at offset {offset}")]
    InvalidWidth {
        /// The rejected size.
        size: u32,
        /// The access offset the transfer was aimed at.
        offset: u64,
    },

    /// Access would touch bytes outside the region or the pool mapping.
    #[error("E102: Access of {len} bytes at offset {offset} escapes region {region}: {cause}")]
    RegionOutOfBounds {
        /// Region start within its pool.
        region: HeapOffset,
        /// Access offset relative to the region.
        offset: u64,
        /// Number of bytes the access would touch.
        len: u64,
        /// Which bound was violated.
        cause: String,
    },

    /// Stored bits do not decode as the requested type.
    #[error("E103: Value {bits:#x} at offset {offset} is not a valid {ty}")]
    InvalidValue {
        /// The raw bits that were read.
        bits: u64,
        /// The access offset the value was read from.
        offset: u64,
        /// Name of the requested type.
        ty: &'static str,
    },

    // =========================================================================
    // Durability Errors (E200-E299)
    // =========================================================================
    /// Flushing modified bytes to persistent media failed.
    ///
    /// The store may have reached volatile cache; its durability is unknown.
    #[error("E201: Drain of {len} bytes at {offset} in pool {pool} failed: {cause}")]
    DrainFailed {
        /// The pool being drained.
        pool: PoolId,
        /// Start of the drained range within the pool.
        offset: HeapOffset,
        /// Length of the drained range.
        len: u64,
        /// Reason for the failure.
        cause: String,
    },
}

impl PheapError {
    /// Get the error code (e.g., "E001").
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::PoolCreate { .. } => "E001",
            Self::PoolMmap { .. } => "E002",
            Self::PoolCorruption { .. } => "E003",
            Self::PoolCapacity { .. } => "E004",
            Self::PoolNotFound { .. } => "E005",
            Self::PoolExists { .. } => "E006",
            Self::InvalidAllocation { .. } => "E007",
            Self::InvalidWidth { .. } => "E101",
            Self::RegionOutOfBounds { .. } => "E102",
            Self::InvalidValue { .. } => "E103",
            Self::DrainFailed { .. } => "E201",
        }
    }

    /// Check if this error is a usage error that must never be retried.
    ///
    /// A bad width is not retried with a coerced width; the access is abandoned.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidWidth { .. })
    }

    /// Check if a write may or may not have reached persistent media.
    #[must_use]
    pub fn is_outcome_unknown(&self) -> bool {
        matches!(self, Self::DrainFailed { .. })
    }
}

/// Result type alias using `PheapError`.
pub type Result<T> = std::result::Result<T, PheapError>;
