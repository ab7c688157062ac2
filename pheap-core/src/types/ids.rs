//! Strongly-typed identifiers for heap entities.

use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};
use std::fmt;
use uuid::Uuid;

/// Unique identity of a persistent pool.
///
/// Every pool file carries its id in the header, so the identity survives
/// closing and remapping the pool. Stored as raw bytes for a fixed
/// on-disk representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(C)]
pub struct PoolId {
    /// UUID bytes in big-endian format.
    bytes: [u8; 16],
}

impl PoolId {
    /// Create a new random pool ID.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bytes: *Uuid::new_v4().as_bytes(),
        }
    }

    /// Create a pool ID from an existing UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self {
            bytes: *uuid.as_bytes(),
        }
    }

    /// Create a pool ID from its raw header bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self { bytes }
    }

    /// Get the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        Uuid::from_bytes(self.bytes)
    }

    /// Get the raw bytes as stored in the pool header.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.bytes
    }

    /// Parse a pool ID from its UUID string form.
    ///
    /// Returns `None` if the string is not a valid UUID.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self::from_uuid)
    }
}

impl Default for PoolId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pool_{}", self.as_uuid())
    }
}

impl SerdeSerialize for PoolId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.as_uuid().serialize(serializer)
    }
}

impl<'de> SerdeDeserialize<'de> for PoolId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let uuid = Uuid::deserialize(deserializer)?;
        Ok(Self::from_uuid(uuid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_id_unique() {
        let id1 = PoolId::new();
        let id2 = PoolId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn pool_id_display() {
        let id = PoolId::parse("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        assert_eq!(id.to_string(), "pool_67e55044-10b1-426f-9247-bb680e5fe0c8");
    }

    #[test]
    fn pool_id_bytes_roundtrip() {
        let id = PoolId::new();
        let restored = PoolId::from_bytes(*id.as_bytes());
        assert_eq!(id, restored);
        assert_eq!(id.as_uuid(), restored.as_uuid());
    }

    #[test]
    fn pool_id_parse_rejects_garbage() {
        assert!(PoolId::parse("not-a-uuid").is_none());
    }
}
