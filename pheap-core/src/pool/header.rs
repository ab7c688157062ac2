//! Pool header structure.

use crate::types::PoolId;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// Magic number for pool files.
pub const POOL_MAGIC: u64 = 0x5048_4541_504F_4F4C; // "PHEAPOOL"

/// Current pool format version.
pub const POOL_VERSION: u32 = 1;

/// Fixed size of the pool header in bytes.
pub const HEADER_SIZE: usize = 64;

/// Byte position of the allocation cursor inside the header.
pub const CURSOR_FIELD_OFFSET: usize = 40;

/// Pool file header.
///
/// Stored at the beginning of every pool file. All fields are little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct PoolHeader {
    /// Magic number for file identification.
    pub magic: u64,
    /// Pool format version.
    pub version: u32,
    /// Flags (reserved for future use).
    pub flags: u32,
    /// Identity of the pool.
    pub pool_id: PoolId,
    /// Total capacity of the pool file.
    pub capacity: u64,
    /// First byte not yet handed out by the allocator.
    pub cursor: u64,
    /// Creation timestamp (Unix epoch seconds).
    pub created_at: u64,
    /// Reserved.
    pub _reserved: [u8; 8],
}

impl PoolHeader {
    /// Create a new header for an empty pool.
    pub fn new(pool_id: PoolId, capacity: u64) -> Self {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        Self {
            magic: POOL_MAGIC,
            version: POOL_VERSION,
            flags: 0,
            pool_id,
            capacity,
            cursor: HEADER_SIZE as u64,
            created_at: now,
            _reserved: [0u8; 8],
        }
    }

    /// Validate the header.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.magic != POOL_MAGIC {
            return Err("Invalid magic number");
        }
        if self.version != POOL_VERSION {
            return Err("Unsupported pool version");
        }
        if self.capacity <= HEADER_SIZE as u64 {
            return Err("Capacity smaller than header");
        }
        if self.cursor < HEADER_SIZE as u64 {
            return Err("Allocation cursor inside header");
        }
        if self.cursor > self.capacity {
            return Err("Allocation cursor exceeds capacity");
        }
        Ok(())
    }

    /// Read header from a byte slice.
    pub fn from_bytes(bytes: &[u8]) -> io::Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Buffer too small for header",
            ));
        }

        let mut cursor = io::Cursor::new(bytes);

        let magic = cursor.read_u64::<LittleEndian>()?;
        let version = cursor.read_u32::<LittleEndian>()?;
        let flags = cursor.read_u32::<LittleEndian>()?;

        let mut id_bytes = [0u8; 16];
        cursor.read_exact(&mut id_bytes)?;
        let pool_id = PoolId::from_bytes(id_bytes);

        let capacity = cursor.read_u64::<LittleEndian>()?;
        let alloc_cursor = cursor.read_u64::<LittleEndian>()?;
        let created_at = cursor.read_u64::<LittleEndian>()?;

        let mut reserved = [0u8; 8];
        cursor.read_exact(&mut reserved)?;

        Ok(Self {
            magic,
            version,
            flags,
            pool_id,
            capacity,
            cursor: alloc_cursor,
            created_at,
            _reserved: reserved,
        })
    }

    /// Write header to a byte buffer.
    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(HEADER_SIZE);

        buf.write_u64::<LittleEndian>(self.magic)?;
        buf.write_u32::<LittleEndian>(self.version)?;
        buf.write_u32::<LittleEndian>(self.flags)?;
        buf.write_all(self.pool_id.as_bytes())?;
        debug_assert_eq!(buf.len() + 8, CURSOR_FIELD_OFFSET);
        buf.write_u64::<LittleEndian>(self.capacity)?;
        buf.write_u64::<LittleEndian>(self.cursor)?;
        buf.write_u64::<LittleEndian>(self.created_at)?;
        buf.write_all(&self._reserved)?;

        debug_assert_eq!(buf.len(), HEADER_SIZE);

        Ok(buf)
    }

    /// Get available space for regions.
    pub fn available_space(&self) -> u64 {
        self.capacity.saturating_sub(self.cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip() {
        let pool_id = PoolId::new();
        let mut header = PoolHeader::new(pool_id, 1024 * 1024);
        header.cursor = 4096;

        let bytes = header.to_bytes().unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE);

        let restored = PoolHeader::from_bytes(&bytes).unwrap();
        assert_eq!(restored, header);
        assert_eq!(restored.pool_id, pool_id);
    }

    #[test]
    fn cursor_field_position() {
        let mut header = PoolHeader::new(PoolId::new(), 1024);
        header.cursor = 0x0102_0304_0506_0708;
        let bytes = header.to_bytes().unwrap();
        assert_eq!(
            &bytes[CURSOR_FIELD_OFFSET..CURSOR_FIELD_OFFSET + 8],
            &0x0102_0304_0506_0708u64.to_le_bytes()
        );
    }

    #[test]
    fn header_validation() {
        let header = PoolHeader::new(PoolId::new(), 1024);
        assert!(header.validate().is_ok());
        assert_eq!(header.available_space(), 1024 - HEADER_SIZE as u64);

        let mut bad_magic = header;
        bad_magic.magic = 0xDEADBEEF;
        assert!(bad_magic.validate().is_err());

        let mut bad_version = header;
        bad_version.version = POOL_VERSION + 1;
        assert!(bad_version.validate().is_err());

        let mut bad_cursor = header;
        bad_cursor.cursor = 2048;
        assert!(bad_cursor.validate().is_err());

        let mut cursor_in_header = header;
        cursor_in_header.cursor = 8;
        assert!(cursor_in_header.validate().is_err());
    }

    #[test]
    fn short_buffer_is_rejected() {
        assert!(PoolHeader::from_bytes(&[0u8; HEADER_SIZE - 1]).is_err());
    }
}
