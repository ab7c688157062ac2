//! Memory-mapped pool file.

use super::config::PoolConfig;
use super::header::{CURSOR_FIELD_OFFSET, HEADER_SIZE, PoolHeader};
use crate::error::{PheapError, Result};
use crate::heap::{PersistentHeap, PoolMapping};
use crate::types::{HeapOffset, PoolId, RegionHandle};
use byteorder::{ByteOrder, LittleEndian};
use fs2::FileExt;
use memmap2::{MmapMut, MmapOptions};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};

/// Region alignment (and length prefix size).
pub const REGION_ALIGNMENT: u64 = 8;

/// Size of the length prefix stored in front of every region.
const LEN_PREFIX_SIZE: u64 = 8;

/// A persistent pool backed by a memory-mapped file.
///
/// Regions are bump-allocated and never freed. Each region is preceded by
/// its length, so region lengths are recovered when the pool is reopened.
/// All bytes are written through the base pointer captured at map time.
pub struct MappedPool {
    id: PoolId,
    path: PathBuf,
    /// Keeps the mapping alive; used only for flushing.
    mmap: MmapMut,
    base: NonNull<u8>,
    capacity: u64,
    file: File,
    locked: bool,
    /// First byte not yet handed out.
    cursor: AtomicU64,
    /// Serializes allocations.
    alloc_lock: Mutex<()>,
    closed: bool,
}

// SAFETY: `base` points into `mmap`, which lives as long as the pool and is
// never remapped. Concurrent access to region bytes is the caller's
// responsibility; allocator state is atomic or behind `alloc_lock`.
unsafe impl Send for MappedPool {}
unsafe impl Sync for MappedPool {}

impl MappedPool {
    /// Path of the file backing `pool_id` under `config`.
    pub fn path_for(pool_id: PoolId, config: &PoolConfig) -> PathBuf {
        config
            .directory
            .join(format!("pool_{}.heap", pool_id.as_uuid()))
    }

    /// Create a new, empty pool file and map it.
    pub fn create(pool_id: PoolId, config: &PoolConfig) -> Result<Self> {
        if config.capacity <= HEADER_SIZE as u64 {
            return Err(PheapError::PoolCreate {
                path: config.directory.clone(),
                cause: format!(
                    "capacity {} does not exceed the {} byte header",
                    config.capacity, HEADER_SIZE
                ),
            });
        }

        // Ensure directory exists
        std::fs::create_dir_all(&config.directory).map_err(|e| PheapError::PoolCreate {
            path: config.directory.clone(),
            cause: e.to_string(),
        })?;

        let path = Self::path_for(pool_id, config);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| PheapError::PoolCreate {
                path: path.clone(),
                cause: e.to_string(),
            })?;

        // A half-initialized file must not outlive a failed create.
        let pool = Self::init_new(pool_id, config, path.clone(), file).inspect_err(|e| {
            tracing::warn!(pool = %pool_id, path = %path.display(), error = %e, "Pool creation failed, removing file");
            let _ = std::fs::remove_file(&path);
        })?;

        tracing::info!(pool = %pool_id, path = %pool.path.display(), capacity = config.capacity, "Created pool");
        Ok(pool)
    }

    /// Lock, size and map a freshly created file, then write its header.
    fn init_new(pool_id: PoolId, config: &PoolConfig, path: PathBuf, file: File) -> Result<Self> {
        if config.lock {
            lock_file(&file, &path)?;
        }

        // Set file size; new bytes read as zero
        file.set_len(config.capacity)
            .map_err(|e| PheapError::PoolCreate {
                path: path.clone(),
                cause: e.to_string(),
            })?;

        let mut mmap = map_file(&file, config.capacity, &path)?;
        let base = mmap_base(&mut mmap, &path)?;

        let header = PoolHeader::new(pool_id, config.capacity);
        let header_bytes = header.to_bytes().map_err(|e| PheapError::PoolCreate {
            path: path.clone(),
            cause: e.to_string(),
        })?;

        let pool = Self {
            id: pool_id,
            path,
            mmap,
            base,
            capacity: config.capacity,
            file,
            locked: config.lock,
            cursor: AtomicU64::new(header.cursor),
            alloc_lock: Mutex::new(()),
            closed: false,
        };

        // SAFETY: the mapping is `capacity > HEADER_SIZE` bytes long.
        unsafe {
            std::ptr::copy_nonoverlapping(header_bytes.as_ptr(), pool.base.as_ptr(), HEADER_SIZE);
        }
        pool.flush_range(HeapOffset::NULL, HEADER_SIZE as u64)?;
        Ok(pool)
    }

    /// Open and map an existing pool file.
    pub fn open(path: impl AsRef<Path>, lock: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| PheapError::PoolCreate {
                path: path.clone(),
                cause: e.to_string(),
            })?;

        if lock {
            lock_file(&file, &path)?;
        }

        let metadata = file.metadata().map_err(|e| PheapError::PoolCreate {
            path: path.clone(),
            cause: e.to_string(),
        })?;

        let capacity = metadata.len();
        if capacity < HEADER_SIZE as u64 {
            return Err(PheapError::PoolCorruption {
                offset: HeapOffset::NULL,
                cause: format!("file is {} bytes, shorter than the header", capacity),
            });
        }

        let mut mmap = map_file(&file, capacity, &path)?;

        // Read and validate header before taking the base pointer
        let header = PoolHeader::from_bytes(&mmap[..HEADER_SIZE]).map_err(|e| {
            PheapError::PoolCorruption {
                offset: HeapOffset::NULL,
                cause: e.to_string(),
            }
        })?;

        header.validate().map_err(|e| PheapError::PoolCorruption {
            offset: HeapOffset::NULL,
            cause: e.to_string(),
        })?;

        if header.capacity != capacity {
            return Err(PheapError::PoolCorruption {
                offset: HeapOffset::NULL,
                cause: format!(
                    "header capacity {} does not match file size {}",
                    header.capacity, capacity
                ),
            });
        }

        let base = mmap_base(&mut mmap, &path)?;

        tracing::info!(pool = %header.pool_id, path = %path.display(), cursor = header.cursor, "Opened pool");

        Ok(Self {
            id: header.pool_id,
            path,
            mmap,
            base,
            capacity,
            file,
            locked: lock,
            cursor: AtomicU64::new(header.cursor),
            alloc_lock: Mutex::new(()),
            closed: false,
        })
    }

    /// Get the pool identity.
    pub fn id(&self) -> PoolId {
        self.id
    }

    /// Get the path of the pool file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total size of the mapping in bytes.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Bytes still available for allocation, prefixes included.
    pub fn available_space(&self) -> u64 {
        self.capacity
            .saturating_sub(self.cursor.load(Ordering::Acquire))
    }

    /// Allocate a zeroed region of `len` bytes.
    ///
    /// The length prefix and the header cursor are durable before the
    /// handle is returned.
    pub fn allocate(&self, len: u64) -> Result<RegionHandle> {
        if len == 0 {
            return Err(PheapError::InvalidAllocation {
                pool: self.id,
                cause: "zero-length region".to_string(),
            });
        }

        let _guard = self.alloc_lock.lock();

        let prefix_at = self.cursor.load(Ordering::Acquire);
        let data_at = prefix_at + LEN_PREFIX_SIZE;
        let end = data_at
            .checked_add(len)
            .and_then(|end| end.checked_next_multiple_of(REGION_ALIGNMENT))
            .filter(|end| *end <= self.capacity)
            .ok_or(PheapError::PoolCapacity {
                pool: self.id,
                requested: LEN_PREFIX_SIZE.saturating_add(len),
                available: self.capacity.saturating_sub(prefix_at),
            })?;

        let mut prefix = [0u8; LEN_PREFIX_SIZE as usize];
        LittleEndian::write_u64(&mut prefix, len);
        self.store(prefix_at, &prefix);
        self.flush_range(HeapOffset::new(prefix_at), LEN_PREFIX_SIZE)?;

        self.cursor.store(end, Ordering::Release);
        self.persist_cursor(end)?;

        tracing::debug!(pool = %self.id, offset = data_at, len, "Allocated region");
        Ok(RegionHandle::new(self.id, HeapOffset::new(data_at)))
    }

    /// Length of the region starting at `offset`, read from its prefix.
    pub fn region_len_at(&self, offset: HeapOffset) -> Result<u64> {
        let start = offset.as_u64();
        let cursor = self.cursor.load(Ordering::Acquire);

        if start < HEADER_SIZE as u64 + LEN_PREFIX_SIZE
            || start % REGION_ALIGNMENT != 0
            || start >= cursor
        {
            return Err(PheapError::PoolCorruption {
                offset,
                cause: format!("no region starts here (allocated up to {})", cursor),
            });
        }

        let mut prefix = [0u8; LEN_PREFIX_SIZE as usize];
        self.load(start - LEN_PREFIX_SIZE, &mut prefix);
        let len = LittleEndian::read_u64(&prefix);

        match start.checked_add(len) {
            Some(end) if len > 0 && end <= cursor => Ok(len),
            _ => Err(PheapError::PoolCorruption {
                offset,
                cause: format!("invalid region length {}", len),
            }),
        }
    }

    /// Make `len` bytes at `offset` durable.
    pub fn flush_range(&self, offset: HeapOffset, len: u64) -> Result<()> {
        let drain_failed = |cause: String| PheapError::DrainFailed {
            pool: self.id,
            offset,
            len,
            cause,
        };

        match offset.checked_add(len) {
            Some(end) if end.as_u64() <= self.capacity => {}
            _ => return Err(drain_failed("range exceeds the mapping".to_string())),
        }

        self.mmap
            .flush_range(offset.as_u64() as usize, len as usize)
            .map_err(|e| drain_failed(e.to_string()))
    }

    /// Flush the whole mapping to disk.
    pub fn flush(&self) -> Result<()> {
        self.flush_range(HeapOffset::NULL, self.capacity)
    }

    /// Persist the allocation cursor, flush everything and unmap.
    pub fn close(mut self) -> Result<()> {
        self.persist_cursor(self.cursor.load(Ordering::Acquire))?;
        self.flush()?;
        self.closed = true;
        tracing::info!(pool = %self.id, path = %self.path.display(), "Closed pool");
        Ok(())
    }

    fn persist_cursor(&self, cursor: u64) -> Result<()> {
        let mut field = [0u8; 8];
        LittleEndian::write_u64(&mut field, cursor);
        self.store(CURSOR_FIELD_OFFSET as u64, &field);
        self.flush_range(HeapOffset::new(CURSOR_FIELD_OFFSET as u64), 8)
    }

    /// Copy `bytes` into the mapping. Callers keep the range in bounds.
    fn store(&self, offset: u64, bytes: &[u8]) {
        debug_assert!(offset + bytes.len() as u64 <= self.capacity);
        // SAFETY: the range lies inside the mapping (checked by callers).
        unsafe {
            std::ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                self.base.as_ptr().add(offset as usize),
                bytes.len(),
            );
        }
    }

    /// Copy bytes out of the mapping. Callers keep the range in bounds.
    fn load(&self, offset: u64, buf: &mut [u8]) {
        debug_assert!(offset + buf.len() as u64 <= self.capacity);
        // SAFETY: the range lies inside the mapping (checked by callers).
        unsafe {
            std::ptr::copy_nonoverlapping(
                self.base.as_ptr().add(offset as usize),
                buf.as_mut_ptr(),
                buf.len(),
            );
        }
    }
}

impl Drop for MappedPool {
    fn drop(&mut self) {
        if !self.closed {
            // Best effort: keep the cursor on disk even without close()
            let _ = self.persist_cursor(self.cursor.load(Ordering::Acquire));
            let _ = self.mmap.flush();
        }

        if self.locked {
            let _ = fs2::FileExt::unlock(&self.file);
        }
    }
}

impl PersistentHeap for MappedPool {
    type Mapping<'a> = &'a MappedPool;

    fn mapping(&self, pool: PoolId) -> Result<Self::Mapping<'_>> {
        if pool == self.id {
            Ok(self)
        } else {
            Err(PheapError::PoolNotFound { pool })
        }
    }
}

// SAFETY: `base` points into `mmap`, which is unmapped only when the pool
// drops; neither a borrow nor an `Arc` of the pool lets that happen.
unsafe impl PoolMapping for MappedPool {
    fn pool(&self) -> PoolId {
        self.id
    }

    fn base(&self) -> NonNull<u8> {
        self.base
    }

    fn mapped_len(&self) -> u64 {
        self.capacity
    }

    fn region_len(&self, offset: HeapOffset) -> Result<u64> {
        self.region_len_at(offset)
    }

    fn drain(&self, offset: HeapOffset, len: u64) -> Result<()> {
        self.flush_range(offset, len)
    }
}

fn lock_file(file: &File, path: &Path) -> Result<()> {
    file.try_lock_exclusive().map_err(|e| PheapError::PoolCreate {
        path: path.to_path_buf(),
        cause: format!("Failed to lock file: {}", e),
    })
}

fn map_file(file: &File, capacity: u64, path: &Path) -> Result<MmapMut> {
    let len = usize::try_from(capacity).map_err(|_| PheapError::PoolMmap {
        path: path.to_path_buf(),
        cause: format!("capacity {} exceeds the address space", capacity),
    })?;

    // SAFETY: the file is held open (and normally locked) for the lifetime
    // of the mapping; truncation by another process is outside our contract.
    unsafe {
        MmapOptions::new()
            .len(len)
            .map_mut(file)
            .map_err(|e| PheapError::PoolMmap {
                path: path.to_path_buf(),
                cause: e.to_string(),
            })
    }
}

fn mmap_base(mmap: &mut MmapMut, path: &Path) -> Result<NonNull<u8>> {
    NonNull::new(mmap.as_mut_ptr()).ok_or_else(|| PheapError::PoolMmap {
        path: path.to_path_buf(),
        cause: "mapping returned a null base".to_string(),
    })
}
