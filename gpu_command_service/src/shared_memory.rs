//! Shared memory regions addressed by `(region id, offset, size)`
//!
//! A region is the service's view of memory the client can also write at any
//! time. It is stored as atomic 32-bit words (little-endian byte order) so the
//! decoder thread, the transfer worker and the client side of a test can all
//! touch it without `unsafe`. Every lookup is bounds-checked and fails closed:
//! an unknown region or an `offset + size` past the end yields `None`, never a
//! dangling reference.

use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

// ===== ERRORS =====

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SharedMemoryError {
    pub offset: usize,
    pub len: usize,
}

impl fmt::Display for SharedMemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "shared memory access out of bounds: offset=0x{:x}, len=0x{:x}",
            self.offset, self.len
        )
    }
}

impl std::error::Error for SharedMemoryError {}

// ===== REGION =====

/// One client-visible shared memory segment
#[derive(Debug)]
pub struct SharedMemoryRegion {
    words: Box<[AtomicU32]>,
    size: usize,
}

impl SharedMemoryRegion {
    /// Create a zero-filled region of `size` bytes
    pub fn new(size: usize) -> Arc<Self> {
        let word_count = size.div_ceil(4);
        let words = (0..word_count).map(|_| AtomicU32::new(0)).collect::<Vec<_>>();
        Arc::new(Self { words: words.into_boxed_slice(), size })
    }

    /// Size in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    fn check(&self, offset: usize, len: usize) -> Result<usize, SharedMemoryError> {
        let end = offset
            .checked_add(len)
            .ok_or(SharedMemoryError { offset, len })?;
        if end > self.size {
            return Err(SharedMemoryError { offset, len });
        }
        Ok(end)
    }

    /// Copy `dst.len()` bytes starting at `offset` into `dst`
    pub fn read(&self, offset: usize, dst: &mut [u8]) -> Result<(), SharedMemoryError> {
        self.check(offset, dst.len())?;
        for (i, byte) in dst.iter_mut().enumerate() {
            let at = offset + i;
            let word = self.words[at / 4].load(Ordering::Relaxed);
            *byte = (word >> ((at % 4) * 8)) as u8;
        }
        Ok(())
    }

    /// Copy `src` into the region starting at `offset`
    ///
    /// Partially covered words are updated with masked read-modify-write so
    /// concurrent writers of disjoint bytes in the same word never clobber
    /// each other.
    pub fn write(&self, offset: usize, src: &[u8]) -> Result<(), SharedMemoryError> {
        let end = self.check(offset, src.len())?;
        let mut at = offset;
        while at < end {
            let word_index = at / 4;
            let word_start = word_index * 4;
            let mut mask = 0u32;
            let mut bits = 0u32;
            while at < end && at < word_start + 4 {
                let shift = (at - word_start) * 8;
                mask |= 0xFF << shift;
                bits |= (src[at - offset] as u32) << shift;
                at += 1;
            }
            let word = &self.words[word_index];
            if mask == u32::MAX {
                word.store(bits, Ordering::Relaxed);
            } else {
                word.fetch_and(!mask, Ordering::Relaxed);
                word.fetch_or(bits, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Fill `len` bytes at `offset` with `value`
    pub fn fill(&self, offset: usize, len: usize, value: u8) -> Result<(), SharedMemoryError> {
        self.check(offset, len)?;
        self.write(offset, &vec![value; len])
    }

    /// Atomic load of an aligned 32-bit word
    pub fn load_u32(&self, offset: usize, order: Ordering) -> Result<u32, SharedMemoryError> {
        self.check(offset, 4)?;
        if offset % 4 != 0 {
            return Err(SharedMemoryError { offset, len: 4 });
        }
        Ok(self.words[offset / 4].load(order))
    }

    /// Atomic store of an aligned 32-bit word
    pub fn store_u32(&self, offset: usize, value: u32, order: Ordering) -> Result<(), SharedMemoryError> {
        self.check(offset, 4)?;
        if offset % 4 != 0 {
            return Err(SharedMemoryError { offset, len: 4 });
        }
        self.words[offset / 4].store(value, order);
        Ok(())
    }

    /// Read a little-endian u32 at any byte offset
    pub fn read_u32(&self, offset: usize) -> Result<u32, SharedMemoryError> {
        let mut bytes = [0u8; 4];
        self.read(offset, &mut bytes)?;
        Ok(u32::from_le_bytes(bytes))
    }

    /// Write a little-endian u32 at any byte offset
    pub fn write_u32(&self, offset: usize, value: u32) -> Result<(), SharedMemoryError> {
        self.write(offset, &value.to_le_bytes())
    }
}

// ===== VALIDATED RANGE =====

/// A validated `(region, offset, size)` window
///
/// Accesses are relative to the window and re-checked against its size, so a
/// reference obtained for N bytes can never be used to touch byte N.
#[derive(Debug, Clone)]
pub struct SharedMemoryRef {
    region: Arc<SharedMemoryRegion>,
    offset: usize,
    size: usize,
}

impl SharedMemoryRef {
    pub fn size(&self) -> usize {
        self.size
    }

    fn check(&self, rel: usize, len: usize) -> Result<usize, SharedMemoryError> {
        let end = rel
            .checked_add(len)
            .ok_or(SharedMemoryError { offset: rel, len })?;
        if end > self.size {
            return Err(SharedMemoryError { offset: rel, len });
        }
        Ok(self.offset + rel)
    }

    /// Copy the whole window out
    pub fn read_all(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.size];
        // In range by construction
        let _ = self.region.read(self.offset, &mut out);
        out
    }

    pub fn read(&self, rel: usize, dst: &mut [u8]) -> Result<(), SharedMemoryError> {
        let at = self.check(rel, dst.len())?;
        self.region.read(at, dst)
    }

    pub fn write(&self, rel: usize, src: &[u8]) -> Result<(), SharedMemoryError> {
        let at = self.check(rel, src.len())?;
        self.region.write(at, src)
    }

    pub fn read_u32(&self, rel: usize) -> Result<u32, SharedMemoryError> {
        let at = self.check(rel, 4)?;
        self.region.read_u32(at)
    }

    pub fn write_u32(&self, rel: usize, value: u32) -> Result<(), SharedMemoryError> {
        let at = self.check(rel, 4)?;
        self.region.write_u32(at, value)
    }

    pub fn load_u32(&self, rel: usize, order: Ordering) -> Result<u32, SharedMemoryError> {
        let at = self.check(rel, 4)?;
        self.region.load_u32(at, order)
    }

    pub fn store_u32(&self, rel: usize, value: u32, order: Ordering) -> Result<(), SharedMemoryError> {
        let at = self.check(rel, 4)?;
        self.region.store_u32(at, value, order)
    }

    /// Whether the window starts on a 4-byte boundary of its region
    pub fn is_word_aligned(&self) -> bool {
        self.offset % 4 == 0
    }
}

// ===== MANAGER =====

/// Registered regions of one decoder, keyed by client-visible region id
#[derive(Default)]
pub struct SharedMemoryManager {
    regions: FxHashMap<u32, Arc<SharedMemoryRegion>>,
}

impl SharedMemoryManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a region under `id`
    pub fn register(&mut self, id: u32, region: Arc<SharedMemoryRegion>) {
        self.regions.insert(id, region);
    }

    pub fn unregister(&mut self, id: u32) -> Option<Arc<SharedMemoryRegion>> {
        self.regions.remove(&id)
    }

    pub fn region(&self, id: u32) -> Option<&Arc<SharedMemoryRegion>> {
        self.regions.get(&id)
    }

    /// Resolve `(id, offset, size)` to a validated window
    ///
    /// Returns `None` if the region is unknown or the range overflows or
    /// exceeds the region.
    pub fn get_address(&self, id: u32, offset: u32, size: u32) -> Option<SharedMemoryRef> {
        let region = self.regions.get(&id)?;
        let offset = usize::try_from(offset).ok()?;
        let size = usize::try_from(size).ok()?;
        let end = offset.checked_add(size)?;
        if end > region.size() {
            return None;
        }
        Some(SharedMemoryRef { region: Arc::clone(region), offset, size })
    }

    /// Copy `size` bytes out of `(id, offset)`
    pub fn read_bytes(&self, id: u32, offset: u32, size: u32) -> Option<Vec<u8>> {
        self.get_address(id, offset, size).map(|r| r.read_all())
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }
}

#[cfg(test)]
#[path = "shared_memory_tests.rs"]
mod tests;
