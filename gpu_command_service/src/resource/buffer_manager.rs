/// Buffer objects and their manager.
///
/// Element-array buffers keep a host shadow copy so draw validation can find
/// the largest index a `DrawElements` call will read without a driver
/// round-trip. Results are cached per `(type, offset, count)` and invalidated
/// whenever the data changes.

use super::object_table::ObjectTable;
use crate::driver::GraphicsDriver;
use crate::gl;
use rustc_hash::FxHashMap;

slotmap::new_key_type! {
    /// Stable key of a buffer in the buffer arena
    pub struct BufferKey;
}

// ===== BUFFER =====

pub struct Buffer {
    service_id: u32,
    /// First target this buffer was bound to (0 until bound)
    target: u32,
    size: usize,
    usage: u32,
    shadow: Option<Vec<u8>>,
    range_cache: FxHashMap<(u32, usize, u32), u32>,
}

impl Buffer {
    fn new(service_id: u32) -> Self {
        Self {
            service_id,
            target: 0,
            size: 0,
            usage: gl::STATIC_DRAW,
            shadow: None,
            range_cache: FxHashMap::default(),
        }
    }

    pub fn service_id(&self) -> u32 {
        self.service_id
    }

    pub fn target(&self) -> u32 {
        self.target
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn usage(&self) -> u32 {
        self.usage
    }

    pub fn is_valid(&self) -> bool {
        self.target != 0
    }

    /// Whether `[offset, offset + len)` lies inside the buffer
    pub fn check_range(&self, offset: usize, len: usize) -> bool {
        offset.checked_add(len).map(|end| end <= self.size).unwrap_or(false)
    }

    pub fn shadow_data(&self) -> Option<&[u8]> {
        self.shadow.as_deref()
    }

    /// Largest index read by `count` indices of `ty` starting at `offset`
    ///
    /// Returns `None` if the range is outside the buffer, misaligned, or the
    /// buffer has no shadow copy.
    pub fn max_value_for_range(&mut self, offset: usize, count: u32, ty: u32) -> Option<u32> {
        if let Some(max) = self.range_cache.get(&(ty, offset, count)) {
            return Some(*max);
        }
        let index_size = match ty {
            gl::UNSIGNED_BYTE => 1usize,
            gl::UNSIGNED_SHORT => 2,
            gl::UNSIGNED_INT => 4,
            _ => return None,
        };
        if offset % index_size != 0 {
            return None;
        }
        let len = (count as usize).checked_mul(index_size)?;
        if !self.check_range(offset, len) {
            return None;
        }
        let data = self.shadow.as_deref()?.get(offset..offset + len)?;
        let max = match index_size {
            1 => data.iter().map(|b| *b as u32).max(),
            2 => data
                .chunks_exact(2)
                .map(|c| u16::from_ne_bytes([c[0], c[1]]) as u32)
                .max(),
            _ => data
                .chunks_exact(4)
                .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
                .max(),
        }
        .unwrap_or(0);
        self.range_cache.insert((ty, offset, count), max);
        Some(max)
    }
}

// ===== MANAGER =====

/// Tracks every buffer of a context group
pub struct BufferManager {
    buffers: ObjectTable<BufferKey, Buffer>,
    /// Bytes of buffer storage currently specified
    memory_tracked: usize,
    /// Allow one buffer on both ARRAY_BUFFER and ELEMENT_ARRAY_BUFFER
    allow_buffers_on_multiple_targets: bool,
    /// Shadow vertex data too, for drivers needing FIXED attribs converted
    shadow_array_buffers: bool,
}

impl BufferManager {
    pub fn new() -> Self {
        Self {
            buffers: ObjectTable::new(),
            memory_tracked: 0,
            allow_buffers_on_multiple_targets: false,
            shadow_array_buffers: false,
        }
    }

    pub fn set_shadow_array_buffers(&mut self, shadow: bool) {
        self.shadow_array_buffers = shadow;
    }

    pub fn create_buffer(&mut self, client_id: u32, service_id: u32) -> BufferKey {
        self.buffers.insert(client_id, Buffer::new(service_id))
    }

    pub fn get_buffer(&self, client_id: u32) -> Option<BufferKey> {
        self.buffers.lookup(client_id)
    }

    pub fn buffer(&self, key: BufferKey) -> Option<&Buffer> {
        self.buffers.get(key)
    }

    pub fn buffer_mut(&mut self, key: BufferKey) -> Option<&mut Buffer> {
        self.buffers.get_mut(key)
    }

    pub fn client_id(&self, key: BufferKey) -> Option<u32> {
        self.buffers.client_id(key)
    }

    pub fn add_ref(&mut self, key: BufferKey) {
        self.buffers.add_ref(key);
    }

    /// Drop a reference, deleting the driver buffer on the last one
    pub fn release(&mut self, key: BufferKey, driver: Option<&mut dyn GraphicsDriver>) {
        if let Some(buffer) = self.buffers.release(key) {
            self.destroy_buffer(buffer, driver);
        }
    }

    /// Remove the client handle (`DeleteBuffers`)
    pub fn remove_buffer(&mut self, client_id: u32, driver: Option<&mut dyn GraphicsDriver>) {
        if let Some(buffer) = self.buffers.remove(client_id) {
            self.destroy_buffer(buffer, driver);
        }
    }

    fn destroy_buffer(&mut self, buffer: Buffer, driver: Option<&mut dyn GraphicsDriver>) {
        self.memory_tracked -= buffer.size;
        if let Some(driver) = driver {
            driver.delete_buffer(buffer.service_id);
        }
    }

    /// Record the first bind target; false if the buffer was already bound
    /// to an incompatible target
    pub fn set_target(&mut self, key: BufferKey, target: u32) -> bool {
        let allow_multiple = self.allow_buffers_on_multiple_targets;
        let Some(buffer) = self.buffers.get_mut(key) else {
            return false;
        };
        if buffer.target != 0 && buffer.target != target && !allow_multiple {
            return false;
        }
        if buffer.target == 0 {
            buffer.target = target;
        }
        true
    }

    /// Record new storage (`BufferData`)
    pub fn set_info(&mut self, key: BufferKey, size: usize, usage: u32, data: Option<&[u8]>) {
        let Some(buffer) = self.buffers.get_mut(key) else {
            return;
        };
        self.memory_tracked = self.memory_tracked - buffer.size + size;
        buffer.size = size;
        buffer.usage = usage;
        buffer.range_cache.clear();
        let shadowed = buffer.target == gl::ELEMENT_ARRAY_BUFFER
            || (self.shadow_array_buffers && buffer.target == gl::ARRAY_BUFFER);
        buffer.shadow = if shadowed {
            let mut shadow = vec![0u8; size];
            if let Some(data) = data {
                let n = size.min(data.len());
                shadow[..n].copy_from_slice(&data[..n]);
            }
            Some(shadow)
        } else {
            None
        };
    }

    /// Apply a sub-range update to the shadow copy; false if out of range
    pub fn set_range(&mut self, key: BufferKey, offset: usize, data: &[u8]) -> bool {
        let Some(buffer) = self.buffers.get_mut(key) else {
            return false;
        };
        if !buffer.check_range(offset, data.len()) {
            return false;
        }
        if let Some(shadow) = buffer.shadow.as_mut() {
            shadow[offset..offset + data.len()].copy_from_slice(data);
        }
        buffer.range_cache.clear();
        true
    }

    pub fn is_buffer(&self, client_id: u32) -> bool {
        self.buffers
            .lookup(client_id)
            .and_then(|k| self.buffers.get(k))
            .map(|b| b.is_valid())
            .unwrap_or(false)
    }

    pub fn memory_tracked(&self) -> usize {
        self.memory_tracked
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Delete every buffer; driver calls are skipped without a context
    pub fn destroy(&mut self, mut driver: Option<&mut dyn GraphicsDriver>) {
        for buffer in self.buffers.drain() {
            if let Some(driver) = driver.as_deref_mut() {
                driver.delete_buffer(buffer.service_id);
            }
        }
        self.memory_tracked = 0;
    }
}

impl Default for BufferManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "buffer_manager_tests.rs"]
mod tests;
