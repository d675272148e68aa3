/// Vertex attribute state and vertex array objects.
///
/// Each decoder owns one `VertexArrayManager`; the attribute state of the
/// default vertex array lives in the decoder itself. Attributes hold a
/// reference on the buffer they source from.

use super::buffer_manager::{BufferKey, BufferManager};
use super::object_table::ObjectTable;
use crate::driver::{reborrow, GraphicsDriver};
use crate::gl;

slotmap::new_key_type! {
    /// Stable key of a vertex array in the per-decoder arena
    pub struct VertexArrayKey;
}

#[derive(Debug, Clone, PartialEq)]
pub struct VertexAttrib {
    index: u32,
    enabled: bool,
    size: i32,
    ty: u32,
    normalized: bool,
    gl_stride: i32,
    offset: usize,
    buffer: Option<BufferKey>,
}

impl VertexAttrib {
    fn new(index: u32) -> Self {
        Self {
            index,
            enabled: false,
            size: 4,
            ty: gl::FLOAT,
            normalized: false,
            gl_stride: 0,
            offset: 0,
            buffer: None,
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn size(&self) -> i32 {
        self.size
    }

    pub fn ty(&self) -> u32 {
        self.ty
    }

    pub fn normalized(&self) -> bool {
        self.normalized
    }

    pub fn gl_stride(&self) -> i32 {
        self.gl_stride
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn buffer(&self) -> Option<BufferKey> {
        self.buffer
    }

    /// Bytes of one element
    pub fn element_size(&self) -> u32 {
        gl::attrib_type_size(self.ty).unwrap_or(4) * self.size as u32
    }

    /// Stride as the driver sees it (tightly packed when 0)
    pub fn real_stride(&self) -> u32 {
        if self.gl_stride > 0 {
            self.gl_stride as u32
        } else {
            self.element_size()
        }
    }

    /// Whether vertices `0..=max_vertex` can be fetched from the bound buffer
    pub fn can_access(&self, buffers: &BufferManager, max_vertex: u32) -> bool {
        let Some(buffer) = self.buffer.and_then(|key| buffers.buffer(key)) else {
            return false;
        };
        let needed = (self.real_stride() as u64)
            .checked_mul(max_vertex as u64)
            .and_then(|n| n.checked_add(self.offset as u64))
            .and_then(|n| n.checked_add(self.element_size() as u64));
        matches!(needed, Some(n) if n <= buffer.size() as u64)
    }

    /// Answer a `GetVertexAttribiv` query
    pub fn get_parameter(&self, pname: u32, buffers: &BufferManager) -> Option<i32> {
        Some(match pname {
            gl::VERTEX_ATTRIB_ARRAY_ENABLED => self.enabled as i32,
            gl::VERTEX_ATTRIB_ARRAY_SIZE => self.size,
            gl::VERTEX_ATTRIB_ARRAY_STRIDE => self.gl_stride,
            gl::VERTEX_ATTRIB_ARRAY_TYPE => self.ty as i32,
            gl::VERTEX_ATTRIB_ARRAY_NORMALIZED => self.normalized as i32,
            gl::VERTEX_ATTRIB_ARRAY_BUFFER_BINDING => self
                .buffer
                .and_then(|key| buffers.client_id(key))
                .map_or(0, |id| id as i32),
            _ => return None,
        })
    }
}

/// Attribute bindings of one vertex array object
pub struct VertexAttribManager {
    service_id: u32,
    attribs: Vec<VertexAttrib>,
    element_array_buffer: Option<BufferKey>,
    num_fixed_attribs: u32,
    has_been_bound: bool,
}

impl VertexAttribManager {
    pub fn new(service_id: u32, max_vertex_attribs: u32) -> Self {
        Self {
            service_id,
            attribs: (0..max_vertex_attribs).map(VertexAttrib::new).collect(),
            element_array_buffer: None,
            num_fixed_attribs: 0,
            has_been_bound: false,
        }
    }

    pub fn service_id(&self) -> u32 {
        self.service_id
    }

    pub fn attrib(&self, index: u32) -> Option<&VertexAttrib> {
        self.attribs.get(index as usize)
    }

    pub fn attribs(&self) -> &[VertexAttrib] {
        &self.attribs
    }

    pub fn enabled_attribs(&self) -> impl Iterator<Item = &VertexAttrib> {
        self.attribs.iter().filter(|a| a.enabled)
    }

    pub fn element_array_buffer(&self) -> Option<BufferKey> {
        self.element_array_buffer
    }

    pub fn has_been_bound(&self) -> bool {
        self.has_been_bound
    }

    pub fn mark_as_bound(&mut self) {
        self.has_been_bound = true;
    }

    /// Enabled attributes sourcing FIXED data
    pub fn have_fixed_attribs(&self) -> bool {
        self.num_fixed_attribs > 0
    }

    pub fn enable(&mut self, index: u32, enabled: bool) -> bool {
        let Some(attrib) = self.attribs.get_mut(index as usize) else {
            return false;
        };
        if attrib.enabled != enabled && attrib.ty == gl::FIXED {
            if enabled {
                self.num_fixed_attribs += 1;
            } else {
                self.num_fixed_attribs -= 1;
            }
        }
        attrib.enabled = enabled;
        true
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set_attrib_info(
        &mut self,
        index: u32,
        buffer: Option<BufferKey>,
        size: i32,
        ty: u32,
        normalized: bool,
        stride: i32,
        offset: usize,
        buffers: &mut BufferManager,
        driver: Option<&mut dyn GraphicsDriver>,
    ) -> bool {
        let Some(attrib) = self.attribs.get_mut(index as usize) else {
            return false;
        };
        if attrib.enabled {
            if attrib.ty == gl::FIXED {
                self.num_fixed_attribs -= 1;
            }
            if ty == gl::FIXED {
                self.num_fixed_attribs += 1;
            }
        }
        if let Some(new) = buffer {
            buffers.add_ref(new);
        }
        let old = std::mem::replace(&mut attrib.buffer, buffer);
        attrib.size = size;
        attrib.ty = ty;
        attrib.normalized = normalized;
        attrib.gl_stride = stride;
        attrib.offset = offset;
        if let Some(old) = old {
            buffers.release(old, driver);
        }
        true
    }

    pub fn set_element_array_buffer(
        &mut self,
        buffer: Option<BufferKey>,
        buffers: &mut BufferManager,
        driver: Option<&mut dyn GraphicsDriver>,
    ) {
        if let Some(new) = buffer {
            buffers.add_ref(new);
        }
        if let Some(old) = std::mem::replace(&mut self.element_array_buffer, buffer) {
            buffers.release(old, driver);
        }
    }

    /// Drop every binding of `buffer` (the buffer was deleted while bound)
    pub fn unbind_buffer(
        &mut self,
        buffer: BufferKey,
        buffers: &mut BufferManager,
        mut driver: Option<&mut dyn GraphicsDriver>,
    ) {
        for attrib in self.attribs.iter_mut().filter(|a| a.buffer == Some(buffer)) {
            attrib.buffer = None;
            buffers.release(buffer, reborrow(&mut driver));
        }
        if self.element_array_buffer == Some(buffer) {
            self.element_array_buffer = None;
            buffers.release(buffer, driver);
        }
    }

    /// Release every buffer reference
    pub fn release_buffers(&mut self, buffers: &mut BufferManager, mut driver: Option<&mut dyn GraphicsDriver>) {
        for attrib in &mut self.attribs {
            if let Some(buffer) = attrib.buffer.take() {
                buffers.release(buffer, reborrow(&mut driver));
            }
        }
        if let Some(buffer) = self.element_array_buffer.take() {
            buffers.release(buffer, driver);
        }
    }
}

/// Vertex array objects created by one decoder
pub struct VertexArrayManager {
    arrays: ObjectTable<VertexArrayKey, VertexAttribManager>,
    max_vertex_attribs: u32,
}

impl VertexArrayManager {
    pub fn new(max_vertex_attribs: u32) -> Self {
        Self {
            arrays: ObjectTable::new(),
            max_vertex_attribs,
        }
    }

    pub fn create_vertex_array(&mut self, client_id: u32, service_id: u32) -> VertexArrayKey {
        self.arrays
            .insert(client_id, VertexAttribManager::new(service_id, self.max_vertex_attribs))
    }

    pub fn get_vertex_array(&self, client_id: u32) -> Option<VertexArrayKey> {
        self.arrays.lookup(client_id)
    }

    pub fn client_id(&self, key: VertexArrayKey) -> Option<u32> {
        self.arrays.client_id(key)
    }

    pub fn vertex_array(&self, key: VertexArrayKey) -> Option<&VertexAttribManager> {
        self.arrays.get(key)
    }

    pub fn vertex_array_mut(&mut self, key: VertexArrayKey) -> Option<&mut VertexAttribManager> {
        self.arrays.get_mut(key)
    }

    pub fn is_vertex_array(&self, client_id: u32) -> bool {
        self.get_vertex_array(client_id)
            .and_then(|key| self.arrays.get(key))
            .is_some_and(|array| array.has_been_bound())
    }

    pub fn remove_vertex_array(
        &mut self,
        client_id: u32,
        buffers: &mut BufferManager,
        mut driver: Option<&mut dyn GraphicsDriver>,
    ) {
        if let Some(mut array) = self.arrays.remove(client_id) {
            array.release_buffers(buffers, reborrow(&mut driver));
            if let Some(driver) = driver {
                driver.delete_vertex_array(array.service_id);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    pub fn destroy(&mut self, buffers: &mut BufferManager, mut driver: Option<&mut dyn GraphicsDriver>) {
        for mut array in self.arrays.drain() {
            array.release_buffers(buffers, reborrow(&mut driver));
            if let Some(driver) = driver.as_deref_mut() {
                driver.delete_vertex_array(array.service_id);
            }
        }
    }
}

#[cfg(test)]
#[path = "vertex_array_manager_tests.rs"]
mod tests;
