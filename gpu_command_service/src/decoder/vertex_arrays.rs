/// Vertex attribute and vertex array object commands
///
/// Every decoder has a default attribute set used while no vertex array
/// object is bound. Without native vertex array support the decoder
/// re-issues the bound array's attribute state on every bind.

use super::commands as cmd;
use super::{done, immediate_ids, CommandError, CommandResult, Decoder};
use crate::context_group::GroupResources;
use crate::feature::FeatureFlags;
use crate::gl;
use crate::resource::{VertexArrayKey, VertexArrayManager, VertexAttribManager};
use glam::Vec4;

/// Vertex array objects of one decoder plus its default attribute set
pub(super) struct VertexArrays {
    pub manager: VertexArrayManager,
    pub default: VertexAttribManager,
}

impl VertexArrays {
    pub fn new(max_vertex_attribs: u32) -> Self {
        Self {
            manager: VertexArrayManager::new(max_vertex_attribs),
            default: VertexAttribManager::new(0, max_vertex_attribs),
        }
    }

    /// Attribute set in effect for `bound`
    pub fn current(&self, bound: Option<VertexArrayKey>) -> &VertexAttribManager {
        bound.and_then(|key| self.manager.vertex_array(key)).unwrap_or(&self.default)
    }

    pub fn current_mut(&mut self, bound: Option<VertexArrayKey>) -> &mut VertexAttribManager {
        match bound.and_then(|key| self.manager.vertex_array_mut(key)) {
            Some(array) => array,
            None => &mut self.default,
        }
    }
}

impl Decoder {
    fn max_vertex_attribs(res: &GroupResources<'_>) -> u32 {
        res.features.limits.max_vertex_attribs
    }

    pub(super) fn enable_vertex_attrib_array(
        &mut self,
        res: &mut GroupResources<'_>,
        c: cmd::EnableVertexAttribArray,
    ) -> CommandResult {
        if c.index >= Self::max_vertex_attribs(res) {
            return self.set_error(gl::INVALID_VALUE, "glEnableVertexAttribArray", "index out of range");
        }
        self.vertex.current_mut(self.state.vertex_array).enable(c.index, true);
        self.driver.enable_vertex_attrib_array(c.index);
        done()
    }

    pub(super) fn disable_vertex_attrib_array(
        &mut self,
        res: &mut GroupResources<'_>,
        c: cmd::DisableVertexAttribArray,
    ) -> CommandResult {
        if c.index >= Self::max_vertex_attribs(res) {
            return self.set_error(gl::INVALID_VALUE, "glDisableVertexAttribArray", "index out of range");
        }
        self.vertex.current_mut(self.state.vertex_array).enable(c.index, false);
        // Attrib 0 stays enabled while it is emulated
        if c.index != 0 || !self.emulation.is_active() {
            self.driver.disable_vertex_attrib_array(c.index);
        }
        done()
    }

    pub(super) fn vertex_attrib_pointer(&mut self, res: &mut GroupResources<'_>, c: cmd::VertexAttribPointer) -> CommandResult {
        const FUNC: &str = "glVertexAttribPointer";
        let validators = &res.features.validators;
        if !validators.vertex_attrib_type.is_valid(c.ty) {
            return self.invalid_enum(FUNC, c.ty, "type");
        }
        if !validators.vertex_attrib_size.is_valid(c.size) {
            return self.set_error(gl::INVALID_VALUE, FUNC, "size not 1, 2, 3 or 4");
        }
        if c.index >= Self::max_vertex_attribs(res) {
            return self.set_error(gl::INVALID_VALUE, FUNC, "index out of range");
        }
        if !(0..=255).contains(&c.stride) {
            return self.set_error(gl::INVALID_VALUE, FUNC, "stride < 0 or > 255");
        }
        let Some(buffer) = self.state.bound_array_buffer else {
            return self.set_error(gl::INVALID_VALUE, FUNC, "no array buffer bound");
        };
        let type_size = gl::attrib_type_size(c.ty).ok_or(CommandError::InvalidArguments)?;
        if c.offset % type_size != 0 {
            return self.set_error(gl::INVALID_OPERATION, FUNC, "offset not valid for type");
        }
        if c.stride as u32 % type_size != 0 {
            return self.set_error(gl::INVALID_OPERATION, FUNC, "stride not valid for type");
        }

        let normalized = c.normalized != 0;
        self.vertex.current_mut(self.state.vertex_array).set_attrib_info(
            c.index,
            Some(buffer),
            c.size,
            c.ty,
            normalized,
            c.stride,
            c.offset as usize,
            res.buffers,
            Some(self.driver.as_mut()),
        );
        // FIXED data is converted into a service buffer at draw time
        if c.ty != gl::FIXED || !self.emulation.is_active() {
            self.driver
                .vertex_attrib_pointer(c.index, c.size, c.ty, normalized, c.stride, c.offset as usize);
        }
        done()
    }

    pub(super) fn vertex_attrib_4f(&mut self, res: &mut GroupResources<'_>, c: cmd::VertexAttrib4f) -> CommandResult {
        if c.index >= Self::max_vertex_attribs(res) {
            return self.set_error(gl::INVALID_VALUE, "glVertexAttrib4f", "index out of range");
        }
        let value = Vec4::new(c.x, c.y, c.z, c.w);
        if let Some(slot) = self.state.attrib_values.get_mut(c.index as usize) {
            *slot = value;
        }
        if c.index != 0 || !self.emulation.is_active() {
            self.driver.vertex_attrib_4f(c.index, value.to_array());
        }
        done()
    }

    // ===== VERTEX ARRAY OBJECTS =====

    pub(super) fn gen_vertex_arrays(
        &mut self,
        res: &mut GroupResources<'_>,
        c: cmd::GenVertexArraysOESImmediate,
        data: &[u32],
    ) -> CommandResult {
        let Some(ids) = immediate_ids(data, c.n)? else {
            return self.set_error(gl::INVALID_VALUE, "glGenVertexArraysOES", "n < 0");
        };
        if !super::ids_are_new(ids, |id| self.vertex.manager.get_vertex_array(id).is_some()) {
            return Err(CommandError::InvalidArguments);
        }
        let native = res.features.has(FeatureFlags::NATIVE_VERTEX_ARRAY_OBJECT);
        for &id in ids {
            let service = if native { self.driver.gen_vertex_array() } else { 0 };
            self.vertex.manager.create_vertex_array(id, service);
        }
        done()
    }

    pub(super) fn delete_vertex_arrays(
        &mut self,
        res: &mut GroupResources<'_>,
        c: cmd::DeleteVertexArraysOESImmediate,
        data: &[u32],
    ) -> CommandResult {
        let Some(ids) = immediate_ids(data, c.n)? else {
            return self.set_error(gl::INVALID_VALUE, "glDeleteVertexArraysOES", "n < 0");
        };
        for &id in ids {
            let Some(key) = self.vertex.manager.get_vertex_array(id) else {
                continue;
            };
            if self.state.vertex_array == Some(key) {
                self.state.vertex_array = None;
                self.apply_vertex_array(res);
            }
            self.vertex
                .manager
                .remove_vertex_array(id, res.buffers, Some(self.driver.as_mut()));
        }
        done()
    }

    pub(super) fn is_vertex_array(&mut self, _res: &mut GroupResources<'_>, c: cmd::IsVertexArrayOES) -> CommandResult {
        let value = self.vertex.manager.is_vertex_array(c.array) as u32;
        self.write_result_u32(c.result_shm_id, c.result_shm_offset, value)
    }

    pub(super) fn bind_vertex_array(&mut self, res: &mut GroupResources<'_>, c: cmd::BindVertexArrayOES) -> CommandResult {
        let key = if c.array == 0 {
            None
        } else {
            let Some(key) = self.vertex.manager.get_vertex_array(c.array) else {
                return self.set_error(gl::INVALID_OPERATION, "glBindVertexArrayOES", "bad vertex array id");
            };
            Some(key)
        };
        if self.state.vertex_array == key {
            return done();
        }
        if let Some(array) = key.and_then(|key| self.vertex.manager.vertex_array_mut(key)) {
            array.mark_as_bound();
        }
        self.state.vertex_array = key;
        self.apply_vertex_array(res);
        done()
    }

    /// Make the driver's attribute state match the bound vertex array
    pub(super) fn apply_vertex_array(&mut self, res: &GroupResources<'_>) {
        let array = self.vertex.current(self.state.vertex_array);
        if res.features.has(FeatureFlags::NATIVE_VERTEX_ARRAY_OBJECT) {
            self.driver.bind_vertex_array(array.service_id());
            return;
        }
        let driver = self.driver.as_mut();
        let service_of = |key| res.buffers.buffer(key).map_or(0, |b| b.service_id());
        for attrib in array.attribs() {
            if let Some(buffer) = attrib.buffer() {
                driver.bind_buffer(gl::ARRAY_BUFFER, service_of(buffer));
                if attrib.ty() != gl::FIXED {
                    driver.vertex_attrib_pointer(
                        attrib.index(),
                        attrib.size(),
                        attrib.ty(),
                        attrib.normalized(),
                        attrib.gl_stride(),
                        attrib.offset(),
                    );
                }
            }
            if attrib.enabled() {
                driver.enable_vertex_attrib_array(attrib.index());
            } else {
                driver.disable_vertex_attrib_array(attrib.index());
            }
        }
        driver.bind_buffer(gl::ARRAY_BUFFER, self.state.bound_array_buffer.map_or(0, service_of));
        driver.bind_buffer(gl::ELEMENT_ARRAY_BUFFER, array.element_array_buffer().map_or(0, service_of));
    }
}

#[cfg(test)]
#[path = "vertex_arrays_tests.rs"]
mod tests;
