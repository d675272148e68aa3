/// Buffer object commands

use super::commands as cmd;
use super::{claim_ids, done, immediate_ids, CommandError, CommandResult, Decoder};
use crate::context_group::{GroupResources, IdNamespace};
use crate::gl;
use crate::resource::BufferKey;

impl Decoder {
    pub(super) fn gen_buffers(&mut self, res: &mut GroupResources<'_>, c: cmd::GenBuffersImmediate, data: &[u32]) -> CommandResult {
        let Some(ids) = immediate_ids(data, c.n)? else {
            return self.set_error(gl::INVALID_VALUE, "glGenBuffers", "n < 0");
        };
        if !claim_ids(res, IdNamespace::Buffers, ids, |res, id| res.buffers.get_buffer(id).is_some()) {
            return Err(CommandError::InvalidArguments);
        }
        for &id in ids {
            let service = self.driver.gen_buffer();
            res.buffers.create_buffer(id, service);
        }
        done()
    }

    pub(super) fn delete_buffers(
        &mut self,
        res: &mut GroupResources<'_>,
        c: cmd::DeleteBuffersImmediate,
        data: &[u32],
    ) -> CommandResult {
        let Some(ids) = immediate_ids(data, c.n)? else {
            return self.set_error(gl::INVALID_VALUE, "glDeleteBuffers", "n < 0");
        };
        for &id in ids {
            let Some(key) = res.buffers.get_buffer(id) else {
                continue;
            };
            if self.state.bound_array_buffer == Some(key) {
                self.state.bound_array_buffer = None;
                res.buffers.release(key, Some(self.driver.as_mut()));
            }
            self.vertex
                .current_mut(self.state.vertex_array)
                .unbind_buffer(key, res.buffers, Some(self.driver.as_mut()));
            res.buffers.remove_buffer(id, Some(self.driver.as_mut()));
            res.id_allocator(IdNamespace::Buffers).free_id(id);
        }
        done()
    }

    /// Buffer bound to `target`; the element array binding lives in the
    /// current vertex array
    fn bound_buffer(&self, target: u32) -> Option<BufferKey> {
        match target {
            gl::ARRAY_BUFFER => self.state.bound_array_buffer,
            gl::ELEMENT_ARRAY_BUFFER => self.vertex.current(self.state.vertex_array).element_array_buffer(),
            _ => None,
        }
    }

    pub(super) fn bind_buffer(&mut self, res: &mut GroupResources<'_>, c: cmd::BindBuffer) -> CommandResult {
        if !res.features.validators.buffer_target.is_valid(c.target) {
            return self.invalid_enum("glBindBuffer", c.target, "target");
        }
        let key = if c.buffer == 0 {
            None
        } else {
            match res.buffers.get_buffer(c.buffer) {
                Some(key) => Some(key),
                None if res.bind_generates_resource => {
                    let service = self.driver.gen_buffer();
                    res.id_allocator(IdNamespace::Buffers).mark_as_used(c.buffer);
                    Some(res.buffers.create_buffer(c.buffer, service))
                }
                None => {
                    return self.set_error(gl::INVALID_OPERATION, "glBindBuffer", "id not generated by glGenBuffers");
                }
            }
        };
        let mut service = 0;
        if let Some(key) = key {
            if !res.buffers.set_target(key, c.target) {
                return self.set_error(gl::INVALID_OPERATION, "glBindBuffer", "buffer bound to more than 1 target");
            }
            service = res.buffers.buffer(key).map_or(0, |b| b.service_id());
        }

        self.driver.bind_buffer(c.target, service);
        if c.target == gl::ARRAY_BUFFER {
            if let Some(key) = key {
                res.buffers.add_ref(key);
            }
            if let Some(old) = std::mem::replace(&mut self.state.bound_array_buffer, key) {
                res.buffers.release(old, Some(self.driver.as_mut()));
            }
        } else {
            self.vertex
                .current_mut(self.state.vertex_array)
                .set_element_array_buffer(key, res.buffers, Some(self.driver.as_mut()));
        }
        done()
    }

    pub(super) fn buffer_data(&mut self, res: &mut GroupResources<'_>, c: cmd::BufferData) -> CommandResult {
        let validators = &res.features.validators;
        if !validators.buffer_target.is_valid(c.target) {
            return self.invalid_enum("glBufferData", c.target, "target");
        }
        if !validators.buffer_usage.is_valid(c.usage) {
            return self.invalid_enum("glBufferData", c.usage, "usage");
        }
        let Ok(size) = u32::try_from(c.size) else {
            return self.set_error(gl::INVALID_VALUE, "glBufferData", "size < 0");
        };
        let data = if c.data_shm_id != 0 || c.data_shm_offset != 0 {
            Some(self.shm_bytes(c.data_shm_id, c.data_shm_offset, size)?)
        } else {
            None
        };
        let Some(key) = self.bound_buffer(c.target) else {
            return self.set_error(gl::INVALID_VALUE, "glBufferData", "unknown buffer");
        };

        self.errors.copy_real_gl_errors(self.driver.as_mut());
        self.driver.buffer_data(c.target, size as usize, data.as_deref(), c.usage);
        if self.errors.peek_gl_error(self.driver.as_mut()) == gl::NO_ERROR {
            res.buffers.set_info(key, size as usize, c.usage, data.as_deref());
        }
        done()
    }

    pub(super) fn buffer_sub_data(&mut self, res: &mut GroupResources<'_>, c: cmd::BufferSubData) -> CommandResult {
        if !res.features.validators.buffer_target.is_valid(c.target) {
            return self.invalid_enum("glBufferSubData", c.target, "target");
        }
        let (Ok(offset), Ok(size)) = (usize::try_from(c.offset), u32::try_from(c.size)) else {
            return self.set_error(gl::INVALID_VALUE, "glBufferSubData", "offset or size < 0");
        };
        let data = self.shm_bytes(c.data_shm_id, c.data_shm_offset, size)?;
        let Some(key) = self.bound_buffer(c.target) else {
            return self.set_error(gl::INVALID_VALUE, "glBufferSubData", "unknown buffer");
        };
        if !res.buffers.set_range(key, offset, &data) {
            return self.set_error(gl::INVALID_VALUE, "glBufferSubData", "out of range");
        }
        self.driver.buffer_sub_data(c.target, offset, &data);
        done()
    }

    pub(super) fn is_buffer(&mut self, res: &mut GroupResources<'_>, c: cmd::IsBuffer) -> CommandResult {
        self.write_result_u32(c.result_shm_id, c.result_shm_offset, res.buffers.is_buffer(c.buffer) as u32)
    }
}

#[cfg(test)]
#[path = "buffers_tests.rs"]
mod tests;
