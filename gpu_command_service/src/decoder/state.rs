/// Fixed-function state and state queries
///
/// Every setter updates the mirrored `ContextState` before forwarding to the
/// driver, so queries are answered without a driver round trip.

use super::commands as cmd;
use super::context_state::EnableFlags;
use super::{done, CommandResult, Decoder};
use crate::context_group::GroupResources;
use crate::gl;
use glam::Vec4;

impl Decoder {
    pub(super) fn blend_func(&mut self, res: &mut GroupResources<'_>, c: cmd::BlendFunc) -> CommandResult {
        let validators = &res.features.validators;
        if !validators.src_blend_factor.is_valid(c.sfactor) {
            return self.invalid_enum("glBlendFunc", c.sfactor, "sfactor");
        }
        if !validators.dst_blend_factor.is_valid(c.dfactor) {
            return self.invalid_enum("glBlendFunc", c.dfactor, "dfactor");
        }
        self.state.blend_src = c.sfactor;
        self.state.blend_dst = c.dfactor;
        self.driver.blend_func(c.sfactor, c.dfactor);
        done()
    }

    pub(super) fn clear_color(&mut self, c: cmd::ClearColor) -> CommandResult {
        self.state.clear_color = Vec4::new(c.red, c.green, c.blue, c.alpha);
        self.driver.clear_color(self.state.clear_color.to_array());
        done()
    }

    pub(super) fn clear_depth(&mut self, c: cmd::ClearDepthf) -> CommandResult {
        self.state.clear_depth = c.depth.clamp(0.0, 1.0);
        self.driver.clear_depth(self.state.clear_depth);
        done()
    }

    pub(super) fn clear_stencil(&mut self, c: cmd::ClearStencil) -> CommandResult {
        self.state.clear_stencil = c.s;
        self.driver.clear_stencil(c.s);
        done()
    }

    pub(super) fn color_mask(&mut self, c: cmd::ColorMask) -> CommandResult {
        let mask = [c.red != 0, c.green != 0, c.blue != 0, c.alpha != 0];
        self.state.color_mask = mask;
        self.driver.color_mask(mask);
        done()
    }

    pub(super) fn cull_face(&mut self, res: &mut GroupResources<'_>, c: cmd::CullFace) -> CommandResult {
        if !res.features.validators.face_type.is_valid(c.mode) {
            return self.invalid_enum("glCullFace", c.mode, "mode");
        }
        self.state.cull_mode = c.mode;
        self.driver.cull_face(c.mode);
        done()
    }

    pub(super) fn depth_func(&mut self, res: &mut GroupResources<'_>, c: cmd::DepthFunc) -> CommandResult {
        if !res.features.validators.cmp_function.is_valid(c.func) {
            return self.invalid_enum("glDepthFunc", c.func, "func");
        }
        self.state.depth_func = c.func;
        self.driver.depth_func(c.func);
        done()
    }

    pub(super) fn depth_mask(&mut self, c: cmd::DepthMask) -> CommandResult {
        self.state.depth_mask = c.flag != 0;
        self.driver.depth_mask(self.state.depth_mask);
        done()
    }

    fn set_capability(&mut self, res: &GroupResources<'_>, function: &str, cap: u32, enabled: bool) -> CommandResult {
        let flag = EnableFlags::from_cap(cap).filter(|_| res.features.validators.capability.is_valid(cap));
        let Some(flag) = flag else {
            return self.invalid_enum(function, cap, "cap");
        };
        if self.state.set_enabled(flag, enabled) {
            if enabled {
                self.driver.enable(cap);
            } else {
                self.driver.disable(cap);
            }
        }
        done()
    }

    pub(super) fn enable(&mut self, res: &mut GroupResources<'_>, c: cmd::Enable) -> CommandResult {
        self.set_capability(res, "glEnable", c.cap, true)
    }

    pub(super) fn disable(&mut self, res: &mut GroupResources<'_>, c: cmd::Disable) -> CommandResult {
        self.set_capability(res, "glDisable", c.cap, false)
    }

    pub(super) fn front_face(&mut self, res: &mut GroupResources<'_>, c: cmd::FrontFace) -> CommandResult {
        if !res.features.validators.face_mode.is_valid(c.mode) {
            return self.invalid_enum("glFrontFace", c.mode, "mode");
        }
        self.state.front_face = c.mode;
        self.driver.front_face(c.mode);
        done()
    }

    pub(super) fn hint(&mut self, res: &mut GroupResources<'_>, c: cmd::Hint) -> CommandResult {
        let validators = &res.features.validators;
        if !validators.hint_target.is_valid(c.target) {
            return self.invalid_enum("glHint", c.target, "target");
        }
        if !validators.hint_mode.is_valid(c.mode) {
            return self.invalid_enum("glHint", c.mode, "mode");
        }
        if c.target == gl::GENERATE_MIPMAP_HINT {
            self.state.hint_generate_mipmap = c.mode;
        }
        self.driver.hint(c.target, c.mode);
        done()
    }

    pub(super) fn pixel_store_i(&mut self, res: &mut GroupResources<'_>, c: cmd::PixelStorei) -> CommandResult {
        const FUNC: &str = "glPixelStorei";
        let validators = &res.features.validators;
        if !validators.pixel_store.is_valid(c.pname) {
            return self.invalid_enum(FUNC, c.pname, "pname");
        }
        match c.pname {
            gl::PACK_ALIGNMENT | gl::UNPACK_ALIGNMENT => {
                if !validators.pixel_store_alignment.is_valid(c.param) {
                    return self.set_error(gl::INVALID_VALUE, FUNC, "param not 1, 2, 4 or 8");
                }
                if c.pname == gl::PACK_ALIGNMENT {
                    self.state.pack_alignment = c.param;
                } else {
                    self.state.unpack_alignment = c.param;
                }
                self.driver.pixel_store_i(c.pname, c.param);
            }
            // Applied by the service while unpacking, never by the driver
            gl::UNPACK_FLIP_Y_CHROMIUM => self.state.unpack_flip_y = c.param != 0,
            gl::UNPACK_PREMULTIPLY_ALPHA_CHROMIUM => self.state.unpack_premultiply_alpha = c.param != 0,
            pname => self.driver.pixel_store_i(pname, c.param),
        }
        done()
    }

    pub(super) fn scissor(&mut self, c: cmd::Scissor) -> CommandResult {
        if c.width < 0 || c.height < 0 {
            return self.set_error(gl::INVALID_VALUE, "glScissor", "width or height < 0");
        }
        self.state.scissor = [c.x, c.y, c.width, c.height];
        self.driver.scissor(c.x, c.y, c.width, c.height);
        done()
    }

    pub(super) fn viewport(&mut self, c: cmd::Viewport) -> CommandResult {
        if c.width < 0 || c.height < 0 {
            return self.set_error(gl::INVALID_VALUE, "glViewport", "width or height < 0");
        }
        self.state.viewport = [c.x, c.y, c.width, c.height];
        self.driver.viewport(c.x, c.y, c.width, c.height);
        done()
    }

    // ===== QUERIES =====

    pub(super) fn get_error_cmd(&mut self, c: cmd::GetError) -> CommandResult {
        let result = self.shm(c.result_shm_id, c.result_shm_offset, 4)?;
        let error = self.get_error();
        result.write_u32(0, error)?;
        done()
    }

    /// Values the decoder answers itself: bindings as client ids, limits,
    /// back buffer bits and the mirrored state
    fn integer_state(&mut self, res: &GroupResources<'_>, pname: u32) -> Vec<i32> {
        let client = |id: Option<u32>| id.map_or(0, |id| id as i32);
        let limits = &res.features.limits;
        let value = match pname {
            gl::CURRENT_PROGRAM => client(self.state.current_program.and_then(|k| res.programs.client_id(k))),
            gl::ARRAY_BUFFER_BINDING => client(self.state.bound_array_buffer.and_then(|k| res.buffers.client_id(k))),
            gl::ELEMENT_ARRAY_BUFFER_BINDING => client(
                self.vertex
                    .current(self.state.vertex_array)
                    .element_array_buffer()
                    .and_then(|k| res.buffers.client_id(k)),
            ),
            gl::FRAMEBUFFER_BINDING => {
                client(self.state.bound_draw_framebuffer.and_then(|k| res.framebuffers.client_id(k)))
            }
            gl::RENDERBUFFER_BINDING => {
                client(self.state.bound_renderbuffer.and_then(|k| res.renderbuffers.client_id(k)))
            }
            gl::TEXTURE_BINDING_2D | gl::TEXTURE_BINDING_CUBE_MAP => {
                let target = if pname == gl::TEXTURE_BINDING_2D { gl::TEXTURE_2D } else { gl::TEXTURE_CUBE_MAP };
                client(self.state.bound_texture(target).and_then(|k| res.textures.client_id(k)))
            }
            gl::VERTEX_ARRAY_BINDING_OES => {
                client(self.state.vertex_array.and_then(|k| self.vertex.manager.client_id(k)))
            }
            gl::MAX_TEXTURE_SIZE => limits.max_texture_size as i32,
            gl::MAX_CUBE_MAP_TEXTURE_SIZE => limits.max_cube_map_texture_size as i32,
            gl::MAX_RENDERBUFFER_SIZE => limits.max_renderbuffer_size as i32,
            gl::MAX_VERTEX_ATTRIBS => limits.max_vertex_attribs as i32,
            gl::MAX_COMBINED_TEXTURE_IMAGE_UNITS => limits.max_texture_units as i32,
            gl::MAX_TEXTURE_IMAGE_UNITS => limits.max_texture_image_units as i32,
            gl::MAX_VERTEX_TEXTURE_IMAGE_UNITS => limits.max_vertex_texture_image_units as i32,
            gl::MAX_FRAGMENT_UNIFORM_VECTORS => limits.max_fragment_uniform_vectors as i32,
            gl::MAX_VERTEX_UNIFORM_VECTORS => limits.max_vertex_uniform_vectors as i32,
            gl::MAX_VARYING_VECTORS => limits.max_varying_vectors as i32,
            gl::MAX_SAMPLES_EXT => limits.max_samples as i32,
            gl::NUM_COMPRESSED_TEXTURE_FORMATS => res.features.validators.compressed_texture_format.values().len() as i32,
            gl::COMPRESSED_TEXTURE_FORMATS => {
                return res
                    .features
                    .validators
                    .compressed_texture_format
                    .values()
                    .iter()
                    .map(|format| *format as i32)
                    .collect();
            }
            gl::ALPHA_BITS if self.state.bound_draw_framebuffer.is_none() => self.attribs.alpha_size,
            gl::DEPTH_BITS if self.state.bound_draw_framebuffer.is_none() => self.attribs.depth_size,
            gl::STENCIL_BITS if self.state.bound_draw_framebuffer.is_none() => self.attribs.stencil_size,
            pname => match self.state.get_integers(pname) {
                Some(values) => return values,
                None => self.driver.get_integer(pname),
            },
        };
        vec![value]
    }

    pub(super) fn get_integer_v(&mut self, res: &mut GroupResources<'_>, c: cmd::GetIntegerv) -> CommandResult {
        if !res.features.validators.g_l_state.is_valid(c.pname) {
            return self.invalid_enum("glGetIntegerv", c.pname, "pname");
        }
        let values = self.integer_state(res, c.pname);
        let result = self.sized_result(c.params_shm_id, c.params_shm_offset, values.len())?;
        let words: Vec<u32> = values.iter().map(|v| *v as u32).collect();
        Self::write_sized_result(&result, &words)
    }

    pub(super) fn get_string(&mut self, res: &mut GroupResources<'_>, c: cmd::GetString) -> CommandResult {
        if !res.features.validators.string_type.is_valid(c.name) {
            return self.invalid_enum("glGetString", c.name, "name");
        }
        let text = match c.name {
            gl::VERSION => "OpenGL ES 2.0 GPU Command Service".to_string(),
            gl::SHADING_LANGUAGE_VERSION => "OpenGL ES GLSL ES 1.0 GPU Command Service".to_string(),
            gl::EXTENSIONS => res.features.extensions_string(),
            name => self.driver.get_string(name),
        };
        self.buckets.set_string(c.bucket_id, &text);
        done()
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
