/// Draw, flush and swap commands
///
/// Before any draw the decoder confirms the target framebuffer is complete
/// and cleared, checks every attribute the program reads against its
/// buffer, substitutes black textures for unrenderable ones and clears
/// textures that still hold undefined levels. On desktop drivers it also
/// feeds a disabled attribute 0 and converts FIXED attributes to float.

use super::commands as cmd;
use super::{done, CommandError, CommandResult, Decoder};
use crate::context_group::GroupResources;
use crate::driver::GraphicsDriver;
use crate::error::ContextLostReason;
use crate::gl;
use crate::resource::TextureKey;
use glam::Vec4;

/// Service buffers backing attribute emulation
#[derive(Debug, Default)]
pub(super) struct AttribEmulation {
    attrib0_buffer: u32,
    /// Vertices the attrib 0 buffer holds and the value it was filled with
    attrib0_filled: Option<(u32, Vec4)>,
    fixed_buffer: u32,
}

impl AttribEmulation {
    pub fn new(driver: &mut dyn GraphicsDriver) -> Self {
        Self {
            attrib0_buffer: driver.gen_buffer(),
            attrib0_filled: None,
            fixed_buffer: driver.gen_buffer(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.attrib0_buffer != 0
    }

    pub fn destroy(self, driver: Option<&mut dyn GraphicsDriver>) {
        let Some(driver) = driver else {
            return;
        };
        for buffer in [self.attrib0_buffer, self.fixed_buffer] {
            if buffer != 0 {
                driver.delete_buffer(buffer);
            }
        }
    }
}

fn sampler_target(ty: u32) -> u32 {
    match ty {
        gl::SAMPLER_CUBE => gl::TEXTURE_CUBE_MAP,
        gl::SAMPLER_EXTERNAL_OES => gl::TEXTURE_EXTERNAL_OES,
        gl::SAMPLER_2D_RECT_ARB => gl::TEXTURE_RECTANGLE_ARB,
        _ => gl::TEXTURE_2D,
    }
}

/// One sampler element of the current program
struct SamplerBinding {
    unit: u32,
    target: u32,
    texture: Option<TextureKey>,
}

/// Driver state changed for one draw and restored after it
#[derive(Default)]
struct DrawFixups {
    black_textures: Vec<(u32, u32, u32)>,
    attrib0: bool,
    fixed: bool,
}

impl Decoder {
    fn sampler_bindings(&self, res: &GroupResources<'_>) -> Vec<SamplerBinding> {
        let Some(exe) = self
            .state
            .current_program
            .and_then(|key| res.programs.program(key))
            .and_then(|program| program.executable())
        else {
            return Vec::new();
        };
        let mut bindings = Vec::new();
        for info in exe.sampler_indices().iter().filter_map(|&index| exe.uniform(index)) {
            let target = sampler_target(info.ty);
            for &unit in &info.texture_units {
                let Some(bound) = self.state.texture_units.get(unit as usize) else {
                    continue;
                };
                let texture = bound.bound(target).or_else(|| res.textures.default_texture(target));
                bindings.push(SamplerBinding { unit, target, texture });
            }
        }
        bindings
    }

    /// Check the current program's attributes against their buffers
    ///
    /// Returns false, with a GL error raised when appropriate, if the draw
    /// must be skipped.
    fn is_draw_valid(&mut self, res: &GroupResources<'_>, function: &str, max_vertex: u32) -> bool {
        let Some(exe) = self
            .state
            .current_program
            .and_then(|key| res.programs.program(key))
            .and_then(|program| program.executable())
        else {
            crate::gpu_debug!("gpu::Decoder", "{}: no current program, draw skipped", function);
            return false;
        };
        let attribs = self.vertex.current(self.state.vertex_array);
        for attrib in attribs.enabled_attribs() {
            if exe.attrib_by_location(attrib.index()).is_some() {
                if !attrib.can_access(res.buffers, max_vertex) {
                    self.errors.set_gl_error(
                        gl::INVALID_OPERATION,
                        function,
                        "attempt to access out of range vertices in attribute",
                    );
                    return false;
                }
            } else if attrib.buffer().is_none() {
                self.errors.set_gl_error(gl::INVALID_OPERATION, function, "attribs enabled but no buffer bound");
                return false;
            }
        }
        true
    }

    /// Bind a black texture wherever a sampler would read an unrenderable one
    fn bind_black_textures(&mut self, res: &GroupResources<'_>, samplers: &[SamplerBinding]) -> Vec<(u32, u32, u32)> {
        let mut replaced = Vec::new();
        if !res.textures.have_unrenderable_textures() {
            return replaced;
        }
        let npot_ok = res.textures.npot_ok();
        for binding in samplers {
            let texture = binding.texture.and_then(|key| res.textures.texture(key));
            if texture.is_some_and(|t| t.can_render(npot_ok)) {
                continue;
            }
            crate::gpu_debug!(
                "gpu::Decoder",
                "Texture unit {} is not renderable; a black texture is bound",
                binding.unit
            );
            self.driver.active_texture(gl::TEXTURE0 + binding.unit);
            self.driver.bind_texture(binding.target, res.textures.black_texture_id(binding.target));
            replaced.push((binding.unit, binding.target, texture.map_or(0, |t| t.service_id())));
        }
        if !replaced.is_empty() {
            self.driver.active_texture(gl::TEXTURE0 + self.state.active_texture_unit);
        }
        replaced
    }

    fn restore_black_textures(&mut self, replaced: &[(u32, u32, u32)]) {
        if replaced.is_empty() {
            return;
        }
        for &(unit, target, service) in replaced {
            self.driver.active_texture(gl::TEXTURE0 + unit);
            self.driver.bind_texture(target, service);
        }
        self.driver.active_texture(gl::TEXTURE0 + self.state.active_texture_unit);
    }

    /// Clear sampled textures with uncleared levels; false if one failed
    fn clear_unsafe_textures(&mut self, res: &mut GroupResources<'_>, samplers: &[SamplerBinding]) -> bool {
        if !res.textures.have_unsafe_textures() {
            return true;
        }
        for key in samplers.iter().filter_map(|binding| binding.texture) {
            if res.textures.texture(key).is_some_and(|t| !t.safe_to_render()) && !self.clear_render_texture(res, key) {
                return false;
            }
        }
        true
    }

    fn array_buffer_service_id(&self, res: &GroupResources<'_>) -> u32 {
        self.state
            .bound_array_buffer
            .and_then(|key| res.buffers.buffer(key))
            .map_or(0, |b| b.service_id())
    }

    /// Feed a disabled attribute 0 from a buffer of the constant value
    ///
    /// Returns `Err(())` after raising OUT_OF_MEMORY when the buffer cannot
    /// be sized, `Ok(true)` when the driver state must be restored.
    fn simulate_attrib0(&mut self, res: &GroupResources<'_>, function: &str, max_vertex: u32) -> Result<bool, ()> {
        if !self.emulation.is_active() {
            return Ok(false);
        }
        let uses_attrib0 = self
            .state
            .current_program
            .and_then(|key| res.programs.program(key))
            .and_then(|program| program.executable())
            .is_some_and(|exe| exe.attrib_by_location(0).is_some());
        let enabled = self.vertex.current(self.state.vertex_array).attrib(0).is_some_and(|a| a.enabled());
        if !uses_attrib0 || enabled {
            return Ok(false);
        }

        let vertices = max_vertex.checked_add(1).ok_or(())?;
        let Some(bytes) = (vertices as usize).checked_mul(std::mem::size_of::<Vec4>()) else {
            self.errors.set_gl_error(gl::OUT_OF_MEMORY, function, "simulating attrib 0");
            return Err(());
        };
        let value = self.state.attrib_values.first().copied().unwrap_or(Vec4::W);
        self.driver.bind_buffer(gl::ARRAY_BUFFER, self.emulation.attrib0_buffer);
        let refill = match self.emulation.attrib0_filled {
            Some((filled, filled_value)) => filled < vertices || filled_value != value,
            None => true,
        };
        if refill {
            let data: Vec<u8> = std::iter::repeat(value.to_array())
                .take(vertices as usize)
                .flat_map(|v| bytemuck::cast::<[f32; 4], [u8; 16]>(v))
                .collect();
            self.errors.copy_real_gl_errors(self.driver.as_mut());
            self.driver.buffer_data(gl::ARRAY_BUFFER, bytes, Some(&data), gl::DYNAMIC_DRAW);
            if self.errors.peek_gl_error(self.driver.as_mut()) != gl::NO_ERROR {
                self.emulation.attrib0_filled = None;
                self.errors.set_gl_error(gl::OUT_OF_MEMORY, function, "simulating attrib 0");
                let service = self.array_buffer_service_id(res);
                self.driver.bind_buffer(gl::ARRAY_BUFFER, service);
                return Err(());
            }
            self.emulation.attrib0_filled = Some((vertices, value));
        }
        self.driver.vertex_attrib_pointer(0, 4, gl::FLOAT, false, 0, 0);
        self.driver.enable_vertex_attrib_array(0);
        Ok(true)
    }

    fn restore_attrib0(&mut self, res: &GroupResources<'_>) {
        let attrib = self.vertex.current(self.state.vertex_array).attrib(0);
        if let Some((buffer, attrib)) = attrib.and_then(|a| Some((a.buffer()?, a))) {
            let service = res.buffers.buffer(buffer).map_or(0, |b| b.service_id());
            self.driver.bind_buffer(gl::ARRAY_BUFFER, service);
            self.driver.vertex_attrib_pointer(
                0,
                attrib.size(),
                attrib.ty(),
                attrib.normalized(),
                attrib.gl_stride(),
                attrib.offset(),
            );
        }
        self.driver.disable_vertex_attrib_array(0);
        let service = self.array_buffer_service_id(res);
        self.driver.bind_buffer(gl::ARRAY_BUFFER, service);
    }

    /// Convert enabled FIXED attributes into floats in a service buffer
    fn simulate_fixed_attribs(&mut self, res: &GroupResources<'_>, function: &str, max_vertex: u32) -> Result<bool, ()> {
        if !self.emulation.is_active() || !self.vertex.current(self.state.vertex_array).have_fixed_attribs() {
            return Ok(false);
        }
        let exe = self
            .state
            .current_program
            .and_then(|key| res.programs.program(key))
            .and_then(|program| program.executable());
        let vertices = max_vertex as usize + 1;
        let mut floats: Vec<f32> = Vec::new();
        let mut pointers = Vec::new();
        for attrib in self.vertex.current(self.state.vertex_array).enabled_attribs() {
            if attrib.ty() != gl::FIXED || !exe.is_some_and(|e| e.attrib_by_location(attrib.index()).is_some()) {
                continue;
            }
            let Some(shadow) = attrib.buffer().and_then(|key| res.buffers.buffer(key)).and_then(|b| b.shadow_data())
            else {
                self.errors.set_gl_error(gl::INVALID_OPERATION, function, "FIXED attribute without shadowed data");
                return Err(());
            };
            pointers.push((attrib.index(), attrib.size(), floats.len() * 4));
            let stride = attrib.real_stride() as usize;
            for vertex in 0..vertices {
                let base = attrib.offset() + vertex * stride;
                for component in 0..attrib.size() as usize {
                    let at = base + component * 4;
                    let word = shadow.get(at..at + 4).ok_or(())?;
                    let fixed = i32::from_ne_bytes([word[0], word[1], word[2], word[3]]);
                    floats.push(fixed as f32 / 65536.0);
                }
            }
        }
        if pointers.is_empty() {
            return Ok(false);
        }
        let data: &[u8] = bytemuck::cast_slice(&floats);
        self.driver.bind_buffer(gl::ARRAY_BUFFER, self.emulation.fixed_buffer);
        self.driver.buffer_data(gl::ARRAY_BUFFER, data.len(), Some(data), gl::DYNAMIC_DRAW);
        for (index, size, offset) in pointers {
            self.driver.vertex_attrib_pointer(index, size, gl::FLOAT, false, 0, offset);
        }
        Ok(true)
    }

    /// Shared tail of both draw calls
    fn draw_with_fixups(
        &mut self,
        res: &mut GroupResources<'_>,
        function: &str,
        max_vertex: u32,
        draw: impl FnOnce(&mut dyn GraphicsDriver),
    ) -> CommandResult {
        if !self.is_draw_valid(res, function, max_vertex) {
            return done();
        }
        let samplers = self.sampler_bindings(res);
        if !self.clear_unsafe_textures(res, &samplers) {
            return self.set_error(gl::OUT_OF_MEMORY, function, "texture could not be cleared");
        }

        let mut fixups = DrawFixups::default();
        match self.simulate_attrib0(res, function, max_vertex) {
            Ok(simulated) => fixups.attrib0 = simulated,
            Err(()) => return done(),
        }
        match self.simulate_fixed_attribs(res, function, max_vertex) {
            Ok(simulated) => fixups.fixed = simulated,
            Err(()) => {
                if fixups.attrib0 {
                    self.restore_attrib0(res);
                }
                return done();
            }
        }
        fixups.black_textures = self.bind_black_textures(res, &samplers);

        draw(self.driver.as_mut());

        self.restore_black_textures(&fixups.black_textures);
        if fixups.attrib0 {
            self.restore_attrib0(res);
        }
        if fixups.fixed {
            let service = self.array_buffer_service_id(res);
            self.driver.bind_buffer(gl::ARRAY_BUFFER, service);
        }
        if self.check_reset_status() {
            return Err(CommandError::LostContext);
        }
        done()
    }

    pub(super) fn draw_arrays(&mut self, res: &mut GroupResources<'_>, c: cmd::DrawArrays) -> CommandResult {
        const FUNC: &str = "glDrawArrays";
        if !res.features.validators.draw_mode.is_valid(c.mode) {
            return self.invalid_enum(FUNC, c.mode, "mode");
        }
        if c.count < 0 {
            return self.set_error(gl::INVALID_VALUE, FUNC, "count < 0");
        }
        if c.first < 0 {
            return self.set_error(gl::INVALID_VALUE, FUNC, "first < 0");
        }
        if !self.check_framebuffer_valid(res, false, FUNC) || c.count == 0 {
            return done();
        }
        let Some(max_vertex) = (c.first as u32).checked_add(c.count as u32 - 1) else {
            return self.set_error(gl::INVALID_OPERATION, FUNC, "first + count overflow");
        };
        self.draw_with_fixups(res, FUNC, max_vertex, |driver| driver.draw_arrays(c.mode, c.first, c.count))
    }

    pub(super) fn draw_elements(&mut self, res: &mut GroupResources<'_>, c: cmd::DrawElements) -> CommandResult {
        const FUNC: &str = "glDrawElements";
        let validators = &res.features.validators;
        if !validators.draw_mode.is_valid(c.mode) {
            return self.invalid_enum(FUNC, c.mode, "mode");
        }
        if !validators.index_type.is_valid(c.ty) {
            return self.invalid_enum(FUNC, c.ty, "type");
        }
        if c.count < 0 {
            return self.set_error(gl::INVALID_VALUE, FUNC, "count < 0");
        }
        let Some(element_buffer) = self.vertex.current(self.state.vertex_array).element_array_buffer() else {
            return self.set_error(gl::INVALID_OPERATION, FUNC, "No element array buffer bound");
        };
        if !self.check_framebuffer_valid(res, false, FUNC) || c.count == 0 {
            return done();
        }
        let offset = c.index_offset as usize;
        let max_index = res
            .buffers
            .buffer_mut(element_buffer)
            .and_then(|buffer| buffer.max_value_for_range(offset, c.count as u32, c.ty));
        let Some(max_vertex) = max_index else {
            return self.set_error(gl::INVALID_OPERATION, FUNC, "range out of bounds for buffer");
        };
        self.draw_with_fixups(res, FUNC, max_vertex, |driver| driver.draw_elements(c.mode, c.count, c.ty, offset))
    }

    // ===== FLUSH / SWAP =====

    pub(super) fn flush(&mut self, _res: &mut GroupResources<'_>) -> CommandResult {
        self.driver.flush();
        if self.check_reset_status() {
            return Err(CommandError::LostContext);
        }
        done()
    }

    pub(super) fn finish(&mut self, _res: &mut GroupResources<'_>) -> CommandResult {
        self.driver.finish();
        if self.check_reset_status() {
            return Err(CommandError::LostContext);
        }
        self.process_pending_reads();
        done()
    }

    pub(super) fn swap_buffers(&mut self, res: &mut GroupResources<'_>) -> CommandResult {
        self.clear_backbuffer_if_needed(res);
        if let Some(target) = self.offscreen.as_ref() {
            let restore = self.restore_bindings(res);
            target.swap(self.driver.as_mut(), restore);
        } else if !self.surface.swap_buffers() {
            crate::gpu_error!("gpu::Decoder", "SwapBuffers failed on decoder {}", self.id.raw());
            self.mark_lost(ContextLostReason::Unknown);
            return Err(CommandError::LostContext);
        }
        if !self.attribs.buffer_preserved {
            self.backbuffer_cleared = false;
        }
        if self.check_reset_status() {
            return Err(CommandError::LostContext);
        }
        done()
    }
}

#[cfg(test)]
#[path = "draw_tests.rs"]
mod tests;
