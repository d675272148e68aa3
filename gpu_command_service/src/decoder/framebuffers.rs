/// Framebuffer, renderbuffer, Clear and ReadPixels commands

use super::commands as cmd;
use super::{claim_ids, clip, done, has_alpha, immediate_ids, CommandError, CommandResult, Decoder, PendingReadPixels};
use crate::context_group::{GroupResources, IdNamespace};
use crate::feature::{FeatureFlags, Workarounds};
use crate::gl;
use crate::resource::{Attachment, FramebufferKey, RenderbufferKey};
use std::sync::atomic::Ordering;

/// Size of `{ success, row_length, num_rows }` written by ReadPixels
const READ_PIXELS_RESULT_SIZE: u32 = 12;

/// Attachment points an attach command names
fn attachment_points(attachment: u32) -> Vec<u32> {
    if attachment == gl::DEPTH_STENCIL_ATTACHMENT {
        vec![gl::DEPTH_ATTACHMENT, gl::STENCIL_ATTACHMENT]
    } else {
        vec![attachment]
    }
}

/// Desktop drivers take sized formats GLES2 names differently
fn driver_renderbuffer_format(internal_format: u32, desktop: bool) -> u32 {
    if !desktop {
        return internal_format;
    }
    match internal_format {
        gl::RGBA4 | gl::RGB5_A1 => gl::RGBA,
        gl::RGB565 => gl::RGB,
        gl::DEPTH_COMPONENT16 => gl::DEPTH_COMPONENT,
        other => other,
    }
}

impl Decoder {
    /// Framebuffer bound to `target`; reads use the read binding
    fn bound_framebuffer(&self, target: u32) -> Option<FramebufferKey> {
        if target == gl::READ_FRAMEBUFFER_EXT {
            self.state.bound_read_framebuffer
        } else {
            self.state.bound_draw_framebuffer
        }
    }

    pub(super) fn gen_framebuffers(
        &mut self,
        res: &mut GroupResources<'_>,
        c: cmd::GenFramebuffersImmediate,
        data: &[u32],
    ) -> CommandResult {
        let Some(ids) = immediate_ids(data, c.n)? else {
            return self.set_error(gl::INVALID_VALUE, "glGenFramebuffers", "n < 0");
        };
        if !claim_ids(res, IdNamespace::Framebuffers, ids, |res, id| res.framebuffers.get_framebuffer(id).is_some()) {
            return Err(CommandError::InvalidArguments);
        }
        for &id in ids {
            let service = self.driver.gen_framebuffer();
            res.framebuffers.create_framebuffer(id, service);
        }
        done()
    }

    pub(super) fn delete_framebuffers(
        &mut self,
        res: &mut GroupResources<'_>,
        c: cmd::DeleteFramebuffersImmediate,
        data: &[u32],
    ) -> CommandResult {
        let Some(ids) = immediate_ids(data, c.n)? else {
            return self.set_error(gl::INVALID_VALUE, "glDeleteFramebuffers", "n < 0");
        };
        for &id in ids {
            let Some(key) = res.framebuffers.get_framebuffer(id) else {
                continue;
            };
            let backbuffer = self.backbuffer_id();
            if self.state.bound_draw_framebuffer == Some(key) {
                self.state.bound_draw_framebuffer = None;
                res.framebuffers.release(key, res.textures, res.renderbuffers, Some(self.driver.as_mut()));
                self.driver.bind_framebuffer(gl::DRAW_FRAMEBUFFER_EXT, backbuffer);
            }
            if self.state.bound_read_framebuffer == Some(key) {
                self.state.bound_read_framebuffer = None;
                res.framebuffers.release(key, res.textures, res.renderbuffers, Some(self.driver.as_mut()));
                self.driver.bind_framebuffer(gl::READ_FRAMEBUFFER_EXT, backbuffer);
            }
            res.framebuffers
                .remove_framebuffer(id, res.textures, res.renderbuffers, Some(self.driver.as_mut()));
            res.id_allocator(IdNamespace::Framebuffers).free_id(id);
        }
        done()
    }

    pub(super) fn bind_framebuffer(&mut self, res: &mut GroupResources<'_>, c: cmd::BindFramebuffer) -> CommandResult {
        const FUNC: &str = "glBindFramebuffer";
        if !res.features.validators.frame_buffer_target.is_valid(c.target) {
            return self.invalid_enum(FUNC, c.target, "target");
        }
        let key = if c.framebuffer == 0 {
            None
        } else {
            match res.framebuffers.get_framebuffer(c.framebuffer) {
                Some(key) => Some(key),
                None if res.bind_generates_resource => {
                    let service = self.driver.gen_framebuffer();
                    res.id_allocator(IdNamespace::Framebuffers).mark_as_used(c.framebuffer);
                    Some(res.framebuffers.create_framebuffer(c.framebuffer, service))
                }
                None => return self.set_error(gl::INVALID_OPERATION, FUNC, "id not generated by glGenFramebuffers"),
            }
        };
        if let Some(key) = key {
            res.framebuffers.mark_as_bound(key);
        }
        let service = self.framebuffer_service_id(res, key);
        self.driver.bind_framebuffer(c.target, service);

        let slots = match c.target {
            gl::READ_FRAMEBUFFER_EXT => vec![true],
            gl::DRAW_FRAMEBUFFER_EXT => vec![false],
            _ => vec![false, true],
        };
        for read in slots {
            if let Some(key) = key {
                res.framebuffers.add_ref(key);
            }
            let slot = if read { &mut self.state.bound_read_framebuffer } else { &mut self.state.bound_draw_framebuffer };
            if let Some(old) = std::mem::replace(slot, key) {
                res.framebuffers.release(old, res.textures, res.renderbuffers, Some(self.driver.as_mut()));
            }
        }

        if res.features.workarounds.contains(Workarounds::RESTORE_SCISSOR_ON_FBO_CHANGE) {
            let [x, y, width, height] = self.state.scissor;
            self.driver.scissor(x, y, width, height);
        }
        done()
    }

    pub(super) fn framebuffer_texture_2d(
        &mut self,
        res: &mut GroupResources<'_>,
        c: cmd::FramebufferTexture2D,
    ) -> CommandResult {
        const FUNC: &str = "glFramebufferTexture2D";
        let validators = &res.features.validators;
        if !validators.frame_buffer_target.is_valid(c.target) {
            return self.invalid_enum(FUNC, c.target, "target");
        }
        if !validators.attachment.is_valid(c.attachment) {
            return self.invalid_enum(FUNC, c.attachment, "attachment");
        }
        if !validators.texture_target.is_valid(c.textarget) {
            return self.invalid_enum(FUNC, c.textarget, "textarget");
        }
        if c.level != 0 {
            return self.set_error(gl::INVALID_VALUE, FUNC, "level != 0");
        }
        let Some(framebuffer) = self.bound_framebuffer(c.target) else {
            return self.set_error(gl::INVALID_OPERATION, FUNC, "no framebuffer bound");
        };
        let texture = if c.texture == 0 {
            None
        } else {
            let Some(key) = res.textures.get_texture(c.texture) else {
                return self.set_error(gl::INVALID_OPERATION, FUNC, "unknown texture");
            };
            Some(key)
        };
        let service = Self::texture_service_id(res, texture);

        self.errors.copy_real_gl_errors(self.driver.as_mut());
        self.driver
            .framebuffer_texture_2d(c.target, c.attachment, c.textarget, service, c.level);
        if self.errors.peek_gl_error(self.driver.as_mut()) != gl::NO_ERROR {
            return done();
        }
        let attachment = texture.map(|texture| Attachment::Texture { texture, target: c.textarget, level: c.level });
        for point in attachment_points(c.attachment) {
            res.framebuffers.attach(
                framebuffer,
                point,
                attachment,
                res.textures,
                res.renderbuffers,
                Some(self.driver.as_mut()),
            );
        }
        done()
    }

    pub(super) fn framebuffer_renderbuffer(
        &mut self,
        res: &mut GroupResources<'_>,
        c: cmd::FramebufferRenderbuffer,
    ) -> CommandResult {
        const FUNC: &str = "glFramebufferRenderbuffer";
        let validators = &res.features.validators;
        if !validators.frame_buffer_target.is_valid(c.target) {
            return self.invalid_enum(FUNC, c.target, "target");
        }
        if !validators.attachment.is_valid(c.attachment) {
            return self.invalid_enum(FUNC, c.attachment, "attachment");
        }
        if !validators.render_buffer_target.is_valid(c.renderbuffer_target) {
            return self.invalid_enum(FUNC, c.renderbuffer_target, "renderbuffer_target");
        }
        let Some(framebuffer) = self.bound_framebuffer(c.target) else {
            return self.set_error(gl::INVALID_OPERATION, FUNC, "no framebuffer bound");
        };
        let renderbuffer = if c.renderbuffer == 0 {
            None
        } else {
            let Some(key) = res.renderbuffers.get_renderbuffer(c.renderbuffer) else {
                return self.set_error(gl::INVALID_OPERATION, FUNC, "unknown renderbuffer");
            };
            Some(key)
        };
        let service = renderbuffer
            .and_then(|key| res.renderbuffers.renderbuffer(key))
            .map_or(0, |rb| rb.service_id());

        self.errors.copy_real_gl_errors(self.driver.as_mut());
        for point in attachment_points(c.attachment) {
            self.driver.framebuffer_renderbuffer(c.target, point, service);
        }
        if self.errors.peek_gl_error(self.driver.as_mut()) != gl::NO_ERROR {
            return done();
        }
        for point in attachment_points(c.attachment) {
            res.framebuffers.attach(
                framebuffer,
                point,
                renderbuffer.map(Attachment::Renderbuffer),
                res.textures,
                res.renderbuffers,
                Some(self.driver.as_mut()),
            );
        }
        done()
    }

    pub(super) fn check_framebuffer_status(
        &mut self,
        res: &mut GroupResources<'_>,
        c: cmd::CheckFramebufferStatus,
    ) -> CommandResult {
        let result = self.shm(c.result_shm_id, c.result_shm_offset, 4)?;
        if !res.features.validators.frame_buffer_target.is_valid(c.target) {
            return self.invalid_enum("glCheckFramebufferStatus", c.target, "target");
        }
        let status = match self.bound_framebuffer(c.target) {
            None => gl::FRAMEBUFFER_COMPLETE,
            Some(key) if res.framebuffers.is_complete(key) => gl::FRAMEBUFFER_COMPLETE,
            Some(key) => {
                let mut status = res.framebuffers.is_possibly_complete(key, res.textures, res.renderbuffers);
                if status == gl::FRAMEBUFFER_COMPLETE {
                    status = self.driver.check_framebuffer_status(c.target);
                    if status == gl::FRAMEBUFFER_COMPLETE {
                        res.framebuffers.mark_as_complete(key);
                    }
                }
                status
            }
        };
        result.write_u32(0, status)?;
        done()
    }

    pub(super) fn is_framebuffer(&mut self, res: &mut GroupResources<'_>, c: cmd::IsFramebuffer) -> CommandResult {
        let value = res.framebuffers.is_framebuffer(c.framebuffer) as u32;
        self.write_result_u32(c.result_shm_id, c.result_shm_offset, value)
    }

    // ===== RENDERBUFFERS =====

    pub(super) fn gen_renderbuffers(
        &mut self,
        res: &mut GroupResources<'_>,
        c: cmd::GenRenderbuffersImmediate,
        data: &[u32],
    ) -> CommandResult {
        let Some(ids) = immediate_ids(data, c.n)? else {
            return self.set_error(gl::INVALID_VALUE, "glGenRenderbuffers", "n < 0");
        };
        if !claim_ids(res, IdNamespace::Renderbuffers, ids, |res, id| {
            res.renderbuffers.get_renderbuffer(id).is_some()
        }) {
            return Err(CommandError::InvalidArguments);
        }
        for &id in ids {
            let service = self.driver.gen_renderbuffer();
            res.renderbuffers.create_renderbuffer(id, service);
        }
        done()
    }

    pub(super) fn delete_renderbuffers(
        &mut self,
        res: &mut GroupResources<'_>,
        c: cmd::DeleteRenderbuffersImmediate,
        data: &[u32],
    ) -> CommandResult {
        let Some(ids) = immediate_ids(data, c.n)? else {
            return self.set_error(gl::INVALID_VALUE, "glDeleteRenderbuffers", "n < 0");
        };
        for &id in ids {
            let Some(key) = res.renderbuffers.get_renderbuffer(id) else {
                continue;
            };
            if self.state.bound_renderbuffer == Some(key) {
                self.state.bound_renderbuffer = None;
                res.renderbuffers.release(key, Some(self.driver.as_mut()));
                self.driver.bind_renderbuffer(gl::RENDERBUFFER, 0);
            }
            self.detach_renderbuffer_from_bound(res, key);
            res.renderbuffers.remove_renderbuffer(id, Some(self.driver.as_mut()));
            res.id_allocator(IdNamespace::Renderbuffers).free_id(id);
        }
        done()
    }

    fn detach_renderbuffer_from_bound(&mut self, res: &mut GroupResources<'_>, key: RenderbufferKey) {
        let read = self.state.bound_read_framebuffer;
        let draw = self.state.bound_draw_framebuffer;
        let bound = if read == draw {
            vec![(draw, gl::FRAMEBUFFER)]
        } else {
            vec![(read, gl::READ_FRAMEBUFFER_EXT), (draw, gl::DRAW_FRAMEBUFFER_EXT)]
        };
        for (framebuffer, target) in bound {
            let Some(framebuffer) = framebuffer else {
                continue;
            };
            let points = res.framebuffers.unbind_renderbuffer(
                framebuffer,
                key,
                res.textures,
                res.renderbuffers,
                Some(self.driver.as_mut()),
            );
            for point in points {
                self.driver.framebuffer_renderbuffer(target, point, 0);
            }
        }
    }

    pub(super) fn bind_renderbuffer(&mut self, res: &mut GroupResources<'_>, c: cmd::BindRenderbuffer) -> CommandResult {
        const FUNC: &str = "glBindRenderbuffer";
        if !res.features.validators.render_buffer_target.is_valid(c.target) {
            return self.invalid_enum(FUNC, c.target, "target");
        }
        let key = if c.renderbuffer == 0 {
            None
        } else {
            match res.renderbuffers.get_renderbuffer(c.renderbuffer) {
                Some(key) => Some(key),
                None if res.bind_generates_resource => {
                    let service = self.driver.gen_renderbuffer();
                    res.id_allocator(IdNamespace::Renderbuffers).mark_as_used(c.renderbuffer);
                    Some(res.renderbuffers.create_renderbuffer(c.renderbuffer, service))
                }
                None => return self.set_error(gl::INVALID_OPERATION, FUNC, "id not generated by glGenRenderbuffers"),
            }
        };
        let mut service = 0;
        if let Some(key) = key {
            res.renderbuffers.mark_as_bound(key);
            res.renderbuffers.add_ref(key);
            service = res.renderbuffers.renderbuffer(key).map_or(0, |rb| rb.service_id());
        }
        self.driver.bind_renderbuffer(c.target, service);
        if let Some(old) = std::mem::replace(&mut self.state.bound_renderbuffer, key) {
            res.renderbuffers.release(old, Some(self.driver.as_mut()));
        }
        done()
    }

    #[allow(clippy::too_many_arguments)]
    fn define_renderbuffer_storage(
        &mut self,
        res: &mut GroupResources<'_>,
        function: &str,
        target: u32,
        samples: i32,
        internal_format: u32,
        width: i32,
        height: i32,
    ) -> CommandResult {
        let validators = &res.features.validators;
        if !validators.render_buffer_target.is_valid(target) {
            return self.invalid_enum(function, target, "target");
        }
        if !validators.render_buffer_format.is_valid(internal_format) {
            return self.invalid_enum(function, internal_format, "internal_format");
        }
        let max_size = res.renderbuffers.max_renderbuffer_size();
        if width < 0 || height < 0 || width > max_size || height > max_size {
            return self.set_error(gl::INVALID_VALUE, function, "dimensions out of range");
        }
        if samples < 0 || samples > res.renderbuffers.max_samples() {
            return self.set_error(gl::INVALID_VALUE, function, "samples too large");
        }
        let Some(key) = self.state.bound_renderbuffer else {
            return self.set_error(gl::INVALID_OPERATION, function, "no renderbuffer bound");
        };
        let format = driver_renderbuffer_format(internal_format, res.features.gl_version.is_desktop());

        self.errors.copy_real_gl_errors(self.driver.as_mut());
        self.driver.renderbuffer_storage(target, samples, format, width, height);
        if self.errors.peek_gl_error(self.driver.as_mut()) == gl::NO_ERROR {
            res.renderbuffers.set_info(key, samples, internal_format, width, height);
        }
        done()
    }

    pub(super) fn renderbuffer_storage(
        &mut self,
        res: &mut GroupResources<'_>,
        c: cmd::RenderbufferStorage,
    ) -> CommandResult {
        self.define_renderbuffer_storage(
            res,
            "glRenderbufferStorage",
            c.target,
            0,
            c.internal_format,
            c.width,
            c.height,
        )
    }

    pub(super) fn renderbuffer_storage_multisample(
        &mut self,
        res: &mut GroupResources<'_>,
        c: cmd::RenderbufferStorageMultisampleEXT,
    ) -> CommandResult {
        const FUNC: &str = "glRenderbufferStorageMultisampleEXT";
        if !res.features.has(FeatureFlags::CHROMIUM_FRAMEBUFFER_MULTISAMPLE) {
            return self.set_error(gl::INVALID_OPERATION, FUNC, "multisampling not supported");
        }
        self.define_renderbuffer_storage(res, FUNC, c.target, c.samples, c.internal_format, c.width, c.height)
    }

    pub(super) fn is_renderbuffer(&mut self, res: &mut GroupResources<'_>, c: cmd::IsRenderbuffer) -> CommandResult {
        let value = res.renderbuffers.is_renderbuffer(c.renderbuffer) as u32;
        self.write_result_u32(c.result_shm_id, c.result_shm_offset, value)
    }

    // ===== CLEAR AND READBACK =====

    pub(super) fn clear(&mut self, res: &mut GroupResources<'_>, c: cmd::Clear) -> CommandResult {
        const FUNC: &str = "glClear";
        let all = gl::COLOR_BUFFER_BIT | gl::DEPTH_BUFFER_BIT | gl::STENCIL_BUFFER_BIT;
        if c.mask & !all != 0 {
            return self.set_error(gl::INVALID_VALUE, FUNC, "invalid clear mask");
        }
        if self.check_framebuffer_valid(res, false, FUNC) {
            self.driver.clear(c.mask);
        }
        done()
    }

    pub(super) fn read_pixels(&mut self, res: &mut GroupResources<'_>, c: cmd::ReadPixels) -> CommandResult {
        const FUNC: &str = "glReadPixels";
        if c.width < 0 || c.height < 0 {
            return self.set_error(gl::INVALID_VALUE, FUNC, "dimensions < 0");
        }
        let validators = &res.features.validators;
        if !validators.read_pixel_format.is_valid(c.format) {
            return self.invalid_enum(FUNC, c.format, "format");
        }
        if !validators.read_pixel_type.is_valid(c.ty) {
            return self.invalid_enum(FUNC, c.ty, "type");
        }
        let alignment = self.state.pack_alignment as u32;
        let size = gl::compute_image_size(c.width as u32, c.height as u32, c.format, c.ty, alignment)
            .ok_or(CommandError::OutOfBounds)?;
        let destination = self.shm(c.pixels_shm_id, c.pixels_shm_offset, size)?;
        let result = if c.result_shm_id != 0 || c.result_shm_offset != 0 {
            Some(self.shm(c.result_shm_id, c.result_shm_offset, READ_PIXELS_RESULT_SIZE)?)
        } else {
            None
        };
        if !self.check_framebuffer_valid(res, true, FUNC) {
            return done();
        }

        let (source_width, source_height, source_format) = self.read_buffer_info(res);
        let (x, width) = clip(c.x, c.width, source_width);
        let (y, height) = clip(c.y, c.height, source_height);
        let mut pixels = vec![0u8; size as usize];
        let bytes_per_pixel = gl::bytes_per_pixel(c.format, c.ty).ok_or(CommandError::InvalidArguments)?;
        let row_size = gl::padded_row_size(c.width as u32 * bytes_per_pixel, alignment)
            .ok_or(CommandError::OutOfBounds)? as usize;

        self.errors.copy_real_gl_errors(self.driver.as_mut());
        if x == c.x && y == c.y && width == c.width && height == c.height {
            self.driver
                .read_pixels(c.x, c.y, c.width, c.height, c.format, c.ty, &mut pixels);
        } else if width > 0 && height > 0 {
            // Only the part inside the read buffer is read; the rest stays zero
            let clipped_size = gl::compute_image_size(width as u32, height as u32, c.format, c.ty, alignment)
                .ok_or(CommandError::OutOfBounds)?;
            let mut clipped = vec![0u8; clipped_size as usize];
            self.driver.read_pixels(x, y, width, height, c.format, c.ty, &mut clipped);
            let clipped_row = gl::padded_row_size(width as u32 * bytes_per_pixel, alignment)
                .ok_or(CommandError::OutOfBounds)? as usize;
            let span = width as usize * bytes_per_pixel as usize;
            let skip = (x - c.x) as usize * bytes_per_pixel as usize;
            for row in 0..height as usize {
                let dst = (row + (y - c.y) as usize) * row_size + skip;
                let src = row * clipped_row;
                if let (Some(dst), Some(src)) = (pixels.get_mut(dst..dst + span), clipped.get(src..src + span)) {
                    dst.copy_from_slice(src);
                }
            }
        }
        if self.errors.peek_gl_error(self.driver.as_mut()) != gl::NO_ERROR {
            return done();
        }

        let opaque_source = !has_alpha(source_format);
        if opaque_source
            && c.format == gl::RGBA
            && c.ty == gl::UNSIGNED_BYTE
            && res.features.workarounds.contains(Workarounds::CLEAR_ALPHA_IN_READPIXELS)
        {
            for row in pixels.chunks_mut(row_size) {
                for pixel in row.chunks_exact_mut(4).take(c.width as usize) {
                    pixel[3] = 0xFF;
                }
            }
        }

        match result {
            Some(result) if c.async_ != 0 => {
                let fence = self.driver.fence_sync();
                self.pending_reads.push_back(PendingReadPixels {
                    fence,
                    pixels,
                    destination,
                    result,
                    width: c.width as u32,
                    height: c.height as u32,
                });
            }
            Some(result) => {
                destination.write(0, &pixels)?;
                result.write_u32(4, c.width as u32)?;
                result.write_u32(8, c.height as u32)?;
                result.store_u32(0, 1, Ordering::Release)?;
            }
            None => destination.write(0, &pixels)?,
        }
        done()
    }
}

#[cfg(test)]
#[path = "framebuffers_tests.rs"]
mod tests;
