/// Texture commands
///
/// Level metadata lives in the group's texture manager; the decoder only
/// tracks which texture each unit has bound. Storage defined without data is
/// recorded uncleared and zeroed before anything can read it.

use super::commands as cmd;
use super::scoped_binders::ScopedTextureBinder;
use super::{claim_ids, clip, done, has_alpha, immediate_ids, CommandError, CommandResult, Decoder};
use crate::context_group::{GroupResources, IdNamespace};
use crate::feature::Workarounds;
use crate::gl;
use crate::query::{StagedTransfer, TransferParams};
use crate::resource::texture_manager::mip_count;
use crate::resource::{MailboxName, TextureKey, MAILBOX_NAME_LENGTH};
use std::sync::Arc;

/// Faces a bind target defines levels for
fn faces_of(target: u32) -> Vec<u32> {
    if target == gl::TEXTURE_CUBE_MAP {
        (0..6).map(|face| gl::TEXTURE_CUBE_MAP_POSITIVE_X + face).collect()
    } else {
        vec![target]
    }
}

/// Bytes a compressed level of `width` x `height` needs
fn compressed_size(internal_format: u32, width: i32, height: i32) -> Option<u32> {
    let block_bytes = match internal_format {
        gl::COMPRESSED_RGB_S3TC_DXT1_EXT | gl::COMPRESSED_RGBA_S3TC_DXT1_EXT | gl::ETC1_RGB8_OES => 8,
        gl::COMPRESSED_RGBA_S3TC_DXT3_EXT | gl::COMPRESSED_RGBA_S3TC_DXT5_EXT => 16,
        _ => return None,
    };
    let blocks_wide = u32::try_from(width).ok()?.div_ceil(4);
    let blocks_high = u32::try_from(height).ok()?.div_ceil(4);
    blocks_wide.checked_mul(blocks_high)?.checked_mul(block_bytes)
}

fn mailbox_name(data: &[u32]) -> std::result::Result<MailboxName, CommandError> {
    let words = data.get(..cmd::MAILBOX_WORDS).ok_or(CommandError::OutOfBounds)?;
    let mut name = [0u8; MAILBOX_NAME_LENGTH];
    name.copy_from_slice(bytemuck::cast_slice(words));
    Ok(name)
}

impl Decoder {
    pub(super) fn texture_service_id(res: &GroupResources<'_>, key: Option<TextureKey>) -> u32 {
        key.and_then(|key| res.textures.texture(key)).map_or(0, |t| t.service_id())
    }

    /// Texture a level command on `target` applies to; raises
    /// INVALID_OPERATION when there is none
    fn texture_for(&mut self, res: &GroupResources<'_>, target: u32, function: &str) -> Option<TextureKey> {
        let key = self.bound_texture(res, target);
        if key.is_none() {
            self.errors.set_gl_error(gl::INVALID_OPERATION, function, "unknown texture for target");
        }
        key
    }

    pub(super) fn gen_textures(&mut self, res: &mut GroupResources<'_>, c: cmd::GenTexturesImmediate, data: &[u32]) -> CommandResult {
        let Some(ids) = immediate_ids(data, c.n)? else {
            return self.set_error(gl::INVALID_VALUE, "glGenTextures", "n < 0");
        };
        if !claim_ids(res, IdNamespace::Textures, ids, |res, id| res.textures.get_texture(id).is_some()) {
            return Err(CommandError::InvalidArguments);
        }
        for &id in ids {
            let service = self.driver.gen_texture();
            res.textures.create_texture(id, service);
        }
        done()
    }

    pub(super) fn delete_textures(
        &mut self,
        res: &mut GroupResources<'_>,
        c: cmd::DeleteTexturesImmediate,
        data: &[u32],
    ) -> CommandResult {
        let Some(ids) = immediate_ids(data, c.n)? else {
            return self.set_error(gl::INVALID_VALUE, "glDeleteTextures", "n < 0");
        };
        for &id in ids {
            let Some(key) = res.textures.get_texture(id) else {
                continue;
            };
            if let Some(transfers) = self.transfers.as_mut() {
                transfers.cancel_texture(key);
            }
            res.textures.set_async_transfer_pending(key, false);
            self.unbind_texture_everywhere(res, key);
            res.textures.remove_texture(id, Some(self.driver.as_mut()));
            res.id_allocator(IdNamespace::Textures).free_id(id);
        }
        done()
    }

    /// Drop every unit binding and bound-framebuffer attachment of `key`
    fn unbind_texture_everywhere(&mut self, res: &mut GroupResources<'_>, key: TextureKey) {
        let rebinds: Vec<(u32, u32)> = self
            .state
            .texture_units
            .iter()
            .enumerate()
            .flat_map(|(unit, bindings)| {
                bindings
                    .bindings()
                    .filter(|(_, bound)| *bound == key)
                    .map(move |(target, _)| (unit as u32, target))
                    .collect::<Vec<_>>()
            })
            .collect();
        if !rebinds.is_empty() {
            for (unit, target) in &rebinds {
                let default = Self::texture_service_id(res, res.textures.default_texture(*target));
                self.driver.active_texture(gl::TEXTURE0 + unit);
                self.driver.bind_texture(*target, default);
            }
            self.driver.active_texture(gl::TEXTURE0 + self.state.active_texture_unit);
        }
        for _ in 0..self.state.unbind_texture(key) {
            res.textures.release(key, Some(self.driver.as_mut()));
        }

        let read = self.state.bound_read_framebuffer;
        let draw = self.state.bound_draw_framebuffer;
        let bound = if read == draw {
            vec![(read, gl::FRAMEBUFFER)]
        } else {
            vec![(read, gl::READ_FRAMEBUFFER_EXT), (draw, gl::DRAW_FRAMEBUFFER_EXT)]
        };
        for (framebuffer, target) in bound {
            let Some(framebuffer) = framebuffer else {
                continue;
            };
            let points = res.framebuffers.unbind_texture(
                framebuffer,
                key,
                res.textures,
                res.renderbuffers,
                Some(self.driver.as_mut()),
            );
            for point in points {
                self.driver.framebuffer_texture_2d(target, point, gl::TEXTURE_2D, 0, 0);
            }
        }
    }

    pub(super) fn active_texture(&mut self, _res: &mut GroupResources<'_>, c: cmd::ActiveTexture) -> CommandResult {
        let unit = c.texture.wrapping_sub(gl::TEXTURE0);
        if unit as usize >= self.state.texture_units.len() {
            return self.invalid_enum("glActiveTexture", c.texture, "texture");
        }
        self.state.active_texture_unit = unit;
        self.driver.active_texture(c.texture);
        done()
    }

    pub(super) fn bind_texture(&mut self, res: &mut GroupResources<'_>, c: cmd::BindTexture) -> CommandResult {
        const FUNC: &str = "glBindTexture";
        if !res.features.validators.texture_bind_target.is_valid(c.target) {
            return self.invalid_enum(FUNC, c.target, "target");
        }
        let key = if c.texture == 0 {
            None
        } else {
            match res.textures.get_texture(c.texture) {
                Some(key) => Some(key),
                None if res.bind_generates_resource => {
                    let service = self.driver.gen_texture();
                    res.id_allocator(IdNamespace::Textures).mark_as_used(c.texture);
                    Some(res.textures.create_texture(c.texture, service))
                }
                None => return self.set_error(gl::INVALID_OPERATION, FUNC, "id not generated by glGenTextures"),
            }
        };
        if let Some(key) = key {
            let current = res.textures.texture(key).map_or(0, |t| t.target());
            if current != 0 && current != c.target {
                return self.set_error(gl::INVALID_OPERATION, FUNC, "texture bound to more than 1 target");
            }
            res.textures.set_target(key, c.target);
            res.textures.add_ref(key);
        }

        let service = Self::texture_service_id(res, key.or_else(|| res.textures.default_texture(c.target)));
        self.driver.bind_texture(c.target, service);
        if let Some(old) = self.state.set_bound_texture(c.target, key) {
            res.textures.release(old, Some(self.driver.as_mut()));
        }
        done()
    }

    /// Shared argument checks of TexImage2D and AsyncTexImage2DCHROMIUM
    fn check_tex_image_args(&mut self, res: &GroupResources<'_>, function: &str, c: &cmd::TexImage2D) -> bool {
        let validators = &res.features.validators;
        if !validators.texture_target.is_valid(c.target) {
            self.errors.set_gl_error_invalid_enum(function, c.target, "target");
            return false;
        }
        if !validators.texture_internal_format.is_valid(c.internal_format) {
            self.errors.set_gl_error_invalid_enum(function, c.internal_format, "internal_format");
            return false;
        }
        if !validators.texture_format.is_valid(c.format) {
            self.errors.set_gl_error_invalid_enum(function, c.format, "format");
            return false;
        }
        if !validators.pixel_type.is_valid(c.ty) {
            self.errors.set_gl_error_invalid_enum(function, c.ty, "type");
            return false;
        }
        if !validators.texture_format_type.is_valid(c.format, c.ty) {
            self.errors.set_gl_error(gl::INVALID_OPERATION, function, "invalid type for format");
            return false;
        }
        if c.format != c.internal_format {
            self.errors.set_gl_error(gl::INVALID_OPERATION, function, "format != internalformat");
            return false;
        }
        if c.border != 0 {
            self.errors.set_gl_error(gl::INVALID_VALUE, function, "border != 0");
            return false;
        }
        if !res.textures.valid_for_target(c.target, c.level, c.width, c.height, 1) {
            self.errors.set_gl_error(gl::INVALID_VALUE, function, "dimensions out of range");
            return false;
        }
        true
    }

    fn image_size(&self, width: i32, height: i32, format: u32, ty: u32) -> std::result::Result<u32, CommandError> {
        gl::compute_image_size(width as u32, height as u32, format, ty, self.state.unpack_alignment as u32)
            .ok_or(CommandError::OutOfBounds)
    }

    /// Texture whose level may be redefined; raises INVALID_OPERATION for
    /// immutable textures
    fn mutable_texture_for(&mut self, res: &GroupResources<'_>, target: u32, function: &str) -> Option<TextureKey> {
        let key = self.texture_for(res, target, function)?;
        if res.textures.texture(key).is_some_and(|t| t.is_immutable()) {
            self.errors.set_gl_error(gl::INVALID_OPERATION, function, "texture is immutable");
            return None;
        }
        Some(key)
    }

    pub(super) fn tex_image_2d(&mut self, res: &mut GroupResources<'_>, c: cmd::TexImage2D) -> CommandResult {
        const FUNC: &str = "glTexImage2D";
        self.tex_image_failed = true;
        if !self.check_tex_image_args(res, FUNC, &c) {
            return done();
        }
        let size = self.image_size(c.width, c.height, c.format, c.ty)?;
        let pixels = if c.pixels_shm_id != 0 || c.pixels_shm_offset != 0 {
            Some(self.shm_bytes(c.pixels_shm_id, c.pixels_shm_offset, size)?)
        } else {
            None
        };
        let Some(key) = self.mutable_texture_for(res, c.target, FUNC) else {
            return done();
        };
        if res.textures.texture(key).is_some_and(|t| t.async_transfer_pending()) {
            return self.set_error(gl::INVALID_OPERATION, FUNC, "async upload pending for texture");
        }

        self.errors.copy_real_gl_errors(self.driver.as_mut());
        self.driver.tex_image_2d(
            c.target,
            c.level,
            c.internal_format,
            c.width,
            c.height,
            c.format,
            c.ty,
            pixels.as_deref(),
        );
        if self.errors.peek_gl_error(self.driver.as_mut()) == gl::NO_ERROR {
            res.textures.set_level_info(
                key,
                c.target,
                c.level,
                c.internal_format,
                c.width,
                c.height,
                1,
                c.border,
                c.format,
                c.ty,
                pixels.is_some(),
            );
            self.tex_image_failed = false;
        }
        done()
    }

    pub(super) fn tex_sub_image_2d(&mut self, res: &mut GroupResources<'_>, c: cmd::TexSubImage2D) -> CommandResult {
        const FUNC: &str = "glTexSubImage2D";
        // Follow-up of a TexImage2D that already failed
        if c.internal != 0 && self.tex_image_failed {
            return done();
        }
        let validators = &res.features.validators;
        if !validators.texture_target.is_valid(c.target) {
            return self.invalid_enum(FUNC, c.target, "target");
        }
        if !validators.texture_format.is_valid(c.format) {
            return self.invalid_enum(FUNC, c.format, "format");
        }
        if !validators.pixel_type.is_valid(c.ty) {
            return self.invalid_enum(FUNC, c.ty, "type");
        }
        if c.width < 0 || c.height < 0 {
            return self.set_error(gl::INVALID_VALUE, FUNC, "dimensions < 0");
        }
        let size = self.image_size(c.width, c.height, c.format, c.ty)?;
        let pixels = self.shm_bytes(c.pixels_shm_id, c.pixels_shm_offset, size)?;
        let Some(key) = self.texture_for(res, c.target, FUNC) else {
            return done();
        };
        let Some(info) = res.textures.texture(key).and_then(|t| t.level_info(c.target, c.level)).copied() else {
            return self.set_error(gl::INVALID_OPERATION, FUNC, "level does not exist");
        };
        if info.format != c.format || info.ty != c.ty {
            return self.set_error(gl::INVALID_OPERATION, FUNC, "type does not match type of texture");
        }
        if c.xoffset < 0
            || c.yoffset < 0
            || c.xoffset + c.width > info.width
            || c.yoffset + c.height > info.height
        {
            return self.set_error(gl::INVALID_VALUE, FUNC, "bad dimensions");
        }
        if res.textures.texture(key).is_some_and(|t| t.async_transfer_pending()) {
            return self.set_error(gl::INVALID_OPERATION, FUNC, "async upload pending for texture");
        }

        let full = c.xoffset == 0 && c.yoffset == 0 && c.width == info.width && c.height == info.height;
        if !full && !self.clear_texture_level(res, key, c.target, c.level) {
            return self.set_error(gl::OUT_OF_MEMORY, FUNC, "dimensions too big");
        }
        self.driver.tex_sub_image_2d(
            c.target, c.level, c.xoffset, c.yoffset, c.width, c.height, c.format, c.ty, &pixels,
        );
        if full {
            res.textures.set_level_cleared(key, c.target, c.level, true);
        }
        done()
    }

    pub(super) fn compressed_tex_image_2d(
        &mut self,
        res: &mut GroupResources<'_>,
        c: cmd::CompressedTexImage2D,
    ) -> CommandResult {
        const FUNC: &str = "glCompressedTexImage2D";
        let validators = &res.features.validators;
        if !validators.texture_target.is_valid(c.target) {
            return self.invalid_enum(FUNC, c.target, "target");
        }
        if !validators.compressed_texture_format.is_valid(c.internal_format) {
            return self.invalid_enum(FUNC, c.internal_format, "internal_format");
        }
        if c.border != 0 {
            return self.set_error(gl::INVALID_VALUE, FUNC, "border != 0");
        }
        if !res.textures.valid_for_target(c.target, c.level, c.width, c.height, 1) {
            return self.set_error(gl::INVALID_VALUE, FUNC, "dimensions out of range");
        }
        let Ok(image_size) = u32::try_from(c.image_size) else {
            return self.set_error(gl::INVALID_VALUE, FUNC, "imageSize < 0");
        };
        if compressed_size(c.internal_format, c.width, c.height) != Some(image_size) {
            return self.set_error(gl::INVALID_VALUE, FUNC, "size is not correct for dimensions");
        }
        let data = self.shm_bytes(c.data_shm_id, c.data_shm_offset, image_size)?;
        let Some(key) = self.mutable_texture_for(res, c.target, FUNC) else {
            return done();
        };

        self.errors.copy_real_gl_errors(self.driver.as_mut());
        self.driver
            .compressed_tex_image_2d(c.target, c.level, c.internal_format, c.width, c.height, &data);
        if self.errors.peek_gl_error(self.driver.as_mut()) == gl::NO_ERROR {
            res.textures.set_level_info(
                key,
                c.target,
                c.level,
                c.internal_format,
                c.width,
                c.height,
                1,
                c.border,
                0,
                0,
                true,
            );
        }
        done()
    }

    /// Whether the read buffer can be copied into `internal_format`
    fn copy_source_compatible(&mut self, source_format: u32, internal_format: u32, function: &str) -> bool {
        if has_alpha(internal_format) && !has_alpha(source_format) {
            self.errors.set_gl_error(gl::INVALID_OPERATION, function, "incompatible format");
            return false;
        }
        if gl::is_depth_format(internal_format) {
            self.errors.set_gl_error(gl::INVALID_OPERATION, function, "can not copy into depth format");
            return false;
        }
        true
    }

    pub(super) fn copy_tex_image_2d(&mut self, res: &mut GroupResources<'_>, c: cmd::CopyTexImage2D) -> CommandResult {
        const FUNC: &str = "glCopyTexImage2D";
        let validators = &res.features.validators;
        if !validators.texture_target.is_valid(c.target) {
            return self.invalid_enum(FUNC, c.target, "target");
        }
        if !validators.texture_internal_format.is_valid(c.internal_format) {
            return self.invalid_enum(FUNC, c.internal_format, "internal_format");
        }
        if c.border != 0 {
            return self.set_error(gl::INVALID_VALUE, FUNC, "border != 0");
        }
        if !res.textures.valid_for_target(c.target, c.level, c.width, c.height, 1) {
            return self.set_error(gl::INVALID_VALUE, FUNC, "dimensions out of range");
        }
        let Some(key) = self.mutable_texture_for(res, c.target, FUNC) else {
            return done();
        };
        let (source_width, source_height, source_format) = self.read_buffer_info(res);
        if !self.copy_source_compatible(source_format, c.internal_format, FUNC) {
            return done();
        }
        if !self.check_framebuffer_valid(res, true, FUNC) {
            return done();
        }

        let (format, ty) = gl::upload_format_for(c.internal_format);
        let (x, width) = clip(c.x, c.width, source_width);
        let (y, height) = clip(c.y, c.height, source_height);
        self.errors.copy_real_gl_errors(self.driver.as_mut());
        if x == c.x && y == c.y && width == c.width && height == c.height {
            self.driver
                .copy_tex_image_2d(c.target, c.level, c.internal_format, c.x, c.y, c.width, c.height);
        } else {
            // Pixels outside the read buffer read back as zero
            let size = self.image_size(c.width, c.height, format, ty)?;
            let zeros = vec![0u8; size as usize];
            self.driver.tex_image_2d(
                c.target,
                c.level,
                c.internal_format,
                c.width,
                c.height,
                format,
                ty,
                Some(&zeros),
            );
            if width > 0 && height > 0 {
                self.driver
                    .copy_tex_sub_image_2d(c.target, c.level, x - c.x, y - c.y, x, y, width, height);
            }
        }
        if self.errors.peek_gl_error(self.driver.as_mut()) == gl::NO_ERROR {
            res.textures.set_level_info(
                key,
                c.target,
                c.level,
                c.internal_format,
                c.width,
                c.height,
                1,
                c.border,
                format,
                ty,
                true,
            );
        }
        done()
    }

    pub(super) fn copy_tex_sub_image_2d(
        &mut self,
        res: &mut GroupResources<'_>,
        c: cmd::CopyTexSubImage2D,
    ) -> CommandResult {
        const FUNC: &str = "glCopyTexSubImage2D";
        if !res.features.validators.texture_target.is_valid(c.target) {
            return self.invalid_enum(FUNC, c.target, "target");
        }
        if c.width < 0 || c.height < 0 {
            return self.set_error(gl::INVALID_VALUE, FUNC, "dimensions < 0");
        }
        let Some(key) = self.texture_for(res, c.target, FUNC) else {
            return done();
        };
        let Some(info) = res.textures.texture(key).and_then(|t| t.level_info(c.target, c.level)).copied() else {
            return self.set_error(gl::INVALID_OPERATION, FUNC, "level does not exist");
        };
        if c.xoffset < 0
            || c.yoffset < 0
            || c.xoffset + c.width > info.width
            || c.yoffset + c.height > info.height
        {
            return self.set_error(gl::INVALID_VALUE, FUNC, "bad dimensions");
        }
        let (source_width, source_height, source_format) = self.read_buffer_info(res);
        if !self.copy_source_compatible(source_format, info.internal_format, FUNC) {
            return done();
        }
        if !self.check_framebuffer_valid(res, true, FUNC) {
            return done();
        }

        let (x, width) = clip(c.x, c.width, source_width);
        let (y, height) = clip(c.y, c.height, source_height);
        let clipped = x != c.x || y != c.y || width != c.width || height != c.height;
        let full = c.xoffset == 0 && c.yoffset == 0 && c.width == info.width && c.height == info.height;
        if (!full || clipped) && !self.clear_texture_level(res, key, c.target, c.level) {
            return self.set_error(gl::OUT_OF_MEMORY, FUNC, "dimensions too big");
        }
        if width > 0 && height > 0 {
            self.driver.copy_tex_sub_image_2d(
                c.target,
                c.level,
                c.xoffset + (x - c.x),
                c.yoffset + (y - c.y),
                x,
                y,
                width,
                height,
            );
        }
        if full {
            res.textures.set_level_cleared(key, c.target, c.level, true);
        }
        done()
    }

    /// Texture and validated pname for a TexParameter command
    fn tex_parameter_target(&mut self, res: &GroupResources<'_>, target: u32, pname: u32, function: &str) -> Option<TextureKey> {
        let validators = &res.features.validators;
        if !validators.texture_bind_target.is_valid(target) {
            self.errors.set_gl_error_invalid_enum(function, target, "target");
            return None;
        }
        if !validators.texture_parameter.is_valid(pname) {
            self.errors.set_gl_error_invalid_enum(function, pname, "pname");
            return None;
        }
        self.texture_for(res, target, function)
    }

    pub(super) fn tex_parameter_i(&mut self, res: &mut GroupResources<'_>, c: cmd::TexParameteri) -> CommandResult {
        const FUNC: &str = "glTexParameteri";
        let Some(key) = self.tex_parameter_target(res, c.target, c.pname, FUNC) else {
            return done();
        };
        if let Err(error) = res.textures.set_parameter(key, c.pname, c.param) {
            return self.set_error(error, FUNC, "param");
        }
        self.driver.tex_parameter_i(c.target, c.pname, c.param);
        done()
    }

    pub(super) fn tex_parameter_f(&mut self, res: &mut GroupResources<'_>, c: cmd::TexParameterf) -> CommandResult {
        const FUNC: &str = "glTexParameterf";
        let Some(key) = self.tex_parameter_target(res, c.target, c.pname, FUNC) else {
            return done();
        };
        if let Err(error) = res.textures.set_parameter(key, c.pname, c.param as i32) {
            return self.set_error(error, FUNC, "param");
        }
        self.driver.tex_parameter_f(c.target, c.pname, c.param);
        done()
    }

    pub(super) fn generate_mipmap(&mut self, res: &mut GroupResources<'_>, c: cmd::GenerateMipmap) -> CommandResult {
        const FUNC: &str = "glGenerateMipmap";
        if !res.features.validators.texture_bind_target.is_valid(c.target) {
            return self.invalid_enum(FUNC, c.target, "target");
        }
        let Some(key) = self.texture_for(res, c.target, FUNC) else {
            return done();
        };
        let npot_ok = res.textures.npot_ok();
        let Some(min_filter) = res
            .textures
            .texture(key)
            .filter(|t| t.can_generate_mipmaps(npot_ok))
            .map(|t| t.min_filter())
        else {
            return self.set_error(gl::INVALID_OPERATION, FUNC, "Can not generate mips");
        };
        for face in faces_of(c.target) {
            if !self.clear_texture_level(res, key, face, 0) {
                return self.set_error(gl::OUT_OF_MEMORY, FUNC, "dimensions too big");
            }
        }

        let set_filter = res
            .features
            .workarounds
            .contains(Workarounds::SET_TEXTURE_FILTER_BEFORE_GENERATING_MIPMAP);
        self.errors.copy_real_gl_errors(self.driver.as_mut());
        if set_filter {
            self.driver
                .tex_parameter_i(c.target, gl::TEXTURE_MIN_FILTER, gl::LINEAR_MIPMAP_NEAREST as i32);
        }
        self.driver.generate_mipmap(c.target);
        if set_filter {
            self.driver.tex_parameter_i(c.target, gl::TEXTURE_MIN_FILTER, min_filter as i32);
        }
        if self.errors.peek_gl_error(self.driver.as_mut()) == gl::NO_ERROR {
            res.textures.mark_mipmaps_generated(key);
        }
        done()
    }

    pub(super) fn tex_storage_2d(&mut self, res: &mut GroupResources<'_>, c: cmd::TexStorage2DEXT) -> CommandResult {
        const FUNC: &str = "glTexStorage2DEXT";
        let validators = &res.features.validators;
        if !validators.texture_bind_target.is_valid(c.target) {
            return self.invalid_enum(FUNC, c.target, "target");
        }
        if !validators.texture_internal_format_storage.is_valid(c.internal_format) {
            return self.invalid_enum(FUNC, c.internal_format, "internal_format");
        }
        if c.levels < 1 || c.width < 1 || c.height < 1 {
            return self.set_error(gl::INVALID_VALUE, FUNC, "dimensions < 1");
        }
        if !res.textures.valid_for_target(c.target, 0, c.width, c.height, 1)
            || c.levels > mip_count(c.width, c.height, 1)
        {
            return self.set_error(gl::INVALID_VALUE, FUNC, "dimensions out of range");
        }
        let Some(key) = self.mutable_texture_for(res, c.target, FUNC) else {
            return done();
        };

        self.errors.copy_real_gl_errors(self.driver.as_mut());
        self.driver
            .tex_storage_2d(c.target, c.levels, c.internal_format, c.width, c.height);
        if self.errors.peek_gl_error(self.driver.as_mut()) != gl::NO_ERROR {
            return done();
        }
        let (format, ty) = gl::upload_format_for(c.internal_format);
        for face in faces_of(c.target) {
            for level in 0..c.levels {
                res.textures.set_level_info(
                    key,
                    face,
                    level,
                    c.internal_format,
                    (c.width >> level).max(1),
                    (c.height >> level).max(1),
                    1,
                    0,
                    format,
                    ty,
                    false,
                );
            }
        }
        res.textures.set_immutable(key);
        done()
    }

    pub(super) fn is_texture(&mut self, res: &mut GroupResources<'_>, c: cmd::IsTexture) -> CommandResult {
        self.write_result_u32(c.result_shm_id, c.result_shm_offset, res.textures.is_texture(c.texture) as u32)
    }

    // ===== ASYNC UPLOADS =====

    pub(super) fn async_tex_image_2d(
        &mut self,
        res: &mut GroupResources<'_>,
        c: cmd::AsyncTexImage2DCHROMIUM,
    ) -> CommandResult {
        const FUNC: &str = "glAsyncTexImage2DCHROMIUM";
        let args = cmd::TexImage2D {
            target: c.target,
            level: c.level,
            internal_format: c.internal_format,
            width: c.width,
            height: c.height,
            border: c.border,
            format: c.format,
            ty: c.ty,
            pixels_shm_id: c.pixels_shm_id,
            pixels_shm_offset: c.pixels_shm_offset,
        };
        if !self.check_tex_image_args(res, FUNC, &args) {
            return done();
        }
        let size = self.image_size(c.width, c.height, c.format, c.ty)?;
        let source = if c.pixels_shm_id != 0 || c.pixels_shm_offset != 0 {
            Some(self.shm(c.pixels_shm_id, c.pixels_shm_offset, size)?)
        } else {
            None
        };
        let Some(key) = self.mutable_texture_for(res, c.target, FUNC) else {
            return done();
        };
        if res.textures.texture(key).is_some_and(|t| t.async_transfer_pending()) {
            return self.set_error(gl::INVALID_OPERATION, FUNC, "async upload pending for texture");
        }

        // Storage is defined now; the staged pixels land later
        self.errors.copy_real_gl_errors(self.driver.as_mut());
        self.driver
            .tex_image_2d(c.target, c.level, c.internal_format, c.width, c.height, c.format, c.ty, None);
        if self.errors.peek_gl_error(self.driver.as_mut()) != gl::NO_ERROR {
            return done();
        }
        res.textures.set_level_info(
            key,
            c.target,
            c.level,
            c.internal_format,
            c.width,
            c.height,
            1,
            c.border,
            c.format,
            c.ty,
            true,
        );
        let Some(source) = source else {
            return done();
        };
        let params = TransferParams {
            texture: key,
            target: c.target,
            level: c.level,
            internal_format: c.internal_format,
            width: c.width,
            height: c.height,
            format: c.format,
            ty: c.ty,
        };
        let queued = self
            .transfers
            .as_mut()
            .is_some_and(|transfers| transfers.async_tex_image_2d(params, source));
        if !queued {
            crate::gpu_warn!("gpu::Decoder", "Async upload worker unavailable; level left cleared");
            return done();
        }
        res.textures.set_async_transfer_pending(key, true);
        done()
    }

    pub(super) fn wait_async_tex_image_2d(
        &mut self,
        res: &mut GroupResources<'_>,
        c: cmd::WaitAsyncTexImage2DCHROMIUM,
    ) -> CommandResult {
        const FUNC: &str = "glWaitAsyncTexImage2DCHROMIUM";
        if !res.features.validators.texture_target.is_valid(c.target) {
            return self.invalid_enum(FUNC, c.target, "target");
        }
        let Some(key) = self.texture_for(res, c.target, FUNC) else {
            return done();
        };
        let staged = self
            .transfers
            .as_mut()
            .map(|transfers| transfers.wait_for_texture(key))
            .unwrap_or_default();
        self.upload_transfers(res, staged);
        done()
    }

    /// Upload staged pixels into their textures
    pub(super) fn upload_transfers(&mut self, res: &mut GroupResources<'_>, staged: Vec<StagedTransfer>) {
        for transfer in staged {
            let params = transfer.params;
            let Some(service) = res.textures.texture(params.texture).map(|t| t.service_id()) else {
                continue;
            };
            let bind_target = gl::bind_target_for(params.target);
            let previous = self
                .unit0_bindings(res)
                .iter()
                .find(|(target, _)| *target == bind_target)
                .map_or(0, |(_, id)| *id);
            {
                let mut binder = ScopedTextureBinder::new(
                    self.driver.as_mut(),
                    bind_target,
                    service,
                    previous,
                    self.state.active_texture_unit,
                );
                binder.driver().tex_sub_image_2d(
                    params.target,
                    params.level,
                    0,
                    0,
                    params.width,
                    params.height,
                    params.format,
                    params.ty,
                    &transfer.pixels,
                );
            }
            let still_pending = self
                .transfers
                .as_ref()
                .is_some_and(|transfers| transfers.is_pending(params.texture));
            if !still_pending {
                res.textures.set_async_transfer_pending(params.texture, false);
            }
        }
    }

    // ===== MAILBOXES =====

    pub(super) fn produce_texture(
        &mut self,
        res: &mut GroupResources<'_>,
        c: cmd::ProduceTextureCHROMIUMImmediate,
        data: &[u32],
    ) -> CommandResult {
        const FUNC: &str = "glProduceTextureCHROMIUM";
        let name = mailbox_name(data)?;
        if !res.features.validators.texture_bind_target.is_valid(c.target) {
            return self.invalid_enum(FUNC, c.target, "target");
        }
        let Some(texture) = self.state.bound_texture(c.target).and_then(|key| res.textures.texture(key)) else {
            return self.set_error(gl::INVALID_OPERATION, FUNC, "unknown texture for target");
        };
        if let Err(err) = res.mailboxes.produce_texture(&name, texture) {
            crate::gpu_debug!("gpu::Decoder", "{}: {}", FUNC, err);
            return self.set_error(gl::INVALID_OPERATION, FUNC, "invalid texture");
        }
        done()
    }

    pub(super) fn consume_texture(
        &mut self,
        res: &mut GroupResources<'_>,
        c: cmd::ConsumeTextureCHROMIUMImmediate,
        data: &[u32],
    ) -> CommandResult {
        const FUNC: &str = "glConsumeTextureCHROMIUM";
        let name = mailbox_name(data)?;
        if !res.features.validators.texture_bind_target.is_valid(c.target) {
            return self.invalid_enum(FUNC, c.target, "target");
        }
        let Some(key) = self.state.bound_texture(c.target) else {
            return self.set_error(gl::INVALID_OPERATION, FUNC, "unknown texture for target");
        };
        let (service, definition) = match res.mailboxes.consume_texture(c.target, &name) {
            Ok(found) => found,
            Err(err) => {
                crate::gpu_debug!("gpu::Decoder", "{}: {}", FUNC, err);
                return self.set_error(gl::INVALID_OPERATION, FUNC, "invalid mailbox name");
            }
        };

        match res.textures.find_by_service(&service) {
            Some(existing) if existing == key => {}
            Some(existing) => {
                // Produced in this group: the handle now names that texture
                let Some(client_id) = res.textures.client_id(key) else {
                    return self.set_error(gl::INVALID_OPERATION, FUNC, "unknown texture for target");
                };
                res.textures.remove_texture(client_id, Some(self.driver.as_mut()));
                res.textures.alias_texture(client_id, existing);
                res.textures.add_ref(existing);
                if let Some(old) = self.state.set_bound_texture(c.target, Some(existing)) {
                    res.textures.release(old, Some(self.driver.as_mut()));
                }
            }
            None => {
                res.textures
                    .replace_definition(key, Arc::clone(&service), &definition, Some(self.driver.as_mut()));
            }
        }
        self.driver.bind_texture(c.target, service.service_id());
        done()
    }
}

#[cfg(test)]
#[path = "textures_tests.rs"]
mod tests;
