/// SoftDriver - GraphicsDriver on host memory
///
/// One context of a `SoftDevice`. Objects live in the device; bindings,
/// fixed-function state and the error queue are per context. Clears, pixel
/// transfers, copies and blits touch real texels. Draw calls are validated
/// (linked program, vertex fetch inside the bound buffers) and counted, but
/// not rasterized.
///
/// Queries ended and fences inserted become available on the next `flush`
/// or `finish` of the context that issued them.

use crate::soft_device::{
    lock, Attachment, SoftDevice, SoftQuery, SoftRenderbuffer, SoftTexture, SoftVertexArray, VertexAttrib,
};
use crate::soft_image::SoftImage;
use crate::soft_program::{SoftProgram, SoftShader};
use crate::soft_surface::Backbuffer;
use gpu_command_service::gpu::driver::{ActiveVariable, GraphicsDriver};
use gpu_command_service::gpu::gl;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use std::sync::Arc;

/// GL error and a short description, raised after the store is released
type Check = Result<(), (u32, &'static str)>;

/// Fixed-function state of one context
#[derive(Debug, Clone)]
pub struct FixedFunctionState {
    pub enabled: FxHashSet<u32>,
    pub viewport: [i32; 4],
    pub scissor: [i32; 4],
    pub clear_color: [f32; 4],
    pub clear_depth: f32,
    pub clear_stencil: i32,
    pub color_mask: [bool; 4],
    pub depth_mask: bool,
    pub stencil_mask: u32,
    pub blend_func: (u32, u32),
    pub depth_func: u32,
    pub cull_face: u32,
    pub front_face: u32,
    pub hints: FxHashMap<u32, u32>,
}

impl Default for FixedFunctionState {
    fn default() -> Self {
        Self {
            enabled: FxHashSet::default(),
            viewport: [0; 4],
            scissor: [0; 4],
            clear_color: [0.0; 4],
            clear_depth: 1.0,
            clear_stencil: 0,
            color_mask: [true; 4],
            depth_mask: true,
            stencil_mask: u32::MAX,
            blend_func: (gl::ONE, gl::ZERO),
            depth_func: gl::LESS,
            cull_face: gl::BACK,
            front_face: gl::CCW,
            hints: FxHashMap::default(),
        }
    }
}

/// Storage layout of a renderbuffer format; stencil-only storage uses the
/// packed layout
fn renderbuffer_layout(internal_format: u32) -> (u32, u32) {
    match internal_format {
        gl::STENCIL_INDEX8 => (gl::DEPTH_STENCIL, gl::UNSIGNED_INT_24_8),
        other => gl::upload_format_for(other),
    }
}

/// Largest index among `count` indices of type `ty` at `offset`
fn max_index(data: &[u8], ty: u32, offset: usize, count: usize) -> Option<u32> {
    let size = gl::attrib_type_size(ty)? as usize;
    let end = offset.checked_add(count.checked_mul(size)?)?;
    data.get(offset..end)?
        .chunks_exact(size)
        .map(|index| match *index {
            [a] => a as u32,
            [a, b] => u16::from_ne_bytes([a, b]) as u32,
            [a, b, c, d] => u32::from_ne_bytes([a, b, c, d]),
            _ => 0,
        })
        .max()
}

pub struct SoftDriver {
    device: Arc<SoftDevice>,
    backbuffer: Option<Backbuffer>,
    errors: VecDeque<u32>,
    fixed: FixedFunctionState,
    pack_alignment: u32,
    unpack_alignment: u32,

    // Bindings
    array_buffer: u32,
    vertex_array: u32,
    default_vertex_array: SoftVertexArray,
    current_attribs: Vec<[f32; 4]>,
    active_unit: u32,
    /// `(unit, bind target)` -> texture
    textures: FxHashMap<(u32, u32), u32>,
    renderbuffer: u32,
    draw_framebuffer: u32,
    read_framebuffer: u32,
    program: u32,

    // Asynchronous work
    active_queries: FxHashMap<u32, u32>,
    ended_queries: Vec<u32>,
    pending_fences: Vec<u64>,
}

impl SoftDriver {
    pub(crate) fn new(device: Arc<SoftDevice>, backbuffer: Option<Backbuffer>) -> Self {
        let max_attribs = device.config().limits.get(&gl::MAX_VERTEX_ATTRIBS).copied().unwrap_or(16).max(1) as usize;
        gpu_command_service::gpu_debug!(
            "gpu::SoftDriver",
            "Created context ({})",
            if backbuffer.is_some() { "with back buffer" } else { "headless" }
        );
        Self {
            device,
            backbuffer,
            errors: VecDeque::new(),
            fixed: FixedFunctionState::default(),
            pack_alignment: 4,
            unpack_alignment: 4,
            array_buffer: 0,
            vertex_array: 0,
            default_vertex_array: SoftVertexArray::new(max_attribs),
            current_attribs: vec![[0.0, 0.0, 0.0, 1.0]; max_attribs],
            active_unit: 0,
            textures: FxHashMap::default(),
            renderbuffer: 0,
            draw_framebuffer: 0,
            read_framebuffer: 0,
            program: 0,
            active_queries: FxHashMap::default(),
            ended_queries: Vec::new(),
            pending_fences: Vec::new(),
        }
    }

    pub fn device(&self) -> &Arc<SoftDevice> {
        &self.device
    }

    pub fn fixed_function(&self) -> &FixedFunctionState {
        &self.fixed
    }

    /// Generic attribute value used when the array is disabled
    pub fn current_attrib(&self, index: u32) -> Option<[f32; 4]> {
        self.current_attribs.get(index as usize).copied()
    }

    /// Slot `index` of the bound vertex array
    pub fn vertex_attrib(&mut self, index: u32) -> Option<VertexAttrib> {
        self.with_vertex_array(|array| array.attribs.get(index as usize).copied()).flatten()
    }

    // ===== HELPERS =====

    fn report(&mut self, check: Check) {
        if let Err((error, what)) = check {
            gpu_command_service::gpu_trace!("gpu::SoftDriver", "{} ({:#06x})", what, error);
            if !self.errors.contains(&error) {
                self.errors.push_back(error);
            }
        }
    }

    fn max_vertex_attribs(&self) -> u32 {
        self.default_vertex_array.attribs.len() as u32
    }

    fn bound_texture(&self, target: u32) -> u32 {
        self.textures.get(&(self.active_unit, gl::bind_target_for(target))).copied().unwrap_or(0)
    }

    fn framebuffer_for(&self, target: u32) -> u32 {
        if target == gl::READ_FRAMEBUFFER_EXT {
            self.read_framebuffer
        } else {
            self.draw_framebuffer
        }
    }

    fn with_vertex_array<R>(&mut self, f: impl FnOnce(&mut SoftVertexArray) -> R) -> Option<R> {
        if self.vertex_array == 0 {
            return Some(f(&mut self.default_vertex_array));
        }
        self.device.store().vertex_arrays.get_mut(&self.vertex_array).map(f)
    }

    fn with_attrib(&mut self, index: u32, f: impl FnOnce(&mut VertexAttrib)) {
        if index >= self.max_vertex_attribs() {
            return self.report(Err((gl::INVALID_VALUE, "attribute index out of range")));
        }
        self.with_vertex_array(|array| {
            if let Some(attrib) = array.attribs.get_mut(index as usize) {
                f(attrib);
            }
        });
    }

    /// Copy of the color image of the read framebuffer
    fn read_color(&self) -> Option<SoftImage> {
        if self.read_framebuffer == 0 {
            return self.backbuffer.as_ref().map(|backbuffer| lock(&backbuffer.color).clone());
        }
        let store = self.device.store();
        let attachment = *store.framebuffers.get(&self.read_framebuffer)?.get(&gl::COLOR_ATTACHMENT0)?;
        store.attachment_image(attachment).cloned()
    }

    /// Run `write` on the image at `point` of the draw framebuffer
    fn with_draw_image(&self, point: u32, write: impl FnOnce(&mut SoftImage)) {
        if self.draw_framebuffer == 0 {
            let Some(backbuffer) = &self.backbuffer else {
                return;
            };
            let image = if point == gl::COLOR_ATTACHMENT0 { Some(&backbuffer.color) } else { backbuffer.depth_stencil.as_ref() };
            if let Some(image) = image {
                write(&mut *lock(image));
            }
            return;
        }
        let mut store = self.device.store();
        let attachment = store.framebuffers.get(&self.draw_framebuffer).and_then(|attachments| {
            attachments
                .get(&point)
                .or_else(|| (point != gl::COLOR_ATTACHMENT0).then(|| attachments.get(&gl::DEPTH_STENCIL_ATTACHMENT)).flatten())
                .copied()
        });
        if let Some(image) = attachment.and_then(|attachment| store.attachment_image_mut(attachment)) {
            write(image);
        }
    }

    /// Store `image` as a level of the texture bound to `target`
    fn define_level(&mut self, target: u32, level: i32, image: SoftImage) {
        let id = self.bound_texture(target);
        let check = if id == 0 {
            Err((gl::INVALID_OPERATION, "no texture bound"))
        } else {
            let mut store = self.device.store();
            let texture = store.textures.entry(id).or_default();
            if texture.immutable {
                Err((gl::INVALID_OPERATION, "texture storage is immutable"))
            } else {
                texture.levels.insert((target, level), image);
                Ok(())
            }
        };
        self.report(check);
    }

    /// Run `update` on an existing level of the texture bound to `target`
    fn update_level(&mut self, target: u32, level: i32, update: impl FnOnce(&mut SoftImage) -> Check) {
        let id = self.bound_texture(target);
        let check = {
            let mut store = self.device.store();
            match store.textures.get_mut(&id).and_then(|t| t.levels.get_mut(&(target, level))) {
                Some(image) => update(image),
                None => Err((gl::INVALID_OPERATION, "level not defined")),
            }
        };
        self.report(check);
    }

    fn set_uniform(&mut self, location: i32, components: usize, values: &[f32]) {
        if location == -1 {
            return;
        }
        let check = match self.device.store().programs.get_mut(&self.program) {
            None => Err((gl::INVALID_OPERATION, "no program in use")),
            Some(program) => {
                if program.set_uniform(location, components, values) {
                    Ok(())
                } else {
                    Err((gl::INVALID_OPERATION, "bad uniform location"))
                }
            }
        };
        self.report(check);
    }

    /// Validate a draw fetching `vertex_count` vertices and account for it
    fn draw(&mut self, vertex_count: usize) {
        let vertex_array = self.with_vertex_array(|array| array.clone());
        let check = {
            let mut store = self.device.store();
            let check = match (store.programs.get(&self.program).filter(|p| p.linked), vertex_array) {
                (None, _) => Err((gl::INVALID_OPERATION, "no linked program in use")),
                (_, None) => Err((gl::INVALID_OPERATION, "vertex array deleted")),
                (Some(program), Some(array)) => {
                    let mut check = Ok(());
                    for (_, location) in &program.attributes {
                        let Some(attrib) = array.attribs.get(*location as usize).filter(|a| a.enabled) else {
                            continue;
                        };
                        let element = gl::attrib_type_size(attrib.ty).unwrap_or(4) as usize * attrib.size.max(0) as usize;
                        let stride = if attrib.stride == 0 { element } else { attrib.stride as usize };
                        let needed = attrib.offset + stride * vertex_count.saturating_sub(1) + element;
                        let available = store.buffers.get(&attrib.buffer).map_or(0, |data| data.len());
                        if attrib.buffer == 0 || needed > available {
                            check = Err((gl::INVALID_OPERATION, "vertex fetch out of range"));
                            break;
                        }
                    }
                    check
                }
            };
            if check.is_ok() {
                store.draw_calls += 1;
                for id in self.active_queries.values() {
                    if let Some(query) = store.queries.get_mut(id) {
                        query.result = match query.target {
                            gl::SAMPLES_PASSED_ARB => query.result + vertex_count as u64,
                            _ => (vertex_count > 0) as u64 | query.result,
                        };
                    }
                }
            }
            check
        };
        self.report(check);
    }
}

impl GraphicsDriver for SoftDriver {
    // ===== INFO =====

    fn get_string(&mut self, name: u32) -> String {
        let config = self.device.config();
        match name {
            gl::VERSION => config.version.clone(),
            gl::RENDERER => config.renderer.clone(),
            gl::VENDOR => config.vendor.clone(),
            gl::EXTENSIONS => config.extensions.clone(),
            gl::SHADING_LANGUAGE_VERSION => "OpenGL ES GLSL ES 1.00 Soft".to_string(),
            _ => String::new(),
        }
    }

    fn get_integer(&mut self, pname: u32) -> i32 {
        self.device.config().limits.get(&pname).copied().unwrap_or(0)
    }

    fn get_error(&mut self) -> u32 {
        self.errors.pop_front().unwrap_or(gl::NO_ERROR)
    }

    fn reset_status(&mut self) -> u32 {
        self.device.reset_status()
    }

    // ===== OBJECT NAMES =====

    fn gen_buffer(&mut self) -> u32 {
        let mut store = self.device.store();
        let id = store.next_name();
        store.buffers.insert(id, Vec::new());
        id
    }

    fn delete_buffer(&mut self, id: u32) {
        self.device.store().buffers.remove(&id);
        if self.array_buffer == id {
            self.array_buffer = 0;
        }
        if self.default_vertex_array.element_buffer == id {
            self.default_vertex_array.element_buffer = 0;
        }
    }

    fn gen_texture(&mut self) -> u32 {
        let mut store = self.device.store();
        let id = store.next_name();
        store.textures.insert(id, SoftTexture::default());
        id
    }

    fn delete_texture(&mut self, id: u32) {
        let mut store = self.device.store();
        store.textures.remove(&id);
        store.detach_everywhere(|a| matches!(a, Attachment::Texture { id: t, .. } if *t == id));
        drop(store);
        self.textures.retain(|_, texture| *texture != id);
    }

    fn gen_framebuffer(&mut self) -> u32 {
        let mut store = self.device.store();
        let id = store.next_name();
        store.framebuffers.insert(id, FxHashMap::default());
        id
    }

    fn delete_framebuffer(&mut self, id: u32) {
        self.device.store().framebuffers.remove(&id);
        if self.draw_framebuffer == id {
            self.draw_framebuffer = 0;
        }
        if self.read_framebuffer == id {
            self.read_framebuffer = 0;
        }
    }

    fn gen_renderbuffer(&mut self) -> u32 {
        let mut store = self.device.store();
        let id = store.next_name();
        store.renderbuffers.insert(id, SoftRenderbuffer::default());
        id
    }

    fn delete_renderbuffer(&mut self, id: u32) {
        let mut store = self.device.store();
        store.renderbuffers.remove(&id);
        store.detach_everywhere(|a| *a == Attachment::Renderbuffer(id));
        drop(store);
        if self.renderbuffer == id {
            self.renderbuffer = 0;
        }
    }

    fn create_shader(&mut self, shader_type: u32) -> u32 {
        let mut store = self.device.store();
        let id = store.next_name();
        store.shaders.insert(id, SoftShader::new(shader_type));
        id
    }

    fn delete_shader(&mut self, id: u32) {
        let mut store = self.device.store();
        if let Some(shader) = store.shaders.get_mut(&id) {
            shader.delete_pending = true;
        }
        store.release_shader_if_unused(id);
    }

    fn create_program(&mut self) -> u32 {
        let mut store = self.device.store();
        let id = store.next_name();
        store.programs.insert(id, SoftProgram::default());
        id
    }

    fn delete_program(&mut self, id: u32) {
        let mut store = self.device.store();
        match store.programs.get_mut(&id) {
            Some(program) if program.in_use > 0 => program.delete_pending = true,
            Some(_) => store.remove_program(id),
            None => {}
        }
    }

    fn gen_query(&mut self) -> u32 {
        let mut store = self.device.store();
        let id = store.next_name();
        store.queries.insert(id, SoftQuery::default());
        id
    }

    fn delete_query(&mut self, id: u32) {
        self.device.store().queries.remove(&id);
        self.active_queries.retain(|_, query| *query != id);
        self.ended_queries.retain(|query| *query != id);
    }

    fn gen_vertex_array(&mut self) -> u32 {
        let max_attribs = self.max_vertex_attribs() as usize;
        let mut store = self.device.store();
        let id = store.next_name();
        store.vertex_arrays.insert(id, SoftVertexArray::new(max_attribs));
        id
    }

    fn delete_vertex_array(&mut self, id: u32) {
        self.device.store().vertex_arrays.remove(&id);
        if self.vertex_array == id {
            self.vertex_array = 0;
        }
    }

    // ===== BUFFERS =====

    fn bind_buffer(&mut self, target: u32, id: u32) {
        if id != 0 {
            self.device.store().buffers.entry(id).or_default();
        }
        match target {
            gl::ARRAY_BUFFER => self.array_buffer = id,
            gl::ELEMENT_ARRAY_BUFFER => {
                self.with_vertex_array(|array| array.element_buffer = id);
            }
            _ => self.report(Err((gl::INVALID_ENUM, "bad buffer target"))),
        }
    }

    fn buffer_data(&mut self, target: u32, size: usize, data: Option<&[u8]>, _usage: u32) {
        let id = match target {
            gl::ARRAY_BUFFER => self.array_buffer,
            _ => self.with_vertex_array(|array| array.element_buffer).unwrap_or(0),
        };
        let check = match self.device.store().buffers.get_mut(&id).filter(|_| id != 0) {
            None => Err((gl::INVALID_OPERATION, "no buffer bound")),
            Some(contents) => {
                let mut bytes = data.map(|d| d[..size.min(d.len())].to_vec()).unwrap_or_default();
                bytes.resize(size, 0);
                *contents = bytes;
                Ok(())
            }
        };
        self.report(check);
    }

    fn buffer_sub_data(&mut self, target: u32, offset: usize, data: &[u8]) {
        let id = match target {
            gl::ARRAY_BUFFER => self.array_buffer,
            _ => self.with_vertex_array(|array| array.element_buffer).unwrap_or(0),
        };
        let check = match self.device.store().buffers.get_mut(&id).filter(|_| id != 0) {
            None => Err((gl::INVALID_OPERATION, "no buffer bound")),
            Some(contents) => match contents.get_mut(offset..offset.saturating_add(data.len())) {
                Some(range) => {
                    range.copy_from_slice(data);
                    Ok(())
                }
                None => Err((gl::INVALID_VALUE, "range outside the buffer")),
            },
        };
        self.report(check);
    }

    // ===== TEXTURES =====

    fn active_texture(&mut self, unit: u32) {
        self.active_unit = unit.saturating_sub(gl::TEXTURE0);
    }

    fn bind_texture(&mut self, target: u32, id: u32) {
        if id != 0 {
            let mut store = self.device.store();
            let texture = store.textures.entry(id).or_default();
            if texture.target != 0 && texture.target != target {
                drop(store);
                return self.report(Err((gl::INVALID_OPERATION, "texture bound to another target")));
            }
            texture.target = target;
        }
        self.textures.insert((self.active_unit, target), id);
    }

    fn tex_image_2d(
        &mut self,
        target: u32,
        level: i32,
        internal_format: u32,
        width: i32,
        height: i32,
        format: u32,
        ty: u32,
        pixels: Option<&[u8]>,
    ) {
        let image = match pixels {
            Some(pixels) => {
                SoftImage::from_pixels(width, height, internal_format, format, ty, pixels, self.unpack_alignment)
            }
            None => SoftImage::undefined(width, height, internal_format, format, ty),
        };
        self.define_level(target, level, image);
    }

    fn tex_sub_image_2d(
        &mut self,
        target: u32,
        level: i32,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        format: u32,
        ty: u32,
        pixels: &[u8],
    ) {
        let alignment = self.unpack_alignment;
        self.update_level(target, level, |image| {
            if x < 0 || y < 0 || x + width > image.width || y + height > image.height {
                return Err((gl::INVALID_VALUE, "sub-image outside the level"));
            }
            if format != image.format || ty != image.ty {
                return Err((gl::INVALID_OPERATION, "format does not match the level"));
            }
            image.write_rect(x, y, width, height, pixels, alignment);
            Ok(())
        });
    }

    fn compressed_tex_image_2d(
        &mut self,
        target: u32,
        level: i32,
        internal_format: u32,
        width: i32,
        height: i32,
        data: &[u8],
    ) {
        self.define_level(target, level, SoftImage::opaque(width, height, internal_format, data));
    }

    fn tex_storage_2d(&mut self, target: u32, levels: i32, internal_format: u32, width: i32, height: i32) {
        let id = self.bound_texture(target);
        let (format, ty) = gl::upload_format_for(internal_format);
        let faces: Vec<u32> = if target == gl::TEXTURE_CUBE_MAP {
            (0..6).map(|face| gl::TEXTURE_CUBE_MAP_POSITIVE_X + face).collect()
        } else {
            vec![target]
        };
        let check = match self.device.store().textures.get_mut(&id).filter(|_| id != 0) {
            None => Err((gl::INVALID_OPERATION, "no texture bound")),
            Some(texture) if texture.immutable => Err((gl::INVALID_OPERATION, "storage already defined")),
            Some(texture) => {
                texture.levels.clear();
                for level in 0..levels.max(0) {
                    let (w, h) = ((width >> level).max(1), (height >> level).max(1));
                    for face in &faces {
                        texture.levels.insert((*face, level), SoftImage::undefined(w, h, internal_format, format, ty));
                    }
                }
                texture.immutable = true;
                Ok(())
            }
        };
        self.report(check);
    }

    fn copy_tex_image_2d(
        &mut self,
        target: u32,
        level: i32,
        internal_format: u32,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) {
        let Some(source) = self.read_color() else {
            return self.report(Err((gl::INVALID_OPERATION, "no color buffer to read")));
        };
        let (format, ty) = gl::upload_format_for(internal_format);
        let mut image = SoftImage::undefined(width, height, internal_format, format, ty);
        image.copy_from(0, 0, &source, x, y, width, height);
        self.define_level(target, level, image);
    }

    fn copy_tex_sub_image_2d(
        &mut self,
        target: u32,
        level: i32,
        xoffset: i32,
        yoffset: i32,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) {
        let Some(source) = self.read_color() else {
            return self.report(Err((gl::INVALID_OPERATION, "no color buffer to read")));
        };
        self.update_level(target, level, |image| {
            image.copy_from(xoffset, yoffset, &source, x, y, width, height);
            Ok(())
        });
    }

    fn tex_parameter_i(&mut self, target: u32, pname: u32, value: i32) {
        self.tex_parameter_f(target, pname, value as f32);
    }

    fn tex_parameter_f(&mut self, target: u32, pname: u32, value: f32) {
        let id = self.bound_texture(target);
        let check = match self.device.store().textures.get_mut(&id).filter(|_| id != 0) {
            None => Err((gl::INVALID_OPERATION, "no texture bound")),
            Some(texture) => {
                texture.params.insert(pname, value);
                Ok(())
            }
        };
        self.report(check);
    }

    fn generate_mipmap(&mut self, target: u32) {
        let id = self.bound_texture(target);
        let faces: Vec<u32> = if target == gl::TEXTURE_CUBE_MAP {
            (0..6).map(|face| gl::TEXTURE_CUBE_MAP_POSITIVE_X + face).collect()
        } else {
            vec![target]
        };
        let check = match self.device.store().textures.get_mut(&id).filter(|_| id != 0) {
            None => Err((gl::INVALID_OPERATION, "no texture bound")),
            Some(texture) => {
                let mut check = Ok(());
                for face in faces {
                    let Some(mut previous) = texture.levels.get(&(face, 0)).cloned() else {
                        check = Err((gl::INVALID_OPERATION, "base level not defined"));
                        break;
                    };
                    let mut level = 1;
                    while previous.width > 1 || previous.height > 1 {
                        let next = previous.downsample();
                        if !texture.immutable || texture.levels.contains_key(&(face, level)) {
                            texture.levels.insert((face, level), next.clone());
                        }
                        previous = next;
                        level += 1;
                    }
                }
                check
            }
        };
        self.report(check);
    }

    fn pixel_store_i(&mut self, pname: u32, value: i32) {
        match pname {
            gl::PACK_ALIGNMENT => self.pack_alignment = value.max(1) as u32,
            gl::UNPACK_ALIGNMENT => self.unpack_alignment = value.max(1) as u32,
            _ => {}
        }
    }

    // ===== RENDERBUFFERS / FRAMEBUFFERS =====

    fn bind_renderbuffer(&mut self, _target: u32, id: u32) {
        if id != 0 {
            self.device.store().renderbuffers.entry(id).or_default();
        }
        self.renderbuffer = id;
    }

    fn renderbuffer_storage(&mut self, _target: u32, samples: i32, internal_format: u32, width: i32, height: i32) {
        let id = self.renderbuffer;
        let (format, ty) = renderbuffer_layout(internal_format);
        let check = match self.device.store().renderbuffers.get_mut(&id).filter(|_| id != 0) {
            None => Err((gl::INVALID_OPERATION, "no renderbuffer bound")),
            Some(renderbuffer) => {
                renderbuffer.image = Some(SoftImage::undefined(width, height, internal_format, format, ty));
                renderbuffer.samples = samples;
                Ok(())
            }
        };
        self.report(check);
    }

    fn bind_framebuffer(&mut self, target: u32, id: u32) {
        if id != 0 {
            self.device.store().framebuffers.entry(id).or_default();
        }
        match target {
            gl::READ_FRAMEBUFFER_EXT => self.read_framebuffer = id,
            gl::DRAW_FRAMEBUFFER_EXT => self.draw_framebuffer = id,
            _ => {
                self.read_framebuffer = id;
                self.draw_framebuffer = id;
            }
        }
    }

    fn framebuffer_texture_2d(&mut self, target: u32, attachment: u32, tex_target: u32, texture: u32, level: i32) {
        let framebuffer = self.framebuffer_for(target);
        let check = match self.device.store().framebuffers.get_mut(&framebuffer).filter(|_| framebuffer != 0) {
            None => Err((gl::INVALID_OPERATION, "default framebuffer bound")),
            Some(attachments) => {
                if texture == 0 {
                    attachments.remove(&attachment);
                } else {
                    attachments.insert(attachment, Attachment::Texture { id: texture, target: tex_target, level });
                }
                Ok(())
            }
        };
        self.report(check);
    }

    fn framebuffer_renderbuffer(&mut self, target: u32, attachment: u32, renderbuffer: u32) {
        let framebuffer = self.framebuffer_for(target);
        let check = match self.device.store().framebuffers.get_mut(&framebuffer).filter(|_| framebuffer != 0) {
            None => Err((gl::INVALID_OPERATION, "default framebuffer bound")),
            Some(attachments) => {
                if renderbuffer == 0 {
                    attachments.remove(&attachment);
                } else {
                    attachments.insert(attachment, Attachment::Renderbuffer(renderbuffer));
                }
                Ok(())
            }
        };
        self.report(check);
    }

    fn check_framebuffer_status(&mut self, target: u32) -> u32 {
        let framebuffer = self.framebuffer_for(target);
        if framebuffer == 0 {
            return gl::FRAMEBUFFER_COMPLETE;
        }
        let store = self.device.store();
        let Some(attachments) = store.framebuffers.get(&framebuffer) else {
            return gl::FRAMEBUFFER_UNSUPPORTED;
        };
        if attachments.is_empty() {
            return gl::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT;
        }
        let mut size = None;
        for (point, attachment) in attachments {
            let Some(image) = store.attachment_image(*attachment).filter(|i| i.width > 0 && i.height > 0) else {
                return gl::FRAMEBUFFER_INCOMPLETE_ATTACHMENT;
            };
            let format = image.internal_format;
            let renderable = match *point {
                gl::COLOR_ATTACHMENT0 => gl::is_color_renderable(format),
                gl::DEPTH_ATTACHMENT => gl::is_depth_format(format),
                gl::STENCIL_ATTACHMENT => gl::has_stencil(format),
                gl::DEPTH_STENCIL_ATTACHMENT => gl::is_depth_format(format) && gl::has_stencil(format),
                _ => false,
            };
            if !renderable {
                return gl::FRAMEBUFFER_INCOMPLETE_ATTACHMENT;
            }
            match size {
                None => size = Some((image.width, image.height)),
                Some(size) if size != (image.width, image.height) => {
                    return gl::FRAMEBUFFER_INCOMPLETE_DIMENSIONS;
                }
                Some(_) => {}
            }
        }
        gl::FRAMEBUFFER_COMPLETE
    }

    fn blit_framebuffer(&mut self, width: i32, height: i32) {
        let Some(source) = self.read_color() else {
            return self.report(Err((gl::INVALID_OPERATION, "no color buffer to read")));
        };
        self.with_draw_image(gl::COLOR_ATTACHMENT0, |target| {
            target.copy_from(0, 0, &source, 0, 0, width, height);
        });
    }

    // ===== SHADERS / PROGRAMS =====

    fn shader_source(&mut self, shader: u32, source: &str) {
        let check = match self.device.store().shaders.get_mut(&shader) {
            None => Err((gl::INVALID_VALUE, "unknown shader")),
            Some(target) => {
                target.source = source.to_string();
                Ok(())
            }
        };
        self.report(check);
    }

    fn compile_shader(&mut self, shader: u32) {
        let check = match self.device.store().shaders.get_mut(&shader) {
            None => Err((gl::INVALID_VALUE, "unknown shader")),
            Some(target) => {
                target.compile();
                Ok(())
            }
        };
        self.report(check);
    }

    fn shader_compile_status(&mut self, shader: u32) -> bool {
        self.device.store().shaders.get(&shader).is_some_and(|s| s.compiled)
    }

    fn shader_info_log(&mut self, shader: u32) -> String {
        self.device.store().shaders.get(&shader).map(|s| s.info_log.clone()).unwrap_or_default()
    }

    fn attach_shader(&mut self, program: u32, shader: u32) {
        let check = {
            let mut store = self.device.store();
            let store = &mut *store;
            match (store.programs.get_mut(&program), store.shaders.contains_key(&shader)) {
                (Some(target), true) if !target.attached.contains(&shader) => {
                    target.attached.push(shader);
                    Ok(())
                }
                (Some(_), true) => Err((gl::INVALID_OPERATION, "shader already attached")),
                _ => Err((gl::INVALID_VALUE, "unknown program or shader")),
            }
        };
        self.report(check);
    }

    fn detach_shader(&mut self, program: u32, shader: u32) {
        let check = {
            let mut store = self.device.store();
            let detached = store
                .programs
                .get_mut(&program)
                .and_then(|target| target.attached.iter().position(|s| *s == shader).map(|i| target.attached.remove(i)));
            match detached {
                Some(shader) => {
                    store.release_shader_if_unused(shader);
                    Ok(())
                }
                None => Err((gl::INVALID_OPERATION, "shader not attached")),
            }
        };
        self.report(check);
    }

    fn bind_attrib_location(&mut self, program: u32, index: u32, name: &str) {
        if index >= self.max_vertex_attribs() {
            return self.report(Err((gl::INVALID_VALUE, "attribute index out of range")));
        }
        let check = match self.device.store().programs.get_mut(&program) {
            None => Err((gl::INVALID_VALUE, "unknown program")),
            Some(target) => {
                target.bindings.insert(name.to_string(), index);
                Ok(())
            }
        };
        self.report(check);
    }

    fn link_program(&mut self, program: u32) {
        let max_attribs = self.max_vertex_attribs();
        let check = {
            let mut store = self.device.store();
            let store = &mut *store;
            match store.programs.get_mut(&program) {
                None => Err((gl::INVALID_VALUE, "unknown program")),
                Some(target) => {
                    let shaders: Vec<&SoftShader> =
                        target.attached.iter().filter_map(|id| store.shaders.get(id)).collect();
                    target.link(&shaders, max_attribs);
                    Ok(())
                }
            }
        };
        self.report(check);
    }

    fn program_link_status(&mut self, program: u32) -> bool {
        self.device.store().programs.get(&program).is_some_and(|p| p.linked)
    }

    fn program_info_log(&mut self, program: u32) -> String {
        self.device.store().programs.get(&program).map(|p| p.info_log.clone()).unwrap_or_default()
    }

    fn validate_program(&mut self, program: u32) -> bool {
        self.program_link_status(program)
    }

    fn active_attributes(&mut self, program: u32) -> Vec<ActiveVariable> {
        let store = self.device.store();
        let Some(target) = store.programs.get(&program) else {
            return Vec::new();
        };
        target.attributes.iter().map(|(variable, _)| variable.clone()).collect()
    }

    fn active_uniforms(&mut self, program: u32) -> Vec<ActiveVariable> {
        self.device.store().programs.get(&program).map(|p| p.uniforms.clone()).unwrap_or_default()
    }

    fn attrib_location(&mut self, program: u32, name: &str) -> i32 {
        self.device.store().programs.get(&program).map_or(-1, |p| p.attrib_location(name))
    }

    fn uniform_location(&mut self, program: u32, name: &str) -> i32 {
        self.device.store().programs.get(&program).map_or(-1, |p| p.uniform_location(name))
    }

    fn use_program(&mut self, program: u32) {
        let check = {
            let mut store = self.device.store();
            if program != 0 && !store.programs.get(&program).is_some_and(|p| p.linked) {
                Err((gl::INVALID_OPERATION, "program not linked"))
            } else {
                if let Some(target) = store.programs.get_mut(&program) {
                    target.in_use += 1;
                }
                let previous = std::mem::replace(&mut self.program, program);
                if let Some(target) = store.programs.get_mut(&previous) {
                    target.in_use = target.in_use.saturating_sub(1);
                    if target.in_use == 0 && target.delete_pending {
                        store.remove_program(previous);
                    }
                }
                Ok(())
            }
        };
        self.report(check);
    }

    // ===== UNIFORMS =====

    fn uniform_iv(&mut self, location: i32, components: usize, values: &[i32]) {
        let values: Vec<f32> = values.iter().map(|v| *v as f32).collect();
        self.set_uniform(location, components, &values);
    }

    fn uniform_fv(&mut self, location: i32, components: usize, values: &[f32]) {
        self.set_uniform(location, components, values);
    }

    fn uniform_matrix_fv(&mut self, location: i32, dimension: usize, values: &[f32]) {
        self.set_uniform(location, dimension * dimension, values);
    }

    fn get_uniform_fv(&mut self, program: u32, location: i32, components: usize) -> Vec<f32> {
        let value = {
            let store = self.device.store();
            store.programs.get(&program).filter(|p| p.has_location(location)).map(|p| p.uniform(location, components))
        };
        match value {
            Some(value) => value,
            None => {
                self.report(Err((gl::INVALID_OPERATION, "bad uniform location")));
                vec![0.0; components]
            }
        }
    }

    // ===== VERTEX ATTRIBUTES =====

    fn enable_vertex_attrib_array(&mut self, index: u32) {
        self.with_attrib(index, |attrib| attrib.enabled = true);
    }

    fn disable_vertex_attrib_array(&mut self, index: u32) {
        self.with_attrib(index, |attrib| attrib.enabled = false);
    }

    fn vertex_attrib_pointer(&mut self, index: u32, size: i32, ty: u32, normalized: bool, stride: i32, offset: usize) {
        let buffer = self.array_buffer;
        self.with_attrib(index, |attrib| {
            *attrib = VertexAttrib { enabled: attrib.enabled, size, ty, normalized, stride, offset, buffer };
        });
    }

    fn vertex_attrib_4f(&mut self, index: u32, values: [f32; 4]) {
        match self.current_attribs.get_mut(index as usize) {
            Some(current) => *current = values,
            None => self.report(Err((gl::INVALID_VALUE, "attribute index out of range"))),
        }
    }

    fn bind_vertex_array(&mut self, id: u32) {
        let max_attribs = self.max_vertex_attribs() as usize;
        if id != 0 {
            self.device.store().vertex_arrays.entry(id).or_insert_with(|| SoftVertexArray::new(max_attribs));
        }
        self.vertex_array = id;
    }

    // ===== FIXED-FUNCTION STATE =====

    fn enable(&mut self, cap: u32) {
        self.fixed.enabled.insert(cap);
    }

    fn disable(&mut self, cap: u32) {
        self.fixed.enabled.remove(&cap);
    }

    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.fixed.viewport = [x, y, width, height];
    }

    fn scissor(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.fixed.scissor = [x, y, width, height];
    }

    fn clear_color(&mut self, rgba: [f32; 4]) {
        self.fixed.clear_color = rgba;
    }

    fn clear_depth(&mut self, depth: f32) {
        self.fixed.clear_depth = depth;
    }

    fn clear_stencil(&mut self, stencil: i32) {
        self.fixed.clear_stencil = stencil;
    }

    fn color_mask(&mut self, mask: [bool; 4]) {
        self.fixed.color_mask = mask;
    }

    fn depth_mask(&mut self, flag: bool) {
        self.fixed.depth_mask = flag;
    }

    fn stencil_mask(&mut self, mask: u32) {
        self.fixed.stencil_mask = mask;
    }

    fn blend_func(&mut self, src: u32, dst: u32) {
        self.fixed.blend_func = (src, dst);
    }

    fn depth_func(&mut self, func: u32) {
        self.fixed.depth_func = func;
    }

    fn cull_face(&mut self, mode: u32) {
        self.fixed.cull_face = mode;
    }

    fn front_face(&mut self, mode: u32) {
        self.fixed.front_face = mode;
    }

    fn hint(&mut self, target: u32, mode: u32) {
        self.fixed.hints.insert(target, mode);
    }

    // ===== DRAWING =====

    /// Partial stencil write masks write the whole clear value
    fn clear(&mut self, mask: u32) {
        let rect = if self.fixed.enabled.contains(&gl::SCISSOR_TEST) { self.fixed.scissor } else { [0, 0, i32::MAX, i32::MAX] };
        let fixed = &self.fixed;
        if mask & gl::COLOR_BUFFER_BIT != 0 {
            self.with_draw_image(gl::COLOR_ATTACHMENT0, |image| {
                image.fill_color(rect, fixed.clear_color, fixed.color_mask);
            });
        }
        if mask & gl::DEPTH_BUFFER_BIT != 0 && fixed.depth_mask {
            self.with_draw_image(gl::DEPTH_ATTACHMENT, |image| {
                image.fill_depth_stencil(rect, Some(fixed.clear_depth), None);
            });
        }
        if mask & gl::STENCIL_BUFFER_BIT != 0 && fixed.stencil_mask & 0xFF != 0 {
            self.with_draw_image(gl::STENCIL_ATTACHMENT, |image| {
                image.fill_depth_stencil(rect, None, Some(fixed.clear_stencil as u8));
            });
        }
    }

    fn draw_arrays(&mut self, _mode: u32, first: i32, count: i32) {
        if count <= 0 {
            return;
        }
        self.draw(first.max(0) as usize + count as usize);
    }

    fn draw_elements(&mut self, _mode: u32, count: i32, ty: u32, offset: usize) {
        if count <= 0 {
            return;
        }
        let element_buffer = self.with_vertex_array(|array| array.element_buffer).unwrap_or(0);
        let highest = self
            .device
            .store()
            .buffers
            .get(&element_buffer)
            .and_then(|data| max_index(data, ty, offset, count as usize));
        match highest {
            Some(highest) => self.draw(highest as usize + 1),
            None => self.report(Err((gl::INVALID_OPERATION, "indices outside the element buffer"))),
        }
    }

    fn read_pixels(&mut self, x: i32, y: i32, width: i32, height: i32, format: u32, ty: u32, out: &mut [u8]) {
        match self.read_color() {
            Some(source) => source.read_rect(x, y, width, height, format, ty, self.pack_alignment, out),
            None => self.report(Err((gl::INVALID_OPERATION, "no color buffer to read"))),
        }
    }

    fn flush(&mut self) {
        let mut store = self.device.store();
        for id in self.ended_queries.drain(..) {
            if let Some(query) = store.queries.get_mut(&id) {
                query.available = true;
            }
        }
        for fence in self.pending_fences.drain(..) {
            if let Some(signaled) = store.fences.get_mut(&fence) {
                *signaled = true;
            }
        }
    }

    fn finish(&mut self) {
        self.flush();
    }

    // ===== QUERIES / FENCES =====

    fn begin_query(&mut self, target: u32, id: u32) {
        let check = if self.active_queries.contains_key(&target) {
            Err((gl::INVALID_OPERATION, "query already active for target"))
        } else {
            match self.device.store().queries.get_mut(&id) {
                None => Err((gl::INVALID_OPERATION, "unknown query")),
                Some(query) => {
                    *query = SoftQuery { target, result: 0, available: false };
                    Ok(())
                }
            }
        };
        if check.is_ok() {
            self.active_queries.insert(target, id);
        }
        self.report(check);
    }

    fn end_query(&mut self, target: u32) {
        match self.active_queries.remove(&target) {
            Some(id) => self.ended_queries.push(id),
            None => self.report(Err((gl::INVALID_OPERATION, "no active query for target"))),
        }
    }

    fn query_result_available(&mut self, id: u32) -> bool {
        self.device.store().queries.get(&id).is_some_and(|q| q.available)
    }

    fn query_result(&mut self, id: u32) -> u64 {
        self.device.store().queries.get(&id).map_or(0, |q| q.result)
    }

    fn fence_sync(&mut self) -> u64 {
        let fence = self.device.store().next_fence();
        self.pending_fences.push(fence);
        fence
    }

    fn fence_signaled(&mut self, fence: u64) -> bool {
        self.device.store().fences.get(&fence).copied().unwrap_or(true)
    }

    fn delete_fence(&mut self, fence: u64) {
        self.device.store().fences.remove(&fence);
        self.pending_fences.retain(|pending| *pending != fence);
    }
}

#[cfg(test)]
#[path = "soft_driver_tests.rs"]
mod tests;
