/// Mock GraphicsDriver for unit tests (no GPU, no raster)
///
/// Every call is recorded as a string in `calls`. Names are handed out from a
/// single counter so tests can predict service ids. Link/compile results,
/// active variables and query availability are scripted through public fields.

use super::graphics_driver::{ActiveVariable, GraphicsDriver};
use super::surface::{Surface, SurfaceFormat};
use crate::gl;
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex};

// ============================================================================
// Mock Driver
// ============================================================================

pub struct MockDriver {
    pub calls: Vec<String>,
    pub next_id: u32,
    pub extensions: String,
    pub version: String,
    pub integers: FxHashMap<u32, i32>,
    pub errors: Vec<u32>,
    pub reset: u32,
    pub link_ok: bool,
    pub compile_ok: bool,
    pub attributes: Vec<ActiveVariable>,
    pub uniforms: Vec<ActiveVariable>,
    pub framebuffer_status: u32,
    /// Query ids whose result is available, with their result
    pub query_results: FxHashMap<u32, u64>,
    pub signaled_fences: Vec<u64>,
    next_fence: u64,
    bound_attribs: FxHashMap<String, u32>,
    /// Copy of `calls` readable after the driver moved into a decoder
    journal: Option<Arc<Mutex<Vec<String>>>>,
}

impl MockDriver {
    pub fn new() -> Self {
        let mut integers = FxHashMap::default();
        for (pname, value) in [
            (gl::MAX_TEXTURE_SIZE, 8192),
            (gl::MAX_CUBE_MAP_TEXTURE_SIZE, 8192),
            (gl::MAX_RENDERBUFFER_SIZE, 8192),
            (gl::MAX_VERTEX_ATTRIBS, 16),
            (gl::MAX_COMBINED_TEXTURE_IMAGE_UNITS, 32),
            (gl::MAX_TEXTURE_IMAGE_UNITS, 16),
            (gl::MAX_VERTEX_TEXTURE_IMAGE_UNITS, 16),
            (gl::MAX_FRAGMENT_UNIFORM_VECTORS, 256),
            (gl::MAX_VERTEX_UNIFORM_VECTORS, 256),
            (gl::MAX_VARYING_VECTORS, 15),
            // Desktop drivers report components instead of vectors
            (gl::MAX_FRAGMENT_UNIFORM_COMPONENTS, 1024),
            (gl::MAX_VERTEX_UNIFORM_COMPONENTS, 1024),
            (gl::MAX_VARYING_FLOATS, 60),
            (gl::MAX_DRAW_BUFFERS_ARB, 1),
            (gl::MAX_COLOR_ATTACHMENTS_EXT, 1),
            (gl::MAX_SAMPLES_EXT, 4),
        ] {
            integers.insert(pname, value);
        }
        Self {
            calls: Vec::new(),
            next_id: 100,
            extensions: "GL_OES_texture_npot GL_OES_depth_texture GL_OES_packed_depth_stencil \
                         GL_EXT_occlusion_query_boolean GL_EXT_texture_storage"
                .to_string(),
            version: "OpenGL ES 2.0 Mock".to_string(),
            integers,
            errors: Vec::new(),
            reset: gl::NO_ERROR,
            link_ok: true,
            compile_ok: true,
            attributes: Vec::new(),
            uniforms: Vec::new(),
            framebuffer_status: gl::FRAMEBUFFER_COMPLETE,
            query_results: FxHashMap::default(),
            signaled_fences: Vec::new(),
            next_fence: 1,
            bound_attribs: FxHashMap::default(),
            journal: None,
        }
    }

    fn next(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn record(&mut self, call: String) {
        if let Some(journal) = &self.journal {
            if let Ok(mut journal) = journal.lock() {
                journal.push(call.clone());
            }
        }
        self.calls.push(call);
    }

    /// Start mirroring calls into a shared journal and return it
    pub fn journal(&mut self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(self.journal.get_or_insert_with(|| Arc::new(Mutex::new(Vec::new()))))
    }

    /// Number of recorded calls starting with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.calls.iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn called(&self, call: &str) -> bool {
        self.calls.iter().any(|c| c == call)
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsDriver for MockDriver {
    fn get_string(&mut self, name: u32) -> String {
        match name {
            gl::EXTENSIONS => self.extensions.clone(),
            gl::VERSION => self.version.clone(),
            gl::VENDOR => "Mock".to_string(),
            gl::RENDERER => "Mock Renderer".to_string(),
            _ => String::new(),
        }
    }

    fn get_integer(&mut self, pname: u32) -> i32 {
        self.integers.get(&pname).copied().unwrap_or(0)
    }

    fn get_error(&mut self) -> u32 {
        if self.errors.is_empty() {
            gl::NO_ERROR
        } else {
            self.errors.remove(0)
        }
    }

    fn reset_status(&mut self) -> u32 {
        self.reset
    }

    fn gen_buffer(&mut self) -> u32 {
        let id = self.next();
        self.record(format!("gen_buffer {}", id));
        id
    }
    fn delete_buffer(&mut self, id: u32) {
        self.record(format!("delete_buffer {}", id));
    }
    fn gen_texture(&mut self) -> u32 {
        let id = self.next();
        self.record(format!("gen_texture {}", id));
        id
    }
    fn delete_texture(&mut self, id: u32) {
        self.record(format!("delete_texture {}", id));
    }
    fn gen_framebuffer(&mut self) -> u32 {
        let id = self.next();
        self.record(format!("gen_framebuffer {}", id));
        id
    }
    fn delete_framebuffer(&mut self, id: u32) {
        self.record(format!("delete_framebuffer {}", id));
    }
    fn gen_renderbuffer(&mut self) -> u32 {
        let id = self.next();
        self.record(format!("gen_renderbuffer {}", id));
        id
    }
    fn delete_renderbuffer(&mut self, id: u32) {
        self.record(format!("delete_renderbuffer {}", id));
    }
    fn create_shader(&mut self, shader_type: u32) -> u32 {
        let id = self.next();
        self.record(format!("create_shader {:#x} {}", shader_type, id));
        id
    }
    fn delete_shader(&mut self, id: u32) {
        self.record(format!("delete_shader {}", id));
    }
    fn create_program(&mut self) -> u32 {
        let id = self.next();
        self.record(format!("create_program {}", id));
        id
    }
    fn delete_program(&mut self, id: u32) {
        self.record(format!("delete_program {}", id));
    }
    fn gen_query(&mut self) -> u32 {
        let id = self.next();
        self.record(format!("gen_query {}", id));
        id
    }
    fn delete_query(&mut self, id: u32) {
        self.record(format!("delete_query {}", id));
    }
    fn gen_vertex_array(&mut self) -> u32 {
        let id = self.next();
        self.record(format!("gen_vertex_array {}", id));
        id
    }
    fn delete_vertex_array(&mut self, id: u32) {
        self.record(format!("delete_vertex_array {}", id));
    }

    fn bind_buffer(&mut self, target: u32, id: u32) {
        self.record(format!("bind_buffer {:#x} {}", target, id));
    }
    fn buffer_data(&mut self, target: u32, size: usize, data: Option<&[u8]>, usage: u32) {
        self.record(format!("buffer_data {:#x} {} {} {:#x}", target, size, data.is_some(), usage));
    }
    fn buffer_sub_data(&mut self, target: u32, offset: usize, data: &[u8]) {
        self.record(format!("buffer_sub_data {:#x} {} {}", target, offset, data.len()));
    }

    fn active_texture(&mut self, unit: u32) {
        self.record(format!("active_texture {:#x}", unit));
    }
    fn bind_texture(&mut self, target: u32, id: u32) {
        self.record(format!("bind_texture {:#x} {}", target, id));
    }
    fn tex_image_2d(
        &mut self,
        target: u32,
        level: i32,
        internal_format: u32,
        width: i32,
        height: i32,
        _format: u32,
        _ty: u32,
        pixels: Option<&[u8]>,
    ) {
        let zeroed = pixels.map(|p| p.iter().all(|b| *b == 0));
        self.record(format!(
            "tex_image_2d {:#x} {} {:#x} {}x{} {:?}",
            target, level, internal_format, width, height, zeroed
        ));
    }
    fn tex_sub_image_2d(
        &mut self,
        target: u32,
        level: i32,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        _format: u32,
        _ty: u32,
        pixels: &[u8],
    ) {
        self.record(format!(
            "tex_sub_image_2d {:#x} {} {},{} {}x{} {}",
            target,
            level,
            x,
            y,
            width,
            height,
            pixels.len()
        ));
    }
    fn compressed_tex_image_2d(&mut self, target: u32, level: i32, internal_format: u32, width: i32, height: i32, data: &[u8]) {
        self.record(format!(
            "compressed_tex_image_2d {:#x} {} {:#x} {}x{} {}",
            target,
            level,
            internal_format,
            width,
            height,
            data.len()
        ));
    }
    fn tex_storage_2d(&mut self, target: u32, levels: i32, internal_format: u32, width: i32, height: i32) {
        self.record(format!(
            "tex_storage_2d {:#x} {} {:#x} {}x{}",
            target, levels, internal_format, width, height
        ));
    }
    fn copy_tex_image_2d(&mut self, target: u32, level: i32, internal_format: u32, x: i32, y: i32, width: i32, height: i32) {
        self.record(format!(
            "copy_tex_image_2d {:#x} {} {:#x} {},{} {}x{}",
            target, level, internal_format, x, y, width, height
        ));
    }
    fn copy_tex_sub_image_2d(&mut self, target: u32, level: i32, xoffset: i32, yoffset: i32, x: i32, y: i32, width: i32, height: i32) {
        self.record(format!(
            "copy_tex_sub_image_2d {:#x} {} {},{} {},{} {}x{}",
            target, level, xoffset, yoffset, x, y, width, height
        ));
    }
    fn tex_parameter_i(&mut self, target: u32, pname: u32, value: i32) {
        self.record(format!("tex_parameter_i {:#x} {:#x} {:#x}", target, pname, value));
    }
    fn tex_parameter_f(&mut self, target: u32, pname: u32, value: f32) {
        self.record(format!("tex_parameter_f {:#x} {:#x} {}", target, pname, value));
    }
    fn generate_mipmap(&mut self, target: u32) {
        self.record(format!("generate_mipmap {:#x}", target));
    }
    fn pixel_store_i(&mut self, pname: u32, value: i32) {
        self.record(format!("pixel_store_i {:#x} {}", pname, value));
    }

    fn bind_renderbuffer(&mut self, target: u32, id: u32) {
        self.record(format!("bind_renderbuffer {:#x} {}", target, id));
    }
    fn renderbuffer_storage(&mut self, target: u32, samples: i32, internal_format: u32, width: i32, height: i32) {
        self.record(format!(
            "renderbuffer_storage {:#x} {} {:#x} {}x{}",
            target, samples, internal_format, width, height
        ));
    }
    fn bind_framebuffer(&mut self, target: u32, id: u32) {
        self.record(format!("bind_framebuffer {:#x} {}", target, id));
    }
    fn framebuffer_texture_2d(&mut self, target: u32, attachment: u32, tex_target: u32, texture: u32, level: i32) {
        self.record(format!(
            "framebuffer_texture_2d {:#x} {:#x} {:#x} {} {}",
            target, attachment, tex_target, texture, level
        ));
    }
    fn framebuffer_renderbuffer(&mut self, target: u32, attachment: u32, renderbuffer: u32) {
        self.record(format!(
            "framebuffer_renderbuffer {:#x} {:#x} {}",
            target, attachment, renderbuffer
        ));
    }
    fn check_framebuffer_status(&mut self, target: u32) -> u32 {
        self.record(format!("check_framebuffer_status {:#x}", target));
        self.framebuffer_status
    }
    fn blit_framebuffer(&mut self, width: i32, height: i32) {
        self.record(format!("blit_framebuffer {}x{}", width, height));
    }

    fn shader_source(&mut self, shader: u32, source: &str) {
        self.record(format!("shader_source {} {}", shader, source.len()));
    }
    fn compile_shader(&mut self, shader: u32) {
        self.record(format!("compile_shader {}", shader));
    }
    fn shader_compile_status(&mut self, _shader: u32) -> bool {
        self.compile_ok
    }
    fn shader_info_log(&mut self, _shader: u32) -> String {
        if self.compile_ok { String::new() } else { "mock compile failure".to_string() }
    }
    fn attach_shader(&mut self, program: u32, shader: u32) {
        self.record(format!("attach_shader {} {}", program, shader));
    }
    fn detach_shader(&mut self, program: u32, shader: u32) {
        self.record(format!("detach_shader {} {}", program, shader));
    }
    fn bind_attrib_location(&mut self, program: u32, index: u32, name: &str) {
        self.bound_attribs.insert(name.to_string(), index);
        self.record(format!("bind_attrib_location {} {} {}", program, index, name));
    }
    fn link_program(&mut self, program: u32) {
        self.record(format!("link_program {}", program));
    }
    fn program_link_status(&mut self, _program: u32) -> bool {
        self.link_ok
    }
    fn program_info_log(&mut self, _program: u32) -> String {
        if self.link_ok { String::new() } else { "mock link failure".to_string() }
    }
    fn validate_program(&mut self, program: u32) -> bool {
        self.record(format!("validate_program {}", program));
        self.link_ok
    }
    fn active_attributes(&mut self, _program: u32) -> Vec<ActiveVariable> {
        self.attributes.clone()
    }
    fn active_uniforms(&mut self, _program: u32) -> Vec<ActiveVariable> {
        self.uniforms.clone()
    }
    fn attrib_location(&mut self, _program: u32, name: &str) -> i32 {
        if let Some(index) = self.bound_attribs.get(name) {
            return *index as i32;
        }
        self.attributes
            .iter()
            .position(|a| a.name == name)
            .map(|p| p as i32)
            .unwrap_or(-1)
    }
    fn uniform_location(&mut self, _program: u32, name: &str) -> i32 {
        // Real locations are offset so fake and real never coincide
        let (base, element) = match name.find('[') {
            Some(open) => {
                let element = name[open + 1..name.len() - 1].parse::<i32>().unwrap_or(0);
                (&name[..open], element)
            }
            None => (name, 0),
        };
        self.uniforms
            .iter()
            .position(|u| u.name.trim_end_matches("[0]") == base)
            .map(|p| 1000 + (p as i32) * 100 + element)
            .unwrap_or(-1)
    }
    fn use_program(&mut self, program: u32) {
        self.record(format!("use_program {}", program));
    }

    fn uniform_iv(&mut self, location: i32, components: usize, values: &[i32]) {
        self.record(format!("uniform_iv {} {} {:?}", location, components, values));
    }
    fn uniform_fv(&mut self, location: i32, components: usize, values: &[f32]) {
        self.record(format!("uniform_fv {} {} {:?}", location, components, values));
    }
    fn uniform_matrix_fv(&mut self, location: i32, dimension: usize, values: &[f32]) {
        self.record(format!("uniform_matrix_fv {} {} {}", location, dimension, values.len()));
    }
    fn get_uniform_fv(&mut self, _program: u32, location: i32, components: usize) -> Vec<f32> {
        self.record(format!("get_uniform_fv {}", location));
        vec![0.0; components]
    }

    fn enable_vertex_attrib_array(&mut self, index: u32) {
        self.record(format!("enable_vertex_attrib_array {}", index));
    }
    fn disable_vertex_attrib_array(&mut self, index: u32) {
        self.record(format!("disable_vertex_attrib_array {}", index));
    }
    fn vertex_attrib_pointer(&mut self, index: u32, size: i32, ty: u32, normalized: bool, stride: i32, offset: usize) {
        self.record(format!(
            "vertex_attrib_pointer {} {} {:#x} {} {} {}",
            index, size, ty, normalized, stride, offset
        ));
    }
    fn vertex_attrib_4f(&mut self, index: u32, values: [f32; 4]) {
        self.record(format!("vertex_attrib_4f {} {:?}", index, values));
    }
    fn bind_vertex_array(&mut self, id: u32) {
        self.record(format!("bind_vertex_array {}", id));
    }

    fn enable(&mut self, cap: u32) {
        self.record(format!("enable {:#x}", cap));
    }
    fn disable(&mut self, cap: u32) {
        self.record(format!("disable {:#x}", cap));
    }
    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.record(format!("viewport {} {} {} {}", x, y, width, height));
    }
    fn scissor(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.record(format!("scissor {} {} {} {}", x, y, width, height));
    }
    fn clear_color(&mut self, rgba: [f32; 4]) {
        self.record(format!("clear_color {:?}", rgba));
    }
    fn clear_depth(&mut self, depth: f32) {
        self.record(format!("clear_depth {}", depth));
    }
    fn clear_stencil(&mut self, stencil: i32) {
        self.record(format!("clear_stencil {}", stencil));
    }
    fn color_mask(&mut self, mask: [bool; 4]) {
        self.record(format!("color_mask {:?}", mask));
    }
    fn depth_mask(&mut self, flag: bool) {
        self.record(format!("depth_mask {}", flag));
    }
    fn stencil_mask(&mut self, mask: u32) {
        self.record(format!("stencil_mask {:#x}", mask));
    }
    fn blend_func(&mut self, src: u32, dst: u32) {
        self.record(format!("blend_func {:#x} {:#x}", src, dst));
    }
    fn depth_func(&mut self, func: u32) {
        self.record(format!("depth_func {:#x}", func));
    }
    fn cull_face(&mut self, mode: u32) {
        self.record(format!("cull_face {:#x}", mode));
    }
    fn front_face(&mut self, mode: u32) {
        self.record(format!("front_face {:#x}", mode));
    }
    fn hint(&mut self, target: u32, mode: u32) {
        self.record(format!("hint {:#x} {:#x}", target, mode));
    }

    fn clear(&mut self, mask: u32) {
        self.record(format!("clear {:#x}", mask));
    }
    fn draw_arrays(&mut self, mode: u32, first: i32, count: i32) {
        self.record(format!("draw_arrays {:#x} {} {}", mode, first, count));
    }
    fn draw_elements(&mut self, mode: u32, count: i32, ty: u32, offset: usize) {
        self.record(format!("draw_elements {:#x} {} {:#x} {}", mode, count, ty, offset));
    }
    fn read_pixels(&mut self, x: i32, y: i32, width: i32, height: i32, _format: u32, _ty: u32, out: &mut [u8]) {
        out.fill(0x5A);
        self.record(format!("read_pixels {},{} {}x{}", x, y, width, height));
    }
    fn flush(&mut self) {
        self.record("flush".to_string());
    }
    fn finish(&mut self) {
        self.record("finish".to_string());
    }

    fn begin_query(&mut self, target: u32, id: u32) {
        self.record(format!("begin_query {:#x} {}", target, id));
    }
    fn end_query(&mut self, target: u32) {
        self.record(format!("end_query {:#x}", target));
    }
    fn query_result_available(&mut self, id: u32) -> bool {
        self.query_results.contains_key(&id)
    }
    fn query_result(&mut self, id: u32) -> u64 {
        self.query_results.get(&id).copied().unwrap_or(0)
    }
    fn fence_sync(&mut self) -> u64 {
        let fence = self.next_fence;
        self.next_fence += 1;
        self.record(format!("fence_sync {}", fence));
        fence
    }
    fn fence_signaled(&mut self, fence: u64) -> bool {
        self.signaled_fences.contains(&fence)
    }
    fn delete_fence(&mut self, fence: u64) {
        self.record(format!("delete_fence {}", fence));
    }
}

// ============================================================================
// Mock Surface
// ============================================================================

pub struct MockSurface {
    pub width: i32,
    pub height: i32,
    pub offscreen: bool,
    pub swaps: u32,
}

impl MockSurface {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height, offscreen: false, swaps: 0 }
    }
}

impl Surface for MockSurface {
    fn size(&self) -> (i32, i32) {
        (self.width, self.height)
    }

    fn is_offscreen(&self) -> bool {
        self.offscreen
    }

    fn format(&self) -> SurfaceFormat {
        SurfaceFormat::default()
    }

    fn resize(&mut self, width: i32, height: i32) -> bool {
        self.width = width;
        self.height = height;
        true
    }

    fn swap_buffers(&mut self) -> bool {
        self.swaps += 1;
        true
    }
}
