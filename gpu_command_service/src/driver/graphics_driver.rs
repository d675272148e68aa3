/// GraphicsDriver trait - the GL-like API a decoder replays commands into

/// Active attribute or uniform reported by the driver after link
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveVariable {
    /// Driver-side name (array uniforms end in `[0]`)
    pub name: String,
    /// Array size (1 for non-arrays)
    pub size: i32,
    /// GL type enum
    pub ty: u32,
}

/// One current rendering context
///
/// All methods mirror a GL entry point of the same name. The decoder validates
/// every argument before calling in, so implementations may assume valid enums
/// and in-range sizes. Errors the driver raises anyway are reported through
/// `get_error`.
pub trait GraphicsDriver: Send {
    // ===== INFO =====

    fn get_string(&mut self, name: u32) -> String;
    fn get_integer(&mut self, pname: u32) -> i32;
    fn get_error(&mut self) -> u32;
    /// NO_ERROR, or one of the *_CONTEXT_RESET values once the context is lost
    fn reset_status(&mut self) -> u32;

    // ===== OBJECT NAMES =====

    fn gen_buffer(&mut self) -> u32;
    fn delete_buffer(&mut self, id: u32);
    fn gen_texture(&mut self) -> u32;
    fn delete_texture(&mut self, id: u32);
    fn gen_framebuffer(&mut self) -> u32;
    fn delete_framebuffer(&mut self, id: u32);
    fn gen_renderbuffer(&mut self) -> u32;
    fn delete_renderbuffer(&mut self, id: u32);
    fn create_shader(&mut self, shader_type: u32) -> u32;
    fn delete_shader(&mut self, id: u32);
    fn create_program(&mut self) -> u32;
    fn delete_program(&mut self, id: u32);
    fn gen_query(&mut self) -> u32;
    fn delete_query(&mut self, id: u32);
    fn gen_vertex_array(&mut self) -> u32;
    fn delete_vertex_array(&mut self, id: u32);

    // ===== BUFFERS =====

    fn bind_buffer(&mut self, target: u32, id: u32);
    fn buffer_data(&mut self, target: u32, size: usize, data: Option<&[u8]>, usage: u32);
    fn buffer_sub_data(&mut self, target: u32, offset: usize, data: &[u8]);

    // ===== TEXTURES =====

    fn active_texture(&mut self, unit: u32);
    fn bind_texture(&mut self, target: u32, id: u32);
    #[allow(clippy::too_many_arguments)]
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
    );
    #[allow(clippy::too_many_arguments)]
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
    );
    fn compressed_tex_image_2d(
        &mut self,
        target: u32,
        level: i32,
        internal_format: u32,
        width: i32,
        height: i32,
        data: &[u8],
    );
    fn tex_storage_2d(&mut self, target: u32, levels: i32, internal_format: u32, width: i32, height: i32);
    #[allow(clippy::too_many_arguments)]
    fn copy_tex_image_2d(
        &mut self,
        target: u32,
        level: i32,
        internal_format: u32,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    );
    #[allow(clippy::too_many_arguments)]
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
    );
    fn tex_parameter_i(&mut self, target: u32, pname: u32, value: i32);
    fn tex_parameter_f(&mut self, target: u32, pname: u32, value: f32);
    fn generate_mipmap(&mut self, target: u32);
    fn pixel_store_i(&mut self, pname: u32, value: i32);

    // ===== RENDERBUFFERS / FRAMEBUFFERS =====

    fn bind_renderbuffer(&mut self, target: u32, id: u32);
    fn renderbuffer_storage(&mut self, target: u32, samples: i32, internal_format: u32, width: i32, height: i32);
    fn bind_framebuffer(&mut self, target: u32, id: u32);
    fn framebuffer_texture_2d(&mut self, target: u32, attachment: u32, tex_target: u32, texture: u32, level: i32);
    fn framebuffer_renderbuffer(&mut self, target: u32, attachment: u32, renderbuffer: u32);
    fn check_framebuffer_status(&mut self, target: u32) -> u32;
    /// Copy the read framebuffer's color into the draw framebuffer (same size)
    fn blit_framebuffer(&mut self, width: i32, height: i32);

    // ===== SHADERS / PROGRAMS =====

    fn shader_source(&mut self, shader: u32, source: &str);
    fn compile_shader(&mut self, shader: u32);
    fn shader_compile_status(&mut self, shader: u32) -> bool;
    fn shader_info_log(&mut self, shader: u32) -> String;
    fn attach_shader(&mut self, program: u32, shader: u32);
    fn detach_shader(&mut self, program: u32, shader: u32);
    fn bind_attrib_location(&mut self, program: u32, index: u32, name: &str);
    fn link_program(&mut self, program: u32);
    fn program_link_status(&mut self, program: u32) -> bool;
    fn program_info_log(&mut self, program: u32) -> String;
    fn validate_program(&mut self, program: u32) -> bool;
    fn active_attributes(&mut self, program: u32) -> Vec<ActiveVariable>;
    fn active_uniforms(&mut self, program: u32) -> Vec<ActiveVariable>;
    fn attrib_location(&mut self, program: u32, name: &str) -> i32;
    fn uniform_location(&mut self, program: u32, name: &str) -> i32;
    fn use_program(&mut self, program: u32);

    // ===== UNIFORMS =====

    fn uniform_iv(&mut self, location: i32, components: usize, values: &[i32]);
    fn uniform_fv(&mut self, location: i32, components: usize, values: &[f32]);
    fn uniform_matrix_fv(&mut self, location: i32, dimension: usize, values: &[f32]);
    fn get_uniform_fv(&mut self, program: u32, location: i32, components: usize) -> Vec<f32>;

    // ===== VERTEX ATTRIBUTES =====

    fn enable_vertex_attrib_array(&mut self, index: u32);
    fn disable_vertex_attrib_array(&mut self, index: u32);
    #[allow(clippy::too_many_arguments)]
    fn vertex_attrib_pointer(&mut self, index: u32, size: i32, ty: u32, normalized: bool, stride: i32, offset: usize);
    fn vertex_attrib_4f(&mut self, index: u32, values: [f32; 4]);
    fn bind_vertex_array(&mut self, id: u32);

    // ===== FIXED-FUNCTION STATE =====

    fn enable(&mut self, cap: u32);
    fn disable(&mut self, cap: u32);
    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32);
    fn scissor(&mut self, x: i32, y: i32, width: i32, height: i32);
    fn clear_color(&mut self, rgba: [f32; 4]);
    fn clear_depth(&mut self, depth: f32);
    fn clear_stencil(&mut self, stencil: i32);
    fn color_mask(&mut self, mask: [bool; 4]);
    fn depth_mask(&mut self, flag: bool);
    fn stencil_mask(&mut self, mask: u32);
    fn blend_func(&mut self, src: u32, dst: u32);
    fn depth_func(&mut self, func: u32);
    fn cull_face(&mut self, mode: u32);
    fn front_face(&mut self, mode: u32);
    fn hint(&mut self, target: u32, mode: u32);

    // ===== DRAWING =====

    fn clear(&mut self, mask: u32);
    fn draw_arrays(&mut self, mode: u32, first: i32, count: i32);
    fn draw_elements(&mut self, mode: u32, count: i32, ty: u32, offset: usize);
    #[allow(clippy::too_many_arguments)]
    fn read_pixels(&mut self, x: i32, y: i32, width: i32, height: i32, format: u32, ty: u32, out: &mut [u8]);
    fn flush(&mut self);
    fn finish(&mut self);

    // ===== QUERIES / FENCES =====

    fn begin_query(&mut self, target: u32, id: u32);
    fn end_query(&mut self, target: u32);
    fn query_result_available(&mut self, id: u32) -> bool;
    fn query_result(&mut self, id: u32) -> u64;
    fn fence_sync(&mut self) -> u64;
    fn fence_signaled(&mut self, fence: u64) -> bool;
    fn delete_fence(&mut self, fence: u64);
}

/// Reborrow an optional driver for one nested call, shortening the trait
/// object lifetime so the option stays usable afterwards
pub fn reborrow<'a>(driver: &'a mut Option<&mut dyn GraphicsDriver>) -> Option<&'a mut dyn GraphicsDriver> {
    match driver {
        Some(driver) => Some(&mut **driver),
        None => None,
    }
}
