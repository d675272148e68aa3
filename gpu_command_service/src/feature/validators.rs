/// Argument-domain validators
///
/// One validator per command-argument domain. Every validator starts empty and
/// rejects everything; values are added only for capabilities that are
/// actually present, first by `add_base_values` (core GLES2) and then by
/// feature negotiation.

use crate::gl;

/// Set of accepted values for one argument domain
#[derive(Debug, Clone)]
pub struct ValueValidator<T> {
    values: Vec<T>,
}

impl<T: Copy + PartialEq> ValueValidator<T> {
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    pub fn add_value(&mut self, value: T) {
        if !self.values.contains(&value) {
            self.values.push(value);
        }
    }

    pub fn add_values(&mut self, values: &[T]) {
        for value in values {
            self.add_value(*value);
        }
    }

    pub fn remove_value(&mut self, value: T) {
        self.values.retain(|v| *v != value);
    }

    pub fn is_valid(&self, value: T) -> bool {
        self.values.contains(&value)
    }

    /// Accepted values in insertion order
    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<T: Copy + PartialEq> Default for ValueValidator<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Accepted (format, type) pairs for texture uploads
#[derive(Debug, Clone, Default)]
pub struct FormatTypeValidator {
    pairs: Vec<(u32, u32)>,
}

impl FormatTypeValidator {
    pub fn add(&mut self, format: u32, ty: u32) {
        if !self.pairs.contains(&(format, ty)) {
            self.pairs.push((format, ty));
        }
    }

    pub fn is_valid(&self, format: u32, ty: u32) -> bool {
        self.pairs.contains(&(format, ty))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// All argument-domain validators of one feature set
#[derive(Debug, Clone, Default)]
pub struct Validators {
    pub attachment: ValueValidator<u32>,
    pub buffer_parameter: ValueValidator<u32>,
    pub buffer_target: ValueValidator<u32>,
    pub buffer_usage: ValueValidator<u32>,
    pub capability: ValueValidator<u32>,
    pub cmp_function: ValueValidator<u32>,
    pub compressed_texture_format: ValueValidator<u32>,
    pub draw_mode: ValueValidator<u32>,
    pub dst_blend_factor: ValueValidator<u32>,
    pub face_mode: ValueValidator<u32>,
    pub face_type: ValueValidator<u32>,
    pub frame_buffer_target: ValueValidator<u32>,
    pub g_l_state: ValueValidator<u32>,
    pub hint_mode: ValueValidator<u32>,
    pub hint_target: ValueValidator<u32>,
    pub index_type: ValueValidator<u32>,
    pub pixel_store: ValueValidator<u32>,
    pub pixel_store_alignment: ValueValidator<i32>,
    pub pixel_type: ValueValidator<u32>,
    pub program_parameter: ValueValidator<u32>,
    pub query_target: ValueValidator<u32>,
    pub read_pixel_format: ValueValidator<u32>,
    pub read_pixel_type: ValueValidator<u32>,
    pub render_buffer_format: ValueValidator<u32>,
    pub render_buffer_target: ValueValidator<u32>,
    pub shader_parameter: ValueValidator<u32>,
    pub shader_type: ValueValidator<u32>,
    pub src_blend_factor: ValueValidator<u32>,
    pub string_type: ValueValidator<u32>,
    pub texture_bind_target: ValueValidator<u32>,
    pub texture_format: ValueValidator<u32>,
    pub texture_format_type: FormatTypeValidator,
    pub texture_internal_format: ValueValidator<u32>,
    pub texture_internal_format_storage: ValueValidator<u32>,
    pub texture_mag_filter_mode: ValueValidator<u32>,
    pub texture_min_filter_mode: ValueValidator<u32>,
    pub texture_parameter: ValueValidator<u32>,
    pub texture_target: ValueValidator<u32>,
    pub texture_wrap_mode: ValueValidator<u32>,
    pub vertex_attrib_size: ValueValidator<i32>,
    pub vertex_attrib_type: ValueValidator<u32>,
}

impl Validators {
    /// Empty validators (reject everything)
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the values every GLES2 implementation supports
    pub fn add_base_values(&mut self) {
        self.attachment.add_values(&[
            gl::COLOR_ATTACHMENT0,
            gl::DEPTH_ATTACHMENT,
            gl::STENCIL_ATTACHMENT,
        ]);
        self.buffer_parameter.add_values(&[gl::BUFFER_SIZE, gl::BUFFER_USAGE]);
        self.buffer_target.add_values(&[gl::ARRAY_BUFFER, gl::ELEMENT_ARRAY_BUFFER]);
        self.buffer_usage.add_values(&[gl::STREAM_DRAW, gl::STATIC_DRAW, gl::DYNAMIC_DRAW]);
        self.capability.add_values(&[
            gl::BLEND,
            gl::CULL_FACE,
            gl::DEPTH_TEST,
            gl::DITHER,
            gl::POLYGON_OFFSET_FILL,
            gl::SAMPLE_ALPHA_TO_COVERAGE,
            gl::SAMPLE_COVERAGE,
            gl::SCISSOR_TEST,
            gl::STENCIL_TEST,
        ]);
        self.cmp_function.add_values(&[
            gl::NEVER,
            gl::LESS,
            gl::EQUAL,
            gl::LEQUAL,
            gl::GREATER,
            gl::NOTEQUAL,
            gl::GEQUAL,
            gl::ALWAYS,
        ]);
        self.draw_mode.add_values(&[
            gl::POINTS,
            gl::LINE_STRIP,
            gl::LINE_LOOP,
            gl::LINES,
            gl::TRIANGLE_STRIP,
            gl::TRIANGLE_FAN,
            gl::TRIANGLES,
        ]);
        let blend = [
            gl::ZERO,
            gl::ONE,
            gl::SRC_COLOR,
            gl::ONE_MINUS_SRC_COLOR,
            gl::DST_COLOR,
            gl::ONE_MINUS_DST_COLOR,
            gl::SRC_ALPHA,
            gl::ONE_MINUS_SRC_ALPHA,
            gl::DST_ALPHA,
            gl::ONE_MINUS_DST_ALPHA,
        ];
        self.dst_blend_factor.add_values(&blend);
        self.src_blend_factor.add_values(&blend);
        self.src_blend_factor.add_value(gl::SRC_ALPHA_SATURATE);
        self.face_mode.add_values(&[gl::CW, gl::CCW]);
        self.face_type.add_values(&[gl::FRONT, gl::BACK, gl::FRONT_AND_BACK]);
        self.frame_buffer_target.add_value(gl::FRAMEBUFFER);
        self.g_l_state.add_values(&[
            gl::ACTIVE_TEXTURE,
            gl::ALPHA_BITS,
            gl::ARRAY_BUFFER_BINDING,
            gl::BLEND,
            gl::BLEND_DST_RGB,
            gl::BLEND_SRC_RGB,
            gl::COLOR_CLEAR_VALUE,
            gl::COLOR_WRITEMASK,
            gl::CULL_FACE,
            gl::CULL_FACE_MODE,
            gl::CURRENT_PROGRAM,
            gl::DEPTH_BITS,
            gl::DEPTH_CLEAR_VALUE,
            gl::DEPTH_FUNC,
            gl::DEPTH_TEST,
            gl::DEPTH_WRITEMASK,
            gl::DITHER,
            gl::ELEMENT_ARRAY_BUFFER_BINDING,
            gl::FRAMEBUFFER_BINDING,
            gl::FRONT_FACE,
            gl::GENERATE_MIPMAP_HINT,
            gl::IMPLEMENTATION_COLOR_READ_FORMAT,
            gl::IMPLEMENTATION_COLOR_READ_TYPE,
            gl::MAX_COMBINED_TEXTURE_IMAGE_UNITS,
            gl::MAX_CUBE_MAP_TEXTURE_SIZE,
            gl::MAX_FRAGMENT_UNIFORM_VECTORS,
            gl::MAX_RENDERBUFFER_SIZE,
            gl::MAX_TEXTURE_IMAGE_UNITS,
            gl::MAX_TEXTURE_SIZE,
            gl::MAX_VARYING_VECTORS,
            gl::MAX_VERTEX_ATTRIBS,
            gl::MAX_VERTEX_TEXTURE_IMAGE_UNITS,
            gl::MAX_VERTEX_UNIFORM_VECTORS,
            gl::NUM_COMPRESSED_TEXTURE_FORMATS,
            gl::NUM_SHADER_BINARY_FORMATS,
            gl::PACK_ALIGNMENT,
            gl::POLYGON_OFFSET_FILL,
            gl::RENDERBUFFER_BINDING,
            gl::SAMPLE_ALPHA_TO_COVERAGE,
            gl::SAMPLE_COVERAGE,
            gl::SCISSOR_BOX,
            gl::SCISSOR_TEST,
            gl::STENCIL_BITS,
            gl::STENCIL_CLEAR_VALUE,
            gl::STENCIL_TEST,
            gl::STENCIL_WRITEMASK,
            gl::TEXTURE_BINDING_2D,
            gl::TEXTURE_BINDING_CUBE_MAP,
            gl::UNPACK_ALIGNMENT,
            gl::VIEWPORT,
        ]);
        self.hint_mode.add_values(&[gl::FASTEST, gl::NICEST, gl::DONT_CARE]);
        self.hint_target.add_value(gl::GENERATE_MIPMAP_HINT);
        self.index_type.add_values(&[gl::UNSIGNED_BYTE, gl::UNSIGNED_SHORT]);
        self.pixel_store.add_values(&[
            gl::PACK_ALIGNMENT,
            gl::UNPACK_ALIGNMENT,
            gl::UNPACK_FLIP_Y_CHROMIUM,
            gl::UNPACK_PREMULTIPLY_ALPHA_CHROMIUM,
        ]);
        self.pixel_store_alignment.add_values(&[1, 2, 4, 8]);
        self.pixel_type.add_values(&[
            gl::UNSIGNED_BYTE,
            gl::UNSIGNED_SHORT_5_6_5,
            gl::UNSIGNED_SHORT_4_4_4_4,
            gl::UNSIGNED_SHORT_5_5_5_1,
        ]);
        self.program_parameter.add_values(&[
            gl::DELETE_STATUS,
            gl::LINK_STATUS,
            gl::VALIDATE_STATUS,
            gl::INFO_LOG_LENGTH,
            gl::ATTACHED_SHADERS,
            gl::ACTIVE_ATTRIBUTES,
            gl::ACTIVE_ATTRIBUTE_MAX_LENGTH,
            gl::ACTIVE_UNIFORMS,
            gl::ACTIVE_UNIFORM_MAX_LENGTH,
        ]);
        self.query_target.add_values(&[
            gl::COMMANDS_ISSUED_CHROMIUM,
            gl::LATENCY_QUERY_CHROMIUM,
            gl::GET_ERROR_QUERY_CHROMIUM,
            gl::ASYNC_PIXEL_TRANSFERS_COMPLETED_CHROMIUM,
        ]);
        self.read_pixel_format.add_values(&[gl::ALPHA, gl::RGB, gl::RGBA]);
        self.read_pixel_type.add_values(&[
            gl::UNSIGNED_BYTE,
            gl::UNSIGNED_SHORT_5_6_5,
            gl::UNSIGNED_SHORT_4_4_4_4,
            gl::UNSIGNED_SHORT_5_5_5_1,
        ]);
        self.render_buffer_format.add_values(&[
            gl::RGBA4,
            gl::RGB565,
            gl::RGB5_A1,
            gl::DEPTH_COMPONENT16,
            gl::STENCIL_INDEX8,
        ]);
        self.render_buffer_target.add_value(gl::RENDERBUFFER);
        self.shader_parameter.add_values(&[
            gl::SHADER_TYPE,
            gl::DELETE_STATUS,
            gl::COMPILE_STATUS,
            gl::INFO_LOG_LENGTH,
            gl::SHADER_SOURCE_LENGTH,
            gl::TRANSLATED_SHADER_SOURCE_LENGTH_ANGLE,
        ]);
        self.shader_type.add_values(&[gl::VERTEX_SHADER, gl::FRAGMENT_SHADER]);
        self.string_type.add_values(&[
            gl::VENDOR,
            gl::RENDERER,
            gl::VERSION,
            gl::SHADING_LANGUAGE_VERSION,
            gl::EXTENSIONS,
        ]);
        self.texture_bind_target.add_values(&[gl::TEXTURE_2D, gl::TEXTURE_CUBE_MAP]);
        let formats = [gl::ALPHA, gl::LUMINANCE, gl::LUMINANCE_ALPHA, gl::RGB, gl::RGBA];
        self.texture_format.add_values(&formats);
        self.texture_internal_format.add_values(&formats);
        for format in formats {
            self.texture_format_type.add(format, gl::UNSIGNED_BYTE);
        }
        self.texture_format_type.add(gl::RGBA, gl::UNSIGNED_SHORT_4_4_4_4);
        self.texture_format_type.add(gl::RGBA, gl::UNSIGNED_SHORT_5_5_5_1);
        self.texture_format_type.add(gl::RGB, gl::UNSIGNED_SHORT_5_6_5);
        self.texture_mag_filter_mode.add_values(&[gl::NEAREST, gl::LINEAR]);
        self.texture_min_filter_mode.add_values(&[
            gl::NEAREST,
            gl::LINEAR,
            gl::NEAREST_MIPMAP_NEAREST,
            gl::LINEAR_MIPMAP_NEAREST,
            gl::NEAREST_MIPMAP_LINEAR,
            gl::LINEAR_MIPMAP_LINEAR,
        ]);
        self.texture_parameter.add_values(&[
            gl::TEXTURE_MAG_FILTER,
            gl::TEXTURE_MIN_FILTER,
            gl::TEXTURE_POOL_CHROMIUM,
            gl::TEXTURE_WRAP_S,
            gl::TEXTURE_WRAP_T,
        ]);
        self.texture_target.add_values(&[
            gl::TEXTURE_2D,
            gl::TEXTURE_CUBE_MAP_POSITIVE_X,
            gl::TEXTURE_CUBE_MAP_NEGATIVE_X,
            gl::TEXTURE_CUBE_MAP_POSITIVE_Y,
            gl::TEXTURE_CUBE_MAP_NEGATIVE_Y,
            gl::TEXTURE_CUBE_MAP_POSITIVE_Z,
            gl::TEXTURE_CUBE_MAP_NEGATIVE_Z,
        ]);
        self.texture_wrap_mode.add_values(&[gl::CLAMP_TO_EDGE, gl::MIRRORED_REPEAT, gl::REPEAT]);
        self.vertex_attrib_size.add_values(&[1, 2, 3, 4]);
        self.vertex_attrib_type.add_values(&[
            gl::BYTE,
            gl::UNSIGNED_BYTE,
            gl::SHORT,
            gl::UNSIGNED_SHORT,
            gl::FLOAT,
            gl::FIXED,
        ]);
    }
}

#[cfg(test)]
#[path = "validators_tests.rs"]
mod tests;
