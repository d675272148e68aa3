//! GL enum values and pixel-size helpers
//!
//! Only the values the service validates or forwards are listed.

pub type GLenum = u32;

// ===== ERRORS =====

pub const NO_ERROR: u32 = 0;
pub const INVALID_ENUM: u32 = 0x0500;
pub const INVALID_VALUE: u32 = 0x0501;
pub const INVALID_OPERATION: u32 = 0x0502;
pub const OUT_OF_MEMORY: u32 = 0x0505;
pub const INVALID_FRAMEBUFFER_OPERATION: u32 = 0x0506;
pub const CONTEXT_LOST: u32 = 0x0507;

// ===== RESET STATUS =====

pub const GUILTY_CONTEXT_RESET: u32 = 0x8253;
pub const INNOCENT_CONTEXT_RESET: u32 = 0x8254;
pub const UNKNOWN_CONTEXT_RESET: u32 = 0x8255;

// ===== BOOLEANS / MISC =====

pub const FALSE: u32 = 0;
pub const TRUE: u32 = 1;
pub const NONE: u32 = 0;

// ===== CLEAR BITS =====

pub const DEPTH_BUFFER_BIT: u32 = 0x0000_0100;
pub const STENCIL_BUFFER_BIT: u32 = 0x0000_0400;
pub const COLOR_BUFFER_BIT: u32 = 0x0000_4000;

// ===== DRAW MODES =====

pub const POINTS: u32 = 0x0000;
pub const LINES: u32 = 0x0001;
pub const LINE_LOOP: u32 = 0x0002;
pub const LINE_STRIP: u32 = 0x0003;
pub const TRIANGLES: u32 = 0x0004;
pub const TRIANGLE_STRIP: u32 = 0x0005;
pub const TRIANGLE_FAN: u32 = 0x0006;

// ===== BLEND / DEPTH FUNCS =====

pub const ZERO: u32 = 0;
pub const ONE: u32 = 1;
pub const SRC_COLOR: u32 = 0x0300;
pub const ONE_MINUS_SRC_COLOR: u32 = 0x0301;
pub const SRC_ALPHA: u32 = 0x0302;
pub const ONE_MINUS_SRC_ALPHA: u32 = 0x0303;
pub const DST_ALPHA: u32 = 0x0304;
pub const ONE_MINUS_DST_ALPHA: u32 = 0x0305;
pub const DST_COLOR: u32 = 0x0306;
pub const ONE_MINUS_DST_COLOR: u32 = 0x0307;
pub const SRC_ALPHA_SATURATE: u32 = 0x0308;

pub const NEVER: u32 = 0x0200;
pub const LESS: u32 = 0x0201;
pub const EQUAL: u32 = 0x0202;
pub const LEQUAL: u32 = 0x0203;
pub const GREATER: u32 = 0x0204;
pub const NOTEQUAL: u32 = 0x0205;
pub const GEQUAL: u32 = 0x0206;
pub const ALWAYS: u32 = 0x0207;

// ===== FACES =====

pub const FRONT: u32 = 0x0404;
pub const BACK: u32 = 0x0405;
pub const FRONT_AND_BACK: u32 = 0x0408;
pub const CW: u32 = 0x0900;
pub const CCW: u32 = 0x0901;

// ===== CAPABILITIES =====

pub const CULL_FACE: u32 = 0x0B44;
pub const DEPTH_TEST: u32 = 0x0B71;
pub const STENCIL_TEST: u32 = 0x0B90;
pub const DITHER: u32 = 0x0BD0;
pub const BLEND: u32 = 0x0BE2;
pub const SCISSOR_TEST: u32 = 0x0C11;
pub const POLYGON_OFFSET_FILL: u32 = 0x8037;
pub const SAMPLE_ALPHA_TO_COVERAGE: u32 = 0x809E;
pub const SAMPLE_COVERAGE: u32 = 0x80A0;

// ===== HINTS =====

pub const DONT_CARE: u32 = 0x1100;
pub const FASTEST: u32 = 0x1101;
pub const NICEST: u32 = 0x1102;
pub const GENERATE_MIPMAP_HINT: u32 = 0x8192;

// ===== TYPES =====

pub const BYTE: u32 = 0x1400;
pub const UNSIGNED_BYTE: u32 = 0x1401;
pub const SHORT: u32 = 0x1402;
pub const UNSIGNED_SHORT: u32 = 0x1403;
pub const INT: u32 = 0x1404;
pub const UNSIGNED_INT: u32 = 0x1405;
pub const FLOAT: u32 = 0x1406;
pub const FIXED: u32 = 0x140C;
pub const HALF_FLOAT_OES: u32 = 0x8D61;
pub const UNSIGNED_SHORT_4_4_4_4: u32 = 0x8033;
pub const UNSIGNED_SHORT_5_5_5_1: u32 = 0x8034;
pub const UNSIGNED_SHORT_5_6_5: u32 = 0x8363;
pub const UNSIGNED_INT_24_8: u32 = 0x84FA;

// ===== PIXEL FORMATS =====

pub const DEPTH_COMPONENT: u32 = 0x1902;
pub const ALPHA: u32 = 0x1906;
pub const RGB: u32 = 0x1907;
pub const RGBA: u32 = 0x1908;
pub const LUMINANCE: u32 = 0x1909;
pub const LUMINANCE_ALPHA: u32 = 0x190A;
pub const BGRA_EXT: u32 = 0x80E1;
pub const DEPTH_STENCIL: u32 = 0x84F9;
pub const RGBA4: u32 = 0x8056;
pub const RGB5_A1: u32 = 0x8057;
pub const RGB565: u32 = 0x8D62;
pub const RGB8_OES: u32 = 0x8051;
pub const RGBA8_OES: u32 = 0x8058;
pub const DEPTH_COMPONENT16: u32 = 0x81A5;
pub const DEPTH_COMPONENT24_OES: u32 = 0x81A6;
pub const DEPTH24_STENCIL8: u32 = 0x88F0;
pub const STENCIL_INDEX8: u32 = 0x8D48;
pub const BGRA8_EXT: u32 = 0x93A1;

pub const COMPRESSED_RGB_S3TC_DXT1_EXT: u32 = 0x83F0;
pub const COMPRESSED_RGBA_S3TC_DXT1_EXT: u32 = 0x83F1;
pub const COMPRESSED_RGBA_S3TC_DXT3_EXT: u32 = 0x83F2;
pub const COMPRESSED_RGBA_S3TC_DXT5_EXT: u32 = 0x83F3;
pub const ETC1_RGB8_OES: u32 = 0x8D64;

// ===== TEXTURES =====

pub const TEXTURE_2D: u32 = 0x0DE1;
pub const TEXTURE_CUBE_MAP: u32 = 0x8513;
pub const TEXTURE_CUBE_MAP_POSITIVE_X: u32 = 0x8515;
pub const TEXTURE_CUBE_MAP_NEGATIVE_X: u32 = 0x8516;
pub const TEXTURE_CUBE_MAP_POSITIVE_Y: u32 = 0x8517;
pub const TEXTURE_CUBE_MAP_NEGATIVE_Y: u32 = 0x8518;
pub const TEXTURE_CUBE_MAP_POSITIVE_Z: u32 = 0x8519;
pub const TEXTURE_CUBE_MAP_NEGATIVE_Z: u32 = 0x851A;
pub const TEXTURE_EXTERNAL_OES: u32 = 0x8D65;
pub const TEXTURE_RECTANGLE_ARB: u32 = 0x84F5;

pub const TEXTURE0: u32 = 0x84C0;

pub const TEXTURE_MAG_FILTER: u32 = 0x2800;
pub const TEXTURE_MIN_FILTER: u32 = 0x2801;
pub const TEXTURE_WRAP_S: u32 = 0x2802;
pub const TEXTURE_WRAP_T: u32 = 0x2803;
pub const TEXTURE_POOL_CHROMIUM: u32 = 0x6000;
pub const TEXTURE_USAGE_ANGLE: u32 = 0x93A2;
pub const TEXTURE_MAX_ANISOTROPY_EXT: u32 = 0x84FE;

pub const NEAREST: u32 = 0x2600;
pub const LINEAR: u32 = 0x2601;
pub const NEAREST_MIPMAP_NEAREST: u32 = 0x2700;
pub const LINEAR_MIPMAP_NEAREST: u32 = 0x2701;
pub const NEAREST_MIPMAP_LINEAR: u32 = 0x2702;
pub const LINEAR_MIPMAP_LINEAR: u32 = 0x2703;

pub const REPEAT: u32 = 0x2901;
pub const CLAMP_TO_EDGE: u32 = 0x812F;
pub const MIRRORED_REPEAT: u32 = 0x8370;

pub const TEXTURE_POOL_MANAGED_CHROMIUM: u32 = 0x6001;
pub const TEXTURE_POOL_UNMANAGED_CHROMIUM: u32 = 0x6002;
pub const FRAMEBUFFER_ATTACHMENT_ANGLE: u32 = 0x93A3;

// ===== PIXEL STORE =====

pub const UNPACK_ALIGNMENT: u32 = 0x0CF5;
pub const PACK_ALIGNMENT: u32 = 0x0D05;
pub const UNPACK_FLIP_Y_CHROMIUM: u32 = 0x9240;
pub const UNPACK_PREMULTIPLY_ALPHA_CHROMIUM: u32 = 0x9241;

// ===== BUFFERS =====

pub const ARRAY_BUFFER: u32 = 0x8892;
pub const ELEMENT_ARRAY_BUFFER: u32 = 0x8893;
pub const STREAM_DRAW: u32 = 0x88E0;
pub const STATIC_DRAW: u32 = 0x88E4;
pub const DYNAMIC_DRAW: u32 = 0x88E8;
pub const BUFFER_SIZE: u32 = 0x8764;
pub const BUFFER_USAGE: u32 = 0x8765;

// ===== FRAMEBUFFERS / RENDERBUFFERS =====

pub const FRAMEBUFFER: u32 = 0x8D40;
pub const RENDERBUFFER: u32 = 0x8D41;
pub const READ_FRAMEBUFFER_EXT: u32 = 0x8CA8;
pub const DRAW_FRAMEBUFFER_EXT: u32 = 0x8CA9;
pub const COLOR_ATTACHMENT0: u32 = 0x8CE0;
pub const DEPTH_ATTACHMENT: u32 = 0x8D00;
pub const STENCIL_ATTACHMENT: u32 = 0x8D20;
pub const DEPTH_STENCIL_ATTACHMENT: u32 = 0x821A;

pub const FRAMEBUFFER_COMPLETE: u32 = 0x8CD5;
pub const FRAMEBUFFER_INCOMPLETE_ATTACHMENT: u32 = 0x8CD6;
pub const FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT: u32 = 0x8CD7;
pub const FRAMEBUFFER_INCOMPLETE_DIMENSIONS: u32 = 0x8CD9;
pub const FRAMEBUFFER_UNSUPPORTED: u32 = 0x8CDD;

// ===== SHADERS / PROGRAMS =====

pub const FRAGMENT_SHADER: u32 = 0x8B30;
pub const VERTEX_SHADER: u32 = 0x8B31;
pub const SHADER_TYPE: u32 = 0x8B4F;
pub const DELETE_STATUS: u32 = 0x8B80;
pub const COMPILE_STATUS: u32 = 0x8B81;
pub const LINK_STATUS: u32 = 0x8B82;
pub const VALIDATE_STATUS: u32 = 0x8B83;
pub const INFO_LOG_LENGTH: u32 = 0x8B84;
pub const ATTACHED_SHADERS: u32 = 0x8B85;
pub const ACTIVE_UNIFORMS: u32 = 0x8B86;
pub const ACTIVE_UNIFORM_MAX_LENGTH: u32 = 0x8B87;
pub const SHADER_SOURCE_LENGTH: u32 = 0x8B88;
pub const ACTIVE_ATTRIBUTES: u32 = 0x8B89;
pub const ACTIVE_ATTRIBUTE_MAX_LENGTH: u32 = 0x8B8A;
pub const CURRENT_PROGRAM: u32 = 0x8B8D;
pub const TRANSLATED_SHADER_SOURCE_LENGTH_ANGLE: u32 = 0x93A0;

pub const FLOAT_VEC2: u32 = 0x8B50;
pub const FLOAT_VEC3: u32 = 0x8B51;
pub const FLOAT_VEC4: u32 = 0x8B52;
pub const INT_VEC2: u32 = 0x8B53;
pub const INT_VEC3: u32 = 0x8B54;
pub const INT_VEC4: u32 = 0x8B55;
pub const BOOL: u32 = 0x8B56;
pub const BOOL_VEC2: u32 = 0x8B57;
pub const BOOL_VEC3: u32 = 0x8B58;
pub const BOOL_VEC4: u32 = 0x8B59;
pub const FLOAT_MAT2: u32 = 0x8B5A;
pub const FLOAT_MAT3: u32 = 0x8B5B;
pub const FLOAT_MAT4: u32 = 0x8B5C;
pub const SAMPLER_2D: u32 = 0x8B5E;
pub const SAMPLER_CUBE: u32 = 0x8B60;
pub const SAMPLER_EXTERNAL_OES: u32 = 0x8D66;
pub const SAMPLER_2D_RECT_ARB: u32 = 0x8B63;

// ===== STRINGS =====

pub const VENDOR: u32 = 0x1F00;
pub const RENDERER: u32 = 0x1F01;
pub const VERSION: u32 = 0x1F02;
pub const EXTENSIONS: u32 = 0x1F03;
pub const SHADING_LANGUAGE_VERSION: u32 = 0x8B8C;

// ===== LIMITS / STATE QUERIES =====

pub const MAX_TEXTURE_SIZE: u32 = 0x0D33;
pub const MAX_VIEWPORT_DIMS: u32 = 0x0D3A;
pub const MAX_CUBE_MAP_TEXTURE_SIZE: u32 = 0x851C;
pub const MAX_RENDERBUFFER_SIZE: u32 = 0x84E8;
pub const MAX_VERTEX_ATTRIBS: u32 = 0x8869;
pub const MAX_TEXTURE_IMAGE_UNITS: u32 = 0x8872;
pub const MAX_VERTEX_TEXTURE_IMAGE_UNITS: u32 = 0x8B4C;
pub const MAX_COMBINED_TEXTURE_IMAGE_UNITS: u32 = 0x8B4D;
pub const MAX_FRAGMENT_UNIFORM_VECTORS: u32 = 0x8DFD;
pub const MAX_VERTEX_UNIFORM_VECTORS: u32 = 0x8DFB;
pub const MAX_VARYING_VECTORS: u32 = 0x8DFC;
pub const MAX_FRAGMENT_UNIFORM_COMPONENTS: u32 = 0x8B49;
pub const MAX_VERTEX_UNIFORM_COMPONENTS: u32 = 0x8B4A;
pub const MAX_VARYING_FLOATS: u32 = 0x8B4B;
pub const MAX_DRAW_BUFFERS_ARB: u32 = 0x8824;
pub const MAX_COLOR_ATTACHMENTS_EXT: u32 = 0x8CDF;
pub const MAX_SAMPLES_EXT: u32 = 0x8D57;

pub const VIEWPORT: u32 = 0x0BA2;
pub const SCISSOR_BOX: u32 = 0x0C10;
pub const COLOR_CLEAR_VALUE: u32 = 0x0C22;
pub const COLOR_WRITEMASK: u32 = 0x0C23;
pub const DEPTH_CLEAR_VALUE: u32 = 0x0B73;
pub const DEPTH_WRITEMASK: u32 = 0x0B72;
pub const STENCIL_CLEAR_VALUE: u32 = 0x0B91;
pub const STENCIL_WRITEMASK: u32 = 0x0B98;
pub const ACTIVE_TEXTURE: u32 = 0x84E0;
pub const ARRAY_BUFFER_BINDING: u32 = 0x8894;
pub const ELEMENT_ARRAY_BUFFER_BINDING: u32 = 0x8895;
pub const FRAMEBUFFER_BINDING: u32 = 0x8CA6;
pub const RENDERBUFFER_BINDING: u32 = 0x8CA7;
pub const TEXTURE_BINDING_2D: u32 = 0x8069;
pub const TEXTURE_BINDING_CUBE_MAP: u32 = 0x8514;
pub const VERTEX_ARRAY_BINDING_OES: u32 = 0x85B5;
pub const ALPHA_BITS: u32 = 0x0D55;
pub const DEPTH_BITS: u32 = 0x0D56;
pub const STENCIL_BITS: u32 = 0x0D57;
pub const IMPLEMENTATION_COLOR_READ_FORMAT: u32 = 0x8B9B;
pub const IMPLEMENTATION_COLOR_READ_TYPE: u32 = 0x8B9A;
pub const NUM_COMPRESSED_TEXTURE_FORMATS: u32 = 0x86A2;
pub const NUM_SHADER_BINARY_FORMATS: u32 = 0x8DF9;
pub const COMPRESSED_TEXTURE_FORMATS: u32 = 0x86A3;
pub const RED_BITS: u32 = 0x0D52;
pub const GREEN_BITS: u32 = 0x0D53;
pub const BLUE_BITS: u32 = 0x0D54;
pub const BLEND_DST_RGB: u32 = 0x80C8;
pub const BLEND_SRC_RGB: u32 = 0x80C9;
pub const DEPTH_FUNC: u32 = 0x0B74;
pub const CULL_FACE_MODE: u32 = 0x0B45;
pub const FRONT_FACE: u32 = 0x0B46;
pub const CURRENT_QUERY_EXT: u32 = 0x8865;
pub const BIND_GENERATES_RESOURCE_CHROMIUM: u32 = 0x9244;

// ===== QUERIES =====

pub const ANY_SAMPLES_PASSED_EXT: u32 = 0x8C2F;
pub const ANY_SAMPLES_PASSED_CONSERVATIVE_EXT: u32 = 0x8D6A;
pub const COMMANDS_ISSUED_CHROMIUM: u32 = 0x84F2;
pub const LATENCY_QUERY_CHROMIUM: u32 = 0x84F3;
pub const ASYNC_PIXEL_TRANSFERS_COMPLETED_CHROMIUM: u32 = 0x84F5;
pub const GET_ERROR_QUERY_CHROMIUM: u32 = 0x84F6;
pub const SAMPLES_PASSED_ARB: u32 = 0x8914;
pub const QUERY_RESULT_EXT: u32 = 0x8866;
pub const QUERY_RESULT_AVAILABLE_EXT: u32 = 0x8867;

// ===== VERTEX ATTRIBS =====

pub const VERTEX_ATTRIB_ARRAY_ENABLED: u32 = 0x8622;
pub const VERTEX_ATTRIB_ARRAY_SIZE: u32 = 0x8623;
pub const VERTEX_ATTRIB_ARRAY_STRIDE: u32 = 0x8624;
pub const VERTEX_ATTRIB_ARRAY_TYPE: u32 = 0x8625;
pub const VERTEX_ATTRIB_ARRAY_NORMALIZED: u32 = 0x886A;
pub const VERTEX_ATTRIB_ARRAY_BUFFER_BINDING: u32 = 0x889F;
pub const CURRENT_VERTEX_ATTRIB: u32 = 0x8626;

// ===== PIXEL-SIZE HELPERS =====

/// Bytes per element of a client-side pixel type, and whether the type packs
/// all components into one element.
fn type_size(ty: u32) -> Option<(u32, bool)> {
    match ty {
        UNSIGNED_BYTE => Some((1, false)),
        FLOAT => Some((4, false)),
        HALF_FLOAT_OES => Some((2, false)),
        UNSIGNED_SHORT => Some((2, false)),
        UNSIGNED_INT => Some((4, false)),
        UNSIGNED_SHORT_4_4_4_4 | UNSIGNED_SHORT_5_5_5_1 | UNSIGNED_SHORT_5_6_5 => Some((2, true)),
        UNSIGNED_INT_24_8 => Some((4, true)),
        _ => None,
    }
}

/// Number of components of a client-side pixel format
pub fn format_components(format: u32) -> Option<u32> {
    match format {
        ALPHA | LUMINANCE | DEPTH_COMPONENT => Some(1),
        LUMINANCE_ALPHA => Some(2),
        RGB => Some(3),
        RGBA | BGRA_EXT => Some(4),
        DEPTH_STENCIL => Some(1),
        _ => None,
    }
}

/// Bytes per pixel for a (format, type) pair
pub fn bytes_per_pixel(format: u32, ty: u32) -> Option<u32> {
    let (size, packed) = type_size(ty)?;
    if packed {
        return Some(size);
    }
    Some(size * format_components(format)?)
}

/// Byte size of a `width x height` image with row alignment.
///
/// The last row is not padded. Returns `None` on overflow or unknown formats.
pub fn compute_image_size(width: u32, height: u32, format: u32, ty: u32, alignment: u32) -> Option<u32> {
    if width == 0 || height == 0 {
        return Some(0);
    }
    let row = width.checked_mul(bytes_per_pixel(format, ty)?)?;
    let padded = padded_row_size(row, alignment)?;
    padded.checked_mul(height - 1)?.checked_add(row)
}

/// Round a row size up to `alignment` (1, 2, 4 or 8)
pub fn padded_row_size(row: u32, alignment: u32) -> Option<u32> {
    let alignment = alignment.max(1);
    let remainder = row % alignment;
    if remainder == 0 {
        Some(row)
    } else {
        row.checked_add(alignment - remainder)
    }
}

/// Whether an internal format is a depth or depth/stencil format
pub fn is_depth_format(internal_format: u32) -> bool {
    matches!(
        internal_format,
        DEPTH_COMPONENT | DEPTH_COMPONENT16 | DEPTH_COMPONENT24_OES | DEPTH_STENCIL | DEPTH24_STENCIL8
    )
}

/// Whether an internal format carries a stencil channel
pub fn has_stencil(internal_format: u32) -> bool {
    matches!(internal_format, DEPTH_STENCIL | DEPTH24_STENCIL8 | STENCIL_INDEX8)
}

/// Whether an internal format can be rendered to as a color attachment
pub fn is_color_renderable(internal_format: u32) -> bool {
    matches!(
        internal_format,
        RGB | RGBA | BGRA_EXT | RGBA4 | RGB5_A1 | RGB565 | RGB8_OES | RGBA8_OES | BGRA8_EXT
    )
}

/// Unsized format/type used to upload zeros into a level of this internal format
pub fn upload_format_for(internal_format: u32) -> (u32, u32) {
    match internal_format {
        RGBA8_OES | RGBA4 | RGB5_A1 => (RGBA, UNSIGNED_BYTE),
        RGB8_OES | RGB565 => (RGB, UNSIGNED_BYTE),
        BGRA8_EXT => (BGRA_EXT, UNSIGNED_BYTE),
        DEPTH_COMPONENT16 => (DEPTH_COMPONENT, UNSIGNED_SHORT),
        DEPTH_COMPONENT24_OES | DEPTH_COMPONENT => (DEPTH_COMPONENT, UNSIGNED_INT),
        DEPTH24_STENCIL8 | DEPTH_STENCIL => (DEPTH_STENCIL, UNSIGNED_INT_24_8),
        other => (other, UNSIGNED_BYTE),
    }
}

/// Whether a cube-map face target
pub fn is_cube_face(target: u32) -> bool {
    (TEXTURE_CUBE_MAP_POSITIVE_X..=TEXTURE_CUBE_MAP_NEGATIVE_Z).contains(&target)
}

/// Face index (0..6) for a level target; 0 for non-cube targets
pub fn face_index(target: u32) -> usize {
    if is_cube_face(target) {
        (target - TEXTURE_CUBE_MAP_POSITIVE_X) as usize
    } else {
        0
    }
}

/// Bind target owning a level target (cube faces map to TEXTURE_CUBE_MAP)
pub fn bind_target_for(target: u32) -> u32 {
    if is_cube_face(target) {
        TEXTURE_CUBE_MAP
    } else {
        target
    }
}

/// Byte size of a single GL vertex attribute component type
pub fn attrib_type_size(ty: u32) -> Option<u32> {
    match ty {
        BYTE | UNSIGNED_BYTE => Some(1),
        SHORT | UNSIGNED_SHORT => Some(2),
        FLOAT | FIXED | INT | UNSIGNED_INT => Some(4),
        _ => None,
    }
}

/// Number of float components per element of a uniform type
pub fn uniform_type_components(ty: u32) -> Option<u32> {
    match ty {
        FLOAT | INT | BOOL | SAMPLER_2D | SAMPLER_CUBE | SAMPLER_EXTERNAL_OES | SAMPLER_2D_RECT_ARB => Some(1),
        FLOAT_VEC2 | INT_VEC2 | BOOL_VEC2 => Some(2),
        FLOAT_VEC3 | INT_VEC3 | BOOL_VEC3 => Some(3),
        FLOAT_VEC4 | INT_VEC4 | BOOL_VEC4 | FLOAT_MAT2 => Some(4),
        FLOAT_MAT3 => Some(9),
        FLOAT_MAT4 => Some(16),
        _ => None,
    }
}

/// Whether a uniform type is a sampler
pub fn is_sampler_type(ty: u32) -> bool {
    matches!(ty, SAMPLER_2D | SAMPLER_CUBE | SAMPLER_EXTERNAL_OES | SAMPLER_2D_RECT_ARB)
}

#[cfg(test)]
#[path = "gl_tests.rs"]
mod tests;
