//! Feature negotiation
//!
//! `FeatureSet::negotiate` is pure: it takes the driver's extension string,
//! version string, probed limits and a workaround list, and returns an
//! immutable `FeatureSet` or an error when the driver is unusable.
//! `FeatureSet::negotiate_with_driver` gathers those inputs from a
//! `GraphicsDriver` first.

use super::validators::Validators;
use super::workarounds::Workarounds;
use crate::driver::GraphicsDriver;
use crate::error::{Error, Result};
use crate::gl;
use rustc_hash::FxHashSet;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FeatureFlags: u64 {
        const NPOT_OK = 1 << 0;
        const ELEMENT_INDEX_UINT = 1 << 1;
        const DEPTH_TEXTURE = 1 << 2;
        const PACKED_DEPTH24_STENCIL8 = 1 << 3;
        const RGB8_RGBA8 = 1 << 4;
        const TEXTURE_FORMAT_BGRA8888 = 1 << 5;
        const READ_FORMAT_BGRA = 1 << 6;
        const OES_STANDARD_DERIVATIVES = 1 << 7;
        const ENABLE_TEXTURE_FLOAT = 1 << 8;
        const ENABLE_TEXTURE_FLOAT_LINEAR = 1 << 9;
        const ENABLE_TEXTURE_HALF_FLOAT = 1 << 10;
        const ENABLE_TEXTURE_HALF_FLOAT_LINEAR = 1 << 11;
        const CHROMIUM_FRAMEBUFFER_MULTISAMPLE = 1 << 12;
        const OCCLUSION_QUERY_BOOLEAN = 1 << 13;
        const USE_ARB_OCCLUSION_QUERY_FOR_OCCLUSION_QUERY_BOOLEAN = 1 << 14;
        const USE_ARB_OCCLUSION_QUERY2_FOR_OCCLUSION_QUERY_BOOLEAN = 1 << 15;
        const NATIVE_VERTEX_ARRAY_OBJECT = 1 << 16;
        const TEXTURE_STORAGE = 1 << 17;
        const COMPRESSED_TEXTURE_S3TC = 1 << 18;
        const COMPRESSED_TEXTURE_ETC1 = 1 << 19;
        const TEXTURE_FILTER_ANISOTROPIC = 1 << 20;
        const ANGLE_TEXTURE_USAGE = 1 << 21;
        const OES_EGL_IMAGE_EXTERNAL = 1 << 22;
        const ARB_TEXTURE_RECTANGLE = 1 << 23;
    }
}

// ===== INPUTS =====

/// Features a client is not allowed to see, even if the driver has them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisallowedFeatures {
    pub multisampling: bool,
    /// Client-facing extension tokens that must not be advertised
    pub extensions: FxHashSet<String>,
}

impl DisallowedFeatures {
    pub fn disallow(mut self, extension: &str) -> Self {
        self.extensions.insert(extension.to_string());
        self
    }
}

/// Parsed driver version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlVersionInfo {
    pub is_es: bool,
    pub major: u32,
    pub minor: u32,
}

impl GlVersionInfo {
    /// Parse `"OpenGL ES 2.0 ..."` or a desktop `"4.6.0 Vendor"` string
    pub fn parse(version: &str) -> Option<Self> {
        let trimmed = version.trim();
        let (is_es, rest) = match trimmed.strip_prefix("OpenGL ES") {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let number = rest
            .split_whitespace()
            .find(|token| token.starts_with(|c: char| c.is_ascii_digit()))?;
        let mut parts = number.split('.');
        let major = parts.next()?.parse::<u32>().ok()?;
        let minor = parts
            .next()
            .map(|m| m.chars().take_while(|c| c.is_ascii_digit()).collect::<String>())
            .and_then(|m| m.parse::<u32>().ok())
            .unwrap_or(0);
        Some(Self { is_es, major, minor })
    }

    pub fn is_desktop(&self) -> bool {
        !self.is_es
    }
}

/// Raw limits as reported by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverLimits {
    pub max_texture_size: i32,
    pub max_cube_map_texture_size: i32,
    pub max_renderbuffer_size: i32,
    pub max_vertex_attribs: i32,
    pub max_texture_units: i32,
    pub max_texture_image_units: i32,
    pub max_vertex_texture_image_units: i32,
    pub max_fragment_uniform_vectors: i32,
    pub max_vertex_uniform_vectors: i32,
    pub max_varying_vectors: i32,
    pub max_draw_buffers: i32,
    pub max_color_attachments: i32,
    pub max_samples: i32,
}

impl DriverLimits {
    /// Probe limits from a driver
    ///
    /// Desktop drivers report uniform and varying limits in components; these
    /// are converted to vec4 counts.
    pub fn query(driver: &mut dyn GraphicsDriver, version: &GlVersionInfo) -> Self {
        let (fragment_uniforms, vertex_uniforms, varyings) = if version.is_desktop() {
            (
                driver.get_integer(gl::MAX_FRAGMENT_UNIFORM_COMPONENTS) / 4,
                driver.get_integer(gl::MAX_VERTEX_UNIFORM_COMPONENTS) / 4,
                driver.get_integer(gl::MAX_VARYING_FLOATS) / 4,
            )
        } else {
            (
                driver.get_integer(gl::MAX_FRAGMENT_UNIFORM_VECTORS),
                driver.get_integer(gl::MAX_VERTEX_UNIFORM_VECTORS),
                driver.get_integer(gl::MAX_VARYING_VECTORS),
            )
        };
        Self {
            max_texture_size: driver.get_integer(gl::MAX_TEXTURE_SIZE),
            max_cube_map_texture_size: driver.get_integer(gl::MAX_CUBE_MAP_TEXTURE_SIZE),
            max_renderbuffer_size: driver.get_integer(gl::MAX_RENDERBUFFER_SIZE),
            max_vertex_attribs: driver.get_integer(gl::MAX_VERTEX_ATTRIBS),
            max_texture_units: driver.get_integer(gl::MAX_COMBINED_TEXTURE_IMAGE_UNITS),
            max_texture_image_units: driver.get_integer(gl::MAX_TEXTURE_IMAGE_UNITS),
            max_vertex_texture_image_units: driver.get_integer(gl::MAX_VERTEX_TEXTURE_IMAGE_UNITS),
            max_fragment_uniform_vectors: fragment_uniforms,
            max_vertex_uniform_vectors: vertex_uniforms,
            max_varying_vectors: varyings,
            max_draw_buffers: driver.get_integer(gl::MAX_DRAW_BUFFERS_ARB),
            max_color_attachments: driver.get_integer(gl::MAX_COLOR_ATTACHMENTS_EXT),
            max_samples: driver.get_integer(gl::MAX_SAMPLES_EXT),
        }
    }
}

// ===== LIMITS =====

const MIN_TEXTURE_SIZE: i32 = 2048;
const MIN_CUBE_MAP_SIZE: i32 = 256;
const MIN_RENDERBUFFER_SIZE: i32 = 512;
const MIN_VERTEX_ATTRIBS: i32 = 8;
const MIN_TEXTURE_UNITS: i32 = 8;
const MIN_TEXTURE_IMAGE_UNITS: i32 = 8;
const MIN_VERTEX_TEXTURE_IMAGE_UNITS: i32 = 0;
const MIN_FRAGMENT_UNIFORM_VECTORS: i32 = 16;
const MIN_VERTEX_UNIFORM_VECTORS: i32 = 128;
const MIN_VARYING_VECTORS: i32 = 8;

/// Limits after policy clamps, all at or above the required minimums
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_texture_size: u32,
    pub max_cube_map_texture_size: u32,
    pub max_renderbuffer_size: u32,
    pub max_vertex_attribs: u32,
    pub max_texture_units: u32,
    pub max_texture_image_units: u32,
    pub max_vertex_texture_image_units: u32,
    pub max_fragment_uniform_vectors: u32,
    pub max_vertex_uniform_vectors: u32,
    pub max_varying_vectors: u32,
    pub max_draw_buffers: u32,
    pub max_color_attachments: u32,
    pub max_samples: u32,
}

fn check_min(name: &str, value: i32, minimum: i32) -> Result<u32> {
    if value < minimum {
        crate::gpu_error!(
            "gpu::FeatureSet",
            "{} is {} but at least {} is required",
            name,
            value,
            minimum
        );
        return Err(Error::InitializationFailed(format!(
            "{} too small ({} < {})",
            name, value, minimum
        )));
    }
    Ok(value as u32)
}

impl Limits {
    /// Clamp driver limits with workaround policy and check required minimums
    pub fn validate(driver: &DriverLimits, workarounds: Workarounds, multisampling: bool) -> Result<Self> {
        let mut max_texture_size = driver.max_texture_size;
        if workarounds.contains(Workarounds::MAX_TEXTURE_SIZE_LIMIT_4096) {
            max_texture_size = max_texture_size.min(4096);
        }
        let mut max_cube_map_texture_size = driver.max_cube_map_texture_size;
        if workarounds.contains(Workarounds::MAX_CUBE_MAP_TEXTURE_SIZE_LIMIT_1024) {
            max_cube_map_texture_size = max_cube_map_texture_size.min(1024);
        }
        let mut max_varying_vectors = driver.max_varying_vectors;
        if workarounds.contains(Workarounds::MAX_VARYING_VECTORS_LIMIT_16) {
            max_varying_vectors = max_varying_vectors.min(16);
        }

        Ok(Self {
            max_texture_size: check_min("MAX_TEXTURE_SIZE", max_texture_size, MIN_TEXTURE_SIZE)?,
            max_cube_map_texture_size: check_min(
                "MAX_CUBE_MAP_TEXTURE_SIZE",
                max_cube_map_texture_size,
                MIN_CUBE_MAP_SIZE,
            )?,
            max_renderbuffer_size: check_min(
                "MAX_RENDERBUFFER_SIZE",
                driver.max_renderbuffer_size,
                MIN_RENDERBUFFER_SIZE,
            )?,
            max_vertex_attribs: check_min("MAX_VERTEX_ATTRIBS", driver.max_vertex_attribs, MIN_VERTEX_ATTRIBS)?,
            max_texture_units: check_min(
                "MAX_COMBINED_TEXTURE_IMAGE_UNITS",
                driver.max_texture_units,
                MIN_TEXTURE_UNITS,
            )?,
            max_texture_image_units: check_min(
                "MAX_TEXTURE_IMAGE_UNITS",
                driver.max_texture_image_units,
                MIN_TEXTURE_IMAGE_UNITS,
            )?,
            max_vertex_texture_image_units: check_min(
                "MAX_VERTEX_TEXTURE_IMAGE_UNITS",
                driver.max_vertex_texture_image_units,
                MIN_VERTEX_TEXTURE_IMAGE_UNITS,
            )?,
            max_fragment_uniform_vectors: check_min(
                "MAX_FRAGMENT_UNIFORM_VECTORS",
                driver.max_fragment_uniform_vectors,
                MIN_FRAGMENT_UNIFORM_VECTORS,
            )?,
            max_vertex_uniform_vectors: check_min(
                "MAX_VERTEX_UNIFORM_VECTORS",
                driver.max_vertex_uniform_vectors,
                MIN_VERTEX_UNIFORM_VECTORS,
            )?,
            max_varying_vectors: check_min("MAX_VARYING_VECTORS", max_varying_vectors, MIN_VARYING_VECTORS)?,
            max_draw_buffers: driver.max_draw_buffers.max(1) as u32,
            max_color_attachments: driver.max_color_attachments.max(1) as u32,
            max_samples: if multisampling { driver.max_samples.max(0) as u32 } else { 0 },
        })
    }
}

// ===== FEATURE SET =====

/// Immutable result of negotiation, shared read-only by every decoder of a group
#[derive(Debug, Clone)]
pub struct FeatureSet {
    pub flags: FeatureFlags,
    pub validators: Validators,
    pub workarounds: Workarounds,
    pub limits: Limits,
    pub gl_version: GlVersionInfo,
    extensions: Vec<String>,
}

/// Accumulates client-facing extension tokens during negotiation
struct ExtensionBuilder<'a> {
    driver: FxHashSet<&'a str>,
    disallowed: &'a DisallowedFeatures,
    advertised: Vec<String>,
}

impl<'a> ExtensionBuilder<'a> {
    fn has(&self, token: &str) -> bool {
        self.driver.contains(token)
    }

    fn allowed(&self, token: &str) -> bool {
        !self.disallowed.extensions.contains(token)
    }

    fn add(&mut self, token: &str) {
        if self.allowed(token) && !self.advertised.iter().any(|t| t == token) {
            self.advertised.push(token.to_string());
        }
    }
}

impl FeatureSet {
    /// Negotiate a feature set from raw driver data
    ///
    /// # Errors
    ///
    /// Returns `InitializationFailed` if the version string cannot be parsed,
    /// the driver predates programmable shading, or a limit is below its
    /// required minimum after clamping.
    pub fn negotiate(
        disallowed: &DisallowedFeatures,
        driver_extensions: &str,
        driver_version: &str,
        workaround_list: &str,
        driver_limits: &DriverLimits,
    ) -> Result<Self> {
        let gl_version = GlVersionInfo::parse(driver_version).ok_or_else(|| {
            crate::gpu_error!("gpu::FeatureSet", "Unparsable GL version '{}'", driver_version);
            Error::InitializationFailed(format!("unparsable GL version '{}'", driver_version))
        })?;
        if gl_version.major < 2 {
            crate::gpu_error!("gpu::FeatureSet", "GL {}.{} is too old", gl_version.major, gl_version.minor);
            return Err(Error::InitializationFailed(format!(
                "GL {}.{} lacks programmable shading",
                gl_version.major, gl_version.minor
            )));
        }

        let workarounds = Workarounds::parse(workaround_list);
        let mut validators = Validators::new();
        validators.add_base_values();
        let mut flags = FeatureFlags::empty();
        let desktop = gl_version.is_desktop();

        let mut ext = ExtensionBuilder {
            driver: driver_extensions.split_whitespace().collect(),
            disallowed,
            advertised: Vec::new(),
        };

        // Always exposed, implemented in the service
        for token in [
            "GL_ANGLE_translated_shader_source",
            "GL_CHROMIUM_async_pixel_transfers",
            "GL_CHROMIUM_bind_uniform_location",
            "GL_CHROMIUM_command_buffer_query",
            "GL_CHROMIUM_command_buffer_latency_query",
            "GL_CHROMIUM_get_error_query",
            "GL_CHROMIUM_lose_context",
            "GL_CHROMIUM_resize",
            "GL_CHROMIUM_resource_safe",
            "GL_CHROMIUM_strict_attribs",
            "GL_CHROMIUM_texture_mailbox",
            "GL_CHROMIUM_shared_ids",
        ] {
            ext.add(token);
        }

        if desktop || ext.has("GL_OES_element_index_uint") {
            ext.add("GL_OES_element_index_uint");
            if ext.allowed("GL_OES_element_index_uint") {
                flags |= FeatureFlags::ELEMENT_INDEX_UINT;
                validators.index_type.add_value(gl::UNSIGNED_INT);
            }
        }

        if (desktop || ext.has("GL_ARB_texture_non_power_of_two") || ext.has("GL_OES_texture_npot"))
            && ext.allowed("GL_OES_texture_npot")
        {
            ext.add("GL_OES_texture_npot");
            flags |= FeatureFlags::NPOT_OK;
        }

        let s3tc = ext.has("GL_EXT_texture_compression_s3tc")
            || (ext.has("GL_EXT_texture_compression_dxt1")
                && ext.has("GL_ANGLE_texture_compression_dxt3")
                && ext.has("GL_ANGLE_texture_compression_dxt5"));
        if s3tc && ext.allowed("GL_EXT_texture_compression_dxt1") {
            ext.add("GL_EXT_texture_compression_dxt1");
            ext.add("GL_CHROMIUM_texture_compression_dxt3");
            ext.add("GL_CHROMIUM_texture_compression_dxt5");
            flags |= FeatureFlags::COMPRESSED_TEXTURE_S3TC;
            validators.compressed_texture_format.add_values(&[
                gl::COMPRESSED_RGB_S3TC_DXT1_EXT,
                gl::COMPRESSED_RGBA_S3TC_DXT1_EXT,
                gl::COMPRESSED_RGBA_S3TC_DXT3_EXT,
                gl::COMPRESSED_RGBA_S3TC_DXT5_EXT,
            ]);
        }

        if ext.has("GL_OES_compressed_ETC1_RGB8_texture") && ext.allowed("GL_OES_compressed_ETC1_RGB8_texture") {
            ext.add("GL_OES_compressed_ETC1_RGB8_texture");
            flags |= FeatureFlags::COMPRESSED_TEXTURE_ETC1;
            validators.compressed_texture_format.add_value(gl::ETC1_RGB8_OES);
        }

        if ext.has("GL_EXT_texture_filter_anisotropic") && ext.allowed("GL_EXT_texture_filter_anisotropic") {
            ext.add("GL_EXT_texture_filter_anisotropic");
            flags |= FeatureFlags::TEXTURE_FILTER_ANISOTROPIC;
            validators.texture_parameter.add_value(gl::TEXTURE_MAX_ANISOTROPY_EXT);
        }

        // A driver-native depth texture extension is surfaced under a
        // service-owned name so the client sees one stable token
        let depth_texture = (ext.has("GL_ARB_depth_texture")
            || ext.has("GL_OES_depth_texture")
            || ext.has("GL_ANGLE_depth_texture"))
            && !workarounds.contains(Workarounds::DISABLE_DEPTH_TEXTURE)
            && ext.allowed("GL_CHROMIUM_depth_texture");
        if depth_texture {
            ext.add("GL_CHROMIUM_depth_texture");
            ext.add("GL_GOOGLE_depth_texture");
            flags |= FeatureFlags::DEPTH_TEXTURE;
            validators.texture_format.add_value(gl::DEPTH_COMPONENT);
            validators.texture_internal_format.add_value(gl::DEPTH_COMPONENT);
            validators.pixel_type.add_values(&[gl::UNSIGNED_SHORT, gl::UNSIGNED_INT]);
            validators.texture_format_type.add(gl::DEPTH_COMPONENT, gl::UNSIGNED_SHORT);
            validators.texture_format_type.add(gl::DEPTH_COMPONENT, gl::UNSIGNED_INT);
        }

        if (ext.has("GL_EXT_packed_depth_stencil") || ext.has("GL_OES_packed_depth_stencil"))
            && ext.allowed("GL_OES_packed_depth_stencil")
        {
            ext.add("GL_OES_packed_depth_stencil");
            flags |= FeatureFlags::PACKED_DEPTH24_STENCIL8;
            validators.render_buffer_format.add_value(gl::DEPTH24_STENCIL8);
            validators.attachment.add_value(gl::DEPTH_STENCIL_ATTACHMENT);
            if depth_texture {
                validators.texture_format.add_value(gl::DEPTH_STENCIL);
                validators.texture_internal_format.add_value(gl::DEPTH_STENCIL);
                validators.pixel_type.add_value(gl::UNSIGNED_INT_24_8);
                validators.texture_format_type.add(gl::DEPTH_STENCIL, gl::UNSIGNED_INT_24_8);
            }
        }

        if (desktop || ext.has("GL_OES_rgb8_rgba8")) && ext.allowed("GL_OES_rgb8_rgba8") {
            ext.add("GL_OES_rgb8_rgba8");
            flags |= FeatureFlags::RGB8_RGBA8;
            validators.render_buffer_format.add_values(&[gl::RGB8_OES, gl::RGBA8_OES]);
        }

        if (desktop
            || ext.has("GL_EXT_texture_format_BGRA8888")
            || ext.has("GL_APPLE_texture_format_BGRA8888"))
            && ext.allowed("GL_EXT_texture_format_BGRA8888")
        {
            ext.add("GL_EXT_texture_format_BGRA8888");
            flags |= FeatureFlags::TEXTURE_FORMAT_BGRA8888;
            validators.texture_format.add_value(gl::BGRA_EXT);
            validators.texture_internal_format.add_value(gl::BGRA_EXT);
            validators.texture_format_type.add(gl::BGRA_EXT, gl::UNSIGNED_BYTE);
        }

        if (desktop || ext.has("GL_EXT_read_format_bgra")) && ext.allowed("GL_EXT_read_format_bgra") {
            ext.add("GL_EXT_read_format_bgra");
            flags |= FeatureFlags::READ_FORMAT_BGRA;
            validators.read_pixel_format.add_value(gl::BGRA_EXT);
        }

        if (desktop || ext.has("GL_OES_standard_derivatives")) && ext.allowed("GL_OES_standard_derivatives") {
            ext.add("GL_OES_standard_derivatives");
            flags |= FeatureFlags::OES_STANDARD_DERIVATIVES;
        }

        if (ext.has("GL_ARB_texture_float") || ext.has("GL_OES_texture_float"))
            && ext.allowed("GL_OES_texture_float")
        {
            ext.add("GL_OES_texture_float");
            flags |= FeatureFlags::ENABLE_TEXTURE_FLOAT;
            validators.pixel_type.add_value(gl::FLOAT);
            validators.read_pixel_type.add_value(gl::FLOAT);
            for format in [gl::ALPHA, gl::LUMINANCE, gl::LUMINANCE_ALPHA, gl::RGB, gl::RGBA] {
                validators.texture_format_type.add(format, gl::FLOAT);
            }
            if ext.has("GL_ARB_texture_float") || ext.has("GL_OES_texture_float_linear") {
                ext.add("GL_OES_texture_float_linear");
                flags |= FeatureFlags::ENABLE_TEXTURE_FLOAT_LINEAR;
            }
        }

        if (ext.has("GL_ARB_texture_float") || ext.has("GL_OES_texture_half_float"))
            && ext.allowed("GL_OES_texture_half_float")
        {
            ext.add("GL_OES_texture_half_float");
            flags |= FeatureFlags::ENABLE_TEXTURE_HALF_FLOAT;
            validators.pixel_type.add_value(gl::HALF_FLOAT_OES);
            for format in [gl::ALPHA, gl::LUMINANCE, gl::LUMINANCE_ALPHA, gl::RGB, gl::RGBA] {
                validators.texture_format_type.add(format, gl::HALF_FLOAT_OES);
            }
            if ext.has("GL_ARB_texture_float") || ext.has("GL_OES_texture_half_float_linear") {
                ext.add("GL_OES_texture_half_float_linear");
                flags |= FeatureFlags::ENABLE_TEXTURE_HALF_FLOAT_LINEAR;
            }
        }

        let multisampling = (ext.has("GL_EXT_framebuffer_multisample")
            || ext.has("GL_ANGLE_framebuffer_multisample"))
            && !disallowed.multisampling
            && !workarounds.contains(Workarounds::DISABLE_MULTISAMPLING)
            && ext.allowed("GL_CHROMIUM_framebuffer_multisample");
        if multisampling {
            ext.add("GL_CHROMIUM_framebuffer_multisample");
            flags |= FeatureFlags::CHROMIUM_FRAMEBUFFER_MULTISAMPLE;
            validators.frame_buffer_target.add_values(&[gl::READ_FRAMEBUFFER_EXT, gl::DRAW_FRAMEBUFFER_EXT]);
            validators.g_l_state.add_value(gl::MAX_SAMPLES_EXT);
        }

        // Boolean occlusion queries, emulated with counting queries when the
        // driver only has the ARB variants
        if ext.allowed("GL_EXT_occlusion_query_boolean") {
            let native = ext.has("GL_EXT_occlusion_query_boolean");
            let arb2 = ext.has("GL_ARB_occlusion_query2");
            let arb = ext.has("GL_ARB_occlusion_query");
            if native || arb2 || arb {
                ext.add("GL_EXT_occlusion_query_boolean");
                flags |= FeatureFlags::OCCLUSION_QUERY_BOOLEAN;
                validators
                    .query_target
                    .add_values(&[gl::ANY_SAMPLES_PASSED_EXT, gl::ANY_SAMPLES_PASSED_CONSERVATIVE_EXT]);
                if !native {
                    if arb2 {
                        flags |= FeatureFlags::USE_ARB_OCCLUSION_QUERY2_FOR_OCCLUSION_QUERY_BOOLEAN;
                    } else {
                        flags |= FeatureFlags::USE_ARB_OCCLUSION_QUERY_FOR_OCCLUSION_QUERY_BOOLEAN;
                    }
                }
            }
        }

        if ext.has("GL_OES_vertex_array_object")
            || ext.has("GL_ARB_vertex_array_object")
            || ext.has("GL_APPLE_vertex_array_object")
        {
            flags |= FeatureFlags::NATIVE_VERTEX_ARRAY_OBJECT;
        }
        // Emulated when the driver lacks it
        ext.add("GL_OES_vertex_array_object");
        validators.g_l_state.add_value(gl::VERTEX_ARRAY_BINDING_OES);

        if (ext.has("GL_EXT_texture_storage") || ext.has("GL_ARB_texture_storage"))
            && ext.allowed("GL_EXT_texture_storage")
        {
            ext.add("GL_EXT_texture_storage");
            flags |= FeatureFlags::TEXTURE_STORAGE;
            validators.texture_internal_format_storage.add_values(&[
                gl::RGB565,
                gl::RGBA4,
                gl::RGB5_A1,
                gl::ALPHA,
                gl::LUMINANCE,
                gl::LUMINANCE_ALPHA,
                gl::RGB8_OES,
                gl::RGBA8_OES,
            ]);
            if flags.contains(FeatureFlags::TEXTURE_FORMAT_BGRA8888) {
                validators.texture_internal_format_storage.add_value(gl::BGRA8_EXT);
            }
            if depth_texture {
                validators
                    .texture_internal_format_storage
                    .add_values(&[gl::DEPTH_COMPONENT16, gl::DEPTH_COMPONENT24_OES]);
                if flags.contains(FeatureFlags::PACKED_DEPTH24_STENCIL8) {
                    validators.texture_internal_format_storage.add_value(gl::DEPTH24_STENCIL8);
                }
            }
        }

        if ext.has("GL_ANGLE_texture_usage") && ext.allowed("GL_ANGLE_texture_usage") {
            ext.add("GL_ANGLE_texture_usage");
            flags |= FeatureFlags::ANGLE_TEXTURE_USAGE;
            validators.texture_parameter.add_value(gl::TEXTURE_USAGE_ANGLE);
        }

        if ext.has("GL_OES_EGL_image_external") && ext.allowed("GL_OES_EGL_image_external") {
            ext.add("GL_OES_EGL_image_external");
            flags |= FeatureFlags::OES_EGL_IMAGE_EXTERNAL;
            validators.texture_bind_target.add_value(gl::TEXTURE_EXTERNAL_OES);
        }

        if ext.has("GL_ARB_texture_rectangle") && ext.allowed("GL_ARB_texture_rectangle") {
            ext.add("GL_ARB_texture_rectangle");
            flags |= FeatureFlags::ARB_TEXTURE_RECTANGLE;
            validators.texture_bind_target.add_value(gl::TEXTURE_RECTANGLE_ARB);
        }

        let limits = Limits::validate(driver_limits, workarounds, multisampling)?;
        let extensions = ext.advertised;

        crate::gpu_debug!(
            "gpu::FeatureSet",
            "Negotiated {} extensions, workarounds {:?}",
            extensions.len(),
            workarounds.names()
        );

        Ok(Self { flags, validators, workarounds, limits, gl_version, extensions })
    }

    /// Negotiate using the strings and limits reported by `driver`
    pub fn negotiate_with_driver(
        disallowed: &DisallowedFeatures,
        driver: &mut dyn GraphicsDriver,
        workaround_list: &str,
    ) -> Result<Self> {
        let extensions = driver.get_string(gl::EXTENSIONS);
        let version = driver.get_string(gl::VERSION);
        let parsed = GlVersionInfo::parse(&version)
            .ok_or_else(|| Error::InitializationFailed(format!("unparsable GL version '{}'", version)))?;
        let limits = DriverLimits::query(driver, &parsed);
        Self::negotiate(disallowed, &extensions, &version, workaround_list, &limits)
    }

    pub fn has(&self, flag: FeatureFlags) -> bool {
        self.flags.contains(flag)
    }

    pub fn has_extension(&self, token: &str) -> bool {
        self.extensions.iter().any(|t| t == token)
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Space-separated client-visible extension string, rebuilt from the
    /// negotiated set (never the driver's raw string)
    pub fn extensions_string(&self) -> String {
        self.extensions.join(" ")
    }

    /// Whether a later group member asking for `disallowed` is compatible
    pub fn is_compatible_with(&self, disallowed: &DisallowedFeatures) -> bool {
        if disallowed.multisampling && self.has(FeatureFlags::CHROMIUM_FRAMEBUFFER_MULTISAMPLE) {
            return false;
        }
        !self.extensions.iter().any(|t| disallowed.extensions.contains(t))
    }
}

#[cfg(test)]
#[path = "feature_info_tests.rs"]
mod tests;
