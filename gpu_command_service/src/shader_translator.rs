/// Shader translator seam
///
/// The service never hands client shader source straight to the driver. Each
/// compile goes through a `ShaderTranslator`, which receives the source and the
/// negotiated limits and returns translated source plus diagnostics. Real
/// translators are external; `PassthroughTranslator` performs a light syntax
/// check and returns the source unchanged.

use crate::feature::{FeatureFlags, FeatureSet};
use crate::gl;

// ===== DATA TYPES =====

/// Capability limits handed to the translator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslatorResources {
    pub max_vertex_attribs: u32,
    pub max_vertex_uniform_vectors: u32,
    pub max_varying_vectors: u32,
    pub max_vertex_texture_image_units: u32,
    pub max_combined_texture_image_units: u32,
    pub max_texture_image_units: u32,
    pub max_fragment_uniform_vectors: u32,
    pub max_draw_buffers: u32,
    pub oes_standard_derivatives: bool,
    pub oes_egl_image_external: bool,
    pub arb_texture_rectangle: bool,
}

impl TranslatorResources {
    pub fn from_features(features: &FeatureSet) -> Self {
        let limits = &features.limits;
        Self {
            max_vertex_attribs: limits.max_vertex_attribs,
            max_vertex_uniform_vectors: limits.max_vertex_uniform_vectors,
            max_varying_vectors: limits.max_varying_vectors,
            max_vertex_texture_image_units: limits.max_vertex_texture_image_units,
            max_combined_texture_image_units: limits.max_texture_units,
            max_texture_image_units: limits.max_texture_image_units,
            max_fragment_uniform_vectors: limits.max_fragment_uniform_vectors,
            max_draw_buffers: limits.max_draw_buffers,
            oes_standard_derivatives: features.has(FeatureFlags::OES_STANDARD_DERIVATIVES),
            oes_egl_image_external: features.has(FeatureFlags::OES_EGL_IMAGE_EXTERNAL),
            arb_texture_rectangle: features.has(FeatureFlags::ARB_TEXTURE_RECTANGLE),
        }
    }
}

/// Storage qualifier of a declared variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableQualifier {
    Attribute,
    Uniform,
    Varying,
}

/// A top-level `attribute`/`uniform`/`varying` declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredVariable {
    pub qualifier: VariableQualifier,
    /// GL type enum (`FLOAT_VEC4`, `SAMPLER_2D`, ...)
    pub ty: u32,
    pub name: String,
    /// Array size, 1 for non-arrays
    pub size: i32,
}

/// Result of translating one shader
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslatedShader {
    pub success: bool,
    /// Source to hand to the driver (empty on failure)
    pub translated_source: String,
    pub info_log: String,
    pub variables: Vec<DeclaredVariable>,
}

// ===== TRAIT =====

/// Translates client shader source into driver source
pub trait ShaderTranslator: Send + Sync {
    fn translate(&self, shader_type: u32, source: &str, resources: &TranslatorResources) -> TranslatedShader;
}

// ===== PASSTHROUGH =====

/// Returns source unchanged after checking for `main` and declaration limits
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughTranslator;

impl ShaderTranslator for PassthroughTranslator {
    fn translate(&self, shader_type: u32, source: &str, resources: &TranslatorResources) -> TranslatedShader {
        if !source.contains("main") {
            return TranslatedShader {
                success: false,
                info_log: "ERROR: 0:1: missing main()".to_string(),
                ..Default::default()
            };
        }

        let variables = parse_declarations(source);
        if shader_type == gl::VERTEX_SHADER {
            let attribs = variables
                .iter()
                .filter(|v| v.qualifier == VariableQualifier::Attribute)
                .count() as u32;
            if attribs > resources.max_vertex_attribs {
                return TranslatedShader {
                    success: false,
                    info_log: format!(
                        "ERROR: too many attributes ({} > {})",
                        attribs, resources.max_vertex_attribs
                    ),
                    ..Default::default()
                };
            }
        } else if variables
            .iter()
            .any(|v| v.qualifier == VariableQualifier::Attribute)
        {
            return TranslatedShader {
                success: false,
                info_log: "ERROR: attribute declared in fragment shader".to_string(),
                ..Default::default()
            };
        }

        TranslatedShader {
            success: true,
            translated_source: source.to_string(),
            info_log: String::new(),
            variables,
        }
    }
}

// ===== DECLARATION PARSER =====

fn glsl_type(name: &str) -> Option<u32> {
    Some(match name {
        "float" => gl::FLOAT,
        "vec2" => gl::FLOAT_VEC2,
        "vec3" => gl::FLOAT_VEC3,
        "vec4" => gl::FLOAT_VEC4,
        "int" => gl::INT,
        "ivec2" => gl::INT_VEC2,
        "ivec3" => gl::INT_VEC3,
        "ivec4" => gl::INT_VEC4,
        "bool" => gl::BOOL,
        "bvec2" => gl::BOOL_VEC2,
        "bvec3" => gl::BOOL_VEC3,
        "bvec4" => gl::BOOL_VEC4,
        "mat2" => gl::FLOAT_MAT2,
        "mat3" => gl::FLOAT_MAT3,
        "mat4" => gl::FLOAT_MAT4,
        "sampler2D" => gl::SAMPLER_2D,
        "samplerCube" => gl::SAMPLER_CUBE,
        "samplerExternalOES" => gl::SAMPLER_EXTERNAL_OES,
        "sampler2DRect" => gl::SAMPLER_2D_RECT_ARB,
        _ => return None,
    })
}

/// Collect top-level `attribute`, `uniform` and `varying` declarations
///
/// Handles precision qualifiers, comma-separated names and constant array
/// sizes (`uniform vec4 colors[4];`). Anything it does not understand is
/// skipped.
pub fn parse_declarations(source: &str) -> Vec<DeclaredVariable> {
    let mut variables = Vec::new();
    let stripped = strip_comments(source);

    for statement in stripped.split(';') {
        let mut tokens = statement.split_whitespace().peekable();
        let qualifier = match tokens.next() {
            Some("attribute") => VariableQualifier::Attribute,
            Some("uniform") => VariableQualifier::Uniform,
            Some("varying") => VariableQualifier::Varying,
            _ => continue,
        };
        if matches!(tokens.peek(), Some(&"lowp") | Some(&"mediump") | Some(&"highp")) {
            tokens.next();
        }
        let Some(ty) = tokens.next().and_then(glsl_type) else {
            continue;
        };
        let rest: String = tokens.collect::<Vec<_>>().join("");
        for declarator in rest.split(',') {
            let (name, size) = match declarator.find('[') {
                Some(open) => {
                    let close = declarator.find(']').unwrap_or(declarator.len());
                    let size = declarator
                        .get(open + 1..close)
                        .and_then(|s| s.parse::<i32>().ok())
                        .unwrap_or(0);
                    (&declarator[..open], size)
                }
                None => (declarator, 1),
            };
            if name.is_empty() || size <= 0 {
                continue;
            }
            variables.push(DeclaredVariable { qualifier, ty, name: name.to_string(), size });
        }
    }
    variables
}

fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("//") {
            rest = after.find('\n').map(|i| &after[i..]).unwrap_or("");
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.find("*/").map(|i| &after[i + 2..]).unwrap_or("");
            out.push(' ');
        } else if rest.starts_with('#') && (out.is_empty() || out.ends_with('\n')) {
            // Preprocessor lines are not declarations
            rest = rest.find('\n').map(|i| &rest[i..]).unwrap_or("");
        } else {
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                out.push(c);
            }
            rest = chars.as_str();
        }
    }
    out
}

#[cfg(test)]
#[path = "shader_translator_tests.rs"]
mod tests;
