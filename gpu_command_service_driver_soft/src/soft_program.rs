/// Shaders and programs of the software driver
///
/// Compilation only scans top-level `attribute` and `uniform` declarations;
/// a source without `main` fails. Linking assigns attribute locations (bound
/// names first, then the lowest free index) and gives every uniform element
/// its own consecutive location. Uniform values live in the program as
/// floats.

use gpu_command_service::gpu::driver::ActiveVariable;
use gpu_command_service::gpu::gl;
use rustc_hash::FxHashMap;

/// Parsed `attribute`/`uniform` declaration
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub uniform: bool,
    pub ty: u32,
    pub name: String,
    pub size: i32,
}

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

/// Split `name[N]` into `(name, N)`
fn split_array(token: &str) -> Result<(&str, i32), String> {
    match token.find('[') {
        None => Ok((token, 1)),
        Some(open) => {
            let size = token[open + 1..]
                .trim_end_matches(']')
                .trim()
                .parse::<i32>()
                .map_err(|_| format!("bad array size in '{}'", token))?;
            if size < 1 {
                return Err(format!("array size must be positive in '{}'", token));
            }
            Ok((&token[..open], size))
        }
    }
}

/// Scan top-level declarations
pub fn scan_declarations(source: &str) -> Result<Vec<Declaration>, String> {
    let mut declarations = Vec::new();
    for statement in source.split(|c| c == ';' || c == '{' || c == '}') {
        let tokens: Vec<&str> = statement
            .split_whitespace()
            .filter(|t| !matches!(*t, "lowp" | "mediump" | "highp" | "precision"))
            .collect();
        let uniform = match tokens.first() {
            Some(&"uniform") => true,
            Some(&"attribute") => false,
            _ => continue,
        };
        let [_, ty, names @ ..] = tokens.as_slice() else {
            return Err(format!("incomplete declaration '{}'", statement.trim()));
        };
        let ty = glsl_type(ty).ok_or_else(|| format!("unknown type '{}'", ty))?;
        for name in names.join(" ").split(',') {
            let (name, size) = split_array(name.trim())?;
            if name.is_empty() {
                return Err("missing declaration name".to_string());
            }
            declarations.push(Declaration { uniform, ty, name: name.to_string(), size });
        }
    }
    Ok(declarations)
}

// ===== SHADER =====

#[derive(Debug, Clone)]
pub struct SoftShader {
    pub shader_type: u32,
    pub source: String,
    pub compiled: bool,
    pub info_log: String,
    pub declarations: Vec<Declaration>,
    /// Deleted while attached; dropped once the last program lets go
    pub delete_pending: bool,
}

impl SoftShader {
    pub fn new(shader_type: u32) -> Self {
        Self {
            shader_type,
            source: String::new(),
            compiled: false,
            info_log: String::new(),
            declarations: Vec::new(),
            delete_pending: false,
        }
    }

    pub fn compile(&mut self) {
        let result = if self.source.contains("main") {
            scan_declarations(&self.source)
        } else {
            Err("'main' : function not defined".to_string())
        };
        match result {
            Ok(declarations) => {
                let attribute_in_fragment =
                    self.shader_type == gl::FRAGMENT_SHADER && declarations.iter().any(|d| !d.uniform);
                if attribute_in_fragment {
                    self.fail("'attribute' : not supported in fragment shaders".to_string());
                } else {
                    self.compiled = true;
                    self.info_log.clear();
                    self.declarations = declarations;
                }
            }
            Err(message) => self.fail(message),
        }
    }

    fn fail(&mut self, message: String) {
        self.compiled = false;
        self.info_log = format!("ERROR: 0:1: {}", message);
        self.declarations.clear();
    }
}

// ===== PROGRAM =====

#[derive(Debug, Clone, Default)]
pub struct SoftProgram {
    pub attached: Vec<u32>,
    pub bindings: FxHashMap<String, u32>,
    pub linked: bool,
    pub info_log: String,
    pub attributes: Vec<(ActiveVariable, i32)>,
    pub uniforms: Vec<ActiveVariable>,
    /// `(uniform index, element)` of every location
    locations: Vec<(usize, i32)>,
    values: FxHashMap<i32, Vec<f32>>,
    /// Contexts that have this program current
    pub in_use: u32,
    pub delete_pending: bool,
}

impl SoftProgram {
    /// Link against the attached shaders
    pub fn link(&mut self, shaders: &[&SoftShader], max_vertex_attribs: u32) {
        self.linked = false;
        self.attributes.clear();
        self.uniforms.clear();
        self.locations.clear();
        self.values.clear();
        match self.try_link(shaders, max_vertex_attribs) {
            Ok(()) => {
                self.linked = true;
                self.info_log.clear();
            }
            Err(message) => {
                self.info_log = format!("Link failed: {}", message);
                self.attributes.clear();
                self.uniforms.clear();
                self.locations.clear();
            }
        }
    }

    fn try_link(&mut self, shaders: &[&SoftShader], max_vertex_attribs: u32) -> Result<(), String> {
        let stage = |ty: u32| shaders.iter().filter(|s| s.shader_type == ty).collect::<Vec<_>>();
        let (vertex, fragment) = (stage(gl::VERTEX_SHADER), stage(gl::FRAGMENT_SHADER));
        if vertex.len() != 1 || fragment.len() != 1 {
            return Err("one vertex and one fragment shader required".to_string());
        }
        if shaders.iter().any(|s| !s.compiled) {
            return Err("attached shader not compiled".to_string());
        }

        let mut used = vec![false; max_vertex_attribs as usize];
        let vertex_attributes: Vec<&Declaration> = vertex[0].declarations.iter().filter(|d| !d.uniform).collect();
        for declaration in &vertex_attributes {
            if let Some(&index) = self.bindings.get(&declaration.name) {
                let slot = used.get_mut(index as usize).ok_or("bound location out of range")?;
                *slot = true;
            }
        }
        for declaration in vertex_attributes {
            let location = match self.bindings.get(&declaration.name) {
                Some(&index) => index as i32,
                None => {
                    let free = used.iter().position(|u| !*u).ok_or("too many attributes")?;
                    used[free] = true;
                    free as i32
                }
            };
            let variable = ActiveVariable { name: declaration.name.clone(), size: declaration.size, ty: declaration.ty };
            self.attributes.push((variable, location));
        }

        for declaration in shaders.iter().flat_map(|s| s.declarations.iter().filter(|d| d.uniform)) {
            if let Some(existing) = self.uniforms.iter().find(|u| u.name.trim_end_matches("[0]") == declaration.name) {
                if existing.ty != declaration.ty || existing.size != declaration.size {
                    return Err(format!("uniform '{}' declared differently across stages", declaration.name));
                }
                continue;
            }
            let index = self.uniforms.len();
            let name = if declaration.size > 1 { format!("{}[0]", declaration.name) } else { declaration.name.clone() };
            self.uniforms.push(ActiveVariable { name, size: declaration.size, ty: declaration.ty });
            for element in 0..declaration.size {
                self.locations.push((index, element));
            }
        }
        Ok(())
    }

    pub fn attrib_location(&self, name: &str) -> i32 {
        self.attributes
            .iter()
            .find(|(variable, _)| variable.name == name)
            .map(|(_, location)| *location)
            .unwrap_or(-1)
    }

    /// Location of `name`, `name[0]` or `name[N]`
    pub fn uniform_location(&self, name: &str) -> i32 {
        let Ok((base, _)) = split_array(name) else {
            return -1;
        };
        let element = match name.find('[') {
            Some(open) => name[open + 1..].trim_end_matches(']').parse::<i32>().unwrap_or(-1),
            None => 0,
        };
        let Some(index) = self.uniforms.iter().position(|u| u.name.trim_end_matches("[0]") == base) else {
            return -1;
        };
        self.locations
            .iter()
            .position(|&(i, e)| i == index && e == element)
            .map(|location| location as i32)
            .unwrap_or(-1)
    }

    /// Write consecutive elements from `location`; false for an unknown
    /// location or a write past the end of its array
    pub fn set_uniform(&mut self, location: i32, components: usize, values: &[f32]) -> bool {
        let Some(&(index, element)) = usize::try_from(location).ok().and_then(|l| self.locations.get(l)) else {
            return false;
        };
        let size = self.uniforms[index].size;
        let count = values.len() / components.max(1);
        if element as usize + count > size as usize {
            return false;
        }
        for (i, chunk) in values.chunks(components.max(1)).enumerate() {
            self.values.insert(location + i as i32, chunk.to_vec());
        }
        true
    }

    /// Value at `location`, zeros until set
    pub fn uniform(&self, location: i32, components: usize) -> Vec<f32> {
        let mut value = self.values.get(&location).cloned().unwrap_or_default();
        value.resize(components, 0.0);
        value
    }

    pub fn has_location(&self, location: i32) -> bool {
        usize::try_from(location).is_ok_and(|l| l < self.locations.len())
    }
}

#[cfg(test)]
#[path = "soft_program_tests.rs"]
mod tests;
