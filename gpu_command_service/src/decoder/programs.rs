/// Shader, program and uniform commands
///
/// Locations handed to the client are fake locations. Every uniform setter
/// resolves the location against the current program's executable and calls
/// the driver with the real location and a clamped element count.

use super::commands as cmd;
use super::{claim_ids, done, CommandError, CommandResult, Decoder};
use crate::context_group::{GroupResources, IdNamespace};
use crate::feature::Workarounds;
use crate::gl;
use crate::resource::{ProgramKey, ShaderKey};
use crate::shader_translator::TranslatorResources;

/// A uniform setter's resolved destination
struct UniformTarget {
    program: ProgramKey,
    location: i32,
    real_location: i32,
    ty: u32,
    /// Elements the call may write, clamped to the end of the array
    count: usize,
}

fn is_reserved_name(name: &str) -> bool {
    name.starts_with("gl_")
}

impl Decoder {
    fn require_shader(&mut self, res: &GroupResources<'_>, client_id: u32, function: &str) -> Option<ShaderKey> {
        let key = res.shaders.get_shader(client_id);
        if key.is_none() {
            // Programs and shaders share one id space
            if res.programs.get_program(client_id).is_some() {
                self.errors.set_gl_error(gl::INVALID_OPERATION, function, "program passed for shader");
            } else {
                self.errors.set_gl_error(gl::INVALID_VALUE, function, "unknown shader");
            }
        }
        key
    }

    fn require_program(&mut self, res: &GroupResources<'_>, client_id: u32, function: &str) -> Option<ProgramKey> {
        let key = res.programs.get_program(client_id);
        if key.is_none() {
            if res.shaders.get_shader(client_id).is_some() {
                self.errors.set_gl_error(gl::INVALID_OPERATION, function, "shader passed for program");
            } else {
                self.errors.set_gl_error(gl::INVALID_VALUE, function, "unknown program");
            }
        }
        key
    }

    fn bucket_string(&self, bucket_id: u32) -> Result<String, CommandError> {
        self.buckets.string(bucket_id).ok_or(CommandError::InvalidArguments)
    }

    // ===== SHADERS =====

    pub(super) fn create_shader(&mut self, res: &mut GroupResources<'_>, c: cmd::CreateShader) -> CommandResult {
        if !res.features.validators.shader_type.is_valid(c.shader_type) {
            return self.invalid_enum("glCreateShader", c.shader_type, "type");
        }
        if !claim_ids(res, IdNamespace::Programs, &[c.client_id], |res, id| {
            res.shaders.is_shader(id) || res.programs.is_program(id)
        }) {
            return Err(CommandError::InvalidArguments);
        }
        let service = self.driver.create_shader(c.shader_type);
        res.shaders.create_shader(c.client_id, service, c.shader_type);
        done()
    }

    pub(super) fn delete_shader(&mut self, res: &mut GroupResources<'_>, c: cmd::DeleteShader) -> CommandResult {
        if c.shader == 0 {
            return done();
        }
        let Some(key) = self.require_shader(res, c.shader, "glDeleteShader") else {
            return done();
        };
        res.shaders.mark_as_deleted(key, Some(self.driver.as_mut()));
        // Still attached somewhere: the id stays reserved until the last detach
        if !res.shaders.is_shader(c.shader) {
            res.id_allocator(IdNamespace::Programs).free_id(c.shader);
        }
        done()
    }

    pub(super) fn shader_source_bucket(&mut self, res: &mut GroupResources<'_>, c: cmd::ShaderSourceBucket) -> CommandResult {
        let source = self.bucket_string(c.data_bucket_id)?;
        let Some(key) = self.require_shader(res, c.shader, "glShaderSource") else {
            return done();
        };
        res.shaders.set_source(key, source);
        done()
    }

    pub(super) fn compile_shader(&mut self, res: &mut GroupResources<'_>, c: cmd::CompileShader) -> CommandResult {
        let Some(key) = self.require_shader(res, c.shader, "glCompileShader") else {
            return done();
        };
        let resources = TranslatorResources::from_features(res.features);
        let compiled = res.shaders.compile(key, &**res.translator, &resources, self.driver.as_mut());
        if !compiled {
            crate::gpu_debug!("gpu::Decoder", "Shader {} did not compile", c.shader);
        }
        done()
    }

    pub(super) fn get_shader_iv(&mut self, res: &mut GroupResources<'_>, c: cmd::GetShaderiv) -> CommandResult {
        if !res.features.validators.shader_parameter.is_valid(c.pname) {
            return self.invalid_enum("glGetShaderiv", c.pname, "pname");
        }
        let result = self.sized_result(c.params_shm_id, c.params_shm_offset, 1)?;
        let Some(key) = self.require_shader(res, c.shader, "glGetShaderiv") else {
            return done();
        };
        let Some(shader) = res.shaders.shader(key) else {
            return done();
        };
        let string_length = |text: Option<&str>| text.map_or(0, |t| t.len() as i32 + 1);
        let value = match c.pname {
            gl::SHADER_TYPE => shader.shader_type() as i32,
            gl::DELETE_STATUS => shader.is_deleted() as i32,
            gl::COMPILE_STATUS => shader.is_valid() as i32,
            gl::INFO_LOG_LENGTH => string_length(shader.log_info()),
            gl::SHADER_SOURCE_LENGTH => string_length(shader.source()),
            gl::TRANSLATED_SHADER_SOURCE_LENGTH_ANGLE => string_length(shader.translated_source()),
            pname => return self.invalid_enum("glGetShaderiv", pname, "pname"),
        };
        Self::write_sized_result(&result, &[value as u32])
    }

    pub(super) fn get_shader_info_log(&mut self, res: &mut GroupResources<'_>, c: cmd::GetShaderInfoLog) -> CommandResult {
        let Some(key) = self.require_shader(res, c.shader, "glGetShaderInfoLog") else {
            return done();
        };
        let log = res.shaders.shader(key).and_then(|s| s.log_info()).unwrap_or_default();
        self.buckets.set_string(c.bucket_id, log);
        done()
    }

    pub(super) fn get_translated_shader_source(
        &mut self,
        res: &mut GroupResources<'_>,
        c: cmd::GetTranslatedShaderSourceANGLE,
    ) -> CommandResult {
        let Some(key) = self.require_shader(res, c.shader, "glGetTranslatedShaderSourceANGLE") else {
            return done();
        };
        let source = res.shaders.shader(key).and_then(|s| s.translated_source()).unwrap_or_default();
        self.buckets.set_string(c.bucket_id, source);
        done()
    }

    pub(super) fn is_shader(&mut self, res: &mut GroupResources<'_>, c: cmd::IsShader) -> CommandResult {
        self.write_result_u32(c.result_shm_id, c.result_shm_offset, res.shaders.is_shader(c.shader) as u32)
    }

    // ===== PROGRAMS =====

    pub(super) fn create_program(&mut self, res: &mut GroupResources<'_>, c: cmd::CreateProgram) -> CommandResult {
        if !claim_ids(res, IdNamespace::Programs, &[c.client_id], |res, id| {
            res.shaders.is_shader(id) || res.programs.is_program(id)
        }) {
            return Err(CommandError::InvalidArguments);
        }
        let service = self.driver.create_program();
        res.programs.create_program(c.client_id, service);
        done()
    }

    pub(super) fn delete_program(&mut self, res: &mut GroupResources<'_>, c: cmd::DeleteProgram) -> CommandResult {
        if c.program == 0 {
            return done();
        }
        let Some(key) = self.require_program(res, c.program, "glDeleteProgram") else {
            return done();
        };
        res.programs.mark_as_deleted(key, res.shaders, Some(self.driver.as_mut()));
        if !res.programs.is_program(c.program) {
            self.uniforms_cleared.remove(&key);
            res.id_allocator(IdNamespace::Programs).free_id(c.program);
        }
        done()
    }

    pub(super) fn attach_shader(&mut self, res: &mut GroupResources<'_>, c: cmd::AttachShader) -> CommandResult {
        let Some(program) = self.require_program(res, c.program, "glAttachShader") else {
            return done();
        };
        let Some(shader) = self.require_shader(res, c.shader, "glAttachShader") else {
            return done();
        };
        if !res.programs.attach_shader(program, shader, res.shaders, self.driver.as_mut()) {
            return self.set_error(gl::INVALID_OPERATION, "glAttachShader", "can not attach more than one shader of the same type");
        }
        done()
    }

    pub(super) fn detach_shader(&mut self, res: &mut GroupResources<'_>, c: cmd::DetachShader) -> CommandResult {
        let Some(program) = self.require_program(res, c.program, "glDetachShader") else {
            return done();
        };
        let Some(shader) = self.require_shader(res, c.shader, "glDetachShader") else {
            return done();
        };
        if !res.programs.detach_shader(program, shader, res.shaders, self.driver.as_mut()) {
            return self.set_error(gl::INVALID_OPERATION, "glDetachShader", "shader not attached to program");
        }
        if !res.shaders.is_shader(c.shader) {
            res.id_allocator(IdNamespace::Programs).free_id(c.shader);
        }
        done()
    }

    pub(super) fn bind_attrib_location_bucket(
        &mut self,
        res: &mut GroupResources<'_>,
        c: cmd::BindAttribLocationBucket,
    ) -> CommandResult {
        const FUNC: &str = "glBindAttribLocation";
        let name = self.bucket_string(c.name_bucket_id)?;
        if c.index >= res.features.limits.max_vertex_attribs {
            return self.set_error(gl::INVALID_VALUE, FUNC, "index out of range");
        }
        if is_reserved_name(&name) {
            return self.set_error(gl::INVALID_OPERATION, FUNC, "reserved prefix");
        }
        let Some(program) = self.require_program(res, c.program, FUNC) else {
            return done();
        };
        res.programs.bind_attrib_location(program, c.index, &name);
        done()
    }

    pub(super) fn bind_uniform_location_bucket(
        &mut self,
        res: &mut GroupResources<'_>,
        c: cmd::BindUniformLocationCHROMIUMBucket,
    ) -> CommandResult {
        const FUNC: &str = "glBindUniformLocationCHROMIUM";
        let name = self.bucket_string(c.name_bucket_id)?;
        if is_reserved_name(&name) {
            return self.set_error(gl::INVALID_OPERATION, FUNC, "reserved prefix");
        }
        let Some(program) = self.require_program(res, c.program, FUNC) else {
            return done();
        };
        if !res.programs.bind_uniform_location(program, c.location, &name) {
            return self.set_error(gl::INVALID_VALUE, FUNC, "location out of range");
        }
        done()
    }

    pub(super) fn link_program(&mut self, res: &mut GroupResources<'_>, c: cmd::LinkProgram) -> CommandResult {
        let Some(key) = self.require_program(res, c.program, "glLinkProgram") else {
            return done();
        };
        if !res.programs.link(key, res.shaders, self.driver.as_mut()) {
            return done();
        }
        self.uniforms_cleared.remove(&key);
        if self.state.current_program == Some(key) {
            let workarounds = res.features.workarounds;
            if workarounds.contains(Workarounds::USE_CURRENT_PROGRAM_AFTER_SUCCESSFUL_LINK) {
                let service = res.programs.program(key).map_or(0, |p| p.service_id());
                self.driver.use_program(service);
            }
            self.clear_uniforms_if_needed(res, key);
        }
        done()
    }

    /// Zero a freshly linked program's uniforms on its first use
    fn clear_uniforms_if_needed(&mut self, res: &GroupResources<'_>, key: ProgramKey) {
        if !res.features.workarounds.contains(Workarounds::CLEAR_UNIFORMS_BEFORE_PROGRAM_USE) {
            return;
        }
        if self.uniforms_cleared.insert(key) {
            res.programs.clear_uniforms(key, self.driver.as_mut());
        }
    }

    pub(super) fn validate_program(&mut self, res: &mut GroupResources<'_>, c: cmd::ValidateProgram) -> CommandResult {
        let Some(key) = self.require_program(res, c.program, "glValidateProgram") else {
            return done();
        };
        res.programs.validate(key, self.driver.as_mut());
        done()
    }

    pub(super) fn use_program(&mut self, res: &mut GroupResources<'_>, c: cmd::UseProgram) -> CommandResult {
        let key = if c.program == 0 {
            None
        } else {
            let Some(key) = self.require_program(res, c.program, "glUseProgram") else {
                return done();
            };
            if !res.programs.program(key).is_some_and(|p| p.link_status()) {
                return self.set_error(gl::INVALID_OPERATION, "glUseProgram", "program not linked");
            }
            Some(key)
        };
        if self.state.current_program == key {
            return done();
        }
        if let Some(key) = key {
            res.programs.use_program(key);
        }
        if let Some(old) = std::mem::replace(&mut self.state.current_program, key) {
            if let Some(client_id) = res.programs.unuse_program(old, res.shaders, Some(self.driver.as_mut())) {
                self.uniforms_cleared.remove(&old);
                res.id_allocator(IdNamespace::Programs).free_id(client_id);
            }
        }
        let service = key.and_then(|key| res.programs.program(key)).map_or(0, |p| p.service_id());
        self.driver.use_program(service);
        if let Some(key) = key {
            self.clear_uniforms_if_needed(res, key);
        }
        done()
    }

    pub(super) fn get_program_iv(&mut self, res: &mut GroupResources<'_>, c: cmd::GetProgramiv) -> CommandResult {
        if !res.features.validators.program_parameter.is_valid(c.pname) {
            return self.invalid_enum("glGetProgramiv", c.pname, "pname");
        }
        let result = self.sized_result(c.params_shm_id, c.params_shm_offset, 1)?;
        let Some(key) = self.require_program(res, c.program, "glGetProgramiv") else {
            return done();
        };
        match res.programs.program(key).and_then(|p| p.get_parameter(c.pname)) {
            Some(value) => Self::write_sized_result(&result, &[value as u32]),
            None => self.invalid_enum("glGetProgramiv", c.pname, "pname"),
        }
    }

    pub(super) fn get_program_info_log(&mut self, res: &mut GroupResources<'_>, c: cmd::GetProgramInfoLog) -> CommandResult {
        let Some(key) = self.require_program(res, c.program, "glGetProgramInfoLog") else {
            return done();
        };
        let log = res.programs.program(key).and_then(|p| p.log_info()).unwrap_or_default();
        self.buckets.set_string(c.bucket_id, log);
        done()
    }

    pub(super) fn is_program(&mut self, res: &mut GroupResources<'_>, c: cmd::IsProgram) -> CommandResult {
        self.write_result_u32(c.result_shm_id, c.result_shm_offset, res.programs.is_program(c.program) as u32)
    }

    // ===== LOCATIONS =====

    /// Shared body of the bucket-named location queries; the client presets
    /// the result to -1
    fn get_location_bucket(
        &mut self,
        res: &GroupResources<'_>,
        function: &str,
        program: u32,
        name_bucket_id: u32,
        shm: (u32, u32),
        attrib: bool,
    ) -> CommandResult {
        let name = self.bucket_string(name_bucket_id)?;
        let result = self.shm(shm.0, shm.1, 4)?;
        if result.read_u32(0)? as i32 != -1 {
            return Err(CommandError::InvalidArguments);
        }
        let Some(key) = self.require_program(res, program, function) else {
            return done();
        };
        let Some(exe) = res.programs.program(key).filter(|p| p.link_status()).and_then(|p| p.executable()) else {
            return self.set_error(gl::INVALID_OPERATION, function, "program not linked");
        };
        if is_reserved_name(&name) {
            return done();
        }
        let location = if attrib { exe.attrib_location(&name) } else { exe.uniform_location(&name) };
        result.write_u32(0, location as u32)?;
        done()
    }

    pub(super) fn get_attrib_location_bucket(
        &mut self,
        res: &mut GroupResources<'_>,
        c: cmd::GetAttribLocationBucket,
    ) -> CommandResult {
        let shm = (c.location_shm_id, c.location_shm_offset);
        self.get_location_bucket(res, "glGetAttribLocation", c.program, c.name_bucket_id, shm, true)
    }

    pub(super) fn get_uniform_location_bucket(
        &mut self,
        res: &mut GroupResources<'_>,
        c: cmd::GetUniformLocationBucket,
    ) -> CommandResult {
        let shm = (c.location_shm_id, c.location_shm_offset);
        self.get_location_bucket(res, "glGetUniformLocation", c.program, c.name_bucket_id, shm, false)
    }

    // ===== UNIFORMS =====

    /// Resolve a setter's location on the current program
    ///
    /// `None` means nothing is written: either the location is -1 or a GL
    /// error has been raised.
    fn uniform_target(
        &mut self,
        res: &GroupResources<'_>,
        function: &str,
        location: i32,
        count: i32,
        accepted: &[u32],
    ) -> Option<UniformTarget> {
        if count < 0 {
            self.errors.set_gl_error(gl::INVALID_VALUE, function, "count < 0");
            return None;
        }
        let Some(program) = self.state.current_program else {
            self.errors.set_gl_error(gl::INVALID_OPERATION, function, "no program in use");
            return None;
        };
        if location == -1 {
            return None;
        }
        let Some((real_location, element, info)) = res
            .programs
            .program(program)
            .and_then(|p| p.executable())
            .and_then(|exe| exe.uniform_by_fake_location(location))
        else {
            self.errors.set_gl_error(gl::INVALID_OPERATION, function, "unknown location");
            return None;
        };
        if !accepted.contains(&info.ty) && !(info.is_sampler() && accepted.contains(&gl::INT)) {
            self.errors.set_gl_error(gl::INVALID_OPERATION, function, "wrong uniform function for type");
            return None;
        }
        if count > 1 && !info.is_array {
            self.errors.set_gl_error(gl::INVALID_OPERATION, function, "count > 1 for non-array");
            return None;
        }
        let remaining = (info.size as usize).saturating_sub(element);
        Some(UniformTarget {
            program,
            location,
            real_location,
            ty: info.ty,
            count: (count as usize).min(remaining),
        })
    }

    /// Integer setters on samplers record the texture units
    fn set_uniform_ints(&mut self, res: &mut GroupResources<'_>, function: &str, target: UniformTarget, values: &[i32]) -> CommandResult {
        let values = &values[..target.count.min(values.len())];
        if gl::is_sampler_type(target.ty) {
            let units = res.features.limits.max_texture_units as i32;
            if values.iter().any(|unit| !(0..units).contains(unit)) {
                return self.set_error(gl::INVALID_VALUE, function, "texture unit out of range");
            }
            res.programs.set_samplers(target.program, target.location, values);
        }
        self.driver.uniform_iv(target.real_location, 1, values);
        done()
    }

    pub(super) fn uniform_1f(&mut self, res: &mut GroupResources<'_>, c: cmd::Uniform1f) -> CommandResult {
        let Some(target) = self.uniform_target(res, "glUniform1f", c.location, 1, &[gl::FLOAT, gl::BOOL]) else {
            return done();
        };
        self.driver.uniform_fv(target.real_location, 1, &[c.x]);
        done()
    }

    pub(super) fn uniform_1i(&mut self, res: &mut GroupResources<'_>, c: cmd::Uniform1i) -> CommandResult {
        let Some(target) = self.uniform_target(res, "glUniform1i", c.location, 1, &[gl::INT, gl::BOOL]) else {
            return done();
        };
        self.set_uniform_ints(res, "glUniform1i", target, &[c.x])
    }

    pub(super) fn uniform_1iv(&mut self, res: &mut GroupResources<'_>, c: cmd::Uniform1ivImmediate, data: &[u32]) -> CommandResult {
        let words = usize::try_from(c.count).unwrap_or(0);
        let payload = data.get(..words).ok_or(CommandError::OutOfBounds)?;
        let Some(target) = self.uniform_target(res, "glUniform1iv", c.location, c.count, &[gl::INT, gl::BOOL]) else {
            return done();
        };
        let values: Vec<i32> = payload.iter().map(|w| *w as i32).collect();
        self.set_uniform_ints(res, "glUniform1iv", target, &values)
    }

    pub(super) fn uniform_4f(&mut self, res: &mut GroupResources<'_>, c: cmd::Uniform4f) -> CommandResult {
        let accepted = [gl::FLOAT_VEC4, gl::BOOL_VEC4];
        let Some(target) = self.uniform_target(res, "glUniform4f", c.location, 1, &accepted) else {
            return done();
        };
        self.driver.uniform_fv(target.real_location, 4, &[c.x, c.y, c.z, c.w]);
        done()
    }

    pub(super) fn uniform_4fv(&mut self, res: &mut GroupResources<'_>, c: cmd::Uniform4fvImmediate, data: &[u32]) -> CommandResult {
        let words = usize::try_from(c.count).unwrap_or(0).saturating_mul(4);
        let payload = data.get(..words).ok_or(CommandError::OutOfBounds)?;
        let accepted = [gl::FLOAT_VEC4, gl::BOOL_VEC4];
        let Some(target) = self.uniform_target(res, "glUniform4fv", c.location, c.count, &accepted) else {
            return done();
        };
        let values: Vec<f32> = payload[..target.count * 4].iter().map(|w| f32::from_bits(*w)).collect();
        self.driver.uniform_fv(target.real_location, 4, &values);
        done()
    }

    pub(super) fn uniform_matrix_4fv(
        &mut self,
        res: &mut GroupResources<'_>,
        c: cmd::UniformMatrix4fvImmediate,
        data: &[u32],
    ) -> CommandResult {
        const FUNC: &str = "glUniformMatrix4fv";
        let words = usize::try_from(c.count).unwrap_or(0).saturating_mul(16);
        let payload = data.get(..words).ok_or(CommandError::OutOfBounds)?;
        if c.transpose != 0 {
            return self.set_error(gl::INVALID_VALUE, FUNC, "transpose not false");
        }
        let Some(target) = self.uniform_target(res, FUNC, c.location, c.count, &[gl::FLOAT_MAT4]) else {
            return done();
        };
        let values: Vec<f32> = payload[..target.count * 16].iter().map(|w| f32::from_bits(*w)).collect();
        self.driver.uniform_matrix_fv(target.real_location, 4, &values);
        done()
    }

    pub(super) fn get_uniform_fv(&mut self, res: &mut GroupResources<'_>, c: cmd::GetUniformfv) -> CommandResult {
        const FUNC: &str = "glGetUniformfv";
        let Some(key) = self.require_program(res, c.program, FUNC) else {
            return done();
        };
        let Some(program) = res.programs.program(key).filter(|p| p.link_status()) else {
            return self.set_error(gl::INVALID_OPERATION, FUNC, "program not linked");
        };
        let service = program.service_id();
        let Some((real_location, _, info)) = program
            .executable()
            .and_then(|exe| exe.uniform_by_fake_location(c.location))
        else {
            return self.set_error(gl::INVALID_OPERATION, FUNC, "unknown location");
        };
        let components = gl::uniform_type_components(info.ty).unwrap_or(1) as usize;
        let result = self.sized_result(c.params_shm_id, c.params_shm_offset, components)?;
        let values = self.driver.get_uniform_fv(service, real_location, components);
        let bits: Vec<u32> = values.iter().take(components).map(|v| v.to_bits()).collect();
        Self::write_sized_result(&result, &bits)
    }
}

#[cfg(test)]
#[path = "programs_tests.rs"]
mod tests;
