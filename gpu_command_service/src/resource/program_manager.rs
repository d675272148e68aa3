/// Programs and their manager.
///
/// Uniform locations handed to clients are fake: `index + (element << 16)`,
/// where `index` is the slot of the uniform in the program's uniform table.
/// The real driver location of every element is resolved once at link time.

use super::object_table::ObjectTable;
use super::shader_manager::{ShaderKey, ShaderManager};
use crate::driver::{reborrow, GraphicsDriver};
use crate::gl;
use rustc_hash::FxHashMap;

slotmap::new_key_type! {
    /// Stable key of a program in the program arena
    pub struct ProgramKey;
}

/// Bits reserved for the uniform index in a fake location
const FAKE_LOCATION_INDEX_BITS: u32 = 16;
const FAKE_LOCATION_INDEX_MASK: i32 = (1 << FAKE_LOCATION_INDEX_BITS) - 1;

/// Encode a uniform table index and array element as a client location
pub fn fake_location(index: usize, element: usize) -> i32 {
    index as i32 + ((element as i32) << FAKE_LOCATION_INDEX_BITS)
}

/// Split a client location into `(index, element)`
pub fn decode_fake_location(location: i32) -> Option<(usize, usize)> {
    if location < 0 {
        return None;
    }
    Some((
        (location & FAKE_LOCATION_INDEX_MASK) as usize,
        (location >> FAKE_LOCATION_INDEX_BITS) as usize,
    ))
}

/// Split `name[3]` into `("name", Some(3))`; a malformed subscript yields `None`
fn parse_array_name(name: &str) -> Option<(&str, Option<usize>)> {
    match name.strip_suffix(']') {
        Some(rest) => {
            let open = rest.rfind('[')?;
            let element = rest[open + 1..].parse::<usize>().ok()?;
            Some((&rest[..open], Some(element)))
        }
        None => Some((name, None)),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttribInfo {
    pub name: String,
    pub ty: u32,
    pub size: i32,
    pub location: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UniformInfo {
    /// Name as reported by the driver (`colors[0]` for arrays)
    pub name: String,
    pub ty: u32,
    pub size: i32,
    pub is_array: bool,
    /// Driver location of every element
    pub element_locations: Vec<i32>,
    /// Texture unit per element, samplers only
    pub texture_units: Vec<u32>,
}

impl UniformInfo {
    pub fn base_name(&self) -> &str {
        self.name.strip_suffix("[0]").unwrap_or(&self.name)
    }

    pub fn is_sampler(&self) -> bool {
        gl::is_sampler_type(self.ty)
    }
}

/// Result of a successful link
#[derive(Debug, Clone, Default)]
pub struct ProgramExecutable {
    attribs: Vec<AttribInfo>,
    /// attrib index by location
    attrib_location_to_index: Vec<Option<usize>>,
    /// Indexed by the fake location index; bound locations may leave holes
    uniforms: Vec<Option<UniformInfo>>,
    sampler_indices: Vec<usize>,
}

impl ProgramExecutable {
    pub fn attribs(&self) -> &[AttribInfo] {
        &self.attribs
    }

    pub fn attrib_by_location(&self, location: u32) -> Option<&AttribInfo> {
        let index = (*self.attrib_location_to_index.get(location as usize)?)?;
        self.attribs.get(index)
    }

    pub fn attrib_location(&self, name: &str) -> i32 {
        self.attribs.iter().find(|a| a.name == name).map_or(-1, |a| a.location)
    }

    pub fn uniforms(&self) -> impl Iterator<Item = &UniformInfo> {
        self.uniforms.iter().flatten()
    }

    pub fn uniform(&self, index: usize) -> Option<&UniformInfo> {
        self.uniforms.get(index)?.as_ref()
    }

    pub fn uniform_count(&self) -> usize {
        self.uniforms.iter().flatten().count()
    }

    pub fn sampler_indices(&self) -> &[usize] {
        &self.sampler_indices
    }

    /// Client location for `name` or `name[k]`, -1 when unknown
    pub fn uniform_location(&self, name: &str) -> i32 {
        let Some((base, element)) = parse_array_name(name) else {
            return -1;
        };
        let element = element.unwrap_or(0);
        for (index, info) in self.uniforms.iter().enumerate() {
            let Some(info) = info else {
                continue;
            };
            if info.base_name() != base && info.name != name {
                continue;
            }
            if info.name == name {
                return fake_location(index, 0);
            }
            if element < info.size as usize && (info.is_array || element == 0) {
                return fake_location(index, element);
            }
        }
        -1
    }

    /// Resolve a client location to `(driver location, element, info)`
    pub fn uniform_by_fake_location(&self, location: i32) -> Option<(i32, usize, &UniformInfo)> {
        let (index, element) = decode_fake_location(location)?;
        let info = self.uniform(index)?;
        let real = *info.element_locations.get(element)?;
        Some((real, element, info))
    }

    pub fn max_attrib_name_length(&self) -> usize {
        self.attribs.iter().map(|a| a.name.len() + 1).max().unwrap_or(0)
    }

    pub fn max_uniform_name_length(&self) -> usize {
        self.uniforms().map(|u| u.name.len() + 1).max().unwrap_or(0)
    }
}

pub struct Program {
    service_id: u32,
    /// [vertex, fragment]
    attached_shaders: [Option<ShaderKey>; 2],
    link_status: bool,
    valid: bool,
    log_info: Option<String>,
    executable: Option<ProgramExecutable>,
    bind_attrib_locations: FxHashMap<String, u32>,
    bind_uniform_locations: FxHashMap<String, i32>,
    /// Contexts that have this program current
    use_count: u32,
    deleted: bool,
}

impl Program {
    pub fn service_id(&self) -> u32 {
        self.service_id
    }

    pub fn link_status(&self) -> bool {
        self.link_status
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn log_info(&self) -> Option<&str> {
        self.log_info.as_deref()
    }

    /// Executable used for draws; survives a failed relink while in use
    pub fn executable(&self) -> Option<&ProgramExecutable> {
        self.executable.as_ref()
    }

    pub fn attached_shaders(&self) -> impl Iterator<Item = ShaderKey> + '_ {
        self.attached_shaders.iter().flatten().copied()
    }

    pub fn in_use(&self) -> bool {
        self.use_count > 0
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Answer a `GetProgramiv` query
    pub fn get_parameter(&self, pname: u32) -> Option<i32> {
        let exe = self.executable.as_ref();
        let value = match pname {
            gl::DELETE_STATUS => self.deleted as i32,
            gl::LINK_STATUS => self.link_status as i32,
            gl::VALIDATE_STATUS => self.valid as i32,
            gl::INFO_LOG_LENGTH => self.log_info.as_ref().map_or(0, |log| log.len() as i32 + 1),
            gl::ATTACHED_SHADERS => self.attached_shaders.iter().flatten().count() as i32,
            gl::ACTIVE_ATTRIBUTES => exe.map_or(0, |e| e.attribs.len() as i32),
            gl::ACTIVE_ATTRIBUTE_MAX_LENGTH => exe.map_or(0, |e| e.max_attrib_name_length() as i32),
            gl::ACTIVE_UNIFORMS => exe.map_or(0, |e| e.uniform_count() as i32),
            gl::ACTIVE_UNIFORM_MAX_LENGTH => exe.map_or(0, |e| e.max_uniform_name_length() as i32),
            _ => return None,
        };
        Some(value)
    }
}

fn shader_slot(shader_type: u32) -> Option<usize> {
    match shader_type {
        gl::VERTEX_SHADER => Some(0),
        gl::FRAGMENT_SHADER => Some(1),
        _ => None,
    }
}

/// Tracks every program of a context group
pub struct ProgramManager {
    programs: ObjectTable<ProgramKey, Program>,
    max_vertex_attribs: u32,
}

impl ProgramManager {
    pub fn new(max_vertex_attribs: u32) -> Self {
        Self {
            programs: ObjectTable::new(),
            max_vertex_attribs,
        }
    }

    pub fn create_program(&mut self, client_id: u32, service_id: u32) -> ProgramKey {
        self.programs.insert(
            client_id,
            Program {
                service_id,
                attached_shaders: [None, None],
                link_status: false,
                valid: false,
                log_info: None,
                executable: None,
                bind_attrib_locations: FxHashMap::default(),
                bind_uniform_locations: FxHashMap::default(),
                use_count: 0,
                deleted: false,
            },
        )
    }

    pub fn get_program(&self, client_id: u32) -> Option<ProgramKey> {
        self.programs.lookup(client_id)
    }

    pub fn program(&self, key: ProgramKey) -> Option<&Program> {
        self.programs.get(key)
    }

    pub fn client_id(&self, key: ProgramKey) -> Option<u32> {
        self.programs.client_id(key)
    }

    pub fn is_program(&self, client_id: u32) -> bool {
        self.get_program(client_id).is_some()
    }

    /// Attach a shader; fails when a shader of the same type is already attached
    pub fn attach_shader(
        &mut self,
        key: ProgramKey,
        shader: ShaderKey,
        shaders: &mut ShaderManager,
        driver: &mut dyn GraphicsDriver,
    ) -> bool {
        let Some(slot) = shaders.shader(shader).and_then(|s| shader_slot(s.shader_type())) else {
            return false;
        };
        let Some(program) = self.programs.get_mut(key) else {
            return false;
        };
        if program.attached_shaders[slot].is_some() {
            return false;
        }
        program.attached_shaders[slot] = Some(shader);
        if let Some(service) = shaders.shader(shader).map(|s| s.service_id()) {
            driver.attach_shader(program.service_id, service);
        }
        shaders.use_shader(shader);
        true
    }

    pub fn detach_shader(
        &mut self,
        key: ProgramKey,
        shader: ShaderKey,
        shaders: &mut ShaderManager,
        driver: &mut dyn GraphicsDriver,
    ) -> bool {
        let Some(program) = self.programs.get_mut(key) else {
            return false;
        };
        let Some(slot) = program.attached_shaders.iter().position(|s| *s == Some(shader)) else {
            return false;
        };
        program.attached_shaders[slot] = None;
        if let Some(service) = shaders.shader(shader).map(|s| s.service_id()) {
            driver.detach_shader(program.service_id, service);
        }
        shaders.unuse_shader(shader);
        true
    }

    /// Recorded now, applied right before the next link
    pub fn bind_attrib_location(&mut self, key: ProgramKey, index: u32, name: &str) {
        if let Some(program) = self.programs.get_mut(key) {
            program.bind_attrib_locations.insert(name.to_string(), index);
        }
    }

    /// Recorded now, applied by the next link
    pub fn bind_uniform_location(&mut self, key: ProgramKey, location: i32, name: &str) -> bool {
        if !(0..=FAKE_LOCATION_INDEX_MASK).contains(&location) {
            return false;
        }
        match self.programs.get_mut(key) {
            Some(program) => {
                program.bind_uniform_locations.insert(name.to_string(), location);
                true
            }
            None => false,
        }
    }

    /// Link the program and rebuild its attribute and uniform tables
    ///
    /// A failed link clears `link_status`; the previous executable is kept while
    /// the program is current in some context.
    pub fn link(
        &mut self,
        key: ProgramKey,
        shaders: &ShaderManager,
        driver: &mut dyn GraphicsDriver,
    ) -> bool {
        let max_vertex_attribs = self.max_vertex_attribs;
        let Some(program) = self.programs.get_mut(key) else {
            return false;
        };
        program.valid = false;
        let ready = program
            .attached_shaders
            .iter()
            .all(|&slot| slot.and_then(|k| shaders.shader(k)).is_some_and(|s| s.is_valid()));
        if !ready {
            Self::fail_link(program, "Attached shader is missing or not compiled".to_string());
            return false;
        }

        for (name, index) in &program.bind_attrib_locations {
            driver.bind_attrib_location(program.service_id, *index, name);
        }
        driver.link_program(program.service_id);
        if !driver.program_link_status(program.service_id) {
            let log = driver.program_info_log(program.service_id);
            Self::fail_link(program, log);
            return false;
        }

        program.executable = Some(Self::build_executable(
            program.service_id,
            &program.bind_uniform_locations,
            max_vertex_attribs,
            driver,
        ));
        program.link_status = true;
        program.log_info = None;
        crate::gpu_debug!("gpu::ProgramManager", "Linked program {}", program.service_id);
        true
    }

    fn fail_link(program: &mut Program, log: String) {
        crate::gpu_debug!("gpu::ProgramManager", "Link of program {} failed: {}", program.service_id, log);
        program.link_status = false;
        program.log_info = Some(log);
        if program.use_count == 0 {
            program.executable = None;
        }
    }

    fn build_executable(
        service_id: u32,
        bound_uniforms: &FxHashMap<String, i32>,
        max_vertex_attribs: u32,
        driver: &mut dyn GraphicsDriver,
    ) -> ProgramExecutable {
        let mut exe = ProgramExecutable {
            attrib_location_to_index: vec![None; max_vertex_attribs as usize],
            ..Default::default()
        };

        for attrib in driver.active_attributes(service_id) {
            if attrib.name.starts_with("gl_") {
                continue;
            }
            let location = driver.attrib_location(service_id, &attrib.name);
            if let Some(slot) = usize::try_from(location)
                .ok()
                .and_then(|l| exe.attrib_location_to_index.get_mut(l))
            {
                *slot = Some(exe.attribs.len());
            }
            exe.attribs.push(AttribInfo {
                name: attrib.name,
                ty: attrib.ty,
                size: attrib.size,
                location,
            });
        }

        let mut pending = Vec::new();
        for uniform in driver.active_uniforms(service_id) {
            if uniform.name.starts_with("gl_") {
                continue;
            }
            let is_array = uniform.name.ends_with("[0]") || uniform.size > 1;
            let base = uniform.name.strip_suffix("[0]").unwrap_or(&uniform.name).to_string();
            let element_locations = (0..uniform.size.max(1))
                .map(|i| {
                    if is_array {
                        driver.uniform_location(service_id, &format!("{}[{}]", base, i))
                    } else {
                        driver.uniform_location(service_id, &base)
                    }
                })
                .collect::<Vec<_>>();
            let texture_units = if gl::is_sampler_type(uniform.ty) {
                vec![0; element_locations.len()]
            } else {
                Vec::new()
            };
            let info = UniformInfo {
                name: uniform.name,
                ty: uniform.ty,
                size: uniform.size.max(1),
                is_array,
                element_locations,
                texture_units,
            };
            pending.push((bound_uniforms.get(&base).copied(), info));
        }

        // Bound uniforms claim their slots first, the rest fill the gaps
        let (bound, unbound): (Vec<_>, Vec<_>) = pending.into_iter().partition(|(loc, _)| loc.is_some());
        for (location, info) in bound {
            let index = location.unwrap_or(0) as usize;
            if exe.uniforms.len() <= index {
                exe.uniforms.resize(index + 1, None);
            }
            if exe.uniforms[index].is_some() {
                crate::gpu_warn!(
                    "gpu::ProgramManager",
                    "Uniform location {} bound twice in program {}",
                    index,
                    service_id
                );
                continue;
            }
            exe.uniforms[index] = Some(info);
        }
        let mut next_free = 0;
        for (_, info) in unbound {
            while exe.uniforms.get(next_free).is_some_and(|slot| slot.is_some()) {
                next_free += 1;
            }
            if next_free == exe.uniforms.len() {
                exe.uniforms.push(None);
            }
            exe.uniforms[next_free] = Some(info);
        }
        exe.sampler_indices = exe
            .uniforms
            .iter()
            .enumerate()
            .filter(|(_, u)| u.as_ref().is_some_and(|u| u.is_sampler()))
            .map(|(i, _)| i)
            .collect();
        exe
    }

    /// Zero every uniform; the program must be current on the driver
    pub fn clear_uniforms(&self, key: ProgramKey, driver: &mut dyn GraphicsDriver) {
        let Some(exe) = self.programs.get(key).and_then(|p| p.executable.as_ref()) else {
            return;
        };
        for info in exe.uniforms() {
            let Some(&location) = info.element_locations.first() else {
                continue;
            };
            let components = gl::uniform_type_components(info.ty).unwrap_or(1) as usize;
            let count = components * info.size as usize;
            match info.ty {
                gl::FLOAT_MAT2 => driver.uniform_matrix_fv(location, 2, &vec![0.0; count]),
                gl::FLOAT_MAT3 => driver.uniform_matrix_fv(location, 3, &vec![0.0; count]),
                gl::FLOAT_MAT4 => driver.uniform_matrix_fv(location, 4, &vec![0.0; count]),
                gl::FLOAT | gl::FLOAT_VEC2 | gl::FLOAT_VEC3 | gl::FLOAT_VEC4 => {
                    driver.uniform_fv(location, components, &vec![0.0; count])
                }
                _ => driver.uniform_iv(location, components, &vec![0; count]),
            }
        }
    }

    /// Record the texture units of a sampler uniform
    ///
    /// Returns false when `location` does not name a sampler.
    pub fn set_samplers(&mut self, key: ProgramKey, location: i32, units: &[i32]) -> bool {
        let Some((index, element)) = decode_fake_location(location) else {
            return false;
        };
        let Some(info) = self
            .programs
            .get_mut(key)
            .and_then(|p| p.executable.as_mut())
            .and_then(|e| e.uniforms.get_mut(index))
            .and_then(|u| u.as_mut())
        else {
            return false;
        };
        if !info.is_sampler() {
            return false;
        }
        for (slot, unit) in info.texture_units.iter_mut().skip(element).zip(units) {
            *slot = *unit as u32;
        }
        true
    }

    pub fn validate(&mut self, key: ProgramKey, driver: &mut dyn GraphicsDriver) -> bool {
        let Some(program) = self.programs.get_mut(key) else {
            return false;
        };
        if !program.link_status {
            program.valid = false;
            program.log_info = Some("Program has not been successfully linked".to_string());
            return false;
        }
        program.valid = driver.validate_program(program.service_id);
        if !program.valid {
            program.log_info = Some(driver.program_info_log(program.service_id));
        }
        program.valid
    }

    /// A context made this program current
    pub fn use_program(&mut self, key: ProgramKey) {
        if let Some(program) = self.programs.get_mut(key) {
            program.use_count += 1;
        }
        self.programs.add_ref(key);
    }

    /// A context stopped using this program. Returns the client id freed
    /// when this destroyed a program already marked deleted.
    pub fn unuse_program(
        &mut self,
        key: ProgramKey,
        shaders: &mut ShaderManager,
        driver: Option<&mut dyn GraphicsDriver>,
    ) -> Option<u32> {
        if let Some(program) = self.programs.get_mut(key) {
            program.use_count = program.use_count.saturating_sub(1);
        }
        let client_id = self.programs.client_id(key);
        self.release(key, shaders, driver)
            .then_some(client_id)
            .flatten()
    }

    /// `DeleteProgram`: destruction waits until no context uses the program
    pub fn mark_as_deleted(
        &mut self,
        key: ProgramKey,
        shaders: &mut ShaderManager,
        driver: Option<&mut dyn GraphicsDriver>,
    ) {
        match self.programs.get_mut(key) {
            Some(program) if !program.deleted => program.deleted = true,
            _ => return,
        }
        self.release(key, shaders, driver);
    }

    fn release(&mut self, key: ProgramKey, shaders: &mut ShaderManager, driver: Option<&mut dyn GraphicsDriver>) -> bool {
        match self.programs.release(key) {
            Some(program) => {
                Self::destroy_program(program, shaders, driver);
                true
            }
            None => false,
        }
    }

    fn destroy_program(program: Program, shaders: &mut ShaderManager, driver: Option<&mut dyn GraphicsDriver>) {
        for shader in program.attached_shaders.into_iter().flatten() {
            shaders.unuse_shader(shader);
        }
        if let Some(driver) = driver {
            driver.delete_program(program.service_id);
        }
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    pub fn destroy(&mut self, shaders: &mut ShaderManager, mut driver: Option<&mut dyn GraphicsDriver>) {
        for program in self.programs.drain() {
            Self::destroy_program(program, shaders, reborrow(&mut driver));
        }
    }
}

#[cfg(test)]
#[path = "program_manager_tests.rs"]
mod tests;
