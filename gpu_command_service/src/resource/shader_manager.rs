/// Shaders and their manager.
///
/// A shader flagged for deletion while still attached to a program keeps its
/// client handle (so `IsShader` stays true) until the last program detaches it.

use super::object_table::ObjectTable;
use crate::driver::GraphicsDriver;
use crate::shader_translator::{DeclaredVariable, ShaderTranslator, TranslatedShader, TranslatorResources};

slotmap::new_key_type! {
    /// Stable key of a shader in the shader arena
    pub struct ShaderKey;
}

pub struct Shader {
    service_id: u32,
    shader_type: u32,
    source: Option<String>,
    translated_source: Option<String>,
    log_info: Option<String>,
    valid: bool,
    variables: Vec<DeclaredVariable>,
    /// Programs this shader is attached to
    use_count: u32,
    deleted: bool,
}

impl Shader {
    pub fn service_id(&self) -> u32 {
        self.service_id
    }

    pub fn shader_type(&self) -> u32 {
        self.shader_type
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn translated_source(&self) -> Option<&str> {
        self.translated_source.as_deref()
    }

    pub fn log_info(&self) -> Option<&str> {
        self.log_info.as_deref()
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn variables(&self) -> &[DeclaredVariable] {
        &self.variables
    }

    pub fn in_use(&self) -> bool {
        self.use_count > 0
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }
}

/// Tracks every shader of a context group
pub struct ShaderManager {
    shaders: ObjectTable<ShaderKey, Shader>,
}

impl ShaderManager {
    pub fn new() -> Self {
        Self { shaders: ObjectTable::new() }
    }

    pub fn create_shader(&mut self, client_id: u32, service_id: u32, shader_type: u32) -> ShaderKey {
        self.shaders.insert(
            client_id,
            Shader {
                service_id,
                shader_type,
                source: None,
                translated_source: None,
                log_info: None,
                valid: false,
                variables: Vec::new(),
                use_count: 0,
                deleted: false,
            },
        )
    }

    pub fn get_shader(&self, client_id: u32) -> Option<ShaderKey> {
        self.shaders.lookup(client_id)
    }

    pub fn shader(&self, key: ShaderKey) -> Option<&Shader> {
        self.shaders.get(key)
    }

    pub fn client_id(&self, key: ShaderKey) -> Option<u32> {
        self.shaders.client_id(key)
    }

    pub fn set_source(&mut self, key: ShaderKey, source: String) {
        if let Some(shader) = self.shaders.get_mut(key) {
            shader.source = Some(source);
        }
    }

    /// Translate the stored source and compile the result on the driver
    pub fn compile(
        &mut self,
        key: ShaderKey,
        translator: &dyn ShaderTranslator,
        resources: &TranslatorResources,
        driver: &mut dyn GraphicsDriver,
    ) -> bool {
        let Some(shader) = self.shaders.get_mut(key) else {
            return false;
        };
        let source = shader.source.clone().unwrap_or_default();
        let TranslatedShader { success, translated_source, info_log, variables } =
            translator.translate(shader.shader_type, &source, resources);
        if !success {
            crate::gpu_debug!("gpu::ShaderManager", "Shader {} failed translation", shader.service_id);
            shader.valid = false;
            shader.translated_source = None;
            shader.variables.clear();
            shader.log_info = Some(info_log);
            return false;
        }
        driver.shader_source(shader.service_id, &translated_source);
        driver.compile_shader(shader.service_id);
        shader.valid = driver.shader_compile_status(shader.service_id);
        shader.log_info = if shader.valid {
            Some(info_log)
        } else {
            Some(driver.shader_info_log(shader.service_id))
        };
        shader.translated_source = Some(translated_source);
        shader.variables = if shader.valid { variables } else { Vec::new() };
        shader.valid
    }

    /// A program attached this shader
    pub fn use_shader(&mut self, key: ShaderKey) {
        if let Some(shader) = self.shaders.get_mut(key) {
            shader.use_count += 1;
        }
        self.shaders.add_ref(key);
    }

    /// A program detached this shader
    pub fn unuse_shader(&mut self, key: ShaderKey) {
        if let Some(shader) = self.shaders.get_mut(key) {
            shader.use_count = shader.use_count.saturating_sub(1);
        }
        self.shaders.release(key);
    }

    /// `DeleteShader`: the handle stays valid until no program uses the shader
    ///
    /// The driver object is deleted right away; the driver itself keeps it
    /// alive while attached.
    pub fn mark_as_deleted(&mut self, key: ShaderKey, driver: Option<&mut dyn GraphicsDriver>) {
        let Some(shader) = self.shaders.get_mut(key) else {
            return;
        };
        if shader.deleted {
            return;
        }
        shader.deleted = true;
        if let Some(driver) = driver {
            driver.delete_shader(shader.service_id);
        }
        self.shaders.release(key);
    }

    pub fn is_shader(&self, client_id: u32) -> bool {
        self.get_shader(client_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.shaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
    }

    pub fn destroy(&mut self, mut driver: Option<&mut dyn GraphicsDriver>) {
        for shader in self.shaders.drain() {
            if shader.deleted {
                continue;
            }
            if let Some(driver) = driver.as_deref_mut() {
                driver.delete_shader(shader.service_id);
            }
        }
    }
}

impl Default for ShaderManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "shader_manager_tests.rs"]
mod tests;
