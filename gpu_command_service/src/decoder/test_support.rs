/// Decoder harness shared by the handler tests
///
/// A decoder on a `MockDriver` and a 64x64 `MockSurface`, with one 4 KiB
/// shared memory region registered as id `SHM`. The driver journal stays
/// readable after the driver moved into the decoder.

use super::commands::{self, Command};
use super::{CommandResult, ContextAttribs, Decoder};
use crate::context_group::{ContextGroup, ContextGroupConfig, SharedContextGroup};
use crate::driver::mock_driver::{MockDriver, MockSurface};
use crate::feature::DisallowedFeatures;
use crate::shared_memory::SharedMemoryRegion;
use std::sync::{Arc, Mutex};

pub const SHM: u32 = 1;
pub const SHM_SIZE: usize = 4096;

pub struct Harness {
    pub decoder: Decoder,
    pub group: SharedContextGroup,
    pub shm: Arc<SharedMemoryRegion>,
    journal: Arc<Mutex<Vec<String>>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_driver(MockDriver::new(), ContextAttribs::default())
    }

    pub fn with_driver(driver: MockDriver, attribs: ContextAttribs) -> Self {
        Self::with_config(driver, attribs, ContextGroupConfig::default())
    }

    pub fn with_config(driver: MockDriver, attribs: ContextAttribs, config: ContextGroupConfig) -> Self {
        Self::in_group(ContextGroup::shared(config), driver, attribs)
    }

    /// Another decoder in an existing share group
    pub fn in_group(group: SharedContextGroup, mut driver: MockDriver, attribs: ContextAttribs) -> Self {
        let journal = driver.journal();
        let mut decoder = Decoder::new(Arc::clone(&group), Box::new(driver), Box::new(MockSurface::new(64, 64)));
        decoder.initialize(attribs, &DisallowedFeatures::default()).unwrap();
        let shm = SharedMemoryRegion::new(SHM_SIZE);
        decoder.register_shared_memory(SHM, Arc::clone(&shm));
        Self { decoder, group, shm, journal }
    }

    pub fn run<C: Command>(&mut self, cmd: C) -> CommandResult {
        self.run_with(cmd, &[])
    }

    /// Encode `cmd` with immediate `data` and execute it
    pub fn run_with<C: Command>(&mut self, cmd: C, data: &[u32]) -> CommandResult {
        let words = commands::encode(&cmd, data);
        self.decoder.execute(C::ID as u32, words.len() as u32 - 1, &words[1..])
    }

    /// Run and require success
    pub fn ok<C: Command>(&mut self, cmd: C) {
        let result = self.run(cmd);
        assert!(result.is_ok(), "{:?} failed: {:?}", C::ID, result);
    }

    pub fn error(&mut self) -> u32 {
        self.decoder.get_error()
    }

    // ===== DRIVER JOURNAL =====

    pub fn calls(&self) -> Vec<String> {
        self.journal.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn called(&self, call: &str) -> bool {
        self.calls().iter().any(|c| c == call)
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn clear_calls(&self) {
        if let Ok(mut calls) = self.journal.lock() {
            calls.clear();
        }
    }

    // ===== SHARED MEMORY =====

    pub fn read_u32(&self, offset: u32) -> u32 {
        self.shm.read_u32(offset as usize).unwrap()
    }

    pub fn write_u32(&self, offset: u32, value: u32) {
        self.shm.write_u32(offset as usize, value).unwrap();
    }

    pub fn write_bytes(&self, offset: u32, bytes: &[u8]) {
        self.shm.write(offset as usize, bytes).unwrap();
    }

    pub fn read_bytes(&self, offset: u32, len: usize) -> Vec<u8> {
        let mut out = vec![0; len];
        self.shm.read(offset as usize, &mut out).unwrap();
        out
    }

    // ===== BUCKETS =====

    pub fn set_bucket(&mut self, id: u32, text: &str) {
        self.decoder.buckets.set_string(id, text);
    }

    pub fn bucket(&self, id: u32) -> Option<String> {
        self.decoder.buckets.string(id)
    }

    // ===== COMMON SETUPS =====

    pub fn gen_buffer(&mut self, id: u32) {
        let result = self.run_with(commands::GenBuffersImmediate { n: 1 }, &[id]);
        assert!(result.is_ok());
    }

    pub fn gen_texture(&mut self, id: u32) {
        let result = self.run_with(commands::GenTexturesImmediate { n: 1 }, &[id]);
        assert!(result.is_ok());
    }

    /// Compile a vertex and a fragment shader and link them into `program`
    pub fn linked_program(&mut self, program: u32, vertex: u32, fragment: u32) {
        self.ok(commands::CreateShader { shader_type: crate::gl::VERTEX_SHADER, client_id: vertex });
        self.ok(commands::CreateShader { shader_type: crate::gl::FRAGMENT_SHADER, client_id: fragment });
        self.set_bucket(9, "void main() {}");
        self.ok(commands::ShaderSourceBucket { shader: vertex, data_bucket_id: 9 });
        self.ok(commands::ShaderSourceBucket { shader: fragment, data_bucket_id: 9 });
        self.ok(commands::CompileShader { shader: vertex });
        self.ok(commands::CompileShader { shader: fragment });
        self.ok(commands::CreateProgram { client_id: program });
        self.ok(commands::AttachShader { program, shader: vertex });
        self.ok(commands::AttachShader { program, shader: fragment });
        self.ok(commands::LinkProgram { program });
    }
}
