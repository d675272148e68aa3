//! Per-context command interpreter
//!
//! A `Decoder` owns one driver context and the client-visible state of that
//! context. `execute()` checks a command's declared length against the
//! command table, then hands the typed record to a handler. Handlers
//! validate every argument, resolve shared memory through bounds-checked
//! windows and only then touch managers or the driver. GL errors are sticky
//! bits drained by `GetError`; nothing unwinds past `execute()`.
//!
//! Handlers are split by object kind across the sibling modules; they all
//! extend `impl Decoder`.

pub mod bucket;
pub mod clear;
pub mod commands;
pub mod context_state;
pub mod error_state;
pub mod offscreen;
pub mod scoped_binders;

mod buffers;
mod chromium;
mod common;
mod draw;
mod framebuffers;
mod programs;
mod queries;
mod state;
mod textures;
mod vertex_arrays;

#[cfg(test)]
mod test_support;

use self::bucket::BucketTable;
use self::clear::{clear_mask_for, clear_with_defaults, DriverLevelClearer};
use self::commands::{Command, CommandId};
use self::context_state::ContextState;
use self::draw::AttribEmulation;
use self::error_state::ErrorState;
use self::offscreen::{OffscreenFormat, OffscreenTarget, RestoreBindings};
use self::scoped_binders::ScopedFramebufferBinder;
use self::vertex_arrays::VertexArrays;
use crate::context_group::{DecoderId, GroupResources, IdNamespace, SharedContextGroup};
use crate::driver::{GraphicsDriver, Surface};
use crate::error::{ContextLostReason, Error, Result};
use crate::feature::{DisallowedFeatures, FeatureFlags, FeatureSet, Workarounds};
use crate::gl;
use crate::query::{AsyncTransferManager, QueryManager};
use crate::resource::{FramebufferKey, ProgramKey, TextureKey};
use crate::shared_memory::{SharedMemoryError, SharedMemoryManager, SharedMemoryRef, SharedMemoryRegion};
use crate::sync_point::SyncPointManager;
use rustc_hash::FxHashSet;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

// ===== OUTCOMES =====

/// Successful outcome of one command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Done,
    /// Not executed yet; the parser retries the same command later
    Deferred,
}

/// Command-level failure; GL errors are not reported here
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// Record length does not fit the buffer it came from
    InvalidSize,
    /// A shared-memory range or immediate payload is out of bounds
    OutOfBounds,
    UnknownCommand,
    /// Declared arity mismatch or malformed arguments
    InvalidArguments,
    LostContext,
    GenericError,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::InvalidSize => write!(f, "invalid command size"),
            CommandError::OutOfBounds => write!(f, "shared memory access out of bounds"),
            CommandError::UnknownCommand => write!(f, "unknown command"),
            CommandError::InvalidArguments => write!(f, "invalid arguments"),
            CommandError::LostContext => write!(f, "context lost"),
            CommandError::GenericError => write!(f, "generic error"),
        }
    }
}

impl std::error::Error for CommandError {}

impl From<SharedMemoryError> for CommandError {
    fn from(_: SharedMemoryError) -> Self {
        CommandError::OutOfBounds
    }
}

pub type CommandResult = std::result::Result<CommandOutcome, CommandError>;

fn done() -> CommandResult {
    Ok(CommandOutcome::Done)
}

/// Typed fixed record of `C` at the start of `args`
fn parse<C: Command>(args: &[u32]) -> std::result::Result<C, CommandError> {
    C::from_args(args).ok_or(CommandError::InvalidArguments)
}

/// Words following the fixed record of `C`
fn immediate<C: Command>(args: &[u32]) -> &[u32] {
    args.get(C::ARG_COUNT as usize..).unwrap_or(&[])
}

/// First `n` words of an immediate payload; `None` when `n` is negative
fn immediate_ids(data: &[u32], n: i32) -> std::result::Result<Option<&[u32]>, CommandError> {
    let Ok(n) = usize::try_from(n) else {
        return Ok(None);
    };
    data.get(..n).map(Some).ok_or(CommandError::OutOfBounds)
}

/// Ids a Gen command may create: non-zero, unique, not yet in use
fn ids_are_new(ids: &[u32], in_use: impl Fn(u32) -> bool) -> bool {
    let mut seen = FxHashSet::default();
    ids.iter().all(|&id| id != 0 && seen.insert(id) && !in_use(id))
}

/// Validate a Gen payload against the manager and the group allocator,
/// then claim the ids
fn claim_ids(
    res: &mut GroupResources<'_>,
    namespace: IdNamespace,
    ids: &[u32],
    exists: impl Fn(&GroupResources<'_>, u32) -> bool,
) -> bool {
    if !ids_are_new(ids, |id| exists(res, id) || res.id_in_use(namespace, id)) {
        return false;
    }
    for &id in ids {
        res.id_allocator(namespace).mark_as_used(id);
    }
    true
}

/// Clip the span `start..start + len` to `0..limit`; returns the clipped
/// start and length (length 0 when nothing overlaps)
fn clip(start: i32, len: i32, limit: i32) -> (i32, i32) {
    let begin = start.clamp(0, limit);
    let end = start.saturating_add(len).clamp(0, limit);
    (begin, (end - begin).max(0))
}

fn has_alpha(format: u32) -> bool {
    matches!(
        format,
        gl::ALPHA | gl::LUMINANCE_ALPHA | gl::RGBA | gl::BGRA_EXT | gl::RGBA4 | gl::RGB5_A1 | gl::RGBA8_OES | gl::BGRA8_EXT
    )
}

fn reason_for_status(status: u32) -> ContextLostReason {
    match status {
        gl::GUILTY_CONTEXT_RESET => ContextLostReason::Guilty,
        gl::INNOCENT_CONTEXT_RESET => ContextLostReason::Innocent,
        _ => ContextLostReason::Unknown,
    }
}

// ===== LIFECYCLE =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    Uninitialized,
    Initialized,
    Executing,
    Idle,
    Lost,
    Destroyed,
}

/// Attributes requested for the decoder's back buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextAttribs {
    pub alpha_size: i32,
    pub depth_size: i32,
    pub stencil_size: i32,
    pub samples: i32,
    /// Render into a service-owned target instead of the surface
    pub offscreen: bool,
    /// Back buffer keeps its contents across swaps
    pub buffer_preserved: bool,
    /// Refuse to initialize on a software renderer
    pub fail_if_major_perf_caveat: bool,
}

impl Default for ContextAttribs {
    fn default() -> Self {
        Self {
            alpha_size: 8,
            depth_size: 24,
            stencil_size: 8,
            samples: 0,
            offscreen: false,
            buffer_preserved: true,
            fail_if_major_perf_caveat: false,
        }
    }
}

/// ReadPixels waiting for its fence before publishing
struct PendingReadPixels {
    fence: u64,
    pixels: Vec<u8>,
    destination: SharedMemoryRef,
    result: SharedMemoryRef,
    width: u32,
    height: u32,
}

pub struct Decoder {
    id: DecoderId,
    status: DecoderState,
    driver: Box<dyn GraphicsDriver>,
    surface: Box<dyn Surface>,
    group: SharedContextGroup,
    features: Option<Arc<FeatureSet>>,
    lost_status: Arc<AtomicU32>,
    lost_reason: Option<ContextLostReason>,
    attribs: ContextAttribs,
    state: ContextState,
    errors: ErrorState,
    buckets: BucketTable,
    shared_memory: SharedMemoryManager,
    queries: Option<QueryManager>,
    transfers: Option<AsyncTransferManager>,
    vertex: VertexArrays,
    emulation: AttribEmulation,
    offscreen: Option<OffscreenTarget>,
    backbuffer_cleared: bool,
    sync_points: Option<Arc<SyncPointManager>>,
    pending_reads: VecDeque<PendingReadPixels>,
    /// Programs whose uniforms were zeroed since their last link
    uniforms_cleared: FxHashSet<ProgramKey>,
    /// The last internal TexImage2D failed; its follow-up TexSubImage2D is
    /// skipped
    tex_image_failed: bool,
    /// Reset status to hand to the rest of the group once its lock is free
    lose_others: Option<u32>,
    token: u32,
}

impl Decoder {
    pub fn new(group: SharedContextGroup, driver: Box<dyn GraphicsDriver>, surface: Box<dyn Surface>) -> Self {
        Self {
            id: DecoderId::next(),
            status: DecoderState::Uninitialized,
            driver,
            surface,
            group,
            features: None,
            lost_status: Arc::new(AtomicU32::new(gl::NO_ERROR)),
            lost_reason: None,
            attribs: ContextAttribs::default(),
            state: ContextState::new(0, 0),
            errors: ErrorState::new(),
            buckets: BucketTable::new(),
            shared_memory: SharedMemoryManager::new(),
            queries: None,
            transfers: None,
            vertex: VertexArrays::new(0),
            emulation: AttribEmulation::default(),
            offscreen: None,
            backbuffer_cleared: false,
            sync_points: None,
            pending_reads: VecDeque::new(),
            uniforms_cleared: FxHashSet::default(),
            tex_image_failed: false,
            lose_others: None,
            token: 0,
        }
    }

    /// Attach to the context group and set up per-context state
    ///
    /// On failure the decoder is detached again and stays `Uninitialized`.
    pub fn initialize(&mut self, attribs: ContextAttribs, disallowed: &DisallowedFeatures) -> Result<()> {
        if self.status != DecoderState::Uninitialized {
            crate::gpu_bail!("gpu::Decoder", "Decoder {} initialized twice", self.id.raw());
        }
        let group = Arc::clone(&self.group);
        let mut guard = group
            .lock()
            .map_err(|_| crate::gpu_err!("gpu::Decoder", "context group lock poisoned"))?;
        let attachment = guard.attach(self.id, disallowed, self.driver.as_mut())?;

        let result = match guard.resources() {
            Some(mut res) => self.initialize_attached(&mut res, &attachment.features, attribs),
            None => Err(Error::InitializationFailed("context group has no managers".to_string())),
        };
        if let Err(err) = result {
            if let Some(target) = self.offscreen.take() {
                target.destroy(Some(self.driver.as_mut()));
            }
            self.transfers = None;
            self.queries = None;
            guard.detach(self.id, self.driver.as_mut(), true);
            return Err(err);
        }

        self.lost_status = attachment.lost_status;
        self.features = Some(attachment.features);
        self.status = DecoderState::Initialized;
        crate::gpu_info!(
            "gpu::Decoder",
            "Decoder {} initialized ({}, {}x{})",
            self.id.raw(),
            if self.offscreen.is_some() { "offscreen" } else { "onscreen" },
            self.backbuffer_size().0,
            self.backbuffer_size().1
        );
        Ok(())
    }

    fn initialize_attached(
        &mut self,
        res: &mut GroupResources<'_>,
        features: &Arc<FeatureSet>,
        mut attribs: ContextAttribs,
    ) -> Result<()> {
        let limits = &features.limits;
        if attribs.fail_if_major_perf_caveat {
            let renderer = self.driver.get_string(gl::RENDERER);
            if renderer.contains("SwiftShader") || renderer.contains("Software") {
                return Err(Error::InitializationFailed(format!(
                    "renderer '{}' has a major performance caveat",
                    renderer
                )));
            }
        }

        attribs.samples = if features.has(FeatureFlags::CHROMIUM_FRAMEBUFFER_MULTISAMPLE) {
            attribs.samples.clamp(0, limits.max_samples as i32)
        } else {
            0
        };
        self.transfers = Some(AsyncTransferManager::new()?);
        self.state = ContextState::new(limits.max_texture_units, limits.max_vertex_attribs);
        self.vertex = VertexArrays::new(limits.max_vertex_attribs);
        self.queries = Some(QueryManager::new(features));

        let (width, height) = self.surface.size();
        if attribs.offscreen {
            let format = OffscreenFormat::choose(
                attribs.alpha_size,
                attribs.depth_size,
                attribs.stencil_size,
                attribs.samples,
                features.has(FeatureFlags::PACKED_DEPTH24_STENCIL8),
            );
            let target =
                OffscreenTarget::create(self.driver.as_mut(), format, width, height, RestoreBindings::default())?;
            self.driver.bind_framebuffer(gl::FRAMEBUFFER, target.framebuffer_id());
            self.offscreen = Some(target);
        } else {
            let format = self.surface.format();
            attribs.alpha_size = format.alpha_bits;
            attribs.depth_size = format.depth_bits;
            attribs.stencil_size = format.stencil_bits;
            attribs.samples = 0;
        }
        self.attribs = attribs;

        self.bind_default_textures(res, features);
        if features.gl_version.is_desktop() {
            self.emulation = AttribEmulation::new(self.driver.as_mut());
        }
        let (width, height) = self.backbuffer_size();
        self.state.viewport = [0, 0, width, height];
        self.state.scissor = [0, 0, width, height];
        self.driver.viewport(0, 0, width, height);
        self.driver.scissor(0, 0, width, height);
        self.backbuffer_cleared = false;
        Ok(())
    }

    /// Bind every default texture on every unit, ending on unit 0
    fn bind_default_textures(&mut self, res: &GroupResources<'_>, features: &FeatureSet) {
        let mut targets = vec![gl::TEXTURE_2D, gl::TEXTURE_CUBE_MAP];
        if features.has(FeatureFlags::OES_EGL_IMAGE_EXTERNAL) {
            targets.push(gl::TEXTURE_EXTERNAL_OES);
        }
        if features.has(FeatureFlags::ARB_TEXTURE_RECTANGLE) {
            targets.push(gl::TEXTURE_RECTANGLE_ARB);
        }
        for unit in (0..self.state.texture_units.len() as u32).rev() {
            self.driver.active_texture(gl::TEXTURE0 + unit);
            for target in &targets {
                let service = res
                    .textures
                    .default_texture(*target)
                    .and_then(|key| res.textures.texture(key))
                    .map(|texture| texture.service_id());
                if let Some(service) = service {
                    self.driver.bind_texture(*target, service);
                }
            }
        }
    }

    /// Execute one command record
    ///
    /// `args` holds the words after the header; only the first `arg_count`
    /// are part of this command.
    pub fn execute(&mut self, command: u32, arg_count: u32, args: &[u32]) -> CommandResult {
        match self.status {
            DecoderState::Uninitialized | DecoderState::Destroyed => return Err(CommandError::GenericError),
            DecoderState::Lost => return Err(CommandError::LostContext),
            _ => {}
        }
        if self.check_lost_status() {
            return Err(CommandError::LostContext);
        }
        self.status = DecoderState::Executing;

        let Some(info) = commands::command_info(command) else {
            crate::gpu_debug!("gpu::Decoder", "Unknown command id {}", command);
            return Err(CommandError::UnknownCommand);
        };
        let args = match args.get(..arg_count as usize) {
            Some(args) if info.accepts(arg_count) => args,
            _ => {
                crate::gpu_debug!(
                    "gpu::Decoder",
                    "{}: bad argument count {} (expected {})",
                    info.name,
                    arg_count,
                    info.arg_count
                );
                return Err(CommandError::InvalidArguments);
            }
        };
        let Some(id) = CommandId::from_u32(command) else {
            return Err(CommandError::UnknownCommand);
        };

        let result = self.dispatch(id, args);
        self.propagate_context_loss();
        if let Err(error) = result {
            if error != CommandError::LostContext {
                crate::gpu_debug!("gpu::Decoder", "{} failed: {}", info.name, error);
            }
        }
        result
    }

    fn dispatch(&mut self, id: CommandId, args: &[u32]) -> CommandResult {
        use self::commands as cmd;
        match id {
            CommandId::Noop => return done(),
            CommandId::SetToken => return self.set_token(parse(args)?),
            CommandId::SetBucketSize => return self.set_bucket_size(parse(args)?),
            CommandId::SetBucketData => return self.set_bucket_data(parse(args)?),
            CommandId::SetBucketDataImmediate => {
                return self.set_bucket_data_immediate(parse(args)?, immediate::<cmd::SetBucketDataImmediate>(args));
            }
            CommandId::GetBucketStart => return self.get_bucket_start(parse(args)?),
            CommandId::GetBucketData => return self.get_bucket_data(parse(args)?),
            _ => {}
        }

        let group = Arc::clone(&self.group);
        let mut guard = group.lock().map_err(|_| CommandError::LostContext)?;
        let mut res = guard.resources().ok_or(CommandError::LostContext)?;
        let res = &mut res;

        match id {
            // ----- Buffers -----
            CommandId::GenBuffersImmediate => {
                self.gen_buffers(res, parse(args)?, immediate::<cmd::GenBuffersImmediate>(args))
            }
            CommandId::DeleteBuffersImmediate => {
                self.delete_buffers(res, parse(args)?, immediate::<cmd::DeleteBuffersImmediate>(args))
            }
            CommandId::BindBuffer => self.bind_buffer(res, parse(args)?),
            CommandId::BufferData => self.buffer_data(res, parse(args)?),
            CommandId::BufferSubData => self.buffer_sub_data(res, parse(args)?),
            CommandId::IsBuffer => self.is_buffer(res, parse(args)?),

            // ----- Vertex attributes -----
            CommandId::EnableVertexAttribArray => self.enable_vertex_attrib_array(res, parse(args)?),
            CommandId::DisableVertexAttribArray => self.disable_vertex_attrib_array(res, parse(args)?),
            CommandId::VertexAttribPointer => self.vertex_attrib_pointer(res, parse(args)?),
            CommandId::VertexAttrib4f => self.vertex_attrib_4f(res, parse(args)?),
            CommandId::GenVertexArraysOESImmediate => {
                self.gen_vertex_arrays(res, parse(args)?, immediate::<cmd::GenVertexArraysOESImmediate>(args))
            }
            CommandId::DeleteVertexArraysOESImmediate => {
                self.delete_vertex_arrays(res, parse(args)?, immediate::<cmd::DeleteVertexArraysOESImmediate>(args))
            }
            CommandId::IsVertexArrayOES => self.is_vertex_array(res, parse(args)?),
            CommandId::BindVertexArrayOES => self.bind_vertex_array(res, parse(args)?),

            // ----- Textures -----
            CommandId::GenTexturesImmediate => {
                self.gen_textures(res, parse(args)?, immediate::<cmd::GenTexturesImmediate>(args))
            }
            CommandId::DeleteTexturesImmediate => {
                self.delete_textures(res, parse(args)?, immediate::<cmd::DeleteTexturesImmediate>(args))
            }
            CommandId::ActiveTexture => self.active_texture(res, parse(args)?),
            CommandId::BindTexture => self.bind_texture(res, parse(args)?),
            CommandId::TexImage2D => self.tex_image_2d(res, parse(args)?),
            CommandId::TexSubImage2D => self.tex_sub_image_2d(res, parse(args)?),
            CommandId::CompressedTexImage2D => self.compressed_tex_image_2d(res, parse(args)?),
            CommandId::CopyTexImage2D => self.copy_tex_image_2d(res, parse(args)?),
            CommandId::CopyTexSubImage2D => self.copy_tex_sub_image_2d(res, parse(args)?),
            CommandId::TexParameteri => self.tex_parameter_i(res, parse(args)?),
            CommandId::TexParameterf => self.tex_parameter_f(res, parse(args)?),
            CommandId::GenerateMipmap => self.generate_mipmap(res, parse(args)?),
            CommandId::TexStorage2DEXT => self.tex_storage_2d(res, parse(args)?),
            CommandId::IsTexture => self.is_texture(res, parse(args)?),
            CommandId::AsyncTexImage2DCHROMIUM => self.async_tex_image_2d(res, parse(args)?),
            CommandId::WaitAsyncTexImage2DCHROMIUM => self.wait_async_tex_image_2d(res, parse(args)?),
            CommandId::ProduceTextureCHROMIUMImmediate => self.produce_texture(
                res,
                parse(args)?,
                immediate::<cmd::ProduceTextureCHROMIUMImmediate>(args),
            ),
            CommandId::ConsumeTextureCHROMIUMImmediate => self.consume_texture(
                res,
                parse(args)?,
                immediate::<cmd::ConsumeTextureCHROMIUMImmediate>(args),
            ),

            // ----- Framebuffers and renderbuffers -----
            CommandId::GenFramebuffersImmediate => {
                self.gen_framebuffers(res, parse(args)?, immediate::<cmd::GenFramebuffersImmediate>(args))
            }
            CommandId::DeleteFramebuffersImmediate => {
                self.delete_framebuffers(res, parse(args)?, immediate::<cmd::DeleteFramebuffersImmediate>(args))
            }
            CommandId::BindFramebuffer => self.bind_framebuffer(res, parse(args)?),
            CommandId::FramebufferTexture2D => self.framebuffer_texture_2d(res, parse(args)?),
            CommandId::FramebufferRenderbuffer => self.framebuffer_renderbuffer(res, parse(args)?),
            CommandId::CheckFramebufferStatus => self.check_framebuffer_status(res, parse(args)?),
            CommandId::IsFramebuffer => self.is_framebuffer(res, parse(args)?),
            CommandId::GenRenderbuffersImmediate => {
                self.gen_renderbuffers(res, parse(args)?, immediate::<cmd::GenRenderbuffersImmediate>(args))
            }
            CommandId::DeleteRenderbuffersImmediate => {
                self.delete_renderbuffers(res, parse(args)?, immediate::<cmd::DeleteRenderbuffersImmediate>(args))
            }
            CommandId::BindRenderbuffer => self.bind_renderbuffer(res, parse(args)?),
            CommandId::RenderbufferStorage => self.renderbuffer_storage(res, parse(args)?),
            CommandId::RenderbufferStorageMultisampleEXT => self.renderbuffer_storage_multisample(res, parse(args)?),
            CommandId::IsRenderbuffer => self.is_renderbuffer(res, parse(args)?),
            CommandId::Clear => self.clear(res, parse(args)?),
            CommandId::ReadPixels => self.read_pixels(res, parse(args)?),

            // ----- Shaders and programs -----
            CommandId::CreateShader => self.create_shader(res, parse(args)?),
            CommandId::DeleteShader => self.delete_shader(res, parse(args)?),
            CommandId::ShaderSourceBucket => self.shader_source_bucket(res, parse(args)?),
            CommandId::CompileShader => self.compile_shader(res, parse(args)?),
            CommandId::GetShaderiv => self.get_shader_iv(res, parse(args)?),
            CommandId::GetShaderInfoLog => self.get_shader_info_log(res, parse(args)?),
            CommandId::GetTranslatedShaderSourceANGLE => self.get_translated_shader_source(res, parse(args)?),
            CommandId::IsShader => self.is_shader(res, parse(args)?),
            CommandId::CreateProgram => self.create_program(res, parse(args)?),
            CommandId::DeleteProgram => self.delete_program(res, parse(args)?),
            CommandId::AttachShader => self.attach_shader(res, parse(args)?),
            CommandId::DetachShader => self.detach_shader(res, parse(args)?),
            CommandId::BindAttribLocationBucket => self.bind_attrib_location_bucket(res, parse(args)?),
            CommandId::BindUniformLocationCHROMIUMBucket => self.bind_uniform_location_bucket(res, parse(args)?),
            CommandId::LinkProgram => self.link_program(res, parse(args)?),
            CommandId::ValidateProgram => self.validate_program(res, parse(args)?),
            CommandId::UseProgram => self.use_program(res, parse(args)?),
            CommandId::GetProgramiv => self.get_program_iv(res, parse(args)?),
            CommandId::GetProgramInfoLog => self.get_program_info_log(res, parse(args)?),
            CommandId::IsProgram => self.is_program(res, parse(args)?),
            CommandId::GetAttribLocationBucket => self.get_attrib_location_bucket(res, parse(args)?),
            CommandId::GetUniformLocationBucket => self.get_uniform_location_bucket(res, parse(args)?),
            CommandId::GetUniformfv => self.get_uniform_fv(res, parse(args)?),
            CommandId::Uniform1f => self.uniform_1f(res, parse(args)?),
            CommandId::Uniform1i => self.uniform_1i(res, parse(args)?),
            CommandId::Uniform1ivImmediate => {
                self.uniform_1iv(res, parse(args)?, immediate::<cmd::Uniform1ivImmediate>(args))
            }
            CommandId::Uniform4f => self.uniform_4f(res, parse(args)?),
            CommandId::Uniform4fvImmediate => {
                self.uniform_4fv(res, parse(args)?, immediate::<cmd::Uniform4fvImmediate>(args))
            }
            CommandId::UniformMatrix4fvImmediate => {
                self.uniform_matrix_4fv(res, parse(args)?, immediate::<cmd::UniformMatrix4fvImmediate>(args))
            }

            // ----- Drawing -----
            CommandId::DrawArrays => self.draw_arrays(res, parse(args)?),
            CommandId::DrawElements => self.draw_elements(res, parse(args)?),
            CommandId::Flush => self.flush(res),
            CommandId::Finish => self.finish(res),
            CommandId::SwapBuffers => self.swap_buffers(res),

            // ----- Fixed-function state -----
            CommandId::BlendFunc => self.blend_func(res, parse(args)?),
            CommandId::ClearColor => self.clear_color(parse(args)?),
            CommandId::ClearDepthf => self.clear_depth(parse(args)?),
            CommandId::ClearStencil => self.clear_stencil(parse(args)?),
            CommandId::ColorMask => self.color_mask(parse(args)?),
            CommandId::CullFace => self.cull_face(res, parse(args)?),
            CommandId::DepthFunc => self.depth_func(res, parse(args)?),
            CommandId::DepthMask => self.depth_mask(parse(args)?),
            CommandId::Enable => self.enable(res, parse(args)?),
            CommandId::Disable => self.disable(res, parse(args)?),
            CommandId::FrontFace => self.front_face(res, parse(args)?),
            CommandId::Hint => self.hint(res, parse(args)?),
            CommandId::PixelStorei => self.pixel_store_i(res, parse(args)?),
            CommandId::Scissor => self.scissor(parse(args)?),
            CommandId::Viewport => self.viewport(parse(args)?),
            CommandId::GetError => self.get_error_cmd(parse(args)?),
            CommandId::GetIntegerv => self.get_integer_v(res, parse(args)?),
            CommandId::GetString => self.get_string(res, parse(args)?),

            // ----- Queries -----
            CommandId::GenQueriesEXTImmediate => {
                self.gen_queries(res, parse(args)?, immediate::<cmd::GenQueriesEXTImmediate>(args))
            }
            CommandId::DeleteQueriesEXTImmediate => {
                self.delete_queries(res, parse(args)?, immediate::<cmd::DeleteQueriesEXTImmediate>(args))
            }
            CommandId::BeginQueryEXT => self.begin_query(res, parse(args)?),
            CommandId::EndQueryEXT => self.end_query(parse(args)?),

            // ----- Extensions -----
            CommandId::GenSharedIdsCHROMIUM => self.gen_shared_ids(res, parse(args)?),
            CommandId::DeleteSharedIdsCHROMIUM => self.delete_shared_ids(res, parse(args)?),
            CommandId::RegisterSharedIdsCHROMIUM => self.register_shared_ids(res, parse(args)?),
            CommandId::LoseContextCHROMIUM => self.lose_context_cmd(parse(args)?),
            CommandId::ResizeCHROMIUM => self.resize(res, parse(args)?),
            CommandId::WaitSyncPointCHROMIUM => self.wait_sync_point(parse(args)?),

            CommandId::Noop
            | CommandId::SetToken
            | CommandId::SetBucketSize
            | CommandId::SetBucketData
            | CommandId::SetBucketDataImmediate
            | CommandId::GetBucketStart
            | CommandId::GetBucketData => done(),
        }
    }

    // ===== IDLE WORK =====

    /// Whether `perform_idle_work` has anything to drain
    pub fn has_idle_work(&self) -> bool {
        self.queries.as_ref().is_some_and(|q| q.have_pending())
            || self.transfers.as_ref().is_some_and(|t| t.has_pending())
            || !self.pending_reads.is_empty()
    }

    /// Upload staged transfers, publish finished queries and async reads
    ///
    /// A no-op when nothing is pending or the context is not running.
    pub fn perform_idle_work(&mut self) {
        if !matches!(
            self.status,
            DecoderState::Initialized | DecoderState::Executing | DecoderState::Idle
        ) {
            return;
        }
        if self.check_lost_status() {
            return;
        }
        if self.check_reset_status() {
            self.propagate_context_loss();
            return;
        }
        self.upload_staged_transfers();
        if let Some(queries) = self.queries.as_mut() {
            queries.process_pending(self.driver.as_mut());
        }
        self.process_pending_reads();
        if self.status == DecoderState::Executing {
            self.status = DecoderState::Idle;
        }
    }

    fn upload_staged_transfers(&mut self) {
        let Some(staged) = self.transfers.as_mut().map(|t| t.take_staged()) else {
            return;
        };
        if staged.is_empty() {
            return;
        }
        let group = Arc::clone(&self.group);
        let Ok(mut guard) = group.lock() else {
            return;
        };
        if let Some(mut res) = guard.resources() {
            self.upload_transfers(&mut res, staged);
        }
    }

    fn process_pending_reads(&mut self) {
        while let Some(read) = self.pending_reads.front() {
            if !self.driver.fence_signaled(read.fence) {
                break;
            }
            let Some(read) = self.pending_reads.pop_front() else {
                break;
            };
            self.driver.delete_fence(read.fence);
            let published = read
                .destination
                .write(0, &read.pixels)
                .and_then(|_| read.result.write_u32(4, read.width))
                .and_then(|_| read.result.write_u32(8, read.height))
                .and_then(|_| read.result.store_u32(0, 1, Ordering::Release));
            if let Err(err) = published {
                crate::gpu_warn!("gpu::Decoder", "Async ReadPixels not published: {}", err);
            }
        }
    }

    // ===== CONTEXT LOSS =====

    /// Whether another decoder of the group marked this one lost
    fn check_lost_status(&mut self) -> bool {
        let status = self.lost_status.load(Ordering::Acquire);
        if status == gl::NO_ERROR {
            return false;
        }
        self.mark_lost(reason_for_status(status));
        true
    }

    /// Poll the driver's reset status; a reset loses every context of the
    /// group
    ///
    /// Handlers run under the group lock, so the other decoders are only
    /// told by `propagate_context_loss`.
    fn check_reset_status(&mut self) -> bool {
        let status = self.driver.reset_status();
        if status == gl::NO_ERROR {
            return false;
        }
        let reason = reason_for_status(status);
        crate::gpu_error!("gpu::Decoder", "Driver reset ({:?}) on decoder {}", reason, self.id.raw());
        self.mark_lost(reason);
        let others = if reason == ContextLostReason::Guilty { gl::INNOCENT_CONTEXT_RESET } else { status };
        self.lose_others = Some(others);
        true
    }

    fn propagate_context_loss(&mut self) {
        let Some(status) = self.lose_others.take() else {
            return;
        };
        if let Ok(group) = self.group.lock() {
            group.lose_other_contexts(self.id, status);
        }
    }

    fn mark_lost(&mut self, reason: ContextLostReason) {
        if matches!(self.status, DecoderState::Lost | DecoderState::Destroyed) {
            return;
        }
        self.status = DecoderState::Lost;
        self.lost_reason = Some(reason);
        self.errors.set_gl_error(gl::CONTEXT_LOST, "Decoder", "context lost");
        let exit_requested =
            self.features.as_ref().is_some_and(|f| f.workarounds.contains(Workarounds::EXIT_ON_CONTEXT_LOST));
        if exit_requested {
            crate::gpu_error!("gpu::Decoder", "Context lost ({:?}); the embedder should restart the service", reason);
        } else {
            crate::gpu_warn!("gpu::Decoder", "Decoder {} lost its context ({:?})", self.id.raw(), reason);
        }
    }

    /// Lose this context; every later command fails with `LostContext`
    pub fn lose_context(&mut self, reason: ContextLostReason) {
        self.mark_lost(reason);
    }

    // ===== TEARDOWN =====

    /// Release every binding and detach from the group
    ///
    /// A lost context releases host bookkeeping only. Idempotent.
    pub fn destroy(&mut self) {
        if matches!(self.status, DecoderState::Uninitialized | DecoderState::Destroyed) {
            self.status = DecoderState::Destroyed;
            return;
        }
        let has_context = self.status != DecoderState::Lost;
        let group = Arc::clone(&self.group);
        match group.lock() {
            Ok(mut guard) => {
                if let Some(mut res) = guard.resources() {
                    self.release_bindings(&mut res, has_context);
                }
                guard.detach(self.id, self.driver.as_mut(), has_context);
            }
            Err(_) => {
                crate::gpu_error!("gpu::Decoder", "Context group lock poisoned; decoder {} not detached", self.id.raw());
            }
        }
        self.status = DecoderState::Destroyed;
        crate::gpu_debug!("gpu::Decoder", "Decoder {} destroyed", self.id.raw());
    }

    fn release_bindings(&mut self, res: &mut GroupResources<'_>, has_context: bool) {
        let mut driver: Option<&mut dyn GraphicsDriver> = if has_context { Some(self.driver.as_mut()) } else { None };
        use crate::driver::reborrow;

        for unit in &mut self.state.texture_units {
            let bound: Vec<TextureKey> = unit.bindings().map(|(_, key)| key).collect();
            *unit = Default::default();
            for key in bound {
                res.textures.release(key, reborrow(&mut driver));
            }
        }
        if let Some(key) = self.state.bound_array_buffer.take() {
            res.buffers.release(key, reborrow(&mut driver));
        }
        self.vertex.default.release_buffers(res.buffers, reborrow(&mut driver));
        self.vertex.manager.destroy(res.buffers, reborrow(&mut driver));
        self.state.vertex_array = None;
        for key in [self.state.bound_read_framebuffer.take(), self.state.bound_draw_framebuffer.take()]
            .into_iter()
            .flatten()
        {
            res.framebuffers.release(key, res.textures, res.renderbuffers, reborrow(&mut driver));
        }
        if let Some(key) = self.state.bound_renderbuffer.take() {
            res.renderbuffers.release(key, reborrow(&mut driver));
        }
        if let Some(key) = self.state.current_program.take() {
            if let Some(driver) = driver.as_deref_mut() {
                driver.use_program(0);
            }
            if let Some(client_id) = res.programs.unuse_program(key, res.shaders, reborrow(&mut driver)) {
                res.id_allocator(IdNamespace::Programs).free_id(client_id);
            }
        }
        if let Some(mut queries) = self.queries.take() {
            queries.destroy(reborrow(&mut driver));
        }
        self.transfers = None;
        for read in self.pending_reads.drain(..) {
            if let Some(driver) = driver.as_deref_mut() {
                driver.delete_fence(read.fence);
            }
        }
        if let Some(target) = self.offscreen.take() {
            target.destroy(reborrow(&mut driver));
        }
        std::mem::take(&mut self.emulation).destroy(driver);
    }

    // ===== SHARED MEMORY =====

    pub fn register_shared_memory(&mut self, id: u32, region: Arc<SharedMemoryRegion>) {
        self.shared_memory.register(id, region);
    }

    pub fn unregister_shared_memory(&mut self, id: u32) -> Option<Arc<SharedMemoryRegion>> {
        self.shared_memory.unregister(id)
    }

    /// Bounds-checked window; `OutOfBounds` when the range does not fit
    fn shm(&self, id: u32, offset: u32, size: u32) -> std::result::Result<SharedMemoryRef, CommandError> {
        self.shared_memory.get_address(id, offset, size).ok_or(CommandError::OutOfBounds)
    }

    fn shm_bytes(&self, id: u32, offset: u32, size: u32) -> std::result::Result<Vec<u8>, CommandError> {
        self.shared_memory.read_bytes(id, offset, size).ok_or(CommandError::OutOfBounds)
    }

    fn write_result_u32(&self, id: u32, offset: u32, value: u32) -> CommandResult {
        self.shm(id, offset, 4)?.write_u32(0, value)?;
        done()
    }

    /// Window for a `{ size, data[count] }` result; the client must have
    /// zeroed `size`
    fn sized_result(&self, id: u32, offset: u32, count: usize) -> std::result::Result<SharedMemoryRef, CommandError> {
        let size = count
            .checked_mul(4)
            .and_then(|bytes| bytes.checked_add(4))
            .and_then(|bytes| u32::try_from(bytes).ok())
            .ok_or(CommandError::OutOfBounds)?;
        let result = self.shm(id, offset, size)?;
        if result.read_u32(0)? != 0 {
            return Err(CommandError::InvalidArguments);
        }
        Ok(result)
    }

    fn write_sized_result(result: &SharedMemoryRef, values: &[u32]) -> CommandResult {
        for (i, value) in values.iter().enumerate() {
            result.write_u32(4 + i * 4, *value)?;
        }
        result.write_u32(0, values.len() as u32)?;
        done()
    }

    // ===== ERROR HELPERS =====

    fn set_error(&mut self, error: u32, function: &str, message: &str) -> CommandResult {
        self.errors.set_gl_error(error, function, message);
        done()
    }

    fn invalid_enum(&mut self, function: &str, value: u32, label: &str) -> CommandResult {
        self.errors.set_gl_error_invalid_enum(function, value, label);
        done()
    }

    // ===== BINDING HELPERS =====

    /// Texture bound to `target` on the active unit, the default texture
    /// when nothing is
    fn bound_texture(&self, res: &GroupResources<'_>, target: u32) -> Option<TextureKey> {
        self.state
            .bound_texture(target)
            .or_else(|| res.textures.default_texture(gl::bind_target_for(target)))
    }

    /// `(bind target, service id)` of everything unit 0 has bound
    fn unit0_bindings(&self, res: &GroupResources<'_>) -> Vec<(u32, u32)> {
        let Some(unit) = self.state.texture_units.first() else {
            return Vec::new();
        };
        [gl::TEXTURE_2D, gl::TEXTURE_CUBE_MAP, gl::TEXTURE_EXTERNAL_OES, gl::TEXTURE_RECTANGLE_ARB]
            .into_iter()
            .filter_map(|target| {
                let key = unit.bound(target).or_else(|| res.textures.default_texture(target))?;
                Some((target, res.textures.texture(key)?.service_id()))
            })
            .collect()
    }

    fn backbuffer_id(&self) -> u32 {
        self.offscreen.as_ref().map_or(0, OffscreenTarget::framebuffer_id)
    }

    fn backbuffer_size(&self) -> (i32, i32) {
        match &self.offscreen {
            Some(target) => target.size(),
            None => self.surface.size(),
        }
    }

    fn framebuffer_service_id(&self, res: &GroupResources<'_>, key: Option<FramebufferKey>) -> u32 {
        match key {
            Some(key) => res.framebuffers.framebuffer(key).map_or(0, |fb| fb.service_id()),
            None => self.backbuffer_id(),
        }
    }

    /// `(width, height, internal format)` of the buffer reads come from
    fn read_buffer_info(&self, res: &GroupResources<'_>) -> (i32, i32, u32) {
        match self.state.bound_read_framebuffer {
            Some(key) => res
                .framebuffers
                .color_attachment_info(key, res.textures, res.renderbuffers)
                .map_or((0, 0, gl::NONE), |info| (info.width, info.height, info.internal_format)),
            None => {
                let (width, height) = self.backbuffer_size();
                let format = if self.attribs.alpha_size > 0 { gl::RGBA } else { gl::RGB };
                (width, height, format)
            }
        }
    }

    fn restore_bindings(&self, res: &GroupResources<'_>) -> RestoreBindings {
        RestoreBindings {
            texture_2d: self
                .unit0_bindings(res)
                .iter()
                .find(|(target, _)| *target == gl::TEXTURE_2D)
                .map_or(0, |(_, id)| *id),
            active_unit: self.state.active_texture_unit,
            renderbuffer: self
                .state
                .bound_renderbuffer
                .and_then(|key| res.renderbuffers.renderbuffer(key))
                .map_or(0, |rb| rb.service_id()),
            framebuffer: self.framebuffer_service_id(res, self.state.bound_draw_framebuffer),
        }
    }

    // ===== LAZY CLEARING =====

    fn level_clearer_inputs(&self, res: &GroupResources<'_>) -> (Vec<(u32, u32)>, u32, bool) {
        (
            self.unit0_bindings(res),
            self.framebuffer_service_id(res, self.state.bound_draw_framebuffer),
            res.features.workarounds.contains(Workarounds::CLEAR_DEPTH_TEXTURE_WITH_FRAMEBUFFER),
        )
    }

    /// Clear one texture level if it is uncleared
    fn clear_texture_level(&mut self, res: &mut GroupResources<'_>, key: TextureKey, target: u32, level: i32) -> bool {
        let (bindings, framebuffer, depth_with_framebuffer) = self.level_clearer_inputs(res);
        let mut clearer =
            DriverLevelClearer::new(self.driver.as_mut(), &self.state, bindings, framebuffer, depth_with_framebuffer);
        res.textures.clear_texture_level(key, target, level, &mut clearer)
    }

    /// Clear every uncleared level of a texture about to be sampled
    fn clear_render_texture(&mut self, res: &mut GroupResources<'_>, key: TextureKey) -> bool {
        let (bindings, framebuffer, depth_with_framebuffer) = self.level_clearer_inputs(res);
        let mut clearer =
            DriverLevelClearer::new(self.driver.as_mut(), &self.state, bindings, framebuffer, depth_with_framebuffer);
        res.textures.clear_render_texture(key, &mut clearer)
    }

    /// Confirm the framebuffer bound for reading or drawing is complete and
    /// fully cleared; raises INVALID_FRAMEBUFFER_OPERATION otherwise
    fn check_framebuffer_valid(&mut self, res: &mut GroupResources<'_>, read: bool, function: &str) -> bool {
        let bound = if read { self.state.bound_read_framebuffer } else { self.state.bound_draw_framebuffer };
        let Some(key) = bound else {
            self.clear_backbuffer_if_needed(res);
            return true;
        };
        if !res.framebuffers.is_complete(key) {
            let mut status = res.framebuffers.is_possibly_complete(key, res.textures, res.renderbuffers);
            if status == gl::FRAMEBUFFER_COMPLETE {
                let target = if read && self.state.bound_read_framebuffer != self.state.bound_draw_framebuffer {
                    gl::READ_FRAMEBUFFER_EXT
                } else {
                    gl::FRAMEBUFFER
                };
                status = self.driver.check_framebuffer_status(target);
            }
            if status != gl::FRAMEBUFFER_COMPLETE {
                self.errors.set_gl_error(gl::INVALID_FRAMEBUFFER_OPERATION, function, "framebuffer incomplete");
                return false;
            }
            res.framebuffers.mark_as_complete(key);
        }
        if !res.framebuffers.is_cleared(key, res.textures, res.renderbuffers) {
            self.clear_framebuffer_attachments(res, key);
        }
        true
    }

    fn clear_framebuffer_attachments(&mut self, res: &mut GroupResources<'_>, key: FramebufferKey) {
        let uncleared = res.framebuffers.uncleared_attachments(key, res.textures, res.renderbuffers);
        let mask = clear_mask_for(uncleared.iter().map(|(point, _)| *point));
        let service = self.framebuffer_service_id(res, Some(key));
        let previous = self.framebuffer_service_id(res, self.state.bound_draw_framebuffer);
        {
            let mut binder = ScopedFramebufferBinder::new(self.driver.as_mut(), service, previous);
            clear_with_defaults(binder.driver(), &self.state, mask);
        }
        if self.state.bound_read_framebuffer != self.state.bound_draw_framebuffer {
            let read = self.framebuffer_service_id(res, self.state.bound_read_framebuffer);
            self.driver.bind_framebuffer(gl::READ_FRAMEBUFFER_EXT, read);
        }
        res.framebuffers.mark_attachments_cleared(key, res.textures, res.renderbuffers);
    }

    /// The back buffer starts undefined; clear it before its first use
    fn clear_backbuffer_if_needed(&mut self, res: &GroupResources<'_>) {
        if self.backbuffer_cleared {
            return;
        }
        let mut mask = gl::COLOR_BUFFER_BIT;
        if self.attribs.depth_size > 0 {
            mask |= gl::DEPTH_BUFFER_BIT;
        }
        if self.attribs.stencil_size > 0 {
            mask |= gl::STENCIL_BUFFER_BIT;
        }
        let previous = self.framebuffer_service_id(res, self.state.bound_draw_framebuffer);
        let backbuffer = self.backbuffer_id();
        let mut binder = ScopedFramebufferBinder::new(self.driver.as_mut(), backbuffer, previous);
        clear_with_defaults(binder.driver(), &self.state, mask);
        self.backbuffer_cleared = true;
    }

    // ===== ACCESSORS =====

    pub fn id(&self) -> DecoderId {
        self.id
    }

    pub fn state(&self) -> DecoderState {
        self.status
    }

    pub fn is_lost(&self) -> bool {
        self.status == DecoderState::Lost
    }

    /// Why the context was lost, `None` while it is not
    pub fn lost_reason(&self) -> Option<ContextLostReason> {
        self.lost_reason
    }

    /// Last token the client wrote with `SetToken`
    pub fn token(&self) -> u32 {
        self.token
    }

    pub fn attribs(&self) -> &ContextAttribs {
        &self.attribs
    }

    pub fn features(&self) -> Option<&Arc<FeatureSet>> {
        self.features.as_ref()
    }

    pub fn context_state(&self) -> &ContextState {
        &self.state
    }

    /// Poll the sticky error set, folding in driver errors
    pub fn get_error(&mut self) -> u32 {
        self.errors.get_gl_error(self.driver.as_mut())
    }

    pub fn set_sync_point_manager(&mut self, manager: Arc<SyncPointManager>) {
        self.sync_points = Some(manager);
    }

    /// Service id of the texture holding the last swapped offscreen frame
    pub fn offscreen_saved_texture(&self) -> Option<u32> {
        self.offscreen.as_ref().map(OffscreenTarget::saved_texture)
    }

    pub fn backbuffer(&self) -> (u32, (i32, i32)) {
        (self.backbuffer_id(), self.backbuffer_size())
    }

    pub fn driver_mut(&mut self) -> &mut dyn GraphicsDriver {
        self.driver.as_mut()
    }
}

impl Drop for Decoder {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
#[path = "decoder_tests.rs"]
mod tests;
