/// Resource context group - managers shared by every decoder of a share group
///
/// The first `attach` negotiates features and validates driver limits; only
/// then are the managers built. The last `detach` tears them down in a fixed
/// order so framebuffers release their attachments before the texture and
/// renderbuffer managers go away. Dropping a group that still has attached
/// decoders is a programming error and panics.

use crate::driver::{reborrow, GraphicsDriver};
use crate::error::{Error, Result};
use crate::feature::{DisallowedFeatures, FeatureFlags, FeatureSet};
use crate::gl;
use crate::id_allocator::IdAllocator;
use crate::resource::{
    BufferManager, FramebufferManager, MailboxManager, ProgramManager, RenderbufferManager,
    ShaderManager, TextureManager,
};
use crate::shader_translator::{PassthroughTranslator, ShaderTranslator};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// A group shared between decoders
pub type SharedContextGroup = Arc<Mutex<ContextGroup>>;

/// Identity of a decoder within its group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DecoderId(u32);

impl DecoderId {
    /// Process-unique id
    pub fn next() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
}

/// Client-visible id namespaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdNamespace {
    Buffers,
    Framebuffers,
    /// Programs and shaders share one namespace
    Programs,
    Renderbuffers,
    Textures,
    Queries,
    VertexArrays,
    /// Ids for extension mechanisms naming driver-independent objects
    Shared,
}

impl IdNamespace {
    pub const COUNT: usize = 8;

    /// Namespace for a wire value (GenSharedIds and friends)
    pub fn from_wire(value: u32) -> Option<Self> {
        Some(match value {
            0 => IdNamespace::Buffers,
            1 => IdNamespace::Framebuffers,
            2 => IdNamespace::Programs,
            3 => IdNamespace::Renderbuffers,
            4 => IdNamespace::Textures,
            5 => IdNamespace::Queries,
            6 => IdNamespace::VertexArrays,
            7 => IdNamespace::Shared,
            _ => return None,
        })
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Construction parameters of a group
#[derive(Clone)]
pub struct ContextGroupConfig {
    /// Binding an unknown client id creates the object
    pub bind_generates_resource: bool,
    /// Comma separated workaround ids
    pub workarounds: String,
    /// Mailboxes shared with other groups; a private one is created if absent
    pub mailbox_manager: Option<Arc<MailboxManager>>,
    pub translator: Arc<dyn ShaderTranslator>,
}

impl Default for ContextGroupConfig {
    fn default() -> Self {
        Self {
            bind_generates_resource: true,
            workarounds: String::new(),
            mailbox_manager: None,
            translator: Arc::new(PassthroughTranslator),
        }
    }
}

/// Managers built once the first decoder attached
struct GroupManagers {
    buffers: BufferManager,
    textures: TextureManager,
    renderbuffers: RenderbufferManager,
    framebuffers: FramebufferManager,
    shaders: ShaderManager,
    programs: ProgramManager,
}

/// Mutable view of the group handed to command handlers
pub struct GroupResources<'a> {
    pub features: &'a Arc<FeatureSet>,
    pub buffers: &'a mut BufferManager,
    pub textures: &'a mut TextureManager,
    pub renderbuffers: &'a mut RenderbufferManager,
    pub framebuffers: &'a mut FramebufferManager,
    pub shaders: &'a mut ShaderManager,
    pub programs: &'a mut ProgramManager,
    pub id_allocators: &'a mut [IdAllocator; IdNamespace::COUNT],
    pub mailboxes: &'a Arc<MailboxManager>,
    pub translator: &'a Arc<dyn ShaderTranslator>,
    pub bind_generates_resource: bool,
}

impl GroupResources<'_> {
    pub fn id_allocator(&mut self, namespace: IdNamespace) -> &mut IdAllocator {
        &mut self.id_allocators[namespace.index()]
    }

    pub fn id_in_use(&self, namespace: IdNamespace, id: u32) -> bool {
        self.id_allocators[namespace.index()].in_use(id)
    }
}

/// What an attached decoder gets back
pub struct Attachment {
    pub features: Arc<FeatureSet>,
    /// Reset status set when another decoder loses the whole group (0 = live)
    pub lost_status: Arc<AtomicU32>,
}

struct AttachedDecoder {
    id: DecoderId,
    lost_status: Arc<AtomicU32>,
}

pub struct ContextGroup {
    bind_generates_resource: bool,
    workarounds: String,
    mailboxes: Arc<MailboxManager>,
    translator: Arc<dyn ShaderTranslator>,
    features: Option<Arc<FeatureSet>>,
    managers: Option<GroupManagers>,
    attached: Vec<AttachedDecoder>,
    id_allocators: [IdAllocator; IdNamespace::COUNT],
    framebuffer_serial: Arc<AtomicU32>,
}

impl ContextGroup {
    pub fn new(config: ContextGroupConfig) -> Self {
        Self {
            bind_generates_resource: config.bind_generates_resource,
            workarounds: config.workarounds,
            mailboxes: config.mailbox_manager.unwrap_or_else(MailboxManager::new),
            translator: config.translator,
            features: None,
            managers: None,
            attached: Vec::new(),
            id_allocators: std::array::from_fn(|_| IdAllocator::new()),
            framebuffer_serial: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Create a group ready to be shared between decoders
    pub fn shared(config: ContextGroupConfig) -> SharedContextGroup {
        Arc::new(Mutex::new(Self::new(config)))
    }

    /// Attach a decoder, negotiating features and building managers on first use
    ///
    /// # Errors
    ///
    /// Fails if the decoder is already attached, if negotiation or the limit
    /// checks fail (no manager is kept in that case), or if `disallowed`
    /// conflicts with the features the group already negotiated.
    pub fn attach(
        &mut self,
        decoder: DecoderId,
        disallowed: &DisallowedFeatures,
        driver: &mut dyn GraphicsDriver,
    ) -> Result<Attachment> {
        if self.is_attached(decoder) {
            crate::gpu_bail!("gpu::ContextGroup", "Decoder {} attached twice", decoder.0);
        }
        let features = match &self.features {
            Some(features) => {
                if !features.is_compatible_with(disallowed) {
                    crate::gpu_error!("gpu::ContextGroup", "Decoder {} requests incompatible features", decoder.0);
                    return Err(Error::InitializationFailed(
                        "disallowed features differ from the group's".to_string(),
                    ));
                }
                Arc::clone(features)
            }
            None => {
                let features = Arc::new(FeatureSet::negotiate_with_driver(disallowed, driver, &self.workarounds)?);
                self.managers = Some(self.build_managers(&features, driver));
                self.features = Some(Arc::clone(&features));
                crate::gpu_info!(
                    "gpu::ContextGroup",
                    "Group initialized (GL {}.{}, {} extensions)",
                    features.gl_version.major,
                    features.gl_version.minor,
                    features.extensions().len()
                );
                features
            }
        };
        let lost_status = Arc::new(AtomicU32::new(gl::NO_ERROR));
        self.attached.push(AttachedDecoder { id: decoder, lost_status: Arc::clone(&lost_status) });
        Ok(Attachment { features, lost_status })
    }

    fn build_managers(&self, features: &FeatureSet, driver: &mut dyn GraphicsDriver) -> GroupManagers {
        let limits = &features.limits;
        let serial = &self.framebuffer_serial;
        let mut textures = TextureManager::new(
            limits.max_texture_size,
            limits.max_cube_map_texture_size,
            features.has(FeatureFlags::NPOT_OK),
            Arc::clone(serial),
        );
        textures.initialize(
            driver,
            features.has(FeatureFlags::OES_EGL_IMAGE_EXTERNAL),
            features.has(FeatureFlags::ARB_TEXTURE_RECTANGLE),
        );
        let mut buffers = BufferManager::new();
        buffers.set_shadow_array_buffers(features.gl_version.is_desktop());
        GroupManagers {
            buffers,
            textures,
            renderbuffers: RenderbufferManager::new(
                limits.max_renderbuffer_size,
                limits.max_samples,
                Arc::clone(serial),
            ),
            framebuffers: FramebufferManager::new(
                limits.max_draw_buffers,
                limits.max_color_attachments,
                Arc::clone(serial),
            ),
            shaders: ShaderManager::new(),
            programs: ProgramManager::new(limits.max_vertex_attribs),
        }
    }

    /// Detach a decoder; the last one tears every manager down
    ///
    /// With `has_context == false` no driver object is deleted, host-side
    /// bookkeeping is still released. Returns true if teardown ran.
    pub fn detach(&mut self, decoder: DecoderId, driver: &mut dyn GraphicsDriver, has_context: bool) -> bool {
        let Some(position) = self.attached.iter().position(|a| a.id == decoder) else {
            crate::gpu_warn!("gpu::ContextGroup", "Decoder {} was not attached", decoder.0);
            return false;
        };
        self.attached.remove(position);
        if !self.attached.is_empty() {
            return false;
        }
        if let Some(mut managers) = self.managers.take() {
            let mut driver = has_context.then_some(driver);
            managers.buffers.destroy(reborrow(&mut driver));
            managers.framebuffers.destroy(
                &mut managers.textures,
                &mut managers.renderbuffers,
                reborrow(&mut driver),
            );
            managers.renderbuffers.destroy(reborrow(&mut driver));
            managers.textures.destroy(reborrow(&mut driver));
            managers.programs.destroy(&mut managers.shaders, reborrow(&mut driver));
            managers.shaders.destroy(driver);
        }
        self.features = None;
        crate::gpu_debug!("gpu::ContextGroup", "Group torn down (context {})", if has_context { "current" } else { "lost" });
        true
    }

    /// Mark every other attached decoder lost with `reset_status`
    pub fn lose_other_contexts(&self, except: DecoderId, reset_status: u32) {
        for decoder in self.attached.iter().filter(|a| a.id != except) {
            decoder.lost_status.store(reset_status, Ordering::Release);
        }
    }

    pub fn resources(&mut self) -> Option<GroupResources<'_>> {
        let managers = self.managers.as_mut()?;
        Some(GroupResources {
            features: self.features.as_ref()?,
            buffers: &mut managers.buffers,
            textures: &mut managers.textures,
            renderbuffers: &mut managers.renderbuffers,
            framebuffers: &mut managers.framebuffers,
            shaders: &mut managers.shaders,
            programs: &mut managers.programs,
            id_allocators: &mut self.id_allocators,
            mailboxes: &self.mailboxes,
            translator: &self.translator,
            bind_generates_resource: self.bind_generates_resource,
        })
    }

    pub fn features(&self) -> Option<&Arc<FeatureSet>> {
        self.features.as_ref()
    }

    pub fn id_allocator(&mut self, namespace: IdNamespace) -> &mut IdAllocator {
        &mut self.id_allocators[namespace.index()]
    }

    pub fn bind_generates_resource(&self) -> bool {
        self.bind_generates_resource
    }

    pub fn mailbox_manager(&self) -> &Arc<MailboxManager> {
        &self.mailboxes
    }

    pub fn is_attached(&self, decoder: DecoderId) -> bool {
        self.attached.iter().any(|a| a.id == decoder)
    }

    pub fn attached_count(&self) -> usize {
        self.attached.len()
    }

    /// Bytes of driver memory tracked by the group's managers
    pub fn memory_tracked(&self) -> u64 {
        self.managers.as_ref().map_or(0, |m| {
            m.buffers.memory_tracked() as u64 + m.textures.memory_tracked() + m.renderbuffers.memory_tracked()
        })
    }
}

impl Drop for ContextGroup {
    fn drop(&mut self) {
        if !self.attached.is_empty() && !std::thread::panicking() {
            crate::gpu_error!(
                "gpu::ContextGroup",
                "Group dropped with {} decoder(s) still attached",
                self.attached.len()
            );
            panic!("ContextGroup dropped while {} decoder(s) are attached", self.attached.len());
        }
    }
}

#[cfg(test)]
#[path = "context_group_tests.rs"]
mod tests;
