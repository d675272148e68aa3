/// SoftDevice - object store shared by every context of one share group
///
/// Holds every named object (buffers, textures, renderbuffers, framebuffers,
/// shaders, programs, queries, vertex arrays, fences) behind one mutex.
/// Contexts created from the same device see the same names, the way GL
/// share groups do.

use crate::soft_driver::SoftDriver;
use crate::soft_image::SoftImage;
use crate::soft_program::{SoftProgram, SoftShader};
use crate::soft_surface::SoftSurface;
use gpu_command_service::gpu::gl;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Identification strings and limits reported through `get_string` and
/// `get_integer`
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub version: String,
    pub renderer: String,
    pub vendor: String,
    /// Space separated extension names
    pub extensions: String,
    pub limits: FxHashMap<u32, i32>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        let limits = [
            (gl::MAX_TEXTURE_SIZE, 4096),
            (gl::MAX_CUBE_MAP_TEXTURE_SIZE, 4096),
            (gl::MAX_RENDERBUFFER_SIZE, 4096),
            (gl::MAX_VERTEX_ATTRIBS, 16),
            (gl::MAX_COMBINED_TEXTURE_IMAGE_UNITS, 16),
            (gl::MAX_TEXTURE_IMAGE_UNITS, 8),
            (gl::MAX_VERTEX_TEXTURE_IMAGE_UNITS, 8),
            (gl::MAX_FRAGMENT_UNIFORM_VECTORS, 224),
            (gl::MAX_VERTEX_UNIFORM_VECTORS, 256),
            (gl::MAX_VARYING_VECTORS, 8),
            (gl::MAX_DRAW_BUFFERS_ARB, 1),
            (gl::MAX_COLOR_ATTACHMENTS_EXT, 1),
            (gl::MAX_SAMPLES_EXT, 4),
        ]
        .into_iter()
        .collect();
        Self {
            version: "OpenGL ES 2.0 Soft".to_string(),
            renderer: "Soft Rasterizer".to_string(),
            vendor: "Soft".to_string(),
            extensions: "GL_OES_texture_npot GL_OES_depth_texture GL_OES_packed_depth_stencil \
                         GL_EXT_occlusion_query_boolean GL_EXT_texture_storage"
                .to_string(),
            limits,
        }
    }
}

// ===== OBJECTS =====

/// Image attached to a framebuffer attachment point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Attachment {
    Texture { id: u32, target: u32, level: i32 },
    Renderbuffer(u32),
}

#[derive(Debug, Default)]
pub(crate) struct SoftTexture {
    /// Bind target, 0 until first bound
    pub target: u32,
    /// Levels keyed by `(level target, level)`; cube faces are separate
    pub levels: FxHashMap<(u32, i32), SoftImage>,
    pub params: FxHashMap<u32, f32>,
    pub immutable: bool,
}

#[derive(Debug, Default)]
pub(crate) struct SoftRenderbuffer {
    pub image: Option<SoftImage>,
    pub samples: i32,
}

/// One slot of a vertex array
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VertexAttrib {
    pub enabled: bool,
    pub size: i32,
    pub ty: u32,
    pub normalized: bool,
    pub stride: i32,
    pub offset: usize,
    pub buffer: u32,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct SoftVertexArray {
    pub attribs: Vec<VertexAttrib>,
    pub element_buffer: u32,
}

impl SoftVertexArray {
    pub fn new(max_attribs: usize) -> Self {
        Self { attribs: vec![VertexAttrib::default(); max_attribs], element_buffer: 0 }
    }
}

#[derive(Debug, Default)]
pub(crate) struct SoftQuery {
    pub target: u32,
    pub result: u64,
    pub available: bool,
}

/// Live object counts, for leak checks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObjectCounts {
    pub buffers: usize,
    pub textures: usize,
    pub renderbuffers: usize,
    pub framebuffers: usize,
    pub shaders: usize,
    pub programs: usize,
    pub queries: usize,
    pub vertex_arrays: usize,
}

impl ObjectCounts {
    pub fn total(&self) -> usize {
        self.buffers
            + self.textures
            + self.renderbuffers
            + self.framebuffers
            + self.shaders
            + self.programs
            + self.queries
            + self.vertex_arrays
    }
}

#[derive(Debug, Default)]
pub(crate) struct ObjectStore {
    next_name: u32,
    next_fence: u64,
    pub buffers: FxHashMap<u32, Vec<u8>>,
    pub textures: FxHashMap<u32, SoftTexture>,
    pub renderbuffers: FxHashMap<u32, SoftRenderbuffer>,
    pub framebuffers: FxHashMap<u32, FxHashMap<u32, Attachment>>,
    pub shaders: FxHashMap<u32, SoftShader>,
    pub programs: FxHashMap<u32, SoftProgram>,
    pub queries: FxHashMap<u32, SoftQuery>,
    pub vertex_arrays: FxHashMap<u32, SoftVertexArray>,
    /// Fence -> signaled
    pub fences: FxHashMap<u64, bool>,
    pub draw_calls: u64,
}

impl ObjectStore {
    /// One counter for every kind so names never collide
    pub fn next_name(&mut self) -> u32 {
        self.next_name += 1;
        self.next_name
    }

    pub fn next_fence(&mut self) -> u64 {
        self.next_fence += 1;
        self.fences.insert(self.next_fence, false);
        self.next_fence
    }

    pub fn attachment_image(&self, attachment: Attachment) -> Option<&SoftImage> {
        match attachment {
            Attachment::Texture { id, target, level } => self.textures.get(&id)?.levels.get(&(target, level)),
            Attachment::Renderbuffer(id) => self.renderbuffers.get(&id)?.image.as_ref(),
        }
    }

    pub fn attachment_image_mut(&mut self, attachment: Attachment) -> Option<&mut SoftImage> {
        match attachment {
            Attachment::Texture { id, target, level } => {
                self.textures.get_mut(&id)?.levels.get_mut(&(target, level))
            }
            Attachment::Renderbuffer(id) => self.renderbuffers.get_mut(&id)?.image.as_mut(),
        }
    }

    /// Drop every attachment referring to `matches`
    pub fn detach_everywhere(&mut self, matches: impl Fn(&Attachment) -> bool) {
        for attachments in self.framebuffers.values_mut() {
            attachments.retain(|_, attachment| !matches(attachment));
        }
    }

    /// Remove a shader flagged for deletion once no program holds it
    pub fn release_shader_if_unused(&mut self, shader: u32) {
        let pending = self.shaders.get(&shader).is_some_and(|s| s.delete_pending);
        let attached = self.programs.values().any(|p| p.attached.contains(&shader));
        if pending && !attached {
            self.shaders.remove(&shader);
        }
    }

    /// Remove a program and release the pending shaders it held
    pub fn remove_program(&mut self, program: u32) {
        if let Some(removed) = self.programs.remove(&program) {
            for shader in removed.attached {
                self.release_shader_if_unused(shader);
            }
        }
    }

    fn counts(&self) -> ObjectCounts {
        ObjectCounts {
            buffers: self.buffers.len(),
            textures: self.textures.len(),
            renderbuffers: self.renderbuffers.len(),
            framebuffers: self.framebuffers.len(),
            shaders: self.shaders.len(),
            programs: self.programs.len(),
            queries: self.queries.len(),
            vertex_arrays: self.vertex_arrays.len(),
        }
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ===== DEVICE =====

pub struct SoftDevice {
    config: DeviceConfig,
    store: Mutex<ObjectStore>,
    reset: AtomicU32,
}

impl SoftDevice {
    pub fn new(config: DeviceConfig) -> Arc<Self> {
        Arc::new(Self { config, store: Mutex::new(ObjectStore::default()), reset: AtomicU32::new(gl::NO_ERROR) })
    }

    /// New context sharing this device's objects; `surface` backs
    /// framebuffer 0
    pub fn create_context(self: &Arc<Self>, surface: Option<&SoftSurface>) -> SoftDriver {
        SoftDriver::new(Arc::clone(self), surface.map(SoftSurface::backbuffer))
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub(crate) fn store(&self) -> MutexGuard<'_, ObjectStore> {
        lock(&self.store)
    }

    /// Make every context report `status` from `reset_status`
    pub fn lose(&self, status: u32) {
        gpu_command_service::gpu_warn!("gpu::SoftDevice", "Device lost ({:#06x})", status);
        self.reset.store(status, Ordering::Release);
    }

    pub fn reset_status(&self) -> u32 {
        self.reset.load(Ordering::Acquire)
    }

    pub fn object_counts(&self) -> ObjectCounts {
        self.store().counts()
    }

    /// Copy of a texture level
    pub fn texture_level(&self, texture: u32, target: u32, level: i32) -> Option<SoftImage> {
        self.store().textures.get(&texture)?.levels.get(&(target, level)).cloned()
    }

    /// Copy of a renderbuffer's storage
    pub fn renderbuffer_image(&self, renderbuffer: u32) -> Option<SoftImage> {
        self.store().renderbuffers.get(&renderbuffer)?.image.clone()
    }

    pub fn renderbuffer_samples(&self, renderbuffer: u32) -> Option<i32> {
        self.store().renderbuffers.get(&renderbuffer).map(|r| r.samples)
    }

    pub fn buffer_data(&self, buffer: u32) -> Option<Vec<u8>> {
        self.store().buffers.get(&buffer).cloned()
    }

    /// Draw calls that passed validation, across all contexts
    pub fn draw_calls(&self) -> u64 {
        self.store().draw_calls
    }
}
