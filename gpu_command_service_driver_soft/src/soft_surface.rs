/// SoftSurface - host-memory drawable
///
/// The back buffer lives behind shared handles: contexts created for the
/// surface render into it as framebuffer 0, and `SurfaceHandle` lets an
/// embedder read it after the surface moved into a decoder.

use crate::soft_device::lock;
use crate::soft_image::SoftImage;
use gpu_command_service::gpu::driver::{Surface, SurfaceFormat};
use gpu_command_service::gpu::gl;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Color and depth/stencil images of framebuffer 0
#[derive(Clone)]
pub(crate) struct Backbuffer {
    pub color: Arc<Mutex<SoftImage>>,
    pub depth_stencil: Option<Arc<Mutex<SoftImage>>>,
}

impl Backbuffer {
    fn allocate(width: i32, height: i32, format: SurfaceFormat) -> (SoftImage, Option<SoftImage>) {
        let color = if format.alpha_bits > 0 { gl::RGBA } else { gl::RGB };
        let depth_stencil = (format.depth_bits > 0 || format.stencil_bits > 0).then(|| {
            SoftImage::undefined(width, height, gl::DEPTH24_STENCIL8, gl::DEPTH_STENCIL, gl::UNSIGNED_INT_24_8)
        });
        (SoftImage::undefined(width, height, color, color, gl::UNSIGNED_BYTE), depth_stencil)
    }
}

pub struct SoftSurface {
    backbuffer: Backbuffer,
    format: SurfaceFormat,
    offscreen: bool,
    swaps: Arc<AtomicU32>,
    /// Refuse resizes, as a platform whose window cannot change size would
    pub fixed_size: bool,
}

impl SoftSurface {
    /// On-screen surface with 8 bit alpha, 24 bit depth and 8 bit stencil
    pub fn new(width: i32, height: i32) -> Self {
        Self::with_format(width, height, SurfaceFormat::default(), false)
    }

    /// Pbuffer-style surface with no on-screen presence
    pub fn pbuffer(width: i32, height: i32) -> Self {
        Self::with_format(width, height, SurfaceFormat::default(), true)
    }

    pub fn with_format(width: i32, height: i32, format: SurfaceFormat, offscreen: bool) -> Self {
        let (color, depth_stencil) = Backbuffer::allocate(width, height, format);
        Self {
            backbuffer: Backbuffer {
                color: Arc::new(Mutex::new(color)),
                depth_stencil: depth_stencil.map(|image| Arc::new(Mutex::new(image))),
            },
            format,
            offscreen,
            swaps: Arc::new(AtomicU32::new(0)),
            fixed_size: false,
        }
    }

    pub(crate) fn backbuffer(&self) -> Backbuffer {
        self.backbuffer.clone()
    }

    /// Handle that stays readable after the surface is handed off
    pub fn handle(&self) -> SurfaceHandle {
        SurfaceHandle { backbuffer: self.backbuffer(), swaps: Arc::clone(&self.swaps) }
    }
}

impl Surface for SoftSurface {
    fn size(&self) -> (i32, i32) {
        let color = lock(&self.backbuffer.color);
        (color.width, color.height)
    }

    fn is_offscreen(&self) -> bool {
        self.offscreen
    }

    fn format(&self) -> SurfaceFormat {
        self.format
    }

    fn resize(&mut self, width: i32, height: i32) -> bool {
        if self.fixed_size {
            return false;
        }
        let (color, depth_stencil) = Backbuffer::allocate(width, height, self.format);
        *lock(&self.backbuffer.color) = color;
        if let (Some(shared), Some(image)) = (&self.backbuffer.depth_stencil, depth_stencil) {
            *lock(shared) = image;
        }
        true
    }

    fn swap_buffers(&mut self) -> bool {
        self.swaps.fetch_add(1, Ordering::AcqRel);
        true
    }
}

/// Read side of a `SoftSurface`
#[derive(Clone)]
pub struct SurfaceHandle {
    backbuffer: Backbuffer,
    swaps: Arc<AtomicU32>,
}

impl SurfaceHandle {
    /// Copy of the color buffer
    pub fn pixels(&self) -> SoftImage {
        lock(&self.backbuffer.color).clone()
    }

    pub fn depth_stencil(&self) -> Option<SoftImage> {
        self.backbuffer.depth_stencil.as_ref().map(|image| lock(image).clone())
    }

    pub fn swap_count(&self) -> u32 {
        self.swaps.load(Ordering::Acquire)
    }
}
