/// Renderbuffers and their manager.

use super::object_table::ObjectTable;
use crate::driver::GraphicsDriver;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

slotmap::new_key_type! {
    /// Stable key of a renderbuffer in the renderbuffer arena
    pub struct RenderbufferKey;
}

pub struct Renderbuffer {
    service_id: u32,
    internal_format: u32,
    width: i32,
    height: i32,
    samples: i32,
    cleared: bool,
    has_been_bound: bool,
    framebuffer_attachments: u32,
}

impl Renderbuffer {
    pub fn service_id(&self) -> u32 {
        self.service_id
    }

    pub fn internal_format(&self) -> u32 {
        self.internal_format
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn samples(&self) -> i32 {
        self.samples
    }

    pub fn cleared(&self) -> bool {
        self.cleared
    }

    pub fn has_been_bound(&self) -> bool {
        self.has_been_bound
    }

    pub fn is_attached_to_framebuffer(&self) -> bool {
        self.framebuffer_attachments > 0
    }

    fn estimated_size(&self) -> u64 {
        let bytes_per_pixel = match self.internal_format {
            crate::gl::RGBA4 | crate::gl::RGB5_A1 | crate::gl::RGB565 | crate::gl::DEPTH_COMPONENT16 => 2,
            crate::gl::STENCIL_INDEX8 => 1,
            _ => 4,
        };
        self.width.max(0) as u64 * self.height.max(0) as u64 * bytes_per_pixel * self.samples.max(1) as u64
    }
}

/// Tracks every renderbuffer of a context group
pub struct RenderbufferManager {
    renderbuffers: ObjectTable<RenderbufferKey, Renderbuffer>,
    max_renderbuffer_size: i32,
    max_samples: i32,
    num_uncleared: u32,
    memory_tracked: u64,
    framebuffer_serial: Arc<AtomicU32>,
}

impl RenderbufferManager {
    pub fn new(max_renderbuffer_size: u32, max_samples: u32, framebuffer_serial: Arc<AtomicU32>) -> Self {
        Self {
            renderbuffers: ObjectTable::new(),
            max_renderbuffer_size: max_renderbuffer_size as i32,
            max_samples: max_samples as i32,
            num_uncleared: 0,
            memory_tracked: 0,
            framebuffer_serial,
        }
    }

    pub fn max_renderbuffer_size(&self) -> i32 {
        self.max_renderbuffer_size
    }

    pub fn max_samples(&self) -> i32 {
        self.max_samples
    }

    pub fn create_renderbuffer(&mut self, client_id: u32, service_id: u32) -> RenderbufferKey {
        self.renderbuffers.insert(
            client_id,
            Renderbuffer {
                service_id,
                internal_format: crate::gl::RGBA4,
                width: 0,
                height: 0,
                samples: 0,
                cleared: true,
                has_been_bound: false,
                framebuffer_attachments: 0,
            },
        )
    }

    pub fn get_renderbuffer(&self, client_id: u32) -> Option<RenderbufferKey> {
        self.renderbuffers.lookup(client_id)
    }

    pub fn renderbuffer(&self, key: RenderbufferKey) -> Option<&Renderbuffer> {
        self.renderbuffers.get(key)
    }

    pub fn client_id(&self, key: RenderbufferKey) -> Option<u32> {
        self.renderbuffers.client_id(key)
    }

    pub fn is_renderbuffer(&self, client_id: u32) -> bool {
        self.get_renderbuffer(client_id)
            .and_then(|k| self.renderbuffer(k))
            .map(|rb| rb.has_been_bound)
            .unwrap_or(false)
    }

    pub fn mark_as_bound(&mut self, key: RenderbufferKey) {
        if let Some(rb) = self.renderbuffers.get_mut(key) {
            rb.has_been_bound = true;
        }
    }

    /// Record new storage; new storage starts uncleared
    pub fn set_info(&mut self, key: RenderbufferKey, samples: i32, internal_format: u32, width: i32, height: i32) {
        let Some(rb) = self.renderbuffers.get_mut(key) else {
            return;
        };
        self.memory_tracked -= rb.estimated_size();
        if !rb.cleared {
            self.num_uncleared -= 1;
        }
        rb.samples = samples;
        rb.internal_format = internal_format;
        rb.width = width;
        rb.height = height;
        rb.cleared = width == 0 || height == 0;
        if !rb.cleared {
            self.num_uncleared += 1;
        }
        self.memory_tracked += rb.estimated_size();
        self.framebuffer_serial.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_cleared(&mut self, key: RenderbufferKey, cleared: bool) {
        let Some(rb) = self.renderbuffers.get_mut(key) else {
            return;
        };
        if rb.cleared == cleared {
            return;
        }
        rb.cleared = cleared;
        if cleared {
            self.num_uncleared -= 1;
        } else {
            self.num_uncleared += 1;
        }
    }

    pub fn have_uncleared_renderbuffers(&self) -> bool {
        self.num_uncleared > 0
    }

    pub fn attach_to_framebuffer(&mut self, key: RenderbufferKey) {
        if let Some(rb) = self.renderbuffers.get_mut(key) {
            rb.framebuffer_attachments += 1;
        }
    }

    pub fn detach_from_framebuffer(&mut self, key: RenderbufferKey) {
        if let Some(rb) = self.renderbuffers.get_mut(key) {
            rb.framebuffer_attachments = rb.framebuffer_attachments.saturating_sub(1);
        }
    }

    pub fn add_ref(&mut self, key: RenderbufferKey) {
        self.renderbuffers.add_ref(key);
    }

    pub fn release(&mut self, key: RenderbufferKey, driver: Option<&mut dyn GraphicsDriver>) {
        if let Some(rb) = self.renderbuffers.release(key) {
            self.destroy_renderbuffer(rb, driver);
        }
    }

    pub fn remove_renderbuffer(&mut self, client_id: u32, driver: Option<&mut dyn GraphicsDriver>) {
        if let Some(rb) = self.renderbuffers.remove(client_id) {
            self.destroy_renderbuffer(rb, driver);
        }
    }

    fn destroy_renderbuffer(&mut self, rb: Renderbuffer, driver: Option<&mut dyn GraphicsDriver>) {
        if !rb.cleared {
            self.num_uncleared -= 1;
        }
        self.memory_tracked -= rb.estimated_size();
        if let Some(driver) = driver {
            driver.delete_renderbuffer(rb.service_id);
        }
    }

    pub fn memory_tracked(&self) -> u64 {
        self.memory_tracked
    }

    pub fn len(&self) -> usize {
        self.renderbuffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renderbuffers.is_empty()
    }

    pub fn destroy(&mut self, mut driver: Option<&mut dyn GraphicsDriver>) {
        for rb in self.renderbuffers.drain() {
            if let Some(driver) = driver.as_deref_mut() {
                driver.delete_renderbuffer(rb.service_id);
            }
        }
        self.num_uncleared = 0;
        self.memory_tracked = 0;
    }
}

#[cfg(test)]
#[path = "renderbuffer_manager_tests.rs"]
mod tests;
