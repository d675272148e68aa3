/// Framebuffers and their manager.
///
/// Attachments name textures and renderbuffers by key and hold a reference on
/// them through their owning managers, so an attached object outlives its
/// client handle. Completeness is cached per framebuffer against a serial
/// shared with the texture and renderbuffer managers: any storage change bumps
/// the serial and invalidates every cached "complete" verdict at once.

use super::object_table::ObjectTable;
use super::renderbuffer_manager::{RenderbufferKey, RenderbufferManager};
use super::texture_manager::{TextureKey, TextureManager};
use crate::driver::{reborrow, GraphicsDriver};
use crate::gl;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

slotmap::new_key_type! {
    /// Stable key of a framebuffer in the framebuffer arena
    pub struct FramebufferKey;
}

/// What an attachment point names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    Texture { texture: TextureKey, target: u32, level: i32 },
    Renderbuffer(RenderbufferKey),
}

/// Shape of an attached image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentInfo {
    pub width: i32,
    pub height: i32,
    pub internal_format: u32,
    pub samples: i32,
    pub cleared: bool,
}

impl Attachment {
    pub fn info(&self, textures: &TextureManager, renderbuffers: &RenderbufferManager) -> Option<AttachmentInfo> {
        match *self {
            Attachment::Texture { texture, target, level } => {
                let info = textures.texture(texture)?.level_info(target, level)?;
                Some(AttachmentInfo {
                    width: info.width,
                    height: info.height,
                    internal_format: info.internal_format,
                    samples: 0,
                    cleared: info.cleared,
                })
            }
            Attachment::Renderbuffer(key) => {
                let rb = renderbuffers.renderbuffer(key)?;
                Some(AttachmentInfo {
                    width: rb.width(),
                    height: rb.height(),
                    internal_format: rb.internal_format(),
                    samples: rb.samples(),
                    cleared: rb.cleared(),
                })
            }
        }
    }
}

pub struct Framebuffer {
    service_id: u32,
    attachments: FxHashMap<u32, Attachment>,
    /// Serial at which the driver last reported this framebuffer complete
    complete_serial: Option<u32>,
    has_been_bound: bool,
}

impl Framebuffer {
    pub fn service_id(&self) -> u32 {
        self.service_id
    }

    pub fn attachment(&self, attachment: u32) -> Option<&Attachment> {
        self.attachments.get(&attachment)
    }

    pub fn attachments(&self) -> impl Iterator<Item = (u32, &Attachment)> {
        self.attachments.iter().map(|(point, a)| (*point, a))
    }

    pub fn has_been_bound(&self) -> bool {
        self.has_been_bound
    }

    pub fn has_color_attachment(&self) -> bool {
        self.attachments.contains_key(&gl::COLOR_ATTACHMENT0)
    }

    pub fn has_depth_attachment(&self) -> bool {
        self.attachments.contains_key(&gl::DEPTH_ATTACHMENT)
    }

    pub fn has_stencil_attachment(&self) -> bool {
        self.attachments.contains_key(&gl::STENCIL_ATTACHMENT)
    }
}

/// Tracks every framebuffer of a context group
pub struct FramebufferManager {
    framebuffers: ObjectTable<FramebufferKey, Framebuffer>,
    serial: Arc<AtomicU32>,
    max_draw_buffers: u32,
    max_color_attachments: u32,
}

impl FramebufferManager {
    pub fn new(max_draw_buffers: u32, max_color_attachments: u32, serial: Arc<AtomicU32>) -> Self {
        Self {
            framebuffers: ObjectTable::new(),
            serial,
            max_draw_buffers,
            max_color_attachments,
        }
    }

    pub fn max_draw_buffers(&self) -> u32 {
        self.max_draw_buffers
    }

    pub fn max_color_attachments(&self) -> u32 {
        self.max_color_attachments
    }

    pub fn create_framebuffer(&mut self, client_id: u32, service_id: u32) -> FramebufferKey {
        self.framebuffers.insert(
            client_id,
            Framebuffer {
                service_id,
                attachments: FxHashMap::default(),
                complete_serial: None,
                has_been_bound: false,
            },
        )
    }

    pub fn get_framebuffer(&self, client_id: u32) -> Option<FramebufferKey> {
        self.framebuffers.lookup(client_id)
    }

    pub fn framebuffer(&self, key: FramebufferKey) -> Option<&Framebuffer> {
        self.framebuffers.get(key)
    }

    pub fn client_id(&self, key: FramebufferKey) -> Option<u32> {
        self.framebuffers.client_id(key)
    }

    pub fn is_framebuffer(&self, client_id: u32) -> bool {
        self.get_framebuffer(client_id)
            .and_then(|k| self.framebuffer(k))
            .map(|fb| fb.has_been_bound)
            .unwrap_or(false)
    }

    pub fn mark_as_bound(&mut self, key: FramebufferKey) {
        if let Some(fb) = self.framebuffers.get_mut(key) {
            fb.has_been_bound = true;
        }
    }

    pub fn add_ref(&mut self, key: FramebufferKey) {
        self.framebuffers.add_ref(key);
    }

    pub fn release(
        &mut self,
        key: FramebufferKey,
        textures: &mut TextureManager,
        renderbuffers: &mut RenderbufferManager,
        driver: Option<&mut dyn GraphicsDriver>,
    ) {
        if let Some(fb) = self.framebuffers.release(key) {
            Self::destroy_framebuffer(fb, textures, renderbuffers, driver);
        }
    }

    pub fn remove_framebuffer(
        &mut self,
        client_id: u32,
        textures: &mut TextureManager,
        renderbuffers: &mut RenderbufferManager,
        driver: Option<&mut dyn GraphicsDriver>,
    ) {
        if let Some(fb) = self.framebuffers.remove(client_id) {
            Self::destroy_framebuffer(fb, textures, renderbuffers, driver);
        }
    }

    fn destroy_framebuffer(
        fb: Framebuffer,
        textures: &mut TextureManager,
        renderbuffers: &mut RenderbufferManager,
        mut driver: Option<&mut dyn GraphicsDriver>,
    ) {
        for attachment in fb.attachments.into_values() {
            release_attachment(attachment, textures, renderbuffers, reborrow(&mut driver));
        }
        if let Some(driver) = driver {
            driver.delete_framebuffer(fb.service_id);
        }
    }

    /// Replace what `attachment` names; `None` detaches
    pub fn attach(
        &mut self,
        key: FramebufferKey,
        attachment_point: u32,
        attachment: Option<Attachment>,
        textures: &mut TextureManager,
        renderbuffers: &mut RenderbufferManager,
        driver: Option<&mut dyn GraphicsDriver>,
    ) {
        let Some(fb) = self.framebuffers.get_mut(key) else {
            return;
        };
        if let Some(new) = attachment {
            match new {
                Attachment::Texture { texture, .. } => {
                    textures.add_ref(texture);
                    textures.attach_to_framebuffer(texture);
                }
                Attachment::Renderbuffer(rb) => {
                    renderbuffers.add_ref(rb);
                    renderbuffers.attach_to_framebuffer(rb);
                }
            }
        }
        let previous = match attachment {
            Some(new) => fb.attachments.insert(attachment_point, new),
            None => fb.attachments.remove(&attachment_point),
        };
        fb.complete_serial = None;
        if let Some(previous) = previous {
            release_attachment(previous, textures, renderbuffers, driver);
        }
        self.serial.fetch_add(1, Ordering::Relaxed);
    }

    /// Detach every attachment point of `key` naming `texture`
    pub fn unbind_texture(
        &mut self,
        key: FramebufferKey,
        texture: TextureKey,
        textures: &mut TextureManager,
        renderbuffers: &mut RenderbufferManager,
        mut driver: Option<&mut dyn GraphicsDriver>,
    ) -> Vec<u32> {
        let points = self.points_matching(key, |a| matches!(a, Attachment::Texture { texture: t, .. } if *t == texture));
        for point in &points {
            self.attach(key, *point, None, textures, renderbuffers, reborrow(&mut driver));
        }
        points
    }

    /// Detach every attachment point of `key` naming `renderbuffer`
    pub fn unbind_renderbuffer(
        &mut self,
        key: FramebufferKey,
        renderbuffer: RenderbufferKey,
        textures: &mut TextureManager,
        renderbuffers: &mut RenderbufferManager,
        mut driver: Option<&mut dyn GraphicsDriver>,
    ) -> Vec<u32> {
        let points = self.points_matching(key, |a| *a == Attachment::Renderbuffer(renderbuffer));
        for point in &points {
            self.attach(key, *point, None, textures, renderbuffers, reborrow(&mut driver));
        }
        points
    }

    fn points_matching(&self, key: FramebufferKey, pred: impl Fn(&Attachment) -> bool) -> Vec<u32> {
        self.framebuffers
            .get(key)
            .map(|fb| {
                fb.attachments
                    .iter()
                    .filter(|(_, a)| pred(a))
                    .map(|(point, _)| *point)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Completeness decidable without the driver; returns a GL status enum
    pub fn is_possibly_complete(
        &self,
        key: FramebufferKey,
        textures: &TextureManager,
        renderbuffers: &RenderbufferManager,
    ) -> u32 {
        let Some(fb) = self.framebuffers.get(key) else {
            return gl::FRAMEBUFFER_UNSUPPORTED;
        };
        if fb.attachments.is_empty() {
            return gl::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT;
        }
        let mut size: Option<(i32, i32)> = None;
        for (point, attachment) in &fb.attachments {
            let Some(info) = attachment.info(textures, renderbuffers) else {
                return gl::FRAMEBUFFER_INCOMPLETE_ATTACHMENT;
            };
            if info.width <= 0 || info.height <= 0 {
                return gl::FRAMEBUFFER_INCOMPLETE_ATTACHMENT;
            }
            let format_ok = match *point {
                gl::DEPTH_ATTACHMENT => gl::is_depth_format(info.internal_format),
                gl::STENCIL_ATTACHMENT => gl::has_stencil(info.internal_format),
                _ => gl::is_color_renderable(info.internal_format),
            };
            if !format_ok {
                return gl::FRAMEBUFFER_INCOMPLETE_ATTACHMENT;
            }
            match size {
                None => size = Some((info.width, info.height)),
                Some(s) if s != (info.width, info.height) => {
                    return gl::FRAMEBUFFER_INCOMPLETE_DIMENSIONS;
                }
                _ => {}
            }
        }
        if let (Some(depth), Some(stencil)) = (
            fb.attachments.get(&gl::DEPTH_ATTACHMENT),
            fb.attachments.get(&gl::STENCIL_ATTACHMENT),
        ) {
            if depth != stencil {
                return gl::FRAMEBUFFER_UNSUPPORTED;
            }
        }
        gl::FRAMEBUFFER_COMPLETE
    }

    /// Whether every attached image has been cleared
    pub fn is_cleared(&self, key: FramebufferKey, textures: &TextureManager, renderbuffers: &RenderbufferManager) -> bool {
        self.framebuffers
            .get(key)
            .map(|fb| {
                fb.attachments
                    .values()
                    .all(|a| a.info(textures, renderbuffers).map(|i| i.cleared).unwrap_or(true))
            })
            .unwrap_or(true)
    }

    /// Attachment points whose image is still uncleared
    pub fn uncleared_attachments(
        &self,
        key: FramebufferKey,
        textures: &TextureManager,
        renderbuffers: &RenderbufferManager,
    ) -> Vec<(u32, Attachment)> {
        self.framebuffers
            .get(key)
            .map(|fb| {
                fb.attachments
                    .iter()
                    .filter(|(_, a)| a.info(textures, renderbuffers).map(|i| !i.cleared).unwrap_or(false))
                    .map(|(point, a)| (*point, *a))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Mark every attached image cleared after the decoder cleared them
    pub fn mark_attachments_cleared(
        &self,
        key: FramebufferKey,
        textures: &mut TextureManager,
        renderbuffers: &mut RenderbufferManager,
    ) {
        let Some(fb) = self.framebuffers.get(key) else {
            return;
        };
        for attachment in fb.attachments.values() {
            match *attachment {
                Attachment::Texture { texture, target, level } => {
                    textures.set_level_cleared(texture, target, level, true);
                }
                Attachment::Renderbuffer(rb) => renderbuffers.set_cleared(rb, true),
            }
        }
    }

    /// Size and internal format of the color attachment (read source)
    pub fn color_attachment_info(
        &self,
        key: FramebufferKey,
        textures: &TextureManager,
        renderbuffers: &RenderbufferManager,
    ) -> Option<AttachmentInfo> {
        self.framebuffers
            .get(key)?
            .attachments
            .get(&gl::COLOR_ATTACHMENT0)?
            .info(textures, renderbuffers)
    }

    /// Remember that the driver reported `key` complete at the current serial
    pub fn mark_as_complete(&mut self, key: FramebufferKey) {
        let serial = self.serial.load(Ordering::Relaxed);
        if let Some(fb) = self.framebuffers.get_mut(key) {
            fb.complete_serial = Some(serial);
        }
    }

    /// Whether the cached complete verdict is still current
    pub fn is_complete(&self, key: FramebufferKey) -> bool {
        let serial = self.serial.load(Ordering::Relaxed);
        self.framebuffers
            .get(key)
            .map(|fb| fb.complete_serial == Some(serial))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.framebuffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.framebuffers.is_empty()
    }

    /// Delete every framebuffer, releasing attachment references first
    pub fn destroy(
        &mut self,
        textures: &mut TextureManager,
        renderbuffers: &mut RenderbufferManager,
        mut driver: Option<&mut dyn GraphicsDriver>,
    ) {
        for fb in self.framebuffers.drain() {
            Self::destroy_framebuffer(fb, textures, renderbuffers, reborrow(&mut driver));
        }
    }
}

fn release_attachment(
    attachment: Attachment,
    textures: &mut TextureManager,
    renderbuffers: &mut RenderbufferManager,
    driver: Option<&mut dyn GraphicsDriver>,
) {
    match attachment {
        Attachment::Texture { texture, .. } => {
            textures.detach_from_framebuffer(texture);
            textures.release(texture, driver);
        }
        Attachment::Renderbuffer(rb) => {
            renderbuffers.detach_from_framebuffer(rb);
            renderbuffers.release(rb, driver);
        }
    }
}

#[cfg(test)]
#[path = "framebuffer_manager_tests.rs"]
mod tests;
