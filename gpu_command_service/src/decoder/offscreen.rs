/// Offscreen back buffer
///
/// Decoders created without an on-screen surface render into a framebuffer
/// owned by the service. With multisampling the client draws into a
/// multisampled framebuffer that is resolved into the color texture on
/// swap. Every swap copies the color texture into a saved texture the
/// embedder reads back.

use super::scoped_binders::{ScopedFramebufferBinder, ScopedRenderbufferBinder, ScopedTextureBinder};
use crate::driver::GraphicsDriver;
use crate::error::Result;
use crate::gl;

/// Formats and sample count of an offscreen target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffscreenFormat {
    /// `RGBA` or `RGB`
    pub color_format: u32,
    /// 0 when no depth or stencil was requested
    pub depth_stencil_format: u32,
    pub samples: i32,
}

impl OffscreenFormat {
    /// Pick formats for the requested bit depths
    pub fn choose(alpha_size: i32, depth_size: i32, stencil_size: i32, samples: i32, packed_depth_stencil: bool) -> Self {
        let depth_stencil_format = match (depth_size > 0, stencil_size > 0) {
            (false, false) => 0,
            (_, true) if packed_depth_stencil => gl::DEPTH24_STENCIL8,
            (true, _) => gl::DEPTH_COMPONENT16,
            (false, true) => gl::STENCIL_INDEX8,
        };
        Self {
            color_format: if alpha_size > 0 { gl::RGBA } else { gl::RGB },
            depth_stencil_format,
            samples: samples.max(0),
        }
    }

    fn multisample_color_format(&self) -> u32 {
        if self.color_format == gl::RGBA { gl::RGBA8_OES } else { gl::RGB8_OES }
    }

    fn depth_stencil_points(&self) -> &'static [u32] {
        match self.depth_stencil_format {
            0 => &[],
            gl::DEPTH24_STENCIL8 => &[gl::DEPTH_ATTACHMENT, gl::STENCIL_ATTACHMENT],
            gl::STENCIL_INDEX8 => &[gl::STENCIL_ATTACHMENT],
            _ => &[gl::DEPTH_ATTACHMENT],
        }
    }
}

/// Client bindings the target's own work must put back
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreBindings {
    /// Service id bound to TEXTURE_2D on unit 0
    pub texture_2d: u32,
    pub active_unit: u32,
    pub renderbuffer: u32,
    pub framebuffer: u32,
}

pub struct OffscreenTarget {
    format: OffscreenFormat,
    width: i32,
    height: i32,
    framebuffer: u32,
    color_texture: u32,
    depth_stencil: u32,
    multisample_framebuffer: u32,
    multisample_color: u32,
    saved_texture: u32,
}

impl OffscreenTarget {
    /// Create and allocate every object; on failure nothing is leaked
    pub fn create(
        driver: &mut dyn GraphicsDriver,
        format: OffscreenFormat,
        width: i32,
        height: i32,
        restore: RestoreBindings,
    ) -> Result<Self> {
        let multisampled = format.samples > 0;
        let mut target = Self {
            format,
            width: 0,
            height: 0,
            framebuffer: driver.gen_framebuffer(),
            color_texture: driver.gen_texture(),
            depth_stencil: if format.depth_stencil_format != 0 { driver.gen_renderbuffer() } else { 0 },
            multisample_framebuffer: if multisampled { driver.gen_framebuffer() } else { 0 },
            multisample_color: if multisampled { driver.gen_renderbuffer() } else { 0 },
            saved_texture: driver.gen_texture(),
        };
        if let Err(err) = target.allocate(driver, width, height, restore) {
            target.destroy(Some(driver));
            return Err(err);
        }
        crate::gpu_debug!(
            "gpu::Offscreen",
            "Created {}x{} offscreen target ({} samples)",
            width,
            height,
            format.samples
        );
        Ok(target)
    }

    fn allocate(&mut self, driver: &mut dyn GraphicsDriver, width: i32, height: i32, restore: RestoreBindings) -> Result<()> {
        let width = width.max(1);
        let height = height.max(1);
        let color = self.format.color_format;

        for texture in [self.color_texture, self.saved_texture] {
            let mut binder =
                ScopedTextureBinder::new(driver, gl::TEXTURE_2D, texture, restore.texture_2d, restore.active_unit);
            let driver = binder.driver();
            driver.tex_image_2d(gl::TEXTURE_2D, 0, color, width, height, color, gl::UNSIGNED_BYTE, None);
            driver.tex_parameter_i(gl::TEXTURE_2D, gl::TEXTURE_MIN_FILTER, gl::NEAREST as i32);
            driver.tex_parameter_i(gl::TEXTURE_2D, gl::TEXTURE_MAG_FILTER, gl::NEAREST as i32);
            driver.tex_parameter_i(gl::TEXTURE_2D, gl::TEXTURE_WRAP_S, gl::CLAMP_TO_EDGE as i32);
            driver.tex_parameter_i(gl::TEXTURE_2D, gl::TEXTURE_WRAP_T, gl::CLAMP_TO_EDGE as i32);
        }

        {
            let mut binder = ScopedRenderbufferBinder::new(driver, 0, restore.renderbuffer);
            let driver = binder.driver();
            if self.depth_stencil != 0 {
                driver.bind_renderbuffer(gl::RENDERBUFFER, self.depth_stencil);
                driver.renderbuffer_storage(
                    gl::RENDERBUFFER,
                    self.format.samples,
                    self.format.depth_stencil_format,
                    width,
                    height,
                );
            }
            if self.multisample_color != 0 {
                driver.bind_renderbuffer(gl::RENDERBUFFER, self.multisample_color);
                driver.renderbuffer_storage(
                    gl::RENDERBUFFER,
                    self.format.samples,
                    self.format.multisample_color_format(),
                    width,
                    height,
                );
            }
        }

        let mut binder = ScopedFramebufferBinder::new(driver, self.framebuffer, restore.framebuffer);
        let driver = binder.driver();
        driver.framebuffer_texture_2d(gl::FRAMEBUFFER, gl::COLOR_ATTACHMENT0, gl::TEXTURE_2D, self.color_texture, 0);
        if self.multisample_framebuffer == 0 {
            for point in self.format.depth_stencil_points() {
                driver.framebuffer_renderbuffer(gl::FRAMEBUFFER, *point, self.depth_stencil);
            }
        }
        let status = driver.check_framebuffer_status(gl::FRAMEBUFFER);
        if status != gl::FRAMEBUFFER_COMPLETE {
            crate::gpu_bail!("gpu::Offscreen", "Offscreen framebuffer incomplete ({:#06x})", status);
        }

        if self.multisample_framebuffer != 0 {
            driver.bind_framebuffer(gl::FRAMEBUFFER, self.multisample_framebuffer);
            driver.framebuffer_renderbuffer(gl::FRAMEBUFFER, gl::COLOR_ATTACHMENT0, self.multisample_color);
            for point in self.format.depth_stencil_points() {
                driver.framebuffer_renderbuffer(gl::FRAMEBUFFER, *point, self.depth_stencil);
            }
            let status = driver.check_framebuffer_status(gl::FRAMEBUFFER);
            if status != gl::FRAMEBUFFER_COMPLETE {
                crate::gpu_bail!("gpu::Offscreen", "Multisampled framebuffer incomplete ({:#06x})", status);
            }
        }

        self.width = width;
        self.height = height;
        Ok(())
    }

    /// Reallocate storage at a new size; contents are undefined afterwards
    pub fn resize(&mut self, driver: &mut dyn GraphicsDriver, width: i32, height: i32, restore: RestoreBindings) -> Result<()> {
        if (width.max(1), height.max(1)) == (self.width, self.height) {
            return Ok(());
        }
        self.allocate(driver, width, height, restore)
    }

    /// Framebuffer the client draws into when no framebuffer of its own is
    /// bound
    pub fn framebuffer_id(&self) -> u32 {
        if self.multisample_framebuffer != 0 {
            self.multisample_framebuffer
        } else {
            self.framebuffer
        }
    }

    pub fn size(&self) -> (i32, i32) {
        (self.width, self.height)
    }

    pub fn format(&self) -> OffscreenFormat {
        self.format
    }

    pub fn color_texture(&self) -> u32 {
        self.color_texture
    }

    /// Texture holding the last swapped frame
    pub fn saved_texture(&self) -> u32 {
        self.saved_texture
    }

    /// Resolve the multisampled image, then copy the frame into the saved
    /// texture
    pub fn swap(&self, driver: &mut dyn GraphicsDriver, restore: RestoreBindings) {
        if self.multisample_framebuffer != 0 {
            driver.bind_framebuffer(gl::READ_FRAMEBUFFER_EXT, self.multisample_framebuffer);
            driver.bind_framebuffer(gl::DRAW_FRAMEBUFFER_EXT, self.framebuffer);
            driver.blit_framebuffer(self.width, self.height);
        }
        let mut fb_binder = ScopedFramebufferBinder::new(driver, self.framebuffer, restore.framebuffer);
        let mut binder = ScopedTextureBinder::new(
            fb_binder.driver(),
            gl::TEXTURE_2D,
            self.saved_texture,
            restore.texture_2d,
            restore.active_unit,
        );
        binder.driver().copy_tex_sub_image_2d(gl::TEXTURE_2D, 0, 0, 0, 0, 0, self.width, self.height);
    }

    pub fn destroy(self, driver: Option<&mut dyn GraphicsDriver>) {
        let Some(driver) = driver else {
            return;
        };
        for framebuffer in [self.framebuffer, self.multisample_framebuffer] {
            if framebuffer != 0 {
                driver.delete_framebuffer(framebuffer);
            }
        }
        for renderbuffer in [self.depth_stencil, self.multisample_color] {
            if renderbuffer != 0 {
                driver.delete_renderbuffer(renderbuffer);
            }
        }
        driver.delete_texture(self.color_texture);
        driver.delete_texture(self.saved_texture);
    }
}

#[cfg(test)]
#[path = "offscreen_tests.rs"]
mod tests;
