/// Lazy clearing of texture levels and framebuffer attachments
///
/// Storage defined without data is recorded as uncleared. Before a command
/// can observe it (sampling, reads, copies, partial uploads, rendering into a
/// framebuffer) the decoder clears it here with zeros.

use super::context_state::ContextState;
use super::scoped_binders::{ScopedFramebufferBinder, ScopedTextureBinder};
use crate::driver::GraphicsDriver;
use crate::gl;
use crate::resource::LevelClearer;

/// Largest zero buffer uploaded in one call; bigger levels go in row bands
const MAX_ZERO_BYTES: u32 = 4 * 1024 * 1024;

/// Clears texture levels through the driver, restoring bindings after each
pub struct DriverLevelClearer<'a> {
    driver: &'a mut dyn GraphicsDriver,
    state: &'a ContextState,
    /// `(bind target, service id)` bound on unit 0
    unit0_bindings: Vec<(u32, u32)>,
    /// Service id of the currently bound framebuffer
    framebuffer: u32,
    depth_with_framebuffer: bool,
}

impl<'a> DriverLevelClearer<'a> {
    pub fn new(
        driver: &'a mut dyn GraphicsDriver,
        state: &'a ContextState,
        unit0_bindings: Vec<(u32, u32)>,
        framebuffer: u32,
        depth_with_framebuffer: bool,
    ) -> Self {
        Self { driver, state, unit0_bindings, framebuffer, depth_with_framebuffer }
    }

    fn previous_binding(&self, bind_target: u32) -> u32 {
        self.unit0_bindings
            .iter()
            .find(|(target, _)| *target == bind_target)
            .map(|(_, id)| *id)
            .unwrap_or(0)
    }

    #[allow(clippy::too_many_arguments)]
    fn upload_zeros(
        &mut self,
        service_id: u32,
        bind_target: u32,
        target: u32,
        level: i32,
        internal_format: u32,
        format: u32,
        ty: u32,
        width: i32,
        height: i32,
        immutable: bool,
    ) -> bool {
        let alignment = self.state.unpack_alignment as u32;
        let (Some(size), Some(row)) = (
            gl::compute_image_size(width as u32, height as u32, format, ty, alignment),
            gl::bytes_per_pixel(format, ty)
                .and_then(|bpp| bpp.checked_mul(width as u32))
                .and_then(|row| gl::padded_row_size(row, alignment)),
        ) else {
            return false;
        };
        let previous = self.previous_binding(bind_target);
        let mut binder =
            ScopedTextureBinder::new(&mut *self.driver, bind_target, service_id, previous, self.state.active_texture_unit);
        let driver = binder.driver();

        if size <= MAX_ZERO_BYTES {
            let zeros = vec![0u8; size as usize];
            if immutable {
                driver.tex_sub_image_2d(target, level, 0, 0, width, height, format, ty, &zeros);
            } else {
                driver.tex_image_2d(target, level, internal_format, width, height, format, ty, Some(&zeros));
            }
            return true;
        }

        if !immutable {
            driver.tex_image_2d(target, level, internal_format, width, height, format, ty, None);
        }
        let rows_per_band = (MAX_ZERO_BYTES / row.max(1)).max(1) as i32;
        let zeros = vec![0u8; (row as usize) * rows_per_band as usize];
        let mut y = 0;
        while y < height {
            let rows = rows_per_band.min(height - y);
            let len = gl::compute_image_size(width as u32, rows as u32, format, ty, alignment).unwrap_or(0) as usize;
            driver.tex_sub_image_2d(target, level, 0, y, width, rows, format, ty, &zeros[..len]);
            y += rows;
        }
        true
    }

    fn clear_depth_with_framebuffer(&mut self, service_id: u32, target: u32, level: i32, internal_format: u32) -> bool {
        let stencil = gl::has_stencil(internal_format);
        let framebuffer = self.driver.gen_framebuffer();
        let status = {
            let mut binder = ScopedFramebufferBinder::new(&mut *self.driver, framebuffer, self.framebuffer);
            let driver = binder.driver();
            driver.framebuffer_texture_2d(gl::FRAMEBUFFER, gl::DEPTH_ATTACHMENT, target, service_id, level);
            if stencil {
                driver.framebuffer_texture_2d(gl::FRAMEBUFFER, gl::STENCIL_ATTACHMENT, target, service_id, level);
            }
            let status = driver.check_framebuffer_status(gl::FRAMEBUFFER);
            if status == gl::FRAMEBUFFER_COMPLETE {
                let mask = gl::DEPTH_BUFFER_BIT | if stencil { gl::STENCIL_BUFFER_BIT } else { 0 };
                clear_with_defaults(driver, self.state, mask);
            }
            status
        };
        self.driver.delete_framebuffer(framebuffer);
        status == gl::FRAMEBUFFER_COMPLETE
    }
}

impl LevelClearer for DriverLevelClearer<'_> {
    fn clear_level(
        &mut self,
        service_id: u32,
        bind_target: u32,
        target: u32,
        level: i32,
        internal_format: u32,
        format: u32,
        ty: u32,
        width: i32,
        height: i32,
        immutable: bool,
    ) -> bool {
        if self.depth_with_framebuffer && gl::is_depth_format(internal_format) {
            return self.clear_depth_with_framebuffer(service_id, target, level, internal_format);
        }
        self.upload_zeros(service_id, bind_target, target, level, internal_format, format, ty, width, height, immutable)
    }
}

/// Buffer bits covering the given attachment points
pub fn clear_mask_for(points: impl IntoIterator<Item = u32>) -> u32 {
    points.into_iter().fold(0, |mask, point| {
        mask | match point {
            gl::DEPTH_ATTACHMENT => gl::DEPTH_BUFFER_BIT,
            gl::STENCIL_ATTACHMENT => gl::STENCIL_BUFFER_BIT,
            gl::DEPTH_STENCIL_ATTACHMENT => gl::DEPTH_BUFFER_BIT | gl::STENCIL_BUFFER_BIT,
            _ => gl::COLOR_BUFFER_BIT,
        }
    })
}

/// Clear `mask` of the bound framebuffer to GL defaults, then put the
/// client's clear state back
pub fn clear_with_defaults(driver: &mut dyn GraphicsDriver, state: &ContextState, mask: u32) {
    if mask == 0 {
        return;
    }
    driver.clear_color([0.0; 4]);
    driver.color_mask([true; 4]);
    driver.clear_depth(1.0);
    driver.depth_mask(true);
    driver.clear_stencil(0);
    driver.stencil_mask(u32::MAX);
    driver.disable(gl::SCISSOR_TEST);
    driver.clear(mask);
    state.restore_clear_state(driver);
}

#[cfg(test)]
#[path = "clear_tests.rs"]
mod tests;
