/// Temporary driver bindings restored on drop
///
/// Service-internal work (clears, offscreen copies) binds its own objects;
/// each binder puts the client's binding back on every exit path.

use super::error_state::ErrorState;
use crate::driver::GraphicsDriver;
use crate::gl;

/// Binds a texture on unit 0 for the binder's lifetime
pub struct ScopedTextureBinder<'a> {
    driver: &'a mut dyn GraphicsDriver,
    target: u32,
    /// Service id unit 0 had on `target`
    previous: u32,
    active_unit: u32,
}

impl<'a> ScopedTextureBinder<'a> {
    pub fn new(driver: &'a mut dyn GraphicsDriver, target: u32, id: u32, previous: u32, active_unit: u32) -> Self {
        if active_unit != 0 {
            driver.active_texture(gl::TEXTURE0);
        }
        driver.bind_texture(target, id);
        Self { driver, target, previous, active_unit }
    }

    pub fn driver(&mut self) -> &mut dyn GraphicsDriver {
        &mut *self.driver
    }
}

impl Drop for ScopedTextureBinder<'_> {
    fn drop(&mut self) {
        self.driver.bind_texture(self.target, self.previous);
        if self.active_unit != 0 {
            self.driver.active_texture(gl::TEXTURE0 + self.active_unit);
        }
    }
}

/// Binds a framebuffer to FRAMEBUFFER for the binder's lifetime
pub struct ScopedFramebufferBinder<'a> {
    driver: &'a mut dyn GraphicsDriver,
    previous: u32,
}

impl<'a> ScopedFramebufferBinder<'a> {
    pub fn new(driver: &'a mut dyn GraphicsDriver, id: u32, previous: u32) -> Self {
        driver.bind_framebuffer(gl::FRAMEBUFFER, id);
        Self { driver, previous }
    }

    pub fn driver(&mut self) -> &mut dyn GraphicsDriver {
        &mut *self.driver
    }
}

impl Drop for ScopedFramebufferBinder<'_> {
    fn drop(&mut self) {
        self.driver.bind_framebuffer(gl::FRAMEBUFFER, self.previous);
    }
}

/// Binds a renderbuffer for the binder's lifetime
pub struct ScopedRenderbufferBinder<'a> {
    driver: &'a mut dyn GraphicsDriver,
    previous: u32,
}

impl<'a> ScopedRenderbufferBinder<'a> {
    pub fn new(driver: &'a mut dyn GraphicsDriver, id: u32, previous: u32) -> Self {
        driver.bind_renderbuffer(gl::RENDERBUFFER, id);
        Self { driver, previous }
    }

    pub fn driver(&mut self) -> &mut dyn GraphicsDriver {
        &mut *self.driver
    }
}

impl Drop for ScopedRenderbufferBinder<'_> {
    fn drop(&mut self) {
        self.driver.bind_renderbuffer(gl::RENDERBUFFER, self.previous);
    }
}

/// Drains driver errors on entry and exit so internal calls never leak
/// errors to the client
pub struct ScopedGlErrorSuppressor<'a> {
    driver: &'a mut dyn GraphicsDriver,
    errors: &'a mut ErrorState,
}

impl<'a> ScopedGlErrorSuppressor<'a> {
    pub fn new(driver: &'a mut dyn GraphicsDriver, errors: &'a mut ErrorState) -> Self {
        errors.clear_real_gl_errors(driver);
        Self { driver, errors }
    }

    pub fn driver(&mut self) -> &mut dyn GraphicsDriver {
        &mut *self.driver
    }
}

impl Drop for ScopedGlErrorSuppressor<'_> {
    fn drop(&mut self) {
        self.errors.clear_real_gl_errors(&mut *self.driver);
    }
}

#[cfg(test)]
#[path = "scoped_binders_tests.rs"]
mod tests;
