/// Surface trait - the drawable a decoder presents to

/// Pixel layout of a surface's default framebuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceFormat {
    pub alpha_bits: i32,
    pub depth_bits: i32,
    pub stencil_bits: i32,
}

impl Default for SurfaceFormat {
    fn default() -> Self {
        Self { alpha_bits: 8, depth_bits: 24, stencil_bits: 8 }
    }
}

pub trait Surface: Send {
    /// Current size in pixels
    fn size(&self) -> (i32, i32);

    /// Whether this is a pbuffer-style surface with no on-screen presence
    fn is_offscreen(&self) -> bool;

    fn format(&self) -> SurfaceFormat;

    /// Resize the drawable; false if the platform refused
    fn resize(&mut self, width: i32, height: i32) -> bool;

    /// Present the back buffer; false if presentation failed
    fn swap_buffers(&mut self) -> bool;
}
