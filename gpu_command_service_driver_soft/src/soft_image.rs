/// SoftImage - host-memory texel storage
///
/// Texels are kept in the client format/type they were defined with. Storage
/// defined without data is filled with `UNDEFINED_PATTERN`, so a read of
/// memory nobody initialized is recognizable in tests.

use gpu_command_service::gpu::gl;

/// Byte pattern repeated through undefined storage
pub const UNDEFINED_PATTERN: [u8; 4] = [0xDE, 0xAD, 0xBE, 0xEF];

#[derive(Debug, Clone, PartialEq)]
pub struct SoftImage {
    pub width: i32,
    pub height: i32,
    pub internal_format: u32,
    /// Client format of the stored texels
    pub format: u32,
    /// Client type of the stored texels; 0 for opaque compressed data
    pub ty: u32,
    data: Vec<u8>,
}

/// Rectangle clipped to an image, as `(x0, y0, x1, y1)`
fn clip_rect(x: i32, y: i32, width: i32, height: i32, limit_w: i32, limit_h: i32) -> Option<(usize, usize, usize, usize)> {
    let x0 = x.clamp(0, limit_w);
    let y0 = y.clamp(0, limit_h);
    let x1 = x.saturating_add(width).clamp(0, limit_w);
    let y1 = y.saturating_add(height).clamp(0, limit_h);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some((x0 as usize, y0 as usize, x1 as usize, y1 as usize))
}

/// Position of each stored byte in an RGBA quadruple
fn channel_order(format: u32) -> &'static [usize] {
    match format {
        gl::RGBA => &[0, 1, 2, 3],
        gl::RGB => &[0, 1, 2],
        gl::BGRA_EXT => &[2, 1, 0, 3],
        gl::ALPHA => &[3],
        gl::LUMINANCE => &[0],
        gl::LUMINANCE_ALPHA => &[0, 3],
        _ => &[],
    }
}

impl SoftImage {
    /// Storage with undefined contents
    pub fn undefined(width: i32, height: i32, internal_format: u32, format: u32, ty: u32) -> Self {
        let mut image = Self { width: width.max(0), height: height.max(0), internal_format, format, ty, data: Vec::new() };
        let len = image.row_bytes() * image.height as usize;
        image.data = UNDEFINED_PATTERN.iter().copied().cycle().take(len).collect();
        image
    }

    /// Storage initialized from client pixels packed with `alignment`
    pub fn from_pixels(
        width: i32,
        height: i32,
        internal_format: u32,
        format: u32,
        ty: u32,
        pixels: &[u8],
        alignment: u32,
    ) -> Self {
        let mut image = Self::undefined(width, height, internal_format, format, ty);
        image.write_rect(0, 0, width, height, pixels, alignment);
        image
    }

    /// Compressed data kept as an opaque blob
    pub fn opaque(width: i32, height: i32, internal_format: u32, data: &[u8]) -> Self {
        Self { width, height, internal_format, format: internal_format, ty: 0, data: data.to_vec() }
    }

    pub fn bytes_per_pixel(&self) -> usize {
        gl::bytes_per_pixel(self.format, self.ty).unwrap_or(0) as usize
    }

    fn row_bytes(&self) -> usize {
        self.bytes_per_pixel() * self.width as usize
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Whether any byte still follows the undefined pattern at its position
    pub fn has_undefined_texels(&self) -> bool {
        !self.data.is_empty()
            && self.data.chunks(4).any(|chunk| chunk == &UNDEFINED_PATTERN[..chunk.len()])
    }

    /// Texel at `(x, y)` as RGBA8; `None` outside the image or for formats
    /// with no color conversion
    pub fn rgba8_at(&self, x: i32, y: i32) -> Option<[u8; 4]> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height || self.ty != gl::UNSIGNED_BYTE {
            return None;
        }
        let bpp = self.bytes_per_pixel();
        let start = y as usize * self.row_bytes() + x as usize * bpp;
        self.data.get(start..start + bpp).map(|texel| self.to_rgba8(texel))
    }

    fn to_rgba8(&self, texel: &[u8]) -> [u8; 4] {
        let mut rgba = [0, 0, 0, 0xFF];
        for (byte, &channel) in texel.iter().zip(channel_order(self.format)) {
            rgba[channel] = *byte;
        }
        if matches!(self.format, gl::LUMINANCE | gl::LUMINANCE_ALPHA) {
            rgba[1] = rgba[0];
            rgba[2] = rgba[0];
        }
        rgba
    }

    fn from_rgba8(&self, rgba: [u8; 4], out: &mut [u8]) {
        for (byte, &channel) in out.iter_mut().zip(channel_order(self.format)) {
            *byte = rgba[channel];
        }
    }

    // ===== UPLOAD / READBACK =====

    /// Write client pixels (rows padded to `alignment`) at `(x, y)`; texels
    /// outside the image are dropped
    pub fn write_rect(&mut self, x: i32, y: i32, width: i32, height: i32, pixels: &[u8], alignment: u32) {
        let bpp = self.bytes_per_pixel();
        let Some(src_row) = gl::padded_row_size((width.max(0) as usize * bpp) as u32, alignment) else {
            return;
        };
        let Some((x0, y0, x1, y1)) = clip_rect(x, y, width, height, self.width, self.height) else {
            return;
        };
        let dst_row = self.row_bytes();
        let span = (x1 - x0) * bpp;
        for row in y0..y1 {
            let src = (row as i32 - y) as usize * src_row as usize + (x0 as i32 - x) as usize * bpp;
            let dst = row * dst_row + x0 * bpp;
            if let (Some(src), Some(dst)) = (pixels.get(src..src + span), self.data.get_mut(dst..dst + span)) {
                dst.copy_from_slice(src);
            }
        }
    }

    /// Read a rectangle into `out` as `format`/`ty` rows padded to
    /// `alignment`
    ///
    /// Matching layouts are copied raw; RGBA/UNSIGNED_BYTE reads convert from
    /// any byte color format. Anything else reads as zeros.
    #[allow(clippy::too_many_arguments)]
    pub fn read_rect(&self, x: i32, y: i32, width: i32, height: i32, format: u32, ty: u32, alignment: u32, out: &mut [u8]) {
        let Some(out_bpp) = gl::bytes_per_pixel(format, ty).map(|b| b as usize) else {
            return;
        };
        let Some(out_row) = gl::padded_row_size((width.max(0) as usize * out_bpp) as u32, alignment) else {
            return;
        };
        let Some((x0, y0, x1, y1)) = clip_rect(x, y, width, height, self.width, self.height) else {
            return;
        };
        let raw = format == self.format && ty == self.ty;
        let convert = format == gl::RGBA && ty == gl::UNSIGNED_BYTE && self.ty == gl::UNSIGNED_BYTE;
        let bpp = self.bytes_per_pixel();
        for row in y0..y1 {
            for col in x0..x1 {
                let src = row * self.row_bytes() + col * bpp;
                let dst = (row as i32 - y) as usize * out_row as usize + (col as i32 - x) as usize * out_bpp;
                let (Some(texel), Some(target)) = (self.data.get(src..src + bpp), out.get_mut(dst..dst + out_bpp)) else {
                    continue;
                };
                if raw {
                    target.copy_from_slice(texel);
                } else if convert {
                    target.copy_from_slice(&self.to_rgba8(texel));
                }
            }
        }
    }

    /// Copy a rectangle of `src` to `(dst_x, dst_y)`, converting through RGBA8
    /// when the layouts differ
    #[allow(clippy::too_many_arguments)]
    pub fn copy_from(&mut self, dst_x: i32, dst_y: i32, src: &SoftImage, src_x: i32, src_y: i32, width: i32, height: i32) {
        let bpp = self.bytes_per_pixel();
        let raw = self.format == src.format && self.ty == src.ty;
        for row in 0..height.max(0) {
            for col in 0..width.max(0) {
                let (sx, sy, dx, dy) = (src_x + col, src_y + row, dst_x + col, dst_y + row);
                if dx < 0 || dy < 0 || dx >= self.width || dy >= self.height {
                    continue;
                }
                if sx < 0 || sy < 0 || sx >= src.width || sy >= src.height {
                    continue;
                }
                let dst = dy as usize * self.row_bytes() + dx as usize * bpp;
                let src_bpp = src.bytes_per_pixel();
                let from = sy as usize * src.row_bytes() + sx as usize * src_bpp;
                let Some(texel) = src.data.get(from..from + src_bpp) else {
                    continue;
                };
                let mut converted = vec![0u8; bpp];
                if raw {
                    converted.copy_from_slice(texel);
                } else {
                    self.from_rgba8(src.to_rgba8(texel), &mut converted);
                }
                if let Some(target) = self.data.get_mut(dst..dst + bpp) {
                    target.copy_from_slice(&converted);
                }
            }
        }
    }

    /// Next mip level: nearest sample of every 2x2 block
    pub fn downsample(&self) -> SoftImage {
        let width = (self.width / 2).max(1);
        let height = (self.height / 2).max(1);
        let mut next = SoftImage::undefined(width, height, self.internal_format, self.format, self.ty);
        let bpp = self.bytes_per_pixel();
        for y in 0..height as usize {
            for x in 0..width as usize {
                let sx = (x * 2).min(self.width.max(1) as usize - 1);
                let sy = (y * 2).min(self.height.max(1) as usize - 1);
                let from = sy * self.row_bytes() + sx * bpp;
                let to = y * next.row_bytes() + x * bpp;
                if let (Some(texel), Some(target)) = (self.data.get(from..from + bpp), next.data.get_mut(to..to + bpp)) {
                    target.copy_from_slice(texel);
                }
            }
        }
        next
    }

    // ===== CLEARS =====

    /// Fill a rectangle with a color, writing only channels enabled in `mask`
    pub fn fill_color(&mut self, rect: [i32; 4], color: [f32; 4], mask: [bool; 4]) {
        if self.ty != gl::UNSIGNED_BYTE {
            return;
        }
        let rgba = color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
        let order = channel_order(self.format);
        self.fill_with(rect, |texel| {
            for (byte, &channel) in texel.iter_mut().zip(order) {
                if mask[channel] {
                    *byte = rgba[channel];
                }
            }
        });
    }

    /// Fill the depth and/or stencil part of a depth image
    pub fn fill_depth_stencil(&mut self, rect: [i32; 4], depth: Option<f32>, stencil: Option<u8>) {
        let (format, ty) = (self.format, self.ty);
        self.fill_with(rect, |texel| match (format, ty) {
            (gl::DEPTH_COMPONENT, gl::UNSIGNED_SHORT) => {
                if let Some(depth) = depth {
                    let value = (depth.clamp(0.0, 1.0) * u16::MAX as f32) as u16;
                    texel.copy_from_slice(&value.to_ne_bytes());
                }
            }
            (gl::DEPTH_COMPONENT, gl::UNSIGNED_INT) => {
                if let Some(depth) = depth {
                    let value = (depth.clamp(0.0, 1.0) as f64 * u32::MAX as f64) as u32;
                    texel.copy_from_slice(&value.to_ne_bytes());
                }
            }
            (gl::DEPTH_STENCIL, gl::UNSIGNED_INT_24_8) => {
                let mut word = [0u8; 4];
                word.copy_from_slice(texel);
                let mut value = u32::from_ne_bytes(word);
                if let Some(depth) = depth {
                    value = (value & 0xFF) | (((depth.clamp(0.0, 1.0) * 0xFF_FFFF as f32) as u32) << 8);
                }
                if let Some(stencil) = stencil {
                    value = (value & !0xFF) | stencil as u32;
                }
                texel.copy_from_slice(&value.to_ne_bytes());
            }
            _ => {}
        });
    }

    fn fill_with(&mut self, rect: [i32; 4], mut write: impl FnMut(&mut [u8])) {
        let bpp = self.bytes_per_pixel();
        if bpp == 0 {
            return;
        }
        let Some((x0, y0, x1, y1)) = clip_rect(rect[0], rect[1], rect[2], rect[3], self.width, self.height) else {
            return;
        };
        let row_bytes = self.row_bytes();
        for row in y0..y1 {
            let start = row * row_bytes;
            if let Some(line) = self.data.get_mut(start + x0 * bpp..start + x1 * bpp) {
                line.chunks_exact_mut(bpp).for_each(&mut write);
            }
        }
    }
}

#[cfg(test)]
#[path = "soft_image_tests.rs"]
mod tests;
