/// Mirror of the GL state one decoder has set
///
/// Value state (clear color, masks, viewport, capabilities) is mirrored so
/// queries never reach the driver and so it can be re-issued after another
/// context used the driver. Object bindings are held as manager keys; the
/// decoder owns the references they stand for.

use crate::driver::GraphicsDriver;
use crate::gl;
use crate::resource::{BufferKey, FramebufferKey, ProgramKey, RenderbufferKey, TextureKey, VertexArrayKey};
use bitflags::bitflags;
use glam::Vec4;

bitflags! {
    /// Capabilities toggled by Enable/Disable
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EnableFlags: u32 {
        const BLEND = 1 << 0;
        const CULL_FACE = 1 << 1;
        const DEPTH_TEST = 1 << 2;
        const DITHER = 1 << 3;
        const POLYGON_OFFSET_FILL = 1 << 4;
        const SAMPLE_ALPHA_TO_COVERAGE = 1 << 5;
        const SAMPLE_COVERAGE = 1 << 6;
        const SCISSOR_TEST = 1 << 7;
        const STENCIL_TEST = 1 << 8;
    }
}

impl EnableFlags {
    pub fn from_cap(cap: u32) -> Option<Self> {
        Some(match cap {
            gl::BLEND => Self::BLEND,
            gl::CULL_FACE => Self::CULL_FACE,
            gl::DEPTH_TEST => Self::DEPTH_TEST,
            gl::DITHER => Self::DITHER,
            gl::POLYGON_OFFSET_FILL => Self::POLYGON_OFFSET_FILL,
            gl::SAMPLE_ALPHA_TO_COVERAGE => Self::SAMPLE_ALPHA_TO_COVERAGE,
            gl::SAMPLE_COVERAGE => Self::SAMPLE_COVERAGE,
            gl::SCISSOR_TEST => Self::SCISSOR_TEST,
            gl::STENCIL_TEST => Self::STENCIL_TEST,
            _ => return None,
        })
    }

    const CAPS: [(u32, EnableFlags); 9] = [
        (gl::BLEND, Self::BLEND),
        (gl::CULL_FACE, Self::CULL_FACE),
        (gl::DEPTH_TEST, Self::DEPTH_TEST),
        (gl::DITHER, Self::DITHER),
        (gl::POLYGON_OFFSET_FILL, Self::POLYGON_OFFSET_FILL),
        (gl::SAMPLE_ALPHA_TO_COVERAGE, Self::SAMPLE_ALPHA_TO_COVERAGE),
        (gl::SAMPLE_COVERAGE, Self::SAMPLE_COVERAGE),
        (gl::SCISSOR_TEST, Self::SCISSOR_TEST),
        (gl::STENCIL_TEST, Self::STENCIL_TEST),
    ];
}

/// Textures bound on one texture unit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextureUnit {
    pub bound_2d: Option<TextureKey>,
    pub bound_cube_map: Option<TextureKey>,
    pub bound_external: Option<TextureKey>,
    pub bound_rectangle: Option<TextureKey>,
}

impl TextureUnit {
    pub fn bound(&self, target: u32) -> Option<TextureKey> {
        match gl::bind_target_for(target) {
            gl::TEXTURE_2D => self.bound_2d,
            gl::TEXTURE_CUBE_MAP => self.bound_cube_map,
            gl::TEXTURE_EXTERNAL_OES => self.bound_external,
            gl::TEXTURE_RECTANGLE_ARB => self.bound_rectangle,
            _ => None,
        }
    }

    fn slot_mut(&mut self, target: u32) -> Option<&mut Option<TextureKey>> {
        match target {
            gl::TEXTURE_2D => Some(&mut self.bound_2d),
            gl::TEXTURE_CUBE_MAP => Some(&mut self.bound_cube_map),
            gl::TEXTURE_EXTERNAL_OES => Some(&mut self.bound_external),
            gl::TEXTURE_RECTANGLE_ARB => Some(&mut self.bound_rectangle),
            _ => None,
        }
    }

    pub fn bindings(&self) -> impl Iterator<Item = (u32, TextureKey)> + '_ {
        [
            (gl::TEXTURE_2D, self.bound_2d),
            (gl::TEXTURE_CUBE_MAP, self.bound_cube_map),
            (gl::TEXTURE_EXTERNAL_OES, self.bound_external),
            (gl::TEXTURE_RECTANGLE_ARB, self.bound_rectangle),
        ]
        .into_iter()
        .filter_map(|(target, key)| key.map(|key| (target, key)))
    }
}

pub struct ContextState {
    // ----- Bindings -----
    pub active_texture_unit: u32,
    pub texture_units: Vec<TextureUnit>,
    pub bound_array_buffer: Option<BufferKey>,
    pub bound_read_framebuffer: Option<FramebufferKey>,
    pub bound_draw_framebuffer: Option<FramebufferKey>,
    pub bound_renderbuffer: Option<RenderbufferKey>,
    pub current_program: Option<ProgramKey>,
    pub vertex_array: Option<VertexArrayKey>,
    pub attrib_values: Vec<Vec4>,

    // ----- Values -----
    pub enable_flags: EnableFlags,
    pub clear_color: Vec4,
    pub clear_depth: f32,
    pub clear_stencil: i32,
    pub color_mask: [bool; 4],
    pub depth_mask: bool,
    pub stencil_mask: u32,
    pub blend_src: u32,
    pub blend_dst: u32,
    pub depth_func: u32,
    pub cull_mode: u32,
    pub front_face: u32,
    pub viewport: [i32; 4],
    pub scissor: [i32; 4],
    pub hint_generate_mipmap: u32,
    pub pack_alignment: i32,
    pub unpack_alignment: i32,
    pub unpack_flip_y: bool,
    pub unpack_premultiply_alpha: bool,
}

impl ContextState {
    pub fn new(max_texture_units: u32, max_vertex_attribs: u32) -> Self {
        Self {
            active_texture_unit: 0,
            texture_units: vec![TextureUnit::default(); max_texture_units as usize],
            bound_array_buffer: None,
            bound_read_framebuffer: None,
            bound_draw_framebuffer: None,
            bound_renderbuffer: None,
            current_program: None,
            vertex_array: None,
            attrib_values: vec![Vec4::W; max_vertex_attribs as usize],
            enable_flags: EnableFlags::DITHER,
            clear_color: Vec4::ZERO,
            clear_depth: 1.0,
            clear_stencil: 0,
            color_mask: [true; 4],
            depth_mask: true,
            stencil_mask: u32::MAX,
            blend_src: gl::ONE,
            blend_dst: gl::ZERO,
            depth_func: gl::LESS,
            cull_mode: gl::BACK,
            front_face: gl::CCW,
            viewport: [0; 4],
            scissor: [0; 4],
            hint_generate_mipmap: gl::DONT_CARE,
            pack_alignment: 4,
            unpack_alignment: 4,
            unpack_flip_y: false,
            unpack_premultiply_alpha: false,
        }
    }

    // ===== TEXTURES =====

    pub fn active_unit(&self) -> &TextureUnit {
        &self.texture_units[self.active_texture_unit as usize]
    }

    pub fn bound_texture(&self, target: u32) -> Option<TextureKey> {
        self.active_unit().bound(target)
    }

    /// Bind `key` on the active unit; returns what it replaced
    pub fn set_bound_texture(&mut self, target: u32, key: Option<TextureKey>) -> Option<TextureKey> {
        let unit = &mut self.texture_units[self.active_texture_unit as usize];
        match unit.slot_mut(target) {
            Some(slot) => std::mem::replace(slot, key),
            None => None,
        }
    }

    /// Drop `key` from every unit; returns how many bindings went away
    pub fn unbind_texture(&mut self, key: TextureKey) -> usize {
        let mut count = 0;
        for unit in &mut self.texture_units {
            for slot in [
                &mut unit.bound_2d,
                &mut unit.bound_cube_map,
                &mut unit.bound_external,
                &mut unit.bound_rectangle,
            ] {
                if *slot == Some(key) {
                    *slot = None;
                    count += 1;
                }
            }
        }
        count
    }

    // ===== CAPABILITIES =====

    /// Returns false when the value did not change
    pub fn set_enabled(&mut self, cap: EnableFlags, enabled: bool) -> bool {
        if self.enable_flags.contains(cap) == enabled {
            return false;
        }
        self.enable_flags.set(cap, enabled);
        true
    }

    pub fn is_enabled(&self, cap: EnableFlags) -> bool {
        self.enable_flags.contains(cap)
    }

    // ===== QUERIES =====

    /// Mirrored value state for `pname`; bindings and limits are answered by
    /// the decoder
    pub fn get_integers(&self, pname: u32) -> Option<Vec<i32>> {
        let value = match pname {
            gl::VIEWPORT => return Some(self.viewport.to_vec()),
            gl::SCISSOR_BOX => return Some(self.scissor.to_vec()),
            gl::COLOR_WRITEMASK => return Some(self.color_mask.iter().map(|m| *m as i32).collect()),
            gl::COLOR_CLEAR_VALUE => {
                return Some(self.clear_color.to_array().iter().map(|c| float_to_int(*c)).collect());
            }
            gl::DEPTH_CLEAR_VALUE => float_to_int(self.clear_depth),
            gl::STENCIL_CLEAR_VALUE => self.clear_stencil,
            gl::DEPTH_WRITEMASK => self.depth_mask as i32,
            gl::STENCIL_WRITEMASK => self.stencil_mask as i32,
            gl::BLEND_SRC_RGB => self.blend_src as i32,
            gl::BLEND_DST_RGB => self.blend_dst as i32,
            gl::DEPTH_FUNC => self.depth_func as i32,
            gl::CULL_FACE_MODE => self.cull_mode as i32,
            gl::FRONT_FACE => self.front_face as i32,
            gl::GENERATE_MIPMAP_HINT => self.hint_generate_mipmap as i32,
            gl::PACK_ALIGNMENT => self.pack_alignment,
            gl::UNPACK_ALIGNMENT => self.unpack_alignment,
            gl::ACTIVE_TEXTURE => (gl::TEXTURE0 + self.active_texture_unit) as i32,
            cap => self.is_enabled(EnableFlags::from_cap(cap)?) as i32,
        };
        Some(vec![value])
    }

    // ===== RESTORE =====

    /// Re-issue every mirrored value to the driver
    pub fn restore_state(&self, driver: &mut dyn GraphicsDriver) {
        for (cap, flag) in EnableFlags::CAPS {
            if self.enable_flags.contains(flag) {
                driver.enable(cap);
            } else {
                driver.disable(cap);
            }
        }
        driver.clear_color(self.clear_color.to_array());
        driver.clear_depth(self.clear_depth);
        driver.clear_stencil(self.clear_stencil);
        driver.color_mask(self.color_mask);
        driver.depth_mask(self.depth_mask);
        driver.stencil_mask(self.stencil_mask);
        driver.blend_func(self.blend_src, self.blend_dst);
        driver.depth_func(self.depth_func);
        driver.cull_face(self.cull_mode);
        driver.front_face(self.front_face);
        let [x, y, w, h] = self.viewport;
        driver.viewport(x, y, w, h);
        let [x, y, w, h] = self.scissor;
        driver.scissor(x, y, w, h);
        driver.hint(gl::GENERATE_MIPMAP_HINT, self.hint_generate_mipmap);
        driver.pixel_store_i(gl::PACK_ALIGNMENT, self.pack_alignment);
        driver.pixel_store_i(gl::UNPACK_ALIGNMENT, self.unpack_alignment);
        for (index, value) in self.attrib_values.iter().enumerate() {
            driver.vertex_attrib_4f(index as u32, value.to_array());
        }
        driver.active_texture(gl::TEXTURE0 + self.active_texture_unit);
    }

    /// Restore the clear values, masks and scissor test after a
    /// service-internal clear
    pub fn restore_clear_state(&self, driver: &mut dyn GraphicsDriver) {
        driver.clear_color(self.clear_color.to_array());
        driver.clear_depth(self.clear_depth);
        driver.clear_stencil(self.clear_stencil);
        driver.color_mask(self.color_mask);
        driver.depth_mask(self.depth_mask);
        driver.stencil_mask(self.stencil_mask);
        if self.is_enabled(EnableFlags::SCISSOR_TEST) {
            driver.enable(gl::SCISSOR_TEST);
        }
    }
}

/// GL's float-to-integer state conversion for normalized values
fn float_to_int(value: f32) -> i32 {
    let scaled = (value.clamp(-1.0, 1.0) as f64) * i32::MAX as f64;
    scaled.round() as i32
}

#[cfg(test)]
#[path = "context_state_tests.rs"]
mod tests;
