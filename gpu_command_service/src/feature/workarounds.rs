//! Driver bug workaround flags
//!
//! Parsed from a list of numeric ids separated by commas or whitespace.
//! Unknown or malformed ids are logged and ignored.

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Workarounds: u32 {
        const CLEAR_ALPHA_IN_READPIXELS = 1 << 0;
        const CLEAR_UNIFORMS_BEFORE_PROGRAM_USE = 1 << 1;
        const DELETE_INSTEAD_OF_RESIZE_FBO = 1 << 2;
        const DISABLE_DEPTH_TEXTURE = 1 << 3;
        const EXIT_ON_CONTEXT_LOST = 1 << 4;
        const FLUSH_ON_CONTEXT_SWITCH = 1 << 5;
        const MAX_CUBE_MAP_TEXTURE_SIZE_LIMIT_1024 = 1 << 6;
        const MAX_TEXTURE_SIZE_LIMIT_4096 = 1 << 7;
        const NEEDS_OFFSCREEN_BUFFER_WORKAROUND = 1 << 8;
        const RESTORE_SCISSOR_ON_FBO_CHANGE = 1 << 9;
        const SET_TEXTURE_FILTER_BEFORE_GENERATING_MIPMAP = 1 << 10;
        const USE_CLIENT_SIDE_ARRAYS_FOR_STREAM_BUFFERS = 1 << 11;
        const USE_CURRENT_PROGRAM_AFTER_SUCCESSFUL_LINK = 1 << 12;
        const CLEAR_DEPTH_TEXTURE_WITH_FRAMEBUFFER = 1 << 13;
        const MAX_VARYING_VECTORS_LIMIT_16 = 1 << 14;
        const DISABLE_MULTISAMPLING = 1 << 15;
    }
}

/// Wire id, name and flag of every known workaround
pub const WORKAROUND_TABLE: &[(u32, &str, Workarounds)] = &[
    (1, "clear_alpha_in_readpixels", Workarounds::CLEAR_ALPHA_IN_READPIXELS),
    (2, "clear_uniforms_before_program_use", Workarounds::CLEAR_UNIFORMS_BEFORE_PROGRAM_USE),
    (3, "delete_instead_of_resize_fbo", Workarounds::DELETE_INSTEAD_OF_RESIZE_FBO),
    (4, "disable_depth_texture", Workarounds::DISABLE_DEPTH_TEXTURE),
    (5, "exit_on_context_lost", Workarounds::EXIT_ON_CONTEXT_LOST),
    (6, "flush_on_context_switch", Workarounds::FLUSH_ON_CONTEXT_SWITCH),
    (7, "max_cube_map_texture_size_limit_1024", Workarounds::MAX_CUBE_MAP_TEXTURE_SIZE_LIMIT_1024),
    (8, "max_texture_size_limit_4096", Workarounds::MAX_TEXTURE_SIZE_LIMIT_4096),
    (9, "needs_offscreen_buffer_workaround", Workarounds::NEEDS_OFFSCREEN_BUFFER_WORKAROUND),
    (10, "restore_scissor_on_fbo_change", Workarounds::RESTORE_SCISSOR_ON_FBO_CHANGE),
    (11, "set_texture_filter_before_generating_mipmap", Workarounds::SET_TEXTURE_FILTER_BEFORE_GENERATING_MIPMAP),
    (12, "use_client_side_arrays_for_stream_buffers", Workarounds::USE_CLIENT_SIDE_ARRAYS_FOR_STREAM_BUFFERS),
    (13, "use_current_program_after_successful_link", Workarounds::USE_CURRENT_PROGRAM_AFTER_SUCCESSFUL_LINK),
    (14, "clear_depth_texture_with_framebuffer", Workarounds::CLEAR_DEPTH_TEXTURE_WITH_FRAMEBUFFER),
    (15, "max_varying_vectors_limit_16", Workarounds::MAX_VARYING_VECTORS_LIMIT_16),
    (16, "disable_multisampling", Workarounds::DISABLE_MULTISAMPLING),
];

impl Workarounds {
    /// Flag for a wire id
    pub fn from_id(id: u32) -> Option<Self> {
        WORKAROUND_TABLE
            .iter()
            .find(|(wire, _, _)| *wire == id)
            .map(|(_, _, flag)| *flag)
    }

    /// Parse a workaround list such as `"4,8, 13"`
    pub fn parse(list: &str) -> Self {
        let mut flags = Workarounds::empty();
        for token in list.split(|c: char| c == ',' || c.is_whitespace()) {
            if token.is_empty() {
                continue;
            }
            match token.parse::<u32>().ok().and_then(Self::from_id) {
                Some(flag) => flags |= flag,
                None => {
                    crate::gpu_warn!("gpu::Workarounds", "Ignoring unknown workaround id '{}'", token);
                }
            }
        }
        flags
    }

    /// Names of the enabled workarounds, in table order
    pub fn names(&self) -> Vec<&'static str> {
        WORKAROUND_TABLE
            .iter()
            .filter(|(_, _, flag)| self.contains(*flag))
            .map(|(_, name, _)| *name)
            .collect()
    }
}

#[cfg(test)]
#[path = "workarounds_tests.rs"]
mod tests;
