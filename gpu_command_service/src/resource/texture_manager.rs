/// Textures and their manager.
///
/// A `Texture` records per-face, per-level metadata and derives from it the
/// state the decoder checks before every draw:
///
/// - **texture complete**: level 0 defined and every level of the mip chain
///   matching level 0's format with halved dimensions
/// - **cube complete**: six square faces of equal size and format
/// - **can render**: always, never, or only when NPOT textures are allowed
/// - **uncleared mips**: defined levels whose contents were never written
///
/// The manager keeps O(1) counts of unrenderable textures and textures with
/// uncleared levels so a draw can skip per-unit scans when both are zero.
/// Levels are cleared through a `LevelClearer` supplied by the decoder; the
/// manager never talks to the driver to clear on its own.

use super::object_table::ObjectTable;
use crate::driver::GraphicsDriver;
use crate::gl;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

slotmap::new_key_type! {
    /// Stable key of a texture in the texture arena
    pub struct TextureKey;
}

// ===== SERVICE OBJECT =====

/// Driver texture name, shared between groups through mailboxes.
///
/// The driver object is deleted by whichever manager drops the last `Arc`.
#[derive(Debug)]
pub struct ServiceTexture {
    service_id: u32,
}

impl ServiceTexture {
    pub fn new(service_id: u32) -> Arc<Self> {
        Arc::new(Self { service_id })
    }

    pub fn service_id(&self) -> u32 {
        self.service_id
    }
}

// ===== DATA TYPES =====

/// Whether a texture may be sampled by a draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanRenderCondition {
    Always,
    Never,
    OnlyIfNpot,
}

/// Metadata of one level of one face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LevelInfo {
    pub target: u32,
    pub level: i32,
    pub internal_format: u32,
    pub width: i32,
    pub height: i32,
    pub depth: i32,
    pub border: i32,
    pub format: u32,
    pub ty: u32,
    pub cleared: bool,
}

impl LevelInfo {
    fn is_defined(&self) -> bool {
        self.width > 0 && self.height > 0 && self.depth > 0
    }
}

/// Sampling parameters carried alongside level metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerState {
    pub min_filter: u32,
    pub mag_filter: u32,
    pub wrap_s: u32,
    pub wrap_t: u32,
    pub usage: u32,
}

impl Default for SamplerState {
    fn default() -> Self {
        Self {
            min_filter: gl::NEAREST_MIPMAP_LINEAR,
            mag_filter: gl::LINEAR,
            wrap_s: gl::REPEAT,
            wrap_t: gl::REPEAT,
            usage: gl::NONE,
        }
    }
}

/// Snapshot of a texture's definition, used to move textures through mailboxes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureDefinition {
    pub target: u32,
    pub sampler: SamplerState,
    pub immutable: bool,
    pub level_infos: Vec<Vec<LevelInfo>>,
}

/// Clears a single texture level on behalf of the manager
pub trait LevelClearer {
    /// Write zeros into `level` of `target`. Returns false on failure.
    #[allow(clippy::too_many_arguments)]
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
    ) -> bool;
}

// ===== TEXTURE =====

pub struct Texture {
    service: Arc<ServiceTexture>,
    target: u32,
    /// `[face][level]`
    level_infos: Vec<Vec<LevelInfo>>,
    sampler: SamplerState,
    texture_complete: bool,
    cube_complete: bool,
    npot: bool,
    immutable: bool,
    can_render: CanRenderCondition,
    num_uncleared_mips: u32,
    estimated_size: u64,
    /// Number of framebuffer attachment points naming this texture
    framebuffer_attachments: u32,
    /// Set while an async upload targets this texture
    async_transfer_pending: bool,
}

impl Texture {
    fn new(service: Arc<ServiceTexture>) -> Self {
        Self {
            service,
            target: 0,
            level_infos: Vec::new(),
            sampler: SamplerState::default(),
            texture_complete: false,
            cube_complete: false,
            npot: false,
            immutable: false,
            can_render: CanRenderCondition::Always,
            num_uncleared_mips: 0,
            estimated_size: 0,
            framebuffer_attachments: 0,
            async_transfer_pending: false,
        }
    }

    pub fn service_id(&self) -> u32 {
        self.service.service_id
    }

    pub fn service(&self) -> &Arc<ServiceTexture> {
        &self.service
    }

    pub fn target(&self) -> u32 {
        self.target
    }

    pub fn sampler(&self) -> &SamplerState {
        &self.sampler
    }

    pub fn min_filter(&self) -> u32 {
        self.sampler.min_filter
    }

    pub fn texture_complete(&self) -> bool {
        self.texture_complete
    }

    pub fn cube_complete(&self) -> bool {
        self.cube_complete
    }

    pub fn npot(&self) -> bool {
        self.npot
    }

    pub fn is_immutable(&self) -> bool {
        self.immutable
    }

    pub fn can_render_condition(&self) -> CanRenderCondition {
        self.can_render
    }

    pub fn can_render(&self, npot_ok: bool) -> bool {
        match self.can_render {
            CanRenderCondition::Always => true,
            CanRenderCondition::Never => false,
            CanRenderCondition::OnlyIfNpot => npot_ok,
        }
    }

    /// True when no defined level is uncleared
    pub fn safe_to_render(&self) -> bool {
        self.num_uncleared_mips == 0
    }

    pub fn num_uncleared_mips(&self) -> u32 {
        self.num_uncleared_mips
    }

    pub fn estimated_size(&self) -> u64 {
        self.estimated_size
    }

    pub fn is_attached_to_framebuffer(&self) -> bool {
        self.framebuffer_attachments > 0
    }

    pub fn async_transfer_pending(&self) -> bool {
        self.async_transfer_pending
    }

    pub fn level_info(&self, target: u32, level: i32) -> Option<&LevelInfo> {
        if level < 0 {
            return None;
        }
        self.level_infos
            .get(gl::face_index(target))
            .and_then(|face| face.get(level as usize))
            .filter(|info| info.target != 0)
    }

    pub fn level_size(&self, target: u32, level: i32) -> Option<(i32, i32)> {
        self.level_info(target, level).map(|info| (info.width, info.height))
    }

    pub fn level_type(&self, target: u32, level: i32) -> Option<(u32, u32)> {
        self.level_info(target, level).map(|info| (info.ty, info.internal_format))
    }

    pub fn is_level_cleared(&self, target: u32, level: i32) -> bool {
        self.level_info(target, level).map(|info| info.cleared).unwrap_or(true)
    }

    /// Whether sampling with the current min filter reads beyond level 0
    pub fn needs_mips(&self) -> bool {
        self.sampler.min_filter != gl::NEAREST && self.sampler.min_filter != gl::LINEAR
    }

    pub fn is_valid(&self) -> bool {
        self.target != 0
    }

    /// Whether GenerateMipmap may run on this texture
    pub fn can_generate_mipmaps(&self, npot_ok: bool) -> bool {
        if self.immutable || self.target == gl::TEXTURE_EXTERNAL_OES || self.target == 0 {
            return false;
        }
        let Some(base) = self.level_infos.first().and_then(|f| f.first()) else {
            return false;
        };
        if !base.is_defined() || (self.npot && !npot_ok) {
            return false;
        }
        if gl::is_depth_format(base.internal_format) || is_compressed_format(base.internal_format) {
            return false;
        }
        self.level_infos.iter().all(|face| {
            face.first()
                .map(|info| {
                    info.is_defined()
                        && info.width == base.width
                        && info.height == base.height
                        && info.internal_format == base.internal_format
                        && info.ty == base.ty
                })
                .unwrap_or(false)
        }) && (self.target != gl::TEXTURE_CUBE_MAP || base.width == base.height)
    }

    pub fn definition(&self) -> TextureDefinition {
        TextureDefinition {
            target: self.target,
            sampler: self.sampler,
            immutable: self.immutable,
            level_infos: self.level_infos.clone(),
        }
    }

    fn base_level(&self, face: usize) -> Option<&LevelInfo> {
        self.level_infos.get(face).and_then(|f| f.first())
    }

    fn compute_can_render(&self) -> CanRenderCondition {
        if self.target == 0 {
            return CanRenderCondition::Always;
        }
        if self.target != gl::TEXTURE_EXTERNAL_OES {
            match self.base_level(0) {
                Some(base) if base.is_defined() => {}
                _ => return CanRenderCondition::Never,
            }
        }
        let needs_mips = self.needs_mips();
        if needs_mips && !self.texture_complete {
            return CanRenderCondition::Never;
        }
        if self.target == gl::TEXTURE_CUBE_MAP && !self.cube_complete {
            return CanRenderCondition::Never;
        }
        let npot_compatible =
            !needs_mips && self.sampler.wrap_s == gl::CLAMP_TO_EDGE && self.sampler.wrap_t == gl::CLAMP_TO_EDGE;
        if !npot_compatible {
            if self.target == gl::TEXTURE_RECTANGLE_ARB {
                return CanRenderCondition::Never;
            }
            if self.npot {
                return CanRenderCondition::OnlyIfNpot;
            }
        }
        CanRenderCondition::Always
    }

    /// Recompute completeness and NPOT state from the level table
    fn update_completeness(&mut self) {
        let Some(base) = self.base_level(0).copied() else {
            self.texture_complete = false;
            self.cube_complete = false;
            self.npot = false;
            return;
        };

        self.npot = self
            .level_infos
            .iter()
            .filter_map(|face| face.first())
            .filter(|info| info.is_defined())
            .any(|info| !is_pot(info.width) || !is_pot(info.height) || !is_pot(info.depth));

        let num_mips = mip_count(base.width, base.height, base.depth);
        let mut complete = base.is_defined();
        let mut cube_complete = self.target == gl::TEXTURE_CUBE_MAP && self.level_infos.len() == 6;

        for face in &self.level_infos {
            let Some(face_base) = face.first() else {
                complete = false;
                cube_complete = false;
                break;
            };
            if !face_base.is_defined() {
                complete = false;
            }
            if cube_complete
                && (face_base.width != face_base.height
                    || face_base.width != base.width
                    || face_base.height != base.height
                    || face_base.internal_format != base.internal_format
                    || face_base.format != base.format
                    || face_base.ty != base.ty
                    || !face_base.is_defined())
            {
                cube_complete = false;
            }
            for level in 1..num_mips as usize {
                let expected_w = (base.width >> level).max(1);
                let expected_h = (base.height >> level).max(1);
                let expected_d = (base.depth >> level).max(1);
                let ok = face
                    .get(level)
                    .map(|info| {
                        info.width == expected_w
                            && info.height == expected_h
                            && info.depth == expected_d
                            && info.internal_format == base.internal_format
                            && info.format == base.format
                            && info.ty == base.ty
                    })
                    .unwrap_or(false);
                if !ok {
                    complete = false;
                    break;
                }
            }
        }

        self.texture_complete = complete;
        self.cube_complete = cube_complete;
    }
}

fn is_pot(value: i32) -> bool {
    value > 0 && (value & (value - 1)) == 0
}

/// Number of levels in a full mip chain: `floor(log2(max(w, h, d))) + 1`
pub fn mip_count(width: i32, height: i32, depth: i32) -> i32 {
    let max = width.max(height).max(depth);
    if max <= 0 {
        return 0;
    }
    32 - (max as u32).leading_zeros() as i32
}

pub fn is_compressed_format(internal_format: u32) -> bool {
    matches!(
        internal_format,
        gl::COMPRESSED_RGB_S3TC_DXT1_EXT
            | gl::COMPRESSED_RGBA_S3TC_DXT1_EXT
            | gl::COMPRESSED_RGBA_S3TC_DXT3_EXT
            | gl::COMPRESSED_RGBA_S3TC_DXT5_EXT
            | gl::ETC1_RGB8_OES
    )
}

// ===== MANAGER =====

const DEFAULT_TARGETS: [u32; 4] = [
    gl::TEXTURE_2D,
    gl::TEXTURE_CUBE_MAP,
    gl::TEXTURE_EXTERNAL_OES,
    gl::TEXTURE_RECTANGLE_ARB,
];

fn default_slot(target: u32) -> Option<usize> {
    DEFAULT_TARGETS.iter().position(|t| *t == target)
}

/// Tracks every texture of a context group
pub struct TextureManager {
    textures: ObjectTable<TextureKey, Texture>,
    max_texture_size: i32,
    max_cube_map_texture_size: i32,
    max_levels: i32,
    max_cube_map_levels: i32,
    npot_ok: bool,
    num_unrenderable_textures: u32,
    num_unsafe_textures: u32,
    num_uncleared_mips: u32,
    memory_tracked: u64,
    /// Texture bound for client id 0, per target
    default_textures: [Option<TextureKey>; 4],
    /// 1x1 black textures substituted for unrenderable ones, per target
    black_textures: [u32; 4],
    /// Bumped on any change that may alter framebuffer completeness
    framebuffer_serial: Arc<AtomicU32>,
}

impl TextureManager {
    pub fn new(
        max_texture_size: u32,
        max_cube_map_texture_size: u32,
        npot_ok: bool,
        framebuffer_serial: Arc<AtomicU32>,
    ) -> Self {
        let max_texture_size = max_texture_size as i32;
        let max_cube_map_texture_size = max_cube_map_texture_size as i32;
        Self {
            textures: ObjectTable::new(),
            max_texture_size,
            max_cube_map_texture_size,
            max_levels: mip_count(max_texture_size, max_texture_size, 1),
            max_cube_map_levels: mip_count(max_cube_map_texture_size, max_cube_map_texture_size, 1),
            npot_ok,
            num_unrenderable_textures: 0,
            num_unsafe_textures: 0,
            num_uncleared_mips: 0,
            memory_tracked: 0,
            default_textures: [None; 4],
            black_textures: [0; 4],
            framebuffer_serial,
        }
    }

    /// Create default and black textures for every supported target
    pub fn initialize(&mut self, driver: &mut dyn GraphicsDriver, external: bool, rectangle: bool) {
        for (slot, target) in DEFAULT_TARGETS.iter().copied().enumerate() {
            if (target == gl::TEXTURE_EXTERNAL_OES && !external) || (target == gl::TEXTURE_RECTANGLE_ARB && !rectangle) {
                continue;
            }
            let black = driver.gen_texture();
            self.upload_black(driver, target, black);
            self.black_textures[slot] = black;

            let service_id = driver.gen_texture();
            self.upload_black(driver, target, service_id);
            let key = self.textures.insert_unnamed(Texture::new(ServiceTexture::new(service_id)));
            self.set_target(key, target);
            let faces: &[u32] = if target == gl::TEXTURE_CUBE_MAP {
                &[
                    gl::TEXTURE_CUBE_MAP_POSITIVE_X,
                    gl::TEXTURE_CUBE_MAP_NEGATIVE_X,
                    gl::TEXTURE_CUBE_MAP_POSITIVE_Y,
                    gl::TEXTURE_CUBE_MAP_NEGATIVE_Y,
                    gl::TEXTURE_CUBE_MAP_POSITIVE_Z,
                    gl::TEXTURE_CUBE_MAP_NEGATIVE_Z,
                ]
            } else {
                &[target]
            };
            if target != gl::TEXTURE_EXTERNAL_OES {
                for face in faces {
                    self.set_level_info(key, *face, 0, gl::RGBA, 1, 1, 1, 0, gl::RGBA, gl::UNSIGNED_BYTE, true);
                }
            }
            self.default_textures[slot] = Some(key);
        }
        crate::gpu_debug!("gpu::TextureManager", "Default textures created");
    }

    fn upload_black(&self, driver: &mut dyn GraphicsDriver, target: u32, service_id: u32) {
        const BLACK: [u8; 4] = [0, 0, 0, 255];
        driver.bind_texture(target, service_id);
        match target {
            gl::TEXTURE_CUBE_MAP => {
                for face in gl::TEXTURE_CUBE_MAP_POSITIVE_X..=gl::TEXTURE_CUBE_MAP_NEGATIVE_Z {
                    driver.tex_image_2d(face, 0, gl::RGBA, 1, 1, gl::RGBA, gl::UNSIGNED_BYTE, Some(&BLACK));
                }
            }
            gl::TEXTURE_EXTERNAL_OES => {}
            _ => driver.tex_image_2d(target, 0, gl::RGBA, 1, 1, gl::RGBA, gl::UNSIGNED_BYTE, Some(&BLACK)),
        }
        driver.bind_texture(target, 0);
    }

    // ----- Handles -----

    pub fn create_texture(&mut self, client_id: u32, service_id: u32) -> TextureKey {
        self.textures.insert(client_id, Texture::new(ServiceTexture::new(service_id)))
    }

    /// Name an existing texture with another client handle
    pub fn alias_texture(&mut self, client_id: u32, key: TextureKey) -> bool {
        self.textures.alias(client_id, key)
    }

    pub fn get_texture(&self, client_id: u32) -> Option<TextureKey> {
        self.textures.lookup(client_id)
    }

    pub fn texture(&self, key: TextureKey) -> Option<&Texture> {
        self.textures.get(key)
    }

    pub fn client_id(&self, key: TextureKey) -> Option<u32> {
        self.textures.client_id(key)
    }

    pub fn ref_count(&self, key: TextureKey) -> u32 {
        self.textures.ref_count(key)
    }

    pub fn is_texture(&self, client_id: u32) -> bool {
        self.get_texture(client_id)
            .and_then(|k| self.texture(k))
            .map(|t| t.is_valid())
            .unwrap_or(false)
    }

    pub fn add_ref(&mut self, key: TextureKey) {
        self.textures.add_ref(key);
    }

    pub fn release(&mut self, key: TextureKey, driver: Option<&mut dyn GraphicsDriver>) {
        if let Some(texture) = self.textures.release(key) {
            self.destroy_texture(texture, driver);
        }
    }

    /// Remove the client handle (`DeleteTextures`)
    pub fn remove_texture(&mut self, client_id: u32, driver: Option<&mut dyn GraphicsDriver>) {
        if let Some(texture) = self.textures.remove(client_id) {
            self.destroy_texture(texture, driver);
        }
    }

    fn destroy_texture(&mut self, texture: Texture, driver: Option<&mut dyn GraphicsDriver>) {
        self.forget_counters(&texture);
        let Texture { service, .. } = texture;
        if let Some(service) = Arc::into_inner(service) {
            if let Some(driver) = driver {
                driver.delete_texture(service.service_id);
            }
        }
    }

    fn forget_counters(&mut self, texture: &Texture) {
        if !texture.can_render(self.npot_ok) {
            self.num_unrenderable_textures -= 1;
        }
        if !texture.safe_to_render() {
            self.num_unsafe_textures -= 1;
        }
        self.num_uncleared_mips -= texture.num_uncleared_mips;
        self.memory_tracked -= texture.estimated_size;
    }

    // ----- Limits -----

    pub fn max_size_for_target(&self, target: u32) -> i32 {
        if target == gl::TEXTURE_CUBE_MAP || gl::is_cube_face(target) {
            self.max_cube_map_texture_size
        } else {
            self.max_texture_size
        }
    }

    pub fn max_levels_for_target(&self, target: u32) -> i32 {
        match target {
            gl::TEXTURE_EXTERNAL_OES | gl::TEXTURE_RECTANGLE_ARB => 1,
            t if t == gl::TEXTURE_CUBE_MAP || gl::is_cube_face(t) => self.max_cube_map_levels,
            _ => self.max_levels,
        }
    }

    /// Whether a level of the given size fits `target`
    pub fn valid_for_target(&self, target: u32, level: i32, width: i32, height: i32, depth: i32) -> bool {
        if level < 0 || level >= self.max_levels_for_target(target) {
            return false;
        }
        let max_size = self.max_size_for_target(target) >> level;
        width >= 0
            && height >= 0
            && depth >= 0
            && width <= max_size
            && height <= max_size
            && depth == 1
            && (!gl::is_cube_face(target) || width == height)
    }

    pub fn npot_ok(&self) -> bool {
        self.npot_ok
    }

    // ----- Mutation -----

    /// Fix the texture's target on first bind and size its level table
    pub fn set_target(&mut self, key: TextureKey, target: u32) {
        let faces = if target == gl::TEXTURE_CUBE_MAP { 6 } else { 1 };
        let levels = self.max_levels_for_target(target).max(1) as usize;
        self.mutate(key, |texture| {
            if texture.target != 0 {
                return;
            }
            texture.target = target;
            texture.level_infos = vec![vec![LevelInfo::default(); levels]; faces];
            if target == gl::TEXTURE_EXTERNAL_OES || target == gl::TEXTURE_RECTANGLE_ARB {
                texture.sampler.min_filter = gl::LINEAR;
                texture.sampler.wrap_s = gl::CLAMP_TO_EDGE;
                texture.sampler.wrap_t = gl::CLAMP_TO_EDGE;
            }
        });
    }

    /// Record metadata for one level
    #[allow(clippy::too_many_arguments)]
    pub fn set_level_info(
        &mut self,
        key: TextureKey,
        target: u32,
        level: i32,
        internal_format: u32,
        width: i32,
        height: i32,
        depth: i32,
        border: i32,
        format: u32,
        ty: u32,
        cleared: bool,
    ) {
        if level < 0 {
            return;
        }
        let mut size_delta: i64 = 0;
        self.mutate(key, |texture| {
            let face = gl::face_index(target);
            let Some(info) = texture
                .level_infos
                .get_mut(face)
                .and_then(|f| f.get_mut(level as usize))
            else {
                return;
            };
            let was_uncleared = info.target != 0 && info.is_defined() && !info.cleared;
            let old_size = level_byte_size(info);
            *info = LevelInfo {
                target,
                level,
                internal_format,
                width,
                height,
                depth,
                border,
                format,
                ty,
                cleared,
            };
            let is_uncleared = info.is_defined() && !cleared;
            let new_size = level_byte_size(info);
            match (was_uncleared, is_uncleared) {
                (false, true) => texture.num_uncleared_mips += 1,
                (true, false) => texture.num_uncleared_mips -= 1,
                _ => {}
            }
            size_delta = new_size as i64 - old_size as i64;
            texture.estimated_size = (texture.estimated_size as i64 + size_delta) as u64;
            texture.update_completeness();
        });
        self.memory_tracked = (self.memory_tracked as i64 + size_delta) as u64;
        self.framebuffer_serial.fetch_add(1, Ordering::Relaxed);
    }

    /// Mark one level cleared or uncleared without changing its shape
    pub fn set_level_cleared(&mut self, key: TextureKey, target: u32, level: i32, cleared: bool) {
        if level < 0 {
            return;
        }
        self.mutate(key, |texture| {
            let Some(info) = texture
                .level_infos
                .get_mut(gl::face_index(target))
                .and_then(|f| f.get_mut(level as usize))
            else {
                return;
            };
            if info.target == 0 || !info.is_defined() || info.cleared == cleared {
                return;
            }
            info.cleared = cleared;
            if cleared {
                texture.num_uncleared_mips -= 1;
            } else {
                texture.num_uncleared_mips += 1;
            }
        });
    }

    /// Apply a `TexParameter` value; returns the GL error on rejection
    pub fn set_parameter(&mut self, key: TextureKey, pname: u32, param: i32) -> Result<(), u32> {
        let Some(texture) = self.textures.get(key) else {
            return Err(gl::INVALID_OPERATION);
        };
        let restricted = texture.target == gl::TEXTURE_EXTERNAL_OES || texture.target == gl::TEXTURE_RECTANGLE_ARB;
        let value = param as u32;
        let mut sampler = texture.sampler;
        match pname {
            gl::TEXTURE_MIN_FILTER => {
                let valid = if restricted {
                    matches!(value, gl::NEAREST | gl::LINEAR)
                } else {
                    matches!(
                        value,
                        gl::NEAREST
                            | gl::LINEAR
                            | gl::NEAREST_MIPMAP_NEAREST
                            | gl::LINEAR_MIPMAP_NEAREST
                            | gl::NEAREST_MIPMAP_LINEAR
                            | gl::LINEAR_MIPMAP_LINEAR
                    )
                };
                if !valid {
                    return Err(gl::INVALID_ENUM);
                }
                sampler.min_filter = value;
            }
            gl::TEXTURE_MAG_FILTER => {
                if !matches!(value, gl::NEAREST | gl::LINEAR) {
                    return Err(gl::INVALID_ENUM);
                }
                sampler.mag_filter = value;
            }
            gl::TEXTURE_WRAP_S | gl::TEXTURE_WRAP_T => {
                let valid = if restricted {
                    value == gl::CLAMP_TO_EDGE
                } else {
                    matches!(value, gl::CLAMP_TO_EDGE | gl::MIRRORED_REPEAT | gl::REPEAT)
                };
                if !valid {
                    return Err(gl::INVALID_ENUM);
                }
                if pname == gl::TEXTURE_WRAP_S {
                    sampler.wrap_s = value;
                } else {
                    sampler.wrap_t = value;
                }
            }
            gl::TEXTURE_USAGE_ANGLE => {
                if !matches!(value, gl::NONE | gl::FRAMEBUFFER_ATTACHMENT_ANGLE) {
                    return Err(gl::INVALID_ENUM);
                }
                sampler.usage = value;
            }
            gl::TEXTURE_MAX_ANISOTROPY_EXT => {
                if param < 1 {
                    return Err(gl::INVALID_VALUE);
                }
            }
            gl::TEXTURE_POOL_CHROMIUM => {
                if !matches!(value, gl::TEXTURE_POOL_MANAGED_CHROMIUM | gl::TEXTURE_POOL_UNMANAGED_CHROMIUM) {
                    return Err(gl::INVALID_ENUM);
                }
            }
            _ => return Err(gl::INVALID_ENUM),
        }
        self.mutate(key, |texture| texture.sampler = sampler);
        Ok(())
    }

    /// Define levels 1.. of every face from level 0 (`GenerateMipmap`)
    pub fn mark_mipmaps_generated(&mut self, key: TextureKey) -> bool {
        let Some(texture) = self.textures.get(key) else {
            return false;
        };
        if !texture.can_generate_mipmaps(self.npot_ok) {
            return false;
        }
        let faces: Vec<LevelInfo> = texture.level_infos.iter().filter_map(|f| f.first().copied()).collect();
        for base in faces {
            let count = mip_count(base.width, base.height, base.depth);
            for level in 0..count {
                self.set_level_info(
                    key,
                    base.target,
                    level,
                    base.internal_format,
                    (base.width >> level).max(1),
                    (base.height >> level).max(1),
                    (base.depth >> level).max(1),
                    base.border,
                    base.format,
                    base.ty,
                    true,
                );
            }
        }
        true
    }

    pub fn set_immutable(&mut self, key: TextureKey) {
        self.mutate(key, |texture| texture.immutable = true);
    }

    pub fn set_async_transfer_pending(&mut self, key: TextureKey, pending: bool) {
        if let Some(texture) = self.textures.get_mut(key) {
            texture.async_transfer_pending = pending;
        }
    }

    pub fn attach_to_framebuffer(&mut self, key: TextureKey) {
        if let Some(texture) = self.textures.get_mut(key) {
            texture.framebuffer_attachments += 1;
        }
    }

    pub fn detach_from_framebuffer(&mut self, key: TextureKey) {
        if let Some(texture) = self.textures.get_mut(key) {
            texture.framebuffer_attachments = texture.framebuffer_attachments.saturating_sub(1);
        }
    }

    // ----- Mailboxes -----

    /// Find the texture of this group backed by `service`
    pub fn find_by_service(&self, service: &Arc<ServiceTexture>) -> Option<TextureKey> {
        self.textures
            .iter()
            .find(|(_, t)| Arc::ptr_eq(&t.service, service))
            .map(|(k, _)| k)
    }

    /// Replace the service object and definition of `key` (mailbox consume)
    ///
    /// The previous service object is deleted if this was its last owner.
    pub fn replace_definition(
        &mut self,
        key: TextureKey,
        service: Arc<ServiceTexture>,
        definition: &TextureDefinition,
        driver: Option<&mut dyn GraphicsDriver>,
    ) {
        let Some(texture) = self.textures.get(key) else {
            return;
        };
        let old_service = Arc::clone(&texture.service);
        let definition = definition.clone();
        let mut size = 0u64;
        let mut uncleared = 0u32;
        for info in definition.level_infos.iter().flatten() {
            size += level_byte_size(info);
            if info.target != 0 && info.is_defined() && !info.cleared {
                uncleared += 1;
            }
        }
        let old_size = texture.estimated_size;
        self.mutate(key, |texture| {
            texture.service = service;
            texture.target = definition.target;
            texture.sampler = definition.sampler;
            texture.immutable = definition.immutable;
            texture.level_infos = definition.level_infos;
            texture.num_uncleared_mips = uncleared;
            texture.estimated_size = size;
            texture.update_completeness();
        });
        self.memory_tracked = self.memory_tracked - old_size + size;
        self.framebuffer_serial.fetch_add(1, Ordering::Relaxed);
        if let Some(service) = Arc::into_inner(old_service) {
            if let Some(driver) = driver {
                driver.delete_texture(service.service_id);
            }
        }
    }

    // ----- Clearing -----

    /// Clear one level if it is uncleared; returns false if the clear failed
    pub fn clear_texture_level(
        &mut self,
        key: TextureKey,
        target: u32,
        level: i32,
        clearer: &mut dyn LevelClearer,
    ) -> bool {
        let Some(texture) = self.textures.get(key) else {
            return false;
        };
        let Some(info) = texture.level_info(target, level).copied() else {
            return true;
        };
        if info.cleared || !info.is_defined() {
            return true;
        }
        let ok = clearer.clear_level(
            texture.service_id(),
            texture.target,
            info.target,
            info.level,
            info.internal_format,
            info.format,
            info.ty,
            info.width,
            info.height,
            texture.immutable,
        );
        if ok {
            self.set_level_cleared(key, target, level, true);
        }
        ok
    }

    /// Clear every uncleared level of a texture
    pub fn clear_render_texture(&mut self, key: TextureKey, clearer: &mut dyn LevelClearer) -> bool {
        let Some(texture) = self.textures.get(key) else {
            return false;
        };
        if texture.safe_to_render() {
            return true;
        }
        let pending: Vec<(u32, i32)> = texture
            .level_infos
            .iter()
            .flatten()
            .filter(|info| info.target != 0 && info.is_defined() && !info.cleared)
            .map(|info| (info.target, info.level))
            .collect();
        pending
            .into_iter()
            .all(|(target, level)| self.clear_texture_level(key, target, level, clearer))
    }

    // ----- Queries -----

    pub fn have_unrenderable_textures(&self) -> bool {
        self.num_unrenderable_textures > 0
    }

    pub fn have_unsafe_textures(&self) -> bool {
        self.num_unsafe_textures > 0
    }

    pub fn have_uncleared_mips(&self) -> bool {
        self.num_uncleared_mips > 0
    }

    pub fn num_uncleared_mips(&self) -> u32 {
        self.num_uncleared_mips
    }

    pub fn memory_tracked(&self) -> u64 {
        self.memory_tracked
    }

    pub fn default_texture(&self, target: u32) -> Option<TextureKey> {
        default_slot(target).and_then(|slot| self.default_textures[slot])
    }

    pub fn black_texture_id(&self, target: u32) -> u32 {
        default_slot(target).map(|slot| self.black_textures[slot]).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    // ----- Teardown -----

    /// Delete every texture; driver calls are skipped without a context
    pub fn destroy(&mut self, mut driver: Option<&mut dyn GraphicsDriver>) {
        self.default_textures = [None; 4];
        for texture in self.textures.drain() {
            let Texture { service, .. } = texture;
            if let Some(service) = Arc::into_inner(service) {
                if let Some(driver) = driver.as_deref_mut() {
                    driver.delete_texture(service.service_id);
                }
            }
        }
        if let Some(driver) = driver.as_deref_mut() {
            for black in self.black_textures.iter().filter(|id| **id != 0) {
                driver.delete_texture(*black);
            }
        }
        self.black_textures = [0; 4];
        self.num_unrenderable_textures = 0;
        self.num_unsafe_textures = 0;
        self.num_uncleared_mips = 0;
        self.memory_tracked = 0;
    }

    /// Run `f` on a texture and fold the resulting state changes into the
    /// manager counters
    fn mutate(&mut self, key: TextureKey, f: impl FnOnce(&mut Texture)) {
        let npot_ok = self.npot_ok;
        let Some(texture) = self.textures.get_mut(key) else {
            return;
        };
        let was_renderable = texture.can_render(npot_ok);
        let was_safe = texture.safe_to_render();
        let old_uncleared = texture.num_uncleared_mips;

        f(texture);
        texture.can_render = texture.compute_can_render();

        let is_renderable = texture.can_render(npot_ok);
        let is_safe = texture.safe_to_render();
        let new_uncleared = texture.num_uncleared_mips;

        match (was_renderable, is_renderable) {
            (true, false) => self.num_unrenderable_textures += 1,
            (false, true) => self.num_unrenderable_textures -= 1,
            _ => {}
        }
        match (was_safe, is_safe) {
            (true, false) => self.num_unsafe_textures += 1,
            (false, true) => self.num_unsafe_textures -= 1,
            _ => {}
        }
        self.num_uncleared_mips = self.num_uncleared_mips - old_uncleared + new_uncleared;
    }
}

fn level_byte_size(info: &LevelInfo) -> u64 {
    if !info.is_defined() {
        return 0;
    }
    gl::compute_image_size(info.width as u32, info.height as u32, info.format, info.ty, 1)
        .map(|size| size as u64 * info.depth as u64)
        .unwrap_or(0)
}

#[cfg(test)]
#[path = "texture_manager_tests.rs"]
mod tests;
