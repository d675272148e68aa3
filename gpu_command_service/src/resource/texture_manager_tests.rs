use super::*;
use crate::driver::mock_driver::MockDriver;

fn manager(npot_ok: bool) -> TextureManager {
    TextureManager::new(2048, 256, npot_ok, Arc::new(AtomicU32::new(0)))
}

fn set_2d(manager: &mut TextureManager, key: TextureKey, level: i32, w: i32, h: i32, cleared: bool) {
    manager.set_level_info(key, gl::TEXTURE_2D, level, gl::RGBA, w, h, 1, 0, gl::RGBA, gl::UNSIGNED_BYTE, cleared);
}

/// Records every clear request and reports success
#[derive(Default)]
struct RecordingClearer {
    cleared: Vec<(u32, u32, i32)>,
    fail: bool,
}

impl LevelClearer for RecordingClearer {
    fn clear_level(
        &mut self,
        service_id: u32,
        _bind_target: u32,
        target: u32,
        level: i32,
        _internal_format: u32,
        _format: u32,
        _ty: u32,
        _width: i32,
        _height: i32,
        _immutable: bool,
    ) -> bool {
        self.cleared.push((service_id, target, level));
        !self.fail
    }
}

// ============================================================================
// MIP COUNT
// ============================================================================

#[test]
fn test_mip_count() {
    assert_eq!(mip_count(1, 1, 1), 1);
    assert_eq!(mip_count(4, 4, 1), 3);
    assert_eq!(mip_count(5, 3, 1), 3);
    assert_eq!(mip_count(1024, 1, 1), 11);
    assert_eq!(mip_count(0, 0, 0), 0);
}

// ============================================================================
// COMPLETENESS
// ============================================================================

#[test]
fn test_texture_complete_when_last_level_set() {
    let mut manager = manager(false);
    let key = manager.create_texture(1, 11);
    manager.set_target(key, gl::TEXTURE_2D);

    set_2d(&mut manager, key, 0, 4, 4, true);
    assert!(!manager.texture(key).unwrap().texture_complete());
    set_2d(&mut manager, key, 1, 2, 2, true);
    assert!(!manager.texture(key).unwrap().texture_complete());
    set_2d(&mut manager, key, 2, 1, 1, true);
    assert!(manager.texture(key).unwrap().texture_complete());

    // Redefining an earlier level with a mismatching size breaks the chain
    set_2d(&mut manager, key, 1, 3, 3, true);
    assert!(!manager.texture(key).unwrap().texture_complete());
    set_2d(&mut manager, key, 1, 2, 2, true);
    assert!(manager.texture(key).unwrap().texture_complete());

    manager.set_level_info(key, gl::TEXTURE_2D, 2, gl::RGB, 1, 1, 1, 0, gl::RGB, gl::UNSIGNED_BYTE, true);
    assert!(!manager.texture(key).unwrap().texture_complete());
}

#[test]
fn test_cube_complete_needs_six_square_faces() {
    let mut manager = manager(false);
    let key = manager.create_texture(1, 11);
    manager.set_target(key, gl::TEXTURE_CUBE_MAP);
    manager.set_parameter(key, gl::TEXTURE_MIN_FILTER, gl::LINEAR as i32).unwrap();

    let faces: Vec<u32> = (gl::TEXTURE_CUBE_MAP_POSITIVE_X..=gl::TEXTURE_CUBE_MAP_NEGATIVE_Z).collect();
    for face in &faces[..5] {
        manager.set_level_info(key, *face, 0, gl::RGBA, 8, 8, 1, 0, gl::RGBA, gl::UNSIGNED_BYTE, true);
    }
    assert!(!manager.texture(key).unwrap().cube_complete());
    assert!(!manager.texture(key).unwrap().can_render(false));
    assert!(manager.have_unrenderable_textures());

    manager.set_level_info(key, faces[5], 0, gl::RGBA, 8, 8, 1, 0, gl::RGBA, gl::UNSIGNED_BYTE, true);
    assert!(manager.texture(key).unwrap().cube_complete());
    assert!(manager.texture(key).unwrap().can_render(false));
    assert!(!manager.have_unrenderable_textures());
}

// ============================================================================
// CAN RENDER
// ============================================================================

#[test]
fn test_npot_texture_needs_clamp_and_no_mips() {
    let mut manager = manager(false);
    let key = manager.create_texture(1, 11);
    manager.set_target(key, gl::TEXTURE_2D);
    manager.set_parameter(key, gl::TEXTURE_MIN_FILTER, gl::LINEAR as i32).unwrap();
    set_2d(&mut manager, key, 0, 3, 5, true);

    let texture = manager.texture(key).unwrap();
    assert!(texture.npot());
    assert_eq!(texture.can_render_condition(), CanRenderCondition::OnlyIfNpot);
    assert!(manager.have_unrenderable_textures());

    manager.set_parameter(key, gl::TEXTURE_WRAP_S, gl::CLAMP_TO_EDGE as i32).unwrap();
    manager.set_parameter(key, gl::TEXTURE_WRAP_T, gl::CLAMP_TO_EDGE as i32).unwrap();
    assert_eq!(manager.texture(key).unwrap().can_render_condition(), CanRenderCondition::Always);
    assert!(!manager.have_unrenderable_textures());
}

#[test]
fn test_npot_allowed_by_policy() {
    let mut manager = manager(true);
    let key = manager.create_texture(1, 11);
    manager.set_target(key, gl::TEXTURE_2D);
    manager.set_parameter(key, gl::TEXTURE_MIN_FILTER, gl::LINEAR as i32).unwrap();
    set_2d(&mut manager, key, 0, 3, 5, true);
    assert!(manager.texture(key).unwrap().can_render(true));
    assert!(!manager.have_unrenderable_textures());
}

#[test]
fn test_removing_unrenderable_texture_updates_count() {
    let mut manager = manager(false);
    let key = manager.create_texture(1, 11);
    manager.set_target(key, gl::TEXTURE_2D);
    set_2d(&mut manager, key, 0, 4, 4, false);
    assert!(manager.have_unrenderable_textures());
    assert!(manager.have_unsafe_textures());
    manager.remove_texture(1, None);
    assert!(!manager.have_unrenderable_textures());
    assert!(!manager.have_unsafe_textures());
    assert!(!manager.have_uncleared_mips());
}

#[test]
fn test_restricted_targets_reject_repeat() {
    let mut manager = manager(false);
    let key = manager.create_texture(1, 11);
    manager.set_target(key, gl::TEXTURE_EXTERNAL_OES);
    assert_eq!(
        manager.set_parameter(key, gl::TEXTURE_WRAP_S, gl::REPEAT as i32),
        Err(gl::INVALID_ENUM)
    );
    assert_eq!(
        manager.set_parameter(key, gl::TEXTURE_MIN_FILTER, gl::LINEAR_MIPMAP_LINEAR as i32),
        Err(gl::INVALID_ENUM)
    );
    assert_eq!(manager.set_parameter(key, 0x1234, 0), Err(gl::INVALID_ENUM));
    assert_eq!(
        manager.set_parameter(key, gl::TEXTURE_MAX_ANISOTROPY_EXT, 0),
        Err(gl::INVALID_VALUE)
    );
}

// ============================================================================
// CLEARING
// ============================================================================

#[test]
fn test_uncleared_count_is_incremental() {
    let mut manager = manager(false);
    let key = manager.create_texture(1, 11);
    manager.set_target(key, gl::TEXTURE_2D);
    set_2d(&mut manager, key, 0, 4, 4, false);
    set_2d(&mut manager, key, 1, 2, 2, false);
    assert_eq!(manager.texture(key).unwrap().num_uncleared_mips(), 2);
    assert_eq!(manager.num_uncleared_mips(), 2);

    // Redefining an uncleared level as uncleared does not double count
    set_2d(&mut manager, key, 1, 2, 2, false);
    assert_eq!(manager.num_uncleared_mips(), 2);

    manager.set_level_cleared(key, gl::TEXTURE_2D, 0, true);
    assert_eq!(manager.num_uncleared_mips(), 1);
    set_2d(&mut manager, key, 1, 2, 2, true);
    assert_eq!(manager.num_uncleared_mips(), 0);
    assert!(manager.texture(key).unwrap().safe_to_render());
    assert!(!manager.have_unsafe_textures());
}

#[test]
fn test_clear_texture_level_uses_clearer() {
    let mut manager = manager(false);
    let key = manager.create_texture(1, 11);
    manager.set_target(key, gl::TEXTURE_2D);
    set_2d(&mut manager, key, 0, 4, 4, false);

    let mut clearer = RecordingClearer::default();
    assert!(manager.clear_texture_level(key, gl::TEXTURE_2D, 0, &mut clearer));
    assert_eq!(clearer.cleared, vec![(11, gl::TEXTURE_2D, 0)]);
    assert!(manager.texture(key).unwrap().is_level_cleared(gl::TEXTURE_2D, 0));

    // Already cleared levels are not cleared again
    assert!(manager.clear_texture_level(key, gl::TEXTURE_2D, 0, &mut clearer));
    assert_eq!(clearer.cleared.len(), 1);
}

#[test]
fn test_failed_clear_leaves_level_uncleared() {
    let mut manager = manager(false);
    let key = manager.create_texture(1, 11);
    manager.set_target(key, gl::TEXTURE_2D);
    set_2d(&mut manager, key, 0, 4, 4, false);
    let mut clearer = RecordingClearer { fail: true, ..Default::default() };
    assert!(!manager.clear_render_texture(key, &mut clearer));
    assert!(!manager.texture(key).unwrap().is_level_cleared(gl::TEXTURE_2D, 0));
}

#[test]
fn test_clear_render_texture_clears_all_faces() {
    let mut manager = manager(false);
    let key = manager.create_texture(1, 11);
    manager.set_target(key, gl::TEXTURE_CUBE_MAP);
    for face in gl::TEXTURE_CUBE_MAP_POSITIVE_X..=gl::TEXTURE_CUBE_MAP_NEGATIVE_Z {
        manager.set_level_info(key, face, 0, gl::RGBA, 2, 2, 1, 0, gl::RGBA, gl::UNSIGNED_BYTE, false);
    }
    let mut clearer = RecordingClearer::default();
    assert!(manager.clear_render_texture(key, &mut clearer));
    assert_eq!(clearer.cleared.len(), 6);
    assert!(manager.texture(key).unwrap().safe_to_render());
}

// ============================================================================
// MIPMAPS
// ============================================================================

#[test]
fn test_generate_mipmaps_completes_chain() {
    let mut manager = manager(false);
    let key = manager.create_texture(1, 11);
    manager.set_target(key, gl::TEXTURE_2D);
    set_2d(&mut manager, key, 0, 8, 4, true);
    assert!(manager.mark_mipmaps_generated(key));
    let texture = manager.texture(key).unwrap();
    assert!(texture.texture_complete());
    assert_eq!(texture.level_size(gl::TEXTURE_2D, 3), Some((1, 1)));
    assert_eq!(texture.level_size(gl::TEXTURE_2D, 1), Some((4, 2)));
}

#[test]
fn test_generate_mipmaps_rejects_npot_and_depth() {
    let mut manager = manager(false);
    let npot = manager.create_texture(1, 11);
    manager.set_target(npot, gl::TEXTURE_2D);
    set_2d(&mut manager, npot, 0, 6, 6, true);
    assert!(!manager.mark_mipmaps_generated(npot));

    let depth = manager.create_texture(2, 12);
    manager.set_target(depth, gl::TEXTURE_2D);
    manager.set_level_info(depth, gl::TEXTURE_2D, 0, gl::DEPTH_COMPONENT, 4, 4, 1, 0, gl::DEPTH_COMPONENT, gl::UNSIGNED_INT, true);
    assert!(!manager.mark_mipmaps_generated(depth));
}

// ============================================================================
// LIMITS
// ============================================================================

#[test]
fn test_valid_for_target() {
    let manager = manager(false);
    assert!(manager.valid_for_target(gl::TEXTURE_2D, 0, 2048, 2048, 1));
    assert!(!manager.valid_for_target(gl::TEXTURE_2D, 0, 2049, 1, 1));
    assert!(manager.valid_for_target(gl::TEXTURE_2D, 1, 1024, 1, 1));
    assert!(!manager.valid_for_target(gl::TEXTURE_2D, 1, 1025, 1, 1));
    assert!(!manager.valid_for_target(gl::TEXTURE_2D, 12, 1, 1, 1));
    assert!(!manager.valid_for_target(gl::TEXTURE_CUBE_MAP_POSITIVE_X, 0, 256, 128, 1));
    assert!(!manager.valid_for_target(gl::TEXTURE_CUBE_MAP_POSITIVE_X, 0, 512, 512, 1));
    assert!(!manager.valid_for_target(gl::TEXTURE_2D, -1, 1, 1, 1));
}

// ============================================================================
// LIFETIME
// ============================================================================

#[test]
fn test_shared_texture_refcount_destruction() {
    let mut driver = MockDriver::new();
    let mut manager = manager(false);
    let key = manager.create_texture(1, 11);
    manager.set_target(key, gl::TEXTURE_2D);
    assert!(manager.alias_texture(2, key));
    assert!(manager.alias_texture(3, key));

    manager.remove_texture(1, Some(&mut driver));
    manager.remove_texture(2, Some(&mut driver));
    assert!(manager.is_texture(3));
    assert_eq!(driver.count("delete_texture"), 0);

    manager.remove_texture(3, Some(&mut driver));
    assert!(driver.called("delete_texture 11"));
    for id in 1..=3 {
        assert!(!manager.is_texture(id));
    }
}

#[test]
fn test_service_texture_shared_across_managers() {
    let mut driver = MockDriver::new();
    let mut producer = manager(false);
    let mut consumer = manager(false);
    let key = producer.create_texture(1, 11);
    producer.set_target(key, gl::TEXTURE_2D);
    set_2d(&mut producer, key, 0, 4, 4, true);

    let service = Arc::clone(producer.texture(key).unwrap().service());
    let definition = producer.texture(key).unwrap().definition();
    let target = consumer.create_texture(5, 50);
    consumer.replace_definition(target, Arc::clone(&service), &definition, Some(&mut driver));
    drop(service);
    assert!(driver.called("delete_texture 50"));
    assert_eq!(consumer.texture(target).unwrap().service_id(), 11);
    assert_eq!(consumer.find_by_service(producer.texture(key).unwrap().service()), Some(target));

    producer.remove_texture(1, Some(&mut driver));
    assert_eq!(driver.count("delete_texture 11"), 0);
    consumer.remove_texture(5, Some(&mut driver));
    assert!(driver.called("delete_texture 11"));
}

#[test]
fn test_initialize_creates_default_and_black_textures() {
    let mut driver = MockDriver::new();
    let mut manager = manager(false);
    manager.initialize(&mut driver, false, false);
    let default_2d = manager.default_texture(gl::TEXTURE_2D).unwrap();
    assert!(manager.texture(default_2d).unwrap().can_render(false));
    assert_ne!(manager.black_texture_id(gl::TEXTURE_2D), 0);
    assert!(manager.default_texture(gl::TEXTURE_EXTERNAL_OES).is_none());
    assert!(!manager.have_unrenderable_textures());

    manager.destroy(Some(&mut driver));
    assert_eq!(driver.count("delete_texture"), 4);
}

#[test]
fn test_level_info_bumps_framebuffer_serial() {
    let serial = Arc::new(AtomicU32::new(0));
    let mut manager = TextureManager::new(2048, 256, false, Arc::clone(&serial));
    let key = manager.create_texture(1, 11);
    manager.set_target(key, gl::TEXTURE_2D);
    set_2d(&mut manager, key, 0, 4, 4, true);
    assert_eq!(serial.load(Ordering::Relaxed), 1);
}
