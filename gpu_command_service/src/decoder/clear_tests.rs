use super::*;
use crate::driver::mock_driver::MockDriver;
use crate::decoder::context_state::EnableFlags;
use glam::Vec4;

// ============================================================================
// TEXTURE LEVELS
// ============================================================================

#[test]
fn test_color_level_cleared_with_zero_upload() {
    let mut driver = MockDriver::new();
    let state = ContextState::new(2, 2);
    let mut clearer = DriverLevelClearer::new(&mut driver, &state, vec![(gl::TEXTURE_2D, 5)], 0, false);

    assert!(clearer.clear_level(
        42,
        gl::TEXTURE_2D,
        gl::TEXTURE_2D,
        0,
        gl::RGBA,
        gl::RGBA,
        gl::UNSIGNED_BYTE,
        4,
        4,
        false
    ));
    assert_eq!(
        driver.calls,
        vec![
            format!("bind_texture {:#x} 42", gl::TEXTURE_2D),
            format!("tex_image_2d {:#x} 0 {:#x} 4x4 Some(true)", gl::TEXTURE_2D, gl::RGBA),
            format!("bind_texture {:#x} 5", gl::TEXTURE_2D),
        ]
    );
}

#[test]
fn test_immutable_level_uses_sub_image() {
    let mut driver = MockDriver::new();
    let state = ContextState::new(1, 1);
    let mut clearer = DriverLevelClearer::new(&mut driver, &state, Vec::new(), 0, false);

    assert!(clearer.clear_level(
        42,
        gl::TEXTURE_2D,
        gl::TEXTURE_2D,
        1,
        gl::RGBA8_OES,
        gl::RGBA,
        gl::UNSIGNED_BYTE,
        2,
        2,
        true
    ));
    assert_eq!(driver.count("tex_sub_image_2d"), 1);
    assert_eq!(driver.count("tex_image_2d"), 0);
}

#[test]
fn test_large_level_cleared_in_bands() {
    let mut driver = MockDriver::new();
    let state = ContextState::new(1, 1);
    let mut clearer = DriverLevelClearer::new(&mut driver, &state, Vec::new(), 0, false);

    // 2048 x 1024 RGBA is 8 MiB
    assert!(clearer.clear_level(
        42,
        gl::TEXTURE_2D,
        gl::TEXTURE_2D,
        0,
        gl::RGBA,
        gl::RGBA,
        gl::UNSIGNED_BYTE,
        2048,
        1024,
        false
    ));
    assert!(driver.called(&format!("tex_image_2d {:#x} 0 {:#x} 2048x1024 None", gl::TEXTURE_2D, gl::RGBA)));
    assert_eq!(driver.count("tex_sub_image_2d"), 2);
}

#[test]
fn test_depth_level_cleared_through_framebuffer() {
    let mut driver = MockDriver::new();
    let state = ContextState::new(1, 1);
    let mut clearer = DriverLevelClearer::new(&mut driver, &state, Vec::new(), 7, true);

    assert!(clearer.clear_level(
        42,
        gl::TEXTURE_2D,
        gl::TEXTURE_2D,
        0,
        gl::DEPTH_COMPONENT,
        gl::DEPTH_COMPONENT,
        gl::UNSIGNED_INT,
        8,
        8,
        false
    ));
    assert!(driver.called(&format!("clear {:#x}", gl::DEPTH_BUFFER_BIT)));
    assert_eq!(driver.count("tex_image_2d"), 0);
    assert!(driver.called(&format!("bind_framebuffer {:#x} 7", gl::FRAMEBUFFER)));
    assert_eq!(driver.count("delete_framebuffer"), 1);
}

#[test]
fn test_incomplete_depth_framebuffer_fails() {
    let mut driver = MockDriver::new();
    driver.framebuffer_status = gl::FRAMEBUFFER_UNSUPPORTED;
    let state = ContextState::new(1, 1);
    let mut clearer = DriverLevelClearer::new(&mut driver, &state, Vec::new(), 0, true);

    assert!(!clearer.clear_level(
        42,
        gl::TEXTURE_2D,
        gl::TEXTURE_2D,
        0,
        gl::DEPTH_COMPONENT16,
        gl::DEPTH_COMPONENT,
        gl::UNSIGNED_SHORT,
        8,
        8,
        false
    ));
    assert_eq!(driver.count("clear "), 0);
}

// ============================================================================
// FRAMEBUFFER CLEARS
// ============================================================================

#[test]
fn test_clear_mask_for_points() {
    assert_eq!(clear_mask_for([gl::COLOR_ATTACHMENT0]), gl::COLOR_BUFFER_BIT);
    assert_eq!(
        clear_mask_for([gl::DEPTH_ATTACHMENT, gl::STENCIL_ATTACHMENT]),
        gl::DEPTH_BUFFER_BIT | gl::STENCIL_BUFFER_BIT
    );
    assert_eq!(clear_mask_for([]), 0);
}

#[test]
fn test_clear_with_defaults_restores_scissor() {
    let mut driver = MockDriver::new();
    let mut state = ContextState::new(1, 1);
    state.set_enabled(EnableFlags::SCISSOR_TEST, true);
    state.clear_color = Vec4::new(0.5, 0.5, 0.5, 1.0);

    clear_with_defaults(&mut driver, &state, gl::COLOR_BUFFER_BIT);

    assert!(driver.called(&format!("clear {:#x}", gl::COLOR_BUFFER_BIT)));
    assert_eq!(driver.calls.last(), Some(&format!("enable {:#x}", gl::SCISSOR_TEST)));
    assert!(driver.called("clear_color [0.5, 0.5, 0.5, 1.0]"));
}
