use crate::decoder::commands::*;
use crate::decoder::test_support::{Harness, SHM};
use crate::decoder::{CommandError, ContextAttribs};
use crate::driver::mock_driver::MockDriver;
use crate::gl;

/// Framebuffer 1 with a 4x4 RGBA texture (client id 2) on COLOR_ATTACHMENT0
fn framebuffer_with_texture(h: &mut Harness, pixels: bool) {
    h.gen_texture(2);
    h.ok(BindTexture { target: gl::TEXTURE_2D, texture: 2 });
    if pixels {
        h.write_bytes(0, &[0x11; 64]);
    }
    h.ok(TexImage2D {
        target: gl::TEXTURE_2D,
        level: 0,
        internal_format: gl::RGBA,
        width: 4,
        height: 4,
        border: 0,
        format: gl::RGBA,
        ty: gl::UNSIGNED_BYTE,
        pixels_shm_id: if pixels { SHM } else { 0 },
        pixels_shm_offset: 0,
    });
    assert!(h.run_with(GenFramebuffersImmediate { n: 1 }, &[1]).is_ok());
    h.ok(BindFramebuffer { target: gl::FRAMEBUFFER, framebuffer: 1 });
    h.ok(FramebufferTexture2D {
        target: gl::FRAMEBUFFER,
        attachment: gl::COLOR_ATTACHMENT0,
        textarget: gl::TEXTURE_2D,
        texture: 2,
        level: 0,
    });
    assert_eq!(h.error(), gl::NO_ERROR);
}

fn status(h: &mut Harness) -> u32 {
    h.ok(CheckFramebufferStatus { target: gl::FRAMEBUFFER, result_shm_id: SHM, result_shm_offset: 512 });
    h.read_u32(512)
}

fn read_pixels(x: i32, y: i32, width: i32, height: i32, async_: u32) -> ReadPixels {
    ReadPixels {
        x,
        y,
        width,
        height,
        format: gl::RGBA,
        ty: gl::UNSIGNED_BYTE,
        pixels_shm_id: SHM,
        pixels_shm_offset: 1024,
        result_shm_id: SHM,
        result_shm_offset: 2048,
        async_,
    }
}

// ============================================================================
// FRAMEBUFFERS
// ============================================================================

#[test]
fn test_empty_framebuffer_is_incomplete() {
    let mut h = Harness::new();
    assert!(h.run_with(GenFramebuffersImmediate { n: 1 }, &[1]).is_ok());
    h.ok(BindFramebuffer { target: gl::FRAMEBUFFER, framebuffer: 1 });
    assert_eq!(status(&mut h), gl::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT);
    assert_eq!(h.count("check_framebuffer_status"), 0);
}

#[test]
fn test_backbuffer_is_always_complete() {
    let mut h = Harness::new();
    assert_eq!(status(&mut h), gl::FRAMEBUFFER_COMPLETE);
}

#[test]
fn test_texture_attachment_completes_framebuffer() {
    let mut h = Harness::new();
    framebuffer_with_texture(&mut h, true);
    assert_eq!(status(&mut h), gl::FRAMEBUFFER_COMPLETE);
    assert_eq!(h.count("check_framebuffer_status"), 1);

    // Cached once the driver agreed
    assert_eq!(status(&mut h), gl::FRAMEBUFFER_COMPLETE);
    assert_eq!(h.count("check_framebuffer_status"), 1);
}

#[test]
fn test_attach_unknown_texture() {
    let mut h = Harness::new();
    assert!(h.run_with(GenFramebuffersImmediate { n: 1 }, &[1]).is_ok());
    h.ok(BindFramebuffer { target: gl::FRAMEBUFFER, framebuffer: 1 });
    h.ok(FramebufferTexture2D {
        target: gl::FRAMEBUFFER,
        attachment: gl::COLOR_ATTACHMENT0,
        textarget: gl::TEXTURE_2D,
        texture: 77,
        level: 0,
    });
    assert_eq!(h.error(), gl::INVALID_OPERATION);
}

#[test]
fn test_attach_without_bound_framebuffer() {
    let mut h = Harness::new();
    h.gen_texture(2);
    h.ok(FramebufferTexture2D {
        target: gl::FRAMEBUFFER,
        attachment: gl::COLOR_ATTACHMENT0,
        textarget: gl::TEXTURE_2D,
        texture: 2,
        level: 0,
    });
    assert_eq!(h.error(), gl::INVALID_OPERATION);
}

#[test]
fn test_delete_bound_framebuffer_rebinds_backbuffer() {
    let mut h = Harness::new();
    assert!(h.run_with(GenFramebuffersImmediate { n: 1 }, &[1]).is_ok());
    h.ok(BindFramebuffer { target: gl::FRAMEBUFFER, framebuffer: 1 });
    assert!(h.decoder.state.bound_draw_framebuffer.is_some());
    assert!(h.decoder.state.bound_read_framebuffer.is_some());

    assert!(h.run_with(DeleteFramebuffersImmediate { n: 1 }, &[1]).is_ok());
    assert!(h.decoder.state.bound_draw_framebuffer.is_none());
    assert!(h.decoder.state.bound_read_framebuffer.is_none());
    assert_eq!(h.count("delete_framebuffer"), 1);

    h.ok(IsFramebuffer { framebuffer: 1, result_shm_id: SHM, result_shm_offset: 0 });
    assert_eq!(h.read_u32(0), 0);
}

// ============================================================================
// RENDERBUFFERS
// ============================================================================

#[test]
fn test_renderbuffer_storage_needs_binding() {
    let mut h = Harness::new();
    h.ok(RenderbufferStorage { target: gl::RENDERBUFFER, internal_format: gl::RGBA4, width: 4, height: 4 });
    assert_eq!(h.error(), gl::INVALID_OPERATION);
}

#[test]
fn test_renderbuffer_storage_checks() {
    let mut h = Harness::new();
    assert!(h.run_with(GenRenderbuffersImmediate { n: 1 }, &[3]).is_ok());
    h.ok(BindRenderbuffer { target: gl::RENDERBUFFER, renderbuffer: 3 });

    h.ok(RenderbufferStorage { target: gl::RENDERBUFFER, internal_format: gl::RGBA4, width: 9000, height: 4 });
    assert_eq!(h.error(), gl::INVALID_VALUE);
    h.ok(RenderbufferStorage { target: gl::RENDERBUFFER, internal_format: gl::RGBA, width: 4, height: 4 });
    assert_eq!(h.error(), gl::INVALID_ENUM);

    h.ok(RenderbufferStorage { target: gl::RENDERBUFFER, internal_format: gl::RGBA4, width: 4, height: 4 });
    assert_eq!(h.error(), gl::NO_ERROR);
    assert_eq!(h.count("renderbuffer_storage"), 1);

    h.ok(IsRenderbuffer { renderbuffer: 3, result_shm_id: SHM, result_shm_offset: 0 });
    assert_eq!(h.read_u32(0), 1);
}

#[test]
fn test_multisample_storage_unsupported() {
    let mut h = Harness::new();
    assert!(h.run_with(GenRenderbuffersImmediate { n: 1 }, &[3]).is_ok());
    h.ok(BindRenderbuffer { target: gl::RENDERBUFFER, renderbuffer: 3 });
    h.ok(RenderbufferStorageMultisampleEXT {
        target: gl::RENDERBUFFER,
        samples: 2,
        internal_format: gl::RGBA4,
        width: 4,
        height: 4,
    });
    assert_eq!(h.error(), gl::INVALID_OPERATION);
    assert_eq!(h.count("renderbuffer_storage"), 0);
}

// ============================================================================
// CLEAR
// ============================================================================

#[test]
fn test_first_clear_also_clears_backbuffer() {
    let mut h = Harness::new();
    h.clear_calls();
    h.ok(Clear { mask: gl::COLOR_BUFFER_BIT });
    assert_eq!(h.count("clear "), 2);

    h.ok(Clear { mask: gl::COLOR_BUFFER_BIT });
    assert_eq!(h.count("clear "), 3);
}

#[test]
fn test_clear_invalid_mask() {
    let mut h = Harness::new();
    h.clear_calls();
    h.ok(Clear { mask: 0x1 });
    assert_eq!(h.error(), gl::INVALID_VALUE);
    assert_eq!(h.count("clear "), 0);
}

#[test]
fn test_clear_incomplete_framebuffer() {
    let mut h = Harness::new();
    assert!(h.run_with(GenFramebuffersImmediate { n: 1 }, &[1]).is_ok());
    h.ok(BindFramebuffer { target: gl::FRAMEBUFFER, framebuffer: 1 });
    h.clear_calls();
    h.ok(Clear { mask: gl::COLOR_BUFFER_BIT });
    assert_eq!(h.error(), gl::INVALID_FRAMEBUFFER_OPERATION);
    assert_eq!(h.count("clear "), 0);
}

#[test]
fn test_clear_zeroes_uncleared_attachment_first() {
    let mut h = Harness::new();
    framebuffer_with_texture(&mut h, false);
    h.clear_calls();
    h.ok(Clear { mask: gl::DEPTH_BUFFER_BIT });
    assert_eq!(h.error(), gl::NO_ERROR);
    assert!(h.called(&format!("clear {:#x}", gl::COLOR_BUFFER_BIT)));
    assert!(h.called(&format!("clear {:#x}", gl::DEPTH_BUFFER_BIT)));

    let key = h.decoder.state.bound_texture(gl::TEXTURE_2D).unwrap();
    let mut group = h.group.lock().unwrap();
    let res = group.resources().unwrap();
    assert!(res.textures.texture(key).unwrap().is_level_cleared(gl::TEXTURE_2D, 0));
}

// ============================================================================
// READ PIXELS
// ============================================================================

#[test]
fn test_read_pixels_publishes_result() {
    let mut h = Harness::new();
    h.ok(read_pixels(0, 0, 2, 2, 0));
    assert_eq!(h.error(), gl::NO_ERROR);
    assert_eq!(h.read_bytes(1024, 16), vec![0x5A; 16]);
    assert_eq!(h.read_u32(2048), 1);
    assert_eq!(h.read_u32(2052), 2);
    assert_eq!(h.read_u32(2056), 2);
}

#[test]
fn test_read_pixels_outside_backbuffer_left_zero() {
    let mut h = Harness::new();
    h.ok(read_pixels(-2, 0, 4, 1, 0));
    assert!(h.called("read_pixels 0,0 2x1"));
    let row = h.read_bytes(1024, 16);
    assert_eq!(&row[..8], &[0; 8]);
    assert_eq!(&row[8..], &[0x5A; 8]);
}

#[test]
fn test_read_pixels_fully_outside_reads_nothing() {
    let mut h = Harness::new();
    h.ok(read_pixels(100, 100, 2, 2, 0));
    assert_eq!(h.count("read_pixels"), 0);
    assert_eq!(h.read_bytes(1024, 16), vec![0; 16]);
    assert_eq!(h.read_u32(2048), 1);
}

#[test]
fn test_read_pixels_destination_out_of_bounds() {
    let mut h = Harness::new();
    let result = h.run(ReadPixels { pixels_shm_offset: 4090, ..read_pixels(0, 0, 4, 4, 0) });
    assert_eq!(result, Err(CommandError::OutOfBounds));
}

#[test]
fn test_async_read_pixels_waits_for_fence() {
    let mut driver = MockDriver::new();
    driver.signaled_fences.push(1);
    let mut h = Harness::with_driver(driver, ContextAttribs::default());
    h.ok(read_pixels(0, 0, 2, 2, 1));
    assert!(h.called("fence_sync 1"));
    assert_eq!(h.read_u32(2048), 0);
    assert!(h.decoder.has_idle_work());

    h.decoder.perform_idle_work();
    assert_eq!(h.read_u32(2048), 1);
    assert_eq!(h.read_bytes(1024, 16), vec![0x5A; 16]);
    assert!(h.called("delete_fence 1"));
}

#[test]
fn test_read_pixels_invalid_format() {
    let mut h = Harness::new();
    h.ok(ReadPixels { format: gl::LUMINANCE, ..read_pixels(0, 0, 2, 2, 0) });
    assert_eq!(h.error(), gl::INVALID_ENUM);
    assert_eq!(h.count("read_pixels"), 0);
}
