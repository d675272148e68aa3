use super::*;
use crate::driver::mock_driver::MockDriver;

struct Managers {
    framebuffers: FramebufferManager,
    textures: TextureManager,
    renderbuffers: RenderbufferManager,
}

fn managers() -> Managers {
    let serial = Arc::new(AtomicU32::new(0));
    Managers {
        framebuffers: FramebufferManager::new(1, 1, Arc::clone(&serial)),
        textures: TextureManager::new(2048, 256, false, Arc::clone(&serial)),
        renderbuffers: RenderbufferManager::new(1024, 0, serial),
    }
}

fn color_texture(m: &mut Managers, client_id: u32, w: i32, h: i32, cleared: bool) -> TextureKey {
    let key = m.textures.create_texture(client_id, client_id + 100);
    m.textures.set_target(key, gl::TEXTURE_2D);
    m.textures
        .set_level_info(key, gl::TEXTURE_2D, 0, gl::RGBA, w, h, 1, 0, gl::RGBA, gl::UNSIGNED_BYTE, cleared);
    key
}

fn attach_texture(m: &mut Managers, fb: FramebufferKey, point: u32, texture: TextureKey) {
    m.framebuffers.attach(
        fb,
        point,
        Some(Attachment::Texture { texture, target: gl::TEXTURE_2D, level: 0 }),
        &mut m.textures,
        &mut m.renderbuffers,
        None,
    );
}

fn attach_renderbuffer(m: &mut Managers, fb: FramebufferKey, point: u32, rb: RenderbufferKey) {
    m.framebuffers.attach(
        fb,
        point,
        Some(Attachment::Renderbuffer(rb)),
        &mut m.textures,
        &mut m.renderbuffers,
        None,
    );
}

fn status(m: &Managers, fb: FramebufferKey) -> u32 {
    m.framebuffers.is_possibly_complete(fb, &m.textures, &m.renderbuffers)
}

// ============================================================================
// COMPLETENESS
// ============================================================================

#[test]
fn test_empty_framebuffer_is_missing_attachment() {
    let mut m = managers();
    let fb = m.framebuffers.create_framebuffer(1, 10);
    assert_eq!(status(&m, fb), gl::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT);
}

#[test]
fn test_color_plus_depth_is_complete() {
    let mut m = managers();
    let fb = m.framebuffers.create_framebuffer(1, 10);
    let tex = color_texture(&mut m, 2, 16, 16, true);
    let rb = m.renderbuffers.create_renderbuffer(3, 30);
    m.renderbuffers.set_info(rb, 0, gl::DEPTH_COMPONENT16, 16, 16);
    attach_texture(&mut m, fb, gl::COLOR_ATTACHMENT0, tex);
    attach_renderbuffer(&mut m, fb, gl::DEPTH_ATTACHMENT, rb);
    assert_eq!(status(&m, fb), gl::FRAMEBUFFER_COMPLETE);
}

#[test]
fn test_mismatched_sizes_are_incomplete_dimensions() {
    let mut m = managers();
    let fb = m.framebuffers.create_framebuffer(1, 10);
    let tex = color_texture(&mut m, 2, 16, 16, true);
    let rb = m.renderbuffers.create_renderbuffer(3, 30);
    m.renderbuffers.set_info(rb, 0, gl::DEPTH_COMPONENT16, 8, 8);
    attach_texture(&mut m, fb, gl::COLOR_ATTACHMENT0, tex);
    attach_renderbuffer(&mut m, fb, gl::DEPTH_ATTACHMENT, rb);
    assert_eq!(status(&m, fb), gl::FRAMEBUFFER_INCOMPLETE_DIMENSIONS);
}

#[test]
fn test_wrong_format_is_incomplete_attachment() {
    let mut m = managers();
    let fb = m.framebuffers.create_framebuffer(1, 10);
    let rb = m.renderbuffers.create_renderbuffer(3, 30);
    m.renderbuffers.set_info(rb, 0, gl::RGBA4, 8, 8);
    attach_renderbuffer(&mut m, fb, gl::DEPTH_ATTACHMENT, rb);
    assert_eq!(status(&m, fb), gl::FRAMEBUFFER_INCOMPLETE_ATTACHMENT);

    let lum = m.textures.create_texture(4, 40);
    m.textures.set_target(lum, gl::TEXTURE_2D);
    m.textures
        .set_level_info(lum, gl::TEXTURE_2D, 0, gl::LUMINANCE, 8, 8, 1, 0, gl::LUMINANCE, gl::UNSIGNED_BYTE, true);
    let fb2 = m.framebuffers.create_framebuffer(5, 50);
    attach_texture(&mut m, fb2, gl::COLOR_ATTACHMENT0, lum);
    assert_eq!(status(&m, fb2), gl::FRAMEBUFFER_INCOMPLETE_ATTACHMENT);
}

#[test]
fn test_separate_depth_and_stencil_unsupported() {
    let mut m = managers();
    let fb = m.framebuffers.create_framebuffer(1, 10);
    let depth = m.renderbuffers.create_renderbuffer(2, 20);
    let stencil = m.renderbuffers.create_renderbuffer(3, 30);
    m.renderbuffers.set_info(depth, 0, gl::DEPTH_COMPONENT16, 8, 8);
    m.renderbuffers.set_info(stencil, 0, gl::STENCIL_INDEX8, 8, 8);
    attach_renderbuffer(&mut m, fb, gl::DEPTH_ATTACHMENT, depth);
    attach_renderbuffer(&mut m, fb, gl::STENCIL_ATTACHMENT, stencil);
    assert_eq!(status(&m, fb), gl::FRAMEBUFFER_UNSUPPORTED);
}

#[test]
fn test_complete_cache_invalidated_by_storage_change() {
    let mut m = managers();
    let fb = m.framebuffers.create_framebuffer(1, 10);
    let tex = color_texture(&mut m, 2, 16, 16, true);
    attach_texture(&mut m, fb, gl::COLOR_ATTACHMENT0, tex);
    m.framebuffers.mark_as_complete(fb);
    assert!(m.framebuffers.is_complete(fb));

    m.textures
        .set_level_info(tex, gl::TEXTURE_2D, 0, gl::RGBA, 32, 32, 1, 0, gl::RGBA, gl::UNSIGNED_BYTE, true);
    assert!(!m.framebuffers.is_complete(fb));
}

// ============================================================================
// CLEARING
// ============================================================================

#[test]
fn test_uncleared_attachments_reported_and_marked() {
    let mut m = managers();
    let fb = m.framebuffers.create_framebuffer(1, 10);
    let tex = color_texture(&mut m, 2, 4, 4, false);
    let rb = m.renderbuffers.create_renderbuffer(3, 30);
    m.renderbuffers.set_info(rb, 0, gl::DEPTH_COMPONENT16, 4, 4);
    attach_texture(&mut m, fb, gl::COLOR_ATTACHMENT0, tex);
    attach_renderbuffer(&mut m, fb, gl::DEPTH_ATTACHMENT, rb);

    assert!(!m.framebuffers.is_cleared(fb, &m.textures, &m.renderbuffers));
    assert_eq!(m.framebuffers.uncleared_attachments(fb, &m.textures, &m.renderbuffers).len(), 2);

    m.framebuffers.mark_attachments_cleared(fb, &mut m.textures, &mut m.renderbuffers);
    assert!(m.framebuffers.is_cleared(fb, &m.textures, &m.renderbuffers));
    assert!(m.textures.texture(tex).unwrap().is_level_cleared(gl::TEXTURE_2D, 0));
    assert!(!m.renderbuffers.have_uncleared_renderbuffers());
}

// ============================================================================
// REFERENCES
// ============================================================================

#[test]
fn test_attachment_keeps_texture_alive() {
    let mut driver = MockDriver::new();
    let mut m = managers();
    let fb = m.framebuffers.create_framebuffer(1, 10);
    let tex = color_texture(&mut m, 2, 4, 4, true);
    attach_texture(&mut m, fb, gl::COLOR_ATTACHMENT0, tex);
    assert!(m.textures.texture(tex).unwrap().is_attached_to_framebuffer());

    m.textures.remove_texture(2, Some(&mut driver));
    assert!(m.textures.texture(tex).is_some());
    assert_eq!(driver.count("delete_texture"), 0);

    m.framebuffers
        .remove_framebuffer(1, &mut m.textures, &mut m.renderbuffers, Some(&mut driver));
    assert!(m.textures.texture(tex).is_none());
    assert!(driver.called("delete_texture 102"));
    assert!(driver.called("delete_framebuffer 10"));
}

#[test]
fn test_unbind_texture_detaches_points() {
    let mut m = managers();
    let fb = m.framebuffers.create_framebuffer(1, 10);
    let tex = color_texture(&mut m, 2, 4, 4, true);
    attach_texture(&mut m, fb, gl::COLOR_ATTACHMENT0, tex);
    let points = m
        .framebuffers
        .unbind_texture(fb, tex, &mut m.textures, &mut m.renderbuffers, None);
    assert_eq!(points, vec![gl::COLOR_ATTACHMENT0]);
    assert!(!m.framebuffers.framebuffer(fb).unwrap().has_color_attachment());
    assert_eq!(m.textures.ref_count(tex), 1);
}

#[test]
fn test_destroy_releases_attachments() {
    let mut m = managers();
    let fb = m.framebuffers.create_framebuffer(1, 10);
    let tex = color_texture(&mut m, 2, 4, 4, true);
    attach_texture(&mut m, fb, gl::COLOR_ATTACHMENT0, tex);
    m.framebuffers.destroy(&mut m.textures, &mut m.renderbuffers, None);
    assert!(m.framebuffers.is_empty());
    assert_eq!(m.textures.ref_count(tex), 1);
}
