//! Integration tests for the Decoder on the software driver
//!
//! Backbuffer readback, malformed records, teardown and context loss across
//! a share group. No GPU required.
//!
//! Run with: cargo test --test decoder_integration_tests


use gpu_command_service::gpu::commands::{self, Command};
use gpu_command_service::gpu::gl;
use gpu_command_service::gpu::{CommandError, CommandOutcome, ContextLostReason, DecoderState};
use gpu_command_service_driver_soft::ObjectCounts;
use gpu_test_utils::{Client, SHM, SHM_SIZE};
use serial_test::serial;

fn clear_color(client: &mut Client, rgba: [f32; 4]) {
    client.ok(commands::ClearColor { red: rgba[0], green: rgba[1], blue: rgba[2], alpha: rgba[3] });
    client.ok(commands::Clear { mask: gl::COLOR_BUFFER_BIT });
}

// ============================================================================
// BACKBUFFER
// ============================================================================

#[test]
#[serial]
fn test_integration_read_pixels_before_any_draw_is_zero() {
    let mut client = Client::onscreen(4, 4);

    // The surface starts out holding undefined storage
    assert!(client.surface.pixels().has_undefined_texels());

    let pixels = client.read_pixels(0, 0, 4, 4, 0);
    assert!(pixels.iter().all(|&b| b == 0), "backbuffer leaked uninitialized memory");
    assert!(!client.surface.pixels().has_undefined_texels());
    assert_eq!(client.read_u32(64 + 4), 4);
    assert_eq!(client.read_u32(64 + 8), 4);
}

#[test]
#[serial]
fn test_integration_clear_then_read_pixels() {
    let mut client = Client::onscreen(4, 4);
    clear_color(&mut client, [1.0, 0.0, 0.0, 1.0]);

    let pixels = client.read_pixels(0, 0, 4, 4, 0);
    for pixel in pixels.chunks_exact(4) {
        assert_eq!(pixel, &[0xFF, 0, 0, 0xFF]);
    }
    assert_eq!(client.surface.pixels().rgba8_at(3, 3), Some([0xFF, 0, 0, 0xFF]));
    assert_eq!(client.error(), gl::NO_ERROR);
}

#[test]
#[serial]
fn test_integration_first_clear_also_initializes_depth_stencil() {
    let mut client = Client::onscreen(2, 2);
    clear_color(&mut client, [0.0, 0.0, 1.0, 1.0]);

    let depth_stencil = client.surface.depth_stencil().unwrap();
    assert!(!depth_stencil.has_undefined_texels());
}

#[test]
#[serial]
fn test_integration_read_pixels_outside_surface_is_zero() {
    let mut client = Client::onscreen(4, 4);
    clear_color(&mut client, [0.0, 1.0, 0.0, 1.0]);

    // Two columns inside the surface, two past its right edge
    let pixels = client.read_pixels(2, 0, 4, 1, 0);
    assert_eq!(&pixels[..8], &[0, 0xFF, 0, 0xFF, 0, 0xFF, 0, 0xFF]);
    assert_eq!(&pixels[8..], &[0; 8]);
}

#[test]
#[serial]
fn test_integration_swap_buffers_presents_surface() {
    let mut client = Client::onscreen(4, 4);
    clear_color(&mut client, [0.0, 0.0, 1.0, 1.0]);

    client.ok(commands::SwapBuffers);
    client.ok(commands::SwapBuffers);
    assert_eq!(client.surface.swap_count(), 2);
    assert_eq!(client.surface.pixels().rgba8_at(0, 0), Some([0, 0, 0xFF, 0xFF]));
}

// ============================================================================
// MALFORMED COMMANDS
// ============================================================================

#[test]
#[serial]
fn test_integration_unknown_command_id() {
    let mut client = Client::onscreen(4, 4);
    assert_eq!(client.decoder.execute(2000, 0, &[]), Err(CommandError::UnknownCommand));

    // The decoder keeps working afterwards
    client.ok(commands::Flush);
}

#[test]
#[serial]
fn test_integration_bad_argument_count() {
    let mut client = Client::onscreen(4, 4);

    // Clear takes exactly one word
    let id = commands::Clear::ID as u32;
    assert_eq!(client.decoder.execute(id, 0, &[]), Err(CommandError::InvalidArguments));
    assert_eq!(
        client.decoder.execute(id, 2, &[gl::COLOR_BUFFER_BIT, 0]),
        Err(CommandError::InvalidArguments)
    );
    // Declared length longer than what was handed over
    assert_eq!(client.decoder.execute(id, 1, &[]), Err(CommandError::InvalidArguments));
}

#[test]
#[serial]
fn test_integration_shared_memory_out_of_bounds() {
    let mut client = Client::onscreen(4, 4);

    let result = client.run(commands::GetError { result_shm_id: SHM, result_shm_offset: SHM_SIZE as u32 });
    assert_eq!(result, Err(CommandError::OutOfBounds));

    // Unregistered region
    let result = client.run(commands::GetError { result_shm_id: 42, result_shm_offset: 0 });
    assert_eq!(result, Err(CommandError::OutOfBounds));

    // A read straddling the end of the region
    let result = client.run(commands::ReadPixels {
        x: 0,
        y: 0,
        width: 4,
        height: 4,
        format: gl::RGBA,
        ty: gl::UNSIGNED_BYTE,
        pixels_shm_id: SHM,
        pixels_shm_offset: SHM_SIZE as u32 - 32,
        result_shm_id: 0,
        result_shm_offset: 0,
        async_: 0,
    });
    assert_eq!(result, Err(CommandError::OutOfBounds));
}

#[test]
#[serial]
fn test_integration_gl_errors_do_not_fail_commands() {
    let mut client = Client::onscreen(4, 4);

    let result = client.run(commands::BindTexture { target: gl::RGBA, texture: 1 });
    assert_eq!(result, Ok(CommandOutcome::Done));
    assert_eq!(client.error(), gl::INVALID_ENUM);
    assert_eq!(client.error(), gl::NO_ERROR);
}

// ============================================================================
// TEARDOWN
// ============================================================================

/// Textures, a framebuffer, a buffer, a linked program and a query
fn create_objects(client: &mut Client) {
    client.undefined_texture(1, 4, 4);
    client.undefined_texture(2, 8, 8);
    client.ok_with(commands::GenFramebuffersImmediate { n: 1 }, &[3]);
    client.ok(commands::BindFramebuffer { target: gl::FRAMEBUFFER, framebuffer: 3 });
    client.ok(commands::FramebufferTexture2D {
        target: gl::FRAMEBUFFER,
        attachment: gl::COLOR_ATTACHMENT0,
        textarget: gl::TEXTURE_2D,
        texture: 1,
        level: 0,
    });
    client.draw_setup(64);
    client.ok_with(commands::GenQueriesEXTImmediate { n: 1 }, &[30]);
    client.ok(commands::BeginQueryEXT {
        target: gl::ANY_SAMPLES_PASSED_EXT,
        id: 30,
        sync_shm_id: SHM,
        sync_shm_offset: 1024,
    });
    client.ok(commands::EndQueryEXT { target: gl::ANY_SAMPLES_PASSED_EXT, submit_count: 1 });
    assert_eq!(client.error(), gl::NO_ERROR);
}

#[test]
#[serial]
fn test_integration_destroy_releases_every_driver_object() {
    let mut client = Client::onscreen(4, 4);
    create_objects(&mut client);

    let counts = client.device.object_counts();
    assert!(counts.textures >= 2);
    assert_eq!(counts.framebuffers, 1);
    assert_eq!(counts.programs, 1);
    assert_eq!(counts.queries, 1);

    client.decoder.destroy();
    assert_eq!(client.decoder.state(), DecoderState::Destroyed);
    assert_eq!(client.device.object_counts(), ObjectCounts::default());

    // Idempotent
    client.decoder.destroy();
    assert_eq!(client.device.object_counts().total(), 0);
}

#[test]
#[serial]
fn test_integration_shared_objects_outlive_first_decoder() {
    let mut first = Client::onscreen(4, 4);
    let mut second = first.join(4, 4);
    first.undefined_texture(1, 4, 4);

    first.decoder.destroy();
    // The share group still owns the texture
    assert!(second.texture_service_id(1).is_some());
    second.ok(commands::BindTexture { target: gl::TEXTURE_2D, texture: 1 });
    assert_eq!(second.error(), gl::NO_ERROR);

    second.decoder.destroy();
    assert_eq!(second.device.object_counts(), ObjectCounts::default());
}

#[test]
#[serial]
fn test_integration_commands_after_destroy_fail() {
    let mut client = Client::onscreen(4, 4);
    client.decoder.destroy();
    assert_eq!(client.run(commands::Flush), Err(CommandError::GenericError));
}

// ============================================================================
// CONTEXT LOSS
// ============================================================================

#[test]
#[serial]
fn test_integration_guilty_reset_loses_whole_group() {
    let mut first = Client::onscreen(4, 4);
    let mut second = first.join(4, 4);
    clear_color(&mut second, [1.0, 1.0, 1.0, 1.0]);

    first.device.lose(gl::GUILTY_CONTEXT_RESET);
    assert_eq!(first.run(commands::Flush), Err(CommandError::LostContext));
    assert!(first.decoder.is_lost());
    assert_eq!(first.decoder.lost_reason(), Some(ContextLostReason::Guilty));

    // The other decoder learns on its next command
    assert_eq!(second.run(commands::Flush), Err(CommandError::LostContext));
    assert_eq!(second.decoder.lost_reason(), Some(ContextLostReason::Innocent));

    // Lost is terminal
    assert_eq!(
        first.run(commands::Clear { mask: gl::COLOR_BUFFER_BIT }),
        Err(CommandError::LostContext)
    );
    assert_eq!(first.error(), gl::CONTEXT_LOST);
}

#[test]
#[serial]
fn test_integration_lost_context_teardown_skips_driver() {
    let mut client = Client::onscreen(4, 4);
    client.undefined_texture(1, 4, 4);
    let before = client.device.object_counts();

    client.decoder.lose_context(ContextLostReason::Unknown);
    client.decoder.destroy();

    // Nothing was deleted through a lost context
    assert_eq!(client.device.object_counts(), before);
    assert_eq!(client.decoder.state(), DecoderState::Destroyed);
}

#[test]
#[serial]
fn test_integration_lose_context_command() {
    let mut first = Client::onscreen(4, 4);
    let mut second = first.join(4, 4);

    let result = first.run(commands::LoseContextCHROMIUM {
        current: gl::GUILTY_CONTEXT_RESET,
        other: gl::INNOCENT_CONTEXT_RESET,
    });
    assert_eq!(result, Err(CommandError::LostContext));
    assert_eq!(first.decoder.lost_reason(), Some(ContextLostReason::Guilty));
    assert_eq!(second.run(commands::Flush), Err(CommandError::LostContext));
    assert_eq!(second.decoder.lost_reason(), Some(ContextLostReason::Innocent));
}
