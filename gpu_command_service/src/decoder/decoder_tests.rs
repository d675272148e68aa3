use super::commands::{self, *};
use super::test_support::{Harness, SHM};
use super::*;
use crate::context_group::{ContextGroup, ContextGroupConfig};
use crate::driver::mock_driver::{MockDriver, MockSurface};

fn uninitialized() -> Decoder {
    Decoder::new(
        ContextGroup::shared(ContextGroupConfig::default()),
        Box::new(MockDriver::new()),
        Box::new(MockSurface::new(8, 8)),
    )
}

// ============================================================================
// DISPATCH
// ============================================================================

#[test]
fn test_execute_requires_initialize() {
    let mut decoder = uninitialized();
    assert_eq!(decoder.execute(CommandId::Noop as u32, 0, &[]), Err(CommandError::GenericError));
    assert_eq!(decoder.state(), DecoderState::Uninitialized);
}

#[test]
fn test_initialize_twice_fails() {
    let mut h = Harness::new();
    assert!(h.decoder.initialize(ContextAttribs::default(), &DisallowedFeatures::default()).is_err());
    assert_eq!(h.decoder.state(), DecoderState::Initialized);
}

#[test]
fn test_unknown_command() {
    let mut h = Harness::new();
    assert_eq!(h.decoder.execute(200, 0, &[]), Err(CommandError::UnknownCommand));
    assert_eq!(h.decoder.execute(commands::MAX_COMMAND_ID, 0, &[]), Err(CommandError::UnknownCommand));
}

#[test]
fn test_argument_count_checked_against_table() {
    let mut h = Harness::new();
    let id = CommandId::SetToken as u32;
    assert_eq!(h.decoder.execute(id, 2, &[7, 8]), Err(CommandError::InvalidArguments));
    assert_eq!(h.decoder.execute(id, 0, &[]), Err(CommandError::InvalidArguments));
    // Declared count larger than the words supplied
    assert_eq!(h.decoder.execute(id, 1, &[]), Err(CommandError::InvalidArguments));
    assert_eq!(h.decoder.token(), 0);
}

#[test]
fn test_immediate_command_accepts_trailing_words() {
    let mut h = Harness::new();
    assert_eq!(h.decoder.execute(CommandId::Noop as u32, 3, &[1, 2, 3]), Ok(CommandOutcome::Done));
}

#[test]
fn test_set_token() {
    let mut h = Harness::new();
    h.ok(SetToken { token: 41 });
    h.ok(SetToken { token: 42 });
    assert_eq!(h.decoder.token(), 42);
}

#[test]
fn test_state_moves_to_idle_after_idle_work() {
    let mut h = Harness::new();
    assert_eq!(h.decoder.state(), DecoderState::Initialized);
    h.ok(Flush {});
    assert_eq!(h.decoder.state(), DecoderState::Executing);
    assert!(!h.decoder.has_idle_work());
    h.decoder.perform_idle_work();
    assert_eq!(h.decoder.state(), DecoderState::Idle);
}

// ============================================================================
// BUCKETS
// ============================================================================

#[test]
fn test_bucket_upload_and_readback() {
    let mut h = Harness::new();
    h.ok(SetBucketSize { bucket_id: 3, size: 8 });
    let data = commands::bytes_to_words(b"hello");
    assert!(h.run_with(SetBucketDataImmediate { bucket_id: 3, offset: 2, size: 5 }, &data).is_ok());

    h.write_u32(0, 0);
    h.ok(GetBucketStart {
        bucket_id: 3,
        result_shm_id: SHM,
        result_shm_offset: 0,
        data_memory_size: 4,
        data_shm_id: SHM,
        data_shm_offset: 16,
    });
    assert_eq!(h.read_u32(0), 8);
    assert_eq!(h.read_bytes(16, 4), b"\0\0he".to_vec());

    h.ok(GetBucketData { bucket_id: 3, offset: 4, size: 3, shm_id: SHM, shm_offset: 32 });
    assert_eq!(h.read_bytes(32, 3), b"llo".to_vec());
}

#[test]
fn test_bucket_data_from_shared_memory() {
    let mut h = Harness::new();
    h.write_bytes(64, b"abcd");
    h.ok(SetBucketSize { bucket_id: 1, size: 4 });
    h.ok(SetBucketData { bucket_id: 1, offset: 0, size: 4, shm_id: SHM, shm_offset: 64 });
    assert_eq!(h.decoder.buckets.get(1).map(|b| b.data().to_vec()), Some(b"abcd".to_vec()));
}

#[test]
fn test_bucket_bounds() {
    let mut h = Harness::new();
    let data = commands::bytes_to_words(b"abcd");
    // Unknown bucket
    assert_eq!(
        h.run_with(SetBucketDataImmediate { bucket_id: 5, offset: 0, size: 4 }, &data),
        Err(CommandError::InvalidArguments)
    );

    h.ok(SetBucketSize { bucket_id: 5, size: 4 });
    assert_eq!(
        h.run_with(SetBucketDataImmediate { bucket_id: 5, offset: 1, size: 4 }, &data),
        Err(CommandError::InvalidArguments)
    );
    assert_eq!(
        h.run_with(SetBucketDataImmediate { bucket_id: 5, offset: 0, size: 8 }, &data),
        Err(CommandError::OutOfBounds)
    );
    assert_eq!(
        h.run(GetBucketData { bucket_id: 5, offset: 2, size: 4, shm_id: SHM, shm_offset: 0 }),
        Err(CommandError::InvalidArguments)
    );

    // Size 0 frees the bucket
    h.ok(SetBucketSize { bucket_id: 5, size: 0 });
    assert!(h.decoder.buckets.get(5).is_none());
}

#[test]
fn test_get_bucket_start_requires_zeroed_result() {
    let mut h = Harness::new();
    h.set_bucket(2, "x");
    h.write_u32(0, 9);
    let start = GetBucketStart {
        bucket_id: 2,
        result_shm_id: SHM,
        result_shm_offset: 0,
        data_memory_size: 0,
        data_shm_id: 0,
        data_shm_offset: 0,
    };
    assert_eq!(h.run(start), Err(CommandError::InvalidArguments));
    h.write_u32(0, 0);
    h.ok(start);
    assert_eq!(h.read_u32(0), 2);
}

// ============================================================================
// CONTEXT LOSS
// ============================================================================

#[test]
fn test_driver_reset_detected_on_flush() {
    let mut driver = MockDriver::new();
    driver.reset = gl::GUILTY_CONTEXT_RESET;
    let mut first = Harness::with_driver(driver, ContextAttribs::default());
    let mut second = Harness::in_group(Arc::clone(&first.group), MockDriver::new(), ContextAttribs::default());

    assert_eq!(first.run(Flush {}), Err(CommandError::LostContext));
    assert_eq!(first.decoder.lost_reason(), Some(ContextLostReason::Guilty));
    assert_eq!(first.decoder.state(), DecoderState::Lost);

    assert_eq!(second.run(SetToken { token: 1 }), Err(CommandError::LostContext));
    assert_eq!(second.decoder.lost_reason(), Some(ContextLostReason::Innocent));
    assert_eq!(second.decoder.token(), 0);
}

#[test]
fn test_lost_context_reports_error_and_stops_idle_work() {
    let mut h = Harness::new();
    h.decoder.lose_context(ContextLostReason::Unknown);
    assert_eq!(h.error(), gl::CONTEXT_LOST);
    assert_eq!(h.run(Noop {}), Err(CommandError::LostContext));

    h.clear_calls();
    h.decoder.perform_idle_work();
    assert!(h.calls().is_empty());
    assert_eq!(h.decoder.state(), DecoderState::Lost);
}

// ============================================================================
// TEARDOWN
// ============================================================================

#[test]
fn test_destroy_releases_driver_objects() {
    let attribs = ContextAttribs { offscreen: true, ..Default::default() };
    let mut h = Harness::with_driver(MockDriver::new(), attribs);
    let (framebuffer, _) = h.decoder.backbuffer();
    h.gen_texture(5);
    h.ok(BindTexture { target: gl::TEXTURE_2D, texture: 5 });
    h.clear_calls();

    h.decoder.destroy();
    assert_eq!(h.decoder.state(), DecoderState::Destroyed);
    assert!(h.called(&format!("delete_framebuffer {}", framebuffer)));
    assert!(h.count("delete_texture") >= 1);
    assert_eq!(h.run(Noop {}), Err(CommandError::GenericError));

    // Idempotent
    h.clear_calls();
    h.decoder.destroy();
    assert!(h.calls().is_empty());
}

#[test]
fn test_destroy_after_loss_skips_driver() {
    let attribs = ContextAttribs { offscreen: true, ..Default::default() };
    let mut h = Harness::with_driver(MockDriver::new(), attribs);
    h.gen_buffer(3);
    h.decoder.lose_context(ContextLostReason::Guilty);
    h.clear_calls();

    h.decoder.destroy();
    assert_eq!(h.count("delete_"), 0);
    assert_eq!(h.decoder.state(), DecoderState::Destroyed);
}

// ============================================================================
// BACK BUFFER
// ============================================================================

#[test]
fn test_onscreen_uses_surface() {
    let h = Harness::new();
    assert_eq!(h.decoder.backbuffer(), (0, (64, 64)));
    assert_eq!(h.decoder.offscreen_saved_texture(), None);
    // Surface format overrides the requested attribs
    assert_eq!(h.decoder.attribs().depth_size, 24);
}

#[test]
fn test_offscreen_target_created_at_surface_size() {
    let attribs = ContextAttribs { offscreen: true, ..Default::default() };
    let h = Harness::with_driver(MockDriver::new(), attribs);
    let (framebuffer, size) = h.decoder.backbuffer();
    assert_ne!(framebuffer, 0);
    assert_eq!(size, (64, 64));
    assert!(h.decoder.offscreen_saved_texture().is_some());
    assert!(h.called(&format!("bind_framebuffer {:#x} {}", gl::FRAMEBUFFER, framebuffer)));
}

#[test]
fn test_multisample_request_clamped_to_limit() {
    let attribs = ContextAttribs { offscreen: true, samples: 16, ..Default::default() };
    let mut driver = MockDriver::new();
    driver.extensions.push_str(" GL_ANGLE_framebuffer_multisample");
    let h = Harness::with_driver(driver, attribs);
    assert!(h.decoder.attribs().samples <= 4);
}
