use super::*;
use crate::driver::mock_driver::MockDriver;
use crate::gl;
use crate::resource::TextureManager;
use std::sync::atomic::AtomicU32;

fn name(byte: u8) -> MailboxName {
    [byte; MAILBOX_NAME_LENGTH]
}

fn manager() -> TextureManager {
    TextureManager::new(2048, 2048, true, Arc::new(AtomicU32::new(0)))
}

fn defined_texture(textures: &mut TextureManager, client_id: u32) -> crate::resource::TextureKey {
    let key = textures.create_texture(client_id, client_id + 100);
    textures.set_target(key, gl::TEXTURE_2D);
    textures.set_level_info(key, gl::TEXTURE_2D, 0, gl::RGBA, 4, 4, 1, 0, gl::RGBA, gl::UNSIGNED_BYTE, true);
    key
}

// ============================================================================
// PRODUCE / CONSUME
// ============================================================================

#[test]
fn test_consume_shares_service_object() {
    let mailboxes = MailboxManager::new();
    let mut producer = manager();
    let key = defined_texture(&mut producer, 1);
    mailboxes.produce_texture(&name(1), producer.texture(key).unwrap()).unwrap();

    let mut consumer = manager();
    let target = consumer.create_texture(9, 900);
    consumer.set_target(target, gl::TEXTURE_2D);
    let (service, definition) = mailboxes.consume_texture(gl::TEXTURE_2D, &name(1)).unwrap();
    assert_eq!(service.service_id(), 101);
    let mut driver = MockDriver::new();
    consumer.replace_definition(target, service, &definition, Some(&mut driver));

    let consumed = consumer.texture(target).unwrap();
    assert_eq!(consumed.service_id(), 101);
    assert_eq!(consumed.level_size(gl::TEXTURE_2D, 0), Some((4, 4)));
    assert!(driver.called("delete_texture 900"));
}

#[test]
fn test_consume_fails_for_wrong_target_or_unknown_name() {
    let mailboxes = MailboxManager::new();
    let mut producer = manager();
    let key = defined_texture(&mut producer, 1);
    mailboxes.produce_texture(&name(1), producer.texture(key).unwrap()).unwrap();
    assert!(mailboxes.consume_texture(gl::TEXTURE_CUBE_MAP, &name(1)).is_err());
    assert!(mailboxes.consume_texture(gl::TEXTURE_2D, &name(2)).is_err());
}

#[test]
fn test_mailbox_does_not_keep_texture_alive() {
    let mailboxes = MailboxManager::new();
    let mut producer = manager();
    let mut driver = MockDriver::new();
    let key = defined_texture(&mut producer, 1);
    mailboxes.produce_texture(&name(1), producer.texture(key).unwrap()).unwrap();
    assert_eq!(mailboxes.live_count(), 1);

    producer.remove_texture(1, Some(&mut driver));
    assert!(driver.called("delete_texture 101"));
    assert_eq!(mailboxes.live_count(), 0);
    assert!(mailboxes.consume_texture(gl::TEXTURE_2D, &name(1)).is_err());
}
