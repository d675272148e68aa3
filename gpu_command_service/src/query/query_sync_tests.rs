use super::*;
use crate::shared_memory::SharedMemoryManager;
use crate::shared_memory::SharedMemoryRegion;
use std::thread;

fn record(offset: u32) -> (SharedMemoryManager, QuerySync) {
    let mut memory = SharedMemoryManager::new();
    memory.register(1, SharedMemoryRegion::new(64));
    let window = memory.get_address(1, offset, QUERY_SYNC_SIZE).unwrap();
    (memory, QuerySync::new(window).unwrap())
}

// ============================================================================
// RECORD
// ============================================================================

#[test]
fn test_publish_writes_result_then_count() {
    let (_memory, sync) = record(16);
    assert_eq!(sync.read(), (0, 0));
    sync.publish(0x1_0000_0002, 42);
    assert_eq!(sync.read(), (42, 0x1_0000_0002));
}

#[test]
fn test_reset_clears_count_only() {
    let (_memory, sync) = record(0);
    sync.publish(9, 3);
    sync.reset();
    assert_eq!(sync.read(), (0, 9));
}

#[test]
fn test_short_or_misaligned_window_is_rejected() {
    let mut memory = SharedMemoryManager::new();
    memory.register(1, SharedMemoryRegion::new(64));
    assert!(QuerySync::new(memory.get_address(1, 0, 8).unwrap()).is_none());
    assert!(QuerySync::new(memory.get_address(1, 2, 16).unwrap()).is_none());
}

#[test]
fn test_reader_never_sees_count_before_result() {
    let (_memory, sync) = record(0);
    let writer = sync.clone();
    let handle = thread::spawn(move || {
        for round in 1..=500u32 {
            writer.publish(u64::from(round) * 3, round);
        }
    });
    loop {
        let (count, result) = sync.read();
        if count > 0 {
            assert!(result >= u64::from(count) * 3);
        }
        if count == 500 {
            break;
        }
    }
    handle.join().unwrap();
}

// ============================================================================
// OBSERVER
// ============================================================================

#[test]
fn test_observer_completes_once() {
    let observer = CompletionObserver::new();
    assert!(!observer.is_done());
    assert_eq!(observer.result(), None);
    assert!(observer.complete(1));
    assert!(!observer.complete(2));
    assert_eq!(observer.result(), Some(1));
    assert!(observer.is_done());
}

#[test]
fn test_cancelled_observer_never_records() {
    let observer = CompletionObserver::new();
    let remote = observer.clone();
    observer.cancel();
    let handle = thread::spawn(move || remote.complete(1));
    assert!(!handle.join().unwrap());
    assert!(observer.is_done());
    assert_eq!(observer.result(), None);
}
