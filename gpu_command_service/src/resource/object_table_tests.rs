use super::*;

slotmap::new_key_type! {
    struct TestKey;
}

// ============================================================================
// Reference counting
// ============================================================================

#[test]
fn test_insert_and_lookup() {
    let mut table: ObjectTable<TestKey, &str> = ObjectTable::new();
    let key = table.insert(5, "five");
    assert_eq!(table.lookup(5), Some(key));
    assert_eq!(table.get(key), Some(&"five"));
    assert_eq!(table.ref_count(key), 1);
    assert_eq!(table.client_id(key), Some(5));
}

#[test]
fn test_remove_last_handle_destroys() {
    let mut table: ObjectTable<TestKey, u32> = ObjectTable::new();
    let key = table.insert(1, 100);
    assert_eq!(table.remove(1), Some(100));
    assert!(!table.contains(key));
    assert!(table.lookup(1).is_none());
}

#[test]
fn test_extra_ref_keeps_object_alive() {
    let mut table: ObjectTable<TestKey, u32> = ObjectTable::new();
    let key = table.insert(1, 100);
    table.add_ref(key);
    assert_eq!(table.remove(1), None);
    assert!(table.contains(key));
    assert!(table.lookup(1).is_none());
    assert_eq!(table.release(key), Some(100));
    assert!(table.is_empty());
}

#[test]
fn test_aliases_share_object() {
    let mut table: ObjectTable<TestKey, u32> = ObjectTable::new();
    let key = table.insert(1, 7);
    assert!(table.alias(2, key));
    assert!(table.alias(3, key));
    assert!(!table.alias(3, key));
    assert_eq!(table.ref_count(key), 3);

    assert_eq!(table.remove(1), None);
    assert_eq!(table.remove(2), None);
    assert_eq!(table.lookup(3), Some(key));
    assert_eq!(table.remove(3), Some(7));
}

#[test]
fn test_release_to_zero_drops_remaining_handles() {
    let mut table: ObjectTable<TestKey, u32> = ObjectTable::new();
    let key = table.insert(1, 7);
    assert_eq!(table.release(key), Some(7));
    assert!(table.lookup(1).is_none());
    assert_eq!(table.handle_count(), 0);
}

#[test]
fn test_drain_ignores_refs() {
    let mut table: ObjectTable<TestKey, u32> = ObjectTable::new();
    let a = table.insert(1, 1);
    table.add_ref(a);
    table.insert_unnamed(2);
    let mut drained = table.drain();
    drained.sort();
    assert_eq!(drained, vec![1, 2]);
    assert!(table.is_empty());
    assert_eq!(table.handle_count(), 0);
}
