/// Client-handle to object table with explicit reference counts.
///
/// Objects live in a SlotMap arena and are addressed by stable keys. Client
/// handles map onto keys; several handles may share one key (mailbox consume),
/// and other holders (bindings, framebuffer attachments, current programs)
/// take extra references with `add_ref`. An object is removed only when its
/// count drops to zero, and removal drops every handle still naming it.

use rustc_hash::FxHashMap;
use slotmap::{Key, SecondaryMap, SlotMap};

struct Entry<T> {
    object: T,
    ref_count: u32,
}

pub struct ObjectTable<K: Key, T> {
    objects: SlotMap<K, Entry<T>>,
    client_ids: FxHashMap<u32, K>,
    /// Reverse map so removal can drop every handle naming an object
    handles: SecondaryMap<K, Vec<u32>>,
}

impl<K: Key, T> ObjectTable<K, T> {
    pub fn new() -> Self {
        Self {
            objects: SlotMap::with_key(),
            client_ids: FxHashMap::default(),
            handles: SecondaryMap::new(),
        }
    }

    /// Insert an object named by `client_id`, starting with one reference
    pub fn insert(&mut self, client_id: u32, object: T) -> K {
        let key = self.objects.insert(Entry { object, ref_count: 1 });
        self.client_ids.insert(client_id, key);
        self.handles.insert(key, vec![client_id]);
        key
    }

    /// Insert an object with no client handle (service-owned)
    pub fn insert_unnamed(&mut self, object: T) -> K {
        let key = self.objects.insert(Entry { object, ref_count: 1 });
        self.handles.insert(key, Vec::new());
        key
    }

    /// Name an existing object with another client handle (takes a reference)
    pub fn alias(&mut self, client_id: u32, key: K) -> bool {
        if !self.objects.contains_key(key) || self.client_ids.contains_key(&client_id) {
            return false;
        }
        self.client_ids.insert(client_id, key);
        if let Some(handles) = self.handles.get_mut(key) {
            handles.push(client_id);
        }
        self.add_ref(key);
        true
    }

    pub fn lookup(&self, client_id: u32) -> Option<K> {
        self.client_ids.get(&client_id).copied()
    }

    pub fn get(&self, key: K) -> Option<&T> {
        self.objects.get(key).map(|e| &e.object)
    }

    pub fn get_mut(&mut self, key: K) -> Option<&mut T> {
        self.objects.get_mut(key).map(|e| &mut e.object)
    }

    pub fn contains(&self, key: K) -> bool {
        self.objects.contains_key(key)
    }

    pub fn ref_count(&self, key: K) -> u32 {
        self.objects.get(key).map(|e| e.ref_count).unwrap_or(0)
    }

    /// First client handle naming `key`
    pub fn client_id(&self, key: K) -> Option<u32> {
        self.handles.get(key).and_then(|h| h.first().copied())
    }

    pub fn add_ref(&mut self, key: K) {
        if let Some(entry) = self.objects.get_mut(key) {
            entry.ref_count += 1;
        }
    }

    /// Drop one reference; returns the object when that was the last one
    pub fn release(&mut self, key: K) -> Option<T> {
        let entry = self.objects.get_mut(key)?;
        debug_assert!(entry.ref_count > 0);
        entry.ref_count -= 1;
        if entry.ref_count > 0 {
            return None;
        }
        if let Some(handles) = self.handles.remove(key) {
            for client_id in handles {
                self.client_ids.remove(&client_id);
            }
        }
        self.objects.remove(key).map(|e| e.object)
    }

    /// Remove a client handle without touching the reference count
    pub fn unmap(&mut self, client_id: u32) -> Option<K> {
        let key = self.client_ids.remove(&client_id)?;
        if let Some(handles) = self.handles.get_mut(key) {
            handles.retain(|id| *id != client_id);
        }
        Some(key)
    }

    /// Remove a client handle and drop the reference it held
    pub fn remove(&mut self, client_id: u32) -> Option<T> {
        let key = self.unmap(client_id)?;
        self.release(key)
    }

    /// Remove every object regardless of reference counts (group teardown)
    pub fn drain(&mut self) -> Vec<T> {
        self.client_ids.clear();
        self.handles.clear();
        self.objects.drain().map(|(_, e)| e.object).collect()
    }

    pub fn keys(&self) -> Vec<K> {
        self.objects.keys().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, &T)> {
        self.objects.iter().map(|(k, e)| (k, &e.object))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn handle_count(&self) -> usize {
        self.client_ids.len()
    }
}

impl<K: Key, T> Default for ObjectTable<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "object_table_tests.rs"]
mod tests;
