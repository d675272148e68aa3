/// Allocates and recycles client-visible object ids.
///
/// Ids are non-zero `u32` values (0 names the default object in every
/// namespace). Freed ids are recycled LIFO. Ids can also be claimed directly
/// with `mark_as_used`, which is how client-chosen ids from Gen* commands and
/// "shared ids" registered by extension mechanisms stay unique within one
/// namespace.
///
/// # Example
///
/// ```ignore
/// let mut ids = IdAllocator::new();
/// let a = ids.alloc_id();       // 1
/// ids.mark_as_used(2);
/// let b = ids.alloc_id();       // 3
/// ids.free_id(a);
/// assert_eq!(ids.alloc_id(), 1); // recycled
/// ```

use rustc_hash::FxHashSet;

pub struct IdAllocator {
    free_list: Vec<u32>,
    next_id: u32,
    used: FxHashSet<u32>,
}

impl IdAllocator {
    /// Reserved id never handed out
    pub const INVALID_ID: u32 = 0;

    /// Create a new empty allocator
    pub fn new() -> Self {
        Self {
            free_list: Vec::new(),
            next_id: 1,
            used: FxHashSet::default(),
        }
    }

    /// Allocate the next available id, or `INVALID_ID` when exhausted
    pub fn alloc_id(&mut self) -> u32 {
        while let Some(id) = self.free_list.pop() {
            // Skip ids claimed through mark_as_used since they were freed
            if self.used.insert(id) {
                return id;
            }
        }
        while self.next_id != 0 {
            let id = self.next_id;
            self.next_id = self.next_id.wrapping_add(1);
            if self.used.insert(id) {
                return id;
            }
        }
        Self::INVALID_ID
    }

    /// Allocate the smallest free id `>= desired`
    pub fn alloc_id_at_or_above(&mut self, desired: u32) -> u32 {
        let mut id = desired.max(1);
        loop {
            if self.used.insert(id) {
                if id >= self.next_id {
                    self.next_id = id.wrapping_add(1);
                }
                return id;
            }
            id = match id.checked_add(1) {
                Some(next) => next,
                None => return Self::INVALID_ID,
            };
        }
    }

    /// Claim a specific id; false if it is 0 or already in use
    pub fn mark_as_used(&mut self, id: u32) -> bool {
        if id == Self::INVALID_ID {
            return false;
        }
        self.used.insert(id)
    }

    /// Return an id to the pool; unknown ids are ignored
    pub fn free_id(&mut self, id: u32) {
        if self.used.remove(&id) {
            self.free_list.push(id);
        }
    }

    pub fn in_use(&self, id: u32) -> bool {
        self.used.contains(&id)
    }

    /// Number of ids currently in use
    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "id_allocator_tests.rs"]
mod tests;
