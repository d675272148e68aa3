/// Sync points shared by every decoder of a process
///
/// A sync point is generated by one decoder and retired once that decoder
/// has executed past it. Other decoders defer `WaitSyncPointCHROMIUM` until
/// it is retired. Ids start at 1 and wrap skipping 0.

use rustc_hash::FxHashSet;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct SyncPointState {
    next: u32,
    unretired: FxHashSet<u32>,
}

#[derive(Default)]
pub struct SyncPointManager {
    state: Mutex<SyncPointState>,
}

impl SyncPointManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Allocate a new unretired sync point
    pub fn generate(&self) -> u32 {
        let Ok(mut state) = self.state.lock() else {
            return 0;
        };
        loop {
            state.next = state.next.wrapping_add(1);
            let id = state.next;
            if id != 0 && !state.unretired.contains(&id) {
                state.unretired.insert(id);
                return id;
            }
        }
    }

    /// Mark `id` as passed; unknown ids are ignored
    pub fn retire(&self, id: u32) {
        if let Ok(mut state) = self.state.lock() {
            state.unretired.remove(&id);
        }
    }

    /// Whether waiting on `id` may proceed
    ///
    /// Ids that were never generated count as retired so a bogus id cannot
    /// stall a decoder forever.
    pub fn is_retired(&self, id: u32) -> bool {
        self.state
            .lock()
            .map(|state| !state.unretired.contains(&id))
            .unwrap_or(true)
    }

    pub fn unretired_count(&self) -> usize {
        self.state.lock().map(|state| state.unretired.len()).unwrap_or(0)
    }
}

#[cfg(test)]
#[path = "sync_point_tests.rs"]
mod tests;
