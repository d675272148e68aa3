/// Shared-memory result record of one query
///
/// Layout (little-endian words):
///
/// | offset | field           |
/// |--------|-----------------|
/// | 0      | `process_count` |
/// | 4      | reserved        |
/// | 8      | result low      |
/// | 12     | result high     |
///
/// The result is written first, then a release fence, then `process_count`.
/// A reader that acquires `process_count == submit_count` sees the whole
/// result.

use crate::shared_memory::SharedMemoryRef;
use std::sync::atomic::{fence, Ordering};
use std::sync::{Arc, Mutex};

/// Size in bytes of a sync record
pub const QUERY_SYNC_SIZE: u32 = 16;

const PROCESS_COUNT_OFFSET: usize = 0;
const RESULT_LOW_OFFSET: usize = 8;
const RESULT_HIGH_OFFSET: usize = 12;

/// Validated handle to a query's sync record
#[derive(Debug, Clone)]
pub struct QuerySync {
    memory: SharedMemoryRef,
}

impl QuerySync {
    /// Wrap a window; `None` unless it holds a whole word-aligned record
    pub fn new(memory: SharedMemoryRef) -> Option<Self> {
        if memory.size() < QUERY_SYNC_SIZE as usize || !memory.is_word_aligned() {
            return None;
        }
        Some(Self { memory })
    }

    /// Publish `result` tagged with `submit_count`
    pub fn publish(&self, result: u64, submit_count: u32) {
        // The window was validated at construction, these cannot fail
        let _ = self.memory.store_u32(RESULT_LOW_OFFSET, result as u32, Ordering::Relaxed);
        let _ = self.memory.store_u32(RESULT_HIGH_OFFSET, (result >> 32) as u32, Ordering::Relaxed);
        fence(Ordering::Release);
        let _ = self.memory.store_u32(PROCESS_COUNT_OFFSET, submit_count, Ordering::Release);
    }

    /// Reset `process_count` to 0 before a new round
    pub fn reset(&self) {
        let _ = self.memory.store_u32(PROCESS_COUNT_OFFSET, 0, Ordering::Release);
    }

    /// Client-side read: `(process_count, result)` with acquire ordering
    pub fn read(&self) -> (u32, u64) {
        let count = self.memory.load_u32(PROCESS_COUNT_OFFSET, Ordering::Acquire).unwrap_or(0);
        let low = self.memory.load_u32(RESULT_LOW_OFFSET, Ordering::Relaxed).unwrap_or(0);
        let high = self.memory.load_u32(RESULT_HIGH_OFFSET, Ordering::Relaxed).unwrap_or(0);
        (count, (u64::from(high) << 32) | u64::from(low))
    }
}

// ===== COMPLETION OBSERVER =====

#[derive(Debug, Default)]
struct ObserverState {
    cancelled: bool,
    result: Option<u64>,
}

/// Cancelable completion flag handed to another thread
///
/// The other thread only records a result; the owner of the query publishes
/// it. Completing and cancelling serialize on the same lock, so once
/// [`cancel`](Self::cancel) returns no result is recorded.
#[derive(Debug, Clone, Default)]
pub struct CompletionObserver {
    state: Arc<Mutex<ObserverState>>,
}

impl CompletionObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `result` unless cancelled or already done; returns whether it
    /// was recorded
    pub fn complete(&self, result: u64) -> bool {
        let Ok(mut state) = self.state.lock() else {
            return false;
        };
        if state.cancelled || state.result.is_some() {
            return false;
        }
        state.result = Some(result);
        true
    }

    /// Later `complete` calls become no-ops
    pub fn cancel(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.cancelled = true;
        }
    }

    /// Recorded result, `None` while outstanding or once cancelled
    pub fn result(&self) -> Option<u64> {
        self.state
            .lock()
            .ok()
            .and_then(|state| if state.cancelled { None } else { state.result })
    }

    /// Whether the observer has completed or been cancelled
    pub fn is_done(&self) -> bool {
        self.state
            .lock()
            .map(|state| state.cancelled || state.result.is_some())
            .unwrap_or(true)
    }
}

#[cfg(test)]
#[path = "query_sync_tests.rs"]
mod tests;
