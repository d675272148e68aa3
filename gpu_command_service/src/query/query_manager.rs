/// Queries and their manager.
///
/// Each query category is one `QueryKind` variant; begin, end and process
/// match on it. Ended queries wait in one FIFO queue in end order, drained by
/// `process_pending`. The transfer worker only flags its observer; every
/// result, async ones included, is published here through the query's
/// [`QuerySync`] record.

use super::async_transfer::AsyncTransferManager;
use super::query_sync::{CompletionObserver, QuerySync};
use crate::driver::GraphicsDriver;
use crate::feature::{FeatureFlags, FeatureSet};
use crate::gl;
use crate::resource::ObjectTable;
use std::collections::VecDeque;
use std::time::Instant;

slotmap::new_key_type! {
    /// Stable key of a query in the query arena
    pub struct QueryKey;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Created,
    Pending,
    Completed,
}

/// Category-specific state
#[derive(Debug)]
pub enum QueryKind {
    /// Occlusion query run by the driver
    AnySamples {
        service_id: u32,
        /// Target handed to the driver
        driver_target: u32,
        /// Driver counts samples, publish `count != 0`
        convert_to_bool: bool,
    },
    /// Host time between begin and end, in microseconds
    CommandsIssued { begin_time: Option<Instant> },
    /// Host time between end and publication, in microseconds
    Latency { end_time: Option<Instant> },
    /// First pending GL error at end time
    GetError,
    /// Flagged by the transfer worker after earlier transfers staged
    AsyncPixelTransfers { observer: Option<CompletionObserver> },
}

pub struct Query {
    target: u32,
    client_id: u32,
    sync: QuerySync,
    submit_count: u32,
    state: QueryState,
    /// Result known at end time, published in queue order
    ready_result: Option<u64>,
    kind: QueryKind,
}

impl Query {
    pub fn target(&self) -> u32 {
        self.target
    }

    pub fn client_id(&self) -> u32 {
        self.client_id
    }

    pub fn state(&self) -> QueryState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        self.state == QueryState::Pending
    }

    pub fn submit_count(&self) -> u32 {
        self.submit_count
    }

    pub fn kind(&self) -> &QueryKind {
        &self.kind
    }

    fn complete(&mut self, result: u64) {
        self.sync.publish(result, self.submit_count);
        self.state = QueryState::Completed;
        self.ready_result = None;
    }

    fn cancel_observer(&mut self) {
        if let QueryKind::AsyncPixelTransfers { observer } = &mut self.kind {
            if let Some(observer) = observer.take() {
                observer.cancel();
            }
        }
    }
}

/// Error of a begin or end call; each maps to a GL error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryError {
    /// Another query is active on the slot, or none is when ending
    InvalidOperation,
    /// Target not negotiated
    InvalidEnum,
}

impl QueryError {
    pub fn gl_error(&self) -> u32 {
        match self {
            Self::InvalidOperation => gl::INVALID_OPERATION,
            Self::InvalidEnum => gl::INVALID_ENUM,
        }
    }
}

const OCCLUSION_SLOT: usize = 0;
const COMMANDS_ISSUED_SLOT: usize = 1;
const LATENCY_SLOT: usize = 2;
const GET_ERROR_SLOT: usize = 3;
const ASYNC_TRANSFERS_SLOT: usize = 4;
const SLOT_COUNT: usize = 5;

fn slot_for_target(target: u32) -> Option<usize> {
    match target {
        gl::ANY_SAMPLES_PASSED_EXT | gl::ANY_SAMPLES_PASSED_CONSERVATIVE_EXT => Some(OCCLUSION_SLOT),
        gl::COMMANDS_ISSUED_CHROMIUM => Some(COMMANDS_ISSUED_SLOT),
        gl::LATENCY_QUERY_CHROMIUM => Some(LATENCY_SLOT),
        gl::GET_ERROR_QUERY_CHROMIUM => Some(GET_ERROR_SLOT),
        gl::ASYNC_PIXEL_TRANSFERS_COMPLETED_CHROMIUM => Some(ASYNC_TRANSFERS_SLOT),
        _ => None,
    }
}

pub struct QueryManager {
    queries: ObjectTable<QueryKey, Query>,
    active: [Option<QueryKey>; SLOT_COUNT],
    pending: VecDeque<QueryKey>,
    use_arb_occlusion: bool,
    use_arb_occlusion2: bool,
}

impl QueryManager {
    pub fn new(features: &FeatureSet) -> Self {
        Self {
            queries: ObjectTable::new(),
            active: [None; SLOT_COUNT],
            pending: VecDeque::new(),
            use_arb_occlusion: features.has(FeatureFlags::USE_ARB_OCCLUSION_QUERY_FOR_OCCLUSION_QUERY_BOOLEAN),
            use_arb_occlusion2: features.has(FeatureFlags::USE_ARB_OCCLUSION_QUERY2_FOR_OCCLUSION_QUERY_BOOLEAN),
        }
    }

    /// Create the query named `client_id` for `target`
    ///
    /// Occlusion queries get a driver query object here. Returns `None` for
    /// targets with no category.
    pub fn create_query(
        &mut self,
        target: u32,
        client_id: u32,
        sync: QuerySync,
        driver: &mut dyn GraphicsDriver,
    ) -> Option<QueryKey> {
        let kind = match slot_for_target(target)? {
            OCCLUSION_SLOT => {
                let driver_target = if self.use_arb_occlusion {
                    gl::SAMPLES_PASSED_ARB
                } else if self.use_arb_occlusion2 {
                    gl::ANY_SAMPLES_PASSED_EXT
                } else {
                    target
                };
                QueryKind::AnySamples {
                    service_id: driver.gen_query(),
                    driver_target,
                    convert_to_bool: self.use_arb_occlusion,
                }
            }
            COMMANDS_ISSUED_SLOT => QueryKind::CommandsIssued { begin_time: None },
            LATENCY_SLOT => QueryKind::Latency { end_time: None },
            GET_ERROR_SLOT => QueryKind::GetError,
            _ => QueryKind::AsyncPixelTransfers { observer: None },
        };
        Some(self.queries.insert(client_id, Query {
            target,
            client_id,
            sync,
            submit_count: 0,
            state: QueryState::Created,
            ready_result: None,
            kind,
        }))
    }

    pub fn get_query(&self, client_id: u32) -> Option<QueryKey> {
        self.queries.lookup(client_id)
    }

    pub fn query(&self, key: QueryKey) -> Option<&Query> {
        self.queries.get(key)
    }

    /// Active query on the slot of `target`
    pub fn active_query(&self, target: u32) -> Option<QueryKey> {
        slot_for_target(target).and_then(|slot| self.active[slot])
    }

    pub fn begin_query(&mut self, key: QueryKey, driver: &mut dyn GraphicsDriver) -> Result<(), QueryError> {
        let target = self.queries.get(key).ok_or(QueryError::InvalidOperation)?.target;
        let slot = slot_for_target(target).ok_or(QueryError::InvalidEnum)?;
        if self.active[slot].is_some() {
            return Err(QueryError::InvalidOperation);
        }

        // Restarting a query still in flight retires the old round with 0
        self.remove_pending(key);

        let Some(query) = self.queries.get_mut(key) else {
            return Err(QueryError::InvalidOperation);
        };
        match &mut query.kind {
            QueryKind::AnySamples { service_id, driver_target, .. } => {
                driver.begin_query(*driver_target, *service_id);
            }
            QueryKind::CommandsIssued { begin_time } => *begin_time = Some(Instant::now()),
            QueryKind::Latency { end_time } => *end_time = None,
            QueryKind::GetError | QueryKind::AsyncPixelTransfers { .. } => {}
        }
        query.sync.reset();
        self.active[slot] = Some(key);
        Ok(())
    }

    /// End the active query on `target` and queue it as `submit_count`
    ///
    /// `take_error` yields the pending GL error for error queries.
    pub fn end_query<F>(
        &mut self,
        target: u32,
        submit_count: u32,
        driver: &mut dyn GraphicsDriver,
        transfers: &AsyncTransferManager,
        take_error: F,
    ) -> Result<(), QueryError>
    where
        F: FnOnce(&mut dyn GraphicsDriver) -> u32,
    {
        let slot = slot_for_target(target).ok_or(QueryError::InvalidEnum)?;
        let key = self.active[slot].ok_or(QueryError::InvalidOperation)?;
        let Some(query) = self.queries.get_mut(key) else {
            self.active[slot] = None;
            return Err(QueryError::InvalidOperation);
        };
        if query.target != target {
            return Err(QueryError::InvalidOperation);
        }
        self.active[slot] = None;
        query.submit_count = submit_count;
        query.state = QueryState::Pending;

        match &mut query.kind {
            QueryKind::AnySamples { driver_target, .. } => driver.end_query(*driver_target),
            QueryKind::CommandsIssued { begin_time } => {
                let elapsed = begin_time.take().map(|t| t.elapsed().as_micros()).unwrap_or(0);
                query.ready_result = Some(u64::try_from(elapsed).unwrap_or(u64::MAX));
            }
            QueryKind::Latency { end_time } => *end_time = Some(Instant::now()),
            QueryKind::GetError => query.ready_result = Some(u64::from(take_error(driver))),
            QueryKind::AsyncPixelTransfers { observer } => {
                let created = CompletionObserver::new();
                transfers.add_completion_observer(created.clone());
                *observer = Some(created);
            }
        }

        self.pending.push_back(key);
        Ok(())
    }

    /// Publish finished queries in the order they were ended
    ///
    /// Stops at the first query whose result is not available yet, even when
    /// later ones already finished. Returns the number of queries published.
    pub fn process_pending(&mut self, driver: &mut dyn GraphicsDriver) -> usize {
        let mut published = 0;
        while let Some(&key) = self.pending.front() {
            let Some(query) = self.queries.get_mut(key) else {
                self.pending.pop_front();
                continue;
            };
            let result = match &query.kind {
                QueryKind::AnySamples { service_id, convert_to_bool, .. } => {
                    if !driver.query_result_available(*service_id) {
                        break;
                    }
                    let count = driver.query_result(*service_id);
                    if *convert_to_bool { u64::from(count != 0) } else { count }
                }
                QueryKind::Latency { end_time } => end_time
                    .map(|t| u64::try_from(t.elapsed().as_micros()).unwrap_or(u64::MAX))
                    .unwrap_or(0),
                QueryKind::AsyncPixelTransfers { observer: Some(observer) } => match observer.result() {
                    Some(result) => result,
                    None => break,
                },
                _ => query.ready_result.unwrap_or(0),
            };
            if let QueryKind::AsyncPixelTransfers { observer } = &mut query.kind {
                *observer = None;
            }
            query.complete(result);
            self.pending.pop_front();
            published += 1;
        }
        published
    }

    pub fn have_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Complete a pending query with 0 and take it off the queue
    ///
    /// An outstanding worker observer is cancelled first.
    fn remove_pending(&mut self, key: QueryKey) {
        let Some(query) = self.queries.get_mut(key) else {
            return;
        };
        if !query.is_pending() {
            return;
        }
        query.cancel_observer();
        query.complete(0);
        self.pending.retain(|&k| k != key);
    }

    /// Delete the query named `client_id`
    ///
    /// A query still pending publishes 0 under its submit count first, so a
    /// client waiting on the record is released.
    pub fn remove_query(&mut self, client_id: u32, driver: Option<&mut dyn GraphicsDriver>) -> bool {
        let Some(key) = self.queries.lookup(client_id) else {
            return false;
        };
        self.remove_pending(key);
        for slot in self.active.iter_mut() {
            if *slot == Some(key) {
                *slot = None;
            }
        }
        if let Some(query) = self.queries.remove(client_id) {
            if let (QueryKind::AnySamples { service_id, .. }, Some(driver)) = (&query.kind, driver) {
                driver.delete_query(*service_id);
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Teardown: complete every pending query with 0 so no client waits
    /// forever, then drop all queries
    pub fn destroy(&mut self, mut driver: Option<&mut dyn GraphicsDriver>) {
        let pending: Vec<QueryKey> = self.pending.iter().copied().collect();
        for key in pending {
            self.remove_pending(key);
        }
        self.active = [None; SLOT_COUNT];
        for mut query in self.queries.drain() {
            query.cancel_observer();
            if let (QueryKind::AnySamples { service_id, .. }, Some(d)) = (&query.kind, driver.as_deref_mut()) {
                d.delete_query(*service_id);
            }
        }
    }
}

#[cfg(test)]
#[path = "query_manager_tests.rs"]
mod tests;
