/// Asynchronous pixel transfers
///
/// A worker thread stages pixel data out of client shared memory so the
/// client may reuse its transfer buffer as soon as the transfer completes.
/// Uploading the staged bytes into the texture stays on the decoder thread:
/// the worker never touches a driver or a manager.
///
/// Completion markers travel through the same FIFO channel as staging jobs,
/// so a marker fires only after every transfer queued before it.

use super::query_sync::CompletionObserver;
use crate::error::{Error, Result};
use crate::resource::TextureKey;
use crate::shared_memory::SharedMemoryRef;
use crossbeam_channel as channel;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::thread;

/// Texture level an async upload targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferParams {
    pub texture: TextureKey,
    pub target: u32,
    pub level: i32,
    pub internal_format: u32,
    pub width: i32,
    pub height: i32,
    pub format: u32,
    pub ty: u32,
}

/// A transfer whose bytes left shared memory and are ready to upload
#[derive(Debug)]
pub struct StagedTransfer {
    pub params: TransferParams,
    pub pixels: Vec<u8>,
}

enum WorkerMsg {
    Stage { id: u64, source: SharedMemoryRef },
    Marker(CompletionObserver),
    Shutdown,
}

struct Staged {
    id: u64,
    pixels: Vec<u8>,
}

pub struct AsyncTransferManager {
    tx: channel::Sender<WorkerMsg>,
    done_rx: channel::Receiver<Staged>,
    /// Submitted, not yet staged
    in_flight: FxHashMap<u64, TransferParams>,
    /// Staged, not yet uploaded
    ready: VecDeque<StagedTransfer>,
    next_id: u64,
    thread: Option<thread::JoinHandle<()>>,
}

impl AsyncTransferManager {
    /// Spawn the staging worker
    pub fn new() -> Result<Self> {
        let (tx, rx) = channel::unbounded::<WorkerMsg>();
        let (done_tx, done_rx) = channel::unbounded::<Staged>();
        let thread = thread::Builder::new()
            .name("GpuAsyncTransfer".to_string())
            .spawn(move || run_worker(rx, done_tx))
            .map_err(|e| Error::InitializationFailed(format!("async transfer worker: {}", e)))?;

        Ok(Self {
            tx,
            done_rx,
            in_flight: FxHashMap::default(),
            ready: VecDeque::new(),
            next_id: 1,
            thread: Some(thread),
        })
    }

    /// Queue `source` for staging into `params.texture`
    pub fn async_tex_image_2d(&mut self, params: TransferParams, source: SharedMemoryRef) -> bool {
        let id = self.next_id;
        self.next_id += 1;
        if self.tx.send(WorkerMsg::Stage { id, source }).is_err() {
            return false;
        }
        self.in_flight.insert(id, params);
        true
    }

    /// Complete `observer` once everything queued so far has been staged
    pub fn add_completion_observer(&self, observer: CompletionObserver) {
        if let Err(channel::SendError(WorkerMsg::Marker(observer))) =
            self.tx.send(WorkerMsg::Marker(observer))
        {
            // Worker gone, nothing is left in flight
            observer.complete(1);
        }
    }

    fn drain_channel(&mut self) {
        while let Ok(staged) = self.done_rx.try_recv() {
            self.accept(staged);
        }
    }

    fn accept(&mut self, staged: Staged) {
        if let Some(params) = self.in_flight.remove(&staged.id) {
            self.ready.push_back(StagedTransfer { params, pixels: staged.pixels });
        }
    }

    /// Take every staged transfer without blocking
    pub fn take_staged(&mut self) -> Vec<StagedTransfer> {
        self.drain_channel();
        self.ready.drain(..).collect()
    }

    /// Block until every transfer targeting `texture` is staged, then take
    /// them (in submission order)
    pub fn wait_for_texture(&mut self, texture: TextureKey) -> Vec<StagedTransfer> {
        while self.in_flight.values().any(|p| p.texture == texture) {
            match self.done_rx.recv() {
                Ok(staged) => self.accept(staged),
                Err(channel::RecvError) => {
                    self.in_flight.retain(|_, p| p.texture != texture);
                    break;
                }
            }
        }
        let (taken, kept): (Vec<_>, Vec<_>) =
            self.ready.drain(..).partition(|t| t.params.texture == texture);
        self.ready = kept.into();
        taken
    }

    /// Whether `texture` has a transfer not yet uploaded
    pub fn is_pending(&self, texture: TextureKey) -> bool {
        self.in_flight.values().any(|p| p.texture == texture)
            || self.ready.iter().any(|t| t.params.texture == texture)
    }

    /// Whether any transfer is in flight or waiting for upload
    pub fn has_pending(&self) -> bool {
        !self.in_flight.is_empty() || !self.ready.is_empty() || !self.done_rx.is_empty()
    }

    /// Forget transfers targeting `texture` (texture deleted)
    pub fn cancel_texture(&mut self, texture: TextureKey) {
        self.in_flight.retain(|_, p| p.texture != texture);
        self.ready.retain(|t| t.params.texture != texture);
    }
}

impl Drop for AsyncTransferManager {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.tx.send(WorkerMsg::Shutdown);
            let _ = thread.join();
        }
    }
}

fn run_worker(rx: channel::Receiver<WorkerMsg>, done_tx: channel::Sender<Staged>) {
    loop {
        let msg = match rx.recv() {
            Ok(msg) => msg,
            Err(channel::RecvError) => return,
        };
        match msg {
            WorkerMsg::Stage { id, source } => {
                let pixels = source.read_all();
                if done_tx.send(Staged { id, pixels }).is_err() {
                    return;
                }
            }
            WorkerMsg::Marker(observer) => {
                observer.complete(1);
            }
            WorkerMsg::Shutdown => return,
        }
    }
}

#[cfg(test)]
#[path = "async_transfer_tests.rs"]
mod tests;
