use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use crate::block::Block;
use crate::compression::Compressor;
use crate::error::SquashError;
use crate::types::Result;

use super::stage;

/// A block that has passed through the stage, plus the stage's outcome.
pub(crate) struct Completion {
    pub block: Block,
    pub status: Result<()>,
}

/// The admission/completion contract shared by the serial and threaded
/// back-ends.
///
/// `submit` assigns the sequence number; completions come back via
/// `pop_ready` strictly in sequence order, with the back-end holding any
/// out-of-order stragglers. The two implementations are deliberately
/// separate rather than one implementation with thread-count guards.
pub(crate) trait Dispatch: Send {
    /// Admits a block, blocking while the backlog is at its limit.
    /// Returns the latched pipeline error instead of admitting once one
    /// is set.
    fn submit(&mut self, block: Block) -> Result<()>;

    /// The next in-sequence completion, if it has been filed.
    fn pop_ready(&mut self) -> Option<Completion>;

    /// Waits until no admitted block is still being processed, then returns
    /// the latched status.
    fn flush(&mut self) -> Result<()>;

    /// The latched pipeline status.
    fn status(&self) -> Result<()>;
}

/// Inline back-end used when the processor runs without worker threads.
pub(crate) struct SerialDispatch {
    codec: Box<dyn Compressor>,
    scratch: Vec<u8>,
    done: VecDeque<Completion>,
    next_seq: u64,
    latched: Option<SquashError>,
}

impl SerialDispatch {
    pub(crate) fn new(codec: Box<dyn Compressor>, block_size: usize) -> Self {
        Self {
            codec,
            scratch: vec![0u8; block_size],
            done: VecDeque::new(),
            next_seq: 0,
            latched: None,
        }
    }
}

impl Dispatch for SerialDispatch {
    fn submit(&mut self, mut block: Block) -> Result<()> {
        if let Some(err) = &self.latched {
            return Err(err.clone());
        }

        block.sequence = self.next_seq;
        self.next_seq += 1;

        let status = stage::process_block(&mut block, self.codec.as_mut(), &mut self.scratch);
        if let Err(err) = &status {
            self.latched = Some(err.clone());
        }
        self.done.push_back(Completion { block, status });
        Ok(())
    }

    fn pop_ready(&mut self) -> Option<Completion> {
        self.done.pop_front()
    }

    fn flush(&mut self) -> Result<()> {
        self.status()
    }

    fn status(&self) -> Result<()> {
        match &self.latched {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

struct QueueInner {
    queue: VecDeque<Block>,
    done: BTreeMap<u64, Completion>,
    backlog: usize,
    in_flight: usize,
    next_seq: u64,
    latched: Option<SquashError>,
    shutdown: bool,
}

struct SharedQueue {
    inner: Mutex<QueueInner>,
    has_work: Condvar,
    not_full: Condvar,
    max_backlog: usize,
}

impl SharedQueue {
    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        // Nothing panics inside the critical sections.
        self.inner.lock().expect("block pipeline lock poisoned")
    }
}

/// Worker-pool back-end.
///
/// One mutex protects the work queue, the completion map, the backlog
/// counter, the sequence counter and the latched status; `has_work` wakes
/// workers, `not_full` wakes the producer (both `submit` and `flush` wait on
/// it). Workers run the stage with the lock released.
pub(crate) struct ThreadedDispatch {
    shared: Arc<SharedQueue>,
    workers: Vec<JoinHandle<()>>,
    next_done: u64,
}

impl ThreadedDispatch {
    pub(crate) fn new(
        num_workers: usize,
        max_backlog: usize,
        block_size: usize,
        codec: &dyn Compressor,
    ) -> Result<Self> {
        let shared = Arc::new(SharedQueue {
            inner: Mutex::new(QueueInner {
                queue: VecDeque::new(),
                done: BTreeMap::new(),
                backlog: 0,
                in_flight: 0,
                next_seq: 0,
                latched: None,
                shutdown: false,
            }),
            has_work: Condvar::new(),
            not_full: Condvar::new(),
            max_backlog: max_backlog.max(1),
        });

        let mut workers = Vec::with_capacity(num_workers);
        for id in 0..num_workers {
            let worker_shared = Arc::clone(&shared);
            let worker_codec = codec.deep_copy();
            let handle = thread::Builder::new()
                .name(format!("squashpack-worker-{id}"))
                .spawn(move || run_worker(id, worker_shared, worker_codec, block_size));
            match handle {
                Ok(handle) => workers.push(handle),
                Err(err) => {
                    shared.lock().shutdown = true;
                    shared.has_work.notify_all();
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(SquashError::from(err));
                }
            }
        }

        Ok(Self {
            shared,
            workers,
            next_done: 0,
        })
    }
}

impl Dispatch for ThreadedDispatch {
    fn submit(&mut self, mut block: Block) -> Result<()> {
        let mut inner = self.shared.lock();
        while inner.backlog >= self.shared.max_backlog && inner.latched.is_none() {
            inner = self
                .shared
                .not_full
                .wait(inner)
                .expect("block pipeline lock poisoned");
        }
        if let Some(err) = &inner.latched {
            return Err(err.clone());
        }

        block.sequence = inner.next_seq;
        inner.next_seq += 1;
        inner.queue.push_back(block);
        inner.backlog += 1;
        self.shared.has_work.notify_one();
        Ok(())
    }

    fn pop_ready(&mut self) -> Option<Completion> {
        let mut inner = self.shared.lock();
        let next = self.next_done;
        match inner.done.first_entry() {
            Some(entry) if *entry.key() == next => {
                self.next_done += 1;
                Some(entry.remove())
            }
            _ => None,
        }
    }

    fn flush(&mut self) -> Result<()> {
        let mut inner = self.shared.lock();
        while inner.in_flight > 0 || (inner.backlog > 0 && inner.latched.is_none()) {
            inner = self
                .shared
                .not_full
                .wait(inner)
                .expect("block pipeline lock poisoned");
        }
        match &inner.latched {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn status(&self) -> Result<()> {
        match &self.shared.lock().latched {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

impl Drop for ThreadedDispatch {
    fn drop(&mut self) {
        {
            let mut inner = self.shared.lock();
            inner.shutdown = true;
        }
        self.shared.has_work.notify_all();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::warn!("block worker panicked during shutdown");
            }
        }
    }
}

fn run_worker(
    id: usize,
    shared: Arc<SharedQueue>,
    mut codec: Box<dyn Compressor>,
    block_size: usize,
) {
    tracing::debug!(worker = id, "block worker started");
    let mut scratch = vec![0u8; block_size];

    loop {
        let mut block = {
            let mut inner = shared.lock();
            loop {
                // A latched error stops the line: blocks still queued are
                // abandoned and the front end surfaces the error.
                if inner.latched.is_some() || (inner.shutdown && inner.queue.is_empty()) {
                    tracing::debug!(worker = id, "block worker exiting");
                    return;
                }
                if let Some(block) = inner.queue.pop_front() {
                    inner.in_flight += 1;
                    break block;
                }
                inner = shared
                    .has_work
                    .wait(inner)
                    .expect("block pipeline lock poisoned");
            }
        };

        let status = stage::process_block(&mut block, codec.as_mut(), &mut scratch);

        let mut inner = shared.lock();
        if let Err(err) = &status {
            if inner.latched.is_none() {
                tracing::warn!(
                    worker = id,
                    sequence = block.sequence,
                    error = %err,
                    "latching pipeline error"
                );
                inner.latched = Some(err.clone());
            }
        }
        inner.done.insert(block.sequence, Completion { block, status });
        inner.in_flight -= 1;
        inner.backlog -= 1;
        shared.not_full.notify_one();
    }
}
