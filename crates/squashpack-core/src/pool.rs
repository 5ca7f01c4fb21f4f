use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};

use crate::block::Block;

/// A pool of reusable [`Block`]s to reduce allocation churn.
///
/// The pool keeps up to `max_blocks` recycled blocks in a bounded channel.
/// `acquire` hands out a recycled block if one is available and allocates a
/// fresh one otherwise; `recycle` returns a block after the assembler is done
/// with it. Blocks come back cleared: empty payload, zero flags, checksum,
/// index and sequence.
///
/// The pool places no cap on how many blocks exist at once; the pipeline
/// backlog is bounded by the dispatch layer.
#[derive(Debug)]
pub struct BlockPool {
    recycler: Sender<Block>,
    receiver: Receiver<Block>,
    block_size: usize,
    max_blocks: usize,
    metrics: PoolMetricsInner,
}

impl BlockPool {
    /// Creates a pool handing out blocks with `block_size` capacity, keeping
    /// at most `max_blocks` recycled ones.
    pub fn new(block_size: usize, max_blocks: usize) -> Self {
        let (tx, rx) = bounded(max_blocks.max(1));
        Self {
            recycler: tx,
            receiver: rx,
            block_size,
            max_blocks,
            metrics: PoolMetricsInner::default(),
        }
    }

    /// Returns a cleared block, recycled if possible.
    pub fn acquire(&self) -> Block {
        match self.receiver.try_recv() {
            Ok(mut block) => {
                block.reset();
                self.metrics.recycled.fetch_add(1, Ordering::Relaxed);
                block
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {
                self.metrics.created.fetch_add(1, Ordering::Relaxed);
                Block::with_capacity(self.block_size)
            }
        }
    }

    /// Returns a block to the pool. Dropped on the floor if the pool is full.
    pub fn recycle(&self, mut block: Block) {
        block.reset();
        if let Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) =
            self.recycler.try_send(block)
        {
            self.metrics.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Snapshot of the pool counters.
    pub fn metrics(&self) -> PoolMetricsSnapshot {
        PoolMetricsSnapshot {
            created: self.metrics.created.load(Ordering::Relaxed),
            recycled: self.metrics.recycled.load(Ordering::Relaxed),
            dropped: self.metrics.dropped.load(Ordering::Relaxed),
        }
    }

    /// Capacity of the blocks this pool hands out.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Maximum number of recycled blocks retained.
    pub fn max_blocks(&self) -> usize {
        self.max_blocks
    }
}

/// A snapshot of block pool counters at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolMetricsSnapshot {
    /// Blocks allocated fresh from the heap.
    pub created: usize,
    /// Blocks successfully handed out again after recycling.
    pub recycled: usize,
    /// Blocks dropped because the pool was full.
    pub dropped: usize,
}

#[derive(Debug, Default)]
struct PoolMetricsInner {
    created: AtomicUsize,
    recycled: AtomicUsize,
    dropped: AtomicUsize,
}
