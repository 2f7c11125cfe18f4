//! Bounded buffer pool and block queue between a reader thread and its
//! counting worker. Both are backed by bounded `crossbeam-channel`s,
//! which already provide the blocking pop and the "completed" signal a
//! reader/worker pair needs: closing the sender is the signal, and a
//! blocked `recv` wakes with `Err` once the channel is disconnected and
//! drained.

use crossbeam_channel::{bounded, Receiver, Sender};

/// A block read from disk: the number of valid bytes is `buf.len()`; the
/// buffer's capacity is the pool's fixed chunk size so it can be recycled.
pub type Block = Vec<u8>;

/// Bounded free-list of reusable buffers, one pool per reader thread.
pub struct ChunkPool {
    free_tx: Sender<Block>,
    free_rx: Receiver<Block>,
}

impl ChunkPool {
    /// Creates a pool of `no_chunks` buffers, each pre-allocated to
    /// `chunk_size` bytes of capacity.
    pub fn new(no_chunks: usize, chunk_size: usize) -> Self {
        let (free_tx, free_rx) = bounded(no_chunks);
        for _ in 0..no_chunks {
            free_tx
                .send(Vec::with_capacity(chunk_size))
                .expect("pool channel has capacity for its own buffers");
        }
        ChunkPool { free_tx, free_rx }
    }

    /// Blocks until a buffer is available.
    pub fn acquire(&self) -> Block {
        self.free_rx
            .recv()
            .expect("chunk pool sender never disconnects while the pool is alive")
    }

    /// Returns a buffer to the pool for reuse.
    pub fn release(&self, mut buf: Block) {
        buf.clear();
        // Never blocks: the pool never holds more in-flight buffers than
        // its own capacity, so there is always room for the one we took.
        let _ = self.free_tx.send(buf);
    }
}

/// Bounded MPSC (here: SPSC) queue of blocks handed from one reader thread
/// to its counting worker.
pub struct BlockQueue {
    tx: Sender<Block>,
    rx: Receiver<Block>,
}

impl BlockQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        BlockQueue { tx, rx }
    }

    pub fn sender(&self) -> BlockQueueSender {
        BlockQueueSender { tx: self.tx.clone() }
    }

    pub fn receiver(&self) -> BlockQueueReceiver {
        BlockQueueReceiver { rx: self.rx.clone() }
    }
}

#[derive(Clone)]
pub struct BlockQueueSender {
    tx: Sender<Block>,
}

impl BlockQueueSender {
    /// Blocks until there is room. Panics only if every receiver has
    /// already been dropped, which cannot happen while the worker is
    /// still running its claimed-file loop.
    pub fn push(&self, block: Block) {
        self.tx
            .send(block)
            .expect("block queue receiver outlives its reader thread");
    }
}

#[derive(Clone)]
pub struct BlockQueueReceiver {
    rx: Receiver<Block>,
}

impl BlockQueueReceiver {
    /// Blocks for the next block; returns `None` once the reader has
    /// finished and the queue has been drained (the `completed` signal).
    pub fn pop(&self) -> Option<Block> {
        self.rx.recv().ok()
    }
}
