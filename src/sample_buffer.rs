//! Sample Buffer
//!
//! Single-slot blocking handoff of fixed-length sample blocks from a capture
//! producer to the pitch-detector consumer, with cooperative cancellation so
//! shutdown never leaves either side blocked.

use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors returned by [`SampleBuffer`].
#[derive(Debug, Error)]
pub enum BufferError {
    /// A block did not match the buffer's configured length.
    #[error("expected block of length {expected}, got {got}")]
    InvalidLength {
        /// The block length the buffer was configured for.
        expected: usize,
        /// The actual length of the received block.
        got: usize,
    },

    /// The wait was interrupted by cancellation.
    #[error("buffer operation interrupted by cancellation")]
    Cancelled,
}

/// Cooperative stop signal shared by the capture and detector tasks.
///
/// Cloning is cheap and every clone observes the same state. `cancel` is
/// sticky: once set it stays set, and every task blocked in
/// [`SampleBuffer::insert`] or [`SampleBuffer::remove`] wakes up with
/// [`BufferError::Cancelled`].
#[derive(Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    keeper: Arc<Mutex<Option<Sender<()>>>>,
    signal: Receiver<()>,
}

impl CancellationToken {
    /// Create a token in the not-cancelled state.
    pub fn new() -> Self {
        // Nothing is ever sent on this channel; dropping the sender
        // disconnects it, which wakes every select waiting on `signal`.
        let (tx, rx) = bounded::<()>(0);
        CancellationToken {
            cancelled: Arc::new(AtomicBool::new(false)),
            keeper: Arc::new(Mutex::new(Some(tx))),
            signal: rx,
        }
    }

    /// Request cancellation and wake all blocked buffer operations.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.keeper.lock().unwrap().take();
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn signal(&self) -> &Receiver<()> {
        &self.signal
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Single-slot blocking handoff queue for fixed-length sample blocks.
///
/// At most one block is pending at any instant: `insert` blocks while a
/// previous block has not been consumed, `remove` blocks while no block is
/// pending. With one producer and one consumer every inserted block is
/// delivered exactly once, in insertion order. Both operations can be shared
/// across threads by reference.
pub struct SampleBuffer {
    tx: Sender<Vec<f32>>,
    rx: Receiver<Vec<f32>>,
    token: CancellationToken,
    block_len: usize,
}

impl SampleBuffer {
    /// Create a buffer for blocks of exactly `block_len` samples.
    ///
    /// The `token` interrupts blocked `insert`/`remove` calls when cancelled.
    pub fn new(block_len: usize, token: CancellationToken) -> Self {
        let (tx, rx) = bounded(1);
        SampleBuffer {
            tx,
            rx,
            token,
            block_len,
        }
    }

    /// The block length this buffer accepts.
    pub fn block_len(&self) -> usize {
        self.block_len
    }

    /// Store a copy of `block`, blocking while a previous block is pending.
    ///
    /// Returns [`BufferError::InvalidLength`] without blocking when the block
    /// has the wrong length, and [`BufferError::Cancelled`] when the token is
    /// cancelled before the block could be handed off.
    pub fn insert(&self, block: &[f32]) -> Result<(), BufferError> {
        if block.len() != self.block_len {
            return Err(BufferError::InvalidLength {
                expected: self.block_len,
                got: block.len(),
            });
        }
        if self.token.is_cancelled() {
            return Err(BufferError::Cancelled);
        }

        let copy = block.to_vec();
        crossbeam_channel::select! {
            send(self.tx, copy) -> res => res.map_err(|_| BufferError::Cancelled),
            recv(self.token.signal()) -> _ => Err(BufferError::Cancelled),
        }
    }

    /// Take the pending block, blocking while the buffer is empty.
    ///
    /// A block handed off before cancellation is still delivered; once the
    /// buffer is empty and the token cancelled, returns
    /// [`BufferError::Cancelled`].
    pub fn remove(&self) -> Result<Vec<f32>, BufferError> {
        if let Ok(block) = self.rx.try_recv() {
            return Ok(block);
        }

        crossbeam_channel::select! {
            recv(self.rx) -> res => res.map_err(|_| BufferError::Cancelled),
            recv(self.token.signal()) -> _ => {
                // Drain a block that raced with the cancellation.
                self.rx.try_recv().map_err(|_| BufferError::Cancelled)
            }
        }
    }
}
