// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Producer → translate-thread handoff of bitcode chunks.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

/// Result of [`ChunkQueue::pop_blocking`].
#[derive(Debug, PartialEq, Eq)]
pub enum ChunkPop {
    Chunk(Vec<u8>),
    /// The queue is done and fully drained.
    Finished,
}

#[derive(Debug, Default)]
struct QueueState {
    chunks: VecDeque<Vec<u8>>,
    done: bool,
}

/// FIFO of byte chunks plus an end-of-stream flag.
///
/// One producer pushes, one consumer pops. The queue never applies
/// backpressure; the producer paces itself.
#[derive(Debug, Default)]
pub struct ChunkQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl ChunkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and wake the consumer.
    ///
    /// Returns `false` (and drops the chunk) if the queue is already done.
    pub fn push(&self, chunk: Vec<u8>) -> bool {
        let mut state = self.state.lock();
        if state.done {
            tracing::warn!(
                "Dropping {} byte chunk pushed after end of stream",
                chunk.len()
            );
            return false;
        }
        state.chunks.push_back(chunk);
        self.available.notify_one();
        true
    }

    /// Signal end of stream.
    ///
    /// Returns `false` if the queue was already done; the second call is a no-op.
    pub fn mark_done(&self) -> bool {
        let mut state = self.state.lock();
        if state.done {
            tracing::debug!("End of stream signalled twice, ignoring");
            return false;
        }
        state.done = true;
        self.available.notify_all();
        true
    }

    /// Block until a chunk is available or the queue is done and empty.
    ///
    /// Chunks queued before [`mark_done`](Self::mark_done) are still returned
    /// before [`ChunkPop::Finished`].
    pub fn pop_blocking(&self) -> ChunkPop {
        let mut state = self.state.lock();
        loop {
            if let Some(chunk) = state.chunks.pop_front() {
                return ChunkPop::Chunk(chunk);
            }
            if state.done {
                return ChunkPop::Finished;
            }
            self.available.wait(&mut state);
        }
    }

    /// Mark done, discard everything buffered and wake all waiters.
    ///
    /// Returns the number of discarded chunks.
    pub fn abort(&self) -> usize {
        let mut state = self.state.lock();
        let discarded = state.chunks.len();
        state.chunks.clear();
        state.done = true;
        self.available.notify_all();
        discarded
    }

    /// Return to the empty, not-done state for a new translation.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.chunks.clear();
        state.done = false;
    }

    pub fn len(&self) -> usize {
        self.state.lock().chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().chunks.is_empty()
    }

    pub fn is_done(&self) -> bool {
        self.state.lock().done
    }
}
