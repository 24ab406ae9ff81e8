//! Shared request queue with de-duplication.
//!
//! The queue holds tile requests not yet picked up by a worker; the queued
//! set holds every key that is either waiting in the queue or being fetched.
//! Both live behind one lock so a flush clears them together.

use std::collections::{HashSet, VecDeque};

use tokio::sync::{Mutex, Notify};

use crate::tile::TileKey;

#[derive(Default)]
struct QueueState {
    /// Requests waiting for a worker, oldest first
    pending: VecDeque<TileKey>,
    /// Keys waiting or in flight
    queued: HashSet<TileKey>,
}

/// Blocking multi-consumer queue of tile requests.
#[derive(Default)]
pub struct RequestQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a request unless the key is already queued or in flight.
    ///
    /// Returns `true` if a new request was queued.
    pub async fn enqueue(&self, key: TileKey) -> bool {
        {
            let mut state = self.state.lock().await;
            if !state.queued.insert(key) {
                return false;
            }
            state.pending.push_back(key);
        }
        self.notify.notify_one();
        true
    }

    /// Wait for the next request.
    ///
    /// The key stays in the queued set until [`complete`](Self::complete) or
    /// [`flush`](Self::flush) removes it.
    pub async fn next(&self) -> TileKey {
        loop {
            {
                let mut state = self.state.lock().await;
                if let Some(key) = state.pending.pop_front() {
                    if !state.pending.is_empty() {
                        // Wake another worker for the remaining work
                        self.notify.notify_one();
                    }
                    return key;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Forget a delivered request. Tolerates keys already flushed.
    pub async fn complete(&self, key: &TileKey) -> bool {
        let mut state = self.state.lock().await;
        state.queued.remove(key)
    }

    /// Drop every request not yet taken by a worker and clear the queued set.
    ///
    /// Requests already being fetched are not cancelled; only their
    /// bookkeeping is cleared. Returns the number of requests dropped from
    /// the queue.
    pub async fn flush(&self) -> usize {
        let mut state = self.state.lock().await;
        let dropped = state.pending.len();
        state.pending.clear();
        state.queued.clear();
        dropped
    }

    /// Whether a key is queued or in flight.
    pub async fn is_queued(&self, key: &TileKey) -> bool {
        let state = self.state.lock().await;
        state.queued.contains(key)
    }

    /// Number of requests waiting for a worker.
    pub async fn pending_len(&self) -> usize {
        let state = self.state.lock().await;
        state.pending.len()
    }

    /// Number of keys queued or in flight.
    pub async fn queued_len(&self) -> usize {
        let state = self.state.lock().await;
        state.queued.len()
    }
}
