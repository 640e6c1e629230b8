//! Bounded in-memory store of decoded events.

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use chainwatch_abi::DecodedEvent;

/// Ring buffer of the most recent decoded events, oldest first.
///
/// Appends take the write lock, snapshots the read lock. Neither is ever
/// held across an `.await`.
#[derive(Debug)]
pub struct EventStore {
    capacity: usize,
    events: RwLock<VecDeque<DecodedEvent>>,
    latest_block: AtomicU64,
}

impl EventStore {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            capacity: capacity.get(),
            events: RwLock::new(VecDeque::with_capacity(capacity.get())),
            latest_block: AtomicU64::new(0),
        }
    }

    /// Append one event, evicting the oldest when full.
    pub fn append(&self, event: DecodedEvent) {
        self.latest_block.fetch_max(event.block_number, Ordering::Relaxed);
        let mut events = self.events.write().unwrap_or_else(PoisonError::into_inner);
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// Copy of the buffered events, oldest first. Later appends do not
    /// affect a snapshot already taken.
    pub fn snapshot(&self) -> Vec<DecodedEvent> {
        let events = self.events.read().unwrap_or_else(PoisonError::into_inner);
        events.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Highest block number of any event appended so far (0 if none).
    pub fn latest_block(&self) -> u64 {
        self.latest_block.load(Ordering::Relaxed)
    }
}
