//! FIFO holding area for events observed while nobody was polling for them

use fedichess_core::Message;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Thread-safe, unbounded, order-preserving event queue
#[derive(Debug, Default)]
pub struct EventQueue {
    inner: Mutex<VecDeque<Message>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    // Poisoning is ignored: no operation leaves the deque half-updated.
    fn lock(&self) -> MutexGuard<'_, VecDeque<Message>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append to the tail
    pub fn push(&self, msg: Message) {
        self.lock().push_back(msg);
    }

    /// Remove the head, never blocking on an empty queue
    pub fn try_pop(&self) -> Option<Message> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop everything queued, returning how many events were discarded
    pub fn clear(&self) -> usize {
        let mut queue = self.lock();
        let n = queue.len();
        queue.clear();
        n
    }
}
