//! Blocking FIFO queue
//!
//! Backs both the per-bank inbound queues (bounded, the system's only
//! backpressure) and the output channel of balance snapshots (unbounded).
//!
//! # Critical Invariants
//!
//! 1. `len() <= capacity()` at all times; `put` waits for room instead.
//! 2. Items leave in the order they were inserted.
//! 3. Every wait observes a [`CancellationToken`]; a cancelled `put` drops
//!    its item.
//!
//! Besides the items themselves the queue counts *unfinished* work: `put`
//! increments it and consumers call [`BlockingQueue::task_done`] once an item
//! has been fully handled, which lets [`BlockingQueue::join`] wait for a
//! queue to drain all the way through its workers.

use crate::core::cancel::{CancellationToken, POLL_INTERVAL};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum QueueError {
    #[error("Queue wait cancelled")]
    Cancelled,
}

#[derive(Debug)]
struct Inner<T> {
    items: VecDeque<T>,
    unfinished: usize,
}

/// Mutex + condvar FIFO with optional capacity
///
/// # Example
/// ```
/// use bank_sim_core::{BlockingQueue, CancellationToken};
///
/// let token = CancellationToken::new();
/// let queue = BlockingQueue::bounded(2);
/// queue.put(1, &token).unwrap();
/// queue.put(2, &token).unwrap();
/// assert_eq!(queue.len(), 2);
/// assert_eq!(queue.take(&token).unwrap(), 1);
/// ```
#[derive(Debug)]
pub struct BlockingQueue<T> {
    inner: Mutex<Inner<T>>,
    capacity: Option<usize>,
    not_empty: Condvar,
    not_full: Condvar,
    all_done: Condvar,
}

impl<T> BlockingQueue<T> {
    /// Queue holding at most `capacity` items
    ///
    /// # Panics
    /// Panics if capacity is zero
    pub fn bounded(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be positive");
        Self::with_capacity(Some(capacity))
    }

    /// Queue without a size limit
    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                unfinished: 0,
            }),
            capacity,
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            all_done: Condvar::new(),
        }
    }

    /// Maximum number of items, `None` if unbounded
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    fn is_full(&self, inner: &Inner<T>) -> bool {
        self.capacity
            .is_some_and(|capacity| inner.items.len() >= capacity)
    }

    /// Append `item`, waiting while the queue is full
    pub fn put(&self, item: T, token: &CancellationToken) -> Result<(), QueueError> {
        let mut inner = self.inner.lock();
        while self.is_full(&inner) {
            if token.is_cancelled() {
                return Err(QueueError::Cancelled);
            }
            self.not_full.wait_for(&mut inner, POLL_INTERVAL);
        }
        inner.items.push_back(item);
        inner.unfinished += 1;
        drop(inner);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Append `item` if there is room, handing it back otherwise
    pub fn try_put(&self, item: T) -> Result<(), T> {
        let mut inner = self.inner.lock();
        if self.is_full(&inner) {
            return Err(item);
        }
        inner.items.push_back(item);
        inner.unfinished += 1;
        drop(inner);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Remove the oldest item, waiting while the queue is empty
    pub fn take(&self, token: &CancellationToken) -> Result<T, QueueError> {
        let mut inner = self.inner.lock();
        loop {
            if let Some(item) = inner.items.pop_front() {
                drop(inner);
                self.not_full.notify_one();
                return Ok(item);
            }
            if token.is_cancelled() {
                return Err(QueueError::Cancelled);
            }
            self.not_empty.wait_for(&mut inner, POLL_INTERVAL);
        }
    }

    /// Remove the oldest item if there is one
    pub fn try_take(&self) -> Option<T> {
        let item = self.inner.lock().items.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Mark one previously taken item as fully handled
    pub fn task_done(&self) {
        let mut inner = self.inner.lock();
        inner.unfinished = inner.unfinished.saturating_sub(1);
        if inner.unfinished == 0 {
            self.all_done.notify_all();
        }
    }

    /// Items put but not yet marked done (queued or in flight)
    pub fn unfinished(&self) -> usize {
        self.inner.lock().unfinished
    }

    /// Wait until every item put so far has been marked done
    ///
    /// Returns `false` on timeout.
    pub fn join(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        while inner.unfinished > 0 {
            if self.all_done.wait_until(&mut inner, deadline).timed_out() {
                return inner.unfinished == 0;
            }
        }
        true
    }
}

impl<T: Clone> BlockingQueue<T> {
    /// Copy of the current contents, oldest first
    pub fn snapshot(&self) -> Vec<T> {
        self.inner.lock().items.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_put_respects_capacity() {
        let queue = BlockingQueue::bounded(1);
        assert!(queue.try_put("a").is_ok());
        assert_eq!(queue.try_put("b"), Err("b"));
    }

    #[test]
    fn test_cancelled_put_gives_up() {
        let token = CancellationToken::new();
        let queue = BlockingQueue::bounded(1);
        queue.put(1, &token).unwrap();
        token.cancel();
        assert_eq!(queue.put(2, &token), Err(QueueError::Cancelled));
    }

    #[test]
    fn test_join_waits_for_task_done() {
        let token = CancellationToken::new();
        let queue = BlockingQueue::unbounded();
        queue.put(5, &token).unwrap();
        assert!(!queue.join(Duration::from_millis(10)));

        queue.take(&token).unwrap();
        queue.task_done();
        assert!(queue.join(Duration::from_millis(10)));
    }
}
