use crossbeam::queue::ArrayQueue;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// A bounded FIFO that never blocks producers.
///
/// Backed by crossbeam's lock-free `ArrayQueue`. A push beyond capacity is
/// rejected and the item handed back; consumers may wait for an item with
/// [`pop_timeout`](Self::pop_timeout) or [`pop_blocking`](Self::pop_blocking).
/// Once closed, every push is rejected and waiting consumers wake up.
#[derive(Debug)]
pub struct StageBuffer<T> {
    queue: ArrayQueue<T>,
    /// Guards the sleep/wake handshake only, never the items
    lock: Mutex<()>,
    available: Condvar,
    closed: AtomicBool,
}

impl<T> StageBuffer<T> {
    /// Create an open buffer holding at most `capacity` items
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity),
            lock: Mutex::new(()),
            available: Condvar::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Non-blocking bounded enqueue.
    ///
    /// Returns the item if the buffer is full or closed.
    pub fn try_push(&self, item: T) -> Result<(), T> {
        if self.is_closed() {
            return Err(item);
        }
        self.queue.push(item)?;
        let _guard = self.lock.lock();
        self.available.notify_one();
        Ok(())
    }

    /// Take the oldest item without waiting
    pub fn pop(&self) -> Option<T> {
        self.queue.pop()
    }

    /// Wait up to `timeout` for an item.
    ///
    /// Returns `None` on timeout, or immediately once the buffer is closed
    /// and empty.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut guard = self.lock.lock();
        loop {
            if let Some(item) = self.queue.pop() {
                return Some(item);
            }
            if self.is_closed() {
                return None;
            }
            if self.available.wait_until(&mut guard, deadline).timed_out() {
                return self.queue.pop();
            }
        }
    }

    /// Wait until an item arrives or the buffer is closed and drained
    pub fn pop_blocking(&self) -> Option<T> {
        let mut guard = self.lock.lock();
        loop {
            if let Some(item) = self.queue.pop() {
                return Some(item);
            }
            if self.is_closed() {
                return None;
            }
            self.available.wait(&mut guard);
        }
    }

    /// Stop accepting items and wake every waiting consumer.
    ///
    /// Items already buffered can still be popped. Returns `false` if the
    /// buffer was already closed.
    pub fn close(&self) -> bool {
        let _guard = self.lock.lock();
        let first = !self.closed.swap(true, Ordering::AcqRel);
        self.available.notify_all();
        first
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Current occupancy; may be stale by the time the caller reads it
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Get the capacity of the buffer
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}
