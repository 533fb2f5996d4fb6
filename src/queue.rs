//! Bounded handoff queue between the acceptor and the worker pool.
//!
//! All shared state (pending items + shutdown flag) lives under one mutex;
//! enqueue and dequeue suspend on condition variables rather than spinning.
//! Steady-state handoff wakes at most one complementary waiter (`notify_one`);
//! shutdown is the only broadcast, because it changes every waiter's
//! continuation condition at once.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard};

use crate::metrics;

/// Error returned by [`HandoffQueue::push`] once shutdown has begun.
///
/// Carries the item back: ownership was never transferred, so the caller is
/// responsible for closing/releasing it.
pub struct Rejected<T>(pub T);

impl<T> Rejected<T> {
    /// Recover the item that was not enqueued.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for Rejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Rejected(..)")
    }
}

impl<T> fmt::Display for Rejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("queue is shut down")
    }
}

impl<T> std::error::Error for Rejected<T> {}

struct Inner<T> {
    items: VecDeque<T>,
    shutdown: bool,
}

/// Fixed-capacity synchronized queue with blocking push/pop and a one-way
/// shutdown transition.
///
/// A full queue blocks producers (backpressure on the acceptor), an empty
/// queue blocks consumers. [`shutdown`](HandoffQueue::shutdown) rejects all
/// further pushes while letting consumers drain items already enqueued; only
/// an empty, shut-down queue reports end-of-work from `pop`.
///
/// No mutex-holding path runs user code, so lock poisoning would mean a bug
/// inside the queue itself; operations treat it as a fatal invariant
/// violation.
pub struct HandoffQueue<T> {
    capacity: usize,
    inner: Mutex<Inner<T>>,
    /// Producers wait here while the queue is full.
    not_full: Condvar,
    /// Consumers wait here while the queue is empty.
    not_empty: Condvar,
}

impl<T> HandoffQueue<T> {
    /// Create an empty queue holding at most `capacity` items.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be at least 1");
        Self {
            capacity,
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity),
                shutdown: false,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        }
    }

    /// Insert `item`, blocking while the queue is full.
    ///
    /// Returns `Err(Rejected(item))` without inserting if shutdown has begun,
    /// whether observed on entry (non-blocking, even when full) or after
    /// waking from a capacity wait.
    pub fn push(&self, item: T) -> Result<(), Rejected<T>> {
        let mut inner = self.lock();
        if inner.shutdown {
            return Err(Rejected(item));
        }
        while inner.items.len() == self.capacity && !inner.shutdown {
            metrics::inc_push_full_waits();
            inner = self
                .not_full
                .wait(inner)
                .expect("handoff queue mutex poisoned");
        }
        if inner.shutdown {
            return Err(Rejected(item));
        }
        inner.items.push_back(item);
        metrics::inc_enqueued();
        metrics::update_queue_depth(inner.items.len());
        self.not_empty.notify_one();
        Ok(())
    }

    /// Remove one item in insertion order, blocking while the queue is empty.
    ///
    /// Returns `None` only once the queue is both shut down and empty; items
    /// resident at shutdown are still handed out first.
    pub fn pop(&self) -> Option<T> {
        let mut inner = self.lock();
        while inner.items.is_empty() && !inner.shutdown {
            metrics::inc_pop_empty_waits();
            inner = self
                .not_empty
                .wait(inner)
                .expect("handoff queue mutex poisoned");
        }
        let item = inner.items.pop_front()?;
        metrics::inc_dequeued();
        metrics::update_queue_depth(inner.items.len());
        self.not_full.notify_one();
        Some(item)
    }

    /// Begin shutdown: reject all future pushes and wake every blocked
    /// waiter. Idempotent; never blocks on anything but the state lock.
    pub fn shutdown(&self) {
        let mut inner = self.lock();
        if inner.shutdown {
            return;
        }
        inner.shutdown = true;
        drop(inner);
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    /// Number of items currently pending.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_shutdown(&self) -> bool {
        self.lock().shutdown
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().expect("handoff queue mutex poisoned")
    }
}
