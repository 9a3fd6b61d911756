//! Event queue implementation for active objects

use core::convert::Infallible;

use heapless::Deque;
use rkh_core::{EventRef, RkhError, RkhResult};

/// Bounded event queue
///
/// Stores event references in arrival order; `put_lifo` jumps the line.
/// The queue itself does no locking and no reference counting, both are
/// the owner's business.
pub struct EventQueue<const N: usize> {
    queue: Deque<EventRef, N>,
    min_free: usize,
}

impl<const N: usize> EventQueue<N> {
    /// Create a new empty event queue
    pub const fn new() -> Self {
        Self {
            queue: Deque::new(),
            min_free: N,
        }
    }

    /// Append an event at the back of the queue
    pub fn put_fifo(&mut self, event: EventRef) -> RkhResult<()> {
        self.queue
            .push_back(event)
            .map_err(|_| RkhError::QueueFull)?;
        self.track();
        Ok(())
    }

    /// Insert an event at the front of the queue
    pub fn put_lifo(&mut self, event: EventRef) -> RkhResult<()> {
        self.queue
            .push_front(event)
            .map_err(|_| RkhError::QueueFull)?;
        self.track();
        Ok(())
    }

    /// Take the event at the head of the queue
    pub fn get(&mut self) -> nb::Result<EventRef, Infallible> {
        self.queue.pop_front().ok_or(nb::Error::WouldBlock)
    }

    /// Look at the head without removing it
    pub fn peek(&self) -> Option<EventRef> {
        self.queue.front().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }

    /// Number of queued events
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Maximum number of queued events
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Fewest free slots ever observed since creation
    pub fn min_free(&self) -> usize {
        self.min_free
    }

    /// Drop every queued event. Reference counts are not touched.
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    fn track(&mut self) {
        let free = N - self.queue.len();
        if free < self.min_free {
            self.min_free = free;
        }
    }
}

impl<const N: usize> Default for EventQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}
