//! Deferred events
//!
//! A state that cannot handle an event yet parks it in a [`DeferQueue`]
//! and later recalls it, at which point it goes to the front of an active
//! object's queue.

use core::cell::RefCell;

use critical_section::Mutex;
use rkh_core::{EventRef, RkhResult, TraceRecord, Tracer};

use crate::{EventQueue, Runnable};

/// Queue of deferred events, holding one reference on each
pub struct DeferQueue<const N: usize> {
    queue: Mutex<RefCell<EventQueue<N>>>,
}

impl<const N: usize> DeferQueue<N> {
    pub const fn new() -> Self {
        Self {
            queue: Mutex::new(RefCell::new(EventQueue::new())),
        }
    }

    /// Park an event. A dynamic event gains a reference for as long as it
    /// stays here.
    pub fn defer<T: Tracer + ?Sized>(&self, event: EventRef, tracer: &T) -> RkhResult<()> {
        critical_section::with(|cs| {
            self.queue.borrow_ref_mut(cs).put_fifo(event)?;
            event.header().inc_ref(cs);
            tracer.emit(&TraceRecord::AoDefer {
                signal: event.signal(),
            });
            Ok(())
        })
    }

    /// Re-post the oldest deferred event to the front of `target`'s queue.
    ///
    /// Returns `Ok(None)` when nothing is deferred. If the target's queue is
    /// full the event stays deferred and the error is returned.
    pub fn recall<'a, T: Tracer + ?Sized>(
        &self,
        target: &dyn Runnable<'a>,
        tracer: &T,
    ) -> RkhResult<Option<EventRef>> {
        let event = match critical_section::with(|cs| self.queue.borrow_ref_mut(cs).get()) {
            Ok(event) => event,
            Err(nb::Error::WouldBlock) => return Ok(None),
            Err(nb::Error::Other(never)) => match never {},
        };

        if let Err(err) = target.post_lifo(event) {
            critical_section::with(|cs| self.queue.borrow_ref_mut(cs).put_lifo(event))?;
            return Err(err);
        }

        critical_section::with(|cs| {
            let header = event.header();
            if header.is_dynamic() {
                // the target's queue holds its own reference by now
                header.dec_ref(cs);
            }
        });
        tracer.emit(&TraceRecord::AoRecall {
            priority: target.priority(),
            signal: event.signal(),
        });
        Ok(Some(event))
    }

    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.queue.borrow_ref(cs).len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<const N: usize> Default for DeferQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}
