//! Active objects
//!
//! An active object couples a state machine instance and its context with
//! an event queue and a priority. Everything producers touch (the queue,
//! the binding to the scheduler) lives behind critical-section mutexes; the
//! state machine itself is only touched by the scheduler and sits behind a
//! `spin::Mutex` that is never contended.

use core::cell::{Cell, RefCell};
use core::convert::Infallible;
use core::fmt;

use critical_section::{CriticalSection, Mutex};
use rkh_core::{
    Event, EventRef, Hooks, NoTrace, Outcome, Priority, RkhError, RkhResult, StateId, TraceRecord,
    DEFAULT_QUEUE_CAPACITY,
};
use rkh_sm::{Hsm, Model, SmInfo};

use crate::{saturate, EventQueue, ReadySet};

/// What the scheduler needs from an active object
///
/// `'a` is the lifetime of the scheduler the object is registered with.
pub trait Runnable<'a>: Sync {
    fn priority(&self) -> Priority;

    fn name(&self) -> &'static str;

    /// Attach to a scheduler's ready set and hooks. Marks the object ready
    /// if events were queued before registration.
    fn bind(&self, cs: CriticalSection<'_>, ready: &'a ReadySet, hooks: &'a dyn Hooks);

    /// Detach from the scheduler
    fn unbind(&self, cs: CriticalSection<'_>);

    fn is_bound(&self, cs: CriticalSection<'_>) -> bool;

    /// Take the initial transition of the state machine
    fn activate(&self) -> RkhResult<Outcome>;

    fn has_events(&self, cs: CriticalSection<'_>) -> bool;

    /// Queue an event behind the ones already waiting
    fn post_fifo(&self, event: EventRef) -> RkhResult<()>;

    /// Queue an event in front of the ones already waiting
    fn post_lifo(&self, event: EventRef) -> RkhResult<()>;

    /// Take the next queued event. Readiness is left to the scheduler.
    fn get(&self, cs: CriticalSection<'_>) -> nb::Result<EventRef, Infallible>;

    /// Run one event to completion
    fn dispatch(&self, event: &dyn Event) -> Outcome;

    /// Current leaf state, `None` before activation
    fn state(&self) -> Option<StateId>;
}

#[derive(Clone, Copy)]
struct Binding<'a> {
    ready: &'a ReadySet,
    hooks: &'a dyn Hooks,
}

struct Machine<C: 'static> {
    hsm: Hsm<C>,
    ctx: C,
}

/// Active object running a state machine over context `C` with a queue of
/// `Q` events
pub struct ActiveObject<'a, C: 'static, const Q: usize = DEFAULT_QUEUE_CAPACITY> {
    priority: Priority,
    name: &'static str,
    queue: Mutex<RefCell<EventQueue<Q>>>,
    binding: Mutex<Cell<Option<Binding<'a>>>>,
    machine: spin::Mutex<Machine<C>>,
}

impl<'a, C: 'static, const Q: usize> ActiveObject<'a, C, Q> {
    /// Create an active object; trace records of its state machine carry
    /// the priority as machine id.
    pub const fn new(
        priority: Priority,
        name: &'static str,
        model: &'static Model<C>,
        ctx: C,
    ) -> Self {
        Self {
            priority,
            name,
            queue: Mutex::new(RefCell::new(EventQueue::new())),
            binding: Mutex::new(Cell::new(None)),
            machine: spin::Mutex::new(Machine {
                hsm: Hsm::new(model).with_id(priority.raw()),
                ctx,
            }),
        }
    }

    /// Number of queued events
    pub fn queue_len(&self) -> usize {
        critical_section::with(|cs| self.queue.borrow_ref(cs).len())
    }

    /// Low-water mark of free queue slots
    pub fn queue_min_free(&self) -> usize {
        critical_section::with(|cs| self.queue.borrow_ref(cs).min_free())
    }

    pub const fn queue_capacity(&self) -> usize {
        Q
    }

    /// Dispatch statistics of the state machine
    pub fn info(&self) -> SmInfo {
        self.machine.lock().hsm.info()
    }

    /// Inspect the state machine and its context
    pub fn with_machine<R>(&self, f: impl FnOnce(&Hsm<C>, &C) -> R) -> R {
        let machine = self.machine.lock();
        f(&machine.hsm, &machine.ctx)
    }

    /// Mutate the context between dispatches
    pub fn with_context<R>(&self, f: impl FnOnce(&mut C) -> R) -> R {
        let mut machine = self.machine.lock();
        f(&mut machine.ctx)
    }

    fn bound(&self) -> Option<Binding<'a>> {
        critical_section::with(|cs| self.binding.borrow(cs).get())
    }

    fn post(&self, event: EventRef, lifo: bool) -> RkhResult<()> {
        critical_section::with(|cs| {
            let mut queue = self.queue.borrow_ref_mut(cs);
            let pushed = if lifo {
                queue.put_lifo(event)
            } else {
                queue.put_fifo(event)
            };
            if let Err(err) = pushed {
                log::warn!("{}: queue full, {} rejected", self.name, event.signal());
                return Err(err);
            }
            event.header().inc_ref(cs);

            let used = saturate(queue.len());
            let min_free = saturate(queue.min_free());
            drop(queue);

            if let Some(binding) = self.binding.borrow(cs).get() {
                binding.ready.insert(cs, self.priority);
                let signal = event.signal();
                let priority = self.priority;
                binding.hooks.emit(&if lifo {
                    TraceRecord::AoLifo { priority, signal, used, min_free }
                } else {
                    TraceRecord::AoFifo { priority, signal, used, min_free }
                });
                binding.hooks.on_post(event);
            }
            Ok(())
        })
    }
}

impl<'a, C: Send + 'static, const Q: usize> Runnable<'a> for ActiveObject<'a, C, Q> {
    fn priority(&self) -> Priority {
        self.priority
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn bind(&self, cs: CriticalSection<'_>, ready: &'a ReadySet, hooks: &'a dyn Hooks) {
        self.binding.borrow(cs).set(Some(Binding { ready, hooks }));
        if !self.queue.borrow_ref(cs).is_empty() {
            ready.insert(cs, self.priority);
        }
    }

    fn unbind(&self, cs: CriticalSection<'_>) {
        self.binding.borrow(cs).set(None);
    }

    fn is_bound(&self, cs: CriticalSection<'_>) -> bool {
        self.binding.borrow(cs).get().is_some()
    }

    fn activate(&self) -> RkhResult<Outcome> {
        let binding = self.bound();
        let mut machine = self.machine.lock();
        let Machine { hsm, ctx } = &mut *machine;
        if hsm.state().is_some() {
            return Err(RkhError::AlreadyStarted);
        }
        let outcome = match binding {
            Some(binding) => hsm.init(ctx, binding.hooks),
            None => hsm.init(ctx, &NoTrace),
        };
        Ok(outcome)
    }

    fn has_events(&self, cs: CriticalSection<'_>) -> bool {
        !self.queue.borrow_ref(cs).is_empty()
    }

    fn post_fifo(&self, event: EventRef) -> RkhResult<()> {
        self.post(event, false)
    }

    fn post_lifo(&self, event: EventRef) -> RkhResult<()> {
        self.post(event, true)
    }

    fn get(&self, cs: CriticalSection<'_>) -> nb::Result<EventRef, Infallible> {
        let mut queue = self.queue.borrow_ref_mut(cs);
        let event = queue.get()?;
        if let Some(binding) = self.binding.borrow(cs).get() {
            binding.hooks.emit(&TraceRecord::AoGet {
                priority: self.priority,
                signal: event.signal(),
                used: saturate(queue.len()),
            });
        }
        Ok(event)
    }

    fn dispatch(&self, event: &dyn Event) -> Outcome {
        let binding = self.bound();
        let mut machine = self.machine.lock();
        let Machine { hsm, ctx } = &mut *machine;
        match binding {
            Some(binding) => hsm.dispatch(ctx, event, binding.hooks),
            None => hsm.dispatch(ctx, event, &NoTrace),
        }
    }

    fn state(&self) -> Option<StateId> {
        self.machine.lock().hsm.state()
    }
}

impl<'a, C: 'static, const Q: usize> fmt::Debug for ActiveObject<'a, C, Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveObject")
            .field("priority", &self.priority)
            .field("name", &self.name)
            .field("queued", &self.queue_len())
            .field("capacity", &Q)
            .finish()
    }
}
