#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![forbid(unsafe_code)]

//! # RKH Cooperative Scheduler
//!
//! A non-preemptive scheduler with run-to-completion semantics. Each
//! iteration picks the ready active object with the numerically lowest
//! priority, takes one event out of its queue and dispatches it to
//! completion before anything else runs. With nothing ready the idle hook
//! is called with interrupts masked.

use core::cell::{Cell, RefCell};
use core::fmt;

use critical_section::{CriticalSection, Mutex};
use rkh_core::{
    ErrorReport, Event, EventRef, Hooks, Outcome, Priority, RkhError, RkhResult, Signal,
    TraceRecord, MAX_SMA,
};
use rkh_fwk::{reclaim, ReadySet, Runnable};

pub mod config;

pub use config::*;

#[cfg(test)]
mod tests;

/// Lifecycle of the scheduler
///
/// `Idle` and `Running` follow the ready set: an iteration that picks an
/// object moves to `Running`, one that finds nothing ready, or a dispatch
/// that leaves nothing ready, moves back to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No object is ready
    Idle,
    /// A dispatch is in progress or more events are pending
    Running,
    /// Shutdown requested; terminal
    Shutdown,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerState::Idle => write!(f, "Idle"),
            SchedulerState::Running => write!(f, "Running"),
            SchedulerState::Shutdown => write!(f, "Shutdown"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for SchedulerState {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            SchedulerState::Idle => defmt::write!(fmt, "Idle"),
            SchedulerState::Running => defmt::write!(fmt, "Running"),
            SchedulerState::Shutdown => defmt::write!(fmt, "Shutdown"),
        }
    }
}

/// Result of one scheduler iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// One event was dispatched to the object at `priority`
    Dispatched { priority: Priority, outcome: Outcome },
    /// Nothing was ready
    Idle,
    /// The scheduler has been shut down
    Shutdown,
}

#[cfg(feature = "defmt")]
impl defmt::Format for Step {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Step::Dispatched { priority, outcome } => {
                defmt::write!(fmt, "Dispatched({}, {})", priority, outcome)
            }
            Step::Idle => defmt::write!(fmt, "Idle"),
            Step::Shutdown => defmt::write!(fmt, "Shutdown"),
        }
    }
}

type Slot<'a> = Option<&'a dyn Runnable<'a>>;

/// Cooperative scheduler
///
/// Owns the ready set and the registration table. Active objects borrow
/// both for `'a` once registered, so the scheduler is shared by reference
/// and never moved after the first registration.
pub struct Scheduler<'a> {
    config: SchedulerConfig,
    hooks: &'a dyn Hooks,
    ready: ReadySet,
    table: Mutex<RefCell<[Slot<'a>; MAX_SMA]>>,
    state: Mutex<Cell<SchedulerState>>,
}

impl<'a> Scheduler<'a> {
    pub const fn new(config: SchedulerConfig, hooks: &'a dyn Hooks) -> Self {
        Self {
            config,
            hooks,
            ready: ReadySet::new(),
            table: Mutex::new(RefCell::new([None; MAX_SMA])),
            state: Mutex::new(Cell::new(SchedulerState::Idle)),
        }
    }

    /// Returns the scheduler configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn hooks(&self) -> &'a dyn Hooks {
        self.hooks
    }

    pub fn state(&self) -> SchedulerState {
        critical_section::with(|cs| self.state.borrow(cs).get())
    }

    /// Add an active object at its priority and bind it to this
    /// scheduler. Each priority holds at most one object.
    pub fn register(&'a self, active: &'a dyn Runnable<'a>) -> RkhResult<()> {
        let priority = active.priority();
        if !priority.is_valid() {
            return Err(RkhError::InvalidPriority);
        }

        critical_section::with(|cs| {
            let mut table = self.table.borrow_ref_mut(cs);
            let slot = &mut table[priority.index()];
            if slot.is_some() {
                return Err(RkhError::PriorityInUse);
            }
            *slot = Some(active);
            drop(table);
            active.bind(cs, &self.ready, self.hooks);
            Ok(())
        })?;

        self.hooks.emit(&TraceRecord::AoRegister { priority });
        log::debug!(
            "{}: registered {} at priority {}",
            self.config.name,
            active.name(),
            priority.raw()
        );
        Ok(())
    }

    /// Remove the object at `priority` and forget that it was ready.
    /// Queued events stay in its queue.
    pub fn unregister(&self, priority: Priority) -> RkhResult<()> {
        let active = critical_section::with(|cs| {
            let mut table = self.table.borrow_ref_mut(cs);
            let active = table
                .get_mut(priority.index())
                .and_then(Option::take)
                .ok_or(RkhError::NotRegistered)?;
            drop(table);
            active.unbind(cs);
            self.ready.remove(cs, priority);
            Ok(active)
        })?;

        self.hooks.emit(&TraceRecord::AoUnregister { priority });
        log::debug!("{}: unregistered {}", self.config.name, active.name());
        Ok(())
    }

    /// Register an active object and take its initial transition.
    ///
    /// The returned outcome is the one of the initial transition; an error
    /// outcome is also reported through `Hooks::on_error`.
    pub fn activate(&'a self, active: &'a dyn Runnable<'a>) -> RkhResult<Outcome> {
        let priority = active.priority();
        self.register(active)?;

        let outcome = match active.activate() {
            Ok(outcome) => outcome,
            Err(err) => {
                self.unregister(priority)?;
                return Err(err);
            }
        };

        self.hooks.emit(&TraceRecord::AoActivate { priority });
        if outcome.is_error() {
            self.hooks.on_error(&ErrorReport {
                priority,
                signal: Signal::INIT,
                state: active.state(),
                outcome,
            });
        }
        log::info!(
            "{}: {} active in {:?}",
            self.config.name,
            active.name(),
            active.state()
        );
        Ok(outcome)
    }

    /// Unregister the object at `priority` and reclaim whatever was still
    /// queued for it.
    pub fn terminate(&self, priority: Priority) -> RkhResult<()> {
        let active = self.lookup(priority).ok_or(RkhError::NotRegistered)?;
        self.unregister(priority)?;

        while let Ok(event) = critical_section::with(|cs| active.get(cs)) {
            reclaim(event, self.hooks);
        }
        self.hooks.emit(&TraceRecord::AoTerminate { priority });
        Ok(())
    }

    /// Post to the back of the queue of the object at `priority`
    pub fn post_fifo(&self, priority: Priority, event: EventRef) -> RkhResult<()> {
        self.lookup(priority)
            .ok_or(RkhError::NotRegistered)?
            .post_fifo(event)
    }

    /// Post to the front of the queue of the object at `priority`
    pub fn post_lifo(&self, priority: Priority, event: EventRef) -> RkhResult<()> {
        self.lookup(priority)
            .ok_or(RkhError::NotRegistered)?
            .post_lifo(event)
    }

    /// Registered object at `priority`
    pub fn active(&self, priority: Priority) -> Option<&'a dyn Runnable<'a>> {
        self.lookup(priority)
    }

    pub fn is_ready(&self, priority: Priority) -> bool {
        critical_section::with(|cs| self.ready.contains(cs, priority))
    }

    /// Request termination; `run` returns once it sees the request
    pub fn shutdown(&self) {
        critical_section::with(|cs| self.state.borrow(cs).set(SchedulerState::Shutdown));
        log::info!("{}: shutdown requested", self.config.name);
    }

    /// Loop until [`shutdown`](Self::shutdown) is called
    pub fn run(&self) {
        if self.state() == SchedulerState::Shutdown {
            return;
        }

        log::info!("{}: scheduler running", self.config.name);
        self.hooks.emit(&TraceRecord::FwkEnter);
        self.hooks.on_start();

        while self.run_once() != Step::Shutdown {}

        self.hooks.emit(&TraceRecord::FwkExit);
        self.hooks.on_exit();
        log::info!("{}: scheduler stopped", self.config.name);
    }

    /// Exactly one iteration of the scheduler loop
    pub fn run_once(&self) -> Step {
        self.step(true)
    }

    /// Dispatch until no object is ready and return how many events were
    /// dispatched. The idle hook is not called.
    pub fn run_until_idle(&self) -> usize {
        let mut dispatched = 0;
        while let Step::Dispatched { .. } = self.step(false) {
            dispatched += 1;
        }
        dispatched
    }

    fn step(&self, idle: bool) -> Step {
        let next = critical_section::with(|cs| {
            if self.state.borrow(cs).get() == SchedulerState::Shutdown {
                return Err(Step::Shutdown);
            }
            match self.ready.highest(cs) {
                Some(priority) => {
                    self.enter(cs, SchedulerState::Running);
                    Ok(priority)
                }
                None => {
                    self.enter(cs, SchedulerState::Idle);
                    if idle {
                        self.hooks.emit(&TraceRecord::FwkIdle);
                        self.hooks.on_idle(cs);
                    }
                    Err(Step::Idle)
                }
            }
        });
        let priority = match next {
            Ok(priority) => priority,
            Err(step) => return step,
        };

        let active = self
            .lookup(priority)
            .unwrap_or_else(|| self.hooks.on_assert(file!(), line!()));
        self.hooks.emit(&TraceRecord::FwkNext { priority });

        let event = critical_section::with(|cs| active.get(cs))
            .ok()
            .unwrap_or_else(|| self.hooks.on_assert(file!(), line!()));

        self.hooks.on_dispatch(priority, event);
        let outcome = active.dispatch(event);
        self.report(priority, event, active, outcome);
        reclaim(event, self.hooks);

        critical_section::with(|cs| {
            if !active.has_events(cs) {
                self.ready.remove(cs, priority);
            }
            if self.ready.is_empty(cs) {
                self.enter(cs, SchedulerState::Idle);
            }
        });
        Step::Dispatched { priority, outcome }
    }

    fn report(
        &self,
        priority: Priority,
        event: &dyn Event,
        active: &dyn Runnable<'a>,
        outcome: Outcome,
    ) {
        let unhandled = outcome == Outcome::EventNotFound && self.config.report_unhandled;
        if outcome.is_error() || unhandled {
            self.hooks.on_error(&ErrorReport {
                priority,
                signal: event.signal(),
                state: active.state(),
                outcome,
            });
        }
    }

    /// Move to `next` unless shut down
    fn enter(&self, cs: CriticalSection<'_>, next: SchedulerState) {
        let state = self.state.borrow(cs);
        if state.get() != SchedulerState::Shutdown {
            state.set(next);
        }
    }

    fn lookup(&self, priority: Priority) -> Option<&'a dyn Runnable<'a>> {
        critical_section::with(|cs| self.slot(cs, priority))
    }

    fn slot(&self, cs: CriticalSection<'_>, priority: Priority) -> Option<&'a dyn Runnable<'a>> {
        self.table
            .borrow_ref(cs)
            .get(priority.index())
            .copied()
            .flatten()
    }
}

impl fmt::Debug for Scheduler<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ready = critical_section::with(|cs| self.ready.snapshot(cs));
        f.debug_struct("Scheduler")
            .field("name", &self.config.name)
            .field("state", &self.state())
            .field("ready", &ready)
            .finish()
    }
}
