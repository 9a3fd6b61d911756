//! Platform hooks
//!
//! The framework calls back into the application (or the board support
//! package) through [`Hooks`]. Every method has a default body so an
//! implementation only overrides what it needs.

use critical_section::CriticalSection;

use crate::{Event, Outcome, Priority, Signal, StateId, Tracer};

/// Details of a dispatch that did not end well
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorReport {
    pub priority: Priority,
    pub signal: Signal,
    /// Current state of the machine when the event arrived
    pub state: Option<StateId>,
    pub outcome: Outcome,
}

#[cfg(feature = "defmt")]
impl defmt::Format for ErrorReport {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "ErrorReport {{ priority: {}, signal: {}, outcome: {} }}",
            self.priority,
            self.signal,
            self.outcome
        );
    }
}

/// Callbacks from the framework into the platform
pub trait Hooks: Tracer + Sync {
    /// The scheduler is about to enter its loop
    fn on_start(&self) {}

    /// The scheduler left its loop
    fn on_exit(&self) {}

    /// Nothing is ready to run.
    ///
    /// Called with interrupts masked; a platform typically enters a low
    /// power mode that atomically re-enables them.
    fn on_idle(&self, _cs: CriticalSection<'_>) {}

    /// An event was queued for an active object
    fn on_post(&self, _event: &dyn Event) {}

    /// An event is about to be dispatched
    fn on_dispatch(&self, _priority: Priority, _event: &dyn Event) {}

    /// The last reference of a dynamic event was dropped; return its block
    /// to pool `event.header().pool()`
    fn on_release(&self, _event: &dyn Event) {}

    /// A dispatch ended with an error outcome
    fn on_error(&self, report: &ErrorReport) {
        log::warn!(
            "dispatch error at priority {}: {} on {} (state {:?})",
            report.priority.raw(),
            report.outcome,
            report.signal,
            report.state
        );
    }

    /// An internal consistency check failed
    fn on_assert(&self, file: &'static str, line: u32) -> ! {
        log::error!("assertion failed at {}:{}", file, line);
        panic!("rkh assertion failed at {}:{}", file, line)
    }
}

/// Hooks with every callback left at its default
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl Tracer for NoHooks {}

impl Hooks for NoHooks {}
