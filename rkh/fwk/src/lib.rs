#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![forbid(unsafe_code)]

//! # RKH Framework
//!
//! The framework layer turns a state machine into an active object: an
//! event queue, a priority and a binding to the scheduler's ready set.
//! Producers (other active objects, interrupt handlers, timers) post
//! events; the scheduler takes them out one at a time and dispatches them
//! to completion.
//!
//! Queues hold `&'static dyn Event` references. Dynamic events are
//! reference counted while they sit in queues and handed back to their
//! pool through [`Hooks::on_release`](rkh_core::Hooks::on_release) by
//! [`reclaim`] once the last reference is gone.

pub mod active;
pub mod defer;
pub mod gc;
pub mod queue;
pub mod ready;

pub use active::*;
pub use defer::*;
pub use gc::*;
pub use queue::*;
pub use ready::*;


/// Clamp a count into the `u8` fields of trace records
pub(crate) fn saturate(n: usize) -> u8 {
    u8::try_from(n).unwrap_or(u8::MAX)
}
