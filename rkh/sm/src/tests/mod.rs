//! State machine tests for rkh-sm

use core::cell::Cell;
use std::vec::Vec;

use rkh_core::{Event, Signal, StaticEvent};

/// Application context used by the test models. Actions append to `log`.
#[derive(Default)]
pub(crate) struct Probe {
    pub log: Vec<&'static str>,
    pub allow: bool,
    pub level: i32,
    /// Number of guard evaluations
    pub checks: Cell<u32>,
}

impl Probe {
    pub fn new() -> Self {
        Self { allow: true, ..Self::default() }
    }

    pub fn take(&mut self) -> Vec<&'static str> {
        std::mem::take(&mut self.log)
    }
}

/// Entry or exit actions that log a fixed line
macro_rules! state_actions {
    ($($name:ident => $text:literal;)*) => {
        $(
            fn $name(p: &mut $crate::tests::Probe) {
                p.log.push($text);
            }
        )*
    };
}

/// Transition actions that log a fixed line
macro_rules! actions {
    ($($name:ident => $text:literal;)*) => {
        $(
            fn $name(p: &mut $crate::tests::Probe, _e: &dyn rkh_core::Event) {
                p.log.push($text);
            }
        )*
    };
}

pub(crate) fn allowed(p: &Probe, _e: &dyn Event) -> bool {
    p.checks.set(p.checks.get() + 1);
    p.allow
}

pub(crate) const fn event(signal: u16) -> StaticEvent {
    StaticEvent::new(Signal::new(signal))
}

mod completion_test;
