//! Trace records emitted by the framework
//!
//! Records are plain values handed to a [`Tracer`]. Encoding them, filtering
//! them and moving them off the target is up to the tracer implementation.

use crate::{Priority, Signal, StateId};

/// Group a trace record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceGroup {
    StateMachine,
    ActiveObject,
    Framework,
}

/// One trace record
///
/// `sm` fields carry the id of the emitting state machine, which the active
/// object layer sets to its priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceRecord {
    SmInit { sm: u8, state: StateId },
    SmDispatch { sm: u8, signal: Signal, state: Option<StateId> },
    SmTransition { sm: u8, source: StateId, target: StateId },
    /// Target of one segment of a compound transition
    SmTargetState { sm: u8, target: StateId },
    SmExitState { sm: u8, state: StateId },
    SmEnterState { sm: u8, state: StateId },
    SmCountEntryExit { sm: u8, entered: u8, exited: u8 },
    SmState { sm: u8, state: StateId },
    SmEventNotFound { sm: u8, signal: Signal },
    SmGuardFalse { sm: u8, signal: Signal },
    SmBranchNotFound { sm: u8, state: StateId },
    SmUnknownState { sm: u8 },
    SmHierarchyOverflow { sm: u8 },
    SmSegmentOverflow { sm: u8 },
    SmEventProcessed { sm: u8, signal: Signal, state: StateId },

    AoRegister { priority: Priority },
    AoUnregister { priority: Priority },
    AoActivate { priority: Priority },
    AoFifo { priority: Priority, signal: Signal, used: u8, min_free: u8 },
    AoLifo { priority: Priority, signal: Signal, used: u8, min_free: u8 },
    AoGet { priority: Priority, signal: Signal, used: u8 },
    AoDefer { signal: Signal },
    AoRecall { priority: Priority, signal: Signal },
    AoTerminate { priority: Priority },

    FwkEnter,
    FwkExit,
    FwkNext { priority: Priority },
    FwkIdle,
    FwkGc { signal: Signal, pool: u8, nref: u8 },
    FwkGcRelease { signal: Signal, pool: u8 },
}

impl TraceRecord {
    /// Numeric record id, stable across builds
    pub const fn id(&self) -> u8 {
        use TraceRecord::*;
        match self {
            SmInit { .. } => 0,
            SmDispatch { .. } => 1,
            SmTransition { .. } => 2,
            SmTargetState { .. } => 3,
            SmExitState { .. } => 4,
            SmEnterState { .. } => 5,
            SmCountEntryExit { .. } => 6,
            SmState { .. } => 7,
            SmEventNotFound { .. } => 8,
            SmGuardFalse { .. } => 9,
            SmBranchNotFound { .. } => 10,
            SmUnknownState { .. } => 11,
            SmHierarchyOverflow { .. } => 12,
            SmSegmentOverflow { .. } => 13,
            SmEventProcessed { .. } => 14,

            AoRegister { .. } => 32,
            AoUnregister { .. } => 33,
            AoActivate { .. } => 34,
            AoFifo { .. } => 35,
            AoLifo { .. } => 36,
            AoGet { .. } => 37,
            AoDefer { .. } => 38,
            AoRecall { .. } => 39,
            AoTerminate { .. } => 40,

            FwkEnter => 64,
            FwkExit => 65,
            FwkNext { .. } => 66,
            FwkIdle => 67,
            FwkGc { .. } => 68,
            FwkGcRelease { .. } => 69,
        }
    }

    pub const fn group(&self) -> TraceGroup {
        match self.id() {
            0..=31 => TraceGroup::StateMachine,
            32..=63 => TraceGroup::ActiveObject,
            _ => TraceGroup::Framework,
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TraceRecord {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "TraceRecord({=u8})", self.id());
    }
}

/// Sink for trace records
pub trait Tracer {
    /// Fire and forget
    fn emit(&self, _record: &TraceRecord) {}
}

/// Tracer that drops every record
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTrace;

impl Tracer for NoTrace {}

impl<T: Tracer + ?Sized> Tracer for &T {
    fn emit(&self, record: &TraceRecord) {
        (**self).emit(record)
    }
}
