//! State identifiers and dispatch outcomes

use core::fmt;

/// Index of a state or pseudostate inside its model's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateId(pub u16);

impl StateId {
    pub const fn new(index: u16) -> Self {
        StateId(index)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S#{}", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for StateId {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "S#{}", self.0);
    }
}

/// Result of dispatching one event to a state machine
///
/// Every outcome other than `Processed` leaves the current state as it was
/// before the dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A transition (or internal action) fired
    Processed,
    /// No state in the active configuration handles the signal
    EventNotFound,
    /// The matching transition, or a history default, has a false guard
    GuardFalse,
    /// No branch of a choice or junction was enabled
    BranchNotFound,
    /// The compound transition has more segments than `MAX_TR_SEGS`
    TransitionOverflow,
    /// A state is nested deeper than `MAX_HCAL_DEPTH`
    HierarchyOverflow,
    /// The target is not a valid state, or the machine is not initialized
    UnknownState,
}

impl Outcome {
    /// The outcome reveals a defect in the model or its configuration
    pub const fn is_error(self) -> bool {
        matches!(
            self,
            Outcome::BranchNotFound
                | Outcome::TransitionOverflow
                | Outcome::HierarchyOverflow
                | Outcome::UnknownState
        )
    }

    pub const fn is_processed(self) -> bool {
        matches!(self, Outcome::Processed)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Processed => "event processed",
            Outcome::EventNotFound => "event not found",
            Outcome::GuardFalse => "guard false",
            Outcome::BranchNotFound => "branch not found",
            Outcome::TransitionOverflow => "too many transition segments",
            Outcome::HierarchyOverflow => "hierarchy too deep",
            Outcome::UnknownState => "unknown state",
        };
        f.write_str(s)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Outcome {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Outcome::Processed => defmt::write!(fmt, "Processed"),
            Outcome::EventNotFound => defmt::write!(fmt, "EventNotFound"),
            Outcome::GuardFalse => defmt::write!(fmt, "GuardFalse"),
            Outcome::BranchNotFound => defmt::write!(fmt, "BranchNotFound"),
            Outcome::TransitionOverflow => defmt::write!(fmt, "TransitionOverflow"),
            Outcome::HierarchyOverflow => defmt::write!(fmt, "HierarchyOverflow"),
            Outcome::UnknownState => defmt::write!(fmt, "UnknownState"),
        }
    }
}
