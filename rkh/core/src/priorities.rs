//! Priority management for active objects

use core::fmt;
use crate::{RkhError, RkhResult, MAX_SMA};

/// Type-safe priority level for active objects
///
/// `0` is the highest priority. A priority also identifies its active object:
/// only one object may be registered per level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(u8);

impl Priority {
    /// Highest priority level
    pub const HIGHEST: Priority = Priority(0);

    /// Lowest priority level
    pub const LOWEST: Priority = Priority((MAX_SMA - 1) as u8);

    /// Create a new priority level
    pub fn new(priority: u8) -> RkhResult<Self> {
        if (priority as usize) < MAX_SMA {
            Ok(Priority(priority))
        } else {
            Err(RkhError::InvalidPriority)
        }
    }

    /// Create priority without validation (const fn)
    pub const fn new_unchecked(priority: u8) -> Self {
        Priority(priority)
    }

    /// Get the raw priority value
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Index into per-priority tables
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Check if this priority is valid
    pub const fn is_valid(self) -> bool {
        (self.0 as usize) < MAX_SMA
    }

    /// Check if `self` is served before `other`
    pub const fn is_higher_than(self, other: Priority) -> bool {
        self.0 < other.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Priority({})", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Priority {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "Priority({})", self.0);
    }
}

/// Set of priorities, one bit per level
///
/// Bit `n` stands for priority `n`, so the highest ready priority is the
/// least significant bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrioritySet(u64);

impl PrioritySet {
    /// Empty priority set
    pub const EMPTY: Self = Self(0);

    /// Create a new empty priority set
    pub const fn new() -> Self {
        Self::EMPTY
    }

    /// Add a priority to the set
    pub fn insert(&mut self, priority: Priority) {
        if priority.is_valid() {
            self.0 |= 1u64 << priority.0;
        }
    }

    /// Remove a priority from the set
    pub fn remove(&mut self, priority: Priority) {
        if priority.is_valid() {
            self.0 &= !(1u64 << priority.0);
        }
    }

    /// Check if a priority is in the set
    pub const fn contains(&self, priority: Priority) -> bool {
        priority.is_valid() && (self.0 & (1u64 << priority.0)) != 0
    }

    /// Check if the set is empty
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Number of priorities in the set
    pub const fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Highest priority (numerically lowest value) in the set
    pub fn highest(&self) -> Option<Priority> {
        if self.is_empty() {
            None
        } else {
            Some(Priority(self.0.trailing_zeros() as u8))
        }
    }

    /// Lowest priority (numerically highest value) in the set
    pub fn lowest(&self) -> Option<Priority> {
        if self.is_empty() {
            None
        } else {
            Some(Priority((63 - self.0.leading_zeros()) as u8))
        }
    }

    /// Iterate over the set from highest to lowest priority
    pub fn iter(&self) -> impl Iterator<Item = Priority> {
        let mut bits = self.0;
        core::iter::from_fn(move || {
            if bits == 0 {
                None
            } else {
                let prio = bits.trailing_zeros() as u8;
                bits &= bits - 1;
                Some(Priority(prio))
            }
        })
    }

    /// Raw bitmap
    pub const fn bits(&self) -> u64 {
        self.0
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for PrioritySet {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "PrioritySet({=u64:b})", self.0);
    }
}

/// Macro to create compile-time priority constants
#[macro_export]
macro_rules! priority {
    ($value:literal) => {{
        const P: $crate::Priority = $crate::Priority::new_unchecked($value);
        const _: () = assert!(P.is_valid());
        P
    }};
}
