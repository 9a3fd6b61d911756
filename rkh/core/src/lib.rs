#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![forbid(unsafe_code)]

//! # RKH Core
//!
//! Core types, traits, and abstractions for the RKH state-machine framework.
//! This crate provides the vocabulary shared by the state machine engine,
//! the active object layer and the cooperative scheduler: signals and
//! reference-counted events, priorities and ready sets, dispatch outcomes,
//! compile-time limits, trace records and the hooks through which the
//! framework talks to the platform.

use core::fmt;

pub mod config;
pub mod events;
pub mod hook;
pub mod priorities;
pub mod states;
pub mod trace;

pub use config::*;
pub use events::*;
pub use hook::*;
pub use priorities::*;
pub use states::*;
pub use trace::*;

#[cfg(test)]
mod tests;

/// RKH framework version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Result type used throughout the RKH framework
pub type RkhResult<T> = Result<T, RkhError>;

/// Error types for RKH framework operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RkhError {
    /// Event queue is full
    QueueFull,
    /// Event queue is empty
    QueueEmpty,
    /// Priority outside `0..MAX_SMA`
    InvalidPriority,
    /// Another active object already owns this priority
    PriorityInUse,
    /// No active object is registered at this priority
    NotRegistered,
    /// The state machine already took its initial transition
    AlreadyStarted,
}

impl fmt::Display for RkhError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RkhError::QueueFull => write!(f, "Event queue is full"),
            RkhError::QueueEmpty => write!(f, "Event queue is empty"),
            RkhError::InvalidPriority => write!(f, "Invalid priority level"),
            RkhError::PriorityInUse => write!(f, "Priority already in use"),
            RkhError::NotRegistered => write!(f, "No active object at this priority"),
            RkhError::AlreadyStarted => write!(f, "State machine already started"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for RkhError {}

#[cfg(feature = "defmt")]
impl defmt::Format for RkhError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            RkhError::QueueFull => defmt::write!(fmt, "QueueFull"),
            RkhError::QueueEmpty => defmt::write!(fmt, "QueueEmpty"),
            RkhError::InvalidPriority => defmt::write!(fmt, "InvalidPriority"),
            RkhError::PriorityInUse => defmt::write!(fmt, "PriorityInUse"),
            RkhError::NotRegistered => defmt::write!(fmt, "NotRegistered"),
            RkhError::AlreadyStarted => defmt::write!(fmt, "AlreadyStarted"),
        }
    }
}
