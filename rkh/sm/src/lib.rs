#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![forbid(unsafe_code)]

//! # RKH State Machine
//!
//! Hierarchical state machine engine implementing UML statecharts.
//! Provides the table-driven state machine execution engine with:
//! - Entry and exit actions
//! - Transitions with guards and actions, internal transitions
//! - Hierarchical state nesting with bounded depth
//! - Choice and junction pseudostates
//! - Shallow and deep history
//! - Reusable submachines with entry and exit points
//! - Final states and completion transitions

pub mod cells;
pub mod hsm;
pub mod model;

pub use cells::Cells;
pub use hsm::{Hsm, SmInfo};
pub use model::*;

#[cfg(test)]
mod tests;
