//! Per-instance mutable data of a state machine
//!
//! The model is shared and immutable; the last visited state of every
//! history pseudostate and the current host of every submachine reference
//! live here instead, one copy per machine instance.

use rkh_core::{Outcome, StateId, MAX_HISTORY, MAX_SUBMACHINE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cells {
    history: [Option<StateId>; MAX_HISTORY],
    hosts: [Option<StateId>; MAX_SUBMACHINE],
}

impl Cells {
    pub const fn new() -> Self {
        Self {
            history: [None; MAX_HISTORY],
            hosts: [None; MAX_SUBMACHINE],
        }
    }

    /// State recorded in a history slot
    pub fn history(&self, slot: u8) -> Option<StateId> {
        self.history.get(slot as usize).copied().flatten()
    }

    pub fn set_history(&mut self, slot: u8, state: StateId) -> Result<(), Outcome> {
        let cell = self.history.get_mut(slot as usize).ok_or(Outcome::UnknownState)?;
        *cell = Some(state);
        Ok(())
    }

    pub fn clear_history(&mut self, slot: u8) {
        if let Some(cell) = self.history.get_mut(slot as usize) {
            *cell = None;
        }
    }

    /// Submachine state currently hosting the reference bound to `slot`
    pub fn host(&self, slot: u8) -> Option<StateId> {
        self.hosts.get(slot as usize).copied().flatten()
    }

    pub fn set_host(&mut self, slot: u8, host: StateId) -> Result<(), Outcome> {
        let cell = self.hosts.get_mut(slot as usize).ok_or(Outcome::UnknownState)?;
        *cell = Some(host);
        Ok(())
    }
}
