//! Ready set shared between producers and the scheduler

use core::cell::Cell;

use critical_section::{CriticalSection, Mutex};
use rkh_core::{Priority, PrioritySet};

/// Priorities of the active objects that have queued events
///
/// Every access needs a critical-section token, so producers running in
/// interrupt context and the scheduler never see a torn update.
pub struct ReadySet {
    bits: Mutex<Cell<PrioritySet>>,
}

impl ReadySet {
    pub const fn new() -> Self {
        Self {
            bits: Mutex::new(Cell::new(PrioritySet::new())),
        }
    }

    pub fn insert(&self, cs: CriticalSection<'_>, priority: Priority) {
        self.update(cs, |set| set.insert(priority));
    }

    pub fn remove(&self, cs: CriticalSection<'_>, priority: Priority) {
        self.update(cs, |set| set.remove(priority));
    }

    pub fn contains(&self, cs: CriticalSection<'_>, priority: Priority) -> bool {
        self.bits.borrow(cs).get().contains(priority)
    }

    pub fn is_empty(&self, cs: CriticalSection<'_>) -> bool {
        self.bits.borrow(cs).get().is_empty()
    }

    /// Numerically lowest (most urgent) ready priority
    pub fn highest(&self, cs: CriticalSection<'_>) -> Option<Priority> {
        self.bits.borrow(cs).get().highest()
    }

    /// Copy of the whole set
    pub fn snapshot(&self, cs: CriticalSection<'_>) -> PrioritySet {
        self.bits.borrow(cs).get()
    }

    fn update(&self, cs: CriticalSection<'_>, f: impl FnOnce(&mut PrioritySet)) {
        let cell = self.bits.borrow(cs);
        let mut set = cell.get();
        f(&mut set);
        cell.set(set);
    }
}

impl Default for ReadySet {
    fn default() -> Self {
        Self::new()
    }
}
