//! Compile-time limits of the framework.
//!
//! Every working set the dispatch engine and the scheduler use is a fixed
//! array sized by one of these constants, so the worst-case memory and time
//! of a dispatch are known at build time. Exceeding one of them is reported
//! as a dispatch outcome, never as undefined behavior.

/// Maximum number of active objects, and therefore of priority levels.
///
/// The ready set is a single `u64`, so this cannot exceed 64.
pub const MAX_SMA: usize = 64;

/// Maximum nesting depth of the state hierarchy, counted from the root.
pub const MAX_HCAL_DEPTH: usize = 8;

/// Maximum number of segments (and transition actions) in one compound
/// transition.
pub const MAX_TR_SEGS: usize = 8;

/// Number of history cells per state machine instance.
pub const MAX_HISTORY: usize = 8;

/// Number of submachine references per state machine instance.
pub const MAX_SUBMACHINE: usize = 4;

/// Default event queue depth for active objects.
pub const DEFAULT_QUEUE_CAPACITY: usize = 8;

const _: () = assert!(MAX_SMA <= 64);
const _: () = assert!(MAX_HISTORY <= u8::MAX as usize && MAX_SUBMACHINE <= u8::MAX as usize);
