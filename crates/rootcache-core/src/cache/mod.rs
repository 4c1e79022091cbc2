//! Refresh cache for per-root values.
//!
//! - Reliability-ordered updates: a cached value is only replaced by one at
//!   least as reliable
//! - Read-through initialization with background population
//! - Incremental reload of newly appeared sub-locations
//! - Best-effort lookups that never block and never fail on missing roots
//!
//! # Thread-Safety & Lock Ordering
//!
//! A single `parking_lot::Mutex` guards the root map. It is never held while
//! a task is submitted or executed, while a reload source is called, or while
//! a probe runs, so callbacks may re-enter the cache freely.

mod refresh;
mod stats;

pub use refresh::{KeyedRefreshCache, RootKey};
pub use stats::RefreshStats;

#[cfg(test)]
mod test_support;
