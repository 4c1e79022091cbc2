//! Refresh cache statistics.

#![allow(clippy::cast_precision_loss)] // Precision loss acceptable for rate calculation

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Cache statistics for monitoring.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshStats {
    /// Updates that replaced or created an entry.
    pub accepted: u64,
    /// Updates rejected because their reliability was lower.
    pub rejected: u64,
    /// Background tasks handed to the queue.
    pub reloads_scheduled: u64,
    /// Background reloads whose source failed.
    pub reloads_failed: u64,
    /// Recoverable lookup errors turned into "no result".
    pub lookups_swallowed: u64,
    /// Tasks the queue refused.
    pub submit_failures: u64,
}

impl RefreshStats {
    /// Fraction of updates that were accepted (0.0 to 1.0).
    #[must_use]
    pub fn acceptance_rate(&self) -> f64 {
        let total = self.accepted + self.rejected;
        if total == 0 {
            0.0
        } else {
            self.accepted as f64 / total as f64
        }
    }
}

/// Atomic counters behind [`RefreshStats`].
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) accepted: AtomicU64,
    pub(crate) rejected: AtomicU64,
    pub(crate) reloads_scheduled: AtomicU64,
    pub(crate) reloads_failed: AtomicU64,
    pub(crate) lookups_swallowed: AtomicU64,
    pub(crate) submit_failures: AtomicU64,
}

impl Counters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> RefreshStats {
        RefreshStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            reloads_scheduled: self.reloads_scheduled.load(Ordering::Relaxed),
            reloads_failed: self.reloads_failed.load(Ordering::Relaxed),
            lookups_swallowed: self.lookups_swallowed.load(Ordering::Relaxed),
            submit_failures: self.submit_failures.load(Ordering::Relaxed),
        }
    }
}
