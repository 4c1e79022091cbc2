//! Reload source collaborator.
//!
//! Only background tasks talk to a [`ReloadSource`]; foreground callers of the
//! cache never wait on it.

use std::sync::Arc;

use crate::error::Result;
use crate::layout::RootValue;
use crate::reliability::Versioned;

/// Produces fresh values for roots and their sub-locations.
pub trait ReloadSource<K, V: RootValue>: Send + Sync {
    /// Computes the full value for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::SourceUnavailable`] when upstream data cannot
    /// be obtained right now.
    fn populate(&self, key: &K) -> Result<Versioned<V>>;

    /// Loads the items of one sub-location of `key`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::SourceUnavailable`] when upstream data cannot
    /// be obtained right now.
    fn load_location(&self, key: &K, location: &V::Location) -> Result<V::Items>;
}

/// Decides whether background work for a root is still permitted.
///
/// Consulted before a task starts and again before its result is applied.
pub type ReloadGate<K> = Arc<dyn Fn(&K) -> bool + Send + Sync>;

/// A gate that always permits work.
#[must_use]
pub fn open_gate<K: 'static>() -> ReloadGate<K> {
    Arc::new(|_: &K| true)
}
