//! Per-root refresh cache.
//!
//! One mutex guards the whole root map. Values are stored behind `Arc` so
//! every critical section only moves pointers; building replacement values,
//! probing, and talking to the reload source all happen outside the lock.

use std::collections::hash_map::Entry;
use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::stats::{Counters, RefreshStats};
use crate::config::CacheConfig;
use crate::error::Result;
use crate::layout::RootValue;
use crate::queue::{Task, TaskQueue};
use crate::reliability::{Reliability, Versioned};
use crate::source::{open_gate, ReloadGate, ReloadSource};

/// Bounds required of root keys.
pub trait RootKey: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

impl<T> RootKey for T where T: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

struct Shared<K, V: RootValue> {
    entries: Mutex<FxHashMap<K, Versioned<Arc<V>>>>,
    queue: Arc<dyn TaskQueue<K>>,
    source: Arc<dyn ReloadSource<K, V>>,
    gate: ReloadGate<K>,
    update_retries: usize,
    counters: Counters,
}

/// Cache of one versioned value per root, refreshed in the background.
///
/// Cloning is cheap and yields a handle to the same cache.
pub struct KeyedRefreshCache<K, V: RootValue> {
    shared: Arc<Shared<K, V>>,
}

impl<K, V: RootValue> Clone for KeyedRefreshCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K: RootKey, V: RootValue> KeyedRefreshCache<K, V> {
    /// Creates a cache with default settings and a gate that always permits
    /// background work.
    #[must_use]
    pub fn new(queue: Arc<dyn TaskQueue<K>>, source: Arc<dyn ReloadSource<K, V>>) -> Self {
        Self::with_config(queue, source, open_gate(), &CacheConfig::default())
    }

    /// Creates a cache with an explicit gate and configuration.
    #[must_use]
    pub fn with_config(
        queue: Arc<dyn TaskQueue<K>>,
        source: Arc<dyn ReloadSource<K, V>>,
        gate: ReloadGate<K>,
        config: &CacheConfig,
    ) -> Self {
        let mut entries = FxHashMap::default();
        entries.reserve(config.initial_capacity);
        Self {
            shared: Arc::new(Shared {
                entries: Mutex::new(entries),
                queue,
                source,
                gate,
                update_retries: config.update_retries.max(1),
                counters: Counters::default(),
            }),
        }
    }

    /// Point-in-time copy of every cached value, reliability stripped.
    #[must_use]
    pub fn snapshot(&self) -> FxHashMap<K, Arc<V>> {
        self.shared
            .entries
            .lock()
            .iter()
            .map(|(key, entry)| (key.clone(), Arc::clone(&entry.value)))
            .collect()
    }

    /// Cached value for `key`, without initializing it.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.shared
            .entries
            .lock()
            .get(key)
            .map(|entry| Arc::clone(&entry.value))
    }

    /// Reliability of the cached value for `key`.
    #[must_use]
    pub fn reliability(&self, key: &K) -> Option<Reliability> {
        self.shared
            .entries
            .lock()
            .get(key)
            .map(|entry| entry.reliability)
    }

    /// Number of cached roots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.entries.lock().len()
    }

    /// Check if no root has been cached yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shared.entries.lock().is_empty()
    }

    /// Get cache statistics.
    #[must_use]
    pub fn stats(&self) -> RefreshStats {
        self.shared.counters.snapshot()
    }

    /// Offers `new` as the value for `key`.
    ///
    /// The first value offered for a key is always stored. Afterwards a value
    /// replaces the cached one only if its reliability is at least as high.
    /// When the value is accepted and `trigger_reload` is set, a background
    /// task reloads the sub-locations `new` introduced.
    ///
    /// Returns whether the value was accepted.
    pub fn update(&self, key: K, new: Versioned<V>, trigger_reload: bool) -> bool {
        let incoming = Versioned::new(Arc::new(new.value), new.reliability);

        let (accepted, previous) = {
            let mut entries = self.shared.entries.lock();
            match entries.entry(key.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(incoming.clone());
                    (true, None)
                }
                Entry::Occupied(mut slot) => {
                    if slot.get().accepts(incoming.reliability) {
                        let previous = std::mem::replace(slot.get_mut(), incoming.clone());
                        (true, Some(previous.value))
                    } else {
                        (false, None)
                    }
                }
            }
        };

        if !accepted {
            Counters::bump(&self.shared.counters.rejected);
            tracing::debug!(
                ?key,
                reliability = ?incoming.reliability,
                "Update rejected, cached value is more reliable"
            );
            return false;
        }

        Counters::bump(&self.shared.counters.accepted);
        if trigger_reload {
            let cache = self.clone();
            let task_key = key.clone();
            let next = incoming.value;
            self.submit(
                &key,
                Box::new(move || {
                    cache.request_reload_if_changed(&task_key, previous.as_deref(), &next);
                }),
            );
        }
        true
    }

    /// Returns the cached value for `key`, inserting `default` if absent.
    ///
    /// A freshly inserted default is tagged [`Reliability::Empty`] and a
    /// background task is scheduled to populate the root. The default is
    /// returned immediately; later calls return the same value until the
    /// population lands.
    pub fn get_or_init(&self, key: K, default: impl FnOnce() -> V) -> Arc<V> {
        let value = {
            let mut entries = self.shared.entries.lock();
            if let Some(entry) = entries.get(&key) {
                return Arc::clone(&entry.value);
            }
            let value = Arc::new(default());
            entries.insert(key.clone(), Versioned::empty(Arc::clone(&value)));
            value
        };

        let cache = self.clone();
        let task_key = key.clone();
        self.submit(&key, Box::new(move || cache.run_populate(&task_key)));
        value
    }

    /// Schedules a reload for every sub-location of `new` missing from `old`.
    ///
    /// Sub-locations that disappeared are left alone. Returns the number of
    /// reload tasks scheduled.
    pub fn request_reload_if_changed(&self, key: &K, old: Option<&V>, new: &V) -> usize {
        let mut known: HashSet<V::Location> = old
            .map(|value| value.locations().into_iter().collect())
            .unwrap_or_default();

        let mut scheduled = 0;
        for location in new.locations() {
            if !self.permitted(key) {
                tracing::debug!(?key, "Background work no longer permitted, stopping reload");
                break;
            }
            if !known.insert(location.clone()) {
                continue;
            }
            if self.reload_location_async(key.clone(), location, Reliability::Defaults) {
                scheduled += 1;
            }
        }
        scheduled
    }

    /// Schedules a background reload of one sub-location.
    ///
    /// Returns whether the task was accepted by the queue.
    pub fn reload_location_async(
        &self,
        key: K,
        location: V::Location,
        reliability: Reliability,
    ) -> bool {
        let cache = self.clone();
        let task_key = key.clone();
        self.submit(
            &key,
            Box::new(move || cache.run_location_reload(&task_key, &location, reliability)),
        )
    }

    /// Stores freshly loaded `items` for one sub-location of `key`.
    ///
    /// Does nothing for roots that were never cached. The root keeps its
    /// reliability; the items are subject to the value's own accept policy.
    /// Returns whether the cached value changed.
    pub fn update_location(
        &self,
        key: &K,
        location: &V::Location,
        items: Versioned<V::Items>,
    ) -> bool {
        for _ in 0..self.shared.update_retries {
            let Some(current) = self.get(key) else {
                tracing::info!(?key, ?location, "Cannot update location, root not found");
                return false;
            };

            let Some(next) = current.with_items(location, items.clone()) else {
                tracing::debug!(?key, ?location, "Location update not applicable");
                return false;
            };

            let mut entries = self.shared.entries.lock();
            let Some(entry) = entries.get_mut(key) else {
                return false;
            };
            if Arc::ptr_eq(&entry.value, &current) {
                *entry = Versioned::new(Arc::new(next), entry.reliability);
                return true;
            }
            // Root replaced while `next` was being built; rebuild on top of it.
        }

        tracing::warn!(?key, ?location, "Location update abandoned after retries");
        false
    }

    /// Runs `probe` against the cached value for `key` without initializing
    /// or blocking.
    ///
    /// A missing root yields `Ok(None)`. Recoverable probe errors are logged
    /// and also yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns non-recoverable errors raised by `probe`.
    pub fn best_effort_lookup<R>(
        &self,
        key: &K,
        probe: impl FnOnce(&V) -> Result<Option<R>>,
    ) -> Result<Option<R>> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };

        match probe(&value) {
            Ok(found) => Ok(found),
            Err(err) if err.is_recoverable() => {
                Counters::bump(&self.shared.counters.lookups_swallowed);
                tracing::debug!(?key, error = %err, "Lookup failed, treating as absent");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Resolves `probe` through [`RootValue::working_location`] on a best-effort basis.
    ///
    /// # Errors
    ///
    /// Returns non-recoverable errors only.
    pub fn working_location(&self, key: &K, probe: &V::Probe) -> Result<Option<V::Found>> {
        self.best_effort_lookup(key, |value| value.working_location(probe))
    }

    fn permitted(&self, key: &K) -> bool {
        (self.shared.gate)(key)
    }

    fn submit(&self, key: &K, task: Task) -> bool {
        match self.shared.queue.submit(key, task) {
            Ok(()) => {
                Counters::bump(&self.shared.counters.reloads_scheduled);
                true
            }
            Err(err) => {
                Counters::bump(&self.shared.counters.submit_failures);
                tracing::warn!(?key, error = %err, "Failed to schedule background reload");
                false
            }
        }
    }

    fn run_populate(&self, key: &K) {
        if !self.permitted(key) {
            tracing::debug!(?key, "Population skipped, background work not permitted");
            return;
        }

        match self.shared.source.populate(key) {
            Ok(value) => {
                if !self.permitted(key) {
                    tracing::debug!(?key, "Population discarded, background work not permitted");
                    return;
                }
                self.update(key.clone(), value, true);
            }
            Err(err) => {
                Counters::bump(&self.shared.counters.reloads_failed);
                tracing::warn!(?key, error = %err, "Root population failed");
            }
        }
    }

    fn run_location_reload(&self, key: &K, location: &V::Location, reliability: Reliability) {
        if !self.permitted(key) {
            tracing::debug!(?key, ?location, "Reload skipped, background work not permitted");
            return;
        }

        match self.shared.source.load_location(key, location) {
            Ok(items) => {
                if !self.permitted(key) {
                    tracing::debug!(?key, ?location, "Reload discarded, background work not permitted");
                    return;
                }
                self.update_location(key, location, Versioned::new(items, reliability));
            }
            Err(err) => {
                Counters::bump(&self.shared.counters.reloads_failed);
                tracing::warn!(?key, ?location, error = %err, "Location reload failed");
            }
        }
    }
}
