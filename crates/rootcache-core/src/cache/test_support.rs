//! Collaborators for cache unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::KeyedRefreshCache;
use crate::error::{Error, Result};
use crate::layout::{BranchItem, BranchLayout};
use crate::queue::{Task, TaskQueue};
use crate::reliability::{Reliability, Versioned};
use crate::source::ReloadSource;

/// Queue that holds tasks until the test runs them.
#[derive(Default)]
pub(super) struct ManualQueue {
    tasks: Mutex<VecDeque<(String, Task)>>,
    closed: AtomicBool,
}

impl ManualQueue {
    pub(super) fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub(super) fn keys(&self) -> Vec<String> {
        self.tasks.lock().iter().map(|(k, _)| k.clone()).collect()
    }

    pub(super) fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub(super) fn run_next(&self) -> bool {
        let next = self.tasks.lock().pop_front();
        match next {
            Some((_, task)) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Runs tasks, including ones they submit, until the queue is empty.
    pub(super) fn run_all(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        ran
    }
}

impl TaskQueue<String> for ManualQueue {
    fn submit(&self, key: &String, task: Task) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::QueueClosed);
        }
        self.tasks.lock().push_back((key.clone(), task));
        Ok(())
    }
}

/// In-memory reload source with call recording.
#[derive(Default)]
pub(super) struct FakeSource {
    layouts: Mutex<HashMap<String, Versioned<BranchLayout>>>,
    branches: Mutex<HashMap<String, Vec<BranchItem>>>,
    pub(super) populate_calls: AtomicUsize,
    pub(super) loaded_locations: Mutex<Vec<String>>,
    pub(super) unavailable: AtomicBool,
}

impl FakeSource {
    pub(super) fn set_layout(&self, root: &str, layout: BranchLayout, reliability: Reliability) {
        self.layouts
            .lock()
            .insert(root.to_string(), Versioned::new(layout, reliability));
    }

    pub(super) fn set_branches(&self, location: &str, items: Vec<BranchItem>) {
        self.branches.lock().insert(location.to_string(), items);
    }
}

impl ReloadSource<String, BranchLayout> for FakeSource {
    fn populate(&self, key: &String) -> Result<Versioned<BranchLayout>> {
        self.populate_calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::SourceUnavailable(key.clone()));
        }
        self.layouts
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::SourceUnavailable(format!("no layout for {key}")))
    }

    fn load_location(&self, _key: &String, location: &String) -> Result<Vec<BranchItem>> {
        self.loaded_locations.lock().push(location.clone());
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::SourceUnavailable(location.clone()));
        }
        Ok(self
            .branches
            .lock()
            .get(location)
            .cloned()
            .unwrap_or_default())
    }
}

pub(super) type TestCache = KeyedRefreshCache<String, BranchLayout>;

pub(super) fn setup() -> (TestCache, Arc<ManualQueue>, Arc<FakeSource>) {
    let queue = Arc::new(ManualQueue::default());
    let source = Arc::new(FakeSource::default());
    let cache = TestCache::new(queue.clone(), source.clone());
    (cache, queue, source)
}

pub(super) fn layout(locations: &[&str]) -> BranchLayout {
    locations.iter().fold(
        BranchLayout::new("svn://host/repo/trunk"),
        |layout, location| layout.with_location(*location),
    )
}

pub(super) fn versioned(locations: &[&str], reliability: Reliability) -> Versioned<BranchLayout> {
    Versioned::new(layout(locations), reliability)
}
