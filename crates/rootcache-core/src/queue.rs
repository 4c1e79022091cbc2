//! Background task queues.
//!
//! The cache never runs reload work itself: it hands closures to a
//! [`TaskQueue`] and returns immediately.
//!
//! - [`WorkerQueue`]: a fixed set of worker threads ("lanes"), each draining
//!   its own channel. A key always maps to the same lane, so work submitted
//!   for one key runs in submission order while different keys may proceed
//!   concurrently.
//! - [`InlineQueue`]: runs every task on the submitting thread. Deterministic,
//!   intended for tests and one-shot tools.

use std::hash::{Hash, Hasher};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex, RwLock};
use rustc_hash::FxHasher;

use crate::config::QueueConfig;
use crate::error::{Error, Result};

/// A unit of background work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Accepts background work for a key without blocking the caller.
pub trait TaskQueue<K>: Send + Sync {
    /// Submits `task` on behalf of `key`.
    ///
    /// Tasks submitted for the same key must run in submission order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueueClosed`] if the queue no longer accepts work.
    fn submit(&self, key: &K, task: Task) -> Result<()>;
}

/// Counts tasks submitted but not yet finished.
#[derive(Default)]
struct Pending {
    count: Mutex<usize>,
    idle: Condvar,
}

impl Pending {
    fn start(&self) {
        *self.count.lock() += 1;
    }

    fn finish(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    fn get(&self) -> usize {
        *self.count.lock()
    }

    fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = self.count.lock();
        while *count > 0 {
            if self.idle.wait_until(&mut count, deadline).timed_out() {
                return *count == 0;
            }
        }
        true
    }
}

/// Multi-lane worker pool backed by `crossbeam-channel`.
pub struct WorkerQueue {
    /// One sender per lane; `None` once shut down.
    senders: RwLock<Option<Vec<Sender<Task>>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    pending: Arc<Pending>,
}

impl WorkerQueue {
    /// Starts `config.lanes` worker threads.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `lanes` is zero, or [`Error::Io`] if a
    /// worker thread cannot be spawned.
    pub fn new(config: &QueueConfig) -> Result<Self> {
        if config.lanes == 0 {
            return Err(Error::Config("queue.lanes must be at least 1".to_string()));
        }

        let pending = Arc::new(Pending::default());
        let mut senders = Vec::with_capacity(config.lanes);
        let mut workers = Vec::with_capacity(config.lanes);

        for lane in 0..config.lanes {
            let (tx, rx) = unbounded::<Task>();
            let pending = Arc::clone(&pending);
            let handle = thread::Builder::new()
                .name(format!("{}-{lane}", config.thread_name))
                .spawn(move || run_lane(lane, &rx, &pending))?;
            senders.push(tx);
            workers.push(handle);
        }

        tracing::debug!(lanes = config.lanes, "Worker queue started");

        Ok(Self {
            senders: RwLock::new(Some(senders)),
            workers: Mutex::new(workers),
            pending,
        })
    }

    /// Number of lanes, or 0 after shutdown.
    #[must_use]
    pub fn lanes(&self) -> usize {
        self.senders.read().as_ref().map_or(0, Vec::len)
    }

    /// Tasks submitted but not yet finished.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.get()
    }

    /// Blocks until every submitted task has finished or `timeout` elapses.
    ///
    /// Returns true if the queue became idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.pending.wait_idle(timeout)
    }

    /// Stops accepting work, drains queued tasks and joins the workers.
    ///
    /// Safe to call more than once, and from a worker thread.
    pub fn shutdown(&self) {
        // Dropping the senders ends each lane once its backlog is drained.
        let closed = self.senders.write().take();
        if closed.is_none() {
            return;
        }
        drop(closed);

        let current = thread::current().id();
        let workers = std::mem::take(&mut *self.workers.lock());
        for handle in workers {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                tracing::error!("Worker lane terminated abnormally");
            }
        }
        tracing::debug!("Worker queue shut down");
    }

    fn lane_for<K: Hash>(key: &K, lanes: usize) -> usize {
        let mut hasher = FxHasher::default();
        key.hash(&mut hasher);
        (hasher.finish() % lanes as u64) as usize
    }
}

impl<K: Hash> TaskQueue<K> for WorkerQueue {
    fn submit(&self, key: &K, task: Task) -> Result<()> {
        let guard = self.senders.read();
        let senders = guard.as_ref().ok_or(Error::QueueClosed)?;
        let lane = Self::lane_for(key, senders.len());

        self.pending.start();
        if senders[lane].send(task).is_err() {
            self.pending.finish();
            return Err(Error::QueueClosed);
        }
        Ok(())
    }
}

impl Drop for WorkerQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_lane(lane: usize, rx: &Receiver<Task>, pending: &Pending) {
    for task in rx.iter() {
        if let Err(panic) = catch_unwind(AssertUnwindSafe(task)) {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!(lane, %message, "Background task panicked");
        }
        pending.finish();
    }
}

/// Runs each task immediately on the submitting thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineQueue;

impl<K> TaskQueue<K> for InlineQueue {
    fn submit(&self, _key: &K, task: Task) -> Result<()> {
        task();
        Ok(())
    }
}
