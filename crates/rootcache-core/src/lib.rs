//! # `rootcache` Core
//!
//! Per-root versioned cache with reliability-ordered updates and
//! background reload.
//!
//! Each root (a working copy, a repository checkout, any opaque key) owns
//! one cached value tagged with a [`Reliability`]. Updates that are less
//! reliable than the cached value are rejected. Accepted updates can schedule
//! background reloads for the sub-locations they introduce, and reads never
//! wait for any of that work.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rootcache_core::{BranchLayout, KeyedRefreshCache, Reliability, Versioned, WorkerQueue};
//!
//! let queue = Arc::new(WorkerQueue::new(&config.queue)?);
//! let cache = KeyedRefreshCache::new(queue, Arc::new(my_source));
//!
//! // Read-through: returns a placeholder now, populates in the background.
//! let layout = cache.get_or_init("/work/project".to_string(), BranchLayout::default);
//!
//! // Explicit update; lower reliability than the cached value is rejected.
//! let layout = BranchLayout::new("svn://host/repo/trunk").with_location("svn://host/repo/branches");
//! cache.update("/work/project".to_string(), Versioned::new(layout, Reliability::Current), true);
//!
//! // Best-effort lookup: `None` for unknown roots or unresolvable URLs.
//! let branch = cache.working_location(&"/work/project".to_string(), "svn://host/repo/branches/x/src")?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]

pub mod cache;
pub mod config;
pub mod error;
pub mod layout;
pub mod queue;
pub mod reliability;
pub mod source;

pub use cache::{KeyedRefreshCache, RefreshStats, RootKey};
pub use config::{CacheConfig, ConfigError, LoggingConfig, QueueConfig, RootCacheConfig};
pub use error::{Error, Result};
pub use layout::{BranchItem, BranchLayout, RootValue};
pub use queue::{InlineQueue, Task, TaskQueue, WorkerQueue};
pub use reliability::{Reliability, Versioned};
pub use source::{open_gate, ReloadGate, ReloadSource};
