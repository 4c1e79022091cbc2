//! End-to-end tests: a refresh cache backed by worker lanes and an in-memory
//! repository source.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rootcache_core::{
    BranchItem, BranchLayout, CacheConfig, Error, InlineQueue, KeyedRefreshCache, QueueConfig,
    Reliability, ReloadGate, ReloadSource, Result, RootCacheConfig, RootValue, Versioned,
    WorkerQueue,
};

const IDLE: Duration = Duration::from_secs(5);

/// Repository server stand-in: layouts per working copy, branches per parent.
#[derive(Default)]
struct Repository {
    layouts: Mutex<HashMap<String, BranchLayout>>,
    branches: Mutex<HashMap<String, Vec<BranchItem>>>,
    offline: AtomicBool,
    requests: AtomicUsize,
}

impl Repository {
    fn with_root(self, root: &str, layout: BranchLayout) -> Self {
        self.layouts.lock().insert(root.to_string(), layout);
        self
    }

    fn with_branches(self, parent: &str, names: &[&str]) -> Self {
        let items = names
            .iter()
            .enumerate()
            .map(|(rev, name)| BranchItem::new(format!("{parent}/{name}"), rev as u64 + 1))
            .collect();
        self.branches.lock().insert(parent.to_string(), items);
        self
    }
}

impl ReloadSource<String, BranchLayout> for Repository {
    fn populate(&self, key: &String) -> Result<Versioned<BranchLayout>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::SourceUnavailable("repository offline".into()));
        }
        let layout = self
            .layouts
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::SourceUnavailable(format!("{key} is not a working copy")))?;
        Ok(Versioned::new(layout, Reliability::Defaults))
    }

    fn load_location(&self, _key: &String, location: &String) -> Result<Vec<BranchItem>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::SourceUnavailable("repository offline".into()));
        }
        Ok(self
            .branches
            .lock()
            .get(location)
            .cloned()
            .unwrap_or_default())
    }
}

fn standard_layout() -> BranchLayout {
    BranchLayout::new("svn://host/repo/trunk").with_location("svn://host/repo/branches")
}

fn worker_queue() -> Arc<WorkerQueue> {
    let config = RootCacheConfig::from_toml("[queue]\nlanes = 3\nthread_name = \"it\"")
        .expect("config");
    config.validate().expect("valid");
    Arc::new(WorkerQueue::new(&config.queue).expect("queue"))
}

#[test]
fn test_read_through_then_background_population() {
    let repo = Arc::new(
        Repository::default()
            .with_root("/work/app", standard_layout())
            .with_branches("svn://host/repo/branches", &["feature-a", "feature-b"]),
    );
    let queue = worker_queue();
    let cache: KeyedRefreshCache<String, BranchLayout> =
        KeyedRefreshCache::new(queue.clone(), repo.clone());
    let root = "/work/app".to_string();

    let placeholder = cache.get_or_init(root.clone(), BranchLayout::default);
    assert!(placeholder.trunk.is_none());

    assert!(queue.wait_idle(IDLE));

    let layout = cache.get(&root).expect("populated");
    assert_eq!(layout.trunk.as_deref(), Some("svn://host/repo/trunk"));
    let branches = layout.branches("svn://host/repo/branches").expect("loaded");
    assert_eq!(branches.value.len(), 2);

    let working = cache
        .working_location(&root, "svn://host/repo/branches/feature-b/README")
        .expect("lookup");
    assert_eq!(working.as_deref(), Some("svn://host/repo/branches/feature-b"));
}

#[test]
fn test_user_configuration_beats_detected_defaults() {
    let repo = Arc::new(Repository::default().with_root("/work/app", standard_layout()));
    let queue = worker_queue();
    let cache: KeyedRefreshCache<String, BranchLayout> =
        KeyedRefreshCache::new(queue.clone(), repo.clone());
    let root = "/work/app".to_string();

    let user_layout = BranchLayout::new("svn://host/repo/main").with_location("svn://host/repo/dev");
    assert!(cache.update(root.clone(), Versioned::new(user_layout, Reliability::Current), true));
    assert!(queue.wait_idle(IDLE));

    // A later detection pass must not clobber the user's choice.
    let detected = Versioned::new(standard_layout(), Reliability::Defaults);
    assert!(!cache.update(root.clone(), detected, true));

    let layout = cache.get(&root).expect("cached");
    assert_eq!(layout.trunk.as_deref(), Some("svn://host/repo/main"));
    assert_eq!(layout.locations(), vec!["svn://host/repo/dev".to_string()]);
}

#[test]
fn test_offline_repository_keeps_placeholder() {
    let repo = Arc::new(Repository::default().with_root("/work/app", standard_layout()));
    repo.offline.store(true, Ordering::SeqCst);
    let queue = worker_queue();
    let cache: KeyedRefreshCache<String, BranchLayout> =
        KeyedRefreshCache::new(queue.clone(), repo.clone());
    let root = "/work/app".to_string();

    cache.get_or_init(root.clone(), BranchLayout::default);
    assert!(queue.wait_idle(IDLE));

    assert_eq!(cache.reliability(&root), Some(Reliability::Empty));
    assert_eq!(cache.stats().reloads_failed, 1);
    let working = cache
        .working_location(&root, "svn://host/repo/trunk/x")
        .expect("lookup");
    assert_eq!(working, None);
}

#[test]
fn test_detached_root_discards_background_results() {
    let repo = Arc::new(
        Repository::default()
            .with_root("/work/app", standard_layout())
            .with_root("/work/detached", standard_layout()),
    );
    let gate: ReloadGate<String> = Arc::new(|root: &String| root != "/work/detached");
    let cache: KeyedRefreshCache<String, BranchLayout> = KeyedRefreshCache::with_config(
        Arc::new(InlineQueue),
        repo.clone(),
        gate,
        &CacheConfig::default(),
    );

    cache.get_or_init("/work/app".to_string(), BranchLayout::default);
    cache.get_or_init("/work/detached".to_string(), BranchLayout::default);

    assert_eq!(
        cache.reliability(&"/work/app".to_string()),
        Some(Reliability::Defaults)
    );
    assert_eq!(
        cache.reliability(&"/work/detached".to_string()),
        Some(Reliability::Empty)
    );
}

#[test]
fn test_inline_queue_adds_only_new_branch_parents() {
    let repo = Arc::new(
        Repository::default()
            .with_branches("svn://host/repo/branches", &["a"])
            .with_branches("svn://host/repo/releases", &["1.0", "2.0"]),
    );
    let cache: KeyedRefreshCache<String, BranchLayout> =
        KeyedRefreshCache::new(Arc::new(InlineQueue), repo.clone());
    let root = "/work/app".to_string();

    cache.update(root.clone(), Versioned::new(standard_layout(), Reliability::Defaults), true);
    let after_first = repo.requests.load(Ordering::SeqCst);
    assert_eq!(after_first, 1);

    let extended = standard_layout().with_location("svn://host/repo/releases");
    cache.update(root.clone(), Versioned::new(extended, Reliability::Defaults), true);

    assert_eq!(repo.requests.load(Ordering::SeqCst), after_first + 1);
    let layout = cache.get(&root).expect("cached");
    assert!(layout.branches("svn://host/repo/releases").is_some());
    // Replaced wholesale: branches of the old value are not carried over.
    assert!(layout.branches("svn://host/repo/branches").is_none());
}

#[test]
fn test_queue_config_drives_lane_count() {
    let queue = WorkerQueue::new(&QueueConfig {
        lanes: 5,
        ..QueueConfig::default()
    })
    .expect("queue");

    assert_eq!(queue.lanes(), 5);
}
