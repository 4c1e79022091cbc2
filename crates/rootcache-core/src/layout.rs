//! Values stored per root.
//!
//! The cache is generic over [`RootValue`]: a value that can enumerate its
//! sub-locations, absorb freshly loaded items for one of them, and answer
//! "which sub-location does this probe belong to". [`BranchLayout`] is the
//! concrete value used for version-control roots: a trunk plus a set of
//! branch parents, each with its own versioned list of branches.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::hash::Hash;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::reliability::Versioned;

/// A value the refresh cache can hold for a root.
pub trait RootValue: Clone + Send + Sync + 'static {
    /// Identifier of a sub-location that can be reloaded independently.
    type Location: Clone + Eq + Hash + Debug + Send + Sync + 'static;
    /// Data loaded for a single sub-location.
    type Items: Clone + Send + Sync + 'static;
    /// Input to [`RootValue::working_location`].
    type Probe: ?Sized;
    /// Output of [`RootValue::working_location`].
    type Found;

    /// Sub-locations that should be kept loaded.
    fn locations(&self) -> Vec<Self::Location>;

    /// Returns a copy of `self` with `items` stored for `location`.
    ///
    /// Returns `None` when `location` is unknown to this value or when the
    /// items already stored for it are more reliable than `items`.
    fn with_items(&self, location: &Self::Location, items: Versioned<Self::Items>) -> Option<Self>;

    /// Resolves `probe` against this value.
    ///
    /// # Errors
    ///
    /// Returns a recoverable [`Error::Binding`] when the probe or the value
    /// cannot be interpreted.
    fn working_location(&self, probe: &Self::Probe) -> Result<Option<Self::Found>>;
}

/// A single branch under a branch location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchItem {
    /// Full URL of the branch.
    pub url: String,
    /// Revision the branch was created at.
    pub revision: u64,
    /// Creation time, when the source reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl BranchItem {
    /// Creates a branch item without a creation time.
    #[must_use]
    pub fn new(url: impl Into<String>, revision: u64) -> Self {
        Self {
            url: url.into(),
            revision,
            created_at: None,
        }
    }
}

/// Branch configuration of one version-control root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchLayout {
    /// Trunk URL, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trunk: Option<String>,
    /// Branch parents, in insertion order.
    #[serde(default)]
    locations: Vec<String>,
    /// Loaded branches per branch parent.
    #[serde(default)]
    branches: BTreeMap<String, Versioned<Vec<BranchItem>>>,
}

impl BranchLayout {
    /// Creates an empty layout with the given trunk.
    #[must_use]
    pub fn new(trunk: impl Into<String>) -> Self {
        Self {
            trunk: Some(trunk.into()),
            ..Self::default()
        }
    }

    /// Adds a branch location. Duplicates are ignored.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.add_location(location);
        self
    }

    /// Adds a branch location in place. Duplicates are ignored.
    pub fn add_location(&mut self, location: impl Into<String>) {
        let location = location.into();
        if !self.locations.contains(&location) {
            self.locations.push(location);
        }
    }

    /// Branch locations in insertion order.
    #[must_use]
    pub fn branch_locations(&self) -> &[String] {
        &self.locations
    }

    /// Branches loaded for `location`, if any.
    #[must_use]
    pub fn branches(&self, location: &str) -> Option<&Versioned<Vec<BranchItem>>> {
        self.branches.get(location)
    }
}

impl RootValue for BranchLayout {
    type Location = String;
    type Items = Vec<BranchItem>;
    type Probe = str;
    type Found = String;

    fn locations(&self) -> Vec<String> {
        self.locations.clone()
    }

    fn with_items(&self, location: &String, items: Versioned<Vec<BranchItem>>) -> Option<Self> {
        if !self.locations.contains(location) {
            return None;
        }
        if let Some(existing) = self.branches.get(location) {
            if !existing.accepts(items.reliability) {
                return None;
            }
        }

        let mut next = self.clone();
        next.branches.insert(location.clone(), items);
        Some(next)
    }

    fn working_location(&self, url: &str) -> Result<Option<String>> {
        let url = normalize_url(url)?;

        if let Some(trunk) = &self.trunk {
            let trunk = normalize_url(trunk)?;
            if is_under(url, trunk) {
                return Ok(Some(trunk.to_string()));
            }
        }

        for location in &self.locations {
            let location = normalize_url(location)?;
            if url.len() > location.len() && is_under(url, location) {
                let rest = &url[location.len() + 1..];
                if let Some(segment) = rest.split('/').next().filter(|s| !s.is_empty()) {
                    return Ok(Some(format!("{location}/{segment}")));
                }
            }
        }

        Ok(None)
    }
}

/// Validates an absolute `scheme://...` URL and strips trailing slashes.
fn normalize_url(url: &str) -> Result<&str> {
    let Some((scheme, rest)) = url.split_once("://") else {
        return Err(Error::Binding(format!("'{url}' is not an absolute URL")));
    };

    let scheme_ok = !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if !scheme_ok || rest.trim_end_matches('/').is_empty() {
        return Err(Error::Binding(format!("'{url}' is not an absolute URL")));
    }

    Ok(url.trim_end_matches('/'))
}

fn is_under(url: &str, parent: &str) -> bool {
    url == parent
        || (url.starts_with(parent) && url.as_bytes().get(parent.len()) == Some(&b'/'))
}
