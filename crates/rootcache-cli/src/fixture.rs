//! Simulation fixtures.
//!
//! A fixture describes working-copy roots as a repository would report them,
//! the branches found under each branch parent, and the explicit updates and
//! lookups to replay against the cache.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use anyhow::Context;
use rootcache_core::{
    BranchItem, BranchLayout, Error, Reliability, ReloadSource, Result, Versioned,
};
use serde::Deserialize;

/// Parsed fixture file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Fixture {
    /// Roots known to the repository.
    pub roots: Vec<RootFixture>,
    /// Branches per branch parent URL.
    pub branches: BTreeMap<String, Vec<BranchItem>>,
    /// Roots whose repository is unreachable.
    pub unavailable: Vec<String>,
    /// Updates applied after initial population.
    pub updates: Vec<UpdateFixture>,
    /// Working-location lookups run at the end.
    pub lookups: Vec<LookupFixture>,
}

/// Layout the repository reports for a root.
#[derive(Debug, Clone, Deserialize)]
pub struct RootFixture {
    pub path: String,
    #[serde(default = "detected")]
    pub reliability: Reliability,
    #[serde(default)]
    pub layout: BranchLayout,
}

/// Explicit update, as if configured by the user.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateFixture {
    pub root: String,
    #[serde(default = "confirmed")]
    pub reliability: Reliability,
    pub layout: BranchLayout,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LookupFixture {
    pub root: String,
    pub url: String,
}

fn detected() -> Reliability {
    Reliability::Defaults
}

fn confirmed() -> Reliability {
    Reliability::Current
}

impl Fixture {
    /// Reads a fixture from a TOML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("Invalid fixture {}", path.display()))
    }

    /// Parses a fixture from a TOML string.
    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }
}

/// Serves a fixture as a reload source.
pub struct FixtureSource {
    roots: HashMap<String, Versioned<BranchLayout>>,
    branches: HashMap<String, Vec<BranchItem>>,
    unavailable: HashSet<String>,
}

impl From<&Fixture> for FixtureSource {
    fn from(fixture: &Fixture) -> Self {
        Self {
            roots: fixture
                .roots
                .iter()
                .map(|r| (r.path.clone(), Versioned::new(r.layout.clone(), r.reliability)))
                .collect(),
            branches: fixture
                .branches
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            unavailable: fixture.unavailable.iter().cloned().collect(),
        }
    }
}

impl ReloadSource<String, BranchLayout> for FixtureSource {
    fn populate(&self, key: &String) -> Result<Versioned<BranchLayout>> {
        if self.unavailable.contains(key) {
            return Err(Error::SourceUnavailable(format!("{key}: repository unreachable")));
        }
        self.roots
            .get(key)
            .cloned()
            .ok_or_else(|| Error::SourceUnavailable(format!("{key}: not a working copy")))
    }

    fn load_location(&self, key: &String, location: &String) -> Result<Vec<BranchItem>> {
        if self.unavailable.contains(key) {
            return Err(Error::SourceUnavailable(format!("{key}: repository unreachable")));
        }
        Ok(self.branches.get(location).cloned().unwrap_or_default())
    }
}
