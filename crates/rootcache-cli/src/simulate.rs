//! Replays a fixture against a live refresh cache.

use std::collections::BTreeMap;
use std::sync::Arc;

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use rootcache_core::{
    BranchLayout, KeyedRefreshCache, RefreshStats, Reliability, RootCacheConfig, RootValue,
    Versioned, WorkerQueue,
};
use serde::Serialize;

use crate::fixture::{Fixture, FixtureSource};

/// Report output format.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub roots: Vec<RootReport>,
    pub lookups: Vec<LookupReport>,
    pub stats: RefreshStats,
}

#[derive(Debug, Serialize)]
pub struct RootReport {
    pub path: String,
    pub reliability: Option<Reliability>,
    pub trunk: Option<String>,
    /// Branch count per branch parent; `None` when not loaded.
    pub branches: BTreeMap<String, Option<usize>>,
}

#[derive(Debug, Serialize)]
pub struct LookupReport {
    pub root: String,
    pub url: String,
    pub working: Option<String>,
}

/// Populates every fixture root, applies the fixture's updates and runs its
/// lookups.
pub fn run(fixture: &Fixture, config: &RootCacheConfig) -> anyhow::Result<Report> {
    let queue = Arc::new(WorkerQueue::new(&config.queue)?);
    let source = Arc::new(FixtureSource::from(fixture));
    let cache: KeyedRefreshCache<String, BranchLayout> = KeyedRefreshCache::with_config(
        queue.clone(),
        source,
        rootcache_core::open_gate(),
        &config.cache,
    );
    let idle_timeout = config.queue.idle_timeout();

    for root in &fixture.roots {
        let _ = cache.get_or_init(root.path.clone(), BranchLayout::default);
    }
    for root in &fixture.unavailable {
        let _ = cache.get_or_init(root.clone(), BranchLayout::default);
    }
    if !queue.wait_idle(idle_timeout) {
        tracing::warn!(pending = queue.pending(), "Population did not finish in time");
    }

    for update in &fixture.updates {
        let accepted = cache.update(
            update.root.clone(),
            Versioned::new(update.layout.clone(), update.reliability),
            true,
        );
        tracing::info!(root = %update.root, accepted, "Applied fixture update");
    }
    if !queue.wait_idle(idle_timeout) {
        tracing::warn!(pending = queue.pending(), "Reloads did not finish in time");
    }

    let lookups = fixture
        .lookups
        .iter()
        .map(|lookup| {
            let working = cache.working_location(&lookup.root, &lookup.url)?;
            Ok(LookupReport {
                root: lookup.root.clone(),
                url: lookup.url.clone(),
                working,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut roots: Vec<RootReport> = cache
        .snapshot()
        .into_iter()
        .map(|(path, layout)| RootReport {
            reliability: cache.reliability(&path),
            trunk: layout.trunk.clone(),
            branches: layout
                .locations()
                .into_iter()
                .map(|location| {
                    let count = layout.branches(&location).map(|b| b.value.len());
                    (location, count)
                })
                .collect(),
            path,
        })
        .collect();
    roots.sort_by(|a, b| a.path.cmp(&b.path));

    queue.shutdown();

    Ok(Report {
        roots,
        lookups,
        stats: cache.stats(),
    })
}

/// Prints `report` to stdout.
pub fn print_report(report: &Report, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["Root", "Reliability", "Trunk", "Branch parents"]);

            for root in &report.roots {
                let parents = root
                    .branches
                    .iter()
                    .map(|(location, count)| match count {
                        Some(n) => format!("{location} ({n})"),
                        None => format!("{location} (not loaded)"),
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                table.add_row(vec![
                    Cell::new(&root.path),
                    Cell::new(root.reliability.map_or("-".to_string(), |r| format!("{r:?}"))),
                    Cell::new(root.trunk.as_deref().unwrap_or("-")),
                    Cell::new(parents),
                ]);
            }
            println!("{table}");

            if !report.lookups.is_empty() {
                println!("\n{}", "Lookups".green().bold());
                for lookup in &report.lookups {
                    println!(
                        "  {} {} -> {}",
                        lookup.root,
                        lookup.url,
                        lookup.working.as_deref().unwrap_or("(none)")
                    );
                }
            }

            let stats = &report.stats;
            println!("\n{}", "Cache Summary".green().bold());
            println!("  Accepted updates:  {}", stats.accepted);
            println!("  Rejected updates:  {}", stats.rejected);
            println!("  Reloads scheduled: {}", stats.reloads_scheduled);
            if stats.reloads_failed > 0 {
                println!(
                    "  Reloads failed:    {}",
                    stats.reloads_failed.to_string().red()
                );
            }
        }
    }
    Ok(())
}
