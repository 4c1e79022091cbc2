#![allow(clippy::doc_markdown)]
//! `rootcache` CLI - replay root/branch fixtures against the refresh cache
//!
//! Usage:
//!   `rootcache simulate ./fixtures/demo.toml`
//!   `rootcache simulate ./fixtures/demo.toml --format json --lanes 4`
//!   `rootcache config`

mod fixture;
mod logging;
mod simulate;

use clap::{Parser, Subcommand};
use rootcache_core::RootCacheConfig;
use std::path::PathBuf;

use crate::simulate::OutputFormat;

#[derive(Parser)]
#[command(name = "rootcache")]
#[command(author, version, about = "rootcache CLI - per-root refresh cache driver")]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file
    #[arg(
        short,
        long,
        global = true,
        default_value = "rootcache.toml",
        env = "ROOTCACHE_CONFIG"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Populate the cache from a fixture and print the resulting snapshot
    Simulate {
        /// Path to fixture file (TOML)
        fixture: PathBuf,

        /// Override the number of worker lanes
        #[arg(long)]
        lanes: Option<usize>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Print the effective configuration
    Config,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = RootCacheConfig::load_from_path(&cli.config)?;

    match cli.command {
        Commands::Simulate {
            fixture,
            lanes,
            format,
        } => {
            if let Some(lanes) = lanes {
                config.queue.lanes = lanes;
            }
            config.validate()?;
            logging::init(&config.logging);

            tracing::info!(fixture = %fixture.display(), lanes = config.queue.lanes, "Starting simulation");
            let fixture = fixture::Fixture::load(&fixture)?;
            let report = simulate::run(&fixture, &config)?;
            simulate::print_report(&report, format)?;
        }
        Commands::Config => {
            config.validate()?;
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}
