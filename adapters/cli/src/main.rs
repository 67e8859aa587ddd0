#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs a headless Lane Skirmish match.

use std::{fs, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use lane_skirmish_cli::Simulation;
use lane_skirmish_system_bootstrap::Scenario;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Runs a fixed number of simulation ticks and logs the outcome.
#[derive(Debug, Parser)]
#[command(name = "lane-skirmish", version, about)]
struct Args {
    /// TOML scenario file. The built-in lane map is used when omitted.
    #[arg(long)]
    scenario: Option<PathBuf>,
    /// Number of ticks to simulate.
    #[arg(long, default_value_t = 600)]
    ticks: u64,
    /// Simulated milliseconds per tick.
    #[arg(long, default_value_t = 100)]
    tick_ms: u64,
    /// Match seed overriding the scenario's per-system seeds.
    #[arg(long)]
    seed: Option<u64>,
}

/// Entry point for the Lane Skirmish command-line interface.
fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut scenario = match &args.scenario {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read scenario {}", path.display()))?;
            Scenario::from_toml_str(&text)
                .with_context(|| format!("invalid scenario {}", path.display()))?
        }
        None => Scenario::default(),
    };
    if let Some(seed) = args.seed {
        scenario.reseed(seed);
    }

    let mut simulation = Simulation::new(&scenario, Duration::from_millis(args.tick_ms))
        .context("failed to build simulation")?;
    let summary = simulation.run(args.ticks);

    info!(
        ticks = summary.ticks,
        elapsed_secs = summary.elapsed.as_secs_f64(),
        allies = summary.allies,
        enemies = summary.enemies,
        allies_lost = summary.allies_lost,
        enemies_lost = summary.enemies_lost,
        resources = summary.resources,
        "match finished"
    );
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
