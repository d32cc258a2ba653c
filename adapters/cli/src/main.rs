#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs a seeded colony logistics scenario.

mod driver;
mod report;
mod scenario;

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::Parser;
use colony_logistics_core::LogisticsConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{driver::Driver, scenario::ScenarioLayout};

/// Arguments accepted by the colony logistics driver.
#[derive(Debug, Parser)]
#[command(
    name = "colony-logistics",
    about = "Runs harvesters and haulers through a seeded colony"
)]
struct Cli {
    /// TOML file overriding the default logistics configuration.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Number of ticks to simulate.
    #[arg(long, default_value_t = 200)]
    ticks: u64,
    /// Seed controlling the generated layout.
    #[arg(long, default_value_t = 1)]
    seed: u64,
    /// Number of harvesting agents.
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u32).range(0..=64))]
    harvesters: u32,
    /// Number of hauling agents.
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(0..=64))]
    haulers: u32,
    /// Harvesters deliver under wartime priorities.
    #[arg(long)]
    wartime: bool,
    /// Writes agent memory and the reservation ledger as JSON after the run.
    #[arg(long, value_name = "PATH")]
    dump_state: Option<PathBuf>,
}

/// Entry point for the colony logistics command-line interface.
fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = match cli.config.as_deref() {
        Some(path) => load_config(path)?,
        None => LogisticsConfig::default(),
    };

    let layout =
        ScenarioLayout::generate(cli.seed, config.resource, cli.harvesters, cli.haulers);
    let mut driver = Driver::new(&config, cli.wartime);
    driver.build(&layout)?;

    info!(ticks = cli.ticks, seed = cli.seed, "simulation started");
    for _ in 0..cli.ticks {
        driver.step();
    }
    println!("{}", driver.summary());

    if let Some(path) = cli.dump_state.as_deref() {
        driver.dump(path)?;
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: &Path) -> Result<LogisticsConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: LogisticsConfig = toml::from_str(&text)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    info!(path = %path.display(), "configuration loaded");
    Ok(config)
}
