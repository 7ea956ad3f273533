mod config;
mod engine;
mod manager;
mod model;
mod particles;
mod presets;
mod report;
mod stats;
mod tuner;

use crate::manager::Manager;
use crate::presets::Scenario;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    #[arg(long)]
    work_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Search particle-flow configs and save the top 3.
    Tune {
        #[arg(long)]
        trials: Option<usize>,
    },

    /// Show the saved top 3.
    List,

    /// Make one of the saved configs active.
    Apply {
        #[arg(long, default_value_t = 1)]
        index: usize,
    },

    /// Simulate a scenario with the active config.
    Simulate {
        #[arg(long, value_enum, default_value_t = Scenario::Present)]
        scenario: Scenario,

        #[arg(long)]
        ticks: Option<usize>,
    },

    /// Simulate every scenario with the active config and compare them.
    Compare {
        #[arg(long)]
        ticks: Option<usize>,
    },

    /// Remove generated files.
    Clean,
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let mgr = Manager::new(args.work_dir).context("failed to construct mgr")?;

    match args.command {
        Command::Tune { trials } => mgr.tune(trials)?,
        Command::List => mgr.list()?,
        Command::Apply { index } => mgr.apply(index)?,
        Command::Simulate { scenario, ticks } => mgr.simulate(scenario, ticks)?,
        Command::Compare { ticks } => mgr.compare(ticks)?,
        Command::Clean => mgr.clean()?,
    }

    Ok(())
}
