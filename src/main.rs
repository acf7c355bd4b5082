use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use env_logger;

use rust_active_path_choice::{assign_demand, compute_logsums, LogsumConfig, Result};


/// Computes bike or walk path choice logsums between zones.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to the YAML run configuration
    config: Option<PathBuf>,
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    let config_path = match args.config {
        Some(path) => path,
        None => {
            log::error!("no config file given; usage: rust_active_path_choice <CONFIG>");
            process::exit(2);
        }
    };

    if let Err(err) = run(&config_path) {
        log::error!("{}", err);
        process::exit(1);
    }
}

fn run(config_path: &Path) -> Result<()> {
    let cfg = LogsumConfig::from_path(config_path)?;
    let summary = compute_logsums(&cfg)?;
    if summary.unreachable > 0 || summary.no_alternative > 0 {
        log::warn!("{} OD pairs were unreachable and {} had no alternatives",
                   summary.unreachable, summary.no_alternative);
    }
    if summary.insufficient_sample > 0 {
        log::warn!("{} OD pairs had an insufficient path sample", summary.insufficient_sample);
    }
    if cfg.assignment.is_some() {
        let assigned = assign_demand(&cfg)?;
        if assigned.unassigned > 0 {
            log::warn!("{} demand records could not be assigned", assigned.unassigned);
        }
    }
    return Ok(());
}
