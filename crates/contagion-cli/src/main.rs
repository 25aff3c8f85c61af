//! Runs a contagion scenario and reports the final state.

mod telemetry;

use anyhow::{Context, Result};
use clap::Parser;
use contagion_core::ScenarioConfig;
use contagion_world::Simulation;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "contagion", version, about = "Discrete-tick epidemic propagation over connected regions")]
struct Args {
    /// Scenario file (JSON)
    scenario: PathBuf,

    /// Override the number of ticks to simulate
    #[arg(long)]
    ticks: Option<u64>,

    /// Override the random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    telemetry::init_telemetry(args.log_json)?;

    let mut scenario = ScenarioConfig::from_path(&args.scenario)
        .with_context(|| format!("failed to load scenario {}", args.scenario.display()))?;
    if let Some(ticks) = args.ticks {
        scenario.simulation.num_ticks = ticks;
    }
    if let Some(seed) = args.seed {
        scenario.simulation.seed = seed;
    }

    info!(scenario = %args.scenario.display(), "Loading scenario");
    let mut simulation = Simulation::from_scenario(scenario).context("invalid scenario")?;
    let report = simulation.run().context("simulation failed")?;
    let json = report.to_json()?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("failed to write report to {}", path.display()))?;
            info!(output = %path.display(), "Report written");
        }
        None => println!("{}", json),
    }
    Ok(())
}
