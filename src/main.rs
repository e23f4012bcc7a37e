use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use grid_traffic::simulation::{SharedSim, SimConfig, SimWorld};

#[derive(Parser)]
#[command(name = "grid_traffic")]
#[command(about = "Grid traffic simulation with learning cars and lights")]
struct Cli {
    /// JSON configuration file (defaults to the built-in loop scenario)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of simulation ticks to run
    #[arg(long, default_value = "100")]
    ticks: u32,

    /// Override the RNG seed from the configuration
    #[arg(long)]
    seed: Option<u64>,

    /// Print every snapshot as a JSON line
    #[arg(long)]
    json: bool,

    /// Draw the grid after the run
    #[arg(long)]
    map: bool,

    /// Step once per line read from stdin and answer with a JSON snapshot
    #[arg(long)]
    stdin: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("warn,grid_traffic=info"),
    )
    .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SimConfig::from_json_file(path)?,
        None => SimConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }

    let world = SimWorld::from_config(&config).context("Failed to build simulation")?;
    let sim = SharedSim::new(world);

    if cli.stdin {
        serve_stdin(&sim)
    } else {
        run_headless(&sim, cli.ticks, cli.json, cli.map)
    }
}

/// Run a fixed number of ticks and report the final state
fn run_headless(sim: &SharedSim, ticks: u32, json: bool, map: bool) -> Result<()> {
    info!("Running grid traffic simulation for {} ticks", ticks);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for _ in 0..ticks {
        let snapshot = sim.step()?;
        if json {
            writeln!(out, "{}", snapshot.to_json()?)?;
        }
    }

    let report = sim.with_world(|world| {
        world.log_status();
        let mut report = world.summary();
        if map {
            report.push_str(&world.render_map());
        }
        report
    })?;
    write!(out, "{}", report)?;

    info!("=== SIMULATION COMPLETE ===");
    Ok(())
}

/// Line-driven stepping: every input line requests one tick
fn serve_stdin(sim: &SharedSim) -> Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in stdin.lock().lines() {
        line.context("Failed to read step request")?;
        let snapshot = sim.step()?;
        writeln!(out, "{}", snapshot.to_json()?)?;
        out.flush()?;
    }
    Ok(())
}
