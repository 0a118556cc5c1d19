//! `swarmgrid` — decentralized multi-agent pathfinding on a lossy bus.
//!
//! Loads an obstacle map, places agents, runs the coordination engine to
//! completion, and writes the metrics JSON and trace CSV.  Exit code 0
//! means every agent reached its goal with no collision on record; any
//! input failure or a detected collision exits 1.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use sg_metrics::{write_metrics_json, write_trace_csv, MetricsSnapshot};
use sg_net::{NetworkParams, SimNetwork};
use sg_sim::{NoopObserver, ProgressObserver, Simulation, SimulationConfig};
use sg_world::{FileMapLoader, MapLoader};

/// Multi-agent pathfinding with simulated communication.
#[derive(Parser, Debug)]
#[command(name = "swarmgrid", version, about)]
struct Args {
    /// Path to the map file (`.` free, `#` obstacle, `/` comments).
    #[arg(short, long)]
    map: PathBuf,

    /// Number of agents to place.
    #[arg(short = 'n', long, default_value_t = 8)]
    agents: usize,

    /// Random seed for placement, identities, and the network.
    #[arg(short, long, default_value_t = 1337)]
    seed: u64,

    /// Message drop probability in [0, 1].
    #[arg(short, long, default_value_t = 0.05)]
    drop: f64,

    /// Mean network latency in milliseconds.
    #[arg(short, long, default_value_t = 40)]
    latency: u32,

    /// Network jitter (latency standard deviation) in milliseconds.
    #[arg(short, long, default_value_t = 10)]
    jitter: u32,

    /// Maximum simulation steps.
    #[arg(long, default_value_t = 300)]
    max_steps: u64,

    /// Output trace CSV file.
    #[arg(long, default_value = "trace.csv")]
    out_trace: PathBuf,

    /// Output metrics JSON file.
    #[arg(long, default_value = "metrics.json")]
    out_metrics: PathBuf,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress info messages.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args);

    match run(args) {
        Ok(clean) => {
            if clean {
                ExitCode::SUCCESS
            } else {
                error!("collision detected, simulation failed safety check");
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(args: &Args) {
    let default_level = if args.verbose {
        "debug"
    } else if args.quiet {
        "warn"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();
}

/// Returns `Ok(true)` on a collision-free run.
fn run(args: Args) -> anyhow::Result<bool> {
    anyhow::ensure!(args.agents >= 1, "number of agents must be positive");
    anyhow::ensure!(
        (0.0..=1.0).contains(&args.drop),
        "drop probability must be between 0 and 1"
    );

    let params = NetworkParams {
        drop_probability: args.drop,
        mean_latency_ms: args.latency,
        jitter_ms: args.jitter,
    };
    info!(
        agents = args.agents,
        seed = args.seed,
        drop = args.drop,
        latency_ms = args.latency,
        jitter_ms = args.jitter,
        "starting swarmgrid"
    );

    let world = FileMapLoader
        .load(&args.map, args.agents, args.seed)
        .with_context(|| format!("loading map {}", args.map.display()))?;
    let network = SimNetwork::new(params, args.seed);
    let mut sim = Simulation::new(world, network, SimulationConfig { max_ticks: args.max_steps })
        .context("initializing simulation")?;

    let snapshot: MetricsSnapshot = if args.verbose {
        sim.run(&mut ProgressObserver::every(1))
    } else {
        sim.run(&mut NoopObserver)
    };

    // Outputs are best-effort: a write failure is logged, not fatal.
    if let Err(e) = write_metrics_json(&args.out_metrics, &snapshot) {
        error!("failed to save metrics to {}: {e}", args.out_metrics.display());
    } else {
        info!("saved metrics to {}", args.out_metrics.display());
    }
    if let Err(e) = write_trace_csv(&args.out_trace, &sim.metrics().traces()) {
        error!("failed to save trace to {}: {e}", args.out_trace.display());
    } else {
        info!("saved trace to {}", args.out_trace.display());
    }

    let drop_pct = 100.0 * snapshot.drop_rate;
    info!("=== simulation results ===");
    info!("makespan:         {} ticks", snapshot.makespan);
    info!("total messages:   {}", snapshot.total_messages);
    info!("dropped messages: {} ({drop_pct:.2}%)", snapshot.dropped_messages);
    info!("total replans:    {}", snapshot.total_replans);
    info!("collisions:       {}", if snapshot.collision_detected { "YES" } else { "no" });
    info!("wall time:        {} ms", snapshot.wall_time_ms);

    Ok(!snapshot.collision_detected)
}
