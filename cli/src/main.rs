//! Bank Simulator CLI
//!
//! Runs the transaction simulation headless. Balance snapshots are consumed
//! by display consumers whose status lines go to the log.
//!
//! # Example
//!
//! ```bash
//! # Reference setup, runs until interrupted
//! bank-sim
//!
//! # Three quick cycles with a fixed seed and two consumers
//! bank-sim --cycles 3 --seed 42 --interval-ms 100 --settle-ms 500 --consumers 2
//!
//! # Accounts and banks from a file
//! bank-sim --config sim.json --export-dir /tmp/bank-exports
//! ```

use bank_sim_core::display::{ConsumerSinks, SharedTotal};
use bank_sim_core::{BalanceConsumer, SimulationConfig, SimulationError, SimulationRunner};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Upper bound on the wait for consumers after the last cycle
const MAX_DRAIN: Duration = Duration::from_secs(60);

/// Two poll intervals per pending snapshot plus one, capped at `MAX_DRAIN`
fn drain_timeout(poll_ms: u64, pending: usize) -> Duration {
    let slots = u64::try_from(pending).unwrap_or(u64::MAX).saturating_add(1);
    Duration::from_millis(poll_ms.saturating_mul(2).saturating_mul(slots)).min(MAX_DRAIN)
}

/// Bank transaction simulator
#[derive(Parser, Debug)]
#[command(name = "bank-sim")]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON configuration file; omitted fields keep their defaults
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Number of cycles to run (runs until interrupted when omitted)
    #[arg(short = 'n', long)]
    cycles: Option<usize>,

    /// Random seed for a reproducible transaction stream
    #[arg(long)]
    seed: Option<u64>,

    /// Directory for the JSON audit files
    #[arg(long)]
    export_dir: Option<PathBuf>,

    /// Pause after each generated transaction, in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Settle interval before balances are snapshotted, in milliseconds
    #[arg(long)]
    settle_ms: Option<u64>,

    /// Number of display consumers draining the balance channel
    #[arg(long, default_value = "1")]
    consumers: usize,

    /// Consumer poll interval in milliseconds
    #[arg(long, default_value = "500")]
    poll_ms: u64,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,bank_sim_core=info,bank_sim=info")),
        )
        .init();

    let args = Args::parse();

    if let Err(err) = run(&args) {
        error!(%err, "Simulation failed");
        std::process::exit(1);
    }
}

fn load_config(args: &Args) -> Result<SimulationConfig, SimulationError> {
    let mut config = match &args.config {
        Some(path) => SimulationConfig::from_json_file(path)?,
        None => SimulationConfig::default(),
    };
    if args.seed.is_some() {
        config.rng_seed = args.seed;
    }
    if let Some(dir) = &args.export_dir {
        config.export_dir = dir.clone();
    }
    if let Some(ms) = args.interval_ms {
        config.generation_interval_ms = ms;
    }
    if let Some(ms) = args.settle_ms {
        config.settle_interval_ms = ms;
    }
    Ok(config)
}

fn run(args: &Args) -> Result<(), SimulationError> {
    let config = load_config(args)?;
    info!(
        banks = config.banks.len(),
        accounts = config.accounts.len(),
        cycles = ?args.cycles,
        seed = ?config.rng_seed,
        "Starting bank simulator"
    );

    let mut runner = SimulationRunner::new(config);
    if let Some(cycles) = args.cycles {
        runner = runner.with_max_cycles(cycles);
    }
    let handle = runner.start()?;

    let total = Arc::new(SharedTotal::new());
    let mut consumers = Vec::with_capacity(args.consumers);
    for index in 1..=args.consumers {
        let consumer = BalanceConsumer::spawn(
            format!("Thread-{}", index),
            handle.output_channel(),
            Arc::clone(&total),
            ConsumerSinks::default(),
            Duration::from_millis(args.poll_ms),
        )?;
        consumer.start();
        consumers.push(consumer);
    }

    let output = handle.output_channel();
    let cycles = handle.join()?;

    // Let consumers pick up the last cycle's snapshots.
    if !consumers.is_empty() && !output.join(drain_timeout(args.poll_ms, output.len())) {
        info!(left = output.len(), "Balance channel not drained");
    }
    for consumer in consumers {
        consumer.shutdown();
    }

    info!(cycles, total = total.get(), "Simulation finished");
    Ok(())
}
