//! Headless driver for the blobsim world.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use blobsim_app::{
    CommandReceiver, ControlHandle, SharedWorld, SimulationClock, WorldSnapshot,
    create_command_bus, drain_pending_commands,
};
use blobsim_core::{WorldConfig, WorldState};
use clap::Parser;
use tracing::info;

/// Run the closed-ecosystem simulation without a display.
#[derive(Debug, Parser)]
#[command(name = "blobsim", version, about)]
struct Args {
    /// Number of ticks to simulate before exiting.
    #[arg(long, default_value_t = 1_000)]
    ticks: u64,
    /// RNG seed for a reproducible run.
    #[arg(long)]
    seed: Option<u64>,
    /// Step as fast as possible instead of pacing at the target rate.
    #[arg(long)]
    fast: bool,
    /// Write a JSON snapshot of the final world state to this path.
    #[arg(long, value_name = "PATH")]
    snapshot_json: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = WorldConfig {
        rng_seed: args.seed,
        ..WorldConfig::default()
    };
    let world = WorldState::new(config)?;
    info!(
        blobs = world.blob_count(),
        food = world.food_count(),
        seed = ?args.seed,
        "seeded world"
    );

    let shared: SharedWorld = Arc::new(Mutex::new(world));
    let (sender, receiver) = create_command_bus(64);
    let handle = ControlHandle::new(Arc::clone(&shared), sender);
    handle.toggle_running()?;

    if args.fast {
        run_fast(&shared, &receiver, args.ticks)?;
    } else {
        run_paced(&shared, &receiver, args.ticks);
    }

    let summary = handle.latest_summary()?;
    info!(
        tick = summary.tick.0,
        alive = summary.alive_blobs,
        births = summary.births,
        deaths = summary.deaths,
        food = summary.food_count,
        average_age = summary.average_age,
        "run complete"
    );

    if let Some(path) = args.snapshot_json {
        let snapshot = handle.snapshot()?;
        write_snapshot(&snapshot, &path)?;
        info!(path = %path.display(), "wrote world snapshot");
    }

    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn run_fast(world: &SharedWorld, receiver: &CommandReceiver, ticks: u64) -> Result<()> {
    let mut world = world.lock().map_err(|_| anyhow!("world mutex poisoned"))?;
    drain_pending_commands(receiver, &mut world);
    for _ in 0..ticks {
        world.step();
    }
    Ok(())
}

fn run_paced(world: &SharedWorld, receiver: &CommandReceiver, ticks: u64) {
    let mut clock = SimulationClock::new(Instant::now());
    let mut executed = 0_u64;
    while executed < ticks {
        let stepped = clock.pump(Instant::now(), world, receiver);
        executed += stepped as u64;
        if stepped == 0 {
            thread::sleep(Duration::from_millis(1));
        }
    }
}

fn write_snapshot(snapshot: &WorldSnapshot, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let file = File::create(path)
        .with_context(|| format!("failed to create snapshot file {}", path.display()))?;
    serde_json::to_writer_pretty(file, snapshot).context("failed to serialize world snapshot")?;
    Ok(())
}
