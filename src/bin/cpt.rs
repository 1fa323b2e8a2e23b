//! Take checkpoints at the warmup of every SimPoint interval
use clap::Parser;
use pin_sampling::{
    CheckpointConfig, ControllerEngine, Counter, load_simpoints, print_checkpoints,
    replay_simpoints, validate_simpoints, write_manifest,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Command that starts the simulator controller
    #[arg(short, long)]
    controller: String,

    /// Path to SimPoint JSON file
    #[arg(short, long)]
    simpoints_json: PathBuf,

    /// Waypoints in the SimPoint file count waypoints instead of instructions
    #[arg(long)]
    waypoints: bool,

    /// Checkpoint output directory
    #[arg(short, long, default_value = "m5out")]
    outdir: PathBuf,

    /// Stop this many instructions before the last end waypoint
    #[arg(long, default_value = "0")]
    final_end_slack: u64,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Cli::parse();

    println!("Loading SimPoint result from {}", args.simpoints_json.display());
    let simpoints = load_simpoints(&args.simpoints_json)?;
    // fail before any simulation time is spent
    validate_simpoints(&simpoints)?;
    println!("Got {} simpoints", simpoints.len());

    std::fs::create_dir_all(&args.outdir)?;
    let config = CheckpointConfig {
        outdir: std::fs::canonicalize(&args.outdir)?,
        counter: if args.waypoints {
            Counter::Waypoint
        } else {
            Counter::Inst
        },
        final_end_slack: args.final_end_slack,
    };

    let mut engine = ControllerEngine::spawn(&args.controller)?;
    let checkpoints = replay_simpoints(&mut engine, &simpoints, &config)?;
    engine.shutdown()?;

    print_checkpoints(&checkpoints)?;
    let manifest = write_manifest(&config.outdir, config.counter, &checkpoints)?;
    println!("Checkpoint manifest written to {}", manifest.display());

    Ok(())
}
