//! Checkpoint the whole workload in fixed-size chunks
use clap::Parser;
use pin_sampling::{
    ChunkConfig, ControllerEngine, Counter, print_checkpoints, run_chunks, write_manifest,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Command that starts the simulator controller
    #[arg(short, long)]
    controller: String,

    /// Chunk size in instructions
    #[arg(short, long)]
    interval: u64,

    /// Warmup prefix of each chunk in instructions
    #[arg(short, long)]
    warmup: u64,

    /// Instructions to run before the first checkpoint
    #[arg(long, default_value = "10000")]
    lead_in: u64,

    /// Checkpoint output directory
    #[arg(short, long, default_value = "m5out")]
    outdir: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Cli::parse();

    std::fs::create_dir_all(&args.outdir)?;
    let config = ChunkConfig {
        outdir: std::fs::canonicalize(&args.outdir)?,
        interval: args.interval,
        warmup: args.warmup,
        lead_in: args.lead_in,
    };

    let mut engine = ControllerEngine::spawn(&args.controller)?;
    let checkpoints = run_chunks(&mut engine, &config)?;
    engine.shutdown()?;

    print_checkpoints(&checkpoints)?;
    let manifest = write_manifest(&config.outdir, Counter::Inst, &checkpoints)?;
    println!("Checkpoint manifest written to {}", manifest.display());

    Ok(())
}
