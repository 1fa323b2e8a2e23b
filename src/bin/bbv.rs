//! Collect basic block vectors for SimPoint
use clap::Parser;
use pin_sampling::{
    Compression, ControllerEngine, IntervalSampler, OutputSink, SamplerConfig, write_bbv_info,
};
use std::{fs::File, io::BufWriter, path::PathBuf};

/// exit and exit_group
const EXIT_SYSNOS: [u64; 2] = [60, 231];

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Command that starts the simulator controller
    #[arg(short, long)]
    controller: String,

    /// Path to basic block vector file
    #[arg(long)]
    bbv: PathBuf,

    /// Path to basic block vector info file
    #[arg(long)]
    bbvinfo: PathBuf,

    /// Warmup period in instructions
    #[arg(short, long)]
    warmup: u64,

    /// Interval size in instructions
    #[arg(short, long)]
    interval: u64,

    /// Interval tolerance factor
    #[arg(short, long, default_value = "2")]
    tolerance: u64,

    /// Align every boundary to the next waypoint
    #[arg(long)]
    waypoints: bool,

    /// Compression of the basic block vector file
    #[arg(long, value_enum, default_value_t = Compression::None)]
    compression: Compression,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Cli::parse();

    let config = SamplerConfig {
        warmup: args.warmup,
        interval: args.interval,
        tolerance: args.tolerance,
        waypoints: args.waypoints,
    };
    config.validate()?;
    println!(
        "Warmup {} instructions, interval {} instructions, tolerance {}x",
        config.warmup, config.interval, config.tolerance
    );

    let mut engine = ControllerEngine::spawn(&args.controller)?;
    for sysno in EXIT_SYSNOS {
        engine.sysbreak(sysno)?;
    }

    let sink = OutputSink::create(&args.bbv, args.compression)?;
    let (records, sink) = IntervalSampler::new(&mut engine, config, sink)?.run()?;
    sink.finish()?;
    engine.shutdown()?;

    write_bbv_info(BufWriter::new(File::create(&args.bbvinfo)?), &records)?;

    let degraded = records.iter().filter(|record| !record.well_formed).count();
    println!(
        "Collected {} intervals, {} of them degraded",
        records.len(),
        degraded
    );
    println!("Basic block vectors written to {}", args.bbv.display());
    println!("Interval info written to {}", args.bbvinfo.display());

    Ok(())
}
