//! Fixed-size checkpoints over the whole workload
use crate::{
    CheckpointBoundary, Counter, Engine, SamplingError, get_checkpoint_path, link_checkpoint,
    long_checkpoint_name, run_for, short_checkpoint_name,
};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ChunkConfig {
    pub outdir: PathBuf,
    /// chunk size in instructions
    pub interval: u64,
    /// warmup prefix of each chunk in instructions
    pub warmup: u64,
    /// instructions to run before the first checkpoint
    pub lead_in: u64,
}

/// Take a checkpoint every `interval` instructions until the workload exits.
///
/// Each checkpoint sits `warmup` instructions before the chunk it measures,
/// except the first one which starts right after the lead-in.
pub fn run_chunks<E: Engine>(
    engine: &mut E,
    config: &ChunkConfig,
) -> anyhow::Result<Vec<CheckpointBoundary>> {
    if config.interval <= config.warmup {
        return Err(SamplingError::IntervalNotAboveWarmup {
            interval: config.interval,
            warmup: config.warmup,
        }
        .into());
    }

    let mut checkpoints = vec![];
    if !run_for(engine, Counter::Inst, config.lead_in)? {
        log::warn!("Workload exited during the lead-in, no checkpoints taken");
        return Ok(checkpoints);
    }

    checkpoints.push(take_checkpoint(engine, config, checkpoints.len(), 1)?);
    let mut more = run_for(engine, Counter::Inst, config.interval - config.warmup)?;
    while more {
        checkpoints.push(take_checkpoint(engine, config, checkpoints.len(), config.warmup)?);
        more = run_for(engine, Counter::Inst, config.interval)?;
    }
    log::info!("Exiting normally after {} checkpoints", checkpoints.len());
    Ok(checkpoints)
}

fn take_checkpoint<E: Engine>(
    engine: &mut E,
    config: &ChunkConfig,
    index: usize,
    warmup: u64,
) -> anyhow::Result<CheckpointBoundary> {
    let name = index.to_string();
    let short_name = short_checkpoint_name(&name);
    engine.checkpoint(&get_checkpoint_path(&config.outdir, &short_name))?;
    log::info!("pin-chunk: dumped checkpoint {}", index);

    let inst = engine.count(Counter::Inst)?;
    let long_name = long_checkpoint_name(index, inst, 0, config.interval, warmup);
    link_checkpoint(&config.outdir, &short_name, &long_name)?;
    Ok(CheckpointBoundary {
        name,
        short_name,
        long_name,
        warmup: inst,
        interval: inst + warmup,
        end: inst + warmup + config.interval,
        weight: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeEngine;

    #[test]
    fn chunks_cover_the_workload() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut engine = FakeEngine::new(3500);
        let config = ChunkConfig {
            outdir: dir.path().to_path_buf(),
            interval: 1000,
            warmup: 200,
            lead_in: 100,
        };
        let checkpoints = run_chunks(&mut engine, &config)?;

        let taken: Vec<u64> = checkpoints.iter().map(|c| c.warmup).collect();
        assert_eq!(taken, [100, 900, 1900, 2900]);
        assert_eq!(
            checkpoints[0].long_name,
            "cpt.simpoint_0_inst_100_weight_0_interval_1000_warmup_1"
        );
        assert_eq!(
            checkpoints[3].long_name,
            "cpt.simpoint_3_inst_2900_weight_0_interval_1000_warmup_200"
        );
        assert_eq!(checkpoints[1].interval, 1100);
        assert_eq!(
            std::fs::read_link(dir.path().join(&checkpoints[2].long_name))?,
            PathBuf::from("cpt.2")
        );
        Ok(())
    }

    #[test]
    fn short_workload_has_no_chunks() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut engine = FakeEngine::new(50);
        let config = ChunkConfig {
            outdir: dir.path().to_path_buf(),
            interval: 1000,
            warmup: 200,
            lead_in: 100,
        };
        assert!(run_chunks(&mut engine, &config)?.is_empty());
        assert!(engine.checkpoints.is_empty());
        Ok(())
    }

    #[test]
    fn warmup_must_fit_in_interval() {
        let mut engine = FakeEngine::new(50);
        let config = ChunkConfig {
            outdir: PathBuf::from("unused"),
            interval: 100,
            warmup: 100,
            lead_in: 0,
        };
        assert!(run_chunks(&mut engine, &config).is_err());
    }
}
