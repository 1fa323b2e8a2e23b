//! Interval sampling: collect one basic block vector per interval
use crate::{
    BbvWriter, Boundary, Counter, Engine, IntervalRecord, SamplingError, parse_bbhist, run_for,
};
use std::io::Write;

#[derive(Debug, Clone, Copy)]
pub struct SamplerConfig {
    /// warmup period in instructions
    pub warmup: u64,
    /// interval size in instructions
    pub interval: u64,
    /// intervals heavier than interval * tolerance are degraded
    pub tolerance: u64,
    /// align every boundary to the next waypoint
    pub waypoints: bool,
}

impl SamplerConfig {
    pub fn validate(&self) -> Result<(), SamplingError> {
        if self.interval <= self.warmup {
            return Err(SamplingError::IntervalNotAboveWarmup {
                interval: self.interval,
                warmup: self.warmup,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// running the initial warmup, histogram not yet trusted
    Warming,
    /// running up to the next warmup and interval boundaries
    Sampling,
    /// interval complete, histogram ready
    Dumping,
    /// the workload exited
    Done,
}

/// Outcome of running the workload forward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Reached(Boundary),
    Completed,
}

/// Drives the engine through warmup/interval cycles and writes a BBV line per
/// interval.
pub struct IntervalSampler<'a, E: Engine, W: Write> {
    engine: &'a mut E,
    config: SamplerConfig,
    writer: BbvWriter<W>,
    /// warmup boundaries, starting with the program start
    warmups: Vec<Boundary>,
    /// interval boundaries, each one both ends an interval and begins the next
    intervals: Vec<Boundary>,
    /// dumped intervals
    records: Vec<IntervalRecord>,
}

impl<'a, E: Engine, W: Write> IntervalSampler<'a, E, W> {
    pub fn new(engine: &'a mut E, config: SamplerConfig, out: W) -> Result<Self, SamplingError> {
        config.validate()?;
        Ok(Self {
            engine,
            config,
            writer: BbvWriter::new(out, config.interval, config.tolerance),
            warmups: vec![Boundary::default()],
            intervals: vec![],
            records: vec![],
        })
    }

    /// Sample until the workload exits. Returns the dumped intervals and the
    /// BBV output.
    pub fn run(mut self) -> anyhow::Result<(Vec<IntervalRecord>, W)> {
        let warmup = self.config.warmup;
        let interval = self.config.interval;

        let mut state = State::Warming;
        while state != State::Done {
            state = match state {
                State::Warming => match self.run_for_insts(warmup)? {
                    Advance::Reached(boundary) => {
                        self.intervals.push(boundary);
                        self.engine.bbhist_reset()?;
                        State::Sampling
                    }
                    Advance::Completed => State::Done,
                },
                State::Sampling => 'sampling: {
                    let Advance::Reached(boundary) = self.run_for_insts(interval - warmup)? else {
                        break 'sampling State::Done;
                    };
                    self.warmups.push(boundary);

                    let Advance::Reached(boundary) = self.run_for_insts(warmup)? else {
                        break 'sampling State::Done;
                    };
                    self.intervals.push(boundary);
                    State::Dumping
                }
                State::Dumping => {
                    self.dump()?;
                    State::Sampling
                }
                State::Done => State::Done,
            };
        }

        check_bookkeeping(self.warmups.len(), self.intervals.len(), self.records.len())?;
        log::info!(
            "Workload exited after {} intervals ({} distinct blocks)",
            self.records.len(),
            self.writer.registry().len()
        );
        Ok((self.records, self.writer.into_inner()))
    }

    fn dump(&mut self) -> anyhow::Result<()> {
        let idx = self.records.len();
        let observation = parse_bbhist(&self.engine.bbhist_dump()?)?;
        let well_formed = self.writer.emit(&observation)?;
        self.records.push(IntervalRecord {
            warmup: self.warmups[idx],
            interval_begin: self.intervals[idx],
            interval_end: self.intervals[idx + 1],
            total_insts: observation.total_insts,
            well_formed,
        });
        self.engine.bbhist_reset()?;
        log::info!("bbv: dumped interval {}", self.records.len());
        Ok(())
    }

    /// Run `n` instructions, then up to the next waypoint if enabled
    fn run_for_insts(&mut self, n: u64) -> anyhow::Result<Advance> {
        if !run_for(self.engine, Counter::Inst, n)? {
            return Ok(Advance::Completed);
        }
        if self.config.waypoints && !run_for(self.engine, Counter::Waypoint, 1)? {
            return Ok(Advance::Completed);
        }
        let inst = self.engine.count(Counter::Inst)?;
        let waypoint = if self.config.waypoints {
            self.engine.count(Counter::Waypoint)?
        } else {
            inst
        };
        Ok(Advance::Reached(Boundary { waypoint, inst }))
    }
}

/// An exit can interrupt at most one step of a cycle
fn check_bookkeeping(warmups: usize, intervals: usize, dumps: usize) -> Result<(), SamplingError> {
    if warmups < intervals
        || warmups < dumps
        || warmups - intervals > 1
        || intervals.abs_diff(dumps) > 1
    {
        return Err(SamplingError::Bookkeeping {
            warmups,
            intervals,
            dumps,
        });
    }
    Ok(())
}
