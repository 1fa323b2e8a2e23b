//! Scripted engine used by the driver tests
use crate::{Counter, Engine, StopCause};
use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
};

/// A program of `length` instructions with a waypoint every `waypoint_every`
/// instructions. Breakpoints always land exactly on their target.
pub struct FakeEngine {
    pub length: u64,
    pub waypoint_every: u64,
    pub inst: u64,
    /// histograms handed out by successive `bbhist dump` calls
    pub dumps: VecDeque<String>,
    /// causes returned instead of the simulated ones, consumed first
    pub forced_causes: VecDeque<StopCause>,
    /// (path, instruction count) of every snapshot taken
    pub checkpoints: Vec<(PathBuf, u64)>,
    pub stats_dumps: usize,
    pub resets: usize,
    /// every breakpoint requested, in order
    pub breakpoints: Vec<(Counter, u64)>,
}

impl FakeEngine {
    pub fn new(length: u64) -> Self {
        Self {
            length,
            waypoint_every: 1,
            inst: 0,
            dumps: VecDeque::new(),
            forced_causes: VecDeque::new(),
            checkpoints: vec![],
            stats_dumps: 0,
            resets: 0,
            breakpoints: vec![],
        }
    }

    pub fn with_dumps<I: IntoIterator<Item = &'static str>>(mut self, dumps: I) -> Self {
        self.dumps = dumps.into_iter().map(str::to_string).collect();
        self
    }

    fn inst_of(&self, counter: Counter, target: u64) -> u64 {
        match counter {
            Counter::Inst => target,
            Counter::Waypoint => target * self.waypoint_every,
        }
    }
}

impl Engine for FakeEngine {
    fn count(&mut self, counter: Counter) -> anyhow::Result<u64> {
        Ok(match counter {
            Counter::Inst => self.inst,
            Counter::Waypoint => self.inst / self.waypoint_every,
        })
    }

    fn advance_to(&mut self, counter: Counter, target: u64) -> anyhow::Result<StopCause> {
        self.breakpoints.push((counter, target));
        if let Some(cause) = self.forced_causes.pop_front() {
            return Ok(cause);
        }
        let target = self.inst_of(counter, target);
        if target >= self.length {
            self.inst = self.length;
            return Ok(StopCause::Completed);
        }
        self.inst = self.inst.max(target);
        Ok(StopCause::Breakpoint)
    }

    fn run_to_completion(&mut self) -> anyhow::Result<StopCause> {
        if let Some(cause) = self.forced_causes.pop_front() {
            return Ok(cause);
        }
        self.inst = self.length;
        Ok(StopCause::Completed)
    }

    fn checkpoint(&mut self, path: &Path) -> anyhow::Result<()> {
        std::fs::create_dir_all(path)?;
        self.checkpoints.push((path.to_path_buf(), self.inst));
        Ok(())
    }

    fn dump_stats(&mut self) -> anyhow::Result<()> {
        self.stats_dumps += 1;
        Ok(())
    }

    fn bbhist_dump(&mut self) -> anyhow::Result<String> {
        Ok(self.dumps.pop_front().unwrap_or_default())
    }

    fn bbhist_reset(&mut self) -> anyhow::Result<()> {
        self.resets += 1;
        Ok(())
    }
}
