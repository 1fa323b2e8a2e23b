use crate::{BasicBlockObservation, BlockIdRegistry};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Placeholder vector for intervals that ran far past their nominal length
pub const DEGRADED_BBV_LINE: &str = "T :1:1\n";

/// A point on the sampling timeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Boundary {
    /// waypoint count, or the instruction count when waypoints are disabled
    pub waypoint: u64,
    /// instruction count
    pub inst: u64,
}

/// One sampled interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalRecord {
    /// where warmup for this interval begins
    pub warmup: Boundary,
    /// where the interval (and the histogram) begins
    pub interval_begin: Boundary,
    /// where the interval ends
    pub interval_end: Boundary,
    /// instructions covered by the histogram
    pub total_insts: u64,
    /// whether the histogram was emitted as a full vector
    pub well_formed: bool,
}

/// Writes one basic block vector line per interval in SimPoint's frequency
/// vector format.
pub struct BbvWriter<W: Write> {
    out: W,
    registry: BlockIdRegistry,
    /// intervals heavier than this are degraded to a placeholder
    max_insts: u64,
}

impl<W: Write> BbvWriter<W> {
    pub fn new(out: W, interval: u64, tolerance: u64) -> Self {
        Self {
            out,
            registry: BlockIdRegistry::new(),
            max_insts: interval.saturating_mul(tolerance),
        }
    }

    pub fn is_well_formed(&self, observation: &BasicBlockObservation) -> bool {
        observation.total_insts <= self.max_insts
    }

    /// Append the vector of one interval, returns whether it was well formed
    pub fn emit(&mut self, observation: &BasicBlockObservation) -> std::io::Result<bool> {
        let well_formed = self.is_well_formed(observation);
        let line = if well_formed {
            format_bbv_line(&mut self.registry, observation)
        } else {
            log::warn!(
                "Interval covers {} instructions (limit {}), emitting placeholder",
                observation.total_insts,
                self.max_insts
            );
            DEGRADED_BBV_LINE.to_string()
        };
        self.out.write_all(line.as_bytes())?;
        Ok(well_formed)
    }

    pub fn registry(&self) -> &BlockIdRegistry {
        &self.registry
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Format a full vector line, assigning ids to blocks seen for the first time
pub fn format_bbv_line(
    registry: &mut BlockIdRegistry,
    observation: &BasicBlockObservation,
) -> String {
    let mut line = String::from("T");
    for block in &observation.blocks {
        let id = registry.id(&block.block);
        line += &format!(" :{}:{}", id, block.weight());
    }
    line.push('\n');
    line
}

/// Write the interval metadata file: "warmup interval-begin interval-end" per line
pub fn write_bbv_info<W: Write>(mut out: W, records: &[IntervalRecord]) -> std::io::Result<()> {
    for record in records {
        writeln!(
            out,
            "{} {} {}",
            record.warmup.waypoint, record.interval_begin.waypoint, record.interval_end.waypoint
        )?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_bbhist;

    #[test]
    fn well_formed_intervals_get_full_vectors() -> anyhow::Result<()> {
        let mut writer = BbvWriter::new(Vec::<u8>::new(), 100, 2);
        assert!(writer.emit(&parse_bbhist("10 a,b,c\n50 d\n")?)?);
        assert!(writer.emit(&parse_bbhist("100 d\n100 e\n")?)?);
        let out = String::from_utf8(writer.into_inner())?;
        assert_eq!(out, "T :1:30 :2:50\nT :2:100 :3:100\n");
        Ok(())
    }

    #[test]
    fn heavy_intervals_are_degraded() -> anyhow::Result<()> {
        let mut writer = BbvWriter::new(Vec::<u8>::new(), 100, 2);
        assert!(!writer.emit(&parse_bbhist("201 x\n")?)?);
        // degraded intervals do not consume ids
        assert!(writer.registry().is_empty());
        assert!(writer.emit(&parse_bbhist("1 y\n")?)?);
        let out = String::from_utf8(writer.into_inner())?;
        assert_eq!(out, "T :1:1\nT :1:1\n");
        Ok(())
    }

    #[test]
    fn info_lines_use_waypoint_counts() -> anyhow::Result<()> {
        let at = |waypoint, inst| Boundary { waypoint, inst };
        let records = [
            IntervalRecord {
                warmup: at(0, 0),
                interval_begin: at(2, 1010),
                interval_end: at(12, 11050),
                total_insts: 10040,
                well_formed: true,
            },
            IntervalRecord {
                warmup: at(11, 10100),
                interval_begin: at(12, 11050),
                interval_end: at(22, 21003),
                total_insts: 9953,
                well_formed: true,
            },
        ];
        let mut out = Vec::<u8>::new();
        write_bbv_info(&mut out, &records)?;
        assert_eq!(String::from_utf8(out)?, "0 2 12\n11 12 22\n");
        Ok(())
    }
}
