//! SimPoint-driven checkpoint placement
use crate::{
    Counter, Engine, SamplingError, StopCause, format_weight, get_checkpoint_path,
    get_manifest_path, get_tqdm_style, link_checkpoint, long_checkpoint_name,
    short_checkpoint_name, simpoint_label,
};
use cli_table::{Cell, Table, print_stdout};
use serde::{Deserialize, Deserializer, Serialize};
use std::{
    collections::HashSet,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

/// One representative interval chosen by SimPoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimPoint {
    /// checkpoint name, usually the cluster index
    #[serde(deserialize_with = "deserialize_name")]
    pub name: String,
    /// fraction of the execution represented by this interval
    pub weight: f64,
    /// warmup begin, interval begin and interval end
    pub waypoints: [u64; 3],
    /// index of the interval in the BBV file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<u64>,
}

fn deserialize_name<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Name {
        Index(u64),
        Text(String),
    }
    Ok(match Name::deserialize(deserializer)? {
        Name::Index(index) => index.to_string(),
        Name::Text(text) => text,
    })
}

pub fn load_simpoints<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<SimPoint>> {
    let simpoints = serde_json::from_reader(BufReader::new(File::open(path)?))?;
    Ok(simpoints)
}

/// Reject configurations that would need interleaved warmups and intervals.
///
/// Entries must be sorted and strictly increasing, on `interval` when both
/// neighbors carry it and on the interval begin waypoint otherwise. Names must
/// be unique since each one owns a `cpt.<name>` snapshot.
pub fn validate_simpoints(simpoints: &[SimPoint]) -> Result<(), SamplingError> {
    let mut names = HashSet::new();
    for simpoint in simpoints {
        if !names.insert(simpoint.name.as_str()) {
            return Err(SamplingError::DuplicateSimPoint(simpoint.name.clone()));
        }
    }
    for simpoint in simpoints {
        let [warmup, interval, end] = simpoint.waypoints;
        if warmup > interval || interval > end {
            return Err(SamplingError::UnorderedWaypoints {
                name: simpoint.name.clone(),
                waypoints: simpoint.waypoints,
            });
        }
    }
    for pair in simpoints.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        let (prev_at, next_at) = match (prev.interval, next.interval) {
            (Some(a), Some(b)) => (a, b),
            _ => (prev.waypoints[1], next.waypoints[1]),
        };
        if prev_at >= next_at {
            return Err(SamplingError::NonMonotonicSimPoints {
                prev: prev.name.clone(),
                next: next.name.clone(),
                prev_at,
                next_at,
            });
        }
    }
    Ok(())
}

/// A snapshot together with the region it anchors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointBoundary {
    pub name: String,
    pub short_name: String,
    pub long_name: String,
    /// instruction count where warmup begins (and the snapshot was taken)
    pub warmup: u64,
    /// instruction count where the measured interval begins
    pub interval: u64,
    /// instruction count where the measured interval ends
    pub end: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

#[derive(Serialize, Deserialize)]
pub struct CheckpointManifest {
    /// when the checkpoints were taken
    pub created: String,
    /// unit of the waypoints the checkpoints were placed on
    pub counter: Counter,
    pub checkpoints: Vec<CheckpointBoundary>,
}

pub fn write_manifest<P: AsRef<Path>>(
    outdir: P,
    counter: Counter,
    checkpoints: &[CheckpointBoundary],
) -> anyhow::Result<PathBuf> {
    let manifest = CheckpointManifest {
        created: chrono::Local::now().to_rfc3339(),
        counter,
        checkpoints: checkpoints.to_vec(),
    };
    let path = get_manifest_path(outdir);
    std::fs::write(&path, serde_json::to_vec_pretty(&manifest)?)?;
    Ok(path)
}

pub fn print_checkpoints(checkpoints: &[CheckpointBoundary]) -> anyhow::Result<()> {
    let mut table = vec![];
    for checkpoint in checkpoints {
        table.push(vec![
            checkpoint.short_name.clone().cell(),
            checkpoint.warmup.cell(),
            checkpoint.interval.cell(),
            checkpoint.end.cell(),
            (checkpoint.interval - checkpoint.warmup).cell(),
            (checkpoint.end - checkpoint.interval).cell(),
            checkpoint
                .weight
                .map(format_weight)
                .unwrap_or_else(|| "-".to_string())
                .cell(),
        ]);
    }
    let table = table.table().title(vec![
        "Checkpoint".cell(),
        "Warmup Inst".cell(),
        "Interval Inst".cell(),
        "End Inst".cell(),
        "Warmup Length".cell(),
        "Interval Length".cell(),
        "Weight".cell(),
    ]);
    print_stdout(table)?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct CheckpointConfig {
    /// where snapshots and symlinks are created
    pub outdir: PathBuf,
    /// unit of the simpoint waypoints
    pub counter: Counter,
    /// instructions to stop short of the final end waypoint, so the breakpoint
    /// does not race the workload's own exit
    pub final_end_slack: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaypointKind {
    Warmup,
    Interval,
    End,
}

#[derive(Debug, Clone, Copy)]
struct Action {
    waypoint: u64,
    kind: WaypointKind,
    simpoint: usize,
}

/// Instruction counts observed at each waypoint of one simpoint
#[derive(Debug, Clone, Copy, Default)]
struct Realized {
    warmup: Option<u64>,
    interval: Option<u64>,
    end: Option<u64>,
}

/// Replay every simpoint waypoint in one pass over the workload, taking a
/// snapshot at each warmup waypoint and naming it once its end is reached.
///
/// Snapshots already taken stay on disk when a later step fails.
pub fn replay_simpoints<E: Engine>(
    engine: &mut E,
    simpoints: &[SimPoint],
    config: &CheckpointConfig,
) -> anyhow::Result<Vec<CheckpointBoundary>> {
    validate_simpoints(simpoints)?;

    let mut actions = vec![];
    for (i, simpoint) in simpoints.iter().enumerate() {
        let kinds = [WaypointKind::Warmup, WaypointKind::Interval, WaypointKind::End];
        for (waypoint, kind) in simpoint.waypoints.into_iter().zip(kinds) {
            actions.push(Action {
                waypoint,
                kind,
                simpoint: i,
            });
        }
    }
    // stable: ties keep simpoint order
    actions.sort_by_key(|action| action.waypoint);

    let mut realized = vec![Realized::default(); simpoints.len()];
    let mut checkpoints = vec![];
    let mut exited = false;

    let pbar = indicatif::ProgressBar::new(actions.len() as u64);
    pbar.set_style(get_tqdm_style());

    for (index, action) in actions.iter().enumerate() {
        let simpoint = &simpoints[action.simpoint];
        let is_final = index + 1 == actions.len();

        let mut target = action.waypoint;
        if is_final && action.kind == WaypointKind::End && config.counter == Counter::Inst {
            target = target.saturating_sub(config.final_end_slack);
        }
        log::debug!(
            "simpoint {}: {:?} at {} {}",
            simpoint.name,
            action.kind,
            config.counter,
            target
        );

        match engine.advance_to(config.counter, target)? {
            StopCause::Breakpoint => {}
            StopCause::Completed if is_final => {
                log::warn!(
                    "Workload exited before {} {}, ending simpoint {} at exit",
                    config.counter,
                    target,
                    simpoint.name
                );
                exited = true;
            }
            StopCause::Completed => {
                return Err(SamplingError::ExitedEarly {
                    counter: config.counter.to_string(),
                    target,
                }
                .into());
            }
            other => return Err(other.unexpected(&StopCause::Breakpoint).into()),
        }
        let inst = engine.count(Counter::Inst)?;

        let short_name = short_checkpoint_name(&simpoint.name);
        let state = &mut realized[action.simpoint];
        match action.kind {
            WaypointKind::Warmup => {
                state.warmup = Some(inst);
                engine.checkpoint(&get_checkpoint_path(&config.outdir, &short_name))?;
                engine.dump_stats()?;
                log::info!("pin-cpt: dumped checkpoint {}", simpoint.name);
            }
            WaypointKind::Interval => state.interval = Some(inst),
            WaypointKind::End => {
                state.end = Some(inst);
                let checkpoint = name_checkpoint(simpoint, *state, &config.outdir)?;
                checkpoints.push(checkpoint);
            }
        }
        pbar.inc(1);
    }
    pbar.finish();

    if !exited {
        engine
            .run_to_completion()?
            .expect(&StopCause::Completed)?;
    }
    Ok(checkpoints)
}

fn name_checkpoint(
    simpoint: &SimPoint,
    realized: Realized,
    outdir: &Path,
) -> anyhow::Result<CheckpointBoundary> {
    let (Some(warmup), Some(interval), Some(end)) =
        (realized.warmup, realized.interval, realized.end)
    else {
        anyhow::bail!("simpoint {} ended before all its waypoints were reached", simpoint.name);
    };
    if !(warmup <= interval && interval <= end) {
        return Err(SamplingError::Protocol(format!(
            "instruction count went backwards in simpoint {}: {} {} {}",
            simpoint.name, warmup, interval, end
        ))
        .into());
    }

    let short_name = short_checkpoint_name(&simpoint.name);
    let long_name = long_checkpoint_name(
        simpoint_label(&simpoint.name),
        warmup,
        format_weight(simpoint.weight),
        end - interval,
        interval - warmup,
    );
    link_checkpoint(outdir, &short_name, &long_name)?;
    Ok(CheckpointBoundary {
        name: simpoint.name.clone(),
        short_name,
        long_name,
        warmup,
        interval,
        end,
        weight: Some(simpoint.weight),
    })
}
