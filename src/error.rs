use std::process::ExitStatus;

/// Fatal conditions detected while driving a sampling run.
///
/// None of these are retried: each one means the driver and the execution
/// engine disagree about where the program is.
#[derive(Debug, thiserror::Error)]
pub enum SamplingError {
    #[error("expected exit cause '{expected}', got '{got}'")]
    UnexpectedStop { expected: String, got: String },

    #[error("program exited before reaching {counter} {target}")]
    ExitedEarly { counter: String, target: u64 },

    #[error("basic block histogram dump is not newline terminated")]
    UnterminatedHistogram,

    #[error("malformed basic block histogram line {line}: {text:?}")]
    MalformedHistogram { line: usize, text: String },

    #[error("interval ({interval}) must be larger than warmup ({warmup})")]
    IntervalNotAboveWarmup { interval: u64, warmup: u64 },

    #[error("simpoint {name}: waypoints {waypoints:?} are not in order")]
    UnorderedWaypoints { name: String, waypoints: [u64; 3] },

    #[error("simpoint name {0} is used more than once")]
    DuplicateSimPoint(String),

    #[error("simpoints {prev} and {next} are not strictly increasing ({prev_at} >= {next_at})")]
    NonMonotonicSimPoints {
        prev: String,
        next: String,
        prev_at: u64,
        next_at: u64,
    },

    #[error(
        "boundary bookkeeping mismatch: {warmups} warmups, {intervals} intervals, {dumps} dumps"
    )]
    Bookkeeping {
        warmups: usize,
        intervals: usize,
        dumps: usize,
    },

    #[error("compressor exited with non-zero status: {0}")]
    Compressor(ExitStatus),

    #[error("controller protocol error: {0}")]
    Protocol(String),
}
