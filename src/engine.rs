//! Execution control of the simulated program
use crate::SamplingError;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
    process::{Child, ChildStdin, ChildStdout, Command, Stdio},
};

/// Exit cause reported when the last thread of the workload exits
pub const CLEAN_EXIT_CAUSE: &str = "exiting with last active thread context";
/// Exit cause reported when a pin breakpoint fires
pub const BREAK_EXIT_CAUSE: &str = "pin-breakpoint";

/// Why the simulator returned control to the driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopCause {
    /// The workload ran to completion
    Completed,
    /// The requested breakpoint was reached
    Breakpoint,
    /// Anything else, including a desynchronized engine
    Other(String),
}

impl StopCause {
    pub fn from_cause(cause: &str) -> Self {
        match cause {
            CLEAN_EXIT_CAUSE => Self::Completed,
            BREAK_EXIT_CAUSE => Self::Breakpoint,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Completed => CLEAN_EXIT_CAUSE,
            Self::Breakpoint => BREAK_EXIT_CAUSE,
            Self::Other(cause) => cause,
        }
    }

    /// Turn anything but the expected cause into a fatal error
    pub fn expect(self, expected: &StopCause) -> Result<(), SamplingError> {
        if &self == expected {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    pub fn unexpected(&self, expected: &StopCause) -> SamplingError {
        SamplingError::UnexpectedStop {
            expected: expected.as_str().to_string(),
            got: self.as_str().to_string(),
        }
    }
}

/// Progress counters maintained by the pintool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Counter {
    /// retired instructions
    Inst,
    /// user-defined waypoints
    Waypoint,
}

impl Counter {
    pub fn name(&self) -> &'static str {
        match self {
            Counter::Inst => "inst",
            Counter::Waypoint => "waypoint",
        }
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The simulator as seen by the sampling drivers.
///
/// Every call blocks until the simulator answers; there is never more than
/// one request in flight.
pub trait Engine {
    /// Current value of a counter
    fn count(&mut self, counter: Counter) -> anyhow::Result<u64>;

    /// Set a breakpoint at `counter == target` and run until the simulator stops
    fn advance_to(&mut self, counter: Counter, target: u64) -> anyhow::Result<StopCause>;

    /// Run without any breakpoint until the simulator stops
    fn run_to_completion(&mut self) -> anyhow::Result<StopCause>;

    /// Take a restart snapshot at `path`
    fn checkpoint(&mut self, path: &Path) -> anyhow::Result<()>;

    /// Flush simulator statistics
    fn dump_stats(&mut self) -> anyhow::Result<()>;

    /// Basic block histogram accumulated since the last reset
    fn bbhist_dump(&mut self) -> anyhow::Result<String>;

    fn bbhist_reset(&mut self) -> anyhow::Result<()>;
}

/// Run `n` more units of `counter`. Returns false if the workload exited first.
pub fn run_for<E: Engine + ?Sized>(
    engine: &mut E,
    counter: Counter,
    n: u64,
) -> anyhow::Result<bool> {
    let count = engine.count(counter)?;
    let target = count.checked_add(n).ok_or_else(|| {
        SamplingError::Protocol(format!("{} {} + {} overflows", counter, count, n))
    })?;
    match engine.advance_to(counter, target)? {
        StopCause::Breakpoint => Ok(true),
        StopCause::Completed => Ok(false),
        other => Err(other.unexpected(&StopCause::Breakpoint).into()),
    }
}

/// Largest response payload accepted from the controller
pub const MAX_RESPONSE_LEN: usize = 1 << 30;

/// Engine backed by a controller process that owns the simulator.
///
/// Requests are single command lines. Responses are `ok <len>` followed by
/// `len` bytes of payload, or `err <message>`.
pub struct ControllerEngine {
    child: Child,
    requests: BufWriter<ChildStdin>,
    responses: BufReader<ChildStdout>,
}

impl ControllerEngine {
    /// Run `command` through `sh -c` and talk to it over stdin/stdout
    pub fn spawn(command: &str) -> anyhow::Result<Self> {
        log::info!("Starting controller: {}", command);
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()?;
        let requests = child
            .stdin
            .take()
            .ok_or_else(|| anyhow::anyhow!("controller has no stdin"))?;
        let responses = child
            .stdout
            .take()
            .ok_or_else(|| anyhow::anyhow!("controller has no stdout"))?;
        Ok(Self {
            child,
            requests: BufWriter::new(requests),
            responses: BufReader::new(responses),
        })
    }

    /// Send one raw command and return its payload
    pub fn command(&mut self, cmd: &str) -> anyhow::Result<String> {
        log::trace!("> {}", cmd);
        writeln!(self.requests, "{}", cmd)?;
        self.requests.flush()?;
        let payload = read_response(&mut self.responses)?;
        log::trace!("< {:?}", payload);
        Ok(payload)
    }

    fn command_u64(&mut self, cmd: &str) -> anyhow::Result<u64> {
        let payload = self.command(cmd)?;
        payload.trim().parse().map_err(|_| {
            SamplingError::Protocol(format!("'{}' returned non-numeric {:?}", cmd, payload)).into()
        })
    }

    /// Stop the workload when it issues syscall `sysno`
    pub fn sysbreak(&mut self, sysno: u64) -> anyhow::Result<()> {
        self.command(&format!("sysbreak {}", sysno))?;
        Ok(())
    }

    /// Close the request stream and wait for the controller to exit
    pub fn shutdown(mut self) -> anyhow::Result<()> {
        drop(self.requests);
        let status = self.child.wait()?;
        if !status.success() {
            log::warn!("Controller exited with {}", status);
        }
        Ok(())
    }
}

fn read_response<R: BufRead>(reader: &mut R) -> anyhow::Result<String> {
    let mut header = String::new();
    if reader.read_line(&mut header)? == 0 {
        return Err(SamplingError::Protocol("controller closed its output".to_string()).into());
    }
    let header = header.trim_end_matches('\n');
    match header.split_once(' ') {
        Some(("ok", len)) => {
            let len: usize = len.parse().map_err(|_| {
                SamplingError::Protocol(format!("bad response length in {:?}", header))
            })?;
            if len > MAX_RESPONSE_LEN {
                return Err(SamplingError::Protocol(format!(
                    "response of {} bytes exceeds the {} byte limit",
                    len, MAX_RESPONSE_LEN
                ))
                .into());
            }
            let mut payload = vec![0u8; len];
            reader.read_exact(&mut payload)?;
            Ok(String::from_utf8(payload)?)
        }
        Some(("err", message)) => {
            Err(SamplingError::Protocol(format!("controller error: {}", message)).into())
        }
        _ => Err(SamplingError::Protocol(format!("bad response header {:?}", header)).into()),
    }
}

impl Engine for ControllerEngine {
    fn count(&mut self, counter: Counter) -> anyhow::Result<u64> {
        self.command_u64(&format!("{}count", counter))
    }

    fn advance_to(&mut self, counter: Counter, target: u64) -> anyhow::Result<StopCause> {
        self.command(&format!("breakpoint {} {}", counter, target))?;
        self.run_to_completion()
    }

    fn run_to_completion(&mut self) -> anyhow::Result<StopCause> {
        let cause = self.command("simulate")?;
        Ok(StopCause::from_cause(cause.trim_end()))
    }

    fn checkpoint(&mut self, path: &Path) -> anyhow::Result<()> {
        self.command(&format!("checkpoint {}", path.display()))?;
        Ok(())
    }

    fn dump_stats(&mut self) -> anyhow::Result<()> {
        self.command("stats dump")?;
        Ok(())
    }

    fn bbhist_dump(&mut self) -> anyhow::Result<String> {
        self.command("bbhist dump")
    }

    fn bbhist_reset(&mut self) -> anyhow::Result<()> {
        self.command("bbhist reset")?;
        Ok(())
    }
}
