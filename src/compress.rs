use crate::SamplingError;
use clap::ValueEnum;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    process::{Child, ChildStdin, Command, Stdio},
};
use zstd::Encoder;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Compression {
    /// Plain text
    #[default]
    None,
    /// zstd, compressed in-process
    Zstd,
    /// gzip, piped through an external `gzip` process
    Gzip,
}

/// Append-only output file, optionally compressed
pub enum OutputSink {
    Plain(BufWriter<File>),
    Zstd(Encoder<'static, BufWriter<File>>),
    Pipe {
        child: Child,
        stdin: BufWriter<ChildStdin>,
    },
}

impl OutputSink {
    pub fn create<P: AsRef<Path>>(path: P, compression: Compression) -> anyhow::Result<Self> {
        let file = File::create(path.as_ref())?;
        match compression {
            Compression::None => Ok(Self::Plain(BufWriter::new(file))),
            Compression::Zstd => Ok(Self::Zstd(Encoder::new(BufWriter::new(file), 0)?)),
            Compression::Gzip => {
                let mut cmd = Command::new("gzip");
                cmd.arg("-c");
                Self::spawn(cmd, file)
            }
        }
    }

    /// Pipe everything written to the sink through `cmd`, whose stdout goes to `file`
    pub fn spawn(mut cmd: Command, file: File) -> anyhow::Result<Self> {
        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::from(file))
            .spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow::anyhow!("compressor has no stdin"))?;
        log::debug!("spawned compressor {:?} (pid {})", cmd, child.id());
        Ok(Self::Pipe {
            child,
            stdin: BufWriter::new(stdin),
        })
    }

    /// Flush and close the output. For piped output, waits for the compressor
    /// and fails if it exited with a non-zero status.
    pub fn finish(self) -> anyhow::Result<()> {
        match self {
            Self::Plain(mut writer) => writer.flush()?,
            Self::Zstd(encoder) => encoder.finish()?.flush()?,
            Self::Pipe { mut child, stdin } => {
                // a compressor that died early shows up as EPIPE here; its
                // exit status is the more useful error
                let flushed = stdin.into_inner().map(drop).map_err(|err| err.into_error());
                let status = child.wait()?;
                if !status.success() {
                    return Err(SamplingError::Compressor(status).into());
                }
                flushed?;
            }
        }
        Ok(())
    }
}

impl Write for OutputSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::Plain(writer) => writer.write(buf),
            Self::Zstd(encoder) => encoder.write(buf),
            Self::Pipe { stdin, .. } => stdin.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::Plain(writer) => writer.flush(),
            Self::Zstd(encoder) => encoder.flush(),
            Self::Pipe { stdin, .. } => stdin.flush(),
        }
    }
}
