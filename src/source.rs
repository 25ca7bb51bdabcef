//! Bridge to the external log command.

use crate::config::{LogCommand, Mode, ProcessFilter};
use crate::error::{Error, Result};
use std::fmt;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tracing::{debug, info, warn};

type OutputReader = Box<dyn AsyncRead + Send + Unpin>;

/// Runs the external log command in its dump, stream and clear modes.
#[derive(Debug, Clone)]
pub struct LogSource {
    command: LogCommand,
    terminate_timeout: Duration,
}

impl LogSource {
    pub fn new(command: LogCommand, terminate_timeout: Duration) -> Self {
        Self {
            command,
            terminate_timeout,
        }
    }

    pub fn command(&self) -> &LogCommand {
        &self.command
    }

    /// Run the dump command to completion and return every line it printed.
    pub async fn snapshot(&self, filter: Option<ProcessFilter>) -> Result<Vec<String>> {
        let stdout = self.run_once(Mode::Dump, filter).await?;
        Ok(String::from_utf8_lossy(&stdout)
            .lines()
            .map(str::to_string)
            .collect())
    }

    /// Run the clear command to completion.
    pub async fn clear(&self) -> Result<()> {
        self.run_once(Mode::Clear, None).await?;
        Ok(())
    }

    /// Spawn the long-running stream command.
    pub fn start_streaming(&self, filter: Option<ProcessFilter>) -> Result<LiveSource> {
        let program = self.command.program();
        let args = self.command.args_for(Mode::Stream, filter);
        info!("Spawning log stream: {} {}", program, args.join(" "));

        let mut child = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::spawn(program, e))?;

        let pid = child.id();
        info!("Log stream process started with PID: {:?}", pid);

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Io(std::io::Error::other("stdout was not captured")))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(stderr_reader(stderr, pid));
        }

        let reader: OutputReader = Box::new(stdout);
        Ok(LiveSource {
            child,
            reader: BufReader::new(reader),
            buf: Vec::new(),
            pid,
            status: None,
            terminate_timeout: self.terminate_timeout,
        })
    }

    async fn run_once(&self, mode: Mode, filter: Option<ProcessFilter>) -> Result<Vec<u8>> {
        let program = self.command.program();
        let args = self.command.args_for(mode, filter);
        debug!("Running {:?} command: {} {}", mode, program, args.join(" "));

        let output = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::spawn(program, e))?;

        if !output.status.success() {
            return Err(Error::CommandFailed {
                program: program.to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output.stdout)
    }
}

/// Handle to a running stream process and its line-oriented output.
///
/// Dropping the handle kills the process.
pub struct LiveSource {
    child: Child,
    reader: BufReader<OutputReader>,
    /// Bytes of the line being read; kept across cancelled reads.
    buf: Vec<u8>,
    pid: Option<u32>,
    status: Option<ExitStatus>,
    terminate_timeout: Duration,
}

impl LiveSource {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Next line of output, or `None` once the process closed stdout.
    ///
    /// Bytes that are not valid UTF-8 are replaced rather than failing the read.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        if self.reader.read_until(b'\n', &mut self.buf).await? == 0 {
            return Ok(None);
        }
        let line = decode_line(&self.buf);
        self.buf.clear();
        Ok(Some(line))
    }

    /// Replace the output reader, keeping the process.
    #[cfg(test)]
    pub(crate) fn with_reader(mut self, reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        let reader: OutputReader = Box::new(reader);
        self.reader = BufReader::new(reader);
        self.buf.clear();
        self
    }

    /// Kill the process and reap it. Calling this again is a no-op.
    pub async fn terminate(&mut self) -> Result<Option<i32>> {
        if let Some(status) = self.status {
            return Ok(status.code());
        }
        if let Some(status) = self.child.try_wait()? {
            debug!("Log process {:?} already exited: {}", self.pid, status);
            self.status = Some(status);
            return Ok(status.code());
        }

        info!("Terminating log process {:?}", self.pid);
        self.child.start_kill()?;
        match tokio::time::timeout(self.terminate_timeout, self.child.wait()).await {
            Ok(status) => {
                let status = status?;
                debug!("Log process {:?} exited: {}", self.pid, status);
                self.status = Some(status);
                Ok(status.code())
            }
            Err(_) => {
                warn!("Log process {:?} did not exit after kill", self.pid);
                Err(Error::TerminateTimeout { pid: self.pid })
            }
        }
    }

    /// After end of output, give the process a bounded time to exit on its
    /// own before killing it.
    pub async fn wait_exit(&mut self) -> Result<Option<i32>> {
        if let Some(status) = self.status {
            return Ok(status.code());
        }
        match tokio::time::timeout(self.terminate_timeout, self.child.wait()).await {
            Ok(status) => {
                let status = status?;
                self.status = Some(status);
                Ok(status.code())
            }
            Err(_) => self.terminate().await,
        }
    }
}

impl fmt::Debug for LiveSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveSource")
            .field("pid", &self.pid)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Strip the line terminator and decode, replacing invalid UTF-8.
fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Forward stderr of the stream process into the log.
///
/// Keeps draining until EOF so the process never writes into a closed pipe.
async fn stderr_reader(stderr: ChildStderr, pid: Option<u32>) {
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();

    loop {
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                warn!("log process {:?} stderr: {}", pid, decode_line(&buf));
                buf.clear();
            }
            Err(e) => {
                warn!("Failed to read stderr of log process {:?}: {}", pid, e);
                break;
            }
        }
    }

    debug!("stderr reader for {:?} finished", pid);
}
