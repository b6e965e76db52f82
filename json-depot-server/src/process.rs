//! Runs shell commands with a timeout and a cap on the captured output.
//!
//! # Security
//! The command string is handed to the host shell as is. There is no sandbox,
//! no escaping and no allow list: whoever can reach `/api/command` can run
//! anything the server user can.

use std::fmt;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

/// The output of a command, decoded lossily as utf-8.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captured {
    pub stdout: String,
    pub stderr: String,
}

impl Captured {
    fn from_bytes(stdout: &[u8], stderr: &[u8]) -> Self {
        Captured {
            stdout: String::from_utf8_lossy(stdout).into_owned(),
            stderr: String::from_utf8_lossy(stderr).into_owned(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stream::Stdout => f.write_str("stdout"),
            Stream::Stderr => f.write_str("stderr"),
        }
    }
}

/// Every way a command can fail. All variants but [`ExecError::Launch`] carry the
/// output captured up to the failure.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("Failed to launch shell: {0}")]
    Launch(#[source] std::io::Error),
    #[error("Command timed out after {}ms", .timeout.as_millis())]
    Timeout {
        timeout: Duration,
        output: Captured,
    },
    #[error("{stream} maxBuffer length exceeded")]
    BufferExceeded { stream: Stream, output: Captured },
    #[error("Command failed with {status}")]
    Exit { status: ExitStatus, output: Captured },
    #[error("Failed to read command output: {source}")]
    Io {
        source: std::io::Error,
        output: Captured,
    },
}

impl ExecError {
    pub fn output(&self) -> Option<&Captured> {
        match self {
            ExecError::Launch(_) => None,
            ExecError::Timeout { output, .. }
            | ExecError::BufferExceeded { output, .. }
            | ExecError::Exit { output, .. }
            | ExecError::Io { output, .. } => Some(output),
        }
    }
}

/// Runs commands through the host shell.
#[derive(Debug, Clone)]
pub struct Executor {
    max_output: usize,
}

impl Executor {
    pub fn new(max_output: usize) -> Self {
        Executor { max_output }
    }

    /// Runs `command` through the shell and waits for it to finish and close its output.
    ///
    /// Only a zero exit status is a success, anything else is an [`ExecError`].
    /// On timeout or when an output stream exceeds the limit, the shell is killed.
    /// A `timeout` of `None` waits forever.
    /// If the returned future is dropped, the shell is killed as well.
    pub async fn execute(
        &self,
        id: u64,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<Captured, ExecError> {
        let mut child = shell(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(ExecError::Launch)?;
        log::debug!(id, pid:debug = child.id(); "spawned shell");

        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();
        let mut out = Vec::new();
        let mut err = Vec::new();

        let limit = timeout.unwrap_or(Duration::MAX);
        let deadline = tokio::time::sleep(limit);
        tokio::pin!(deadline);

        let status = loop {
            let failure = tokio::select! {
                read = read_chunk(stdout.as_mut(), &mut out, self.max_output), if stdout.is_some() => {
                    match read {
                        Ok(Chunk::Data) => None,
                        Ok(Chunk::Eof) => {
                            stdout = None;
                            None
                        }
                        Ok(Chunk::Exceeded) => Some(Failure::Exceeded(Stream::Stdout)),
                        Err(e) => Some(Failure::Io(e)),
                    }
                }
                read = read_chunk(stderr.as_mut(), &mut err, self.max_output), if stderr.is_some() => {
                    match read {
                        Ok(Chunk::Data) => None,
                        Ok(Chunk::Eof) => {
                            stderr = None;
                            None
                        }
                        Ok(Chunk::Exceeded) => Some(Failure::Exceeded(Stream::Stderr)),
                        Err(e) => Some(Failure::Io(e)),
                    }
                }
                status = child.wait(), if stdout.is_none() && stderr.is_none() => {
                    match status {
                        Ok(status) => break status,
                        Err(e) => Some(Failure::Io(e)),
                    }
                }
                () = &mut deadline, if timeout.is_some() => Some(Failure::Timeout),
            };

            if let Some(failure) = failure {
                if let Err(e) = child.start_kill() {
                    log::warn!(id, e:debug; "failed to kill shell");
                }
                let output = Captured::from_bytes(&out, &err);
                return Err(match failure {
                    Failure::Timeout => ExecError::Timeout {
                        timeout: limit,
                        output,
                    },
                    Failure::Exceeded(stream) => ExecError::BufferExceeded { stream, output },
                    Failure::Io(source) => ExecError::Io { source, output },
                });
            }
        };

        let output = Captured::from_bytes(&out, &err);
        if status.success() {
            Ok(output)
        } else {
            Err(ExecError::Exit { status, output })
        }
    }
}

enum Failure {
    Timeout,
    Exceeded(Stream),
    Io(std::io::Error),
}

enum Chunk {
    Data,
    Eof,
    Exceeded,
}

/// Reads once from `reader` into `buffer`, reporting when `buffer` grows beyond `max`.
///
/// Cancel safe: nothing is read if the future is dropped before completion.
async fn read_chunk<R: AsyncRead + Unpin>(
    reader: Option<&mut R>,
    buffer: &mut Vec<u8>,
    max: usize,
) -> std::io::Result<Chunk> {
    let Some(reader) = reader else {
        return Ok(Chunk::Eof);
    };
    let mut chunk = [0u8; 8192];
    let n = reader.read(&mut chunk).await?;
    if n == 0 {
        return Ok(Chunk::Eof);
    }
    if buffer.len() + n > max {
        // Keep what fits, so the error carries exactly `max` bytes.
        let fits = max - buffer.len();
        buffer.extend_from_slice(&chunk[..fits]);
        return Ok(Chunk::Exceeded);
    }
    buffer.extend_from_slice(&chunk[..n]);
    Ok(Chunk::Data)
}

#[cfg(unix)]
fn shell(command: &str) -> Command {
    let mut shell = Command::new("sh");
    shell.arg("-c").arg(command);
    shell
}

#[cfg(windows)]
fn shell(command: &str) -> Command {
    let mut shell = Command::new("cmd.exe");
    shell.arg("/d").arg("/s").arg("/c").arg(command);
    shell
}
