//! Launching helper processes and streaming their combined output.

use crate::error::PipelineError;
use async_trait::async_trait;
use std::ffi::OsStr;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use std::process::Stdio;
use std::thread;
use tokio::process::{Child, Command};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

#[cfg(target_os = "windows")]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Exit status reported when the process died from a signal.
pub const SIGNALLED_EXIT_CODE: i32 = -1;

/// Collected result of a short-lived helper run (prober queries).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CapturedOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// One running external process owned by the pipeline worker.
#[async_trait]
pub trait ProcessHandle: Send {
    /// Next line of combined stdout/stderr; `None` once the stream closes.
    /// Read errors after an abrupt death also end the stream.
    async fn next_line(&mut self) -> Option<String>;

    /// Ask the process to stop. Calling it again has no further effect.
    fn terminate(&mut self);

    async fn wait(&mut self) -> Result<i32, PipelineError>;
}

#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    async fn launch(
        &self,
        program: &Path,
        args: &[String],
    ) -> Result<Box<dyn ProcessHandle>, PipelineError>;

    /// Run to completion and collect stdout/stderr separately.
    async fn capture(&self, program: &Path, args: &[String])
    -> Result<CapturedOutput, PipelineError>;
}

pub(crate) fn hidden_command(program: impl AsRef<OsStr>) -> Command {
    #[allow(unused_mut)]
    let mut command = Command::new(program);
    #[cfg(target_os = "windows")]
    {
        command.creation_flags(CREATE_NO_WINDOW);
    }
    command
}

/// Launches real OS processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

#[async_trait]
impl ProcessLauncher for SystemLauncher {
    async fn launch(
        &self,
        program: &Path,
        args: &[String],
    ) -> Result<Box<dyn ProcessHandle>, PipelineError> {
        ensure_present(program)?;

        // stdout and stderr share one pipe so lines keep the order the tool
        // wrote them in.
        let (reader, writer) = io::pipe()?;
        let writer_for_stderr = writer.try_clone()?;

        let mut command = hidden_command(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(writer)
            .stderr(writer_for_stderr)
            .kill_on_drop(true);

        let spawned = command.spawn();
        // The command still holds the parent's write ends; they must close
        // for the reader to ever see end-of-stream.
        drop(command);
        let child = spawned.map_err(|source| PipelineError::Spawn {
            program: program.to_path_buf(),
            source,
        })?;
        debug!(program = %program.display(), pid = ?child.id(), "process launched");

        let (tx, rx) = mpsc::unbounded_channel();
        thread::spawn(move || forward_lines(reader, tx));

        Ok(Box::new(ChildProcess {
            child,
            lines: rx,
            terminated: false,
        }))
    }

    async fn capture(
        &self,
        program: &Path,
        args: &[String],
    ) -> Result<CapturedOutput, PipelineError> {
        ensure_present(program)?;
        let output = hidden_command(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| PipelineError::Spawn {
                program: program.to_path_buf(),
                source,
            })?;
        Ok(CapturedOutput {
            code: output.status.code().unwrap_or(SIGNALLED_EXIT_CODE),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

fn ensure_present(program: &Path) -> Result<(), PipelineError> {
    if program.is_file() {
        return Ok(());
    }
    Err(PipelineError::Spawn {
        program: program.to_path_buf(),
        source: io::Error::new(io::ErrorKind::NotFound, "executable does not exist"),
    })
}

struct ChildProcess {
    child: Child,
    lines: UnboundedReceiver<String>,
    terminated: bool,
}

#[async_trait]
impl ProcessHandle for ChildProcess {
    async fn next_line(&mut self) -> Option<String> {
        self.lines.recv().await
    }

    fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        if let Err(error) = self.child.start_kill() {
            // Already exited; nothing left to stop.
            debug!("terminate ignored: {error}");
        }
    }

    async fn wait(&mut self) -> Result<i32, PipelineError> {
        let status = self.child.wait().await?;
        Ok(status.code().unwrap_or(SIGNALLED_EXIT_CODE))
    }
}

fn forward_lines<R: Read>(reader: R, tx: UnboundedSender<String>) {
    let mut reader = BufReader::new(reader);
    let mut raw = Vec::new();
    loop {
        match read_lossy_line(&mut reader, &mut raw) {
            Ok(Some(line)) => {
                if tx.send(line).is_err() {
                    return;
                }
            }
            Ok(None) => return,
            Err(error) => {
                warn!("output stream closed early: {error}");
                return;
            }
        }
    }
}

/// Next non-empty line, ended by `\n` or a bare `\r` (progress redraws).
/// Invalid UTF-8 is replaced. Returns `None` at end of stream.
pub(crate) fn read_lossy_line<R: BufRead>(
    reader: &mut R,
    raw: &mut Vec<u8>,
) -> io::Result<Option<String>> {
    raw.clear();
    loop {
        let available = match reader.fill_buf() {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error),
        };
        if available.is_empty() {
            if raw.is_empty() {
                return Ok(None);
            }
            return Ok(Some(String::from_utf8_lossy(raw).into_owned()));
        }
        match available.iter().position(|byte| *byte == b'\n' || *byte == b'\r') {
            Some(index) => {
                raw.extend_from_slice(&available[..index]);
                reader.consume(index + 1);
                if !raw.is_empty() {
                    return Ok(Some(String::from_utf8_lossy(raw).into_owned()));
                }
            }
            None => {
                let consumed = available.len();
                raw.extend_from_slice(available);
                reader.consume(consumed);
            }
        }
    }
}
