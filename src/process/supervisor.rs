//! Child process supervisor.
//!
//! A [`ProcessHandle`] owns exactly one child and its three pipes for the
//! lifetime of a connection. It moves through `Prepared → Running → Closed`;
//! [`ProcessHandle::close`] is idempotent and also runs on drop, so every exit
//! path of the owning connection releases the child exactly once.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, warn};

use crate::{AppError, Result};

/// Program, arguments and working directory of the bridged command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Executable name or path.
    pub program: String,
    /// Arguments passed verbatim.
    pub args: Vec<String>,
    /// Working directory; inherits the server's when `None`.
    pub working_dir: Option<PathBuf>,
}

impl CommandSpec {
    /// Command running `program` with no arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    /// Append arguments.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

/// The three pipe ends of a running child, handed to the pumps.
#[derive(Debug)]
pub struct ProcessPipes {
    /// Write end of the child's standard input.
    pub stdin: ChildStdin,
    /// Read end of the child's standard output.
    pub stdout: ChildStdout,
    /// Read end of the child's standard error.
    pub stderr: ChildStderr,
}

/// One bridged child process.
#[derive(Debug)]
pub struct ProcessHandle {
    program: String,
    command: Option<Command>,
    child: Option<Child>,
    pipes: Option<ProcessPipes>,
    closed: bool,
}

impl ProcessHandle {
    /// Prepare a child with stdin, stdout and stderr all piped.
    ///
    /// Nothing runs until [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// Returns `AppError::Spawn` if the program name is empty.
    pub fn spawn(spec: &CommandSpec) -> Result<Self> {
        if spec.program.trim().is_empty() {
            return Err(AppError::Spawn("command must not be empty".into()));
        }

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.working_dir {
            cmd.current_dir(dir);
        }

        Ok(Self {
            program: spec.program.clone(),
            command: Some(cmd),
            child: None,
            pipes: None,
            closed: false,
        })
    }

    /// Create the OS process and capture its pipes.
    ///
    /// If any pipe cannot be captured, the ones already captured are
    /// released and the child is killed before the error is returned.
    ///
    /// # Errors
    ///
    /// - `AppError::Process` if the handle was already started or closed.
    /// - `AppError::Spawn` if the OS refuses to create the process (missing
    ///   executable, resource exhaustion) or a pipe is missing.
    pub fn start(&mut self) -> Result<()> {
        let mut cmd = self
            .command
            .take()
            .ok_or_else(|| AppError::Process(format!("`{}` already started or closed", self.program)))?;

        let mut child = cmd
            .spawn()
            .map_err(|err| AppError::Spawn(format!("failed to spawn `{}`: {err}", self.program)))?;

        match capture_pipes(&mut child) {
            Ok(pipes) => {
                info!(
                    program = self.program,
                    pid = child.id().unwrap_or(0),
                    "process started"
                );
                self.child = Some(child);
                self.pipes = Some(pipes);
                Ok(())
            }
            Err(err) => {
                if let Err(kill_err) = child.start_kill() {
                    warn!(program = self.program, %kill_err, "failed to kill half-started process");
                }
                self.closed = true;
                Err(err)
            }
        }
    }

    /// Transfer the pipe ends to their single reader or writer.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Process` if the process is not running or the
    /// pipes were already taken.
    pub fn take_pipes(&mut self) -> Result<ProcessPipes> {
        self.pipes
            .take()
            .ok_or_else(|| AppError::Process(format!("pipes of `{}` not available", self.program)))
    }

    /// OS process id while the child is held.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Whether [`close`](Self::close) has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Suspend until the child exits.
    ///
    /// Cancel safe: dropping the future leaves the child untouched.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Process` if the child was never started, was
    /// already closed, or the OS wait fails.
    pub async fn wait(&mut self) -> Result<ExitStatus> {
        let child = self
            .child
            .as_mut()
            .ok_or_else(|| AppError::Process(format!("`{}` is not running", self.program)))?;
        child
            .wait()
            .await
            .map_err(|err| AppError::Process(format!("failed to wait on `{}`: {err}", self.program)))
    }

    /// Release the pipes still held and the child, killing it if it has not
    /// exited yet. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.command = None;
        self.pipes = None;

        if let Some(mut child) = self.child.take() {
            match child.try_wait() {
                Ok(Some(status)) => {
                    debug!(program = self.program, %status, "process already exited");
                }
                Ok(None) | Err(_) => {
                    if let Err(err) = child.start_kill() {
                        warn!(program = self.program, %err, "failed to kill process");
                    } else {
                        debug!(program = self.program, "process killed");
                    }
                }
            }
            // Dropping the child hands it to tokio's orphan reaper.
        }
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        self.close();
    }
}

fn capture_pipes(child: &mut Child) -> Result<ProcessPipes> {
    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| AppError::Spawn("failed to capture process stdin".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::Spawn("failed to capture process stdout".into()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::Spawn("failed to capture process stderr".into()))?;
    Ok(ProcessPipes {
        stdin,
        stdout,
        stderr,
    })
}
