//! Per-connection bridge between one WebSocket and one child process.
//!
//! A [`Connection`] walks `Connecting → Upgraded → Running → Terminating →
//! Closed`. [`Connection::run`] consumes it, so a connection can be driven
//! only once, and owns the [`ProcessHandle`] for the whole run: the handle is
//! closed on every exit path, including spawn failure and task panics.
//!
//! Task layout while `Running`:
//!
//! ```text
//! child stdout ──► output pump ──┐
//! child stderr ──► output pump ──┼─► mpsc ─► socket writer ─► WebSocket sink
//!                                │
//! WebSocket stream ─► input pump ─► child stdin
//! ```
//!
//! The connection ends on whichever comes first: the child exits, the input
//! pump stops (socket closed, idle timeout, rejected frame), or shutdown.

use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{close_code, CloseFrame, Message as Frame};
use futures_util::{Sink, SinkExt, Stream};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::GlobalConfig;
use crate::message::StreamType;
use crate::mode::{MalformedFramePolicy, StderrMode};
use crate::process::supervisor::{CommandSpec, ProcessHandle, ProcessPipes};
use crate::pump::input::{run_input_pump, InputExit, InputSettings};
use crate::pump::output::{drain_pipe, run_output_pump, OutputExit, OutputSettings};
use crate::pump::writer::{run_socket_writer, OUTBOUND_QUEUE};
use crate::Result;

/// Upper bound on waiting for the output pumps to reach end-of-stream
/// once the child is gone.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Upper bound on waiting for the socket writer to flush and close.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Immutable per-connection settings derived from [`GlobalConfig`].
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Program spawned for the connection.
    pub command: CommandSpec,
    /// Longest silence tolerated on the socket.
    pub idle_timeout: Duration,
    /// Longest output line forwarded before truncation.
    pub max_line_bytes: usize,
    /// Fate of the child's stderr.
    pub stderr: StderrMode,
    /// Reaction to inbound frames that do not decode.
    pub malformed_frames: MalformedFramePolicy,
    /// strftime layout of the outbound line prefix.
    pub timestamp_format: String,
}

impl ConnectionSettings {
    /// Derive connection settings from the global configuration.
    #[must_use]
    pub fn from_config(config: &GlobalConfig) -> Self {
        Self {
            command: config.command_spec(),
            idle_timeout: config.idle_timeout(),
            max_line_bytes: config.bridge.max_line_bytes,
            stderr: config.bridge.stderr,
            malformed_frames: config.bridge.malformed_frames,
            timestamp_format: config.bridge.timestamp_format.clone(),
        }
    }

    fn output(&self) -> OutputSettings {
        OutputSettings {
            timestamp_format: self.timestamp_format.clone(),
            max_line_bytes: self.max_line_bytes,
        }
    }

    fn input(&self) -> InputSettings {
        InputSettings {
            idle_timeout: self.idle_timeout,
            malformed_frames: self.malformed_frames,
        }
    }
}

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Request accepted, upgrade pending.
    Connecting,
    /// WebSocket established, child not yet running.
    Upgraded,
    /// Child running, pumps active.
    Running,
    /// Tearing down the child, pumps and socket.
    Terminating,
    /// Everything released.
    Closed,
}

/// What ended a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason {
    /// The child exited (successfully or not).
    ProcessExited,
    /// Waiting on the child failed.
    WaitFailed(String),
    /// The client closed the socket.
    PeerClosed,
    /// The client sent nothing for the idle timeout.
    IdleTimeout,
    /// The socket failed for a reason other than closure.
    SocketError(String),
    /// The client sent an undecodable frame under the `close` policy.
    MalformedFrame(String),
    /// The server is shutting down.
    Shutdown,
}

impl TerminationReason {
    fn from_input(joined: std::result::Result<InputExit, JoinError>) -> Self {
        match joined {
            Ok(InputExit::PeerClosed) => Self::PeerClosed,
            Ok(InputExit::IdleTimeout) => Self::IdleTimeout,
            Ok(InputExit::ReadFailed(msg)) => Self::SocketError(msg),
            Ok(InputExit::MalformedFrame(msg)) => Self::MalformedFrame(msg),
            Err(err) => Self::SocketError(format!("input pump task failed: {err}")),
        }
    }
}

/// Outcome of a completed connection.
#[derive(Debug, Clone)]
pub struct ConnectionReport {
    /// Connection id.
    pub id: u64,
    /// Final state; always [`ConnectionState::Closed`].
    pub state: ConnectionState,
    /// What ended the connection.
    pub reason: TerminationReason,
    /// Exit status when the child exited on its own.
    pub exit_status: Option<ExitStatus>,
}

/// One WebSocket bound to one child process.
#[derive(Debug)]
pub struct Connection {
    id: u64,
    settings: Arc<ConnectionSettings>,
    shutdown: CancellationToken,
    state: ConnectionState,
}

impl Connection {
    /// New connection in the `Connecting` state.
    #[must_use]
    pub fn new(id: u64, settings: Arc<ConnectionSettings>, shutdown: CancellationToken) -> Self {
        Self {
            id,
            settings,
            shutdown,
            state: ConnectionState::Connecting,
        }
    }

    /// Connection id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Bridge the upgraded socket (`sink` + `frames`) to a freshly spawned
    /// child until either side ends, then release everything.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Spawn` or `AppError::Process` when the child cannot
    /// be started. The socket is closed with code 1011 before returning.
    pub async fn run<Si, St, E>(mut self, mut sink: Si, frames: St) -> Result<ConnectionReport>
    where
        Si: Sink<Frame> + Unpin + Send + 'static,
        Si::Error: std::error::Error + Send + Sync + 'static,
        St: Stream<Item = std::result::Result<Frame, E>> + Unpin + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        self.transition(ConnectionState::Upgraded);

        let (mut process, pipes) = match launch(&self.settings.command) {
            Ok(launched) => launched,
            Err(err) => {
                self.transition(ConnectionState::Terminating);
                refuse(&mut sink).await;
                self.transition(ConnectionState::Closed);
                return Err(err);
            }
        };

        let (msg_tx, msg_rx) = mpsc::channel(OUTBOUND_QUEUE);
        let mut writer = tokio::spawn(run_socket_writer(sink, msg_rx));

        let output = self.settings.output();
        let mut output_pumps = JoinSet::new();
        output_pumps.spawn(run_output_pump(
            StreamType::Stdout,
            pipes.stdout,
            msg_tx.clone(),
            output.clone(),
        ));
        match self.settings.stderr {
            StderrMode::Forward => {
                output_pumps.spawn(run_output_pump(
                    StreamType::Stderr,
                    pipes.stderr,
                    msg_tx.clone(),
                    output,
                ));
            }
            StderrMode::Discard => {
                output_pumps.spawn(drain_pipe(StreamType::Stderr, pipes.stderr));
            }
        }
        drop(msg_tx);

        let mut input = tokio::spawn(run_input_pump(frames, pipes.stdin, self.settings.input()));
        self.transition(ConnectionState::Running);

        let (reason, exit_status) = tokio::select! {
            status = process.wait() => match status {
                Ok(status) => {
                    if status.success() {
                        info!(%status, "process exited");
                    } else {
                        warn!(%status, "process exited unsuccessfully");
                    }
                    (TerminationReason::ProcessExited, Some(status))
                }
                Err(err) => {
                    error!(%err, "process wait failed");
                    (TerminationReason::WaitFailed(err.to_string()), None)
                }
            },
            joined = &mut input => (TerminationReason::from_input(joined), None),
            () = self.shutdown.cancelled() => (TerminationReason::Shutdown, None),
        };

        self.transition(ConnectionState::Terminating);
        process.close();
        input.abort();
        drain_output(&mut output_pumps).await;

        match tokio::time::timeout(FLUSH_TIMEOUT, &mut writer).await {
            Ok(Ok(exit)) => debug!(?exit, "socket writer finished"),
            Ok(Err(err)) => warn!(%err, "socket writer task failed"),
            Err(_) => {
                warn!("socket writer did not flush in time, aborting");
                writer.abort();
            }
        }

        self.transition(ConnectionState::Closed);
        Ok(ConnectionReport {
            id: self.id,
            state: self.state,
            reason,
            exit_status,
        })
    }

    fn transition(&mut self, next: ConnectionState) {
        debug!(id = self.id, from = ?self.state, to = ?next, "connection state");
        self.state = next;
    }
}

fn launch(spec: &CommandSpec) -> Result<(ProcessHandle, ProcessPipes)> {
    let mut process = ProcessHandle::spawn(spec)?;
    process.start()?;
    let pipes = process.take_pipes()?;
    Ok((process, pipes))
}

/// Close the socket of a connection whose child never started.
async fn refuse<Si>(sink: &mut Si)
where
    Si: Sink<Frame> + Unpin,
    Si::Error: std::fmt::Display,
{
    let frame = Frame::Close(Some(CloseFrame {
        code: close_code::ERROR,
        reason: "failed to start process".into(),
    }));
    if let Err(err) = sink.send(frame).await {
        debug!(error = %err, "close frame not delivered");
    }
    if let Err(err) = sink.close().await {
        debug!(error = %err, "socket close failed");
    }
}

async fn drain_output(pumps: &mut JoinSet<OutputExit>) {
    let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
        while let Some(joined) = pumps.join_next().await {
            match joined {
                Ok(exit) => debug!(?exit, "output pump finished"),
                Err(err) => warn!(%err, "output pump task failed"),
            }
        }
    })
    .await;

    if drained.is_err() {
        warn!("output pumps still open after the child ended, aborting");
        pumps.abort_all();
    }
}
