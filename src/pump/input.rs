//! Input pump.
//!
//! Reads frames from the WebSocket and writes the payload of every
//! `stdin`-tagged message to the child's standard input, followed by `\n`,
//! in the order the frames arrive.
//!
//! | Frame                         | Effect                                   |
//! |-------------------------------|------------------------------------------|
//! | text/binary, `type: stdin`    | `arg + "\n"` written to the child        |
//! | text/binary, any other type   | discarded, logged at `WARN`              |
//! | text/binary, not a message    | per [`MalformedFramePolicy`]             |
//! | ping / pong                   | ignored                                  |
//! | close                         | pump ends                                |
//!
//! Every read is bounded by the idle timeout: a client that sends nothing
//! for that long ends the pump, and with it the connection.

use std::time::Duration;

use axum::extract::ws::Message as Frame;
use futures_util::{Stream, StreamExt};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::message::{decode_frame, StreamType};
use crate::mode::MalformedFramePolicy;
use crate::pump::closure::{is_expected_close_frame, is_expected_closure};

/// Per-connection settings of the input pump.
#[derive(Debug, Clone, Copy)]
pub struct InputSettings {
    /// Longest silence tolerated between two inbound frames.
    pub idle_timeout: Duration,
    /// Reaction to frames that do not decode.
    pub malformed_frames: MalformedFramePolicy,
}

/// Why the input pump stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputExit {
    /// The client closed the socket or the stream ended.
    PeerClosed,
    /// No frame arrived within the idle timeout.
    IdleTimeout,
    /// Reading the socket failed for a reason other than closure.
    ReadFailed(String),
    /// A frame failed to decode under [`MalformedFramePolicy::Close`].
    MalformedFrame(String),
}

/// Input pump: feeds `stdin` from `frames` until the socket ends.
pub async fn run_input_pump<St, E, W>(mut frames: St, mut stdin: W, settings: InputSettings) -> InputExit
where
    St: Stream<Item = Result<Frame, E>> + Unpin,
    E: std::error::Error + 'static,
    W: AsyncWrite + Unpin,
{
    let mut delivered: u64 = 0;

    loop {
        let Ok(next) = tokio::time::timeout(settings.idle_timeout, frames.next()).await else {
            info!(
                idle_timeout = ?settings.idle_timeout,
                "input pump: client idle, closing"
            );
            return InputExit::IdleTimeout;
        };

        let frame = match next {
            None => {
                debug!(delivered, "input pump: socket stream ended");
                return InputExit::PeerClosed;
            }
            Some(Err(err)) => {
                if is_expected_closure(&err) {
                    debug!(error = %err, "input pump: peer closed");
                    return InputExit::PeerClosed;
                }
                warn!(error = %err, "input pump: socket read failed");
                return InputExit::ReadFailed(err.to_string());
            }
            Some(Ok(frame)) => frame,
        };

        let payload: &[u8] = match &frame {
            Frame::Text(text) => text.as_str().as_bytes(),
            Frame::Binary(bytes) => &bytes[..],
            Frame::Ping(_) | Frame::Pong(_) => continue,
            Frame::Close(close) => {
                if is_expected_close_frame(close.as_ref()) {
                    debug!(delivered, "input pump: client closed");
                } else {
                    warn!(?close, "input pump: client closed with unexpected code");
                }
                return InputExit::PeerClosed;
            }
        };

        let message = match decode_frame(payload) {
            Ok(message) => message,
            Err(err) => {
                warn!(
                    error = %err,
                    raw = %String::from_utf8_lossy(payload),
                    "input pump: malformed frame"
                );
                match settings.malformed_frames {
                    MalformedFramePolicy::Skip => continue,
                    MalformedFramePolicy::Close => return InputExit::MalformedFrame(err.to_string()),
                }
            }
        };

        match message.kind {
            StreamType::Stdin => {
                debug!(arg = %message.arg, "input pump: received");
                match write_line(&mut stdin, &message.arg).await {
                    Ok(()) => delivered += 1,
                    Err(err) => {
                        warn!(error = %err, "input pump: write to process stdin failed, dropping line");
                    }
                }
            }
            StreamType::None | StreamType::Stdout | StreamType::Stderr | StreamType::Unknown => {
                warn!(
                    kind = %message.kind,
                    arg = %message.arg,
                    "input pump: wrong message type, discarding"
                );
            }
        }
    }
}

async fn write_line<W>(stdin: &mut W, arg: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = Vec::with_capacity(arg.len() + 1);
    line.extend_from_slice(arg.as_bytes());
    line.push(b'\n');
    stdin.write_all(&line).await?;
    stdin.flush().await
}
