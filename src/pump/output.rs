//! Output pump.
//!
//! Reads line-delimited text from one of the child's output pipes and queues
//! each line for the socket writer as a timestamped message tagged with the
//! pipe's [`StreamType`]. One pump runs per forwarded pipe; lines keep the
//! order the child wrote them.

use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;
use tracing::{debug, trace, warn};

use crate::message::{Message, StreamType};
use crate::process::codec::LineCodec;

/// Per-connection settings of an output pump.
#[derive(Debug, Clone)]
pub struct OutputSettings {
    /// strftime layout of the line prefix.
    pub timestamp_format: String,
    /// Longest line forwarded before truncation.
    pub max_line_bytes: usize,
}

/// Why an output pump stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputExit {
    /// The pipe reached end-of-stream (the child closed it, usually on exit).
    EndOfStream,
    /// The socket writer is gone; nothing more can be delivered.
    WriterClosed,
    /// Reading the pipe failed.
    ReadFailed(String),
}

/// Forward every line of `pipe` to `msg_tx` as a `kind`-tagged message.
pub async fn run_output_pump<R>(
    kind: StreamType,
    pipe: R,
    msg_tx: mpsc::Sender<Message>,
    settings: OutputSettings,
) -> OutputExit
where
    R: AsyncRead + Unpin,
{
    let mut lines = FramedRead::new(pipe, LineCodec::new(settings.max_line_bytes));
    let mut forwarded: u64 = 0;

    while let Some(item) = lines.next().await {
        match item {
            Ok(line) => {
                let message = Message::stamped(kind, &line, &settings.timestamp_format);
                if msg_tx.send(message).await.is_err() {
                    debug!(%kind, forwarded, "output pump: socket writer gone, stopping");
                    return OutputExit::WriterClosed;
                }
                forwarded += 1;
            }
            Err(err) => {
                warn!(%kind, error = %err, "output pump: pipe read failed");
                return OutputExit::ReadFailed(err.to_string());
            }
        }
    }

    debug!(%kind, forwarded, "output pump: end of stream");
    OutputExit::EndOfStream
}

/// Read `pipe` to the end and drop the bytes, so the child never blocks on
/// a full pipe whose content nobody wants.
pub async fn drain_pipe<R>(kind: StreamType, mut pipe: R) -> OutputExit
where
    R: AsyncRead + Unpin,
{
    match tokio::io::copy(&mut pipe, &mut tokio::io::sink()).await {
        Ok(bytes) => {
            trace!(%kind, bytes, "drained pipe");
            OutputExit::EndOfStream
        }
        Err(err) => {
            warn!(%kind, error = %err, "pipe drain failed");
            OutputExit::ReadFailed(err.to_string())
        }
    }
}
