//! Socket writer task.
//!
//! The only task that writes to the WebSocket. Output pumps queue
//! [`Message`]s on a bounded [`mpsc`] channel; the writer encodes each one as
//! a text frame and sends it, preserving queue order. When every sender is
//! gone the writer sends a normal close frame and flushes the sink.

use axum::extract::ws::{close_code, CloseFrame, Message as Frame};
use futures_util::{Sink, SinkExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::message::{encode_frame, Message};
use crate::pump::closure::is_expected_closure;

/// Capacity of the outbound message queue shared by the output pumps.
pub const OUTBOUND_QUEUE: usize = 256;

/// Why the socket writer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterExit {
    /// All output pumps finished and the close frame was sent.
    Drained,
    /// The peer went away; remaining messages were dropped.
    PeerClosed,
}

/// Socket writer: drains `msg_rx` into `sink`.
///
/// Write failures that indicate the peer is gone end the loop silently.
/// Any other failure is logged and the loop keeps going; delivery is
/// best-effort, not at-least-once.
pub async fn run_socket_writer<Si>(mut sink: Si, mut msg_rx: mpsc::Receiver<Message>) -> WriterExit
where
    Si: Sink<Frame> + Unpin,
    Si::Error: std::error::Error + 'static,
{
    while let Some(message) = msg_rx.recv().await {
        let frame = Frame::text(encode_frame(&message));
        if let Err(err) = sink.send(frame).await {
            if is_expected_closure(&err) {
                debug!(error = %err, "socket writer: peer closed, stopping");
                return WriterExit::PeerClosed;
            }
            warn!(error = %err, kind = %message.kind, "socket writer: frame write failed");
        }
    }

    let goodbye = Frame::Close(Some(CloseFrame {
        code: close_code::NORMAL,
        reason: "process exited".into(),
    }));
    if let Err(err) = sink.send(goodbye).await {
        debug!(error = %err, "socket writer: close frame not delivered");
    }
    if let Err(err) = sink.close().await {
        debug!(error = %err, "socket writer: sink close failed");
    }

    WriterExit::Drained
}
