//! Classification of socket failures.
//!
//! A peer that goes away mid-read or mid-write is the normal end of a
//! bridge, not a fault. Those failures are logged at `debug`; everything
//! else is logged at `warn`.

use std::error::Error;
use std::io::ErrorKind;

use axum::extract::ws::{close_code, CloseFrame};

/// Fragments of WebSocket error messages that mean "the peer is gone".
const CLOSED_MARKERS: &[&str] = &[
    "connection closed normally",
    "trying to work with closed connection",
    "sending after closing is not allowed",
    "connection reset without closing handshake",
];

/// Whether `err`, or any error in its source chain, reports an expected
/// closure of the connection.
#[must_use]
pub fn is_expected_closure(err: &(dyn Error + 'static)) -> bool {
    let mut current: Option<&(dyn Error + 'static)> = Some(err);
    while let Some(err) = current {
        if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
            if matches!(
                io_err.kind(),
                ErrorKind::BrokenPipe
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::UnexpectedEof
            ) {
                return true;
            }
        }
        let text = err.to_string().to_ascii_lowercase();
        if CLOSED_MARKERS.iter().any(|marker| text.contains(marker)) {
            return true;
        }
        current = err.source();
    }
    false
}

/// Whether a close frame from the client is an ordinary goodbye.
///
/// A close without a frame, or with code normal (1000), going away (1001)
/// or abnormal (1006), is expected.
#[must_use]
pub fn is_expected_close_frame(frame: Option<&CloseFrame>) -> bool {
    frame.is_none_or(|frame| {
        matches!(
            frame.code,
            close_code::NORMAL | close_code::AWAY | close_code::ABNORMAL
        )
    })
}
