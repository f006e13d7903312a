//! Line framing for child process output.
//!
//! A child can write anything to its pipes, so this decoder never fails on
//! content: invalid UTF-8 is replaced lossily, a trailing `\r` is stripped,
//! and a line longer than the configured limit is cut at the limit with the
//! remainder discarded up to the next `\n`. Only I/O errors surface.
//!
//! ```rust,ignore
//! use tokio_util::codec::FramedRead;
//! use sockd::process::codec::LineCodec;
//!
//! let lines = FramedRead::new(child_stdout, LineCodec::new(1 << 20));
//! ```

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;
use tracing::warn;

use crate::AppError;

/// Default maximum line length: 1 MiB.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// Newline-delimited decoder with a hard per-line limit.
#[derive(Debug)]
pub struct LineCodec {
    max_length: usize,
    /// Where to resume the newline search on the next call.
    next_index: usize,
    /// Set after an overlong line was emitted; bytes are dropped until `\n`.
    discarding: bool,
}

impl LineCodec {
    /// Create a codec that emits at most `max_length` bytes per line.
    #[must_use]
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length: max_length.max(1),
            next_index: 0,
            discarding: false,
        }
    }

    /// The per-line limit in bytes.
    #[must_use]
    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new(MAX_LINE_BYTES)
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, AppError> {
        loop {
            let read_to = src.len().min(self.max_length.saturating_add(1));
            let newline = src[self.next_index..read_to]
                .iter()
                .position(|b| *b == b'\n')
                .map(|offset| offset + self.next_index);

            match (self.discarding, newline) {
                (true, Some(index)) => {
                    src.advance(index + 1);
                    self.discarding = false;
                    self.next_index = 0;
                }
                (true, None) => {
                    src.advance(read_to);
                    self.next_index = 0;
                    if src.is_empty() {
                        return Ok(None);
                    }
                }
                (false, Some(index)) => {
                    self.next_index = 0;
                    let line = src.split_to(index + 1);
                    return Ok(Some(to_line(&line[..index])));
                }
                (false, None) if src.len() > self.max_length => {
                    let line = src.split_to(self.max_length);
                    self.discarding = true;
                    self.next_index = 0;
                    warn!(
                        limit = self.max_length,
                        "output line exceeds limit, truncating"
                    );
                    return Ok(Some(to_line(&line)));
                }
                (false, None) => {
                    self.next_index = read_to;
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, AppError> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        self.next_index = 0;
        if src.is_empty() || self.discarding {
            src.clear();
            self.discarding = false;
            return Ok(None);
        }
        let rest = src.split_to(src.len());
        Ok(Some(to_line(&rest)))
    }
}

fn to_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}
