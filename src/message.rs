//! Wire message exchanged with the browser, one per WebSocket frame.
//!
//! ```json
//! {"type": "stdin", "arg": "ls -la"}
//! {"type": "stdout", "arg": "[Friday, 16-Oct-26 10:02:11 +00:00] total 12\n"}
//! ```

use std::fmt::Write as _;

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Default timestamp layout for outbound lines (RFC 850 style).
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%A, %d-%b-%y %H:%M:%S %Z";

/// Direction or origin of a message.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamType {
    /// No stream. Also the value of a message without a `type` field.
    #[default]
    None,
    /// Client input destined for the child's standard input.
    Stdin,
    /// A line the child wrote to standard output.
    Stdout,
    /// A line the child wrote to standard error.
    Stderr,
    /// Any tag outside the declared set; only produced by decoding.
    #[serde(other)]
    Unknown,
}

impl StreamType {
    /// Wire name of the tag.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Stdin => "stdin",
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for StreamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The unit of exchange in both directions.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Stream tag; serialized as `type`.
    #[serde(rename = "type", default)]
    pub kind: StreamType,
    /// Payload line.
    #[serde(default)]
    pub arg: String,
}

impl Message {
    /// Build a message from its parts.
    #[must_use]
    pub fn new(kind: StreamType, arg: impl Into<String>) -> Self {
        Self {
            kind,
            arg: arg.into(),
        }
    }

    /// Build an outbound line: `"[<timestamp>] <line>\n"` stamped with the
    /// local clock using the strftime `format`.
    #[must_use]
    pub fn stamped(kind: StreamType, line: &str, format: &str) -> Self {
        Self::new(kind, format!("[{}] {line}\n", local_timestamp(format)))
    }
}

/// Decode one frame payload into a [`Message`].
///
/// # Errors
///
/// Returns `AppError::Protocol` when the payload is not a JSON object with
/// string `type`/`arg` fields.
pub fn decode_frame(payload: &[u8]) -> Result<Message> {
    Ok(serde_json::from_slice(payload)?)
}

/// Encode a [`Message`] as the text payload of one frame.
#[must_use]
pub fn encode_frame(message: &Message) -> String {
    // Two string fields and a unit enum: serialization has no failure path.
    serde_json::to_string(message).unwrap_or_else(|_| {
        format!(
            "{{\"type\":\"{}\",\"arg\":\"\"}}",
            message.kind.as_str()
        )
    })
}

/// Check that `format` is a usable strftime layout.
#[must_use]
pub fn is_valid_timestamp_format(format: &str) -> bool {
    use chrono::format::{Item, StrftimeItems};

    !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

fn local_timestamp(format: &str) -> String {
    let now = Local::now();
    let mut out = String::new();
    if write!(out, "{}", now.format(format)).is_err() {
        out.clear();
        out.push_str(&now.to_rfc3339());
    }
    out
}
