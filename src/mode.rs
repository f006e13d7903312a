//! Bridge policy switches.
//!
//! Both enums double as `--flag` values on the command line and as
//! snake-case strings in the `[bridge]` table of the TOML config.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// What happens to the child's standard error stream.
///
/// The error pipe is always drained so the child can never block on a full
/// pipe buffer; this only decides whether its lines reach the client.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StderrMode {
    /// Forward each line as a `stderr`-tagged message. Default.
    #[default]
    Forward,
    /// Read and drop everything the child writes to stderr.
    Discard,
}

/// How the stdin pump reacts to a frame that does not decode as a message.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedFramePolicy {
    /// Log the frame and keep reading. Default.
    #[default]
    Skip,
    /// Log the frame and tear the connection down.
    Close,
}
