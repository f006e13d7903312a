//! Global configuration parsing and validation.
//!
//! Built once at startup from defaults, an optional TOML file and CLI
//! overrides, then shared read-only with every connection.

use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::message::{is_valid_timestamp_format, DEFAULT_TIMESTAMP_FORMAT};
use crate::mode::{MalformedFramePolicy, StderrMode};
use crate::process::codec::MAX_LINE_BYTES;
use crate::process::supervisor::CommandSpec;
use crate::{AppError, Result};

fn default_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_port() -> u16 {
    8080
}

fn default_command() -> String {
    "ls".into()
}

fn default_idle_timeout_seconds() -> u64 {
    600
}

fn default_max_line_bytes() -> usize {
    MAX_LINE_BYTES
}

fn default_timestamp_format() -> String {
    DEFAULT_TIMESTAMP_FORMAT.into()
}

/// Per-connection bridge behavior.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct BridgeConfig {
    /// Seconds without an inbound frame before the connection is torn down.
    #[serde(default = "default_idle_timeout_seconds")]
    pub idle_timeout_seconds: u64,
    /// Longest output line forwarded before truncation.
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
    /// Whether the child's stderr reaches the client.
    #[serde(default)]
    pub stderr: StderrMode,
    /// Reaction to inbound frames that are not messages.
    #[serde(default)]
    pub malformed_frames: MalformedFramePolicy,
    /// strftime layout of the outbound line prefix.
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            idle_timeout_seconds: default_idle_timeout_seconds(),
            max_line_bytes: default_max_line_bytes(),
            stderr: StderrMode::default(),
            malformed_frames: MalformedFramePolicy::default(),
            timestamp_format: default_timestamp_format(),
        }
    }
}

/// Global configuration parsed from `sockd.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Listen address.
    #[serde(default = "default_address")]
    pub address: IpAddr,
    /// Listen port; `0` asks the OS for a free one.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Program spawned for every connection.
    #[serde(default = "default_command")]
    pub command: String,
    /// Arguments passed to `command`.
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory of the spawned program.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// Bridge behavior.
    #[serde(default)]
    pub bridge: BridgeConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            command: default_command(),
            args: Vec::new(),
            working_dir: None,
            bridge: BridgeConfig::default(),
        }
    }
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Socket address the server binds.
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }

    /// Command spawned for each connection.
    #[must_use]
    pub fn command_spec(&self) -> CommandSpec {
        CommandSpec {
            program: self.command.clone(),
            args: self.args.clone(),
            working_dir: self.working_dir.clone(),
        }
    }

    /// Idle timeout as a [`Duration`].
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.bridge.idle_timeout_seconds)
    }

    /// Check invariants; call again after applying CLI overrides.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` describing the first violated rule.
    pub fn validate(&self) -> Result<()> {
        if self.command.trim().is_empty() {
            return Err(AppError::Config("command must not be empty".into()));
        }

        if self.bridge.idle_timeout_seconds == 0 {
            return Err(AppError::Config(
                "idle_timeout_seconds must be greater than zero".into(),
            ));
        }

        if self.bridge.max_line_bytes == 0 {
            return Err(AppError::Config(
                "max_line_bytes must be greater than zero".into(),
            ));
        }

        if !is_valid_timestamp_format(&self.bridge.timestamp_format) {
            return Err(AppError::Config(format!(
                "timestamp_format is not a valid strftime layout: {}",
                self.bridge.timestamp_format
            )));
        }

        if let Some(dir) = &self.working_dir {
            if !dir.is_dir() {
                return Err(AppError::Config(format!(
                    "working_dir is not a directory: {}",
                    dir.display()
                )));
            }
        }

        Ok(())
    }
}
