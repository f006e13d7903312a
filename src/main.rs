#![forbid(unsafe_code)]

//! `sockd`: serve a process's stdin/stdout to the browser over WebSocket.
//!
//! Resolves configuration (defaults, optional TOML file, CLI flags), then
//! runs the HTTP server until SIGINT/SIGTERM.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use sockd::config::GlobalConfig;
use sockd::mode::{MalformedFramePolicy, StderrMode};
use sockd::server::http;
use sockd::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "sockd", about = "Expose a process's stdio over WebSocket", version, long_about = None)]
struct Cli {
    /// Path to an optional TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// sockd service ip address.
    #[arg(long)]
    address: Option<IpAddr>,

    /// sockd service port.
    #[arg(long)]
    port: Option<u16>,

    /// Path to script or executable for sockd service to run.
    #[arg(long)]
    script: Option<String>,

    /// Seconds without client input before a connection is closed.
    #[arg(long)]
    idle_timeout: Option<u64>,

    /// Whether the process's stderr is forwarded or discarded.
    #[arg(long, value_enum)]
    stderr: Option<StderrMode>,

    /// Reaction to inbound frames that are not valid messages.
    #[arg(long, value_enum)]
    malformed_frames: Option<MalformedFramePolicy>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Arguments passed to the script.
    #[arg(last = true)]
    args: Vec<String>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let config = Arc::new(resolve_config(args)?);
    info!(bind = %config.bind_addr(), command = config.command, "configuration loaded");

    let ct = CancellationToken::new();
    let server_ct = ct.clone();
    let server_config = Arc::clone(&config);
    let mut server = tokio::spawn(async move { http::serve(server_config, server_ct).await });

    let joined = tokio::select! {
        () = shutdown_signal() => {
            info!("shutdown signal received");
            ct.cancel();
            server.await
        }
        joined = &mut server => joined,
    };

    match joined {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            error!(%err, "server failed");
            return Err(err);
        }
        Err(err) => return Err(AppError::Io(format!("server task failed: {err}"))),
    }

    info!("sockd shut down");
    Ok(())
}

fn resolve_config(args: Cli) -> Result<GlobalConfig> {
    let mut config = match &args.config {
        Some(path) => GlobalConfig::load_from_path(path)?,
        None => GlobalConfig::default(),
    };

    if let Some(address) = args.address {
        config.address = address;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(script) = args.script {
        config.command = script;
    }
    if !args.args.is_empty() {
        config.args = args.args;
    }
    if let Some(seconds) = args.idle_timeout {
        config.bridge.idle_timeout_seconds = seconds;
    }
    if let Some(mode) = args.stderr {
        config.bridge.stderr = mode;
    }
    if let Some(policy) = args.malformed_frames {
        config.bridge.malformed_frames = policy;
    }

    config.validate()?;
    Ok(config)
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
