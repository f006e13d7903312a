#![forbid(unsafe_code)]

//! `sockd`: bridge a spawned process's stdin/stdout to a WebSocket.

pub mod config;
pub mod errors;
pub mod message;
pub mod mode;
pub mod process;
pub mod pump;
pub mod server;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
