//! HTTP server and per-connection orchestration.
//!
//! - `http`: axum router, origin check, WebSocket upgrade, listener loop.
//! - `connection`: one socket bound to one child process, start to teardown.
//! - `page`: the static control page.

pub mod connection;
pub mod http;
pub mod page;
