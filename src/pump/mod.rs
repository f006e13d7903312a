//! Pumps moving data between the child's pipes and the WebSocket.
//!
//! - `output`: child stdout/stderr lines → timestamped messages.
//! - `writer`: the single task writing frames to the socket.
//! - `input`: socket frames → child stdin.
//! - `closure`: tells expected peer closure apart from real failures.

pub mod closure;
pub mod input;
pub mod output;
pub mod writer;
