//! Child process ownership and output framing.
//!
//! - `supervisor`: [`ProcessHandle`](supervisor::ProcessHandle) lifecycle
//!   (spawn, start, wait, close) over a child with all three stdio pipes.
//! - `codec`: bounded, lossy line decoder for the child's output pipes.

pub mod codec;
pub mod supervisor;
