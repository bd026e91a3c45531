//! Parallax transport layer
//!
//! TCP frame I/O plus the ingress queue that hands received messages from
//! the per-connection network task to the simulation thread. The network
//! task only reads frames, minimally validates them, and pushes; applying
//! them happens at one well-defined point in the frame loop.

pub mod queue;
pub mod tcp;

pub use queue::*;
pub use tcp::*;
