//! Parallax wire format
//!
//! Turns the raw byte stream into typed, length-delimited messages.
//! Each frame is `[type: 4 bytes][length: 4 bytes][payload: length bytes]`,
//! all integers little-endian, fixed by [`parallax_core::PROTOCOL_VERSION`].

pub mod frame;
pub mod payload;

pub use frame::*;
pub use payload::*;
