//! Parallax state replication engine
//!
//! Once per tick the host encodes every registered syncable, in
//! registration order, into one snapshot buffer; every client applies the
//! buffer in the same order before rendering. Snapshots are full, not
//! diffed: a newly joined or reconnected client resynchronizes in a single
//! tick.

pub mod buffer;
pub mod registry;
pub mod syncable;

pub use buffer::*;
pub use registry::*;
pub use syncable::*;
