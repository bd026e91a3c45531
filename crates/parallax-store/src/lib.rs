//! Parallax keyed data store
//!
//! Holds externally pushed binary datasets addressed by
//! `(identifier, StoreKey)`, independent of the per-tick snapshot: these
//! payloads can be large and arrive once, not every tick. The store is the
//! one structure shared between the network tasks and the simulation
//! thread.

pub mod store;

pub use store::*;
