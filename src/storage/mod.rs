//! Storage layer implementations
//!
//! The typed in-memory store, the snapshot codec, and the background
//! snapshot service.

pub mod memory;
pub mod persistence;
pub mod snapshot;

pub use memory::{MemoryStore, StoreSnapshot};
pub use persistence::SnapshotService;
