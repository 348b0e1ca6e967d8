//! Abstract interfaces for the bitinfo ecosystem
//!
//! Traits are pure interfaces - no concrete I/O.

pub mod backend;
pub mod element;

pub use backend::{ChunkProcessor, StorageBackend};
pub use element::{BitFloat, Element};
