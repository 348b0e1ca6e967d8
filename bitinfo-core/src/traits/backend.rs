//! Storage backend and chunk processing traits for the BITC container
//!
//! This module defines the abstract interfaces for storage backends
//! and chunk processing. These are pure interfaces with no implementations.

use crate::format::ChunkIndexEntry;

/// Trait for backends that hold the bytes of a BITC file
///
/// This trait provides a minimal interface for accessing the underlying
/// byte data of a storage backend, regardless of how it's implemented
/// (memory-mapped files, in-memory buffers, etc.).
pub trait StorageBackend {
    /// Get a slice of the underlying data
    fn as_slice(&self) -> &[u8];

    /// Get the size of the data in bytes
    ///
    /// Default implementation uses the slice length.
    fn size(&self) -> usize {
        self.as_slice().len()
    }
}

/// Trait for consuming a variable chunk by chunk
///
/// Chunks are handed over in grid order, already decoded to raw
/// little-endian element bytes.
pub trait ChunkProcessor {
    /// The result this processor produces
    type Output;

    /// Error type for processing operations
    type Error;

    /// Process one decoded chunk
    fn process_chunk(
        &mut self,
        chunk_data: &[u8],
        entry: ChunkIndexEntry,
    ) -> Result<(), Self::Error>;

    /// Finalize processing and return results
    fn finalize(self) -> Result<Self::Output, Self::Error>;
}
