//! Binary format definitions for the BITC container
//!
//! This module contains pure data structure definitions for the BITC wire format.
//! No I/O operations - only layout, parsing and serialization to byte arrays.

pub mod chunk;
pub mod constants;
pub mod header;

pub use chunk::{chunk_grid, ChunkIndexEntry};
pub use header::{BitcHeader, Compression, DataType};
