//! Chunk index table entries and chunk grid arithmetic
//!
//! Every chunk payload is described by a fixed 32-byte entry in the index
//! table. Offsets are relative to the start of the data region.

use crate::error::{BitinfoError, Result};
use crate::format::header::{read_u32, read_u64};

/// Fixed-size chunk index entry (32 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkIndexEntry {
    /// Offset of the payload from the data region start
    pub offset: u64,
    /// Size of the stored (filtered) payload in bytes
    pub stored_size: u64,
    /// Size of the decoded chunk in bytes
    pub raw_size: u64,
    /// Filters applied to the payload (see `constants::filters`)
    pub filter_mask: u32,
    /// Reserved for future use
    pub reserved: u32,
}

impl ChunkIndexEntry {
    /// Size of a serialized entry in bytes
    pub const SIZE: usize = 32;

    /// Create an entry
    pub const fn new(offset: u64, stored_size: u64, raw_size: u64, filter_mask: u32) -> Self {
        Self {
            offset,
            stored_size,
            raw_size,
            filter_mask,
            reserved: 0,
        }
    }

    /// Parse from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(BitinfoError::InsufficientBuffer);
        }

        let entry = Self {
            offset: read_u64(bytes, 0),
            stored_size: read_u64(bytes, 8),
            raw_size: read_u64(bytes, 16),
            filter_mask: read_u32(bytes, 24),
            reserved: read_u32(bytes, 28),
        };

        if entry.offset.checked_add(entry.stored_size).is_none() {
            return Err(BitinfoError::InvalidChunk);
        }

        Ok(entry)
    }

    /// Convert to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..8].copy_from_slice(&self.offset.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.stored_size.to_le_bytes());
        bytes[16..24].copy_from_slice(&self.raw_size.to_le_bytes());
        bytes[24..28].copy_from_slice(&self.filter_mask.to_le_bytes());
        bytes[28..32].copy_from_slice(&self.reserved.to_le_bytes());
        bytes
    }

    /// Whether a filter bit is set
    pub const fn has_filter(&self, filter: u32) -> bool {
        self.filter_mask & filter != 0
    }

    /// Byte range of the payload inside a data region of `data_size` bytes
    pub fn payload_range(&self, data_size: u64) -> Result<core::ops::Range<usize>> {
        let end = self
            .offset
            .checked_add(self.stored_size)
            .ok_or(BitinfoError::InvalidChunk)?;
        if end > data_size {
            return Err(BitinfoError::InvalidChunk);
        }
        Ok(self.offset as usize..end as usize)
    }
}

/// Number of chunks along each axis: `ceil(shape / chunks)`
///
/// Writes into `out` and returns the total chunk count. Zero-length axes
/// produce zero chunks.
pub fn chunk_grid(shape: &[usize], chunks: &[usize], out: &mut [usize]) -> Result<usize> {
    if shape.len() != chunks.len() || out.len() < shape.len() {
        return Err(BitinfoError::LengthMismatch);
    }
    let mut total: usize = 1;
    for (axis, (&len, &chunk)) in shape.iter().zip(chunks).enumerate() {
        if chunk == 0 {
            return Err(BitinfoError::InvalidChunk);
        }
        out[axis] = len.div_ceil(chunk);
        total = total
            .checked_mul(out[axis])
            .ok_or(BitinfoError::ArraySizeOverflow)?;
    }
    Ok(total)
}
