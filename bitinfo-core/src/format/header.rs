//! Core BITC header format definitions
//!
//! This module contains the fixed file header and the enums stored in it.
//!
//! ```text
//! offset  size  field
//!      0     4  magic "BITC"
//!      4     1  version
//!      5     1  flags
//!      6     2  padding
//!      8     4  variable count
//!     12     4  reserved
//!     16     8  metadata offset
//!     24     8  metadata size
//!     32     8  chunk index offset
//!     40     8  chunk index entry count
//!     48     8  data offset
//!     56     8  data size
//! ```

use crate::error::{BitinfoError, Result};

/// Fixed 64-byte header for .bitc files
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BitcHeader {
    /// Magic bytes: "BITC"
    pub magic: [u8; 4],
    /// Format version
    pub version: u8,
    /// Container flags (see `constants::flags`)
    pub flags: u8,
    /// Number of variables, coordinates included
    pub variable_count: u32,
    /// Offset to the JSON metadata region from file start
    pub metadata_offset: u64,
    /// Size of the JSON metadata region in bytes
    pub metadata_size: u64,
    /// Offset to the chunk index table
    pub index_offset: u64,
    /// Number of entries in the chunk index table
    pub index_count: u64,
    /// Offset to the chunk payload region
    pub data_offset: u64,
    /// Size of the chunk payload region in bytes
    pub data_size: u64,
}

impl BitcHeader {
    /// Magic bytes for .bitc files
    pub const MAGIC: [u8; 4] = *b"BITC";

    /// Current format version
    pub const VERSION: u8 = 1;

    /// Size of the serialized header in bytes
    pub const SIZE: usize = 64;

    /// Create a new header with default values
    pub const fn new() -> Self {
        Self {
            magic: Self::MAGIC,
            version: Self::VERSION,
            flags: 0,
            variable_count: 0,
            metadata_offset: 0,
            metadata_size: 0,
            index_offset: 0,
            index_count: 0,
            data_offset: 0,
            data_size: 0,
        }
    }

    /// Validate the header magic and version
    pub fn is_valid(&self) -> bool {
        self.magic == Self::MAGIC && self.version <= Self::VERSION
    }

    /// Check a header flag
    pub const fn has_flag(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }

    /// Metadata region as (offset, size)
    pub fn metadata_region(&self) -> Option<(u64, u64)> {
        if self.metadata_size == 0 {
            None
        } else {
            Some((self.metadata_offset, self.metadata_size))
        }
    }

    /// Set metadata region offset and size
    pub fn set_metadata_region(&mut self, offset: u64, size: u64) {
        self.metadata_offset = offset;
        self.metadata_size = size;
    }

    /// Parse header from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(BitinfoError::InsufficientBuffer);
        }

        if bytes[0..4] != Self::MAGIC {
            return Err(BitinfoError::InvalidHeader);
        }

        let version = bytes[4];
        if version > Self::VERSION {
            return Err(BitinfoError::UnsupportedFormat);
        }

        let header = Self {
            magic: Self::MAGIC,
            version,
            flags: bytes[5],
            variable_count: read_u32(bytes, 8),
            metadata_offset: read_u64(bytes, 16),
            metadata_size: read_u64(bytes, 24),
            index_offset: read_u64(bytes, 32),
            index_count: read_u64(bytes, 40),
            data_offset: read_u64(bytes, 48),
            data_size: read_u64(bytes, 56),
        };

        if header.variable_count as usize > crate::format::constants::MAX_VARIABLE_COUNT {
            return Err(BitinfoError::InvalidHeader);
        }
        if header.index_count as usize > crate::format::constants::MAX_CHUNK_COUNT {
            return Err(BitinfoError::InvalidHeader);
        }

        Ok(header)
    }

    /// Convert header to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes[5] = self.flags;
        // bytes 6..8 and 12..16 stay zero
        bytes[8..12].copy_from_slice(&self.variable_count.to_le_bytes());
        bytes[16..24].copy_from_slice(&self.metadata_offset.to_le_bytes());
        bytes[24..32].copy_from_slice(&self.metadata_size.to_le_bytes());
        bytes[32..40].copy_from_slice(&self.index_offset.to_le_bytes());
        bytes[40..48].copy_from_slice(&self.index_count.to_le_bytes());
        bytes[48..56].copy_from_slice(&self.data_offset.to_le_bytes());
        bytes[56..64].copy_from_slice(&self.data_size.to_le_bytes());
        bytes
    }

    /// Check that every region lies inside a file of `file_len` bytes
    pub fn validate_regions(&self, file_len: u64) -> Result<()> {
        let index_size = self
            .index_count
            .checked_mul(crate::format::ChunkIndexEntry::SIZE as u64)
            .ok_or(BitinfoError::ArraySizeOverflow)?;
        for (offset, size) in [
            (self.metadata_offset, self.metadata_size),
            (self.index_offset, index_size),
            (self.data_offset, self.data_size),
        ] {
            let end = offset
                .checked_add(size)
                .ok_or(BitinfoError::ArraySizeOverflow)?;
            if end > file_len {
                return Err(BitinfoError::CorruptedData);
            }
        }
        Ok(())
    }
}

impl Default for BitcHeader {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

pub(crate) fn read_u64(bytes: &[u8], at: usize) -> u64 {
    u64::from_le_bytes([
        bytes[at],
        bytes[at + 1],
        bytes[at + 2],
        bytes[at + 3],
        bytes[at + 4],
        bytes[at + 5],
        bytes[at + 6],
        bytes[at + 7],
    ])
}

/// Data types supported in .bitc files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[repr(u8)]
pub enum DataType {
    F32 = 0,
    F64 = 1,
    I32 = 2,
    I64 = 3,
    U32 = 4,
    U64 = 5,
}

impl DataType {
    /// Get the size in bytes for this data type
    pub const fn size_bytes(&self) -> usize {
        match self {
            DataType::F32 | DataType::I32 | DataType::U32 => 4,
            DataType::F64 | DataType::I64 | DataType::U64 => 8,
        }
    }

    /// Number of bits per element
    pub const fn nbits(&self) -> usize {
        self.size_bytes() * 8
    }

    /// Whether bitinformation can be computed for this type
    pub const fn is_float(&self) -> bool {
        matches!(self, DataType::F32 | DataType::F64)
    }

    /// Name of the bit dimension for this type, e.g. `bitfloat32`
    pub const fn bit_dim(&self) -> &'static str {
        match self {
            DataType::F32 => "bitfloat32",
            DataType::F64 => "bitfloat64",
            DataType::I32 => "bitint32",
            DataType::I64 => "bitint64",
            DataType::U32 => "bituint32",
            DataType::U64 => "bituint64",
        }
    }
}

impl core::fmt::Display for DataType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DataType::F32 => write!(f, "float32"),
            DataType::F64 => write!(f, "float64"),
            DataType::I32 => write!(f, "int32"),
            DataType::I64 => write!(f, "int64"),
            DataType::U32 => write!(f, "uint32"),
            DataType::U64 => write!(f, "uint64"),
        }
    }
}

/// Compression applied to chunk payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[repr(u8)]
pub enum Compression {
    /// Stored as raw little-endian bytes
    None = 0,
    /// zlib (deflate) stream
    #[default]
    Zlib = 1,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_bytes_roundtrip() {
        let mut header = BitcHeader::new();
        header.flags = crate::format::constants::flags::COMPRESSED;
        header.variable_count = 3;
        header.set_metadata_region(64, 200);
        header.index_offset = 264;
        header.index_count = 4;
        header.data_offset = 392;
        header.data_size = 1000;

        let bytes = header.to_bytes();
        assert_eq!(&bytes[0..4], b"BITC");
        assert_eq!(BitcHeader::from_bytes(&bytes), Ok(header));
        assert!(header.has_flag(crate::format::constants::flags::COMPRESSED));
        assert_eq!(header.validate_regions(1392), Ok(()));
        assert_eq!(
            header.validate_regions(1391),
            Err(BitinfoError::CorruptedData)
        );
    }

    #[test]
    fn test_header_rejects_bad_input() {
        let bytes = BitcHeader::new().to_bytes();
        assert_eq!(
            BitcHeader::from_bytes(&bytes[..10]),
            Err(BitinfoError::InsufficientBuffer)
        );

        let mut bad_magic = bytes;
        bad_magic[0] = b'X';
        assert_eq!(
            BitcHeader::from_bytes(&bad_magic),
            Err(BitinfoError::InvalidHeader)
        );

        let mut future = bytes;
        future[4] = BitcHeader::VERSION + 1;
        assert_eq!(
            BitcHeader::from_bytes(&future),
            Err(BitinfoError::UnsupportedFormat)
        );
    }

    #[test]
    fn test_data_type_properties() {
        assert_eq!(DataType::F32.nbits(), 32);
        assert!(DataType::F64.is_float());
        assert!(!DataType::I64.is_float());
        assert_eq!(DataType::F32.bit_dim(), "bitfloat32");
    }
}
