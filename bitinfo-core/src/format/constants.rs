//! Format constants for the BITC container

/// Default alignment boundary for all data structures
pub const ALIGNMENT_BOUNDARY: usize = 8;

/// Maximum variable count to prevent memory exhaustion
pub const MAX_VARIABLE_COUNT: usize = 65_536;

/// Maximum chunk count to prevent memory exhaustion
pub const MAX_CHUNK_COUNT: usize = 16_000_000;

/// Maximum decoded size of one variable in bytes
pub const MAX_VARIABLE_BYTES: usize = 1 << 40;

/// Largest supported zlib compression level
pub const MAX_COMPLEVEL: u8 = 9;

/// Header flags
pub mod flags {
    /// At least one variable is zlib compressed
    pub const COMPRESSED: u8 = 1 << 0;
    /// At least one variable is byte shuffled
    pub const SHUFFLED: u8 = 1 << 1;
}

/// Per-chunk filter mask bits
pub mod filters {
    /// Bytes were transposed by element size before compression
    pub const SHUFFLE: u32 = 1 << 0;
    /// Payload is a zlib stream
    pub const ZLIB: u32 = 1 << 1;
}

/// Number of sign and exponent bits for a float of `nbits` bits
///
/// Returns `None` for widths that are not IEEE binary16/32/64.
pub const fn non_mantissa_bits(nbits: usize) -> Option<usize> {
    match nbits {
        16 => Some(6),
        32 => Some(9),
        64 => Some(12),
        _ => None,
    }
}
