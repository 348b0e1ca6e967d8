//! Error types for bitinfo core operations

/// Errors that can occur in core bitinformation and container operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitinfoError {
    /// Invalid container header
    InvalidHeader,
    /// Unsupported container version
    UnsupportedFormat,
    /// Index out of bounds
    IndexOutOfBounds,
    /// Invalid chunk index entry
    InvalidChunk,
    /// Data corruption detected
    CorruptedData,
    /// Insufficient buffer space
    InsufficientBuffer,
    /// Array is not aligned to its element size
    ArrayAlignment,
    /// Array size computation overflowed
    ArraySizeOverflow,
    /// Malformed range string or bounds
    InvalidRange,
    /// Keepbits larger than the number of mantissa bits
    InvalidKeepbits,
    /// Information level outside of [0, 1]
    InvalidInflevel,
    /// Confidence outside of (0, 1)
    InvalidConfidence,
    /// Data type cannot be analysed bitwise
    UnsupportedDataType,
    /// Slices of different length were paired
    LengthMismatch,
}

impl core::fmt::Display for BitinfoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            BitinfoError::InvalidHeader => "Invalid BITC header",
            BitinfoError::UnsupportedFormat => "Unsupported format version",
            BitinfoError::IndexOutOfBounds => "Index out of bounds",
            BitinfoError::InvalidChunk => "Invalid chunk index entry",
            BitinfoError::CorruptedData => "Data corruption detected",
            BitinfoError::InsufficientBuffer => "Insufficient buffer space",
            BitinfoError::ArrayAlignment => "Array not aligned to element size",
            BitinfoError::ArraySizeOverflow => "Array size overflow",
            BitinfoError::InvalidRange => "Invalid range",
            BitinfoError::InvalidKeepbits => "Keepbits exceed the number of mantissa bits",
            BitinfoError::InvalidInflevel => "Information level must be within [0, 1]",
            BitinfoError::InvalidConfidence => "Confidence must be within (0, 1)",
            BitinfoError::UnsupportedDataType => "Data type is not a floating-point type",
            BitinfoError::LengthMismatch => "Paired slices differ in length",
        };
        write!(f, "{msg}")
    }
}

/// Result type for bitinfo core operations
pub type Result<T> = core::result::Result<T, BitinfoError>;
