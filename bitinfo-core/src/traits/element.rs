//! Element type constraints for BITC arrays
//!
//! `Element` covers every type a container variable can hold.
//! `BitFloat` narrows that to the IEEE floats whose bit patterns can be
//! analysed and rounded.

use crate::format::DataType;

/// Trait for types that can be stored as array elements
///
/// All element types are plain old data so that chunk payloads can be
/// cast to and from bytes without copies.
pub trait Element: Copy + PartialEq + bytemuck::Pod + Send + Sync + 'static {
    /// Get the BITC DataType representation for this element type
    fn data_type() -> DataType;

    /// Get the size in bytes of this element type
    fn size_bytes() -> usize {
        core::mem::size_of::<Self>()
    }

    /// Convert to f64 for generic operations
    fn to_f64(self) -> f64;
}

macro_rules! impl_element {
    ($ty:ty, $variant:ident) => {
        impl Element for $ty {
            fn data_type() -> DataType {
                DataType::$variant
            }

            fn to_f64(self) -> f64 {
                self as f64
            }
        }
    };
}

impl_element!(f32, F32);
impl_element!(f64, F64);
impl_element!(i32, I32);
impl_element!(i64, I64);
impl_element!(u32, U32);
impl_element!(u64, U64);

/// IEEE 754 binary floating-point element
///
/// Bit positions are counted from the most significant bit: position 0 is
/// the sign bit, followed by `EXPONENT_BITS` exponent bits and
/// `MANTISSA_BITS` mantissa bits.
pub trait BitFloat: Element {
    /// Total number of bits
    const NBITS: usize;
    /// Number of exponent bits
    const EXPONENT_BITS: usize;
    /// Number of explicitly stored mantissa bits
    const MANTISSA_BITS: usize;

    /// Raw bit pattern widened to u64
    fn to_bits_u64(self) -> u64;

    /// Reinterpret the low `NBITS` of `bits` as a float
    fn from_bits_u64(bits: u64) -> Self;

    /// NaN check without going through f64
    fn is_nan(self) -> bool;

    /// Number of sign and exponent bits
    fn non_mantissa_bits() -> usize {
        1 + Self::EXPONENT_BITS
    }
}

impl BitFloat for f32 {
    const NBITS: usize = 32;
    const EXPONENT_BITS: usize = 8;
    const MANTISSA_BITS: usize = 23;

    fn to_bits_u64(self) -> u64 {
        self.to_bits() as u64
    }

    fn from_bits_u64(bits: u64) -> Self {
        f32::from_bits(bits as u32)
    }

    fn is_nan(self) -> bool {
        f32::is_nan(self)
    }
}

impl BitFloat for f64 {
    const NBITS: usize = 64;
    const EXPONENT_BITS: usize = 11;
    const MANTISSA_BITS: usize = 52;

    fn to_bits_u64(self) -> u64 {
        self.to_bits()
    }

    fn from_bits_u64(bits: u64) -> Self {
        f64::from_bits(bits)
    }

    fn is_nan(self) -> bool {
        f64::is_nan(self)
    }
}
