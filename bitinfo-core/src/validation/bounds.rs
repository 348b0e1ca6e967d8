//! Array bounds and alignment validation
//!
//! Pure checks on byte lengths and shapes, used before a chunk payload
//! is converted to typed elements.

use crate::BitinfoError;

/// Validate array bounds for a given element type
///
/// Returns the element count for `byte_len` bytes of `T`.
pub const fn validate_array_bounds<T>(byte_len: usize) -> Result<usize, BitinfoError> {
    let element_size = core::mem::size_of::<T>();

    if byte_len % element_size != 0 {
        return Err(BitinfoError::ArrayAlignment);
    }

    let count = byte_len / element_size;

    // reject arrays whose byte size could overflow downstream arithmetic
    if count > usize::MAX / 8 {
        return Err(BitinfoError::ArraySizeOverflow);
    }

    Ok(count)
}

/// Product of a shape with overflow protection
pub fn checked_element_count(shape: &[usize]) -> Result<usize, BitinfoError> {
    shape.iter().try_fold(1usize, |acc, &len| {
        acc.checked_mul(len).ok_or(BitinfoError::ArraySizeOverflow)
    })
}
