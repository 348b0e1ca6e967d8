//! Layout helpers for the BITC container

use crate::BitinfoError;

/// Align an offset to a specific power-of-two boundary
pub const fn align_to_boundary(offset: usize, boundary: usize) -> usize {
    (offset + boundary - 1) & !(boundary - 1)
}

/// Align an offset to 8-byte boundary (the BITC payload alignment)
pub const fn align_to_8(offset: usize) -> usize {
    align_to_boundary(offset, crate::format::constants::ALIGNMENT_BOUNDARY)
}

/// Calculate padding needed to reach alignment boundary
pub const fn calculate_padding(offset: usize, boundary: usize) -> usize {
    align_to_boundary(offset, boundary) - offset
}

/// Validate that an offset is properly aligned
pub const fn validate_offset_alignment(offset: usize, boundary: usize) -> Result<(), BitinfoError> {
    if offset % boundary != 0 {
        return Err(BitinfoError::ArrayAlignment);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_to_boundary() {
        assert_eq!(align_to_boundary(0, 8), 0);
        assert_eq!(align_to_boundary(1, 8), 8);
        assert_eq!(align_to_boundary(8, 8), 8);
        assert_eq!(align_to_boundary(9, 8), 16);
        assert_eq!(align_to_boundary(5, 4), 8);
    }

    #[test]
    fn test_padding() {
        assert_eq!(align_to_8(15), 16);
        assert_eq!(calculate_padding(0, 8), 0);
        assert_eq!(calculate_padding(1, 8), 7);
        assert_eq!(calculate_padding(9, 8), 7);
        assert_eq!(validate_offset_alignment(16, 8), Ok(()));
        assert_eq!(
            validate_offset_alignment(12, 8),
            Err(BitinfoError::ArrayAlignment)
        );
    }
}
