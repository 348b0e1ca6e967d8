//! Parsing utilities for command line and metadata strings
//!
//! Pure parsing functions with no I/O dependencies.

use crate::BitinfoError;
use core::ops::Range;

/// Parse a range string in the format "start:end" or "start-end"
///
/// Used for index selections along a dimension. Returns a `Range<usize>`.
pub fn parse_range(range_str: &str) -> Result<Range<usize>, BitinfoError> {
    if range_str.is_empty() {
        return Err(BitinfoError::InvalidRange);
    }

    let separator = range_str
        .find(':')
        .or_else(|| range_str.find('-'))
        .ok_or(BitinfoError::InvalidRange)?;

    let start = parse_usize(&range_str[..separator])?;
    let end = parse_usize(&range_str[separator + 1..])?;

    if start > end {
        return Err(BitinfoError::InvalidRange);
    }

    Ok(start..end)
}

/// Parse a usize from a string with error handling
fn parse_usize(s: &str) -> Result<usize, BitinfoError> {
    if s.is_empty() {
        return Err(BitinfoError::InvalidRange);
    }

    let mut result: usize = 0;

    for byte in s.bytes() {
        if !byte.is_ascii_digit() {
            return Err(BitinfoError::InvalidRange);
        }

        let digit = (byte - b'0') as usize;

        if result > (usize::MAX - digit) / 10 {
            return Err(BitinfoError::ArraySizeOverflow);
        }

        result = result * 10 + digit;
    }

    Ok(result)
}

/// Validate a variable or dimension name
///
/// Names must be non-empty, at most 256 bytes and free of control
/// characters and path separators, since labels double as file stems.
pub fn validate_name(name: &str) -> Result<(), BitinfoError> {
    if name.is_empty() || name.len() > 256 {
        return Err(BitinfoError::InvalidRange);
    }

    if name
        .bytes()
        .any(|b| b < 32 || b == b'/' || b == b'\\' || b == 127)
    {
        return Err(BitinfoError::InvalidRange);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_range("0:10"), Ok(0..10));
        assert_eq!(parse_range("100:200"), Ok(100..200));
        assert_eq!(parse_range("5-15"), Ok(5..15));

        assert_eq!(parse_range(""), Err(BitinfoError::InvalidRange));
        assert_eq!(parse_range("10:5"), Err(BitinfoError::InvalidRange));
        assert_eq!(parse_range("abc:def"), Err(BitinfoError::InvalidRange));
        assert_eq!(parse_range("10"), Err(BitinfoError::InvalidRange));
        assert_eq!(parse_range("10:"), Err(BitinfoError::InvalidRange));
        assert_eq!(parse_range(":10"), Err(BitinfoError::InvalidRange));
    }

    #[test]
    fn test_parse_usize() {
        assert_eq!(parse_usize("0"), Ok(0));
        assert_eq!(parse_usize("999999"), Ok(999999));
        assert_eq!(parse_usize("12a"), Err(BitinfoError::InvalidRange));
        assert_eq!(parse_usize("-123"), Err(BitinfoError::InvalidRange));
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("air"), Ok(()));
        assert_eq!(validate_name("sea surface temperature"), Ok(()));
        assert_eq!(validate_name(""), Err(BitinfoError::InvalidRange));
        assert_eq!(validate_name("a/b"), Err(BitinfoError::InvalidRange));
        assert_eq!(validate_name("tab\there"), Err(BitinfoError::InvalidRange));
    }
}
