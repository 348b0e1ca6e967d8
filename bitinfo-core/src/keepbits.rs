//! Keepbits from a per-bit information profile
//!
//! The cumulative information distribution over bit positions tells how
//! many leading bits carry a requested share of the real information.
//! Sign and exponent bits are always kept, so the result counts mantissa
//! bits only.

use crate::bitcount::MAX_BITS;
use crate::error::{BitinfoError, Result};
use crate::format::constants::non_mantissa_bits;

/// Default cdf threshold of the gradient filter
pub const DEFAULT_GRADIENT_THRESHOLD: f64 = 0.99;

/// Default gradient tolerance of the gradient filter
pub const DEFAULT_GRADIENT_TOLERANCE: f64 = 0.01;

/// Validate an information level
pub fn validate_inflevel(inflevel: f64) -> Result<()> {
    if (0.0..=1.0).contains(&inflevel) {
        Ok(())
    } else {
        Err(BitinfoError::InvalidInflevel)
    }
}

/// Cumulative information normalised by the total
///
/// NaN entries count as zero. Returns the total information. When the
/// total is zero every cdf entry is zero.
pub fn information_cdf(bits: &[f64], out: &mut [f64]) -> Result<f64> {
    if out.len() < bits.len() {
        return Err(BitinfoError::InsufficientBuffer);
    }
    Ok(fill_cdf(bits, &mut out[..bits.len()]))
}

/// Normalized running sum of `bits` into `out`, returns the total
///
/// Writes `min(bits.len(), out.len())` values.
pub(crate) fn fill_cdf(bits: &[f64], out: &mut [f64]) -> f64 {
    let mut running = 0.0;
    for (slot, &b) in out.iter_mut().zip(bits) {
        if !b.is_nan() {
            running += b;
        }
        *slot = running;
    }
    if running > 0.0 {
        for slot in out.iter_mut() {
            *slot /= running;
        }
    } else {
        out.fill(0.0);
    }
    running
}

/// Mantissa bits needed to retain `inflevel` of the information in `bits`
///
/// `bits` holds one information value per bit position of an `nbits` wide
/// float. A level of exactly 1.0 keeps every mantissa bit. Results that
/// would fall inside the sign or exponent bits are clamped to zero.
pub fn keepbits_for_level(bits: &[f64], nbits: usize, inflevel: f64) -> Result<u32> {
    validate_inflevel(inflevel)?;
    let nmbits = non_mantissa_bits(nbits).ok_or(BitinfoError::UnsupportedDataType)?;
    if bits.len() != nbits {
        return Err(BitinfoError::LengthMismatch);
    }
    let mantissa = (nbits - nmbits) as u32;
    if inflevel == 1.0 {
        return Ok(mantissa);
    }

    let mut cdf = [0.0f64; MAX_BITS];
    information_cdf(bits, &mut cdf)?;

    // position of the first bit whose cdf exceeds the level, 0 if none does
    let first = cdf[..nbits]
        .iter()
        .position(|&c| c > inflevel)
        .unwrap_or(0);
    let keep = (first + 1) as i64 - nmbits as i64;
    Ok(keep.clamp(0, mantissa as i64) as u32)
}

/// Information level retained when keeping `keepbits` mantissa bits
///
/// The inverse view of [`keepbits_for_level`], used to label plots.
pub fn inflevel_for_keepbits(bits: &[f64], nbits: usize, keepbits: u32) -> Result<f64> {
    let nmbits = non_mantissa_bits(nbits).ok_or(BitinfoError::UnsupportedDataType)?;
    if bits.len() != nbits {
        return Err(BitinfoError::LengthMismatch);
    }
    if keepbits as usize > nbits - nmbits {
        return Err(BitinfoError::InvalidKeepbits);
    }
    let mut cdf = [0.0f64; MAX_BITS];
    information_cdf(bits, &mut cdf)?;
    let last_kept = nmbits + keepbits as usize - 1;
    Ok(cdf[last_kept])
}

/// Zero out information that looks artificial
///
/// Scans the mantissa bits for the first position where the cdf already
/// exceeds `threshold` while the cdf gains less than `tolerance` towards the
/// next bit. Information in all bits after that position is set to zero.
/// Returns the number of zeroed bits.
pub fn remove_artificial_information(
    bits: &mut [f64],
    nbits: usize,
    threshold: f64,
    tolerance: f64,
) -> Result<usize> {
    validate_inflevel(threshold)?;
    let nmbits = non_mantissa_bits(nbits).ok_or(BitinfoError::UnsupportedDataType)?;
    if bits.len() != nbits {
        return Err(BitinfoError::LengthMismatch);
    }

    let mut cdf = [0.0f64; MAX_BITS];
    let total = information_cdf(bits, &mut cdf)?;
    if total <= 0.0 {
        return Ok(0);
    }

    for i in nmbits..nbits - 1 {
        let gradient = cdf[i + 1] - cdf[i];
        if cdf[i] > threshold && gradient < tolerance {
            bits[i + 1..].fill(0.0);
            return Ok(nbits - i - 1);
        }
    }
    Ok(0)
}
