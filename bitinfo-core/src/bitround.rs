//! Mantissa bit rounding
//!
//! Round-to-nearest with ties to even on the binary mantissa, the same
//! arithmetic as the common BitRound codec. Rounded values have trailing
//! zero mantissa bits and therefore compress well.

use crate::error::{BitinfoError, Result};
use crate::traits::BitFloat;
use core::marker::PhantomData;

/// Precomputed rounding masks for one keepbits value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitRounder<T: BitFloat> {
    keepbits: u32,
    shift: u32,
    mask: u64,
    half_minus_one: u64,
    _phantom: PhantomData<T>,
}

impl<T: BitFloat> BitRounder<T> {
    /// Create a rounder keeping `keepbits` mantissa bits
    ///
    /// `keepbits` larger than the mantissa width is an error.
    pub fn new(keepbits: u32) -> Result<Self> {
        let mantissa = T::MANTISSA_BITS as u32;
        if keepbits > mantissa {
            return Err(BitinfoError::InvalidKeepbits);
        }
        let shift = mantissa - keepbits;
        let width_mask = if T::NBITS == 64 {
            u64::MAX
        } else {
            (1u64 << T::NBITS) - 1
        };
        let (mask, half_minus_one) = if shift == 0 {
            (width_mask, 0)
        } else {
            ((width_mask << shift) & width_mask, (1u64 << (shift - 1)) - 1)
        };
        Ok(Self {
            keepbits,
            shift,
            mask,
            half_minus_one,
            _phantom: PhantomData,
        })
    }

    /// Keepbits this rounder was built for
    pub fn keepbits(&self) -> u32 {
        self.keepbits
    }

    /// Round one value; NaN is returned unchanged
    #[inline]
    pub fn round(&self, x: T) -> T {
        if self.shift == 0 || x.is_nan() {
            return x;
        }
        let mut bits = x.to_bits_u64();
        bits += ((bits >> self.shift) & 1) + self.half_minus_one;
        T::from_bits_u64(bits & self.mask)
    }

    /// Round a slice in place
    pub fn round_slice(&self, values: &mut [T]) {
        if self.shift == 0 {
            return;
        }
        for value in values.iter_mut() {
            *value = self.round(*value);
        }
    }
}

/// Round a single value keeping `keepbits` mantissa bits
pub fn bitround<T: BitFloat>(x: T, keepbits: u32) -> Result<T> {
    Ok(BitRounder::<T>::new(keepbits)?.round(x))
}

/// Round a slice in place keeping `keepbits` mantissa bits
pub fn bitround_slice<T: BitFloat>(values: &mut [T], keepbits: u32) -> Result<()> {
    BitRounder::<T>::new(keepbits)?.round_slice(values);
    Ok(())
}
