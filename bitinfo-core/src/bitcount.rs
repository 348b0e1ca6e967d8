//! Joint bit state counting for adjacent element pairs
//!
//! For every bit position the counter records how often each of the four
//! joint states `00, 01, 10, 11` occurs between an element and its
//! successor. These counts are all the mutual information estimator needs.

use crate::error::{BitinfoError, Result};
use crate::traits::BitFloat;

/// Largest supported element width in bits
pub const MAX_BITS: usize = 64;

/// Joint state counts per bit position
///
/// Bit position 0 is the most significant bit (the sign bit for floats).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitPairCounter {
    counts: [[u64; 4]; MAX_BITS],
    nbits: usize,
    pairs: u64,
}

impl BitPairCounter {
    /// Create an empty counter for elements of `nbits` bits
    pub fn new(nbits: usize) -> Result<Self> {
        if nbits == 0 || nbits > MAX_BITS {
            return Err(BitinfoError::UnsupportedDataType);
        }
        Ok(Self {
            counts: [[0; 4]; MAX_BITS],
            nbits,
            pairs: 0,
        })
    }

    /// Create an empty counter sized for `T`
    pub fn for_type<T: BitFloat>() -> Self {
        Self {
            counts: [[0; 4]; MAX_BITS],
            nbits: T::NBITS,
            pairs: 0,
        }
    }

    /// Number of bit positions tracked
    pub fn nbits(&self) -> usize {
        self.nbits
    }

    /// Number of pairs counted so far
    pub fn pairs(&self) -> u64 {
        self.pairs
    }

    /// Count the joint bit states of one pair
    #[inline]
    pub fn count_pair<T: BitFloat>(&mut self, a: T, b: T) {
        let a = a.to_bits_u64();
        let b = b.to_bits_u64();
        let top = self.nbits - 1;
        for (i, counts) in self.counts[..self.nbits].iter_mut().enumerate() {
            let shift = top - i;
            let state = (((a >> shift) & 1) << 1) | ((b >> shift) & 1);
            counts[state as usize] += 1;
        }
        self.pairs += 1;
    }

    /// Count element-wise pairs `(a[k], b[k])`, skipping pairs where either
    /// element is masked
    pub fn count_slices<T, M>(&mut self, a: &[T], b: &[T], is_masked: M) -> Result<()>
    where
        T: BitFloat,
        M: Fn(T) -> bool,
    {
        if a.len() != b.len() {
            return Err(BitinfoError::LengthMismatch);
        }
        for (&x, &y) in a.iter().zip(b) {
            if is_masked(x) || is_masked(y) {
                continue;
            }
            self.count_pair(x, y);
        }
        Ok(())
    }

    /// Add the counts of another counter of the same width
    pub fn merge(&mut self, other: &Self) -> Result<()> {
        if self.nbits != other.nbits {
            return Err(BitinfoError::LengthMismatch);
        }
        for (mine, theirs) in self.counts[..self.nbits]
            .iter_mut()
            .zip(&other.counts[..other.nbits])
        {
            for (m, t) in mine.iter_mut().zip(theirs) {
                *m += *t;
            }
        }
        self.pairs += other.pairs;
        Ok(())
    }

    /// Raw counts `[n00, n01, n10, n11]` for bit position `i`
    pub fn counts(&self, i: usize) -> Result<[u64; 4]> {
        if i >= self.nbits {
            return Err(BitinfoError::IndexOutOfBounds);
        }
        Ok(self.counts[i])
    }

    /// Joint probabilities `[p00, p01, p10, p11]` for bit position `i`
    ///
    /// All zero when no pair has been counted.
    pub fn joint_probabilities(&self, i: usize) -> Result<[f64; 4]> {
        let counts = self.counts(i)?;
        if self.pairs == 0 {
            return Ok([0.0; 4]);
        }
        let n = self.pairs as f64;
        Ok([
            counts[0] as f64 / n,
            counts[1] as f64 / n,
            counts[2] as f64 / n,
            counts[3] as f64 / n,
        ])
    }
}
