#![no_std]

//! bitinfo core - bitwise information definitions
//!
//! This crate provides the pure building blocks for analysing the real
//! information content of floating-point data: joint bit state counting,
//! keepbits from an information profile, mantissa rounding, and the
//! binary layout of the BITC container. It performs no I/O and needs no
//! allocator unless the `alloc` feature is enabled.

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "alloc")]
use alloc::vec::Vec;

pub mod bitcount;
pub mod bitround;
pub mod error;
pub mod format;
pub mod keepbits;
pub mod traits;
pub mod validation;

pub use bitcount::BitPairCounter;
pub use bitround::{bitround, bitround_slice, BitRounder};
pub use error::*;
pub use format::*;
pub use keepbits::{
    information_cdf, inflevel_for_keepbits, keepbits_for_level, remove_artificial_information,
};
pub use traits::*;
pub use validation::*;

/// Cumulative information profile as an owned vector
#[cfg(feature = "alloc")]
pub fn information_cdf_vec(bits: &[f64]) -> Vec<f64> {
    let mut out = alloc::vec![0.0; bits.len()];
    keepbits::fill_cdf(bits, &mut out);
    out
}
