//! Validation utilities for the BITC container
//!
//! Pure functions on data layout, ranges and names. No I/O.

pub mod bounds;
pub mod format;
pub mod parsing;

pub use bounds::{checked_element_count, validate_array_bounds};
pub use format::{align_to_8, align_to_boundary, calculate_padding};
pub use parsing::{parse_range, validate_name};
