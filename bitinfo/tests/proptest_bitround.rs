use bitinfo::{bitround, bitround_slice};
use proptest::prelude::*;

// Property 1: rounding twice changes nothing
proptest! {
    #[test]
    fn prop_idempotent(x in -1.0e6f32..1.0e6f32, keep in 0u32..=23) {
        let once = bitround(x, keep).unwrap();
        prop_assert_eq!(bitround(once, keep).unwrap().to_bits(), once.to_bits());
    }
}

// Property 2: discarded mantissa bits are zero
proptest! {
    #[test]
    fn prop_trailing_bits_cleared(x in -1.0e6f64..1.0e6f64, keep in 0u32..=52) {
        let rounded = bitround(x, keep).unwrap();
        let dropped = (1u64 << (52 - keep)) - 1;
        prop_assert_eq!(rounded.to_bits() & dropped, 0);
    }
}

// Property 3: the error is at most half a unit in the last kept place
proptest! {
    #[test]
    fn prop_error_bounded(x in 1.0e-3f64..1.0e6f64, keep in 0u32..=52, negative in any::<bool>()) {
        let x = if negative { -x } else { x };
        let rounded = bitround(x, keep).unwrap();
        let bound = x.abs() * 2f64.powi(-(keep as i32) - 1);
        prop_assert!((rounded - x).abs() <= bound, "{} -> {} exceeds {}", x, rounded, bound);
        prop_assert_eq!(rounded.is_sign_negative(), x.is_sign_negative());
    }
}

// Property 4: rounding keeps the order of values
proptest! {
    #[test]
    fn prop_monotonic(mut values in prop::collection::vec(-1.0e4f32..1.0e4f32, 2..200), keep in 0u32..=23) {
        values.sort_by(|a, b| a.total_cmp(b));
        bitround_slice(&mut values, keep).unwrap();
        prop_assert!(values.windows(2).all(|w| w[0] <= w[1]));
    }
}

#[test]
fn test_special_values_survive() {
    assert!(bitround(f32::NAN, 3).unwrap().is_nan());
    assert_eq!(bitround(f64::INFINITY, 0).unwrap(), f64::INFINITY);
    assert_eq!(bitround(-0.0f32, 5).unwrap().to_bits(), (-0.0f32).to_bits());
    assert!(bitround(1.0f32, 24).is_err());
}
