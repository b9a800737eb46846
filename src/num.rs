//! Utilities related to numbers.

use num;
use std::fmt;

/// Floating point marker trait for easier control over trait bounds.
pub trait BFloat: Sync + Send + num::Float + num::cast::FromPrimitive + fmt::Debug {}

impl BFloat for f32 {}
impl BFloat for f64 {}

/// Returns the value if it is larger than the given magnitude in absolute
/// value, or `None` otherwise.
pub fn nonvanishing<F: BFloat>(value: F, magnitude: F) -> Option<F> {
    if value.abs() > magnitude {
        Some(value)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn nonvanishing_rejects_small_values() {
        assert_eq!(nonvanishing(1e-31_f64, 1e-30), None);
        assert_eq!(nonvanishing(-2.0_f64, 1e-30), Some(-2.0));
        assert_eq!(nonvanishing(0.0_f32, 0.0), None);
    }
}
