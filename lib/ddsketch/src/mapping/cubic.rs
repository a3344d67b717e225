//! Cubically interpolated index mapping.

use ddsketch_proto::Interpolation;

use super::{frexp, ldexp, IndexMapping, MappingParams};
use crate::error::SketchError;

/// A fast index mapping that cubically interpolates the base-2 logarithm.
///
/// Like [`LinearlyInterpolatedMapping`](super::LinearlyInterpolatedMapping),
/// the floor of `log2(v)` comes from the binary representation of the value,
/// but the in-between interpolation uses a cubic polynomial, which tracks the
/// true logarithm closely enough that the bin count comes within a percent of
/// the memory-optimal logarithmic mapping. The inverse solves the cubic with
/// Cardano's formula.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CubicallyInterpolatedMapping {
    params: MappingParams,
}

impl CubicallyInterpolatedMapping {
    const A: f64 = 6.0 / 35.0;
    const B: f64 = -3.0 / 5.0;
    const C: f64 = 10.0 / 7.0;

    /// Creates a cubically interpolated mapping with the given relative
    /// accuracy.
    ///
    /// # Errors
    ///
    /// Returns an error if the relative accuracy is not in (0, 1).
    pub fn new(relative_accuracy: f64) -> Result<Self, SketchError> {
        Self::with_offset(relative_accuracy, 0.0)
    }

    /// Creates a cubically interpolated mapping with the given relative
    /// accuracy and key shift.
    ///
    /// # Errors
    ///
    /// Returns an error if the relative accuracy is not in (0, 1).
    pub fn with_offset(relative_accuracy: f64, index_offset: f64) -> Result<Self, SketchError> {
        let params = MappingParams::new(relative_accuracy, index_offset, 1.0 / Self::C)?;
        Ok(Self { params })
    }

    /// Approximates `log2(v)` with a cubic polynomial in the significand.
    #[inline]
    fn log2_approx(value: f64) -> f64 {
        let (mantissa, exponent) = frexp(value);
        let significand = 2.0 * mantissa - 1.0;
        ((Self::A * significand + Self::B) * significand + Self::C) * significand + (exponent - 1) as f64
    }

    /// Inverse of [`Self::log2_approx`], derived from Cardano's formula.
    #[inline]
    fn exp2_approx(value: f64) -> f64 {
        let floored = value.floor();
        let exponent = floored as i32;
        let delta_0 = Self::B * Self::B - 3.0 * Self::A * Self::C;
        let delta_1 = 2.0 * Self::B * Self::B * Self::B
            - 9.0 * Self::A * Self::B * Self::C
            - 27.0 * Self::A * Self::A * (value - floored);
        let cardano = ((delta_1 - (delta_1 * delta_1 - 4.0 * delta_0 * delta_0 * delta_0).sqrt()) / 2.0).cbrt();
        let significand_plus_one = -(Self::B + cardano + delta_0 / cardano) / (3.0 * Self::A) + 1.0;
        ldexp(significand_plus_one / 2.0, exponent + 1)
    }

    #[inline]
    fn log_gamma(&self, value: f64) -> f64 {
        Self::log2_approx(value) * self.params.multiplier
    }

    #[inline]
    fn pow_gamma(&self, value: f64) -> f64 {
        Self::exp2_approx(value / self.params.multiplier)
    }
}

impl IndexMapping for CubicallyInterpolatedMapping {
    fn key(&self, value: f64) -> i64 {
        self.params.key_for(self.log_gamma(value))
    }

    fn value(&self, key: i64) -> f64 {
        self.params.value_from(self.pow_gamma(self.params.unshifted(key)))
    }

    fn relative_accuracy(&self) -> f64 {
        self.params.relative_accuracy
    }

    fn gamma(&self) -> f64 {
        self.params.gamma
    }

    fn index_offset(&self) -> f64 {
        self.params.index_offset
    }

    fn min_indexable_value(&self) -> f64 {
        self.params.min_indexable
    }

    fn max_indexable_value(&self) -> f64 {
        self.params.max_indexable
    }

    fn interpolation(&self) -> Interpolation {
        Interpolation::Cubic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::tests_support::assert_relative_error_bounded;

    #[test]
    fn test_new_invalid_accuracy() {
        assert!(CubicallyInterpolatedMapping::new(0.0).is_err());
        assert!(CubicallyInterpolatedMapping::new(1.0).is_err());
    }

    #[test]
    fn test_polynomial_continuous_at_powers_of_two() {
        // The cubic evaluates to 0 at s = 0 and 1 at s = 1, so the
        // approximation is exact (and continuous) at every power of two.
        for exponent in -20..20 {
            let value = f64::exp2(exponent as f64);
            let approx = CubicallyInterpolatedMapping::log2_approx(value);
            assert!(
                (approx - exponent as f64).abs() < 1e-12,
                "log2_approx({}) = {}",
                value,
                approx
            );
        }
    }

    #[test]
    fn test_exp2_approx_inverts_log2_approx() {
        let mut value = 1e-6;
        while value < 1e9 {
            let roundtrip =
                CubicallyInterpolatedMapping::exp2_approx(CubicallyInterpolatedMapping::log2_approx(value));
            assert!(
                (roundtrip - value).abs() <= 1e-12 * value,
                "inversion drifted for {}: {}",
                value,
                roundtrip
            );
            value *= 1.07;
        }
    }

    #[test]
    fn test_key_value_within_accuracy() {
        for &accuracy in &[0.001, 0.01, 0.02, 0.05] {
            let mapping = CubicallyInterpolatedMapping::new(accuracy).unwrap();
            assert_relative_error_bounded(&mapping, accuracy);
        }
    }

    #[test]
    fn test_uses_fewer_keys_than_linear() {
        // The cubic interpolation hugs log2 tighter than the linear one, so
        // covering the same value range takes fewer distinct keys.
        let cubic = CubicallyInterpolatedMapping::new(0.01).unwrap();
        let linear = crate::mapping::LinearlyInterpolatedMapping::new(0.01).unwrap();

        let cubic_span = cubic.key(1e9) - cubic.key(1e-9);
        let linear_span = linear.key(1e9) - linear.key(1e-9);
        assert!(
            cubic_span < linear_span,
            "cubic span {} vs linear span {}",
            cubic_span,
            linear_span
        );
    }

    #[test]
    fn test_interpolation_kind() {
        let mapping = CubicallyInterpolatedMapping::new(0.01).unwrap();
        assert_eq!(mapping.interpolation(), Interpolation::Cubic);
        assert_eq!(mapping.to_proto().interpolation, Interpolation::Cubic as i32);
    }
}
