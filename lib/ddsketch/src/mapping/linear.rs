//! Linearly interpolated index mapping.

use ddsketch_proto::Interpolation;

use super::{frexp, ldexp, IndexMapping, MappingParams};
use crate::error::SketchError;

/// A fast index mapping that linearly interpolates the base-2 logarithm.
///
/// The floor of `log2(v)` is read straight from the binary representation of
/// the value, and the logarithm is interpolated linearly in between. This
/// avoids transcendental calls on the insertion path, at the cost of slightly
/// narrower bins than [`LogarithmicMapping`](super::LogarithmicMapping) would
/// use for the same accuracy.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct LinearlyInterpolatedMapping {
    params: MappingParams,
}

impl LinearlyInterpolatedMapping {
    /// Creates a linearly interpolated mapping with the given relative
    /// accuracy.
    ///
    /// # Errors
    ///
    /// Returns an error if the relative accuracy is not in (0, 1).
    pub fn new(relative_accuracy: f64) -> Result<Self, SketchError> {
        Self::with_offset(relative_accuracy, 0.0)
    }

    /// Creates a linearly interpolated mapping with the given relative
    /// accuracy and key shift.
    ///
    /// # Errors
    ///
    /// Returns an error if the relative accuracy is not in (0, 1).
    pub fn with_offset(relative_accuracy: f64, index_offset: f64) -> Result<Self, SketchError> {
        let params = MappingParams::new(relative_accuracy, index_offset, 1.0)?;
        Ok(Self { params })
    }

    /// Approximates `log2(v)` by `s + e - 1` where `v = (1 + s) * 2^(e - 1)`.
    #[inline]
    fn log2_approx(value: f64) -> f64 {
        let (mantissa, exponent) = frexp(value);
        let significand = 2.0 * mantissa - 1.0;
        significand + (exponent - 1) as f64
    }

    /// Exact inverse of [`Self::log2_approx`].
    #[inline]
    fn exp2_approx(value: f64) -> f64 {
        let exponent = value.floor() + 1.0;
        let mantissa = (value - exponent + 2.0) / 2.0;
        ldexp(mantissa, exponent as i32)
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

impl IndexMapping for LinearlyInterpolatedMapping {
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
        Interpolation::Linear
    }
}
