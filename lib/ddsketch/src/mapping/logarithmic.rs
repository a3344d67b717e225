//! Exact logarithmic index mapping.

use ddsketch_proto::Interpolation;

use super::{IndexMapping, MappingParams};
use crate::error::SketchError;

/// A memory-optimal index mapping.
///
/// Given a target relative accuracy, this mapping requires the fewest keys to
/// cover a range of values, at the cost of evaluating a logarithm for every
/// key computation. Values are mapped with `ceil(log2(v) * multiplier)` where
/// the multiplier converts base-2 logarithms into base-gamma ones.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct LogarithmicMapping {
    params: MappingParams,
}

impl LogarithmicMapping {
    /// Creates a logarithmic mapping with the given relative accuracy.
    ///
    /// # Errors
    ///
    /// Returns an error if the relative accuracy is not in (0, 1).
    pub fn new(relative_accuracy: f64) -> Result<Self, SketchError> {
        Self::with_offset(relative_accuracy, 0.0)
    }

    /// Creates a logarithmic mapping with the given relative accuracy and key
    /// shift.
    ///
    /// # Errors
    ///
    /// Returns an error if the relative accuracy is not in (0, 1).
    pub fn with_offset(relative_accuracy: f64, index_offset: f64) -> Result<Self, SketchError> {
        let params = MappingParams::new(relative_accuracy, index_offset, std::f64::consts::LN_2)?;
        Ok(Self { params })
    }

    #[inline]
    fn log_gamma(&self, value: f64) -> f64 {
        value.log2() * self.params.multiplier
    }

    #[inline]
    fn pow_gamma(&self, value: f64) -> f64 {
        (value / self.params.multiplier).exp2()
    }
}

impl IndexMapping for LogarithmicMapping {
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
        Interpolation::None
    }
}

impl Default for LogarithmicMapping {
    /// Creates a logarithmic mapping with 1% relative accuracy (the common
    /// default).
    fn default() -> Self {
        Self::new(0.01).expect("0.01 is a valid relative accuracy")
    }
}
