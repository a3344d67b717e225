//! Index mappings.
//!
//! An index mapping translates real values to integer bin keys with a bounded
//! relative distortion, and back. For any value `v` with
//! `min_indexable_value() < |v| < max_indexable_value()`, implementations
//! guarantee that `value(key(v))` is within `relative_accuracy() * |v|` of
//! `v`.
//!
//! There is a trade-off between the cost of computing a key and the number of
//! keys needed to cover a range of values. [`LogarithmicMapping`] is
//! memory-optimal but evaluates a logarithm on every insertion;
//! [`LinearlyInterpolatedMapping`] and [`CubicallyInterpolatedMapping`]
//! approximate the logarithm from the binary representation of the value,
//! trading a few extra bins for cheaper keys.

use ddsketch_proto::{IndexMapping as ProtoIndexMapping, Interpolation};
use snafu::{ensure, OptionExt, ResultExt};

mod cubic;
mod linear;
mod logarithmic;

pub use self::cubic::CubicallyInterpolatedMapping;
pub use self::linear::LinearlyInterpolatedMapping;
pub use self::logarithmic::LogarithmicMapping;

use crate::error::{
    InvalidMappingSnafu, InvalidRelativeAccuracySnafu, SketchError, UnsupportedInterpolationSnafu, WireError,
};

/// Maps values to bin keys and vice versa.
pub trait IndexMapping: Clone + Send + Sync {
    /// Returns the key of the bin covering the given positive value.
    ///
    /// The value must be positive; callers index negative values by their
    /// absolute value and keep them in a separate store.
    fn key(&self, value: f64) -> i64;

    /// Returns the representative value of the bin with the given key.
    ///
    /// The representative sits at the geometric midpoint of the bin, which is
    /// what bounds the relative error by the relative accuracy.
    fn value(&self, key: i64) -> f64;

    /// Returns the relative accuracy guaranteed by this mapping.
    fn relative_accuracy(&self) -> f64;

    /// Returns the bin base gamma, `(1 + alpha) / (1 - alpha)`.
    fn gamma(&self) -> f64;

    /// Returns the additive shift applied to every key.
    fn index_offset(&self) -> f64;

    /// Returns the smallest positive value this mapping can distinguish from
    /// zero.
    fn min_indexable_value(&self) -> f64;

    /// Returns the largest positive value this mapping can handle.
    fn max_indexable_value(&self) -> f64;

    /// Returns the interpolation scheme of this mapping.
    fn interpolation(&self) -> Interpolation;

    /// Converts this mapping to its wire form.
    ///
    /// Gamma is never transmitted; readers derive it from the relative
    /// accuracy.
    fn to_proto(&self) -> ProtoIndexMapping {
        ProtoIndexMapping {
            alpha: self.relative_accuracy(),
            index_offset: self.index_offset(),
            interpolation: self.interpolation() as i32,
        }
    }
}

/// Parameters shared by every mapping variant.
///
/// The multiplier is pre-scaled at construction so that each variant's
/// logarithm approximation lands directly in base-gamma units.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub(crate) struct MappingParams {
    pub(crate) relative_accuracy: f64,
    pub(crate) gamma: f64,
    pub(crate) index_offset: f64,
    pub(crate) multiplier: f64,
    pub(crate) min_indexable: f64,
    pub(crate) max_indexable: f64,
}

impl MappingParams {
    pub(crate) fn new(
        relative_accuracy: f64, index_offset: f64, multiplier_scale: f64,
    ) -> Result<Self, SketchError> {
        ensure!(
            relative_accuracy > 0.0 && relative_accuracy < 1.0,
            InvalidRelativeAccuracySnafu { value: relative_accuracy }
        );

        let gamma = (1.0 + relative_accuracy) / (1.0 - relative_accuracy);
        Ok(Self {
            relative_accuracy,
            gamma,
            index_offset,
            multiplier: multiplier_scale / gamma.ln(),
            min_indexable: f64::MIN_POSITIVE * gamma,
            max_indexable: f64::MAX / gamma,
        })
    }

    /// Turns a base-gamma logarithm into a bin key.
    #[inline]
    pub(crate) fn key_for(&self, log_gamma: f64) -> i64 {
        (log_gamma.ceil() + self.index_offset) as i64
    }

    /// Scales gamma raised to the un-shifted key back to the bin midpoint.
    #[inline]
    pub(crate) fn value_from(&self, pow_gamma: f64) -> f64 {
        pow_gamma * (2.0 / (1.0 + self.gamma))
    }

    /// Removes the key shift ahead of exponentiation.
    #[inline]
    pub(crate) fn unshifted(&self, key: i64) -> f64 {
        key as f64 - self.index_offset
    }
}

/// Splits a finite positive value into `(mantissa, exponent)` with
/// `value = mantissa * 2^exponent` and `mantissa` in `[0.5, 1)`.
#[inline]
pub(crate) fn frexp(value: f64) -> (f64, i32) {
    const EXPONENT_MASK: u64 = 0x7ff << 52;
    // Exponent bits of 0.5, the normalized mantissa range.
    const HALF_EXPONENT: u64 = 1022 << 52;

    let bits = value.to_bits();
    if bits & EXPONENT_MASK == 0 {
        // Subnormal: renormalize before reading the exponent bits.
        let scaled = value * f64::exp2(64.0);
        let bits = scaled.to_bits();
        let exponent = ((bits & EXPONENT_MASK) >> 52) as i32 - 1022 - 64;
        (f64::from_bits((bits & !EXPONENT_MASK) | HALF_EXPONENT), exponent)
    } else {
        let exponent = ((bits & EXPONENT_MASK) >> 52) as i32 - 1022;
        (f64::from_bits((bits & !EXPONENT_MASK) | HALF_EXPONENT), exponent)
    }
}

/// Computes `mantissa * 2^exponent` without losing mantissa precision.
#[inline]
pub(crate) fn ldexp(mantissa: f64, exponent: i32) -> f64 {
    mantissa * f64::exp2(exponent as f64)
}

/// An index mapping whose variant is selected at runtime.
///
/// Deserialization has to reconstruct whichever mapping the producer used, so
/// decoded sketches carry this enum instead of a statically chosen variant.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum AnyMapping {
    /// An exact logarithmic mapping.
    Logarithmic(LogarithmicMapping),

    /// A linearly interpolated mapping.
    LinearlyInterpolated(LinearlyInterpolatedMapping),

    /// A cubically interpolated mapping.
    CubicallyInterpolated(CubicallyInterpolatedMapping),
}

impl AnyMapping {
    /// Reconstructs a mapping from its wire form.
    ///
    /// # Errors
    ///
    /// Returns an error if the interpolation kind is unknown or the relative
    /// accuracy on the wire is out of range.
    pub fn from_proto(proto: &ProtoIndexMapping) -> Result<Self, WireError> {
        let interpolation = Interpolation::try_from(proto.interpolation)
            .ok()
            .context(UnsupportedInterpolationSnafu { value: proto.interpolation })?;

        let mapping = match interpolation {
            Interpolation::None => Self::Logarithmic(
                LogarithmicMapping::with_offset(proto.alpha, proto.index_offset).context(InvalidMappingSnafu)?,
            ),
            Interpolation::Linear => Self::LinearlyInterpolated(
                LinearlyInterpolatedMapping::with_offset(proto.alpha, proto.index_offset)
                    .context(InvalidMappingSnafu)?,
            ),
            Interpolation::Cubic => Self::CubicallyInterpolated(
                CubicallyInterpolatedMapping::with_offset(proto.alpha, proto.index_offset)
                    .context(InvalidMappingSnafu)?,
            ),
        };

        Ok(mapping)
    }
}

macro_rules! delegate_to_variant {
    ($self:expr, $mapping:ident => $body:expr) => {
        match $self {
            AnyMapping::Logarithmic($mapping) => $body,
            AnyMapping::LinearlyInterpolated($mapping) => $body,
            AnyMapping::CubicallyInterpolated($mapping) => $body,
        }
    };
}

impl IndexMapping for AnyMapping {
    fn key(&self, value: f64) -> i64 {
        delegate_to_variant!(self, mapping => mapping.key(value))
    }

    fn value(&self, key: i64) -> f64 {
        delegate_to_variant!(self, mapping => mapping.value(key))
    }

    fn relative_accuracy(&self) -> f64 {
        delegate_to_variant!(self, mapping => mapping.relative_accuracy())
    }

    fn gamma(&self) -> f64 {
        delegate_to_variant!(self, mapping => mapping.gamma())
    }

    fn index_offset(&self) -> f64 {
        delegate_to_variant!(self, mapping => mapping.index_offset())
    }

    fn min_indexable_value(&self) -> f64 {
        delegate_to_variant!(self, mapping => mapping.min_indexable_value())
    }

    fn max_indexable_value(&self) -> f64 {
        delegate_to_variant!(self, mapping => mapping.max_indexable_value())
    }

    fn interpolation(&self) -> Interpolation {
        delegate_to_variant!(self, mapping => mapping.interpolation())
    }
}

impl From<LogarithmicMapping> for AnyMapping {
    fn from(mapping: LogarithmicMapping) -> Self {
        Self::Logarithmic(mapping)
    }
}

impl From<LinearlyInterpolatedMapping> for AnyMapping {
    fn from(mapping: LinearlyInterpolatedMapping) -> Self {
        Self::LinearlyInterpolated(mapping)
    }
}

impl From<CubicallyInterpolatedMapping> for AnyMapping {
    fn from(mapping: CubicallyInterpolatedMapping) -> Self {
        Self::CubicallyInterpolated(mapping)
    }
}

#[cfg(test)]
pub(crate) mod tests_support {
    use super::IndexMapping;

    /// Sweeps magnitudes from 1e-6 to 1e9 and asserts that the mapped
    /// representative of every value stays within the accuracy bound.
    pub(crate) fn assert_relative_error_bounded<M: IndexMapping>(mapping: &M, accuracy: f64) {
        let mut value = 1e-6;
        while value < 1e9 {
            let representative = mapping.value(mapping.key(value));
            let error = (representative - value).abs() / value;
            assert!(
                error <= accuracy,
                "relative error {} exceeds {} for value {} (representative {})",
                error,
                accuracy,
                value,
                representative
            );
            value *= 1.01;
        }
    }
}
