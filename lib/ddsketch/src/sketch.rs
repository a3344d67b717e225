//! The sketch aggregator.

use ddsketch_proto::DdSketch as ProtoDdSketch;
use prost::Message as _;
use snafu::{ensure, OptionExt, ResultExt};

use crate::error::{
    DecodeSnafu, InvalidWeightSnafu, MissingMappingSnafu, SketchError, UnequalSketchParametersSnafu, WireError,
};
use crate::mapping::{AnyMapping, IndexMapping, LogarithmicMapping};
use crate::store::{CollapsingHighestDenseStore, CollapsingLowestDenseStore, DenseStore, Store};

/// Bin limit used when a caller passes a non-positive one.
const DEFAULT_BIN_LIMIT: usize = 2048;

fn adjust_bin_limit(bin_limit: i64) -> usize {
    if bin_limit > 0 {
        bin_limit as usize
    } else {
        DEFAULT_BIN_LIMIT
    }
}

/// A fast and fully-mergeable quantile sketch with relative-error guarantees.
///
/// For any queried quantile whose true value is `v` (with `v != 0`), the
/// returned estimate is within `relative_accuracy * |v|` of `v`. The sketch
/// supports negative, zero, and positive values; incremental weighted
/// insertion; merging of sketches with identical parameters; and a
/// round-trippable serialized form.
///
/// Internally, one index mapping translates magnitudes to bin keys and two
/// stores count them, one per sign; observations too close to zero to be
/// indexed land in a dedicated zero count. Summary statistics (`count`,
/// `sum`, `min`, `max`) are tracked exactly alongside the bins.
///
/// The defaults are the memory-optimal [`LogarithmicMapping`] and the
/// unbounded [`DenseStore`]; the number of bins will not grow unreasonably
/// unless the data is distributed with tails heavier than any
/// subexponential. Use [`DDSketch::collapsing_lowest`] or
/// [`DDSketch::collapsing_highest`] to bound memory instead.
///
/// # Example
///
/// ```
/// use ddsketch::DDSketch;
///
/// let mut sketch = DDSketch::new(0.01)?;
/// sketch.add(1.0);
/// sketch.add(2.0);
/// sketch.add(3.0);
///
/// let median = sketch.quantile(0.5);
/// assert!((median - 2.0).abs() <= 0.01 * 2.0);
/// # Ok::<(), ddsketch::SketchError>(())
/// ```
///
/// # Features
///
/// This crate exposes a `serde` feature enabling serialization of sketches
/// with `serde`. The serde format mirrors the in-memory layout and is not
/// promised to be stable across versions; for durable exchange, use
/// [`DDSketch::to_bytes`] and [`DDSketch::from_bytes`] instead.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DDSketch<M = LogarithmicMapping, S = DenseStore>
where
    M: IndexMapping,
    S: Store,
{
    /// Maps values to store bins and back.
    mapping: M,

    /// Storage for positive values.
    positive_store: S,

    /// Storage for negative values, keyed by magnitude.
    negative_store: S,

    /// Total weight of observations in the un-indexable band around zero.
    zero_count: f64,

    /// Total weight of all observations.
    count: f64,

    /// Smallest observation.
    min: f64,

    /// Largest observation.
    max: f64,

    /// Weighted sum of all observations.
    sum: f64,
}

impl DDSketch {
    /// Creates a sketch with the given relative accuracy, using unbounded
    /// dense stores.
    ///
    /// # Errors
    ///
    /// Returns an error if the relative accuracy is not in (0, 1).
    pub fn new(relative_accuracy: f64) -> Result<Self, SketchError> {
        Ok(Self::with_parts(
            LogarithmicMapping::new(relative_accuracy)?,
            DenseStore::new(),
            DenseStore::new(),
        ))
    }
}

impl DDSketch<LogarithmicMapping, CollapsingLowestDenseStore> {
    /// Creates a sketch with the given relative accuracy, bounding each store
    /// to `bin_limit` bins by collapsing the lowest bins when the limit is
    /// exceeded.
    ///
    /// Collapsing loses accuracy on the lowest quantiles only. A
    /// non-positive `bin_limit` is normalized to the default of 2048.
    ///
    /// # Errors
    ///
    /// Returns an error if the relative accuracy is not in (0, 1).
    pub fn collapsing_lowest(relative_accuracy: f64, bin_limit: i64) -> Result<Self, SketchError> {
        let bin_limit = adjust_bin_limit(bin_limit);
        Ok(Self::with_parts(
            LogarithmicMapping::new(relative_accuracy)?,
            CollapsingLowestDenseStore::new(bin_limit),
            CollapsingLowestDenseStore::new(bin_limit),
        ))
    }
}

impl DDSketch<LogarithmicMapping, CollapsingHighestDenseStore> {
    /// Creates a sketch with the given relative accuracy, bounding each store
    /// to `bin_limit` bins by collapsing the highest bins when the limit is
    /// exceeded.
    ///
    /// Collapsing loses accuracy on the highest quantiles only. A
    /// non-positive `bin_limit` is normalized to the default of 2048.
    ///
    /// # Errors
    ///
    /// Returns an error if the relative accuracy is not in (0, 1).
    pub fn collapsing_highest(relative_accuracy: f64, bin_limit: i64) -> Result<Self, SketchError> {
        let bin_limit = adjust_bin_limit(bin_limit);
        Ok(Self::with_parts(
            LogarithmicMapping::new(relative_accuracy)?,
            CollapsingHighestDenseStore::new(bin_limit),
            CollapsingHighestDenseStore::new(bin_limit),
        ))
    }
}

impl<M: IndexMapping, S: Store> DDSketch<M, S> {
    /// Creates a sketch from a mapping and a pair of stores.
    ///
    /// Both stores must be freshly created with identical parameters.
    pub fn with_parts(mapping: M, positive_store: S, negative_store: S) -> Self {
        Self {
            mapping,
            positive_store,
            negative_store,
            zero_count: 0.0,
            count: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum: 0.0,
        }
    }

    /// Adds a value to the sketch.
    pub fn add(&mut self, value: f64) {
        self.add_weighted(value, 1.0).expect("unit weight is positive");
    }

    /// Adds a value to the sketch with the given weight.
    ///
    /// # Errors
    ///
    /// Returns an error if the weight is not strictly positive; the sketch is
    /// left unchanged in that case.
    pub fn add_weighted(&mut self, value: f64, weight: f64) -> Result<(), SketchError> {
        ensure!(weight > 0.0, InvalidWeightSnafu { weight });

        if value > self.mapping.min_indexable_value() {
            self.positive_store.add(self.mapping.key(value), weight);
        } else if value < -self.mapping.min_indexable_value() {
            self.negative_store.add(self.mapping.key(-value), weight);
        } else {
            self.zero_count += weight;
        }

        self.count += weight;
        self.sum += value * weight;

        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }

        Ok(())
    }

    /// Returns the approximate value at the given quantile, or NaN when the
    /// quantile is outside `[0, 1]` or the sketch is empty.
    pub fn quantile(&self, quantile: f64) -> f64 {
        if !(0.0..=1.0).contains(&quantile) || self.count == 0.0 {
            return f64::NAN;
        }

        let rank = quantile * (self.count - 1.0);
        let negative_count = self.negative_store.count();

        if rank < negative_count {
            // Negative-store keys are ordered by magnitude while the global
            // order is by signed value, so the rank is reversed.
            let reversed_rank = negative_count - rank - 1.0;
            let key = self.negative_store.key_at_rank(reversed_rank, false);
            -self.mapping.value(key)
        } else if rank < negative_count + self.zero_count {
            0.0
        } else {
            let key = self
                .positive_store
                .key_at_rank(rank - negative_count - self.zero_count, true);
            self.mapping.value(key)
        }
    }

    /// Merges another sketch into this one.
    ///
    /// After this operation, this sketch encodes the values that were added
    /// to either sketch.
    ///
    /// # Errors
    ///
    /// Returns an error if the two sketches do not have the same gamma; this
    /// sketch is left unchanged in that case.
    pub fn merge(&mut self, other: &Self) -> Result<(), SketchError> {
        ensure!(
            self.mergeable(other),
            UnequalSketchParametersSnafu {
                expected: self.mapping.gamma(),
                actual: other.mapping.gamma(),
            }
        );

        if other.count == 0.0 {
            return Ok(());
        }

        if self.count == 0.0 {
            self.clone_from(other);
            return Ok(());
        }

        self.positive_store.merge(&other.positive_store);
        self.negative_store.merge(&other.negative_store);
        self.zero_count += other.zero_count;

        self.count += other.count;
        self.sum += other.sum;
        if other.min < self.min {
            self.min = other.min;
        }
        if other.max > self.max {
            self.max = other.max;
        }

        Ok(())
    }

    /// Returns `true` if the other sketch can be merged into this one.
    ///
    /// Two sketches can be merged only when their gammas are equal.
    pub fn mergeable(&self, other: &Self) -> bool {
        self.mapping.gamma() == other.mapping.gamma()
    }

    /// Clears the sketch, removing all observations.
    pub fn clear(&mut self) {
        self.positive_store.clear();
        self.negative_store.clear();
        self.zero_count = 0.0;
        self.count = 0.0;
        self.sum = 0.0;
        self.min = f64::INFINITY;
        self.max = f64::NEG_INFINITY;
    }

    /// Returns `true` if the sketch holds no observations.
    pub fn is_empty(&self) -> bool {
        self.count == 0.0
    }

    /// Returns the total weight of all observations.
    pub fn count(&self) -> f64 {
        self.count
    }

    /// Returns the weighted sum of all observations.
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Returns the weighted average of all observations, or NaN when the
    /// sketch is empty.
    pub fn avg(&self) -> f64 {
        self.sum / self.count
    }

    /// Returns the smallest observation, or positive infinity when the
    /// sketch is empty.
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Returns the largest observation, or negative infinity when the sketch
    /// is empty.
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Returns the total weight of observations in the un-indexable band
    /// around zero.
    pub fn zero_count(&self) -> f64 {
        self.zero_count
    }

    /// Returns a reference to the index mapping.
    pub fn mapping(&self) -> &M {
        &self.mapping
    }

    /// Returns a reference to the positive value store.
    pub fn positive_store(&self) -> &S {
        &self.positive_store
    }

    /// Returns a reference to the negative value store.
    pub fn negative_store(&self) -> &S {
        &self.negative_store
    }

    /// Returns the relative accuracy of this sketch.
    pub fn relative_accuracy(&self) -> f64 {
        self.mapping.relative_accuracy()
    }

    /// Converts this sketch to its wire form.
    pub fn to_proto(&self) -> ProtoDdSketch {
        ProtoDdSketch {
            mapping: Some(self.mapping.to_proto()),
            positive_values: Some(self.positive_store.to_proto()),
            negative_values: Some(self.negative_store.to_proto()),
            zero_count: self.zero_count,
            count: self.count,
            min: self.min,
            max: self.max,
            sum: self.sum,
        }
    }

    /// Serializes this sketch to bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_proto().encode_to_vec()
    }
}

impl DDSketch<AnyMapping, DenseStore> {
    /// Rebuilds a sketch from its wire form.
    ///
    /// Whatever store variant the producer used, the decoded sketch always
    /// carries unbounded dense stores: bin limits are not transmitted, so
    /// collapsing semantics cannot be reconstructed. Decoded sketches remain
    /// mergeable with each other whenever their gammas match. Summary
    /// statistics are restored exactly as transmitted.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload has no mapping, names an unknown
    /// interpolation, or carries an out-of-range relative accuracy.
    pub fn from_proto(proto: &ProtoDdSketch) -> Result<Self, WireError> {
        let mapping = AnyMapping::from_proto(proto.mapping.as_ref().context(MissingMappingSnafu)?)?;

        let mut positive_store = DenseStore::new();
        if let Some(values) = proto.positive_values.as_ref() {
            positive_store.merge_from_proto(values);
        }

        let mut negative_store = DenseStore::new();
        if let Some(values) = proto.negative_values.as_ref() {
            negative_store.merge_from_proto(values);
        }

        Ok(Self {
            mapping,
            positive_store,
            negative_store,
            zero_count: proto.zero_count,
            count: proto.count,
            min: proto.min,
            max: proto.max,
            sum: proto.sum,
        })
    }

    /// Deserializes a sketch from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid payload; see
    /// [`DDSketch::from_proto`].
    pub fn from_bytes(buf: &[u8]) -> Result<Self, WireError> {
        let proto = ProtoDdSketch::decode(buf).context(DecodeSnafu)?;
        Self::from_proto(&proto)
    }
}

impl Default for DDSketch {
    /// Creates a sketch with 1% relative accuracy (the common default).
    fn default() -> Self {
        Self::new(0.01).expect("0.01 is a valid relative accuracy")
    }
}
