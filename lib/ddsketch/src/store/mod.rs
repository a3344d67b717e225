//! Bin stores.
//!
//! A store is a dense, integer-keyed counter backed by a contiguous growable
//! buffer with a per-store key offset: the count for key `k` lives at buffer
//! position `k - offset`. [`DenseStore`] grows without bound;
//! [`CollapsingLowestDenseStore`] and [`CollapsingHighestDenseStore`] cap the
//! buffer length and fold excess extremal bins into the surviving edge bin.

use ddsketch_proto::Store as ProtoStore;

mod bins;
mod collapsing_highest;
mod collapsing_lowest;
mod dense;

pub use self::collapsing_highest::CollapsingHighestDenseStore;
pub use self::collapsing_lowest::CollapsingLowestDenseStore;
pub use self::dense::DenseStore;

/// How many bins a store allocates at a time.
pub(crate) const DEFAULT_CHUNK_SIZE: usize = 128;

/// Storage for weighted observations, keyed by bin index.
pub trait Store: Clone + Send + Sync {
    /// Adds a weight to the bin at the given key, extending the key range if
    /// necessary.
    fn add(&mut self, key: i64, weight: f64);

    /// Returns the total weight across all bins.
    fn count(&self) -> f64;

    /// Returns the number of allocated bins.
    fn length(&self) -> usize;

    /// Returns `true` if the store holds no weight.
    fn is_empty(&self) -> bool;

    /// Returns the key of the first allocated bin.
    fn offset(&self) -> i64;

    /// Returns the key holding the given rank.
    ///
    /// Walks the bins in key order accumulating counts. With `lower` set,
    /// returns the first key whose cumulative count strictly exceeds `rank`;
    /// otherwise the first key whose cumulative count reaches `rank + 1`.
    /// A negative rank resolves to the first key with a nonzero count, and a
    /// rank at or beyond the total count resolves to the last one.
    fn key_at_rank(&self, rank: f64, lower: bool) -> i64;

    /// Merges another store of the same variant into this one.
    fn merge(&mut self, other: &Self);

    /// Removes all weight from the store.
    ///
    /// The buffer allocation is retained for reuse.
    fn clear(&mut self);

    /// Converts this store to its wire form: a dense run of counts covering
    /// the live key range, or an empty message for an empty store.
    fn to_proto(&self) -> ProtoStore;

    /// Accumulates a wire-form store into this one.
    ///
    /// Both wire representations are consumed: every sparse pair and every
    /// position of the dense run contributes one add.
    fn merge_from_proto(&mut self, proto: &ProtoStore) {
        for (&key, &count) in &proto.bin_counts {
            self.add(key, count);
        }

        let mut key = proto.contiguous_bin_index_offset;
        for &count in &proto.contiguous_bin_counts {
            self.add(key, count);
            key += 1;
        }
    }
}
