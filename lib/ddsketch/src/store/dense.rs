//! Unbounded dense store.

use ddsketch_proto::Store as ProtoStore;

use super::bins::BinList;
use super::{Store, DEFAULT_CHUNK_SIZE};

/// A dense store that keeps every bin between the lowest and highest live
/// keys.
///
/// The buffer grows in chunks and never shrinks. On reallocation the live
/// range is re-centred within the buffer, so insertions drifting in either
/// direction stay amortized O(1). The number of bins will not grow
/// unreasonably unless the data is distributed with tails heavier than any
/// subexponential.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DenseStore {
    bins: BinList,
    count: f64,
    min_key: i64,
    max_key: i64,
    chunk_size: usize,
    offset: i64,
}

impl DenseStore {
    /// Creates an empty store with the default allocation granularity.
    pub fn new() -> Self {
        Self::with_chunk_size(DEFAULT_CHUNK_SIZE)
    }

    /// Creates an empty store that grows `chunk_size` bins at a time.
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        assert!(chunk_size >= 1, "chunk size must be at least 1");
        Self {
            bins: BinList::default(),
            count: 0.0,
            min_key: i64::MAX,
            max_key: i64::MIN,
            chunk_size,
            offset: 0,
        }
    }

    /// Smallest chunk multiple covering the given key range.
    fn new_length(&self, new_min_key: i64, new_max_key: i64) -> usize {
        let desired_length = (new_max_key - new_min_key + 1) as usize;
        desired_length.div_ceil(self.chunk_size) * self.chunk_size
    }

    /// Fits the live range into the buffer without resizing it.
    fn adjust(&mut self, new_min_key: i64, new_max_key: i64) {
        self.center_bins(new_min_key, new_max_key);
        self.min_key = new_min_key;
        self.max_key = new_max_key;
    }

    /// Shifts the bins in place; this changes the offset.
    fn shift_bins(&mut self, shift: i64) {
        if shift > 0 {
            self.bins.remove_trailing(shift as usize);
            self.bins.extend_front_with_zeros(shift as usize);
        } else {
            let abs_shift = shift.unsigned_abs() as usize;
            self.bins.remove_leading(abs_shift);
            self.bins.extend_back_with_zeros(abs_shift);
        }
        self.offset -= shift;
    }

    /// Shifts the bins so the midpoint of the new range sits mid-buffer.
    fn center_bins(&mut self, new_min_key: i64, new_max_key: i64) {
        let middle_key = new_min_key + (new_max_key - new_min_key + 1) / 2;
        self.shift_bins(self.offset + self.bins.len() as i64 / 2 - middle_key);
    }

    /// Grows the buffer as necessary to cover both keys.
    fn extend_range(&mut self, key: i64, second_key: i64) {
        let new_min_key = key.min(second_key).min(self.min_key);
        let new_max_key = key.max(second_key).max(self.max_key);

        if self.bins.is_empty() {
            let new_length = self.new_length(new_min_key, new_max_key);
            self.bins.initialize_with_zeros(new_length);
            self.offset = new_min_key;
            self.adjust(new_min_key, new_max_key);
        } else if new_min_key >= self.min_key && new_max_key < self.offset + self.bins.len() as i64 {
            // The range already fits; only the live bounds move.
            self.min_key = new_min_key;
            self.max_key = new_max_key;
        } else {
            let new_length = self.new_length(new_min_key, new_max_key);
            if new_length > self.bins.len() {
                self.bins.extend_back_with_zeros(new_length - self.bins.len());
            }
            self.adjust(new_min_key, new_max_key);
        }
    }

    /// Buffer position for the key, extending the range if necessary.
    fn bin_index(&mut self, key: i64) -> usize {
        if key < self.min_key || key > self.max_key {
            self.extend_range(key, key);
        }
        (key - self.offset) as usize
    }
}

impl Store for DenseStore {
    fn add(&mut self, key: i64, weight: f64) {
        if weight == 0.0 {
            return;
        }

        let index = self.bin_index(key);
        self.bins[index] += weight;
        self.count += weight;
    }

    fn count(&self) -> f64 {
        self.count
    }

    fn length(&self) -> usize {
        self.bins.len()
    }

    fn is_empty(&self) -> bool {
        self.count == 0.0
    }

    fn offset(&self) -> i64 {
        self.offset
    }

    fn key_at_rank(&self, rank: f64, lower: bool) -> i64 {
        let mut running = 0.0;
        for key in self.min_key..=self.max_key {
            running += self.bins[(key - self.offset) as usize];
            if (lower && running > rank) || (!lower && running >= rank + 1.0) {
                return key;
            }
        }
        self.max_key
    }

    fn merge(&mut self, other: &Self) {
        if other.count == 0.0 {
            return;
        }

        if self.count == 0.0 {
            self.clone_from(other);
            return;
        }

        if other.min_key < self.min_key || other.max_key > self.max_key {
            self.extend_range(other.min_key, other.max_key);
        }

        for key in other.min_key..=other.max_key {
            self.bins[(key - self.offset) as usize] += other.bins[(key - other.offset) as usize];
        }

        self.count += other.count;
    }

    fn clear(&mut self) {
        self.bins.clear();
        self.count = 0.0;
        self.min_key = i64::MAX;
        self.max_key = i64::MIN;
        self.offset = 0;
    }

    fn to_proto(&self) -> ProtoStore {
        let mut proto = ProtoStore::default();
        if self.is_empty() {
            return proto;
        }

        proto.contiguous_bin_index_offset = self.min_key;
        proto.contiguous_bin_counts = (self.min_key..=self.max_key)
            .map(|key| self.bins[(key - self.offset) as usize])
            .collect();
        proto
    }
}

impl Default for DenseStore {
    fn default() -> Self {
        Self::new()
    }
}
