//! Fixed-capacity dense store that collapses its lowest bins.

use ddsketch_proto::Store as ProtoStore;

use super::bins::BinList;
use super::{Store, DEFAULT_CHUNK_SIZE};

/// A dense store with a hard cap on the number of bins, collapsing the
/// lowest-keyed bins when the cap is exceeded.
///
/// Collapsing sacrifices accuracy on the lowest quantiles to preserve it on
/// the highest ones, which suits metrics like latencies where the tail
/// matters most. For the default bin limit, collapsing is unlikely to occur
/// unless the data is distributed with tails heavier than any
/// subexponential.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CollapsingLowestDenseStore {
    bins: BinList,
    count: f64,
    min_key: i64,
    max_key: i64,
    chunk_size: usize,
    offset: i64,
    bin_limit: usize,
    is_collapsed: bool,
}

impl CollapsingLowestDenseStore {
    /// Creates an empty store holding at most `bin_limit` bins.
    pub fn new(bin_limit: usize) -> Self {
        Self::with_chunk_size(bin_limit, DEFAULT_CHUNK_SIZE)
    }

    /// Creates an empty store holding at most `bin_limit` bins, growing
    /// `chunk_size` bins at a time.
    pub fn with_chunk_size(bin_limit: usize, chunk_size: usize) -> Self {
        assert!(bin_limit >= 1, "bin limit must be at least 1");
        assert!(chunk_size >= 1, "chunk size must be at least 1");
        Self {
            bins: BinList::default(),
            count: 0.0,
            min_key: i64::MAX,
            max_key: i64::MIN,
            chunk_size,
            offset: 0,
            bin_limit,
            is_collapsed: false,
        }
    }

    /// Returns the maximum number of bins this store will hold.
    pub fn bin_limit(&self) -> usize {
        self.bin_limit
    }

    /// Returns `true` once any collapse has occurred.
    ///
    /// After a collapse, accuracy guarantees no longer hold for the lowest
    /// quantiles.
    pub fn is_collapsed(&self) -> bool {
        self.is_collapsed
    }

    /// Smallest chunk multiple covering the given key range, capped at the
    /// bin limit.
    fn new_length(&self, new_min_key: i64, new_max_key: i64) -> usize {
        let desired_length = (new_max_key - new_min_key + 1) as usize;
        (desired_length.div_ceil(self.chunk_size) * self.chunk_size).min(self.bin_limit)
    }

    /// Fits the live range into the buffer without resizing it, collapsing
    /// the lowest bins when the range is too wide.
    fn adjust(&mut self, new_min_key: i64, new_max_key: i64) {
        let length = self.bins.len() as i64;
        if new_max_key - new_min_key + 1 > length {
            // The range is too wide: pin the lower bound to what fits.
            let new_min_key = new_max_key - length + 1;

            if new_min_key >= self.max_key {
                // The new range no longer overlaps the live one; all current
                // mass collapses into the first bin.
                self.offset = new_min_key;
                self.min_key = new_min_key;
                self.bins.initialize_with_zeros(length as usize);
                self.bins[0] = self.count;
            } else {
                let shift = self.offset - new_min_key;
                let collapse_start = self.min_key - self.offset;
                let collapse_end = new_min_key - self.offset;
                if collapse_end > collapse_start {
                    let collapsed = self.bins.collapsed_count(collapse_start as usize, collapse_end as usize);
                    self.bins
                        .replace_range_with_zeros(collapse_start as usize, collapse_end as usize);
                    self.bins[collapse_end as usize] += collapsed;
                }
                self.min_key = new_min_key;
                self.shift_bins(shift);
            }

            self.max_key = new_max_key;
            self.is_collapsed = true;
        } else {
            self.center_bins(new_min_key, new_max_key);
            self.min_key = new_min_key;
            self.max_key = new_max_key;
        }
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
    ///
    /// Once the store has collapsed, keys below the retained range accumulate
    /// into the lowest live bin without further range changes.
    fn bin_index(&mut self, key: i64) -> usize {
        if key < self.min_key {
            if self.is_collapsed {
                return (self.min_key - self.offset) as usize;
            }

            self.extend_range(key, key);

            if self.is_collapsed {
                return (self.min_key - self.offset) as usize;
            }
        } else if key > self.max_key {
            self.extend_range(key, key);
        }

        (key - self.offset) as usize
    }
}

impl Store for CollapsingLowestDenseStore {
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

        if other.is_collapsed {
            self.is_collapsed = true;
        }

        // Fold the other store's mass below our retained range into the
        // lowest live bin, then accumulate the in-range bins directly.
        let fold_end = self.min_key.min(other.max_key + 1);
        if fold_end > other.min_key {
            let collapsed = other.bins.collapsed_count(
                (other.min_key - other.offset) as usize,
                (fold_end - other.offset) as usize,
            );
            self.bins[(self.min_key - self.offset) as usize] += collapsed;
        }

        for key in fold_end.max(other.min_key)..=other.max_key {
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
        self.is_collapsed = false;
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
