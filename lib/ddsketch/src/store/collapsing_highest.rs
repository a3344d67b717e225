//! Fixed-capacity dense store that collapses its highest bins.

use ddsketch_proto::Store as ProtoStore;

use super::bins::BinList;
use super::{Store, DEFAULT_CHUNK_SIZE};

/// A dense store with a hard cap on the number of bins, collapsing the
/// highest-keyed bins when the cap is exceeded.
///
/// The mirror image of
/// [`CollapsingLowestDenseStore`](super::CollapsingLowestDenseStore):
/// collapsing sacrifices accuracy on the highest quantiles to preserve it on
/// the lowest ones.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CollapsingHighestDenseStore {
    bins: BinList,
    count: f64,
    min_key: i64,
    max_key: i64,
    chunk_size: usize,
    offset: i64,
    bin_limit: usize,
    is_collapsed: bool,
}

impl CollapsingHighestDenseStore {
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
    /// After a collapse, accuracy guarantees no longer hold for the highest
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
    /// the highest bins when the range is too wide.
    fn adjust(&mut self, new_min_key: i64, new_max_key: i64) {
        let length = self.bins.len() as i64;
        if new_max_key - new_min_key + 1 > length {
            // The range is too wide: pin the upper bound to what fits.
            let new_max_key = new_min_key + length - 1;

            if new_max_key <= self.min_key {
                // The new range no longer overlaps the live one; all current
                // mass collapses into the last bin.
                self.offset = new_min_key;
                self.max_key = new_max_key;
                self.bins.initialize_with_zeros(length as usize);
                self.bins[length as usize - 1] = self.count;
            } else {
                let shift = self.offset - new_min_key;
                let collapse_start = new_max_key - self.offset + 1;
                let collapse_end = self.max_key - self.offset + 1;
                if collapse_end > collapse_start {
                    let collapsed = self.bins.collapsed_count(collapse_start as usize, collapse_end as usize);
                    self.bins
                        .replace_range_with_zeros(collapse_start as usize, collapse_end as usize);
                    self.bins[collapse_start as usize - 1] += collapsed;
                }
                self.max_key = new_max_key;
                self.shift_bins(shift);
            }

            self.min_key = new_min_key;
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
    /// Once the store has collapsed, keys above the retained range accumulate
    /// into the highest live bin without further range changes.
    fn bin_index(&mut self, key: i64) -> usize {
        if key > self.max_key {
            if self.is_collapsed {
                return (self.max_key - self.offset) as usize;
            }

            self.extend_range(key, key);

            if self.is_collapsed {
                return (self.max_key - self.offset) as usize;
            }
        } else if key < self.min_key {
            self.extend_range(key, key);
        }

        (key - self.offset) as usize
    }
}

impl Store for CollapsingHighestDenseStore {
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

        // Fold the other store's mass above our retained range into the
        // highest live bin, then accumulate the in-range bins directly.
        let fold_start = (self.max_key + 1).max(other.min_key);
        if fold_start <= other.max_key {
            let collapsed = other.bins.collapsed_count(
                (fold_start - other.offset) as usize,
                (other.max_key + 1 - other.offset) as usize,
            );
            self.bins[(self.max_key - self.offset) as usize] += collapsed;
        }

        for key in other.min_key..fold_start.min(other.max_key + 1) {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_within_limit_no_collapse() {
        let mut store = CollapsingHighestDenseStore::new(10);
        for key in 0..10 {
            store.add(key, 1.0);
        }

        assert_eq!(store.count(), 10.0);
        assert!(!store.is_collapsed());
        assert_eq!(store.length(), 10);
    }

    #[test]
    fn test_collapse_on_low_key() {
        let mut store = CollapsingHighestDenseStore::new(5);
        for key in 1..6 {
            store.add(key, 1.0);
        }
        assert!(!store.is_collapsed());

        store.add(0, 1.0);

        assert!(store.is_collapsed());
        assert_eq!(store.count(), 6.0);
        assert_eq!(store.bins.sum(), 6.0);
        assert_eq!(store.min_key, 0);
        assert_eq!(store.max_key, 4);
        // The collapsed key-5 mass now sits in the highest surviving bin.
        assert_eq!(store.bins[(4 - store.offset) as usize], 2.0);
    }

    #[test]
    fn test_collapse_on_high_key() {
        let mut store = CollapsingHighestDenseStore::new(5);
        for key in 0..5 {
            store.add(key, 1.0);
        }

        store.add(9, 1.0);

        assert!(store.is_collapsed());
        assert_eq!(store.count(), 6.0);
        assert_eq!(store.bins.sum(), 6.0);
        // Key 9 is above the retained range, so its weight folds into the
        // highest surviving bin.
        assert_eq!(store.max_key, 4);
        assert_eq!(store.bins[(4 - store.offset) as usize], 2.0);
    }

    #[test]
    fn test_far_jump_collapses_everything() {
        let mut store = CollapsingHighestDenseStore::new(4);
        store.add(1000, 1.0);
        store.add(1001, 2.0);

        store.add(0, 1.0);

        assert!(store.is_collapsed());
        assert_eq!(store.count(), 4.0);
        assert_eq!(store.bins.sum(), 4.0);
        assert_eq!(store.min_key, 0);
        assert_eq!(store.max_key, 3);
        // All pre-jump mass landed in the highest bin.
        assert_eq!(store.bins[(3 - store.offset) as usize], 3.0);
    }

    #[test]
    fn test_post_collapse_high_adds_accumulate() {
        let mut store = CollapsingHighestDenseStore::new(5);
        for key in 0..5 {
            store.add(key, 1.0);
        }
        store.add(9, 1.0);
        assert!(store.is_collapsed());
        let length_before = store.length();

        store.add(1000, 2.5);

        assert_eq!(store.length(), length_before);
        assert_eq!(store.count(), 8.5);
        assert_eq!(store.bins.sum(), 8.5);
        assert_eq!(store.max_key, 4);
    }

    #[test]
    fn test_rank_favors_low_keys_after_collapse() {
        let mut store = CollapsingHighestDenseStore::new(3);
        for key in 0..6 {
            store.add(key, 1.0);
        }

        assert!(store.is_collapsed());
        // The bottom ranks still resolve to their exact keys.
        assert_eq!(store.key_at_rank(0.0, true), 0);
        assert_eq!(store.key_at_rank(1.0, true), 1);
        // The top ranks all fall into the collapsed edge bin.
        assert_eq!(store.key_at_rank(5.0, true), 2);
    }

    #[test]
    fn test_merge_folds_out_of_range_mass() {
        let mut target = CollapsingHighestDenseStore::new(4);
        for key in 10..14 {
            target.add(key, 1.0);
        }

        let mut source = CollapsingHighestDenseStore::new(4);
        source.add(12, 1.0);
        source.add(100, 2.0);

        target.merge(&source);

        assert_eq!(target.count(), 7.0);
        assert_eq!(target.bins.sum(), 7.0);
        // Source key 100 folded into the highest retained bin.
        assert_eq!(target.max_key, 13);
        assert_eq!(target.bins[(13 - target.offset) as usize], 3.0);
        assert_eq!(target.bins[(12 - target.offset) as usize], 2.0);
    }

    #[test]
    fn test_merge_into_empty_copies() {
        let mut source = CollapsingHighestDenseStore::new(8);
        source.add(3, 1.0);

        let mut target = CollapsingHighestDenseStore::new(8);
        target.merge(&source);

        assert_eq!(target.count(), 1.0);
        assert_eq!(target.key_at_rank(0.0, true), 3);
    }

    #[test]
    fn test_proto_roundtrip() {
        let mut store = CollapsingHighestDenseStore::new(4);
        for key in 0..6 {
            store.add(key, 1.0);
        }
        assert!(store.is_collapsed());

        let proto = store.to_proto();
        assert_eq!(proto.contiguous_bin_index_offset, store.min_key);

        let mut rebuilt = CollapsingHighestDenseStore::new(4);
        rebuilt.merge_from_proto(&proto);

        assert_eq!(rebuilt.count(), store.count());
        assert_eq!(rebuilt.to_proto(), proto);
    }
}
