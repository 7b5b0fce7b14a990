//! A sparse bucket store backed by a `BTreeMap`, used while the active
//! value range is wide relative to the number of observations.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct SparseStore {
    buckets: BTreeMap<i32, u64>,
    total_count: u64,
}

impl SparseStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (i32, u64)>) -> Self {
        let mut s = Self::new();
        for (index, count) in entries {
            s.add(index, count);
        }
        s
    }

    pub fn add(&mut self, index: i32, count: u64) {
        if count == 0 {
            return;
        }
        *self.buckets.entry(index).or_insert(0) += count;
        self.total_count += count;
    }

    pub fn get(&self, index: i32) -> u64 {
        self.buckets.get(&index).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn min_index(&self) -> Option<i32> {
        self.buckets.keys().next().copied()
    }

    pub fn max_index(&self) -> Option<i32> {
        self.buckets.keys().next_back().copied()
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
        self.total_count = 0;
    }

    /// Density over the span of the index range actually in use; a store
    /// holding a handful of buckets scattered across a wide span reports a
    /// low density, which is exactly the signal that favors staying sparse.
    pub fn density(&self) -> f64 {
        match (self.min_index(), self.max_index()) {
            (Some(lo), Some(hi)) => {
                let span = (hi - lo) as f64 + 1.0;
                self.buckets.len() as f64 / span
            }
            _ => 0.0,
        }
    }

    pub fn memory_estimate(&self) -> usize {
        self.buckets.len() * (std::mem::size_of::<i32>() + std::mem::size_of::<u64>())
    }

    pub fn ascending_entries(&self) -> impl Iterator<Item = (i32, u64)> + '_ {
        self.buckets.iter().map(|(&idx, &cnt)| (idx, cnt))
    }

    /// Redistribute low-count buckets into their nearest surviving
    /// neighbors by inverse distance, leaving `min_index`/`max_index`
    /// untouched. Returns the number of buckets removed.
    ///
    /// Only called once `bucket_count()` exceeds the configured ceiling;
    /// collapsing a store that already fits comfortably would trade
    /// accuracy for no memory benefit.
    pub fn collapse(&mut self, count_threshold: u64) -> usize {
        let lo = match self.min_index() {
            Some(lo) => lo,
            None => return 0,
        };
        let hi = self.max_index().unwrap();

        let candidates: Vec<i32> = self
            .buckets
            .iter()
            .filter(|(&idx, &cnt)| idx != lo && idx != hi && cnt < count_threshold)
            .map(|(&idx, _)| idx)
            .collect();

        let mut removed = 0usize;
        for idx in candidates {
            let count = match self.buckets.get(&idx) {
                Some(&c) => c,
                None => continue, // already folded into a prior candidate's neighbor
            };

            let left = self
                .buckets
                .range(..idx)
                .next_back()
                .map(|(&k, _)| k)
                .filter(|&k| k != idx);
            let right = self
                .buckets
                .range(idx + 1..)
                .next()
                .map(|(&k, _)| k);

            match (left, right) {
                (Some(l), Some(r)) => {
                    let dl = (idx - l) as f64;
                    let dr = (r - idx) as f64;
                    let w_l = 1.0 / dl;
                    let w_r = 1.0 / dr;
                    let frac_l = w_l / (w_l + w_r);
                    let to_left = (count as f64 * frac_l).round() as u64;
                    let to_right = count - to_left;
                    *self.buckets.get_mut(&l).unwrap() += to_left;
                    *self.buckets.get_mut(&r).unwrap() += to_right;
                }
                (Some(l), None) => {
                    *self.buckets.get_mut(&l).unwrap() += count;
                }
                (None, Some(r)) => {
                    *self.buckets.get_mut(&r).unwrap() += count;
                }
                (None, None) => continue, // isolated bucket, nothing to fold into
            }

            self.buckets.remove(&idx);
            removed += 1;
        }
        removed
    }
}
