//! The active/reserve bucket-store pair and the shape that switches
//! between them.

mod dense;
mod sparse;

pub use dense::DenseStore;
pub use sparse::SparseStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreShape {
    Sparse,
    Dense,
}

#[derive(Debug, Clone)]
pub enum Store {
    Sparse(SparseStore),
    Dense(DenseStore),
}

impl Store {
    pub fn empty(shape: StoreShape) -> Self {
        match shape {
            StoreShape::Sparse => Store::Sparse(SparseStore::new()),
            StoreShape::Dense => Store::Dense(DenseStore::new()),
        }
    }

    pub fn shape(&self) -> StoreShape {
        match self {
            Store::Sparse(_) => StoreShape::Sparse,
            Store::Dense(_) => StoreShape::Dense,
        }
    }

    pub fn opposite_shape(&self) -> StoreShape {
        match self.shape() {
            StoreShape::Sparse => StoreShape::Dense,
            StoreShape::Dense => StoreShape::Sparse,
        }
    }

    pub fn add(&mut self, index: i32, count: u64) {
        match self {
            Store::Sparse(s) => s.add(index, count),
            Store::Dense(d) => d.add(index, count),
        }
    }

    pub fn get(&self, index: i32) -> u64 {
        match self {
            Store::Sparse(s) => s.get(index),
            Store::Dense(d) => d.get(index),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Store::Sparse(s) => s.is_empty(),
            Store::Dense(d) => d.is_empty(),
        }
    }

    pub fn min_index(&self) -> Option<i32> {
        match self {
            Store::Sparse(s) => s.min_index(),
            Store::Dense(d) => d.min_index(),
        }
    }

    pub fn max_index(&self) -> Option<i32> {
        match self {
            Store::Sparse(s) => s.max_index(),
            Store::Dense(d) => d.max_index(),
        }
    }

    pub fn total_count(&self) -> u64 {
        match self {
            Store::Sparse(s) => s.total_count(),
            Store::Dense(d) => d.total_count(),
        }
    }

    pub fn bucket_count(&self) -> usize {
        match self {
            Store::Sparse(s) => s.bucket_count(),
            Store::Dense(d) => d.bucket_count(),
        }
    }

    pub fn density(&self) -> f64 {
        match self {
            Store::Sparse(s) => s.density(),
            Store::Dense(d) => d.density(),
        }
    }

    pub fn memory_estimate(&self) -> usize {
        match self {
            Store::Sparse(s) => s.memory_estimate(),
            Store::Dense(d) => d.memory_estimate(),
        }
    }

    pub fn clear(&mut self) {
        match self {
            Store::Sparse(s) => s.clear(),
            Store::Dense(d) => d.clear(),
        }
    }

    pub fn ascending_entries(&self) -> Box<dyn Iterator<Item = (i32, u64)> + '_> {
        match self {
            Store::Sparse(s) => Box::new(s.ascending_entries()),
            Store::Dense(d) => Box::new(d.ascending_entries()),
        }
    }

    /// Collapse low-count buckets toward their neighbors. A no-op for dense
    /// stores: the scenario collapsing guards against (an explosion of
    /// near-empty buckets over a wide span) cannot occur once a store has
    /// switched to the dense, fixed-span representation.
    pub fn collapse(&mut self, count_threshold: u64) -> usize {
        match self {
            Store::Sparse(s) => s.collapse(count_threshold),
            Store::Dense(_) => 0,
        }
    }

    /// Rebuild `self` as the opposite shape, preserving every bucket.
    pub fn switched(&self) -> Store {
        let target_shape = self.opposite_shape();
        let mut out = Store::empty(target_shape);
        for (idx, count) in self.ascending_entries() {
            out.add(idx, count);
        }
        out
    }
}
