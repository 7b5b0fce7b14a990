//! The `DDSketch` proper: a relative-error quantile sketch over an active
//! bucket store, with an opposite-shape reserve store ready for a
//! density-triggered switch, and sparse-bucket collapsing once a single
//! store grows past its bucket ceiling.

use std::time::{Duration, Instant};

use crate::error::{Result, SketchError};
use crate::mapping::LogMapping;
use crate::store::{Store, StoreShape};

/// Tuning knobs that are not part of the wire format: they govern when the
/// live sketch switches store shape or collapses sparse buckets, not the
/// statistical content of the sketch itself.
#[derive(Debug, Clone, Copy)]
pub struct SketchTuning {
    /// Density above which a sparse store switches to dense.
    pub switch_to_dense_above: f64,
    /// Density below which a dense store switches back to sparse.
    pub switch_to_sparse_below: f64,
    /// Minimum interval between store switches, to avoid thrashing when
    /// density oscillates around the threshold.
    pub min_switch_interval: Duration,
    /// Sparse bucket count above which collapsing is considered.
    pub collapse_bucket_ceiling: usize,
    /// Per-bucket count below which a bucket is a collapse candidate.
    pub collapse_count_threshold: u64,
    pub auto_switch: bool,
}

impl Default for SketchTuning {
    fn default() -> Self {
        Self {
            switch_to_dense_above: 0.5,
            switch_to_sparse_below: 0.2,
            min_switch_interval: Duration::from_secs(1),
            collapse_bucket_ceiling: 1000,
            collapse_count_threshold: 4,
            auto_switch: true,
        }
    }
}

/// Parameters needed to construct a `DDSketch`.
#[derive(Debug, Clone, Copy)]
pub struct DDSketchConfig {
    pub relative_accuracy: f64,
    pub v_min: f64,
    pub v_max: f64,
    pub tuning: SketchTuning,
}

impl DDSketchConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.relative_accuracy > 0.0 && self.relative_accuracy < 1.0) {
            return Err(SketchError::InvalidConfig(format!(
                "relative_accuracy must be in (0, 1), got {}",
                self.relative_accuracy
            )));
        }
        if !(self.v_min > 0.0 && self.v_min < self.v_max) {
            return Err(SketchError::InvalidConfig(format!(
                "require 0 < v_min < v_max, got v_min={} v_max={}",
                self.v_min, self.v_max
            )));
        }
        Ok(())
    }
}

/// Observable result of the most recent `add`, consumed by the caller
/// (typically the tail aggregator) and turned into an `AgentDiagEvent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SketchTransition {
    StoreSwitched {
        from: StoreShape,
        to: StoreShape,
    },
    Collapsed {
        buckets_removed: usize,
    },
}

#[derive(Debug, Clone)]
pub struct DDSketch {
    mapping: LogMapping,
    gamma: f64,
    v_min: f64,
    v_max: f64,
    active: Store,
    reserve: Store,
    min: Option<f64>,
    max: Option<f64>,
    sum: f64,
    last_switch: Option<Instant>,
    tuning: SketchTuning,
    last_transition: Option<SketchTransition>,
}

impl DDSketch {
    pub fn new(cfg: DDSketchConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            mapping: LogMapping::new(cfg.relative_accuracy, cfg.v_min),
            gamma: cfg.relative_accuracy,
            v_min: cfg.v_min,
            v_max: cfg.v_max,
            active: Store::empty(StoreShape::Sparse),
            reserve: Store::empty(StoreShape::Dense),
            min: None,
            max: None,
            sum: 0.0,
            last_switch: None,
            tuning: cfg.tuning,
            last_transition: None,
        })
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    pub fn v_min(&self) -> f64 {
        self.v_min
    }

    pub fn v_max(&self) -> f64 {
        self.v_max
    }

    pub fn count(&self) -> u64 {
        self.active.total_count()
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn active_shape(&self) -> StoreShape {
        self.active.shape()
    }

    pub fn bucket_count(&self) -> usize {
        self.active.bucket_count()
    }

    pub fn memory_estimate(&self) -> usize {
        self.active.memory_estimate()
    }

    /// Drain the transition recorded by the most recent `add`, if any.
    pub fn take_transition(&mut self) -> Option<SketchTransition> {
        self.last_transition.take()
    }

    /// Record `count` observations of magnitude `v`. Values are clamped
    /// into `[v_min, v_max]` before mapping: a sketch tracking CPU percent
    /// or RSS bytes is not in the business of rejecting a measurement just
    /// because a process briefly exceeded the configured working range.
    pub fn add(&mut self, v: f64, count: u64) -> Result<()> {
        if v <= 0.0 {
            return Err(SketchError::NonPositiveValue(v));
        }
        if count == 0 {
            return Ok(());
        }
        let clamped = v.clamp(self.v_min, self.v_max);
        let idx = self.mapping.index_of(clamped);
        self.active.add(idx, count);
        self.min = Some(self.min.map_or(clamped, |m| m.min(clamped)));
        self.max = Some(self.max.map_or(clamped, |m| m.max(clamped)));
        self.sum += clamped * count as f64;

        self.maybe_switch_store();
        self.maybe_collapse();
        Ok(())
    }

    fn maybe_switch_store(&mut self) {
        if !self.tuning.auto_switch {
            return;
        }
        if let Some(last) = self.last_switch {
            if last.elapsed() < self.tuning.min_switch_interval {
                return;
            }
        }
        let density = self.active.density();
        let should_switch = match self.active.shape() {
            StoreShape::Sparse => density > self.tuning.switch_to_dense_above,
            StoreShape::Dense => density < self.tuning.switch_to_sparse_below,
        };
        if !should_switch {
            return;
        }

        let from = self.active.shape();
        let mut rebuilt = self.active.switched();
        std::mem::swap(&mut rebuilt, &mut self.active);
        self.reserve = rebuilt;
        self.reserve.clear();

        self.last_switch = Some(Instant::now());
        self.last_transition = Some(SketchTransition::StoreSwitched {
            from,
            to: self.active.shape(),
        });
    }

    fn maybe_collapse(&mut self) {
        if self.active.bucket_count() <= self.tuning.collapse_bucket_ceiling {
            return;
        }
        let removed = self.active.collapse(self.tuning.collapse_count_threshold);
        if removed > 0 {
            self.last_transition = Some(SketchTransition::Collapsed {
                buckets_removed: removed,
            });
        }
    }

    /// The value at quantile `q` in `[0, 1]`.
    pub fn value_at(&self, q: f64) -> Result<f64> {
        let total = self.count();
        if total == 0 {
            return Err(SketchError::EmptySketch);
        }
        if !(0.0..=1.0).contains(&q) {
            return Err(SketchError::InvalidQuantile(q));
        }
        if q == 0.0 {
            return Ok(self.min.unwrap());
        }
        if q == 1.0 {
            return Ok(self.max.unwrap());
        }

        let rank = ((q * total as f64).ceil() as u64).clamp(1, total);
        let mut seen = 0u64;
        for (idx, count) in self.active.ascending_entries() {
            seen += count;
            if seen >= rank {
                return Ok(self.mapping.value_of(idx));
            }
        }
        Ok(self.mapping.value_of(self.active.max_index().unwrap()))
    }

    /// The fraction of observations strictly below `v`.
    pub fn quantile_at(&self, v: f64) -> Result<f64> {
        let total = self.count();
        if total == 0 {
            return Err(SketchError::EmptySketch);
        }
        let clamped = v.clamp(self.v_min, self.v_max);
        let idx = self.mapping.index_of(clamped);
        let mut below = 0u64;
        for (bucket_idx, count) in self.active.ascending_entries() {
            if bucket_idx >= idx {
                break;
            }
            below += count;
        }
        Ok(below as f64 / total as f64)
    }

    /// Merge another sketch's buckets into this one. Both sketches must
    /// share the same `gamma`; differing `v_min`/`v_max` are tolerated
    /// since they only bound the mapping's domain, not its index grid.
    pub fn merge(&mut self, other: &DDSketch) -> Result<()> {
        if (self.gamma - other.gamma).abs() > f64::EPSILON {
            return Err(SketchError::IncompatibleGamma {
                expected: self.gamma,
                actual: other.gamma,
            });
        }
        for (idx, count) in other.active.ascending_entries() {
            self.active.add(idx, count);
        }
        self.min = match (self.min, other.min) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, None) => a,
            (None, b) => b,
        };
        self.max = match (self.max, other.max) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, None) => a,
            (None, b) => b,
        };
        self.sum += other.sum;
        self.maybe_switch_store();
        self.maybe_collapse();
        Ok(())
    }

    pub(crate) fn from_parts(
        gamma: f64,
        v_min: f64,
        v_max: f64,
        active: Store,
        min: Option<f64>,
        max: Option<f64>,
        sum: f64,
        tuning: SketchTuning,
    ) -> Self {
        let reserve = Store::empty(active.opposite_shape());
        Self {
            mapping: LogMapping::new(gamma, v_min),
            gamma,
            v_min,
            v_max,
            active,
            reserve,
            min,
            max,
            sum,
            last_switch: None,
            tuning,
            last_transition: None,
        }
    }

    pub(crate) fn active_store(&self) -> &Store {
        &self.active
    }

    /// Equality modulo runtime-only state (tuning, reserve contents,
    /// last-switch timer): two sketches are wire-equivalent if a consumer
    /// reading only their serialized form could not tell them apart.
    pub fn wire_equivalent(&self, other: &DDSketch) -> bool {
        self.gamma == other.gamma
            && self.v_min == other.v_min
            && self.v_max == other.v_max
            && self.count() == other.count()
            && self.min == other.min
            && self.max == other.max
            && (self.sum - other.sum).abs() < 1e-6
            && self.active.ascending_entries().eq(other.active.ascending_entries())
    }
}
