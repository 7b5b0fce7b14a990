//! DDSketch: a relative-error quantile sketch for always-on telemetry.
//!
//! Every numeric metric the agent emits (CPU percent, RSS bytes, handle
//! count, latency) that is aggregated across more processes than fit in a
//! `TopNBatch`'s explicit rows is folded into one of these instead of
//! dropped. A `DDSketch` guarantees that any quantile it reports is within
//! a fixed relative error of the true value, independent of the
//! distribution's shape or the number of observations folded in.
//!
//! The active bucket store starts sparse (a `BTreeMap`) and switches to
//! dense (a flat `Vec`) once its occupied index range is dense enough that
//! the array beats map overhead; it switches back if density later drops.
//! A sparse store that grows past its bucket ceiling collapses its
//! lowest-count buckets into their neighbors rather than growing without
//! bound.

mod error;
mod mapping;
mod sketch;
mod store;
mod wire;

pub use error::{Result, SketchError};
pub use mapping::LogMapping;
pub use sketch::{DDSketch, DDSketchConfig, SketchTransition, SketchTuning};
pub use store::{DenseStore, SparseStore, Store, StoreShape};
pub use wire::{decode_slice, encode_slice};
