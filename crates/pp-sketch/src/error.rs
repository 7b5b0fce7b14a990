//! Error kinds for sketch construction, querying, merging and wire I/O.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SketchError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SketchError {
    /// A non-positive value was offered to a sketch that only tracks
    /// strictly positive magnitudes (CPU percent, RSS bytes, handle count).
    #[error("value {0} is not strictly positive")]
    NonPositiveValue(f64),

    /// A quantile or value query was made against a sketch with no
    /// observations.
    #[error("sketch has no observations")]
    EmptySketch,

    /// A requested quantile fell outside `[0, 1]`.
    #[error("quantile {0} is outside [0, 1]")]
    InvalidQuantile(f64),

    /// `merge` was attempted between sketches built with different
    /// relative-accuracy parameters; they are not byte-for-byte mergeable.
    #[error("cannot merge sketches with different gamma ({expected} vs {actual})")]
    IncompatibleGamma { expected: f64, actual: f64 },

    /// Configuration failed validation (e.g. `v_min >= v_max`, `gamma <= 0`).
    #[error("invalid sketch configuration: {0}")]
    InvalidConfig(String),

    /// The wire buffer did not begin with the `DDSK` magic.
    #[error("not a DDSketch wire buffer")]
    BadMagic,

    /// The wire buffer's version byte does not match this build.
    #[error("unsupported wire version {0}")]
    UnsupportedVersion(u8),

    /// The wire buffer was truncated or malformed.
    #[error("truncated or malformed sketch buffer: {0}")]
    Truncated(&'static str),
}
