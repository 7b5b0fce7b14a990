//! Sampler error kinds.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SampleError>;

#[derive(Error, Debug)]
pub enum SampleError {
    /// A tail-group sketch could not be created or updated. Wraps the
    /// engine's own error rather than duplicating its variants.
    #[error(transparent)]
    Sketch(#[from] pp_sketch::SketchError),
}
