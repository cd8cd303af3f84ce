use thiserror::Error;

use crate::core::array::{ArrayError, DType};
use crate::core::timestep::TimestepError;

/// Errors raised by the trajectory buffer and the replay buffer facade.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BufferError {
    #[error("invalid buffer config: {0}")]
    InvalidConfig(String),

    #[error("timestep fields {actual:?} do not match buffer fields {expected:?}")]
    FieldMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("field `{field}` has shape {actual:?}, buffer expects {expected:?}")]
    ShapeMismatch {
        field: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("field `{field}` has dtype {actual}, buffer expects {expected}")]
    DTypeMismatch {
        field: String,
        expected: DType,
        actual: DType,
    },

    #[error("cannot add {steps} timesteps at once to a buffer of capacity {capacity}")]
    AddTooLong { steps: usize, capacity: usize },

    #[error("insufficient data: {available} timesteps stored, at least {required} needed")]
    InsufficientData { available: usize, required: usize },

    #[error("buffer has not been initialized; add a timestep or load a vault first")]
    Uninitialized,

    #[error(transparent)]
    Timestep(#[from] TimestepError),

    #[error(transparent)]
    Array(#[from] ArrayError),
}
