//! Reshaping: arbitrary upstream tabular shapes → canonical long-format frames.

pub mod flatten;
pub mod frame;
pub mod normalize;

pub use flatten::{column_key, flat_name, RawTable, FIELD_JOIN};
pub use normalize::{normalize_macro, normalize_prices};

use thiserror::Error;

/// Structured error types for the reshaping stage.
///
/// Every variant is fatal to the current run; there are no retries here.
/// `ShapeMismatch` and `Validation` carry the observed columns so a failed
/// run can be diagnosed from the error message alone.
#[derive(Debug, Error)]
pub enum ReshapeError {
    #[error("empty input: {0}")]
    EmptyInput(&'static str),

    #[error("shape mismatch: expected {expected}; observed columns: {observed:?}")]
    ShapeMismatch {
        expected: String,
        observed: Vec<String>,
    },

    #[error("validation failed: missing required fields {missing:?}; observed columns: {observed:?}")]
    Validation {
        missing: Vec<String>,
        observed: Vec<String>,
    },

    #[error("frame error: {0}")]
    Frame(String),
}
