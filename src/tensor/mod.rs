//! Minimal dense tensor used for constant payloads, random-variable values and
//! dedup keys.
pub mod set;
pub mod value;

pub use set::{SetOfTensors, TensorKey};
pub use value::Tensor;

pub use self::error::TensorError;
mod error {
    use thiserror::Error;

    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum TensorError {
        #[error("Shape {shape:?} does not hold {len} elements")]
        InvalidShape { shape: Vec<usize>, len: usize },
        #[error("Rows of a matrix must have equal length")]
        RaggedRows,
        #[error("Shape mismatch: {lhs:?} vs {rhs:?}")]
        ShapeMismatch { lhs: Vec<usize>, rhs: Vec<usize> },
        #[error("Expected a single element, found {numel}")]
        NotAScalar { numel: usize },
    }
}
