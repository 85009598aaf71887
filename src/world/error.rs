//! Defines the error types for the world module.
use super::RVIdentifier;
use crate::distributions::DistributionError;
use crate::tensor::TensorError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorldError {
    #[error("Node {node} is missing from the world")]
    NotFound { node: RVIdentifier },
    #[error("Inconsistent variable: {reason}")]
    InconsistentVariable { reason: String },
    #[error("Node {node} is marked for delete and cannot take a new value")]
    MarkedForDelete { node: RVIdentifier },
    #[error("Node {node} is observed and cannot take a new value")]
    ObservedNode { node: RVIdentifier },
    #[error("Node {node} is not observed")]
    NotObserved { node: RVIdentifier },
    #[error("Node {node} depends on itself")]
    CyclicDependency { node: RVIdentifier },
    #[error("Generating {node} exceeded the maximum call depth of {depth}")]
    RecursionLimit { node: RVIdentifier, depth: usize },
    #[error("Model error in {node}: {message}")]
    Model { node: RVIdentifier, message: String },
    #[error(transparent)]
    Distribution(#[from] DistributionError),
    #[error(transparent)]
    Tensor(#[from] TensorError),
}
