//! Defines the core data structures for the typed model graph.
pub mod builder;
pub mod dag;
pub mod node;
pub mod storage;

// Re-export key types for convenient access
pub use builder::GraphBuilder;
pub use dag::ExportGraph;
pub use node::{ConversionKind, DistributionKind, NodeId, NodeKind, OperatorKind};
pub use storage::NodeGraph;

pub use self::error::GraphError;
mod error {
    use super::NodeId;
    use crate::type_system::{BmgType, TypeError};
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum GraphError {
        #[error("Node {node:?} does not exist")]
        UnknownNode { node: NodeId },
        #[error("{kind} expects {expected} inputs, got {actual}")]
        ArityMismatch { kind: &'static str, expected: String, actual: usize },
        #[error("Input {slot} of {kind} must be {expected}, found {found}")]
        InvalidInput { kind: &'static str, slot: usize, expected: &'static str, found: &'static str },
        #[error("Observed value {value} is not a valid {support}")]
        InvalidObservation { value: String, support: BmgType },
        #[error("Stored graph is inconsistent: {reason}")]
        CorruptStore { reason: String },
        #[error("Cycle detected in graph")]
        CycleDetected,
        #[error(transparent)]
        Type(#[from] TypeError),
        #[error("Serialization error: {0}")]
        Serialization(#[from] serde_json::Error),
    }
}
