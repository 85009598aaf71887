//! Core of a probabilistic-programming compiler and inference runtime.
//!
//! - `type_system` and `graph`: the BMG type lattice, a typed model graph and
//!   the requirement solver that inserts conversions into it.
//! - `world`: incremental single-site inference state with a diff, accept and
//!   reject protocol.

pub mod config;
pub mod distributions;
pub mod graph;
pub mod tensor;
pub mod type_system;
pub mod world;

pub use config::{ConfigError, WorldConfig};
pub use graph::{GraphBuilder, GraphError, NodeGraph, NodeId};
pub use tensor::{SetOfTensors, Tensor, TensorError};
pub use type_system::{BmgType, Requirement, RequirementSolver, TypeError};
pub use world::{ProposalOutcome, RVIdentifier, RandomVariable, World, WorldError};
