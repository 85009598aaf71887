//! The static type engine for the model graph.
//!
//! This module provides the BMG type lattice, the inference rules that give
//! every node its infimum type, and the `RequirementSolver`, which inserts
//! conversion nodes wherever an input's type does not match what its consumer
//! requires.

// Publicly export the primary components for use by other modules.
pub use self::checker::{RequirementSolver, SolveReport};
pub use self::error::TypeError;
pub use self::lattice::{classify, upper_bound, BmgType, Requirement};
pub use self::rules::requirements::Requirements;

// --- MODULE DECLARATIONS ---
mod checker;
mod error;
pub mod lattice;
pub(crate) mod rules {
    pub mod operators;
    pub mod requirements;
}
