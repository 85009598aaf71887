//! Incremental inference state: random variables, their dependency graph and
//! the staged-change protocol used by single-site inference kernels.

pub mod diff;
pub mod identifier;
pub mod transforms;
pub mod variable;
#[allow(clippy::module_inception)]
pub mod world;
pub mod world_vars;

mod error;
#[cfg(test)]
mod tests;

pub use diff::Diff;
pub use error::WorldError;
pub use identifier::{ArgValue, GeneratingFn, RVIdentifier, RandomVariable, Sampler};
pub use transforms::Transform;
pub use variable::{ProposalDistribution, Variable};
pub use world::{ProposalOutcome, World};
pub use world_vars::WorldVars;
