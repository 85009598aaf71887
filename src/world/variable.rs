//! variable.rs
//! The per-random-variable record stored in a world.

use super::transforms::{self, Transform};
use super::RVIdentifier;
use crate::distributions::Distribution;
use crate::tensor::Tensor;
use indexmap::IndexSet;

/// Proposal cached on a variable by an inference kernel. Cleared whenever the
/// variable's value or distribution changes.
#[derive(Debug, Clone, PartialEq)]
pub struct ProposalDistribution {
    pub distribution: Distribution,
    pub requires_transform: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub distribution: Distribution,
    pub value: Tensor,
    /// `distribution.log_prob(value)`, without the Jacobian.
    pub log_prob: f64,
    pub parent: IndexSet<RVIdentifier>,
    pub children: IndexSet<RVIdentifier>,
    pub proposal_distribution: Option<ProposalDistribution>,
    pub is_discrete: bool,
    pub transforms: Vec<Transform>,
    pub unconstrained_value: Tensor,
    pub jacobian: f64,
}

impl Variable {
    pub fn new(
        distribution: Distribution,
        value: Tensor,
        parent: IndexSet<RVIdentifier>,
        transform_constrained: bool,
    ) -> Self {
        let is_discrete = distribution.is_discrete();
        let transforms = if is_discrete {
            Vec::new()
        } else {
            transforms::default_transforms(distribution.support(), transform_constrained)
        };
        let (unconstrained_value, jacobian) = transforms::unconstrain(&transforms, &value);
        Self {
            log_prob: distribution.log_prob(&value),
            distribution,
            value,
            parent,
            children: IndexSet::new(),
            proposal_distribution: None,
            is_discrete,
            transforms,
            unconstrained_value,
            jacobian,
        }
    }

    pub fn update_value(&mut self, value: Tensor) {
        let (unconstrained_value, jacobian) = transforms::unconstrain(&self.transforms, &value);
        self.log_prob = self.distribution.log_prob(&value);
        self.value = value;
        self.unconstrained_value = unconstrained_value;
        self.jacobian = jacobian;
        self.proposal_distribution = None;
    }

    /// Moves the variable to the constrained image of `unconstrained`.
    pub fn update_unconstrained_value(&mut self, unconstrained: Tensor) {
        let (value, jacobian) = transforms::constrain(&self.transforms, &unconstrained);
        self.log_prob = self.distribution.log_prob(&value);
        self.value = value;
        self.unconstrained_value = unconstrained;
        self.jacobian = jacobian;
        self.proposal_distribution = None;
    }

    /// Re-scores the current value under a re-executed distribution.
    pub fn update_distribution(&mut self, distribution: Distribution) {
        self.log_prob = distribution.log_prob(&self.value);
        self.is_discrete = distribution.is_discrete();
        self.distribution = distribution;
        self.proposal_distribution = None;
    }
}
