//! lattice.rs
//! The BMG type lattice and the per-edge requirement vocabulary.
//!
//! ```text
//!                 Tensor
//!                   |
//!                  Real
//!                   |
//!              PositiveReal
//!               /        \
//!        Probability    Natural
//!               \        /
//!                  Bool
//! ```

use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BmgType {
    Bool,
    Probability,
    Natural,
    PositiveReal,
    Real,
    Tensor,
}

impl BmgType {
    /// Every type, listed in a linear extension of the lattice order.
    pub const ALL: [BmgType; 6] = [
        BmgType::Bool,
        BmgType::Probability,
        BmgType::Natural,
        BmgType::PositiveReal,
        BmgType::Real,
        BmgType::Tensor,
    ];

    /// Reflexive lattice order: `self ≤ other`.
    pub fn is_subtype_of(self, other: BmgType) -> bool {
        match (self, other) {
            (a, b) if a == b => true,
            (_, Self::Tensor) => true,
            (Self::Tensor, _) => false,
            (_, Self::Real) => true,
            (Self::Real, _) => false,
            (_, Self::PositiveReal) => true,
            (Self::PositiveReal, _) => false,
            (Self::Bool, _) => true,
            // Probability and Natural are incomparable
            _ => false,
        }
    }

    /// Least upper bound.
    pub fn join(self, other: BmgType) -> BmgType {
        // The first upper bound in a linear extension is the least one.
        Self::ALL
            .into_iter()
            .find(|t| self.is_subtype_of(*t) && other.is_subtype_of(*t))
            .unwrap_or(BmgType::Tensor)
    }

    pub fn supremum(types: impl IntoIterator<Item = BmgType>) -> Option<BmgType> {
        types.into_iter().reduce(BmgType::join)
    }

    /// Whether a constant with this value may be emitted with this type.
    pub fn can_represent(self, value: &Tensor) -> bool { classify(value).is_subtype_of(self) }

    pub fn short_name(self) -> &'static str {
        match self {
            BmgType::Bool => "B",
            BmgType::Probability => "P",
            BmgType::Natural => "N",
            BmgType::PositiveReal => "R+",
            BmgType::Real => "R",
            BmgType::Tensor => "T",
        }
    }
}

impl PartialOrd for BmgType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.is_subtype_of(*other), other.is_subtype_of(*self)) {
            (true, true) => Some(Ordering::Equal),
            (true, false) => Some(Ordering::Less),
            (false, true) => Some(Ordering::Greater),
            (false, false) => None,
        }
    }
}

impl fmt::Display for BmgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BmgType::Bool => "bool",
            BmgType::Probability => "probability",
            BmgType::Natural => "natural",
            BmgType::PositiveReal => "positive real",
            BmgType::Real => "real",
            BmgType::Tensor => "tensor",
        };
        f.write_str(name)
    }
}

/// What a consumer demands of one input edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Requirement {
    /// The input must carry exactly this type.
    Exact(BmgType),
    /// Any input whose infimum is at most this type is acceptable.
    UpperBound(BmgType),
}

pub fn upper_bound(t: BmgType) -> Requirement { Requirement::UpperBound(t) }

impl Requirement {
    pub fn target(self) -> BmgType {
        match self {
            Requirement::Exact(t) | Requirement::UpperBound(t) => t,
        }
    }

    pub fn is_satisfied_by(self, node_type: BmgType, inf_type: BmgType) -> bool {
        match self {
            Requirement::Exact(t) => node_type == t,
            Requirement::UpperBound(t) => inf_type.is_subtype_of(t),
        }
    }
}

impl From<BmgType> for Requirement {
    fn from(t: BmgType) -> Self { Requirement::Exact(t) }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Exact(t) => write!(f, "{}", t),
            Requirement::UpperBound(t) => write!(f, "<={}", t),
        }
    }
}

/// The smallest type able to hold a constant value.
pub fn classify(value: &Tensor) -> BmgType {
    let x = match value.data() {
        [x] => *x,
        _ => return BmgType::Tensor,
    };
    if x == 0.0 || x == 1.0 {
        BmgType::Bool
    } else if (0.0..=1.0).contains(&x) {
        BmgType::Probability
    } else if x >= 0.0 && x.fract() == 0.0 {
        BmgType::Natural
    } else if x >= 0.0 {
        BmgType::PositiveReal
    } else {
        // Negative values and NaN
        BmgType::Real
    }
}
