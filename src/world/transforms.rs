//! transforms.rs
//! Bijections from constrained supports onto the real line.

use crate::distributions::Support;
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transform {
    /// `(0, inf) -> R`
    Log,
    /// `(0, 1) -> R`
    Logit,
}

impl Transform {
    /// Constrained value to unconstrained.
    pub fn forward(self, x: f64) -> f64 {
        match self {
            Transform::Log => x.ln(),
            Transform::Logit => (x / (1.0 - x)).ln(),
        }
    }

    pub fn inverse(self, y: f64) -> f64 {
        match self {
            Transform::Log => y.exp(),
            Transform::Logit => 1.0 / (1.0 + (-y).exp()),
        }
    }

    /// `log |dx/dy|` of the inverse, at unconstrained `y`.
    pub fn log_abs_det_jacobian(self, y: f64) -> f64 {
        match self {
            Transform::Log => y,
            Transform::Logit => -softplus(-y) - softplus(y),
        }
    }
}

fn softplus(x: f64) -> f64 {
    // log(1 + e^x) without overflow for large x
    x.max(0.0) + (-x.abs()).exp().ln_1p()
}

/// Transforms applied to a continuous variable with the given support. Only
/// half-bounded positive and unit-interval supports are transformed.
pub fn default_transforms(support: Support, transform_constrained: bool) -> Vec<Transform> {
    if !transform_constrained {
        return Vec::new();
    }
    match support {
        Support::Positive => vec![Transform::Log],
        Support::UnitInterval => vec![Transform::Logit],
        _ => Vec::new(),
    }
}

/// Applies `transforms` in order. Returns the unconstrained value and the
/// summed log-Jacobian of mapping it back.
pub fn unconstrain(transforms: &[Transform], value: &Tensor) -> (Tensor, f64) {
    let mut current = value.clone();
    for t in transforms {
        current = current.map(|x| t.forward(x));
    }
    let jacobian = jacobian_at(transforms, &current);
    (current, jacobian)
}

/// Inverse of `unconstrain`: returns the constrained value and the log-Jacobian.
pub fn constrain(transforms: &[Transform], unconstrained: &Tensor) -> (Tensor, f64) {
    let jacobian = jacobian_at(transforms, unconstrained);
    let mut current = unconstrained.clone();
    for t in transforms.iter().rev() {
        current = current.map(|y| t.inverse(y));
    }
    (current, jacobian)
}

fn jacobian_at(transforms: &[Transform], unconstrained: &Tensor) -> f64 {
    // Every support above carries at most one transform
    match transforms {
        [t] => unconstrained.data().iter().map(|&y| t.log_abs_det_jacobian(y)).sum(),
        _ => 0.0,
    }
}
