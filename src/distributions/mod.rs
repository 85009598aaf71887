//! Distribution handles used by random-variable generating functions.
//!
//! Parameters are scalars; `log_prob` treats a tensor value as iid draws and
//! sums the elementwise log-density.

mod special;

use crate::tensor::Tensor;
use rand::Rng;
use rand_distr::Distribution as _;
use serde::{Deserialize, Serialize};
use std::f64::consts::{LN_2, PI};

pub use self::error::DistributionError;
mod error {
    use thiserror::Error;

    #[derive(Error, Debug, Clone, PartialEq)]
    pub enum DistributionError {
        #[error("Invalid parameter for {distribution}: {reason}")]
        InvalidParameter { distribution: &'static str, reason: String },
    }
}

/// The set of values a distribution assigns non-zero density to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Support {
    Boolean,
    UnitInterval,
    NonNegativeInteger,
    /// Integers in `0..=n`.
    IntegerInterval(u64),
    Positive,
    Real,
    Interval(f64, f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Distribution {
    Bernoulli { probs: f64 },
    Beta { alpha: f64, beta: f64 },
    Binomial { total_count: u64, probs: f64 },
    Categorical { probs: Vec<f64> },
    HalfCauchy { scale: f64 },
    HalfNormal { scale: f64 },
    Normal { loc: f64, scale: f64 },
    StudentT { df: f64, loc: f64, scale: f64 },
    Uniform { low: f64, high: f64 },
}

impl Distribution {
    pub fn bernoulli(probs: f64) -> Self { Self::Bernoulli { probs } }
    pub fn beta(alpha: f64, beta: f64) -> Self { Self::Beta { alpha, beta } }
    pub fn binomial(total_count: u64, probs: f64) -> Self { Self::Binomial { total_count, probs } }
    pub fn categorical(probs: Vec<f64>) -> Self { Self::Categorical { probs } }
    pub fn half_cauchy(scale: f64) -> Self { Self::HalfCauchy { scale } }
    pub fn half_normal(scale: f64) -> Self { Self::HalfNormal { scale } }
    pub fn normal(loc: f64, scale: f64) -> Self { Self::Normal { loc, scale } }
    pub fn student_t(df: f64, loc: f64, scale: f64) -> Self { Self::StudentT { df, loc, scale } }
    pub fn uniform(low: f64, high: f64) -> Self { Self::Uniform { low, high } }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Bernoulli { .. } => "Bernoulli",
            Self::Beta { .. } => "Beta",
            Self::Binomial { .. } => "Binomial",
            Self::Categorical { .. } => "Categorical",
            Self::HalfCauchy { .. } => "HalfCauchy",
            Self::HalfNormal { .. } => "HalfNormal",
            Self::Normal { .. } => "Normal",
            Self::StudentT { .. } => "StudentT",
            Self::Uniform { .. } => "Uniform",
        }
    }

    pub fn support(&self) -> Support {
        match self {
            Self::Bernoulli { .. } => Support::Boolean,
            Self::Beta { .. } => Support::UnitInterval,
            Self::Binomial { total_count, .. } => Support::IntegerInterval(*total_count),
            Self::Categorical { probs } => Support::IntegerInterval(probs.len().saturating_sub(1) as u64),
            Self::HalfCauchy { .. } | Self::HalfNormal { .. } => Support::Positive,
            Self::Normal { .. } | Self::StudentT { .. } => Support::Real,
            Self::Uniform { low, high } => Support::Interval(*low, *high),
        }
    }

    pub fn is_discrete(&self) -> bool {
        matches!(
            self.support(),
            Support::Boolean | Support::NonNegativeInteger | Support::IntegerInterval(_)
        )
    }

    /// Sum of elementwise log-densities. Values outside the support give `-inf`.
    pub fn log_prob(&self, value: &Tensor) -> f64 {
        value.data().iter().map(|&x| self.log_prob_scalar(x)).sum()
    }

    fn log_prob_scalar(&self, x: f64) -> f64 {
        match self {
            Self::Bernoulli { probs } => {
                if x == 1.0 {
                    probs.ln()
                } else if x == 0.0 {
                    (1.0 - probs).ln()
                } else {
                    f64::NEG_INFINITY
                }
            }
            Self::Beta { alpha, beta } => {
                if x <= 0.0 || x >= 1.0 {
                    return f64::NEG_INFINITY;
                }
                (alpha - 1.0) * x.ln() + (beta - 1.0) * (1.0 - x).ln() - special::ln_beta(*alpha, *beta)
            }
            Self::Binomial { total_count, probs } => {
                let n = *total_count as f64;
                if x < 0.0 || x > n || x.fract() != 0.0 {
                    return f64::NEG_INFINITY;
                }
                special::ln_choose(n, x) + special::xlogy(x, *probs) + special::xlogy(n - x, 1.0 - probs)
            }
            Self::Categorical { probs } => {
                if x < 0.0 || x.fract() != 0.0 {
                    return f64::NEG_INFINITY;
                }
                let total: f64 = probs.iter().sum();
                probs.get(x as usize).map_or(f64::NEG_INFINITY, |p| (p / total).ln())
            }
            Self::HalfCauchy { scale } => {
                if x < 0.0 {
                    return f64::NEG_INFINITY;
                }
                let z = x / scale;
                LN_2 - (PI * scale).ln() - (1.0 + z * z).ln()
            }
            Self::HalfNormal { scale } => {
                if x < 0.0 {
                    return f64::NEG_INFINITY;
                }
                LN_2 + normal_log_density(x, 0.0, *scale)
            }
            Self::Normal { loc, scale } => normal_log_density(x, *loc, *scale),
            Self::StudentT { df, loc, scale } => {
                let z = (x - loc) / scale;
                special::ln_gamma((df + 1.0) / 2.0)
                    - special::ln_gamma(df / 2.0)
                    - 0.5 * (df * PI).ln()
                    - scale.ln()
                    - (df + 1.0) / 2.0 * (1.0 + z * z / df).ln()
            }
            Self::Uniform { low, high } => {
                if x >= *low && x < *high {
                    -(high - low).ln()
                } else {
                    f64::NEG_INFINITY
                }
            }
        }
    }

    /// Draws one scalar value.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Tensor, DistributionError> {
        let name = self.name();
        let x = match self {
            Self::Bernoulli { probs } => {
                let d = rand_distr::Bernoulli::new(*probs).map_err(|e| invalid(name, e))?;
                if d.sample(rng) { 1.0 } else { 0.0 }
            }
            Self::Beta { alpha, beta } => rand_distr::Beta::new(*alpha, *beta).map_err(|e| invalid(name, e))?.sample(rng),
            Self::Binomial { total_count, probs } => {
                rand_distr::Binomial::new(*total_count, *probs).map_err(|e| invalid(name, e))?.sample(rng) as f64
            }
            Self::Categorical { probs } => {
                rand::distributions::WeightedIndex::new(probs).map_err(|e| invalid(name, e))?.sample(rng) as f64
            }
            Self::HalfCauchy { scale } => {
                rand_distr::Cauchy::new(0.0, *scale).map_err(|e| invalid(name, e))?.sample(rng).abs()
            }
            Self::HalfNormal { scale } => {
                check_scale(name, *scale)?;
                rand_distr::Normal::new(0.0, *scale).map_err(|e| invalid(name, e))?.sample(rng).abs()
            }
            Self::Normal { loc, scale } => {
                // rand_distr only rejects a non-finite std_dev
                check_scale(name, *scale)?;
                rand_distr::Normal::new(*loc, *scale).map_err(|e| invalid(name, e))?.sample(rng)
            }
            Self::StudentT { df, loc, scale } => {
                check_scale(name, *scale)?;
                loc + scale * rand_distr::StudentT::new(*df).map_err(|e| invalid(name, e))?.sample(rng)
            }
            Self::Uniform { low, high } => {
                if !(low < high) {
                    return Err(invalid(name, "low must be less than high"));
                }
                rand_distr::Uniform::new(*low, *high).sample(rng)
            }
        };
        Ok(Tensor::scalar(x))
    }
}

fn invalid(distribution: &'static str, reason: impl std::fmt::Display) -> DistributionError {
    DistributionError::InvalidParameter { distribution, reason: reason.to_string() }
}

fn check_scale(distribution: &'static str, scale: f64) -> Result<(), DistributionError> {
    if scale > 0.0 {
        Ok(())
    } else {
        Err(invalid(distribution, "scale must be positive"))
    }
}

fn normal_log_density(x: f64, loc: f64, scale: f64) -> f64 {
    let z = (x - loc) / scale;
    -0.5 * z * z - scale.ln() - 0.5 * (2.0 * PI).ln()
}
