//! Defines the node kinds of the typed model graph.

use crate::tensor::Tensor;
use crate::type_system::BmgType;
use serde::{Deserialize, Serialize};

/// A unique, stable identifier for a node, assigned in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline(always)]
    pub fn index(&self) -> usize { self.0 as usize }
    pub fn new(idx: usize) -> Self { Self(idx as u32) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistributionKind {
    Bernoulli,
    Beta,
    Binomial,
    HalfCauchy,
    Normal,
    StudentT,
}

impl DistributionKind {
    /// Parameter types in slot order; these are also the edge requirements.
    pub fn parameter_types(self) -> &'static [BmgType] {
        use BmgType::{Natural, PositiveReal, Probability, Real};
        match self {
            DistributionKind::Bernoulli => &[Probability],
            DistributionKind::Beta => &[PositiveReal, PositiveReal],
            DistributionKind::Binomial => &[Natural, Probability],
            DistributionKind::HalfCauchy => &[PositiveReal],
            DistributionKind::Normal => &[Real, PositiveReal],
            DistributionKind::StudentT => &[PositiveReal, Real, PositiveReal],
        }
    }

    pub fn arity(self) -> usize { self.parameter_types().len() }

    /// Type of the values a sample from this distribution takes.
    pub fn support_type(self) -> BmgType {
        match self {
            DistributionKind::Bernoulli => BmgType::Bool,
            DistributionKind::Beta => BmgType::Probability,
            DistributionKind::Binomial => BmgType::Natural,
            DistributionKind::HalfCauchy => BmgType::PositiveReal,
            DistributionKind::Normal | DistributionKind::StudentT => BmgType::Real,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DistributionKind::Bernoulli => "Bernoulli",
            DistributionKind::Beta => "Beta",
            DistributionKind::Binomial => "Binomial",
            DistributionKind::HalfCauchy => "HalfCauchy",
            DistributionKind::Normal => "Normal",
            DistributionKind::StudentT => "StudentT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatorKind {
    /// n-ary, at least two operands.
    Addition,
    /// n-ary, at least two operands.
    Multiplication,
    Negate,
    Exp,
    /// `[condition, consequence, alternative]`
    IfThenElse,
}

impl OperatorKind {
    pub fn label(self) -> &'static str {
        match self {
            OperatorKind::Addition => "+",
            OperatorKind::Multiplication => "*",
            OperatorKind::Negate => "-",
            OperatorKind::Exp => "Exp",
            OperatorKind::IfThenElse => "if",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConversionKind {
    ToReal,
    ToPositiveReal,
    ToTensor,
}

impl ConversionKind {
    pub fn target(self) -> BmgType {
        match self {
            ConversionKind::ToReal => BmgType::Real,
            ConversionKind::ToPositiveReal => BmgType::PositiveReal,
            ConversionKind::ToTensor => BmgType::Tensor,
        }
    }

    /// The conversion producing exactly `target`, if one exists.
    pub fn reaching(target: BmgType) -> Option<ConversionKind> {
        match target {
            BmgType::Real => Some(ConversionKind::ToReal),
            BmgType::PositiveReal => Some(ConversionKind::ToPositiveReal),
            BmgType::Tensor => Some(ConversionKind::ToTensor),
            _ => None,
        }
    }

    /// A conversion may only widen: the source infimum must be at most the target.
    pub fn accepts(self, source: BmgType) -> bool { source.is_subtype_of(self.target()) }

    pub fn label(self) -> &'static str {
        match self {
            ConversionKind::ToReal => "ToReal",
            ConversionKind::ToPositiveReal => "ToPosReal",
            ConversionKind::ToTensor => "ToTensor",
        }
    }
}

/// The primary enum representing a node in the model graph.
///
/// A node defines structure only; inputs are held by the owning `NodeGraph`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    /// A literal. `declared` is `None` for an untyped constant.
    Constant { value: Tensor, declared: Option<BmgType> },
    Distribution(DistributionKind),
    /// Draws from its single distribution input.
    Sample,
    Operator(OperatorKind),
    Conversion(ConversionKind),
    /// Pins a sample to an observed value.
    Observation { value: Tensor },
    /// Marks a value node as a graph output.
    Query,
}

impl NodeKind {
    pub fn is_distribution(&self) -> bool { matches!(self, NodeKind::Distribution(_)) }

    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Constant { .. } => "Constant",
            NodeKind::Distribution(d) => d.name(),
            NodeKind::Sample => "Sample",
            NodeKind::Operator(op) => op.label(),
            NodeKind::Conversion(c) => c.label(),
            NodeKind::Observation { .. } => "Observation",
            NodeKind::Query => "Query",
        }
    }

    /// Display label as used by graph exporters.
    pub fn label(&self) -> String {
        match self {
            NodeKind::Constant { value, declared: None } => value.to_string(),
            NodeKind::Constant { value, declared: Some(t) } => format!("{}:{}", value, t.short_name()),
            NodeKind::Observation { value } => format!("Observation {}", value),
            other => other.name().to_string(),
        }
    }
}
