//! Infimum-type rules: the smallest type each node kind can produce, given
//! the infimum types of its inputs.
use crate::graph::{NodeKind, OperatorKind};
use crate::type_system::lattice::{classify, BmgType};

/// Result type of a product whose operands join to `join`.
pub(crate) fn multiplication(join: BmgType) -> BmgType {
    match join {
        BmgType::Bool | BmgType::Probability => BmgType::Probability,
        BmgType::Natural | BmgType::PositiveReal => BmgType::PositiveReal,
        BmgType::Real => BmgType::Real,
        BmgType::Tensor => BmgType::Tensor,
    }
}

/// Result type of a sum whose operands join to `join`.
/// Sums of probabilities may exceed one, so everything non-negative widens to PositiveReal.
pub(crate) fn addition(join: BmgType) -> BmgType {
    match join {
        BmgType::Real => BmgType::Real,
        BmgType::Tensor => BmgType::Tensor,
        _ => BmgType::PositiveReal,
    }
}

pub(crate) fn negate(input: BmgType) -> BmgType {
    match input {
        BmgType::Tensor => BmgType::Tensor,
        _ => BmgType::Real,
    }
}

pub(crate) fn exp(input: BmgType) -> BmgType {
    match input {
        BmgType::Tensor => BmgType::Tensor,
        BmgType::Real => BmgType::Real,
        _ => BmgType::PositiveReal,
    }
}

/// The type operands of `op` are promoted to, ignoring any IfThenElse condition.
pub(crate) fn operand_type(op: OperatorKind, inputs: &[BmgType]) -> BmgType {
    let join_of = |ts: &[BmgType]| BmgType::supremum(ts.iter().copied()).unwrap_or(BmgType::Tensor);
    match op {
        OperatorKind::Multiplication => multiplication(join_of(inputs)),
        OperatorKind::Addition => addition(join_of(inputs)),
        OperatorKind::Negate => negate(join_of(inputs)),
        OperatorKind::Exp => exp(join_of(inputs)),
        OperatorKind::IfThenElse => join_of(inputs.get(1..).unwrap_or(&[])),
    }
}

/// Infimum type of a node.
pub(crate) fn infimum(kind: &NodeKind, inputs: &[BmgType]) -> BmgType {
    match kind {
        NodeKind::Constant { value, .. } => classify(value),
        NodeKind::Distribution(d) => d.support_type(),
        NodeKind::Sample | NodeKind::Observation { .. } | NodeKind::Query => {
            inputs.first().copied().unwrap_or(BmgType::Tensor)
        }
        NodeKind::Operator(op) => operand_type(*op, inputs),
        NodeKind::Conversion(c) => c.target(),
    }
}
