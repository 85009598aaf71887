//! Per-edge requirements a node places on its inputs.
//!
//! Requirements depend on the node's own kind and on its inputs' infimum
//! types, never on the node's own infimum.
use super::operators;
use crate::graph::{NodeKind, OperatorKind};
use crate::type_system::lattice::{upper_bound, BmgType, Requirement};
use smallvec::SmallVec;

pub type Requirements = SmallVec<[Requirement; 3]>;

pub(crate) fn requirements(kind: &NodeKind, inputs: &[BmgType]) -> Requirements {
    match kind {
        NodeKind::Constant { .. } => SmallVec::new(),
        NodeKind::Distribution(d) => d.parameter_types().iter().map(|&t| Requirement::Exact(t)).collect(),
        // Structural pass-through: always met by the input itself
        NodeKind::Sample | NodeKind::Observation { .. } | NodeKind::Query => {
            inputs.iter().map(|&t| Requirement::Exact(t)).collect()
        }
        NodeKind::Operator(OperatorKind::IfThenElse) => {
            let branch = operators::operand_type(OperatorKind::IfThenElse, inputs);
            let mut reqs: Requirements = SmallVec::new();
            reqs.push(Requirement::Exact(BmgType::Bool));
            reqs.extend(inputs.iter().skip(1).map(|_| Requirement::Exact(branch)));
            reqs
        }
        NodeKind::Operator(op) => {
            let target = operators::operand_type(*op, inputs);
            inputs.iter().map(|_| Requirement::Exact(target)).collect()
        }
        NodeKind::Conversion(c) => inputs.iter().map(|_| upper_bound(c.target())).collect(),
    }
}
