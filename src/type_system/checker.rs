//! The requirement solver: walks the graph and rewires every edge whose input
//! does not meet its consumer's requirement.
use super::error::TypeError;
use super::lattice::Requirement;
use crate::graph::{ConversionKind, GraphError, NodeGraph, NodeId, NodeKind};

/// What a solve pass added to the graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolveReport {
    pub conversions_inserted: usize,
    pub constants_materialized: usize,
}

impl SolveReport {
    pub fn is_noop(&self) -> bool { self.conversions_inserted == 0 && self.constants_materialized == 0 }
}

pub struct RequirementSolver<'a> {
    graph: &'a mut NodeGraph,
    report: SolveReport,
}

impl<'a> RequirementSolver<'a> {
    pub fn new(graph: &'a mut NodeGraph) -> Self {
        Self { graph, report: SolveReport::default() }
    }

    /// Visits nodes inputs-first and meets every requirement, stopping at the
    /// first edge that cannot be met.
    pub fn solve(mut self) -> Result<SolveReport, GraphError> {
        let order = self.graph.topological_order()?;
        for node_id in order {
            self.solve_node(node_id)?;
        }
        Ok(self.report)
    }

    /// 1. Computes the node's requirements from its inputs as they stand.
    /// 2. Meets each one, possibly through a new conversion or typed constant.
    /// 3. Rewires the edge, which refreshes the node's cached infimum.
    fn solve_node(&mut self, node_id: NodeId) -> Result<(), GraphError> {
        let requirements = self.graph.requirements(node_id);
        let inputs = self.graph.inputs(node_id).to_vec();

        for (slot, (input, requirement)) in inputs.into_iter().zip(requirements).enumerate() {
            if let Some(replacement) = self.meet(node_id, slot, input, requirement)? {
                self.graph.replace_input(node_id, slot, replacement)?;
            }
        }
        Ok(())
    }

    fn meet(&mut self, consumer: NodeId, slot: usize, input: NodeId, requirement: Requirement) -> Result<Option<NodeId>, GraphError> {
        let inf = self.graph.inf_type(input);
        let node_type = self.graph.node_type(input);
        if requirement.is_satisfied_by(node_type, inf) {
            return Ok(None);
        }

        let target = requirement.target();
        if matches!(requirement, Requirement::UpperBound(_)) || !inf.is_subtype_of(target) {
            return Err(TypeError::Unsatisfiable { consumer, slot, found: inf, required: requirement }.into());
        }

        let before = self.graph.count();

        // A literal is re-emitted with the required type instead of converted.
        if let NodeKind::Constant { value, .. } = self.graph.kind(input) {
            let value = value.clone();
            let id = self.graph.add_node(NodeKind::Constant { value, declared: Some(target) }, &[])?;
            if self.graph.count() > before {
                self.report.constants_materialized += 1;
            }
            return Ok(Some(id));
        }

        let conversion = ConversionKind::reaching(target).ok_or(TypeError::NoConversion { consumer, slot, target })?;
        let id = self.graph.add_node(NodeKind::Conversion(conversion), &[input])?;
        if self.graph.count() > before {
            self.report.conversions_inserted += 1;
            log::debug!(
                "Inserted {} on node {} for input {} of node {}",
                conversion.label(),
                input.0,
                slot,
                consumer.0
            );
        }
        Ok(Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ConversionKind, GraphBuilder};
    use crate::tensor::Tensor;
    use crate::type_system::BmgType;

    fn solve(b: &mut GraphBuilder) -> Result<SolveReport, GraphError> { RequirementSolver::new(b.graph_mut()).solve() }

    #[test]
    fn test_untyped_constants_become_typed() {
        let mut b = GraphBuilder::new();
        let zero = b.add_constant(Tensor::scalar(0.0)).unwrap();
        let one = b.add_constant(Tensor::scalar(1.0)).unwrap();
        let normal = b.add_normal(zero, one).unwrap();

        let report = solve(&mut b).unwrap();
        assert_eq!(report, SolveReport { conversions_inserted: 0, constants_materialized: 2 });

        let g = b.graph();
        let [mu, sigma] = [g.inputs(normal)[0], g.inputs(normal)[1]];
        assert_eq!(g.node_type(mu), BmgType::Real);
        assert_eq!(g.node_type(sigma), BmgType::PositiveReal);
        assert_eq!(g.kind(mu), &NodeKind::Constant { value: Tensor::scalar(0.0), declared: Some(BmgType::Real) });
    }

    #[test]
    fn test_sample_feeding_wider_slot_gets_one_shared_conversion() {
        let mut b = GraphBuilder::new();
        let scale = b.add_positive_real(1.0).unwrap();
        let hc = b.add_half_cauchy(scale).unwrap();
        let s = b.add_sample(hc).unwrap();
        // The same sample needs Real twice: as a mean, and as a StudentT location.
        let normal = b.add_normal(s, scale).unwrap();
        let t = b.add_student_t(scale, s, scale).unwrap();

        let report = solve(&mut b).unwrap();
        assert_eq!(report.conversions_inserted, 1);

        let g = b.graph();
        let converted = g.inputs(normal)[0];
        assert_eq!(g.kind(converted), &NodeKind::Conversion(ConversionKind::ToReal));
        assert_eq!(g.inputs(converted), &[s]);
        assert_eq!(g.inputs(t)[1], converted);
        // Slots already of the right type stay put
        assert_eq!(g.inputs(normal)[1], scale);
    }

    #[test]
    fn test_addition_promotes_both_operands() {
        let mut b = GraphBuilder::new();
        let half = b.add_probability(0.5).unwrap();
        let bern = b.add_bernoulli(half).unwrap();
        let flip = b.add_sample(bern).unwrap();
        let three = b.add_natural(3).unwrap();
        let bino = b.add_binomial(three, half).unwrap();
        let count = b.add_sample(bino).unwrap();
        let sum = b.add_addition(&[flip, count]).unwrap();
        b.add_query(sum).unwrap();

        let report = solve(&mut b).unwrap();
        assert_eq!(report.conversions_inserted, 2);

        let g = b.graph();
        for &input in g.inputs(sum) {
            assert_eq!(g.kind(input), &NodeKind::Conversion(ConversionKind::ToPositiveReal));
            assert_eq!(g.node_type(input), BmgType::PositiveReal);
        }
        assert_eq!(g.inf_type(sum), BmgType::PositiveReal);
    }

    #[test]
    fn test_solving_twice_changes_nothing() {
        let mut b = GraphBuilder::new();
        let zero = b.add_constant(Tensor::scalar(0.0)).unwrap();
        let one = b.add_constant(Tensor::scalar(1.0)).unwrap();
        let normal = b.add_normal(zero, one).unwrap();
        let x = b.add_sample(normal).unwrap();
        let scale = b.add_positive_real(2.0).unwrap();
        let hc = b.add_half_cauchy(scale).unwrap();
        let y = b.add_sample(hc).unwrap();
        let product = b.add_multiplication(&[x, y]).unwrap();
        let e = b.add_exp(product).unwrap();
        b.add_query(e).unwrap();

        let first = solve(&mut b).unwrap();
        assert!(!first.is_noop());
        let snapshot = b.graph().to_json().unwrap();

        let second = solve(&mut b).unwrap();
        assert!(second.is_noop());
        assert_eq!(b.graph().to_json().unwrap(), snapshot);
    }

    #[test]
    fn test_tensor_cannot_narrow_to_real() {
        let mut b = GraphBuilder::new();
        let t = b.add_constant(Tensor::vector(vec![1.0, 2.0])).unwrap();
        let one = b.add_positive_real(1.0).unwrap();
        let normal = b.add_normal(t, one).unwrap();

        let err = solve(&mut b).unwrap_err();
        assert!(matches!(
            err,
            GraphError::Type(TypeError::Unsatisfiable { consumer, slot: 0, found: BmgType::Tensor, .. }) if consumer == normal
        ));
    }

    #[test]
    fn test_no_conversion_reaches_probability() {
        let mut b = GraphBuilder::new();
        let half = b.add_probability(0.5).unwrap();
        let bern = b.add_bernoulli(half).unwrap();
        let flip = b.add_sample(bern).unwrap();
        // A Bernoulli whose probability is another coin flip
        let nested = b.add_bernoulli(flip).unwrap();

        let err = solve(&mut b).unwrap_err();
        assert!(matches!(
            err,
            GraphError::Type(TypeError::NoConversion { consumer, target: BmgType::Probability, .. }) if consumer == nested
        ));
    }
}
