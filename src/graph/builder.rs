//! builder.rs
//! Accumulates a `NodeGraph` from model code, one typed helper per node kind.

use super::node::{ConversionKind, DistributionKind, NodeId, NodeKind, OperatorKind};
use super::storage::NodeGraph;
use super::GraphError;
use crate::tensor::Tensor;
use crate::type_system::BmgType;

#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    graph: NodeGraph,
    observations: Vec<NodeId>,
    queries: Vec<NodeId>,
}

impl GraphBuilder {
    pub fn new() -> Self { Self::default() }

    pub fn graph(&self) -> &NodeGraph { &self.graph }
    pub fn graph_mut(&mut self) -> &mut NodeGraph { &mut self.graph }
    pub fn into_graph(self) -> NodeGraph { self.graph }
    pub fn observations(&self) -> &[NodeId] { &self.observations }
    pub fn queries(&self) -> &[NodeId] { &self.queries }

    // --- Constants ---

    /// An untyped constant; its type is inferred from its value.
    pub fn add_constant(&mut self, value: Tensor) -> Result<NodeId, GraphError> {
        self.graph.add_node(NodeKind::Constant { value, declared: None }, &[])
    }

    pub fn add_typed_constant(&mut self, value: Tensor, declared: BmgType) -> Result<NodeId, GraphError> {
        self.graph.add_node(NodeKind::Constant { value, declared: Some(declared) }, &[])
    }

    pub fn add_boolean(&mut self, value: bool) -> Result<NodeId, GraphError> {
        self.add_typed_constant(Tensor::scalar(if value { 1.0 } else { 0.0 }), BmgType::Bool)
    }

    pub fn add_probability(&mut self, value: f64) -> Result<NodeId, GraphError> {
        self.add_typed_constant(Tensor::scalar(value), BmgType::Probability)
    }

    pub fn add_natural(&mut self, value: u64) -> Result<NodeId, GraphError> {
        self.add_typed_constant(Tensor::scalar(value as f64), BmgType::Natural)
    }

    pub fn add_positive_real(&mut self, value: f64) -> Result<NodeId, GraphError> {
        self.add_typed_constant(Tensor::scalar(value), BmgType::PositiveReal)
    }

    pub fn add_real(&mut self, value: f64) -> Result<NodeId, GraphError> {
        self.add_typed_constant(Tensor::scalar(value), BmgType::Real)
    }

    pub fn add_tensor(&mut self, value: Tensor) -> Result<NodeId, GraphError> {
        self.add_typed_constant(value, BmgType::Tensor)
    }

    // --- Distributions and samples ---

    pub fn add_distribution(&mut self, kind: DistributionKind, params: &[NodeId]) -> Result<NodeId, GraphError> {
        self.graph.add_node(NodeKind::Distribution(kind), params)
    }

    pub fn add_bernoulli(&mut self, probability: NodeId) -> Result<NodeId, GraphError> {
        self.add_distribution(DistributionKind::Bernoulli, &[probability])
    }

    pub fn add_beta(&mut self, alpha: NodeId, beta: NodeId) -> Result<NodeId, GraphError> {
        self.add_distribution(DistributionKind::Beta, &[alpha, beta])
    }

    pub fn add_binomial(&mut self, count: NodeId, probability: NodeId) -> Result<NodeId, GraphError> {
        self.add_distribution(DistributionKind::Binomial, &[count, probability])
    }

    pub fn add_half_cauchy(&mut self, scale: NodeId) -> Result<NodeId, GraphError> {
        self.add_distribution(DistributionKind::HalfCauchy, &[scale])
    }

    pub fn add_normal(&mut self, mu: NodeId, sigma: NodeId) -> Result<NodeId, GraphError> {
        self.add_distribution(DistributionKind::Normal, &[mu, sigma])
    }

    pub fn add_student_t(&mut self, df: NodeId, loc: NodeId, scale: NodeId) -> Result<NodeId, GraphError> {
        self.add_distribution(DistributionKind::StudentT, &[df, loc, scale])
    }

    /// Every call creates a fresh sample, even from the same distribution.
    pub fn add_sample(&mut self, distribution: NodeId) -> Result<NodeId, GraphError> {
        self.graph.add_node(NodeKind::Sample, &[distribution])
    }

    // --- Operators ---

    pub fn add_addition(&mut self, operands: &[NodeId]) -> Result<NodeId, GraphError> {
        self.graph.add_node(NodeKind::Operator(OperatorKind::Addition), operands)
    }

    pub fn add_multiplication(&mut self, operands: &[NodeId]) -> Result<NodeId, GraphError> {
        self.graph.add_node(NodeKind::Operator(OperatorKind::Multiplication), operands)
    }

    pub fn add_negate(&mut self, operand: NodeId) -> Result<NodeId, GraphError> {
        self.graph.add_node(NodeKind::Operator(OperatorKind::Negate), &[operand])
    }

    pub fn add_exp(&mut self, operand: NodeId) -> Result<NodeId, GraphError> {
        self.graph.add_node(NodeKind::Operator(OperatorKind::Exp), &[operand])
    }

    pub fn add_if_then_else(&mut self, condition: NodeId, consequence: NodeId, alternative: NodeId) -> Result<NodeId, GraphError> {
        self.graph.add_node(NodeKind::Operator(OperatorKind::IfThenElse), &[condition, consequence, alternative])
    }

    pub fn add_conversion(&mut self, kind: ConversionKind, operand: NodeId) -> Result<NodeId, GraphError> {
        self.graph.add_node(NodeKind::Conversion(kind), &[operand])
    }

    // --- Outputs ---

    pub fn add_observation(&mut self, sample: NodeId, value: Tensor) -> Result<NodeId, GraphError> {
        let id = self.graph.add_node(NodeKind::Observation { value }, &[sample])?;
        self.observations.push(id);
        Ok(id)
    }

    pub fn add_query(&mut self, operand: NodeId) -> Result<NodeId, GraphError> {
        let id = self.graph.add_node(NodeKind::Query, &[operand])?;
        self.queries.push(id);
        Ok(id)
    }
}
