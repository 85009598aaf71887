//! storage.rs
//! Dense columnar node store: kinds, CSR inputs, consumer lists and a cached
//! infimum type per node.

use super::node::{ConversionKind, DistributionKind, NodeId, NodeKind, OperatorKind};
use super::GraphError;
use crate::tensor::TensorKey;
use crate::type_system::rules::{operators, requirements};
use crate::type_system::{BmgType, Requirements, TypeError};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::{HashMap, VecDeque};

type Inputs = SmallVec<[NodeId; 3]>;

/// Identity of a deterministic node, used to share structurally equal nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum NodeKey {
    Constant(Option<BmgType>, TensorKey),
    Distribution(DistributionKind, Inputs),
    Operator(OperatorKind, Inputs),
    Conversion(ConversionKind, NodeId),
}

impl NodeKey {
    fn of(kind: &NodeKind, inputs: &[NodeId]) -> Option<Self> {
        let inputs: Inputs = inputs.iter().copied().collect();
        match kind {
            NodeKind::Constant { value, declared } => Some(NodeKey::Constant(*declared, TensorKey::of(value))),
            NodeKind::Distribution(d) => Some(NodeKey::Distribution(*d, inputs)),
            NodeKind::Operator(op) => Some(NodeKey::Operator(*op, inputs)),
            NodeKind::Conversion(c) => inputs.first().map(|&i| NodeKey::Conversion(*c, i)),
            NodeKind::Sample | NodeKind::Observation { .. } | NodeKind::Query => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeGraph {
    pub(crate) kinds: Vec<NodeKind>,

    // Dense Topology
    pub(crate) inputs_flat: Vec<NodeId>,
    pub(crate) inputs_ranges: Vec<(u32, u32)>,

    pub(crate) inf_types: Vec<BmgType>,

    // Ephemeral lookup state (Not serialized, rebuilt on load)
    #[serde(skip)]
    consumers: Vec<SmallVec<[NodeId; 4]>>,
    #[serde(skip)]
    index: HashMap<NodeKey, NodeId>,
}

impl NodeGraph {
    pub fn new() -> Self { Self::default() }
    pub fn count(&self) -> usize { self.kinds.len() }
    pub fn is_empty(&self) -> bool { self.kinds.is_empty() }
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> { (0..self.count()).map(NodeId::new) }

    pub fn to_json(&self) -> Result<String, GraphError> { Ok(serde_json::to_string(self)?) }

    pub fn from_json(json: &str) -> Result<Self, GraphError> {
        let mut graph: NodeGraph = serde_json::from_str(json)?;
        graph.rebuild_caches()?;
        Ok(graph)
    }

    /// Checks the stored columns and rebuilds consumer lists, the dedup index
    /// and the infimum types after deserialization. Serialized infima are
    /// never trusted. On error the graph is left unchanged.
    pub fn rebuild_caches(&mut self) -> Result<(), GraphError> {
        let count = self.count();
        if self.inputs_ranges.len() != count || self.inf_types.len() != count {
            return Err(GraphError::CorruptStore {
                reason: format!(
                    "{} kinds, {} input ranges and {} types",
                    count,
                    self.inputs_ranges.len(),
                    self.inf_types.len()
                ),
            });
        }

        let mut consumers = vec![SmallVec::<[NodeId; 4]>::new(); count];
        let mut index = HashMap::new();
        let mut inf_types = Vec::with_capacity(count);
        for (i, &(start, len)) in self.inputs_ranges.iter().enumerate() {
            let id = NodeId::new(i);
            let range = start as usize..start as usize + len as usize;

            // 1. Range and creation order of the inputs
            let inputs: Inputs = match self.inputs_flat.get(range) {
                Some(slice) => slice.iter().copied().collect(),
                None => {
                    return Err(GraphError::CorruptStore {
                        reason: format!("inputs of node {} lie outside the input column", i),
                    })
                }
            };
            if let Some(late) = inputs.iter().find(|input| input.index() >= i) {
                return Err(GraphError::CorruptStore {
                    reason: format!("node {} reads node {}, which is not created before it", i, late.0),
                });
            }

            // 2. Same checks as add_node, against the types recomputed so far
            let kind = &self.kinds[i];
            self.validate_against(kind, &inputs, &inf_types)?;
            let input_types: SmallVec<[BmgType; 3]> = inputs.iter().map(|&n| inf_types[n.index()]).collect();
            inf_types.push(operators::infimum(kind, &input_types));

            // 3. Lookups
            for &input in &inputs {
                consumers[input.index()].push(id);
            }
            if let Some(key) = NodeKey::of(kind, &inputs) {
                index.entry(key).or_insert(id);
            }
        }

        self.consumers = consumers;
        self.index = index;
        self.inf_types = inf_types;
        Ok(())
    }

    /// Adds a node, returning the existing id when an identical deterministic
    /// node is already present.
    pub fn add_node(&mut self, kind: NodeKind, inputs: &[NodeId]) -> Result<NodeId, GraphError> {
        self.validate(&kind, inputs)?;

        let key = NodeKey::of(&kind, inputs);
        if let Some(existing) = key.as_ref().and_then(|k| self.index.get(k)) {
            return Ok(*existing);
        }

        let input_types: SmallVec<[BmgType; 3]> = inputs.iter().map(|&i| self.inf_type(i)).collect();
        let inf = operators::infimum(&kind, &input_types);
        let id = NodeId::new(self.count());
        log::trace!("Adding node {} ({}) with inputs {:?}", id.0, kind.label(), inputs);

        // 1. Inputs (CSR append)
        let start = self.inputs_flat.len() as u32;
        self.inputs_flat.extend_from_slice(inputs);
        self.inputs_ranges.push((start, inputs.len() as u32));

        // 2. Consumers
        for &input in inputs {
            self.consumers[input.index()].push(id);
        }
        self.consumers.push(SmallVec::new());

        // 3. Kind, type and dedup entry
        self.kinds.push(kind);
        self.inf_types.push(inf);
        if let Some(key) = key {
            self.index.insert(key, id);
        }

        Ok(id)
    }

    fn validate(&self, kind: &NodeKind, inputs: &[NodeId]) -> Result<(), GraphError> {
        if let Some(&missing) = inputs.iter().find(|i| i.index() >= self.count()) {
            return Err(GraphError::UnknownNode { node: missing });
        }
        self.validate_against(kind, inputs, &self.inf_types)
    }

    /// Arity, slot kinds and value checks for a node whose inputs are known to
    /// exist, reading input infima from `inf_types`.
    fn validate_against(&self, kind: &NodeKind, inputs: &[NodeId], inf_types: &[BmgType]) -> Result<(), GraphError> {
        let arity_error = |expected: String| GraphError::ArityMismatch { kind: kind.name(), expected, actual: inputs.len() };
        let (min, max) = match kind {
            NodeKind::Constant { .. } => (0, Some(0)),
            NodeKind::Distribution(d) => (d.arity(), Some(d.arity())),
            NodeKind::Operator(OperatorKind::Addition | OperatorKind::Multiplication) => (2, None),
            NodeKind::Operator(OperatorKind::IfThenElse) => (3, Some(3)),
            NodeKind::Operator(OperatorKind::Negate | OperatorKind::Exp)
            | NodeKind::Sample
            | NodeKind::Conversion(_)
            | NodeKind::Observation { .. }
            | NodeKind::Query => (1, Some(1)),
        };
        match max {
            Some(n) if inputs.len() != n => return Err(arity_error(n.to_string())),
            None if inputs.len() < min => return Err(arity_error(format!("at least {}", min))),
            _ => {}
        }

        // Slot kinds: samples draw from distributions, observations pin samples,
        // everything else consumes values.
        for (slot, &input) in inputs.iter().enumerate() {
            let found = &self.kinds[input.index()];
            let ok = match kind {
                NodeKind::Sample => found.is_distribution(),
                NodeKind::Observation { .. } => matches!(found, NodeKind::Sample),
                _ => is_value(found),
            };
            if !ok {
                let expected = match kind {
                    NodeKind::Sample => "a distribution",
                    NodeKind::Observation { .. } => "a sample",
                    _ => "a value",
                };
                return Err(GraphError::InvalidInput { kind: kind.name(), slot, expected, found: found.name() });
            }
        }

        match kind {
            NodeKind::Constant { value, declared: Some(t) } if !t.can_represent(value) => {
                Err(TypeError::UnrepresentableConstant { value: value.to_string(), declared: *t }.into())
            }
            NodeKind::Conversion(c) => {
                let input = inf_types[inputs[0].index()];
                if c.accepts(input) {
                    Ok(())
                } else {
                    Err(TypeError::IllegalConversion { conversion: *c, input }.into())
                }
            }
            NodeKind::Observation { value } => {
                let support = inf_types[inputs[0].index()];
                if support.can_represent(value) {
                    Ok(())
                } else {
                    Err(GraphError::InvalidObservation { value: value.to_string(), support })
                }
            }
            _ => Ok(()),
        }
    }

    // --- Accessors ---

    pub fn kind(&self, id: NodeId) -> &NodeKind { &self.kinds[id.index()] }
    pub fn inf_type(&self, id: NodeId) -> BmgType { self.inf_types[id.index()] }
    pub fn consumers(&self, id: NodeId) -> &[NodeId] { &self.consumers[id.index()] }
    pub fn label(&self, id: NodeId) -> String { self.kind(id).label() }

    #[inline(always)]
    pub fn inputs(&self, id: NodeId) -> &[NodeId] {
        let (start, count) = self.inputs_ranges[id.index()];
        &self.inputs_flat[start as usize..(start + count) as usize]
    }

    /// The type a node carries once exported: a typed constant keeps its
    /// declared type, every other node its infimum.
    pub fn node_type(&self, id: NodeId) -> BmgType {
        match self.kind(id) {
            NodeKind::Constant { declared: Some(t), .. } => *t,
            _ => self.inf_type(id),
        }
    }

    pub fn requirements(&self, id: NodeId) -> Requirements {
        let input_types: SmallVec<[BmgType; 3]> = self.inputs(id).iter().map(|&i| self.inf_type(i)).collect();
        requirements::requirements(self.kind(id), &input_types)
    }

    // --- Mutation ---

    /// Points input `slot` of `consumer` at `replacement` and refreshes cached
    /// infimum types downstream.
    pub fn replace_input(&mut self, consumer: NodeId, slot: usize, replacement: NodeId) -> Result<(), GraphError> {
        if let Some(&missing) = [consumer, replacement].iter().find(|n| n.index() >= self.count()) {
            return Err(GraphError::UnknownNode { node: missing });
        }
        let (start, count) = self.inputs_ranges[consumer.index()];
        if slot >= count as usize {
            return Err(GraphError::ArityMismatch {
                kind: self.kind(consumer).name(),
                expected: format!("a slot below {}", count),
                actual: slot,
            });
        }

        let stale_key = NodeKey::of(self.kind(consumer), self.inputs(consumer));
        let flat = start as usize + slot;
        let previous = std::mem::replace(&mut self.inputs_flat[flat], replacement);
        let list = &mut self.consumers[previous.index()];
        if let Some(pos) = list.iter().position(|&c| c == consumer) {
            list.remove(pos);
        }
        self.consumers[replacement.index()].push(consumer);

        // Re-key the consumer under its new inputs
        if let Some(key) = stale_key {
            if self.index.get(&key) == Some(&consumer) {
                self.index.remove(&key);
            }
        }
        if let Some(key) = NodeKey::of(self.kind(consumer), self.inputs(consumer)) {
            self.index.entry(key).or_insert(consumer);
        }

        self.refresh_types_from(consumer);
        Ok(())
    }

    fn refresh_types_from(&mut self, start: NodeId) {
        let mut queue = VecDeque::from([start]);
        while let Some(node) = queue.pop_front() {
            let input_types: SmallVec<[BmgType; 3]> = self.inputs(node).iter().map(|&i| self.inf_type(i)).collect();
            let inf = operators::infimum(self.kind(node), &input_types);
            if inf != self.inf_types[node.index()] || node == start {
                self.inf_types[node.index()] = inf;
                queue.extend(self.consumers[node.index()].iter().copied());
            }
        }
    }
}

fn is_value(kind: &NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::Constant { .. } | NodeKind::Sample | NodeKind::Operator(_) | NodeKind::Conversion(_)
    )
}
