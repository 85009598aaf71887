//! dag.rs
//! Graph algorithms over the `NodeGraph` store, plus the exporter view.

use super::node::NodeId;
use super::storage::NodeGraph;
use super::GraphError;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashSet, VecDeque};

/// Node and edge payloads as exporters (DOT, builder code) consume them.
pub type ExportGraph = DiGraph<String, usize>;

impl NodeGraph {
    /// Returns a topological sort (inputs before consumers) using Kahn's Algorithm.
    pub fn topological_order(&self) -> Result<Vec<NodeId>, GraphError> {
        let count = self.count();
        let mut in_degree = vec![0usize; count];
        let mut queue = VecDeque::with_capacity(count);
        let mut order = Vec::with_capacity(count);

        // 1. Initialize In-Degrees O(N)
        for (i, &(_, n)) in self.inputs_ranges.iter().enumerate() {
            in_degree[i] = n as usize;
            if n == 0 {
                queue.push_back(NodeId::new(i));
            }
        }

        // 2. Process Queue
        while let Some(node) = queue.pop_front() {
            order.push(node);
            for &consumer in self.consumers(node) {
                let idx = consumer.index();
                in_degree[idx] -= 1;
                if in_degree[idx] == 0 {
                    queue.push_back(consumer);
                }
            }
        }

        if order.len() != count {
            return Err(GraphError::CycleDetected);
        }
        Ok(order)
    }

    pub fn downstream_from(&self, start_nodes: &[NodeId]) -> HashSet<NodeId> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from(start_nodes.to_vec());
        while let Some(node) = queue.pop_front() {
            if visited.insert(node) {
                queue.extend(self.consumers(node).iter().copied());
            }
        }
        visited
    }

    pub fn upstream_from(&self, start_nodes: &[NodeId]) -> HashSet<NodeId> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from(start_nodes.to_vec());
        while let Some(node) = queue.pop_front() {
            if visited.insert(node) {
                queue.extend(self.inputs(node).iter().copied());
            }
        }
        visited
    }

    /// Snapshot for exporters: petgraph node `i` is `NodeId(i)` carrying its
    /// display label; edges run input to consumer, weighted by input slot, in
    /// creation order.
    pub fn to_petgraph(&self) -> ExportGraph {
        let mut out = ExportGraph::with_capacity(self.count(), self.inputs_flat.len());
        for id in self.node_ids() {
            out.add_node(self.label(id));
        }
        for id in self.node_ids() {
            for (slot, &input) in self.inputs(id).iter().enumerate() {
                out.add_edge(NodeIndex::new(input.index()), NodeIndex::new(id.index()), slot);
            }
        }
        out
    }
}
