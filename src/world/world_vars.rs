//! world_vars.rs
//! The committed set of variables.

use super::{RVIdentifier, Variable};
use indexmap::IndexMap;

#[derive(Debug, Clone, Default)]
pub struct WorldVars {
    data: IndexMap<RVIdentifier, Variable>,
}

impl WorldVars {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.data.len() }
    pub fn is_empty(&self) -> bool { self.data.is_empty() }

    pub fn add_node(&mut self, node: RVIdentifier, var: Variable) { self.data.insert(node, var); }

    pub fn get_node(&self, node: &RVIdentifier) -> Option<&Variable> { self.data.get(node) }

    pub fn get_node_mut(&mut self, node: &RVIdentifier) -> Option<&mut Variable> { self.data.get_mut(node) }

    pub fn contains_node(&self, node: &RVIdentifier) -> bool { self.data.contains_key(node) }

    pub fn remove_node(&mut self, node: &RVIdentifier) -> Option<Variable> { self.data.shift_remove(node) }

    pub fn vars(&self) -> &IndexMap<RVIdentifier, Variable> { &self.data }
}
