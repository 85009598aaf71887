//! diff.rs
//! Staged copies of changed variables plus the set marked for delete.

use super::{RVIdentifier, Variable};
use indexmap::{IndexMap, IndexSet};

#[derive(Debug, Clone, Default)]
pub struct Diff {
    data: IndexMap<RVIdentifier, Variable>,
    marked: IndexSet<RVIdentifier>,
}

impl Diff {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.data.len() }
    pub fn is_empty(&self) -> bool { self.data.is_empty() && self.marked.is_empty() }

    pub fn add_node(&mut self, node: RVIdentifier, var: Variable) { self.data.insert(node, var); }

    pub fn get_node(&self, node: &RVIdentifier) -> Option<&Variable> { self.data.get(node) }

    pub fn get_node_mut(&mut self, node: &RVIdentifier) -> Option<&mut Variable> { self.data.get_mut(node) }

    pub fn contains_node(&self, node: &RVIdentifier) -> bool { self.data.contains_key(node) }

    pub fn vars(&self) -> &IndexMap<RVIdentifier, Variable> { &self.data }

    pub fn mark_for_delete(&mut self, node: RVIdentifier) -> bool { self.marked.insert(node) }

    pub fn unmark_for_delete(&mut self, node: &RVIdentifier) -> bool { self.marked.shift_remove(node) }

    pub fn is_marked_for_delete(&self, node: &RVIdentifier) -> bool { self.marked.contains(node) }

    pub fn to_be_deleted_vars(&self) -> impl Iterator<Item = &RVIdentifier> { self.marked.iter() }

    /// Empties the diff, handing back its staged variables and delete marks.
    pub(super) fn take(&mut self) -> (IndexMap<RVIdentifier, Variable>, IndexSet<RVIdentifier>) {
        let taken = std::mem::take(self);
        (taken.data, taken.marked)
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.marked.clear();
    }
}
