//! world.rs
//! The incremental-inference state machine.
//!
//! A `World` holds committed variables plus a `Diff` of staged changes.
//! `propose_change` stages a new value for one node, re-executes its direct
//! children, and reports the log-probability deltas; the caller then either
//! accepts or rejects the diff.

use super::identifier::Sampler;
use super::{Diff, RVIdentifier, Variable, WorldError, WorldVars};
use crate::config::WorldConfig;
use crate::distributions::Distribution;
use crate::tensor::Tensor;
use indexmap::IndexSet;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;

/// Log-probability deltas of one proposal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProposalOutcome {
    /// Σ (new - old) over the re-executed children that survive the proposal.
    pub children_log_update: f64,
    /// `children_log_update + node_log_update`.
    pub world_log_update: f64,
    /// New minus stored log-probability of the proposed node.
    pub node_log_update: f64,
    /// Joint log-probability of the live view after the proposal.
    pub score: f64,
    /// Log-probability of created nodes minus that of deleted ones.
    pub graph_log_update: f64,
}

impl ProposalOutcome {
    pub fn as_tuple(&self) -> (f64, f64, f64, f64) {
        (self.children_log_update, self.world_log_update, self.node_log_update, self.score)
    }
}

/// Generating function currently being executed and the parents it has read.
struct Frame {
    node: RVIdentifier,
    parents: IndexSet<RVIdentifier>,
}

/// Bookkeeping for the proposal in flight.
struct ProposalLedger {
    target: RVIdentifier,
    created: Vec<RVIdentifier>,
    marked: Vec<RVIdentifier>,
    prior_log_prob: HashMap<RVIdentifier, f64>,
}

impl ProposalLedger {
    fn new(target: RVIdentifier) -> Self {
        Self { target, created: Vec::new(), marked: Vec::new(), prior_log_prob: HashMap::new() }
    }
}

pub struct World {
    config: WorldConfig,
    variables: WorldVars,
    diff: Diff,
    observations: HashMap<RVIdentifier, Tensor>,
    queries: IndexSet<RVIdentifier>,
    stack: Vec<Frame>,
    proposal: Option<ProposalLedger>,
    rng: StdRng,
}

impl Default for World {
    fn default() -> Self { Self::new(WorldConfig::default()) }
}

impl World {
    pub fn new(config: WorldConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            variables: WorldVars::new(),
            diff: Diff::new(),
            observations: HashMap::new(),
            queries: IndexSet::new(),
            stack: Vec::new(),
            proposal: None,
            rng,
        }
    }

    pub fn config(&self) -> &WorldConfig { &self.config }

    // --- Observations and queries ---

    /// Observed nodes take these values instead of sampling. Replaces any
    /// previous observations.
    pub fn set_observations(&mut self, observations: impl IntoIterator<Item = (RVIdentifier, Tensor)>) {
        self.observations = observations.into_iter().collect();
        for (node, value) in &self.observations {
            if let Some(var) = self.get_node_in_world(node) {
                if &var.value != value {
                    log::warn!("Observation for {} differs from its current value {}", node, var.value);
                }
            }
        }
    }

    pub fn observations(&self) -> &HashMap<RVIdentifier, Tensor> { &self.observations }

    pub fn is_observed(&self, node: &RVIdentifier) -> bool { self.observations.contains_key(node) }

    /// Queried nodes are never deleted by a proposal.
    pub fn set_queries(&mut self, queries: impl IntoIterator<Item = RVIdentifier>) {
        self.queries = queries.into_iter().collect();
    }

    pub fn queries(&self) -> &IndexSet<RVIdentifier> { &self.queries }

    // --- Views ---

    pub fn variables(&self) -> &WorldVars { &self.variables }
    pub fn variables_mut(&mut self) -> &mut WorldVars { &mut self.variables }
    pub fn diff(&self) -> &Diff { &self.diff }

    /// The staged copy if there is one, else the committed one.
    pub fn get_node_in_world(&self, node: &RVIdentifier) -> Option<&Variable> {
        self.diff.get_node(node).or_else(|| self.variables.get_node(node))
    }

    pub fn get_node_in_world_raise_error(&self, node: &RVIdentifier) -> Result<&Variable, WorldError> {
        self.get_node_in_world(node).ok_or_else(|| WorldError::NotFound { node: node.clone() })
    }

    pub fn contains_node(&self, node: &RVIdentifier) -> bool {
        self.diff.contains_node(node) || self.variables.contains_node(node)
    }

    // --- Graph maintenance ---

    /// Returns the value of `node`, creating it in the diff on first use. When
    /// called from inside a generating function, `node` is recorded as a
    /// parent of the caller.
    pub fn update_graph(&mut self, node: &RVIdentifier) -> Result<Tensor, WorldError> {
        // 1. Guard the call stack
        if self.stack.iter().any(|frame| &frame.node == node) {
            return Err(WorldError::CyclicDependency { node: node.clone() });
        }

        // 2. Create, or revive a node an earlier step marked for delete
        if !self.contains_node(node) {
            self.create_node(node)?;
        } else if self.diff.is_marked_for_delete(node) {
            self.revive(node)?;
        }

        // 3. Wire the edge to the caller
        let caller = self.stack.last_mut().map(|frame| {
            frame.parents.insert(node.clone());
            frame.node.clone()
        });
        if let Some(caller) = caller {
            if !self.get_node_in_world_raise_error(node)?.children.contains(&caller) {
                self.stage(node)?.children.insert(caller);
            }
        }

        Ok(self.get_node_in_world_raise_error(node)?.value.clone())
    }

    fn create_node(&mut self, node: &RVIdentifier) -> Result<(), WorldError> {
        let (distribution, parents) = self.execute(node)?;
        let value = match self.observations.get(node) {
            Some(observed) => observed.clone(),
            None => distribution.sample(&mut self.rng)?,
        };
        log::trace!("Created {} = {}", node, value);

        let var = Variable::new(distribution, value, parents, self.config.transform_constrained);
        self.diff.add_node(node.clone(), var);
        if let Some(ledger) = self.proposal.as_mut() {
            ledger.created.push(node.clone());
        }
        Ok(())
    }

    /// Runs the generating function of `node`, returning its distribution and
    /// the parents it read.
    fn execute(&mut self, node: &RVIdentifier) -> Result<(Distribution, IndexSet<RVIdentifier>), WorldError> {
        if self.stack.len() >= self.config.max_depth {
            return Err(WorldError::RecursionLimit { node: node.clone(), depth: self.config.max_depth });
        }
        self.stack.push(Frame { node: node.clone(), parents: IndexSet::new() });
        let function = node.generating_fn();
        let result = function(&mut Sampler { world: self }, node.arguments());
        let parents = self.stack.pop().map(|frame| frame.parents).unwrap_or_default();
        Ok((result?, parents))
    }

    /// Copies the committed record into the diff if it is not staged yet.
    fn stage(&mut self, node: &RVIdentifier) -> Result<&mut Variable, WorldError> {
        if !self.diff.contains_node(node) {
            let committed = self
                .variables
                .get_node(node)
                .ok_or_else(|| WorldError::NotFound { node: node.clone() })?
                .clone();
            self.diff.add_node(node.clone(), committed);
        }
        self.record_prior(node);
        self.diff.get_node_mut(node).ok_or_else(|| WorldError::NotFound { node: node.clone() })
    }

    /// Remembers the log-probability a node had when the proposal first
    /// touched it.
    fn record_prior(&mut self, node: &RVIdentifier) {
        if let Some(ledger) = self.proposal.as_mut() {
            if !ledger.prior_log_prob.contains_key(node) {
                if let Some(var) = self.diff.get_node(node).or_else(|| self.variables.get_node(node)) {
                    ledger.prior_log_prob.insert(node.clone(), var.log_prob);
                }
            }
        }
    }

    fn is_protected(&self, node: &RVIdentifier) -> bool {
        self.is_observed(node)
            || self.queries.contains(node)
            || self.proposal.as_ref().is_some_and(|ledger| &ledger.target == node)
    }

    /// Removes `child` from `parent`'s children and deletes `parent` if nothing
    /// else depends on it.
    fn detach(&mut self, child: &RVIdentifier, parent: &RVIdentifier) -> Result<(), WorldError> {
        let orphaned = {
            let parent_var = self.stage(parent)?;
            parent_var.children.shift_remove(child);
            parent_var.children.is_empty()
        };
        if orphaned && !self.is_protected(parent) && !self.diff.is_marked_for_delete(parent) {
            self.mark_for_delete(parent)?;
        }
        Ok(())
    }

    fn mark_for_delete(&mut self, node: &RVIdentifier) -> Result<(), WorldError> {
        self.record_prior(node);
        self.diff.mark_for_delete(node.clone());
        if let Some(ledger) = self.proposal.as_mut() {
            ledger.marked.push(node.clone());
        }
        log::trace!("Marked {} for delete", node);

        let parents = self.get_node_in_world_raise_error(node)?.parent.clone();
        for parent in &parents {
            self.detach(node, parent)?;
        }
        Ok(())
    }

    /// Undoes `mark_for_delete` for a node that is read again.
    fn revive(&mut self, node: &RVIdentifier) -> Result<(), WorldError> {
        self.diff.unmark_for_delete(node);
        log::trace!("Revived {}", node);
        let parents = self.get_node_in_world_raise_error(node)?.parent.clone();
        for parent in &parents {
            if self.diff.is_marked_for_delete(parent) {
                self.revive(parent)?;
            }
            if !self.get_node_in_world_raise_error(parent)?.children.contains(node) {
                self.stage(parent)?.children.insert(node.clone());
            }
        }
        Ok(())
    }

    /// Re-runs the generating function of `node` against the current view,
    /// rescoring its value and detaching parents it no longer reads.
    fn reexecute(&mut self, node: &RVIdentifier) -> Result<(), WorldError> {
        let (distribution, parents) = self.execute(node)?;
        let dropped: Vec<RVIdentifier> = {
            let var = self.stage(node)?;
            let dropped = var.parent.iter().filter(|p| !parents.contains(*p)).cloned().collect();
            var.parent = parents;
            var.update_distribution(distribution);
            dropped
        };
        for parent in &dropped {
            self.detach(node, parent)?;
        }
        Ok(())
    }

    // --- Proposal protocol ---

    /// Stages `value` for `node`, re-executes its direct children and reports
    /// the resulting log-probability deltas. Changes stay in the diff until
    /// `accept_diff` or `reject_diff`.
    pub fn propose_change(&mut self, node: &RVIdentifier, value: Tensor) -> Result<ProposalOutcome, WorldError> {
        let outcome = self.propose_change_inner(node, value);
        self.stack.clear();
        self.proposal = None;
        outcome
    }

    fn propose_change_inner(&mut self, node: &RVIdentifier, value: Tensor) -> Result<ProposalOutcome, WorldError> {
        // 1. Reject proposals on nodes that cannot move
        if self.diff.is_marked_for_delete(node) {
            return Err(WorldError::MarkedForDelete { node: node.clone() });
        }
        if self.is_observed(node) {
            return Err(WorldError::ObservedNode { node: node.clone() });
        }
        self.proposal = Some(ProposalLedger::new(node.clone()));

        // 2. Stage the new value
        let (node_log_update, children) = {
            let var = self.stage(node)?;
            let old = var.log_prob;
            var.update_value(value);
            let children: Vec<RVIdentifier> = var.children.iter().cloned().collect();
            (var.log_prob - old, children)
        };

        // 3. Re-execute each direct child that is still live
        let mut child_updates = Vec::with_capacity(children.len());
        for child in children {
            if self.diff.is_marked_for_delete(&child) {
                continue;
            }
            let old = self.get_node_in_world_raise_error(&child)?.log_prob;
            self.reexecute(&child)?;
            let new = self.get_node_in_world_raise_error(&child)?.log_prob;
            child_updates.push((child, new - old));
        }

        // 4. Sum the deltas over what survived
        let children_log_update: f64 = child_updates
            .iter()
            .filter(|(child, _)| !self.diff.is_marked_for_delete(child))
            .map(|(_, delta)| delta)
            .sum();
        let outcome = ProposalOutcome {
            children_log_update,
            world_log_update: children_log_update + node_log_update,
            node_log_update,
            score: self.joint_log_prob(),
            graph_log_update: self.graph_log_update()?,
        };
        log::debug!("Proposed {} for {}: {:?}", self.get_node_in_world_raise_error(node)?.value, node, outcome);
        Ok(outcome)
    }

    /// Created nodes that survived, minus the prior log-probability of nodes
    /// this proposal deleted.
    fn graph_log_update(&self) -> Result<f64, WorldError> {
        let Some(ledger) = self.proposal.as_ref() else {
            return Ok(0.0);
        };
        let mut update = 0.0;
        for node in &ledger.created {
            if !self.diff.is_marked_for_delete(node) {
                update += self.get_node_in_world_raise_error(node)?.log_prob;
            }
        }
        for node in &ledger.marked {
            if self.diff.is_marked_for_delete(node) && !ledger.created.contains(node) {
                let prior = match ledger.prior_log_prob.get(node) {
                    Some(lp) => *lp,
                    None => self.get_node_in_world_raise_error(node)?.log_prob,
                };
                update -= prior;
            }
        }
        Ok(update)
    }

    /// Commits the diff: staged variables replace committed ones and marked
    /// variables are removed.
    pub fn accept_diff(&mut self) {
        let (staged, marked) = self.diff.take();
        log::debug!("Accepting {} staged and {} deleted variables", staged.len(), marked.len());
        for (node, var) in staged {
            if !marked.contains(&node) {
                self.variables.add_node(node, var);
            }
        }
        for node in &marked {
            self.variables.remove_node(node);
        }
    }

    pub fn reject_diff(&mut self) {
        log::debug!("Rejecting {} staged variables", self.diff.len());
        self.diff.clear();
    }

    // --- Scoring ---

    /// Non-observed children of `node` and their non-observed co-parents, read
    /// from the committed graph only. Staged edges do not count until accepted.
    pub fn get_markov_blanket(&self, node: &RVIdentifier) -> Result<IndexSet<RVIdentifier>, WorldError> {
        let committed = |id: &RVIdentifier| {
            self.variables.get_node(id).ok_or_else(|| WorldError::NotFound { node: id.clone() })
        };
        let var = committed(node)?;
        let mut blanket = IndexSet::new();
        for child in &var.children {
            let child_var = committed(child)?;
            if !self.is_observed(child) {
                blanket.insert(child.clone());
            }
            for co_parent in &child_var.parent {
                if co_parent != node && !self.is_observed(co_parent) {
                    blanket.insert(co_parent.clone());
                }
            }
        }
        Ok(blanket)
    }

    /// Log-probability of `var` and its children, plus its Jacobian.
    pub fn compute_score(&self, var: &Variable) -> Result<f64, WorldError> {
        let mut score = var.log_prob + var.jacobian;
        for child in &var.children {
            let child_var = self.get_node_in_world(child).ok_or_else(|| WorldError::InconsistentVariable {
                reason: format!("child {} is missing from the world", child),
            })?;
            score += child_var.log_prob;
        }
        if score.is_nan() {
            return Err(WorldError::InconsistentVariable { reason: "score is NaN".to_string() });
        }
        Ok(score)
    }

    /// Sum of log-probabilities over the live view: committed variables
    /// overlaid with staged ones, less anything marked for delete.
    pub fn joint_log_prob(&self) -> f64 {
        let staged = self.diff.vars().iter();
        let committed = self.variables.vars().iter().filter(|(node, _)| !self.diff.contains_node(node));
        staged
            .chain(committed)
            .filter(|(node, _)| !self.diff.is_marked_for_delete(node))
            .map(|(_, var)| var.log_prob)
            .sum()
    }

    /// Distance between a simulated value and the observation of `node`.
    pub fn distance_to_observation(&self, node: &RVIdentifier, simulated: &Tensor) -> Result<f64, WorldError> {
        let observed = self.observations.get(node).ok_or_else(|| WorldError::NotObserved { node: node.clone() })?;
        Ok(observed.dist(simulated)?)
    }
}
