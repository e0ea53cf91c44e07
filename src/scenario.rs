//! Mutable per-search state: one array of node values, the constraints currently applied to it,
//! and a per-node inverted index into that constraint list.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use crate::configuration::Configuration;
use crate::constraint::Constraint;
use crate::error::Error;

/// The dense, zero-based index `Configuration` assigns to a node from its insertion order.
pub type NodeIndex = usize;

/// A complete snapshot of node-state assignments together with the constraints applied to them.
///
/// A scenario always belongs to exactly one [`Configuration`] and is either the builder's
/// current scenario, an in-flight search experiment, or sitting in the configuration's
/// [`crate::pool::ScenarioPool`].
pub struct Scenario<N, T> {
    config: Arc<Configuration<N, T>>,
    states: Vec<Option<T>>,
    constraints: Vec<Arc<dyn Constraint<N, T>>>,
    /// `NodeIndex -> constraints referencing that node`, kept consistent with `constraints`.
    node_constraints: Vec<Vec<Arc<dyn Constraint<N, T>>>>,
    version: u64,
    full_refresh_needed: bool,
}

impl<N, T> fmt::Debug for Scenario<N, T>
where
    N: fmt::Debug,
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("states", &self.states)
            .field("num_constraints", &self.constraints.len())
            .field("version", &self.version)
            .field("full_refresh_needed", &self.full_refresh_needed)
            .finish()
    }
}

impl<N, T> Scenario<N, T>
where
    N: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    T: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
{
    /// Construct a brand-new, entirely unresolved scenario for `config`. Most callers want
    /// [`Configuration::blank_scenario`] instead, which recycles from the pool.
    pub(crate) fn blank(config: Arc<Configuration<N, T>>) -> Scenario<N, T> {
        let node_count = config.node_count();
        Scenario {
            config,
            states: vec![None; node_count],
            constraints: Vec::new(),
            node_constraints: vec![Vec::new(); node_count],
            version: 0,
            full_refresh_needed: false,
        }
    }

    /// Reset every node to unresolved and drop all constraints, without allocating.
    pub(crate) fn reset_to_blank(&mut self) {
        for state in &mut self.states {
            *state = None;
        }
        self.constraints.clear();
        for bucket in &mut self.node_constraints {
            bucket.clear();
        }
        self.full_refresh_needed = false;
        self.version += 1;
    }

    /// The configuration this scenario belongs to.
    pub fn configuration(&self) -> &Arc<Configuration<N, T>> {
        &self.config
    }

    /// Monotonically increasing counter bumped on every state, constraint, or refresh change.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn full_refresh_needed(&self) -> bool {
        self.full_refresh_needed
    }

    pub(crate) fn clear_full_refresh_needed(&mut self) {
        self.full_refresh_needed = false;
    }

    pub(crate) fn node_count(&self) -> usize {
        self.states.len()
    }

    /// Whether the node at `index` currently has a resolved value.
    pub fn is_resolved(&self, index: NodeIndex) -> bool {
        self.states[index].is_some()
    }

    /// Read the value of the node at `index`, if resolved.
    pub fn get_by_index(&self, index: NodeIndex) -> Option<&T> {
        self.states[index].as_ref()
    }

    /// Read the value of `node`, if resolved. Returns `None` both when the node is indeterminate
    /// and when `node` isn't part of this scenario's configuration.
    pub fn get(&self, node: &N) -> Option<&T> {
        let index = self.config.index_of(node)?;
        self.get_by_index(index)
    }

    /// Set the node at `index` to `value`. Fails with [`Error::NodeAlreadySet`] if it already
    /// has a value.
    pub fn set_by_index(&mut self, index: NodeIndex, value: T) -> Result<(), Error> {
        if self.states[index].is_some() {
            return Err(Error::NodeAlreadySet);
        }
        self.states[index] = Some(value);
        self.version += 1;
        Ok(())
    }

    /// Set `node`'s value by identity. See [`Scenario::set_by_index`].
    pub fn set(&mut self, node: &N, value: T) -> Result<(), Error> {
        let index = self.config.index_of(node).ok_or(Error::KeyNotFound)?;
        self.set_by_index(index, value)
    }

    /// Unconditionally overwrite the node at `index`, bypassing the already-set check. Used by
    /// search to backtrack and by the full-refresh path.
    pub fn reset_node(&mut self, index: NodeIndex, value: Option<T>) {
        self.states[index] = value;
        self.version += 1;
    }

    /// All constraints currently applied to this scenario, in insertion order.
    pub fn constraints(&self) -> &[Arc<dyn Constraint<N, T>>] {
        &self.constraints
    }

    /// The constraints that reference the node at `index`, in insertion order.
    pub fn constraints_referencing(&self, index: NodeIndex) -> &[Arc<dyn Constraint<N, T>>] {
        &self.node_constraints[index]
    }

    /// Append `constraint` to the applied list and its per-node inverted index entries.
    ///
    /// Fails with [`Error::BadConstraint`] if `constraint.nodes()` is empty, or
    /// [`Error::KeyNotFound`] if it references a node outside this scenario's configuration.
    pub fn add_constraint(&mut self, constraint: Arc<dyn Constraint<N, T>>) -> Result<(), Error> {
        if constraint.nodes().is_empty() {
            return Err(Error::bad_constraint(
                format!("{constraint:?}"),
                crate::error::BadConstraintReason::ConstraintForEmptySetOfNodes,
            ));
        }
        let mut indices = Vec::with_capacity(constraint.nodes().len());
        for node in constraint.nodes() {
            let index = self.config.index_of(node).ok_or(Error::KeyNotFound)?;
            indices.push(index);
        }
        self.constraints.push(constraint.clone());
        for index in indices {
            self.node_constraints[index].push(constraint.clone());
        }
        self.version += 1;
        Ok(())
    }

    /// Remove `constraint` (compared by pointer identity) from the applied list and from every
    /// node's inverted index. Silently does nothing if it isn't present. Marks
    /// `full_refresh_needed` so the next `resolve_partially` clears node states before
    /// re-applying the remaining constraints.
    pub fn remove_constraint(&mut self, constraint: &Arc<dyn Constraint<N, T>>) {
        let before = self.constraints.len();
        self.constraints
            .retain(|c| !Arc::ptr_eq(c, constraint));
        for bucket in &mut self.node_constraints {
            bucket.retain(|c| !Arc::ptr_eq(c, constraint));
        }
        if self.constraints.len() != before {
            self.full_refresh_needed = true;
            self.version += 1;
        }
    }

    /// Remove each of `constraints`. See [`Scenario::remove_constraint`].
    pub fn remove_constraints<'a>(
        &mut self,
        constraints: impl IntoIterator<Item = &'a Arc<dyn Constraint<N, T>>>,
    ) where
        N: 'a,
        T: 'a,
    {
        for constraint in constraints {
            self.remove_constraint(constraint);
        }
    }

    /// Overwrite this scenario's state, constraints, and inverted index from `other`.
    ///
    /// Fails with [`Error::NodeCountMismatch`] if the two scenarios have different node counts
    /// (i.e. belong to different configurations).
    pub fn copy_from(&mut self, other: &Scenario<N, T>) -> Result<(), Error> {
        if self.states.len() != other.states.len() {
            return Err(Error::NodeCountMismatch);
        }
        self.config = other.config.clone();
        self.states.clone_from(&other.states);
        self.constraints.clone_from(&other.constraints);
        self.node_constraints.clone_from(&other.node_constraints);
        self.full_refresh_needed = other.full_refresh_needed;
        self.version += 1;
        Ok(())
    }

    /// A defensive, independent clone: same contents, fresh version lineage. Used when handing
    /// ownership of a scenario to a caller outside the builder/pool discipline (e.g.
    /// [`crate::builder::SolutionBuilder::get_probable_solution`]).
    pub fn detached_clone(&self) -> Scenario<N, T> {
        Scenario {
            config: self.config.clone(),
            states: self.states.clone(),
            constraints: self.constraints.clone(),
            node_constraints: self.node_constraints.clone(),
            version: self.version,
            full_refresh_needed: self.full_refresh_needed,
        }
    }

    /// Iterate resolved `(NodeIndex, &T)` pairs.
    pub fn resolved(&self) -> impl Iterator<Item = (NodeIndex, &T)> {
        self.states
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.as_ref().map(|v| (i, v)))
    }
}
