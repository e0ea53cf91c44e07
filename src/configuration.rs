//! The immutable description of a problem: its nodes, their shared state domain, and the
//! scenario pool that search experiments borrow from.

use std::collections::HashMap;
use std::fmt;
use std::fmt::Write as _;
use std::hash::Hash;
use std::sync::Arc;

use crate::error::Error;
use crate::pool::ScenarioPool;
use crate::scenario::{NodeIndex, Scenario};

/// A callback fired when one or more nodes' resolved state changes. See
/// [`crate::builder::SolutionBuilder::on_selection_changed`].
pub type SelectionChangedHook<N> = Box<dyn Fn(&[N]) + Send + Sync>;

/// The immutable problem space: an ordered sequence of nodes and the finite set of states a
/// node may resolve to. Shared (via `Arc`) across every `Scenario` and `SolutionBuilder` built
/// from it.
pub struct Configuration<N, T> {
    nodes: Vec<N>,
    node_index: HashMap<N, NodeIndex>,
    states: Vec<T>,
    pool: ScenarioPool<N, T>,
    selection_changed: Option<SelectionChangedHook<N>>,
}

impl<N, T> fmt::Debug for Configuration<N, T>
where
    N: fmt::Debug,
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("nodes", &self.nodes)
            .field("states", &self.states)
            .finish()
    }
}

impl<N, T> Configuration<N, T>
where
    N: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    T: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
{
    /// Build a configuration over `nodes` with resolved states drawn from `resolved_states`.
    ///
    /// Fails with [`Error::EmptyNodeList`] if `nodes` is empty, [`Error::DuplicateNode`] if any
    /// node identity repeats, or [`Error::InsufficientStateDomain`] if fewer than two distinct
    /// states are given.
    pub fn new(
        nodes: impl IntoIterator<Item = N>,
        resolved_states: impl IntoIterator<Item = T>,
    ) -> Result<Configuration<N, T>, Error> {
        let nodes: Vec<N> = nodes.into_iter().collect();
        if nodes.is_empty() {
            return Err(Error::EmptyNodeList);
        }

        let mut node_index = HashMap::with_capacity(nodes.len());
        for (index, node) in nodes.iter().enumerate() {
            if node_index.insert(node.clone(), index).is_some() {
                return Err(Error::DuplicateNode);
            }
        }

        let mut states: Vec<T> = Vec::new();
        for state in resolved_states {
            if !states.contains(&state) {
                states.push(state);
            }
        }
        if states.len() < 2 {
            return Err(Error::InsufficientStateDomain);
        }

        Ok(Configuration {
            nodes,
            node_index,
            states,
            pool: ScenarioPool::new(),
            selection_changed: None,
        })
    }

    /// Attach a callback fired when `resolve_partially` or `commit_analysis` changes node state.
    pub fn with_selection_changed(mut self, hook: SelectionChangedHook<N>) -> Self {
        self.selection_changed = Some(hook);
        self
    }

    pub(crate) fn selection_changed_hook(&self) -> Option<&SelectionChangedHook<N>> {
        self.selection_changed.as_ref()
    }

    /// The nodes, in configuration order. Node `i` has [`NodeIndex`] `i`.
    pub fn nodes(&self) -> &[N] {
        &self.nodes
    }

    /// The finite set of resolved states a node may take, in configured order.
    pub fn states(&self) -> &[T] {
        &self.states
    }

    pub(crate) fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// The dense index assigned to `node`, or `None` if it isn't part of this configuration.
    pub fn index_of(&self, node: &N) -> Option<NodeIndex> {
        self.node_index.get(node).copied()
    }

    pub(crate) fn pool(&self) -> &ScenarioPool<N, T> {
        &self.pool
    }

    /// Build a fresh, entirely-unresolved scenario, taking a recycled one from the pool if
    /// available.
    pub fn blank_scenario(self_arc: &Arc<Configuration<N, T>>) -> Scenario<N, T> {
        self_arc.pool.take_blank(self_arc)
    }

    /// Render one line per node: `<node>: <value or "empty">`, matching `write_scenario`'s
    /// contract in the external interface.
    pub fn write_scenario(
        &self,
        writer: &mut impl fmt::Write,
        scenario: &Scenario<N, T>,
    ) -> fmt::Result
    where
        N: fmt::Display,
        T: fmt::Display,
    {
        for (index, node) in self.nodes.iter().enumerate() {
            match scenario.get_by_index(index) {
                Some(value) => writeln!(writer, "{node}: {value}")?,
                None => writeln!(writer, "{node}: empty")?,
            }
        }
        Ok(())
    }

    /// Convenience wrapper around [`Configuration::write_scenario`] that returns a `String`.
    pub fn display_scenario(&self, scenario: &Scenario<N, T>) -> String
    where
        N: fmt::Display,
        T: fmt::Display,
    {
        let mut out = String::new();
        let _ = self.write_scenario(&mut out, scenario);
        out
    }
}
