//! [`SolutionBuilder`]: the orchestrator that ties constraints, scenarios, and search together.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Instant;

use crate::cancellation::CancellationToken;
use crate::configuration::{Configuration, SelectionChangedHook};
use crate::constraint::{Constraint, ConstraintState};
use crate::error::{BadConstraintReason, Error};
use crate::scenario::{NodeIndex, Scenario};

/// Diagnostics flags. Every flag is off by default; set the ones you want on
/// [`SolutionBuilder::diagnostics`] before calling into the builder. These gate `log` calls only —
/// there is no behavioral difference with them all off, so leaving them off costs nothing beyond
/// a flag check per constraint.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Log after each propagation pass.
    pub log_steps: bool,
    /// Log each constraint as it's added.
    pub log_constraints: bool,
    /// Log when a constraint becomes fully resolved.
    pub log_completed: bool,
    /// Log how long each propagation pass took.
    pub log_elapsed: bool,
    /// Log the full scenario after each propagation pass. Can be very large.
    pub log_states: bool,
}

/// A scope-bound lease of a pooled scenario. Returned to the pool on drop unless [`detach`] is
/// called to transfer ownership out.
///
/// [`detach`]: Experiment::detach
struct Experiment<N, T> {
    scenario: Option<Scenario<N, T>>,
}

impl<N, T> Experiment<N, T>
where
    N: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    T: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
{
    fn new(config: &Arc<Configuration<N, T>>, basis: &Scenario<N, T>) -> Self {
        Experiment {
            scenario: Some(config.pool().take(config, basis)),
        }
    }

    fn get(&self) -> &Scenario<N, T> {
        self.scenario.as_ref().expect("experiment scenario already taken")
    }

    fn get_mut(&mut self) -> &mut Scenario<N, T> {
        self.scenario.as_mut().expect("experiment scenario already taken")
    }

    /// Transfer ownership of the leased scenario to the caller, bypassing pool return.
    fn detach(mut self) -> Scenario<N, T> {
        self.scenario.take().expect("experiment scenario already taken")
    }
}

impl<N, T> Drop for Experiment<N, T>
where
    N: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    T: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
{
    fn drop(&mut self) {
        if let Some(scenario) = self.scenario.take() {
            let config = scenario.configuration().clone();
            config.pool().give_back(scenario);
        }
    }
}

/// Resolve every constraint to a fixpoint: repeat full passes over the constraint list until one
/// changes nothing. Surfaces `Error::BadConstraint` if a constraint errors, or claims a change it
/// didn't make.
fn resolve_to_fixpoint<N, T>(
    scenario: &mut Scenario<N, T>,
    diagnostics: &Config,
    token: &impl CancellationToken,
) -> Result<(), Error>
where
    N: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    T: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
{
    let mut pass = 0u32;
    loop {
        if token.should_cancel() {
            return Err(Error::Cancelled {
                scenarios_considered: 0,
            });
        }
        let pass_start = Instant::now();
        let mut changed_this_pass = false;
        let constraints: Vec<_> = scenario.constraints().to_vec();
        for constraint in constraints {
            if token.should_cancel() {
                return Err(Error::Cancelled {
                    scenarios_considered: 0,
                });
            }
            let version_before = scenario.version();
            match constraint.resolve(scenario) {
                Err(e) => {
                    return Err(Error::bad_constraint(
                        format!("{constraint:?}"),
                        BadConstraintReason::ConstraintThrewUnexpectedException(e.to_string()),
                    ));
                }
                Ok(true) => {
                    if scenario.version() == version_before {
                        return Err(Error::bad_constraint(
                            format!("{constraint:?}"),
                            BadConstraintReason::ConstraintResolveReturnedTrueWithNoChanges,
                        ));
                    }
                    changed_this_pass = true;
                    if diagnostics.log_completed
                        && constraint.get_state(scenario).contains(ConstraintState::Resolved)
                    {
                        log::debug!("constraint resolved: {constraint:?}");
                    }
                }
                Ok(false) => {}
            }
        }
        pass += 1;
        if diagnostics.log_steps {
            log::debug!("propagation pass {pass}: version {}", scenario.version());
        }
        if diagnostics.log_states {
            log::trace!("scenario after pass {pass}: {scenario:?}");
        }
        if diagnostics.log_elapsed {
            log::debug!("pass {pass} took {:?}", pass_start.elapsed());
        }
        if !changed_this_pass {
            return Ok(());
        }
    }
}

/// Resolve only `applicable` once each; if any changed the scenario, follow up with a full
/// fixpoint resolve. An optimization for the edges of a DFS branch where only the
/// newly-set node's constraints can possibly have anything new to do.
fn cascading_resolve<N, T>(
    scenario: &mut Scenario<N, T>,
    applicable: &[Arc<dyn Constraint<N, T>>],
    diagnostics: &Config,
    token: &impl CancellationToken,
) -> Result<(), Error>
where
    N: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    T: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
{
    let mut any_changed = false;
    for constraint in applicable {
        let version_before = scenario.version();
        match constraint.resolve(scenario) {
            Err(e) => {
                return Err(Error::bad_constraint(
                    format!("{constraint:?}"),
                    BadConstraintReason::ConstraintThrewUnexpectedException(e.to_string()),
                ));
            }
            Ok(true) => {
                if scenario.version() == version_before {
                    return Err(Error::bad_constraint(
                        format!("{constraint:?}"),
                        BadConstraintReason::ConstraintResolveReturnedTrueWithNoChanges,
                    ));
                }
                any_changed = true;
            }
            Ok(false) => {}
        }
    }
    if any_changed {
        resolve_to_fixpoint(scenario, diagnostics, token)?;
    }
    Ok(())
}

/// Accumulated results of a depth-first enumeration.
struct EnumerationStats<T> {
    considered_scenarios: u64,
    solutions_found: u64,
    stop_after_first_solution: bool,
    record_counts: bool,
    /// Per node index: `None` once the node has been seen unresolved in any recorded solution
    /// (it's free), `Some(counts)` otherwise.
    node_value_counts: Vec<Option<HashMap<T, u64>>>,
}

impl<T: Eq + Hash + Clone> EnumerationStats<T> {
    fn new(node_count: usize, stop_after_first_solution: bool, record_counts: bool) -> Self {
        EnumerationStats {
            considered_scenarios: 0,
            solutions_found: 0,
            stop_after_first_solution,
            record_counts,
            node_value_counts: if record_counts {
                vec![Some(HashMap::new()); node_count]
            } else {
                Vec::new()
            },
        }
    }
}

fn record_solution<N, T>(scenario: &Scenario<N, T>, stats: &mut EnumerationStats<T>)
where
    N: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    T: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
{
    stats.solutions_found += 1;
    if !stats.record_counts {
        return;
    }
    for (index, slot) in stats.node_value_counts.iter_mut().enumerate() {
        match scenario.get_by_index(index) {
            Some(value) => {
                if let Some(counts) = slot {
                    *counts.entry(value.clone()).or_insert(0) += 1;
                }
            }
            None => *slot = None,
        }
    }
}

/// Depth-first enumeration of complete node assignments satisfying every constraint on `basis`,
/// starting from `first_node`. See the module-level walkthrough in `lib.rs` for the algorithm in
/// prose; this is its direct transcription.
fn enumerate_solutions<N, T>(
    config: &Arc<Configuration<N, T>>,
    basis: &Scenario<N, T>,
    first_node: NodeIndex,
    stats: &mut EnumerationStats<T>,
    diagnostics: &Config,
    token: &impl CancellationToken,
) -> Result<(), Error>
where
    N: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    T: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
{
    stats.considered_scenarios += 1;
    if token.should_cancel() {
        return Err(Error::Cancelled {
            scenarios_considered: stats.considered_scenarios,
        });
    }

    let mut any_breakable = false;
    for constraint in basis.constraints() {
        let state = constraint.get_state(basis);
        if !state.contains(ConstraintState::Satisfiable) {
            return Ok(());
        }
        if state.contains(ConstraintState::Breakable) {
            any_breakable = true;
        }
    }

    if stats.stop_after_first_solution && !any_breakable {
        record_solution(basis, stats);
        return Ok(());
    }

    let node_count = basis.node_count();
    for i in first_node..node_count {
        if basis.is_resolved(i) {
            continue;
        }
        let applicable = basis.constraints_referencing(i);
        if applicable.is_empty() {
            continue;
        }
        let applicable: Vec<Arc<dyn Constraint<N, T>>> = applicable.to_vec();

        for value in config.states() {
            if token.should_cancel() {
                return Err(Error::Cancelled {
                    scenarios_considered: stats.considered_scenarios,
                });
            }
            let mut experiment = Experiment::new(config, basis);
            experiment.get_mut().set_by_index(i, value.clone())?;
            cascading_resolve(experiment.get_mut(), &applicable, diagnostics, token)?;
            let solutions_before = stats.solutions_found;
            enumerate_solutions(config, experiment.get(), i + 1, stats, diagnostics, token)?;
            if stats.stop_after_first_solution && stats.solutions_found > solutions_before {
                return Ok(());
            }
        }
        return Ok(());
    }

    record_solution(basis, stats);
    Ok(())
}

/// Reset-if-needed, resolve, and probe for at least one solution. Shared by
/// [`SolutionBuilder::check_constraint`], [`SolutionBuilder::check_for_conflicting_constraints`],
/// and [`ConflictedConstraints::get_conflicting_constraints`].
fn probe_feasible<N, T>(
    config: &Arc<Configuration<N, T>>,
    scenario: &mut Scenario<N, T>,
    diagnostics: &Config,
    token: &impl CancellationToken,
) -> Result<bool, Error>
where
    N: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    T: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
{
    if scenario.full_refresh_needed() {
        for i in 0..scenario.node_count() {
            scenario.reset_node(i, None);
        }
        scenario.clear_full_refresh_needed();
    }
    resolve_to_fixpoint(scenario, diagnostics, token)?;
    let mut stats = EnumerationStats::new(scenario.node_count(), true, false);
    enumerate_solutions(config, scenario, 0, &mut stats, diagnostics, token)?;
    Ok(stats.solutions_found > 0)
}

fn node_value_counts_by_identity<N, T>(
    config: &Configuration<N, T>,
    stats: &EnumerationStats<T>,
) -> HashMap<N, HashMap<T, u64>>
where
    N: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    T: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
{
    let mut result = HashMap::new();
    for (index, node) in config.nodes().iter().enumerate() {
        if let Some(counts) = &stats.node_value_counts[index] {
            result.insert(node.clone(), counts.clone());
        }
    }
    result
}

/// A scenario for which no complete assignment satisfies every applied constraint.
#[derive(Debug)]
pub struct ConflictedConstraints<N, T> {
    scenario: Scenario<N, T>,
    diagnostics: Config,
}

impl<N, T> ConflictedConstraints<N, T>
where
    N: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    T: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
{
    /// The scenario (node states and applied constraints) at the point the conflict was detected.
    pub fn scenario(&self) -> &Scenario<N, T> {
        &self.scenario
    }

    /// Which single constraints, if removed, would restore feasibility. Constraints in
    /// `inviolate` (compared by pointer identity) are never considered for removal.
    ///
    /// Fails with [`Error::ComplexConflict`] if no single constraint's removal suffices.
    pub fn get_conflicting_constraints(
        &self,
        inviolate: &[Arc<dyn Constraint<N, T>>],
        token: &impl CancellationToken,
    ) -> Result<Vec<Arc<dyn Constraint<N, T>>>, Error> {
        let config = self.scenario.configuration().clone();
        let mut culprits = Vec::new();
        for constraint in self.scenario.constraints() {
            if token.should_cancel() {
                return Err(Error::Cancelled {
                    scenarios_considered: 0,
                });
            }
            if inviolate.iter().any(|c| Arc::ptr_eq(c, constraint)) {
                continue;
            }
            let mut experiment = Experiment::new(&config, &self.scenario);
            experiment.get_mut().remove_constraint(constraint);
            if probe_feasible(&config, experiment.get_mut(), &self.diagnostics, token)? {
                culprits.push(constraint.clone());
            }
        }
        if culprits.is_empty() {
            Err(Error::ComplexConflict)
        } else {
            Ok(culprits)
        }
    }
}

/// The result of an exhaustive [`SolutionBuilder::analyze_solutions`] pass.
#[derive(Debug)]
pub struct SolutionsAnalysis<N, T> {
    /// How many complete, constraint-satisfying assignments were found.
    pub viable_solutions_found: u64,
    /// For each node that was referenced by at least one constraint during enumeration, the
    /// number of viable solutions in which it took each value. A node absent from this map was
    /// never constrained and is free to take any value.
    pub node_value_counts: HashMap<N, HashMap<T, u64>>,
    /// Present iff `viable_solutions_found == 0`.
    pub conflict: Option<ConflictedConstraints<N, T>>,
}

/// Ties a [`Configuration`] to the mutable scenario under construction, and runs propagation,
/// feasibility checks, and enumeration against it.
///
/// Not `Sync`: drive one builder from one thread at a time. See the design notes in `lib.rs`.
pub struct SolutionBuilder<N, T> {
    config: Arc<Configuration<N, T>>,
    current: Scenario<N, T>,
    selection_changed_override: Option<SelectionChangedHook<N>>,
    diagnostics: Config,
}

impl<N, T> fmt::Debug for SolutionBuilder<N, T>
where
    N: fmt::Debug,
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SolutionBuilder")
            .field("current", &self.current)
            .finish()
    }
}

impl<N, T> SolutionBuilder<N, T>
where
    N: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    T: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
{
    /// Start building a solution against `configuration`, with a fresh, entirely unresolved
    /// scenario.
    pub fn new(configuration: Arc<Configuration<N, T>>) -> Self {
        let current = Configuration::blank_scenario(&configuration);
        SolutionBuilder {
            config: configuration,
            current,
            selection_changed_override: None,
            diagnostics: Config::default(),
        }
    }

    /// Sugar for building the `Configuration` and the builder together.
    pub fn from_parts(
        nodes: impl IntoIterator<Item = N>,
        resolved_states: impl IntoIterator<Item = T>,
    ) -> Result<Self, Error> {
        let config = Arc::new(Configuration::new(nodes, resolved_states)?);
        Ok(SolutionBuilder::new(config))
    }

    /// The configuration this builder was built from.
    pub fn configuration(&self) -> &Arc<Configuration<N, T>> {
        &self.config
    }

    /// The scenario under construction.
    pub fn current_scenario(&self) -> &Scenario<N, T> {
        &self.current
    }

    /// Read `node`'s resolved value, if any.
    pub fn get(&self, node: &N) -> Option<&T> {
        self.current.get(node)
    }

    /// Read the resolved value at `index`, if any.
    pub fn get_by_index(&self, index: NodeIndex) -> Option<&T> {
        self.current.get_by_index(index)
    }

    /// Mutable access to the diagnostics flags, e.g. `builder.diagnostics().log_steps = true`.
    pub fn diagnostics(&mut self) -> &mut Config {
        &mut self.diagnostics
    }

    /// Apply `constraint` to the scenario under construction.
    pub fn add_constraint(&mut self, constraint: Arc<dyn Constraint<N, T>>) -> Result<(), Error> {
        if self.diagnostics.log_constraints {
            log::debug!("adding constraint: {constraint:?}");
        }
        self.current.add_constraint(constraint)
    }

    /// Apply each of `constraints` in order.
    pub fn add_constraints(
        &mut self,
        constraints: impl IntoIterator<Item = Arc<dyn Constraint<N, T>>>,
    ) -> Result<(), Error> {
        for constraint in constraints {
            self.add_constraint(constraint)?;
        }
        Ok(())
    }

    /// Remove `constraint`, if applied. A no-op if it isn't.
    pub fn remove_constraint(&mut self, constraint: &Arc<dyn Constraint<N, T>>) {
        self.current.remove_constraint(constraint);
    }

    /// Remove each of `constraints`. See [`SolutionBuilder::remove_constraint`].
    pub fn remove_constraints<'a>(
        &mut self,
        constraints: impl IntoIterator<Item = &'a Arc<dyn Constraint<N, T>>>,
    ) where
        N: 'a,
        T: 'a,
    {
        self.current.remove_constraints(constraints);
    }

    /// Override the configuration-level `selection_changed` hook for this builder only.
    pub fn on_selection_changed(&mut self, hook: SelectionChangedHook<N>) {
        self.selection_changed_override = Some(hook);
    }

    fn fire_selection_changed(&self, changed: &[N]) {
        if changed.is_empty() {
            return;
        }
        if let Some(hook) = &self.selection_changed_override {
            hook(changed);
        } else if let Some(hook) = self.config.selection_changed_hook() {
            hook(changed);
        }
    }

    fn changed_nodes(&self, updated: &Scenario<N, T>) -> Vec<N> {
        self.config
            .nodes()
            .iter()
            .enumerate()
            .filter(|(i, _)| self.current.get_by_index(*i) != updated.get_by_index(*i))
            .map(|(_, node)| node.clone())
            .collect()
    }

    /// Would adding `constraint` (without committing it) still leave the scenario feasible?
    pub fn check_constraint(
        &mut self,
        constraint: Arc<dyn Constraint<N, T>>,
        token: &impl CancellationToken,
    ) -> Result<bool, Error> {
        let mut experiment = Experiment::new(&self.config, &self.current);
        experiment.get_mut().add_constraint(constraint)?;
        probe_feasible(&self.config, experiment.get_mut(), &self.diagnostics, token)
    }

    /// Resolve the current scenario to a fixpoint and commit the result. Fires
    /// `selection_changed` if any node's resolved value changed.
    pub fn resolve_partially(&mut self, token: &impl CancellationToken) -> Result<(), Error> {
        let mut experiment = Experiment::new(&self.config, &self.current);
        if self.current.full_refresh_needed() {
            let node_count = experiment.get().node_count();
            for i in 0..node_count {
                experiment.get_mut().reset_node(i, None);
            }
        }
        resolve_to_fixpoint(experiment.get_mut(), &self.diagnostics, token)?;

        let changed = self.changed_nodes(experiment.get());
        self.current.copy_from(experiment.get())?;
        self.current.clear_full_refresh_needed();
        self.fire_selection_changed(&changed);
        Ok(())
    }

    /// Resolve, then search for a single solution. Returns `Some(ConflictedConstraints)` wrapping
    /// the current scenario if none exists.
    pub fn check_for_conflicting_constraints(
        &mut self,
        token: &impl CancellationToken,
    ) -> Result<Option<ConflictedConstraints<N, T>>, Error> {
        let mut experiment = Experiment::new(&self.config, &self.current);
        let feasible = probe_feasible(&self.config, experiment.get_mut(), &self.diagnostics, token)?;
        if feasible {
            Ok(None)
        } else {
            Ok(Some(ConflictedConstraints {
                scenario: self.current.detached_clone(),
                diagnostics: self.diagnostics.clone(),
            }))
        }
    }

    /// Resolve, then exhaustively enumerate every complete solution, reporting per-node per-value
    /// occurrence counts.
    pub fn analyze_solutions(
        &mut self,
        token: &impl CancellationToken,
    ) -> Result<SolutionsAnalysis<N, T>, Error> {
        let mut experiment = Experiment::new(&self.config, &self.current);
        if self.current.full_refresh_needed() {
            for i in 0..experiment.get().node_count() {
                experiment.get_mut().reset_node(i, None);
            }
        }
        resolve_to_fixpoint(experiment.get_mut(), &self.diagnostics, token)?;

        let mut stats = EnumerationStats::new(experiment.get().node_count(), false, true);
        enumerate_solutions(&self.config, experiment.get(), 0, &mut stats, &self.diagnostics, token)?;

        let node_value_counts = node_value_counts_by_identity(&self.config, &stats);
        let conflict = if stats.solutions_found == 0 {
            Some(ConflictedConstraints {
                scenario: self.current.detached_clone(),
                diagnostics: self.diagnostics.clone(),
            })
        } else {
            None
        };

        Ok(SolutionsAnalysis {
            viable_solutions_found: stats.solutions_found,
            node_value_counts,
            conflict,
        })
    }

    /// Repeatedly commit the single highest-occurrence indeterminate node/value pair from a fresh
    /// analysis until every remaining indeterminate node is unconstrained. Returns the resulting
    /// scenario, detached from the pool (the caller owns it; it is not returned on drop).
    pub fn get_probable_solution(
        &mut self,
        token: &impl CancellationToken,
    ) -> Result<Scenario<N, T>, Error> {
        let mut experiment = Experiment::new(&self.config, &self.current);
        loop {
            resolve_to_fixpoint(experiment.get_mut(), &self.diagnostics, token)?;

            let mut stats = EnumerationStats::new(experiment.get().node_count(), false, true);
            enumerate_solutions(&self.config, experiment.get(), 0, &mut stats, &self.diagnostics, token)?;

            let best = stats
                .node_value_counts
                .iter()
                .enumerate()
                .filter(|(i, _)| !experiment.get().is_resolved(*i))
                .filter_map(|(i, counts)| {
                    let counts = counts.as_ref()?;
                    let (value, count) = counts.iter().max_by_key(|(_, count)| **count)?;
                    Some((i, value.clone(), *count))
                })
                .max_by_key(|(_, _, count)| *count);

            match best {
                None => break,
                Some((index, value, _)) => {
                    experiment.get_mut().set_by_index(index, value)?;
                }
            }
        }
        Ok(experiment.detach())
    }

    /// For each indeterminate node that took exactly one value across every viable solution in
    /// `analysis`, commit that value as a resolved fact. Fires `selection_changed` if any node
    /// changed.
    ///
    /// Fails with [`Error::NoViableSolutions`] if `analysis` found none.
    pub fn commit_analysis(&mut self, analysis: &SolutionsAnalysis<N, T>) -> Result<(), Error> {
        if analysis.viable_solutions_found == 0 {
            return Err(Error::NoViableSolutions);
        }
        let mut experiment = Experiment::new(&self.config, &self.current);
        for (index, node) in self.config.nodes().iter().enumerate() {
            if experiment.get().is_resolved(index) {
                continue;
            }
            let Some(counts) = analysis.node_value_counts.get(node) else {
                continue;
            };
            for (value, count) in counts {
                if *count == analysis.viable_solutions_found {
                    experiment.get_mut().set_by_index(index, value.clone())?;
                    break;
                }
            }
        }

        let changed = self.changed_nodes(experiment.get());
        self.current.copy_from(experiment.get())?;
        self.fire_selection_changed(&changed);
        Ok(())
    }
}

#[cfg(feature = "async")]
impl<N, T> SolutionBuilder<N, T>
where
    N: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    T: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
{
    /// Copy the current scenario into a detached experiment, then dispatch exhaustive enumeration
    /// to a `tokio::task::spawn_blocking` worker. The builder and its current scenario remain
    /// free for synchronous calls while the returned future is in flight.
    pub fn analyze_solutions_async<C>(
        &self,
        token: C,
    ) -> impl std::future::Future<Output = Result<SolutionsAnalysis<N, T>, Error>> + 'static
    where
        C: CancellationToken + Send + Sync + 'static,
    {
        let config = self.config.clone();
        let mut experiment = Experiment::new(&config, &self.current);
        let full_refresh_needed = self.current.full_refresh_needed();
        let detached_current = self.current.detached_clone();
        let diagnostics = self.diagnostics.clone();

        async move {
            let outcome = tokio::task::spawn_blocking(move || {
                if full_refresh_needed {
                    for i in 0..experiment.get().node_count() {
                        experiment.get_mut().reset_node(i, None);
                    }
                }
                resolve_to_fixpoint(experiment.get_mut(), &diagnostics, &token)?;

                let mut stats = EnumerationStats::new(experiment.get().node_count(), false, true);
                enumerate_solutions(&config, experiment.get(), 0, &mut stats, &diagnostics, &token)?;

                let node_value_counts = node_value_counts_by_identity(&config, &stats);
                let conflict = if stats.solutions_found == 0 {
                    Some(ConflictedConstraints {
                        scenario: detached_current,
                        diagnostics: diagnostics.clone(),
                    })
                } else {
                    None
                };

                Ok(SolutionsAnalysis {
                    viable_solutions_found: stats.solutions_found,
                    node_value_counts,
                    conflict,
                })
            })
            .await;

            match outcome {
                Ok(result) => result,
                Err(join_error) => Err(Error::bad_constraint(
                    "analyze_solutions_async worker",
                    BadConstraintReason::ConstraintThrewUnexpectedException(join_error.to_string()),
                )),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::NullToken;
    use crate::constraints::{SelectionCountConstraint, SetOneNodeValueConstraint};

    fn node(i: usize) -> String {
        format!("n{i}")
    }

    #[test]
    fn resolve_partially_propagates_exactly_one() {
        let mut builder = SolutionBuilder::<String, bool>::from_parts(
            (0..3).map(node),
            [true, false],
        )
        .unwrap();
        builder
            .add_constraint(Arc::new(SelectionCountConstraint::exactly(
                (0..3).map(node),
                1,
            )))
            .unwrap();
        builder
            .add_constraint(Arc::new(SetOneNodeValueConstraint::new(node(0), true)))
            .unwrap();

        builder.resolve_partially(&NullToken).unwrap();

        assert_eq!(builder.get(&node(0)), Some(&true));
        assert_eq!(builder.get(&node(1)), Some(&false));
        assert_eq!(builder.get(&node(2)), Some(&false));
    }

    #[test]
    fn analyze_solutions_counts_every_assignment() {
        let mut builder =
            SolutionBuilder::<String, bool>::from_parts((0..2).map(node), [true, false]).unwrap();
        builder
            .add_constraint(Arc::new(SelectionCountConstraint::exactly(
                (0..2).map(node),
                1,
            )))
            .unwrap();

        let analysis = builder.analyze_solutions(&NullToken).unwrap();
        assert_eq!(analysis.viable_solutions_found, 2);
        assert!(analysis.conflict.is_none());
        assert_eq!(analysis.node_value_counts[&node(0)][&true], 1);
        assert_eq!(analysis.node_value_counts[&node(0)][&false], 1);
    }

    #[test]
    fn infeasible_constraints_report_conflict() {
        let mut builder =
            SolutionBuilder::<String, bool>::from_parts((0..1).map(node), [true, false]).unwrap();
        builder
            .add_constraint(Arc::new(SetOneNodeValueConstraint::new(node(0), true)))
            .unwrap();
        builder
            .add_constraint(Arc::new(SetOneNodeValueConstraint::new(node(0), false)))
            .unwrap();

        let conflict = builder
            .check_for_conflicting_constraints(&NullToken)
            .unwrap();
        assert!(conflict.is_some());
    }

    #[test]
    fn commit_analysis_requires_viable_solutions() {
        let mut builder =
            SolutionBuilder::<String, bool>::from_parts((0..1).map(node), [true, false]).unwrap();
        builder
            .add_constraint(Arc::new(SetOneNodeValueConstraint::new(node(0), true)))
            .unwrap();
        builder
            .add_constraint(Arc::new(SetOneNodeValueConstraint::new(node(0), false)))
            .unwrap();

        let analysis = builder.analyze_solutions(&NullToken).unwrap();
        let err = builder.commit_analysis(&analysis).unwrap_err();
        assert_eq!(err, Error::NoViableSolutions);
    }

    #[test]
    fn get_conflicting_constraints_finds_sole_culprit() {
        let mut builder =
            SolutionBuilder::<String, bool>::from_parts((0..1).map(node), [true, false]).unwrap();
        let good = Arc::new(SetOneNodeValueConstraint::new(node(0), true));
        let bad = Arc::new(SetOneNodeValueConstraint::new(node(0), false));
        builder.add_constraint(good.clone()).unwrap();
        builder.add_constraint(bad.clone() as Arc<dyn Constraint<String, bool>>).unwrap();

        let conflict = builder
            .check_for_conflicting_constraints(&NullToken)
            .unwrap()
            .unwrap();
        let culprits = conflict.get_conflicting_constraints(&[], &NullToken).unwrap();
        assert_eq!(culprits.len(), 1);
        assert!(Arc::ptr_eq(&culprits[0], &(bad as Arc<dyn Constraint<String, bool>>)));
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn analyze_solutions_async_counts_every_assignment() {
        let mut builder =
            SolutionBuilder::<String, bool>::from_parts((0..2).map(node), [true, false]).unwrap();
        builder
            .add_constraint(Arc::new(SelectionCountConstraint::exactly(
                (0..2).map(node),
                1,
            )))
            .unwrap();

        let analysis = builder.analyze_solutions_async(NullToken).await.unwrap();
        assert_eq!(analysis.viable_solutions_found, 2);
        assert!(analysis.conflict.is_none());
        assert_eq!(analysis.node_value_counts[&node(0)][&true], 1);
        assert_eq!(analysis.node_value_counts[&node(0)][&false], 1);
    }
}
