use std::fmt;
use std::hash::Hash;

use crate::constraint::{Constraint, ConstraintState, ConstraintStates};
use crate::error::Error;
use crate::scenario::Scenario;

/// The constraint that, among a fixed set of boolean-state nodes, the number selected (`true`)
/// lies in `[minimum, maximum]`.
///
/// This is the reference constraint the rest of the engine is built and tested against: it's
/// the simplest constraint that still needs every flag in [`ConstraintState`] and both
/// directions of propagation (forcing the rest to `false` once enough are selected, or to
/// `true` once too few remain available).
#[derive(Clone)]
pub struct SelectionCountConstraint<N> {
    nodes: Vec<N>,
    minimum: u32,
    maximum: u32,
}

impl<N: fmt::Debug> fmt::Debug for SelectionCountConstraint<N> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SelectionCountConstraint")
            .field("nodes", &self.nodes)
            .field("minimum", &self.minimum)
            .field("maximum", &self.maximum)
            .finish()
    }
}

impl<N> SelectionCountConstraint<N> {
    /// `minimum` is the least number of `nodes` that must be selected; `maximum` the most.
    /// `maximum` is clamped down to `nodes.len()`.
    pub fn new(nodes: impl IntoIterator<Item = N>, minimum: u32, maximum: u32) -> Self {
        let nodes: Vec<N> = nodes.into_iter().collect();
        let maximum = maximum.min(nodes.len() as u32);
        SelectionCountConstraint {
            nodes,
            minimum,
            maximum,
        }
    }

    /// Convenience constructor for "exactly `count` of `nodes` are selected".
    pub fn exactly(nodes: impl IntoIterator<Item = N>, count: u32) -> Self {
        SelectionCountConstraint::new(nodes, count, count)
    }

    fn counts(&self, scenario: &Scenario<N, bool>) -> (u32, u32, u32)
    where
        N: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    {
        let mut selected = 0u32;
        let mut unselected = 0u32;
        let mut indeterminate = 0u32;
        for node in &self.nodes {
            match scenario.get(node) {
                Some(true) => selected += 1,
                Some(false) => unselected += 1,
                None => indeterminate += 1,
            }
        }
        (selected, unselected, indeterminate)
    }
}

impl<N> Constraint<N, bool> for SelectionCountConstraint<N>
where
    N: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
{
    fn nodes(&self) -> &[N] {
        &self.nodes
    }

    fn get_state(&self, scenario: &Scenario<N, bool>) -> ConstraintStates {
        let (selected, unselected, indeterminate) = self.counts(scenario);
        let n = self.nodes.len() as u32;

        let satisfiable = self.minimum <= selected + indeterminate && self.maximum >= selected;
        let satisfied = satisfiable && self.minimum <= selected && selected <= self.maximum;
        let resolved = indeterminate == 0;
        let resolvable = !resolved && (selected == self.maximum || unselected == n - self.minimum);
        let breakable = !resolved
            && (!satisfiable || selected < self.minimum || selected + indeterminate > self.maximum);

        let mut states = ConstraintStates::empty();
        if satisfiable {
            states |= ConstraintState::Satisfiable;
        }
        if satisfied {
            states |= ConstraintState::Satisfied;
        }
        if resolved {
            states |= ConstraintState::Resolved;
        }
        if resolvable {
            states |= ConstraintState::Resolvable;
        }
        if breakable {
            states |= ConstraintState::Breakable;
        }
        states
    }

    fn resolve(&self, scenario: &mut Scenario<N, bool>) -> Result<bool, Error> {
        let (selected, unselected, _indeterminate) = self.counts(scenario);
        let n = self.nodes.len() as u32;

        let force_value = if selected == self.maximum {
            Some(false)
        } else if unselected == n - self.minimum {
            Some(true)
        } else {
            None
        };

        let Some(value) = force_value else {
            return Ok(false);
        };

        let mut changed = false;
        for node in &self.nodes {
            if scenario.get(node).is_none() {
                scenario.set(node, value)?;
                changed = true;
            }
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::Configuration;
    use std::sync::Arc;

    fn scenario_for(nodes: &[&str]) -> (Arc<Configuration<String, bool>>, Scenario<String, bool>) {
        let config = Arc::new(
            Configuration::new(nodes.iter().map(|s| s.to_string()), [true, false]).unwrap(),
        );
        let scenario = Configuration::blank_scenario(&config);
        (config, scenario)
    }

    #[test]
    fn satisfiable_and_satisfied() {
        let (_config, mut scenario) = scenario_for(&["a", "b", "c"]);
        let c = SelectionCountConstraint::new(
            ["a".to_string(), "b".to_string(), "c".to_string()],
            1,
            1,
        );
        let states = c.get_state(&scenario);
        assert!(states.contains(ConstraintState::Satisfiable));
        assert!(!states.contains(ConstraintState::Satisfied));
        assert!(!states.contains(ConstraintState::Resolved));

        scenario.set(&"a".to_string(), true).unwrap();
        scenario.set(&"b".to_string(), false).unwrap();
        scenario.set(&"c".to_string(), false).unwrap();
        let states = c.get_state(&scenario);
        assert!(states.contains(ConstraintState::Satisfied));
        assert!(states.contains(ConstraintState::Resolved));
    }

    #[test]
    fn resolve_forces_false_once_max_reached() {
        let (_config, mut scenario) = scenario_for(&["a", "b", "c"]);
        let c = SelectionCountConstraint::new(
            ["a".to_string(), "b".to_string(), "c".to_string()],
            1,
            1,
        );
        scenario.set(&"a".to_string(), true).unwrap();
        let changed = c.resolve(&mut scenario).unwrap();
        assert!(changed);
        assert_eq!(scenario.get(&"b".to_string()), Some(&false));
        assert_eq!(scenario.get(&"c".to_string()), Some(&false));
        // A second call has nothing left to do.
        assert!(!c.resolve(&mut scenario).unwrap());
    }

    #[test]
    fn resolve_forces_true_once_too_few_remain() {
        let (_config, mut scenario) = scenario_for(&["a", "b", "c"]);
        let c = SelectionCountConstraint::new(
            ["a".to_string(), "b".to_string(), "c".to_string()],
            2,
            3,
        );
        scenario.set(&"a".to_string(), false).unwrap();
        let changed = c.resolve(&mut scenario).unwrap();
        assert!(changed);
        assert_eq!(scenario.get(&"b".to_string()), Some(&true));
        assert_eq!(scenario.get(&"c".to_string()), Some(&true));
    }

    #[test]
    fn breakable_when_over_selected() {
        let (_config, mut scenario) = scenario_for(&["a", "b"]);
        let c = SelectionCountConstraint::new(["a".to_string(), "b".to_string()], 0, 1);
        scenario.set(&"a".to_string(), true).unwrap();
        scenario.set(&"b".to_string(), true).unwrap();
        let states = c.get_state(&scenario);
        assert!(!states.contains(ConstraintState::Satisfiable));
    }
}
