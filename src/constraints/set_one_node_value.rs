use std::fmt;
use std::hash::Hash;

use crate::constraint::{Constraint, ConstraintState, ConstraintStates};
use crate::error::Error;
use crate::scenario::Scenario;

/// The constraint that pins a single node to a specific value. Used to seed a scenario with
/// a known fact (a clue, a fixed choice) that propagation can then work outward from.
#[derive(Clone, Debug)]
pub struct SetOneNodeValueConstraint<N, T> {
    node: N,
    value: T,
}

impl<N, T> SetOneNodeValueConstraint<N, T> {
    pub fn new(node: N, value: T) -> Self {
        SetOneNodeValueConstraint { node, value }
    }
}

impl<N, T> Constraint<N, T> for SetOneNodeValueConstraint<N, T>
where
    N: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    T: Eq + Clone + fmt::Debug + Send + Sync + 'static,
{
    fn nodes(&self) -> &[N] {
        std::slice::from_ref(&self.node)
    }

    fn get_state(&self, scenario: &Scenario<N, T>) -> ConstraintStates {
        let mut states = ConstraintStates::empty();
        match scenario.get(&self.node) {
            None => {
                states |= ConstraintState::Satisfiable;
                states |= ConstraintState::Resolvable;
                states |= ConstraintState::Breakable;
            }
            Some(v) if *v == self.value => {
                states |= ConstraintState::Satisfiable;
                states |= ConstraintState::Satisfied;
                states |= ConstraintState::Resolved;
            }
            Some(_) => {
                states |= ConstraintState::Resolved;
                states |= ConstraintState::Breakable;
            }
        }
        states
    }

    fn resolve(&self, scenario: &mut Scenario<N, T>) -> Result<bool, Error> {
        if scenario.get(&self.node).is_some() {
            return Ok(false);
        }
        scenario.set(&self.node, self.value.clone())?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::Configuration;
    use std::sync::Arc;

    fn scenario_for(nodes: &[&str]) -> (Arc<Configuration<String, i32>>, Scenario<String, i32>) {
        let config =
            Arc::new(Configuration::new(nodes.iter().map(|s| s.to_string()), [1, 2, 3]).unwrap());
        let scenario = Configuration::blank_scenario(&config);
        (config, scenario)
    }

    #[test]
    fn resolves_unset_node_to_value() {
        let (_config, mut scenario) = scenario_for(&["a", "b"]);
        let c = SetOneNodeValueConstraint::new("a".to_string(), 2);
        assert!(c.resolve(&mut scenario).unwrap());
        assert_eq!(scenario.get(&"a".to_string()), Some(&2));
        assert!(!c.resolve(&mut scenario).unwrap());
    }

    #[test]
    fn breakable_when_node_set_to_other_value() {
        let (_config, mut scenario) = scenario_for(&["a"]);
        scenario.set(&"a".to_string(), 1).unwrap();
        let c = SetOneNodeValueConstraint::new("a".to_string(), 2);
        let states = c.get_state(&scenario);
        assert!(states.contains(ConstraintState::Breakable));
        assert!(!states.contains(ConstraintState::Satisfiable));
    }

    #[test]
    fn unresolved_node_reports_full_unresolved_flag_set() {
        let (_config, scenario) = scenario_for(&["a"]);
        let c = SetOneNodeValueConstraint::new("a".to_string(), 2);
        let states = c.get_state(&scenario);
        assert!(states.contains(ConstraintState::Satisfiable));
        assert!(states.contains(ConstraintState::Resolvable));
        assert!(states.contains(ConstraintState::Breakable));
        assert!(!states.contains(ConstraintState::Satisfied));
        assert!(!states.contains(ConstraintState::Resolved));
    }
}
