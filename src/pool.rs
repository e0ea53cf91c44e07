//! An object pool of recycled [`Scenario`]s, so that depth-first search doesn't allocate a new
//! scenario per branch. Internally synchronized so a `Configuration` shared across threads can
//! still hand out scenarios safely (see §5 of the design notes).

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::configuration::Configuration;
use crate::scenario::Scenario;

/// An unbounded LIFO of reusable scenarios.
pub struct ScenarioPool<N, T> {
    free: Mutex<Vec<Scenario<N, T>>>,
}

impl<N, T> fmt::Debug for ScenarioPool<N, T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ScenarioPool")
            .field("free", &self.free.lock().len())
            .finish()
    }
}

impl<N, T> ScenarioPool<N, T>
where
    N: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    T: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
{
    pub(crate) fn new() -> ScenarioPool<N, T> {
        ScenarioPool {
            free: Mutex::new(Vec::new()),
        }
    }

    /// Take a scenario whose contents are a copy of `basis`. Recycled scenarios are not cleared
    /// ahead of time; the copy overwrites whatever they held.
    pub(crate) fn take(
        &self,
        config: &Arc<Configuration<N, T>>,
        basis: &Scenario<N, T>,
    ) -> Scenario<N, T> {
        let mut scenario = self
            .free
            .lock()
            .pop()
            .unwrap_or_else(|| Scenario::blank(config.clone()));
        scenario
            .copy_from(basis)
            .expect("pooled scenarios share a configuration with their basis");
        scenario
    }

    /// Take an entirely unresolved scenario, for the very first scenario a builder owns.
    pub(crate) fn take_blank(&self, config: &Arc<Configuration<N, T>>) -> Scenario<N, T> {
        let mut scenario = self
            .free
            .lock()
            .pop()
            .unwrap_or_else(|| Scenario::blank(config.clone()));
        scenario.reset_to_blank();
        scenario
    }

    /// Return a scenario to the pool for future reuse.
    pub(crate) fn give_back(&self, scenario: Scenario<N, T>) {
        self.free.lock().push(scenario);
    }
}
