use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use htn_core::WorldState;
use tracing::warn;

use crate::{PredicateId, Task};

/// Evaluator behind a [`PredicateId`]. The index selects an entry of the task's parameters.
pub type PredicateFn<A> = Arc<dyn Fn(&WorldState, &Task<A>, Option<usize>) -> bool + Send + Sync>;

/// Predicates are the escape hatch for clauses the flag/value algebra cannot express (distances,
/// timers, per-task scratch values).
pub struct PredicateRegistry<A> {
    predicates: BTreeMap<PredicateId, PredicateFn<A>>,
}

impl<A> Default for PredicateRegistry<A> {
    fn default() -> Self {
        Self {
            predicates: BTreeMap::new(),
        }
    }
}

impl<A> PredicateRegistry<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the evaluator for `id`.
    pub fn insert(
        &mut self,
        id: PredicateId,
        f: impl Fn(&WorldState, &Task<A>, Option<usize>) -> bool + Send + Sync + 'static,
    ) {
        self.predicates.insert(id, Arc::new(f));
    }

    pub fn with(
        mut self,
        id: PredicateId,
        f: impl Fn(&WorldState, &Task<A>, Option<usize>) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.insert(id, f);
        self
    }

    pub fn contains(&self, id: PredicateId) -> bool {
        self.predicates.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Unregistered predicates evaluate to `false`.
    pub fn evaluate(
        &self,
        id: PredicateId,
        state: &WorldState,
        task: &Task<A>,
        index: Option<usize>,
    ) -> bool {
        match self.predicates.get(&id) {
            Some(f) => f(state, task, index),
            None => {
                warn!(predicate = id.0, task = task.name, "predicate is not registered");
                false
            }
        }
    }
}

impl<A> fmt::Debug for PredicateRegistry<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.predicates.keys()).finish()
    }
}
