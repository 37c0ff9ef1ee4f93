use core::fmt;

use htn_core::{ConsumableKey, FactKey, WorldState};
use tracing::warn;

use crate::satisfy::can_satisfy;
use crate::{PredicateId, PredicateRegistry, Task, TaskDatabase, TaskId};

/// Comparison used by a required-value clause: `fact <op> value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionOp {
    LessThan,
    LessEqual,
    EqualTo,
    NotEqualTo,
    GreaterThan,
    GreaterEqual,
}

impl ConditionOp {
    pub fn compare(self, lhs: f32, rhs: f32) -> bool {
        match self {
            ConditionOp::LessThan => lhs < rhs,
            ConditionOp::LessEqual => lhs <= rhs,
            ConditionOp::EqualTo => lhs == rhs,
            ConditionOp::NotEqualTo => lhs != rhs,
            ConditionOp::GreaterThan => lhs > rhs,
            ConditionOp::GreaterEqual => lhs >= rhs,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            ConditionOp::LessThan => "<",
            ConditionOp::LessEqual => "<=",
            ConditionOp::EqualTo => "==",
            ConditionOp::NotEqualTo => "!=",
            ConditionOp::GreaterThan => ">",
            ConditionOp::GreaterEqual => ">=",
        }
    }
}

impl fmt::Display for ConditionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequiredFlag {
    pub key: FactKey,
    pub flag: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequiredValue {
    pub key: FactKey,
    pub op: ConditionOp,
    pub value: f32,
}

/// Reference to a registered predicate. `index` selects an entry of the owning task's parameters;
/// `None` lets the predicate use its defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredicateClause {
    pub id: PredicateId,
    pub index: Option<usize>,
}

/// Conjunction of clauses over a [`WorldState`]. Empty conditions are trivially true.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Condition {
    pub flags: Vec<RequiredFlag>,
    pub values: Vec<RequiredValue>,
    pub predicates: Vec<PredicateClause>,
    pub consumable_flags: Vec<ConsumableKey>,
    pub consumable_values: Vec<ConsumableKey>,
    pub consumable_vectors: Vec<ConsumableKey>,
}

impl Condition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_flag(mut self, key: FactKey, flag: bool) -> Self {
        self.flags.push(RequiredFlag { key, flag });
        self
    }

    pub fn with_value(mut self, key: FactKey, op: ConditionOp, value: f32) -> Self {
        self.values.push(RequiredValue { key, op, value });
        self
    }

    pub fn with_predicate(mut self, id: PredicateId) -> Self {
        self.predicates.push(PredicateClause { id, index: None });
        self
    }

    pub fn with_predicate_at(mut self, id: PredicateId, index: usize) -> Self {
        self.predicates.push(PredicateClause {
            id,
            index: Some(index),
        });
        self
    }

    pub fn with_consumable_flag(mut self, key: ConsumableKey) -> Self {
        self.consumable_flags.push(key);
        self
    }

    pub fn with_consumable_value(mut self, key: ConsumableKey) -> Self {
        self.consumable_values.push(key);
        self
    }

    pub fn with_consumable_vector(mut self, key: ConsumableKey) -> Self {
        self.consumable_vectors.push(key);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clause_count() == 0
    }

    pub fn clause_count(&self) -> usize {
        self.flags.len()
            + self.values.len()
            + self.predicates.len()
            + self.consumable_flags.len()
            + self.consumable_values.len()
            + self.consumable_vectors.len()
    }

    /// Evaluate every clause; predicates run against `task`'s parameters.
    pub fn is_true<A>(
        &self,
        state: &WorldState,
        task: &Task<A>,
        predicates: &PredicateRegistry<A>,
    ) -> bool {
        self.flags_hold(state)
            && self.values_hold(state)
            && self
                .predicates
                .iter()
                .all(|p| predicates.evaluate(p.id, state, task, p.index))
            && self.consumables_hold(state)
    }

    fn flags_hold(&self, state: &WorldState) -> bool {
        self.flags.iter().all(|req| match state.flag(req.key) {
            Some(flag) => flag == req.flag,
            None => {
                warn!(fact = req.key.0, "required flag is missing from world state");
                false
            }
        })
    }

    fn values_hold(&self, state: &WorldState) -> bool {
        self.values.iter().all(|req| match state.value(req.key) {
            Some(value) => req.op.compare(value, req.value),
            None => {
                warn!(fact = req.key.0, "required value is missing from world state");
                false
            }
        })
    }

    fn consumables_hold(&self, state: &WorldState) -> bool {
        let facts = &state.facts;
        self.consumable_flags.iter().all(|k| facts.flag_available(*k))
            && self.consumable_values.iter().all(|k| facts.value_available(*k))
            && self.consumable_vectors.iter().all(|k| facts.vector_available(*k))
    }
}

/// A predicate clause carried through a search, tagged with the task it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergedPredicate {
    pub id: PredicateId,
    pub index: Option<usize>,
    /// Position in [`MergedCondition::tasks`].
    pub task: usize,
}

/// Preconditions still open along a search path, after each chained task cancelled what its
/// postconditions provide.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedCondition {
    /// Non-predicate clauses.
    pub condition: Condition,
    pub predicates: Vec<MergedPredicate>,
    pub tasks: Vec<TaskId>,
}

impl MergedCondition {
    /// Open conditions of a path that only contains `task`.
    pub fn from_task<A>(id: TaskId, task: &Task<A>) -> Self {
        let mut merged = Self::default();
        merged.append_preconditions(id, task);
        merged
    }

    /// Chain `next` in front of the path: clauses its postconditions satisfy are cancelled, then its
    /// own preconditions are appended.
    pub fn merge<A>(&mut self, id: TaskId, next: &Task<A>) {
        let post = &next.postconditions;
        let open = &mut self.condition;

        for provided in &post.flags {
            if let Some(i) = open.flags.iter().position(|f| f.key == provided.key) {
                if open.flags[i].flag == provided.flag {
                    open.flags.remove(i);
                }
            }
        }

        for provided in &post.values {
            if let Some(i) = open.values.iter().position(|v| v.key == provided.key) {
                let required = open.values[i];
                if can_satisfy(provided.op, provided.value, required.op, required.value) {
                    open.values.remove(i);
                }
            }
        }

        cancel_consumables(&mut open.consumable_flags, &post.consumable_flags);
        cancel_consumables(&mut open.consumable_values, &post.consumable_values);
        cancel_consumables(&mut open.consumable_vectors, &post.consumable_vectors);

        for provided in &post.predicates {
            if let Some(i) = self.predicates.iter().position(|p| p.id == provided.id) {
                self.predicates.swap_remove(i);
            }
        }

        self.append_preconditions(id, next);
    }

    /// Append `task`'s preconditions without cancelling anything.
    pub fn append_preconditions<A>(&mut self, id: TaskId, task: &Task<A>) {
        let pre = &task.preconditions;
        let open = &mut self.condition;
        open.flags.extend_from_slice(&pre.flags);
        open.values.extend_from_slice(&pre.values);
        open.consumable_flags.extend_from_slice(&pre.consumable_flags);
        open.consumable_values.extend_from_slice(&pre.consumable_values);
        open.consumable_vectors.extend_from_slice(&pre.consumable_vectors);

        let owner = self.tasks.len();
        self.predicates
            .extend(pre.predicates.iter().map(|p| MergedPredicate {
                id: p.id,
                index: p.index,
                task: owner,
            }));
        self.tasks.push(id);
    }

    /// Number of clauses still open.
    pub fn heuristic(&self) -> usize {
        let c = &self.condition;
        c.flags.len()
            + c.values.len()
            + c.consumable_flags.len()
            + c.consumable_values.len()
            + c.consumable_vectors.len()
            + self.predicates.len()
    }

    pub fn is_true<A>(
        &self,
        state: &WorldState,
        database: &TaskDatabase<A>,
        predicates: &PredicateRegistry<A>,
    ) -> bool {
        let c = &self.condition;
        if !(c.flags_hold(state) && c.values_hold(state) && c.consumables_hold(state)) {
            return false;
        }

        self.predicates.iter().all(|p| {
            let Some(task) = self.tasks.get(p.task).and_then(|id| database.task(*id)) else {
                warn!(predicate = p.id.0, "merged predicate refers to an unknown task");
                return false;
            };
            predicates.evaluate(p.id, state, task, p.index)
        })
    }
}

fn cancel_consumables(open: &mut Vec<ConsumableKey>, provided: &[ConsumableKey]) {
    for key in provided {
        if let Some(i) = open.iter().position(|k| k == key) {
            open.swap_remove(i);
        }
    }
}
