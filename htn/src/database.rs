use std::collections::BTreeMap;

use tracing::debug;

use crate::satisfy::can_satisfy;
use crate::{HtnError, PredicateRegistry, Result, Task, TaskId};

/// A registered task and the tasks whose postconditions can satisfy its preconditions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskVertex {
    pub id: TaskId,
    /// In registration order.
    pub adjacent: Vec<TaskId>,
}

/// Registry of task definitions and the derived task graph.
///
/// Built once, then only read; planners borrow it (or share it behind an `Arc`).
#[derive(Debug)]
pub struct TaskDatabase<A> {
    tasks: BTreeMap<TaskId, Task<A>>,
    graph: Vec<TaskVertex>,
    vertex_index: BTreeMap<TaskId, usize>,
    implementations: BTreeMap<TaskId, Vec<TaskId>>,
}

impl<A> Default for TaskDatabase<A> {
    fn default() -> Self {
        Self {
            tasks: BTreeMap::new(),
            graph: Vec::new(),
            vertex_index: BTreeMap::new(),
            implementations: BTreeMap::new(),
        }
    }
}

impl<A> TaskDatabase<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `task` under `id` and connect it to every task registered so far.
    pub fn add_task(&mut self, id: TaskId, mut task: Task<A>) -> Result<()> {
        if self.tasks.contains_key(&id) {
            return Err(HtnError::DuplicateTask(id));
        }
        task.id = Some(id);

        let mut vertex = TaskVertex {
            id,
            adjacent: Vec::new(),
        };
        for existing in self.graph.iter_mut() {
            let Some(other) = self.tasks.get(&existing.id) else {
                continue;
            };
            if are_adjacent(other, &task) {
                existing.adjacent.push(id);
            }
            if are_adjacent(&task, other) {
                vertex.adjacent.push(existing.id);
            }
        }

        debug!(task = id.0, adjacent = vertex.adjacent.len(), "registered task");
        self.vertex_index.insert(id, self.graph.len());
        self.graph.push(vertex);
        self.tasks.insert(id, task);
        Ok(())
    }

    /// Register the implementations, then the abstract task that stands for them.
    pub fn add_abstract(
        &mut self,
        id: TaskId,
        task: Task<A>,
        implementations: Vec<(TaskId, Task<A>)>,
    ) -> Result<()> {
        if implementations.is_empty() {
            return Err(HtnError::EmptyAbstract(id));
        }
        if self.tasks.contains_key(&id) {
            return Err(HtnError::DuplicateTask(id));
        }
        for (i, (impl_id, _)) in implementations.iter().enumerate() {
            let repeated = implementations[..i].iter().any(|(prev, _)| prev == impl_id);
            if repeated || *impl_id == id || self.tasks.contains_key(impl_id) {
                return Err(HtnError::DuplicateTask(*impl_id));
            }
        }

        let ids: Vec<TaskId> = implementations.iter().map(|(impl_id, _)| *impl_id).collect();
        for (impl_id, implementation) in implementations {
            self.add_task(impl_id, implementation)?;
        }
        self.add_task(id, task)?;
        self.implementations.insert(id, ids);
        Ok(())
    }

    pub fn task(&self, id: TaskId) -> Option<&Task<A>> {
        self.tasks.get(&id)
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.tasks.contains_key(&id)
    }

    /// Tasks that can satisfy `id`'s preconditions. Empty for unknown ids.
    pub fn adjacent(&self, id: TaskId) -> &[TaskId] {
        self.vertex_index
            .get(&id)
            .and_then(|i| self.graph.get(*i))
            .map(|v| v.adjacent.as_slice())
            .unwrap_or(&[])
    }

    /// Implementations of an abstract task, in registration order.
    pub fn implementations(&self, id: TaskId) -> Option<&[TaskId]> {
        self.implementations.get(&id).map(Vec::as_slice)
    }

    pub fn is_abstract(&self, id: TaskId) -> bool {
        self.implementations.contains_key(&id)
    }

    /// The abstract task `id` was registered as an implementation of, if any.
    pub fn abstract_for(&self, id: TaskId) -> Option<TaskId> {
        self.implementations
            .iter()
            .find(|(_, impls)| impls.contains(&id))
            .map(|(abstract_id, _)| *abstract_id)
    }

    pub fn graph(&self) -> &[TaskVertex] {
        &self.graph
    }

    /// Registered ids in registration order.
    pub fn ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.graph.iter().map(|v| v.id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Check that every predicate referenced by a registered task (including nested subtasks) is
    /// registered.
    pub fn validate(&self, predicates: &PredicateRegistry<A>) -> Result<()> {
        fn check<A>(owner: TaskId, task: &Task<A>, predicates: &PredicateRegistry<A>) -> Result<()> {
            let conditions = [
                &task.preconditions,
                &task.postconditions,
                &task.break_conditions,
            ];
            for clause in conditions.iter().flat_map(|c| c.predicates.iter()) {
                if !predicates.contains(clause.id) {
                    return Err(HtnError::MissingPredicate {
                        task: owner,
                        predicate: clause.id,
                    });
                }
            }
            task.subtasks()
                .iter()
                .try_for_each(|sub| check(owner, sub, predicates))
        }

        self.graph.iter().try_for_each(|vertex| match self.tasks.get(&vertex.id) {
            Some(task) => check(vertex.id, task, predicates),
            None => Err(HtnError::UnknownTask(vertex.id)),
        })
    }
}

/// `true` iff some postcondition clause of `b` can satisfy some precondition clause of `a`.
///
/// For values, the first postcondition clause on the same key decides the answer.
pub fn are_adjacent<A>(a: &Task<A>, b: &Task<A>) -> bool {
    let pre = &a.preconditions;
    let post = &b.postconditions;

    for required in &pre.flags {
        if let Some(provided) = post.flags.iter().find(|f| f.key == required.key) {
            if provided.flag == required.flag {
                return true;
            }
        }
    }

    for required in &pre.values {
        if let Some(provided) = post.values.iter().find(|v| v.key == required.key) {
            return can_satisfy(provided.op, provided.value, required.op, required.value);
        }
    }

    if pre
        .predicates
        .iter()
        .any(|p| post.predicates.iter().any(|q| q.id == p.id))
    {
        return true;
    }

    pre.consumable_flags.iter().any(|k| post.consumable_flags.contains(k))
        || pre.consumable_values.iter().any(|k| post.consumable_values.contains(k))
        || pre.consumable_vectors.iter().any(|k| post.consumable_vectors.contains(k))
}
