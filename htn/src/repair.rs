use htn_core::WorldState;
use tracing::{debug, info};

use crate::plan::flatten_task;
use crate::{Plan, PredicateRegistry, TaskDatabase};

/// Try to recover a failed plan by swapping in another implementation of the nearest abstract
/// task enclosing the failed current task.
///
/// The first implementation (registration order) that has not been tried yet and whose
/// preconditions hold replaces the abstract node's current subtree. Returns whether a repair
/// happened; otherwise the plan stays failed.
pub fn fix_failed_plan<A: Clone>(
    plan: &mut Plan<A>,
    state: &mut WorldState,
    database: &TaskDatabase<A>,
    predicates: &PredicateRegistry<A>,
) -> bool {
    if !plan.failed || plan.tasks.is_empty() {
        return false;
    }

    let Some(abstract_index) = nearest_abstract_ancestor(plan, plan.cursor) else {
        return false;
    };
    let Some(abstract_id) = plan.tasks[abstract_index].id else {
        return false;
    };
    let Some(implementations) = database.implementations(abstract_id) else {
        return false;
    };

    let tried = plan.implementations_used(abstract_index).to_vec();
    let candidate = implementations.iter().enumerate().find_map(|(i, id)| {
        if tried.contains(&i) {
            return None;
        }
        let task = database.task(*id)?;
        task.preconditions
            .is_true(state, task, predicates)
            .then_some((i, *id, task))
    });
    let Some((implementation_index, implementation_id, implementation)) = candidate else {
        debug!(task = abstract_id.0, tried = tried.len(), "no untried implementation is viable");
        return false;
    };

    let start = abstract_index + 1;
    let end = plan.subtree_end(abstract_index);

    for task in plan.tasks[start..end].iter_mut().rev() {
        task.run_finally(state);
    }

    let path_vertex = plan
        .tasks
        .get(start)
        .map(|t| t.path_vertex)
        .unwrap_or(plan.tasks[abstract_index].path_vertex);

    let mut replacement = Vec::new();
    let mut root = implementation.clone();
    root.last_child = true;
    flatten_task(&mut replacement, root, Some(abstract_index), path_vertex);
    for task in replacement.iter_mut().skip(1) {
        if let Some(parent) = task.parent.as_mut() {
            *parent += start;
        }
    }

    let removed = end - start;
    let inserted = replacement.len();
    plan.tasks.splice(start..end, replacement);

    // Re-base everything that pointed past the replaced subtree.
    let rebase = |index: usize| index + inserted - removed;
    for task in plan.tasks[start + inserted..].iter_mut() {
        if let Some(parent) = task.parent.as_mut() {
            if *parent >= end {
                *parent = rebase(*parent);
            }
        }
    }
    plan.implementations_used = std::mem::take(&mut plan.implementations_used)
        .into_iter()
        .filter(|(index, _)| *index < start || *index >= end)
        .map(|(index, used)| if index >= end { (rebase(index), used) } else { (index, used) })
        .collect();
    plan.implementations_used
        .entry(abstract_index)
        .or_default()
        .push(implementation_index);

    if let Some(vertex) = plan.plan_path.get_mut(path_vertex) {
        *vertex = implementation_id;
    }

    plan.failed = false;
    plan.finished = false;
    plan.cursor = start;

    info!(
        task = abstract_id.0,
        implementation = implementation_id.0,
        replaced = removed,
        inserted,
        "repaired plan with another implementation"
    );
    true
}

fn nearest_abstract_ancestor<A>(plan: &Plan<A>, index: usize) -> Option<usize> {
    let mut parent = plan.tasks.get(index)?.parent;
    while let Some(p) = parent {
        let task = plan.tasks.get(p)?;
        if task.is_abstract() {
            return Some(p);
        }
        parent = task.parent;
    }
    None
}
