use htn_core::{WorldQuerier, WorldState};
use tracing::{debug, info, warn};

use crate::{Plan, PredicateRegistry, TaskKind};

enum Completion {
    /// Every ancestor that closed with this task is satisfied.
    Closed,
    /// A recursive ancestor rewound the cursor to itself.
    Rewound,
    Failed,
}

/// Advance `plan` by one tick.
///
/// Non-simple nodes are passed through in the same call; the first simple task reached is started
/// and the call returns. A simple task completes when its postconditions (or its non-empty break
/// conditions) hold.
pub fn evaluate_plan<A>(
    plan: &mut Plan<A>,
    state: &mut WorldState,
    querier: &dyn WorldQuerier,
    predicates: &PredicateRegistry<A>,
) {
    let agent = querier.name();
    let mut passed_through = false;

    loop {
        if plan.failed || plan.finished {
            return;
        }
        let cursor = plan.cursor;
        let Some(task) = plan.tasks.get_mut(cursor) else {
            return;
        };

        if !task.is_simple() {
            if !task.preconditions.is_true(state, task, predicates) {
                warn!(agent, task = task.name, kind = task.kind_name(), "preconditions not met, plan failed");
                plan.fail_current_task();
                return;
            }
            debug!(agent, task = task.name, kind = task.kind_name(), "passing through");
            task.start(state, querier);
            task.run_loop(state, querier);

            if cursor + 1 >= plan.tasks.len() {
                info!(agent, "plan finished successfully");
                plan.finished = true;
                return;
            }
            plan.cursor += 1;
            passed_through = true;
            continue;
        }

        if passed_through {
            debug!(agent, task = task.name, "started task");
            task.start(state, querier);
            return;
        }

        task.start(state, querier);
        task.run_loop(state, querier);

        let done = task.postconditions.is_true(state, task, predicates)
            || (!task.break_conditions.is_empty()
                && task.break_conditions.is_true(state, task, predicates));

        if !(done && !task.failed) {
            let can_continue = task.preconditions.is_true(state, task, predicates)
                && !task.is_immediate
                && !task.failed;
            if !can_continue {
                warn!(agent, task = task.name, "task can no longer run, plan failed");
                plan.fail_current_task();
            }
            return;
        }

        debug!(agent, task = task.name, "finished task");
        task.run_finish(state);

        match close_ancestors(plan, cursor, state, predicates, agent) {
            Completion::Closed => {}
            Completion::Rewound => continue,
            Completion::Failed => return,
        }

        if cursor + 1 < plan.tasks.len() {
            plan.cursor = cursor + 1;
            let next = &mut plan.tasks[cursor + 1];
            debug!(agent, task = next.name, "started task");
            next.start(state, querier);
            if !next.preconditions.is_true(state, next, predicates) {
                warn!(agent, task = next.name, "preconditions false, plan failed");
                plan.fail_current_task();
            }
        } else {
            info!(agent, "plan finished successfully");
            plan.failed = false;
            plan.finished = true;
        }
        return;
    }
}

/// Walk up from a completed task through every ancestor it was the last child of.
fn close_ancestors<A>(
    plan: &mut Plan<A>,
    completed: usize,
    state: &WorldState,
    predicates: &PredicateRegistry<A>,
    agent: &str,
) -> Completion {
    let mut child = completed;

    while let Some(parent_index) = plan.tasks[child].parent {
        if !plan.tasks[child].last_child {
            break;
        }

        let parent = &mut plan.tasks[parent_index];
        let satisfied = parent.postconditions.is_true(state, parent, predicates);

        match parent.kind {
            TaskKind::Compound { .. } | TaskKind::Abstract => {
                if !satisfied {
                    warn!(
                        agent,
                        task = parent.name,
                        kind = parent.kind_name(),
                        "finished but postconditions were not met"
                    );
                    plan.fail_current_task();
                    return Completion::Failed;
                }
            }
            TaskKind::Recursive { .. } => {
                if !satisfied {
                    if parent.remaining_repeats == 0 {
                        warn!(agent, task = parent.name, "recursion exhausted its repeats, plan failed");
                        plan.fail_current_task();
                        return Completion::Failed;
                    }
                    parent.remaining_repeats -= 1;
                    debug!(
                        agent,
                        task = parent.name,
                        remaining = parent.remaining_repeats,
                        "postconditions not met, starting over"
                    );

                    let end = plan.subtree_end(parent_index);
                    for task in &mut plan.tasks[parent_index..end] {
                        task.started = false;
                    }
                    // Nested recursions get their full budget back for the next pass.
                    for task in &mut plan.tasks[parent_index + 1..end] {
                        if let TaskKind::Recursive { max_repeats, .. } = &task.kind {
                            task.remaining_repeats = *max_repeats;
                        }
                    }
                    plan.cursor = parent_index;
                    return Completion::Rewound;
                }
                debug!(agent, task = parent.name, "recursion finished");
            }
            TaskKind::Simple { .. } => break,
        }

        child = parent_index;
    }

    Completion::Closed
}

/// Run `finally` hooks, last task first.
///
/// Every task that was ever started gets its hook run, at most once per plan. That includes tasks
/// past the cursor that ran in an earlier pass of a rewound recursive block.
pub fn execute_finally<A>(plan: &mut Plan<A>, state: &mut WorldState) {
    for task in plan.tasks.iter_mut().rev() {
        task.run_finally(state);
    }
}
