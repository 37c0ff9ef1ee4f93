use core::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

use htn_core::{WorldQuerier, WorldState};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::plan::flatten_path;
use crate::{MergedCondition, Plan, PredicateRegistry, TaskDatabase, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PlannerConfig {
    /// Max number of frontier dequeues before giving up (loop protection).
    pub max_expansions: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_expansions: 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenNode {
    f: usize,
    g: usize,
    id: TaskId,
    tie: u64,
}

impl OpenNode {
    fn key(&self) -> (usize, u64) {
        (self.f, self.tie)
    }
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering to make BinaryHeap behave like a min-heap.
        other.key().cmp(&self.key())
    }
}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Search<'a, A> {
    database: &'a TaskDatabase<A>,
    open: BinaryHeap<OpenNode>,
    tie: u64,
    cost_so_far: BTreeMap<TaskId, usize>,
    came_from: BTreeMap<TaskId, TaskId>,
    remaining: BTreeMap<TaskId, MergedCondition>,
}

impl<'a, A> Search<'a, A> {
    fn new(database: &'a TaskDatabase<A>) -> Self {
        Self {
            database,
            open: BinaryHeap::new(),
            tie: 0,
            cost_so_far: BTreeMap::new(),
            came_from: BTreeMap::new(),
            remaining: BTreeMap::new(),
        }
    }

    fn push(&mut self, id: TaskId, g: usize, from: Option<TaskId>, merged: MergedCondition) {
        let f = g.saturating_add(merged.heuristic());
        self.cost_so_far.insert(id, g);
        if let Some(from) = from {
            self.came_from.insert(id, from);
        }
        self.remaining.insert(id, merged);
        self.open.push(OpenNode {
            f,
            g,
            id,
            tie: self.tie,
        });
        self.tie += 1;
    }

    fn improves(&self, id: TaskId, g: usize) -> bool {
        self.cost_so_far.get(&id).map_or(true, |best| g < *best)
    }

    /// Walk `came_from` from `terminal` back to `goal`. The result is in execution order.
    fn path(&self, terminal: TaskId, goal: TaskId) -> Option<Vec<TaskId>> {
        let mut path = vec![terminal];
        let mut current = terminal;
        while current != goal {
            current = *self.came_from.get(&current)?;
            path.push(current);
            if path.len() > self.came_from.len() + 1 {
                return None;
            }
        }
        Some(path)
    }
}

/// Search backwards from `goal` for a chain of tasks whose preconditions hold in `state`, then
/// flatten it into a [`Plan`].
///
/// On success the first task is started (its `setup` runs). On failure the plan is empty and
/// `failed`.
pub fn generate_plan<A: Clone>(
    goal: TaskId,
    state: &mut WorldState,
    querier: &dyn WorldQuerier,
    database: &TaskDatabase<A>,
    predicates: &PredicateRegistry<A>,
    config: &PlannerConfig,
) -> Plan<A> {
    let agent = querier.name();

    let Some(goal_task) = database.task(goal) else {
        warn!(agent, goal = goal.0, "cannot plan for an unregistered goal");
        return Plan::failed_for(goal);
    };

    let mut search = Search::new(database);

    if let Some(implementations) = database.implementations(goal) {
        for id in implementations {
            if let Some(task) = database.task(*id) {
                search.push(*id, 0, Some(goal), MergedCondition::from_task(*id, task));
            }
        }
    } else {
        search.push(goal, 0, None, MergedCondition::from_task(goal, goal_task));
    }
    search.cost_so_far.insert(goal, 0);

    let mut expansions: usize = 0;
    let mut terminal = None;

    while let Some(node) = search.open.pop() {
        expansions += 1;
        if expansions > config.max_expansions {
            debug!(agent, goal = goal.0, expansions, "plan search exceeded its expansion budget");
            return Plan::failed_for(goal);
        }

        if search.cost_so_far.get(&node.id) != Some(&node.g) {
            continue; // stale heap entry
        }
        let Some(open) = search.remaining.get(&node.id).cloned() else {
            continue;
        };

        // Abstract vertices are never tested themselves: their implementations take their place.
        if node.id != goal {
            if let Some(implementations) = database.implementations(node.id) {
                for id in implementations {
                    let Some(task) = database.task(*id) else {
                        continue;
                    };
                    if !search.improves(*id, node.g) {
                        continue;
                    }
                    let mut merged = open.clone();
                    merged.append_preconditions(*id, task);
                    search.push(*id, node.g, Some(node.id), merged);
                }
                continue;
            }
        }

        if open.heuristic() == 0 || open.is_true(state, database, predicates) {
            terminal = Some(node.id);
            break;
        }

        let next_cost = node.g + 1;
        for adjacent in database.adjacent(node.id) {
            // Implementations are only reached through their abstract task.
            if database.abstract_for(*adjacent).is_some() {
                continue;
            }
            let Some(next) = database.task(*adjacent) else {
                continue;
            };
            if !search.improves(*adjacent, next_cost) {
                continue;
            }

            let mut merged = open.clone();
            merged.merge(*adjacent, next);

            let dead_end = database.adjacent(*adjacent).is_empty()
                && !database.is_abstract(*adjacent)
                && merged.heuristic() > 0
                && !merged.is_true(state, database, predicates);
            if dead_end {
                continue;
            }

            search.push(*adjacent, next_cost, Some(node.id), merged);
        }
    }

    let Some(terminal) = terminal else {
        debug!(agent, goal = goal.0, expansions, "no plan found");
        return Plan::failed_for(goal);
    };

    let Some(path) = search.path(terminal, goal) else {
        warn!(agent, goal = goal.0, terminal = terminal.0, "could not reconstruct plan path");
        return Plan::failed_for(goal);
    };

    let Some((tasks, implementations_used)) = flatten_path(&path, database) else {
        warn!(agent, goal = goal.0, "plan path names an unregistered task");
        return Plan::failed_for(goal);
    };

    debug!(
        agent,
        goal = goal.0,
        expansions,
        path = ?path.iter().map(|id| id.0).collect::<Vec<_>>(),
        tasks = tasks.len(),
        "plan found"
    );

    let mut plan = Plan {
        goal: Some(goal),
        tasks,
        cursor: 0,
        plan_path: path,
        implementations_used,
        failed: false,
        finished: false,
    };
    if let Some(first) = plan.tasks.first_mut() {
        first.start(state, querier);
    }
    plan
}
